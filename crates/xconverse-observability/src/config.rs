use std::{env, time::Duration};

use crate::otlp::TraceExporterKind;

const DEFAULT_TRACE_TIMEOUT_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSinkConfig {
    pub kind: TraceExporterKind,
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_span_events: bool,
    /// `None` keeps the service in log-only mode.
    pub trace_sink: Option<TraceSinkConfig>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value =
            |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let truthy = |name: &str| {
            value(name).is_some_and(|v| {
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
            })
        };

        let trace_sink = truthy("XC_TRACE_ENABLED").then(|| {
            let kind = value("XC_OTEL_TRACE_EXPORTER")
                .and_then(|raw| TraceExporterKind::parse(&raw))
                .unwrap_or(TraceExporterKind::OtlpGrpc);
            let endpoint = value("XC_OTEL_TRACE_ENDPOINT")
                .unwrap_or_else(|| kind.default_endpoint().to_string());
            let timeout = Duration::from_millis(
                value("XC_OTEL_TRACE_TIMEOUT_MS")
                    .and_then(|raw| raw.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_TRACE_TIMEOUT_MS),
            );
            TraceSinkConfig { kind, endpoint, timeout }
        });

        Self {
            log_level: value("XC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_span_events: truthy("XC_LOG_SPAN_EVENTS"),
            trace_sink,
        }
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn fallback_filter(&self) -> String {
        format!(
            "{level},xconverse_app={level},xconverse_core={level},xconverse_clients={level}",
            level = self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn config(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>();
        ObservabilityConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_log_only_info() {
        assert_eq!(
            config(&[]),
            ObservabilityConfig {
                log_level: "info".to_string(),
                log_span_events: false,
                trace_sink: None,
            }
        );
    }

    #[test]
    fn tracing_uses_exporter_defaults() {
        let config =
            config(&[("XC_TRACE_ENABLED", "yes"), ("XC_OTEL_TRACE_EXPORTER", "otlp-http")]);
        assert_eq!(
            config.trace_sink,
            Some(TraceSinkConfig {
                kind: TraceExporterKind::OtlpHttp,
                endpoint: "http://127.0.0.1:4318/v1/traces".to_string(),
                timeout: Duration::from_millis(3_000),
            })
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config(&[
            ("XC_LOG_LEVEL", "debug"),
            ("XC_LOG_SPAN_EVENTS", "1"),
            ("XC_TRACE_ENABLED", "true"),
            ("XC_OTEL_TRACE_ENDPOINT", "http://collector:4317"),
            ("XC_OTEL_TRACE_TIMEOUT_MS", "500"),
        ]);
        assert!(config.log_span_events);
        assert_eq!(
            config.fallback_filter(),
            "debug,xconverse_app=debug,xconverse_core=debug,xconverse_clients=debug"
        );
        let sink = config.trace_sink.expect("tracing enabled");
        assert_eq!(sink.kind, TraceExporterKind::OtlpGrpc);
        assert_eq!(sink.endpoint, "http://collector:4317");
        assert_eq!(sink.timeout, Duration::from_millis(500));
    }
}
