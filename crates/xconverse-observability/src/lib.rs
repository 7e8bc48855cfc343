mod config;
mod otlp;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use config::{ObservabilityConfig, TraceSinkConfig};
pub use otlp::TraceExporterKind;

/// Flushes pending spans when dropped.
#[derive(Default)]
pub struct ObservabilityGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(error) = provider.shutdown()
        {
            eprintln!("xconverse: trace provider shutdown failed: {error}");
        }
    }
}

fn span_events_mask(log_span_events: bool) -> FmtSpan {
    if log_span_events { FmtSpan::NEW | FmtSpan::CLOSE } else { FmtSpan::NONE }
}

pub fn init_observability(service_name: &str, config: &ObservabilityConfig) -> ObservabilityGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.fallback_filter()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_writer(std::io::stdout)
        .with_span_events(span_events_mask(config.log_span_events));

    let mut export_error = None;
    let tracer_provider =
        config.trace_sink.as_ref().and_then(|sink| match otlp::build_trace_exporter(sink) {
            Ok(exporter) => Some(
                SdkTracerProvider::builder()
                    .with_batch_exporter(exporter)
                    .with_resource(
                        Resource::builder().with_service_name(service_name.to_string()).build(),
                    )
                    .build(),
            ),
            Err(error) => {
                export_error = Some(error);
                None
            }
        });
    let telemetry_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()
        .ok();

    match (&config.trace_sink, &export_error) {
        (_, Some(error)) => warn!(
            event = "observability.trace.disabled",
            error = %error,
            "continuing in log-only mode"
        ),
        (Some(sink), None) => info!(
            event = "observability.trace.enabled",
            exporter = sink.kind.as_str(),
            endpoint = %sink.endpoint
        ),
        (None, None) => {}
    }

    ObservabilityGuard { tracer_provider }
}
