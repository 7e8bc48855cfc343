use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};

use crate::config::TraceSinkConfig;

const DEFAULT_OTEL_TRACE_GRPC_ENDPOINT: &str = "http://127.0.0.1:4317";
const DEFAULT_OTEL_TRACE_HTTP_ENDPOINT: &str = "http://127.0.0.1:4318/v1/traces";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceExporterKind {
    OtlpGrpc,
    OtlpHttp,
}

impl TraceExporterKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "grpc" | "otlp_grpc" | "otlp-grpc" => Some(Self::OtlpGrpc),
            "http" | "otlp_http" | "otlp-http" => Some(Self::OtlpHttp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OtlpGrpc => "otlp_grpc",
            Self::OtlpHttp => "otlp_http",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::OtlpGrpc => DEFAULT_OTEL_TRACE_GRPC_ENDPOINT,
            Self::OtlpHttp => DEFAULT_OTEL_TRACE_HTTP_ENDPOINT,
        }
    }
}

pub fn build_trace_exporter(sink: &TraceSinkConfig) -> Result<SpanExporter, String> {
    let built = match sink.kind {
        TraceExporterKind::OtlpGrpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(sink.endpoint.clone())
            .with_timeout(sink.timeout)
            .build(),
        TraceExporterKind::OtlpHttp => SpanExporter::builder()
            .with_http()
            .with_endpoint(sink.endpoint.clone())
            .with_timeout(sink.timeout)
            .with_protocol(Protocol::HttpBinary)
            .build(),
    };
    built.map_err(|error| {
        format!(
            "failed to initialize OTLP trace exporter (kind={}, endpoint={}): {error}",
            sink.kind.as_str(),
            sink.endpoint
        )
    })
}
