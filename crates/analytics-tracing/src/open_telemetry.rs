use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_opentelemetry::OpenTelemetryLayer;

const SERVICE_NAME: &str = "image-caption-service";

/// Span export over OTLP/gRPC, only when `OPENTELEMETRY_OTLP_GRPC_ENDPOINT` is set.
pub(crate) fn init_otel_layer<S>() -> Option<OpenTelemetryLayer<S, sdktrace::Tracer>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let endpoint = std::env::var("OPENTELEMETRY_OTLP_GRPC_ENDPOINT").ok()?;

    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let otlp_config = sdktrace::config().with_resource(Resource::new(vec![
        opentelemetry::KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            SERVICE_NAME,
        ),
    ]));

    let tracer = match opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(otlp_config)
        .install_batch(runtime::Tokio)
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to create OpenTelemetry tracer with otlp exporter: {}", e);
            return None;
        }
    };

    Some(tracing_opentelemetry::layer::<S>().with_tracer(tracer))
}
