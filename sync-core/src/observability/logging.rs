use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Log lines go to stderr so stdout stays free for the run output. Spans are
/// exported over OTLP only when an endpoint is given; a failing exporter is
/// reported and skipped rather than aborting the job.
pub fn init_tracing(
    service_name: &str,
    log_level: &str,
    log_json: bool,
    otlp_endpoint: Option<&str>,
) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let telemetry = otlp_endpoint.and_then(|endpoint| {
        let otlp_exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(otlp_exporter)
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", service_name.to_string()),
            ])))
            .install_batch(runtime::Tokio)
        {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                eprintln!(
                    "Failed to initialize OTLP tracer for '{}' at endpoint '{}': {}",
                    service_name, endpoint, e
                );
                None
            }
        }
    });

    let json_layer = log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .json()
            .flatten_event(true)
    });
    let text_layer = (!log_json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Flush pending spans. Call once before the process exits.
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
