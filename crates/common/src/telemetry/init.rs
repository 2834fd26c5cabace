use anyhow::Result;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::{BatchLogProcessor, LoggerProvider},
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::TraceCorrelationProcessor;

const TRACER_NAME: &str = "room-bridge";

/// Settings for [`init_telemetry`].
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "room-bridge".to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Handles kept alive until shutdown so pending spans and logs can be flushed.
pub struct TelemetryProviders {
    pub tracer_provider: TracerProvider,
    pub logger_provider: LoggerProvider,
}

fn json_stdout<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true)
}

fn build_providers(config: &TelemetryConfig) -> Result<TelemetryProviders> {
    let resource = Resource::new(vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        config.service_name.clone(),
    )]);

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();

    let log_exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;
    let batch = BatchLogProcessor::builder(log_exporter, runtime::Tokio).build();
    let logger_provider = LoggerProvider::builder()
        .with_log_processor(TraceCorrelationProcessor::new(batch))
        .with_resource(resource)
        .build();

    Ok(TelemetryProviders {
        tracer_provider,
        logger_provider,
    })
}

/// Install the global subscriber.
///
/// JSON lines always go to stdout. With `otel_enabled`, spans and log events are
/// also exported over OTLP/gRPC and W3C trace context becomes the global
/// propagator, which the NATS middleware relies on to link publish and consume
/// spans. `RUST_LOG` overrides `log_level` when set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_stdout())
            .try_init()?;
        return Ok(None);
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
    let providers = build_providers(config)?;

    let tracer = providers.tracer_provider.tracer(TRACER_NAME);

    // span layer must precede the log bridge so events see the otel context
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(OpenTelemetryTracingBridge::new(&providers.logger_provider))
        .with(json_stdout())
        .try_init()?;

    Ok(Some(providers))
}

/// Flush and close the exporters, if any were started.
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    let Some(providers) = providers else {
        return;
    };
    if let Err(e) = providers.tracer_provider.shutdown() {
        eprintln!("error shutting down tracer provider: {e:?}");
    }
    if let Err(e) = providers.logger_provider.shutdown() {
        eprintln!("error shutting down logger provider: {e:?}");
    }
}
