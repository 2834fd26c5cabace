use opentelemetry::logs::{AnyValue, LogRecord as _};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{InstrumentationScope, Key};
use opentelemetry_sdk::logs::{LogProcessor, LogRecord, LogResult};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Log processor that copies the active trace and span ids onto each record as
/// plain attributes before handing it to `inner`, so log backends can correlate
/// without derived fields.
#[derive(Debug)]
pub struct TraceCorrelationProcessor<P: LogProcessor> {
    inner: P,
}

impl<P: LogProcessor> TraceCorrelationProcessor<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

fn active_trace_ids(record: &LogRecord) -> Option<(String, String)> {
    if let Some(tc) = record.trace_context.as_ref() {
        return Some((tc.trace_id.to_string(), tc.span_id.to_string()));
    }

    let context = tracing::Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    span_context.is_valid().then(|| {
        (
            span_context.trace_id().to_string(),
            span_context.span_id().to_string(),
        )
    })
}

impl<P: LogProcessor> LogProcessor for TraceCorrelationProcessor<P> {
    fn emit(&self, record: &mut LogRecord, instrumentation: &InstrumentationScope) {
        if let Some((trace_id, span_id)) = active_trace_ids(record) {
            record.add_attribute(Key::new("trace_id"), AnyValue::String(trace_id.into()));
            record.add_attribute(Key::new("span_id"), AnyValue::String(span_id.into()));
        }
        self.inner.emit(record, instrumentation);
    }

    fn force_flush(&self) -> LogResult<()> {
        self.inner.force_flush()
    }

    fn shutdown(&self) -> LogResult<()> {
        self.inner.shutdown()
    }

    fn set_resource(&self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}
