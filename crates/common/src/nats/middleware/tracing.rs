use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::types::{ConsumeRequest, ConsumeResponse, PublishRequest, PublishResponse};
use crate::nats::trace_context::{extract_trace_context, inject_trace_context};
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

type BoxedResult<R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send>>;

/// Names the operation on the spans a tracing layer opens
#[derive(Clone, Debug, Default)]
pub struct NatsTracingConfig {
    pub operation_name: String,
}

impl NatsTracingConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
        }
    }
}

fn record_status<R, E: std::fmt::Display>(result: &Result<R, E>) {
    match result {
        Ok(_) => {
            Span::current().record("otel.status_code", "OK");
        }
        Err(e) => {
            Span::current().record("otel.status_code", "ERROR");
            tracing::error!(error = %e, "nats operation failed");
        }
    }
}

/// Opens a producer span per publish and propagates it through the message headers
#[derive(Clone)]
pub struct NatsPublishTracingLayer {
    config: NatsTracingConfig,
}

impl NatsPublishTracingLayer {
    pub fn new(config: NatsTracingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for NatsPublishTracingLayer {
    type Service = NatsPublishTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsPublishTracingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NatsPublishTracingService<S> {
    inner: S,
    config: NatsTracingConfig,
}

impl<S> Service<PublishRequest> for NatsPublishTracingService<S>
where
    S: Service<PublishRequest, Response = PublishResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxedResult<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: PublishRequest) -> Self::Future {
        let span = info_span!(
            target: "nats",
            "nats_publish",
            otel.name = %format!("{} publish", self.config.operation_name),
            otel.kind = "producer",
            messaging.system = "nats",
            messaging.operation = "publish",
            messaging.destination.name = %req.subject,
            messaging.message.body.size = req.payload.len(),
            otel.status_code = field::Empty,
        );

        // Headers carry the publish span, not its parent
        {
            let _entered = span.enter();
            inject_trace_context(&mut req.headers);
        }

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let result = inner.call(req).await;
                record_status(&result);
                result
            }
            .instrument(span),
        )
    }
}

/// Opens a consumer span per message, parented on the publisher's trace context
#[derive(Clone)]
pub struct NatsConsumeTracingLayer {
    config: NatsTracingConfig,
}

impl NatsConsumeTracingLayer {
    pub fn new(config: NatsTracingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for NatsConsumeTracingLayer {
    type Service = NatsConsumeTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeTracingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NatsConsumeTracingService<S> {
    inner: S,
    config: NatsTracingConfig,
}

impl<S> Service<ConsumeRequest> for NatsConsumeTracingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxedResult<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let span = info_span!(
            target: "nats",
            "nats_consume",
            otel.name = %format!("{} process", self.config.operation_name),
            otel.kind = "consumer",
            messaging.system = "nats",
            messaging.operation = "process",
            messaging.destination.name = %req.subject,
            messaging.message.body.size = req.payload.len(),
            otel.status_code = field::Empty,
        );

        if let Some(headers) = &req.headers {
            span.set_parent(extract_trace_context(headers));
        }

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let result = inner.call(req).await;
                record_status(&result);
                result
            }
            .instrument(span),
        )
    }
}
