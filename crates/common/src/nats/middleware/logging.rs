use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use super::types::{ConsumeRequest, ConsumeResponse, PublishRequest, PublishResponse};
use tower::{Layer, Service};
use tracing::{error, info, Instrument, Span};

type BoxedResult<R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send>>;

/// Logs every publish with its subject, size and latency
#[derive(Clone, Default)]
pub struct NatsPublishLoggingLayer;

impl NatsPublishLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NatsPublishLoggingLayer {
    type Service = NatsPublishLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsPublishLoggingService { inner: service }
    }
}

#[derive(Clone)]
pub struct NatsPublishLoggingService<S> {
    inner: S,
}

impl<S> Service<PublishRequest> for NatsPublishLoggingService<S>
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

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let subject = req.subject.clone();
        let payload_bytes = req.payload.len();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = start.elapsed().as_millis();

                match &result {
                    Ok(_) => info!(
                        subject = %subject,
                        payload_bytes,
                        duration_ms = %duration_ms,
                        "published to {subject} in {duration_ms}ms"
                    ),
                    Err(e) => error!(
                        subject = %subject,
                        payload_bytes,
                        duration_ms = %duration_ms,
                        error = %e,
                        "failed to publish to {subject} in {duration_ms}ms: {e}"
                    ),
                }

                result
            }
            .instrument(Span::current()),
        )
    }
}

/// Logs every consumed message with its ack/nak outcome
#[derive(Clone, Default)]
pub struct NatsConsumeLoggingLayer;

impl NatsConsumeLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NatsConsumeLoggingLayer {
    type Service = NatsConsumeLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsConsumeLoggingService { inner: service }
    }
}

#[derive(Clone)]
pub struct NatsConsumeLoggingService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for NatsConsumeLoggingService<S>
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
        let subject = req.subject.clone();
        let payload_bytes = req.payload.len();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = start.elapsed().as_millis();

                match &result {
                    Ok(response) => {
                        let outcome = response.outcome();
                        info!(
                            subject = %subject,
                            payload_bytes,
                            outcome = %outcome,
                            duration_ms = %duration_ms,
                            "consumed from {subject} in {duration_ms}ms [{outcome}]"
                        );
                    }
                    Err(e) => error!(
                        subject = %subject,
                        payload_bytes,
                        duration_ms = %duration_ms,
                        error = %e,
                        "failed to consume from {subject} in {duration_ms}ms: {e}"
                    ),
                }

                result
            }
            .instrument(Span::current()),
        )
    }
}
