use async_nats::HeaderMap;
use bytes::Bytes;

/// Outbound message travelling down the publisher stack.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub subject: String,
    pub payload: Bytes,
    /// Trace context is injected here by the tracing layer
    pub headers: HeaderMap,
}

impl PublishRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug)]
pub struct PublishResponse {
    pub subject: String,
}

/// Inbound message, owned so it can cross Tower layers freely.
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub subject: String,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
        }
    }
}

/// Whether the consumed message is settled or handed back for redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    Ack,
    Nak(Option<String>),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn nak(reason: impl Into<String>) -> Self {
        Self::Nak(Some(reason.into()))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nak(_) => "nak",
        }
    }
}
