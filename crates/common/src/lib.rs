pub mod domain;
pub mod nats;
pub mod telemetry;

pub use domain::*;
pub use nats::*;
pub use telemetry::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEnvelopeProducer;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockIdentityCache;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamConsumer;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockKeyValueBucket;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockPullConsumer;
