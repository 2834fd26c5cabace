mod resource_envelope_producer;
mod room_event_consumer_service;

pub use resource_envelope_producer::*;
pub use room_event_consumer_service::*;
