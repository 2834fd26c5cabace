mod batch_splitter;
mod event_classifier;
mod identity_resolver;
mod output_packager;
mod room_create;
mod room_event_service;
mod room_message;
mod room_name;
mod room_state;
mod transformer;

pub use batch_splitter::*;
pub use event_classifier::*;
pub use identity_resolver::*;
pub use output_packager::*;
pub use room_event_service::*;
pub use room_message::{build_payload, MessageKind};
pub use transformer::*;
