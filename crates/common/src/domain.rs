mod communication;
mod envelope;
mod group;
mod identifier;
mod identity_cache;
mod in_memory_identity_cache;
mod reference;
mod result;
mod room_event;

pub use communication::*;
pub use envelope::*;
pub use group::*;
pub use identifier::*;
pub use identity_cache::*;
pub use in_memory_identity_cache::*;
pub use reference::*;
pub use result::*;
pub use room_event::*;
