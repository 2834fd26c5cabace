pub mod domain;
pub mod nats;
pub mod room_bridge_worker;

pub use domain::*;
pub use nats::*;
pub use room_bridge_worker::*;
