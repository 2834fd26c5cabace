mod logging;
mod publisher;
mod tracing;
mod types;

pub use logging::*;
pub use publisher::*;
pub use self::tracing::*;
pub use types::*;
