mod client;
mod key_value;
mod kv_identity_cache;
mod middleware;
mod tower_consumer;
mod trace_context;
mod traits;

pub use client::*;
pub use key_value::*;
pub use kv_identity_cache::*;
pub use middleware::*;
pub use tower_consumer::*;
pub use trace_context::*;
pub use traits::*;
