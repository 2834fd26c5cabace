mod correlation;
mod init;

pub use correlation::*;
pub use init::*;
