mod config;
mod error;
mod lifecycle;
mod registry;
mod room;
mod signaling;

pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use registry::*;
pub use room::*;
pub use signaling::*;
