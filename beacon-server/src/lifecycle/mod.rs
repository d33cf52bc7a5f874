mod coordinator;
mod sweeper;

pub use coordinator::*;
pub(crate) use sweeper::spawn_sweeper;
