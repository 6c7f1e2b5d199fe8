pub mod config;
pub mod dataset;
pub mod error;
pub mod job;
pub mod queue;
pub mod scheduler;
pub mod tile_cache;
pub mod transport;

pub use config::*;
pub use dataset::*;
pub use error::*;
pub use job::*;
pub use queue::*;
pub use scheduler::*;
pub use tile_cache::*;
pub use transport::*;
