pub mod completion;
pub mod event_bus;
pub mod pool;

pub use completion::*;
pub use event_bus::*;
pub use pool::*;
