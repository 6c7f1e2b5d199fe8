pub mod canvas;
pub mod config;
pub mod quality;
pub mod sampler;
pub mod scanline;
pub mod stride;
pub mod tile_source;
pub mod viewport;

pub use canvas::*;
pub use config::*;
pub use quality::*;
pub use sampler::*;
pub use scanline::*;
pub use stride::*;
pub use tile_source::*;
pub use viewport::*;
