pub mod mercator;
pub mod quat;
pub mod vec;

pub use mercator::*;
pub use quat::*;
pub use vec::*;
