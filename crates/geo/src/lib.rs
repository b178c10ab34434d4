pub mod bounds;
pub mod point;
pub mod time;

// Geo crate: small, well-tested geographic and time primitives only.
pub use bounds::*;
pub use point::*;
pub use time::*;
