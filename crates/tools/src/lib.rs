pub mod rng;
pub mod sim;

pub use rng::*;
pub use sim::*;
