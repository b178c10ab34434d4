pub mod controller;
pub mod filter;
pub mod map_view;

pub use controller::*;
pub use filter::*;
pub use map_view::*;
