pub mod debounce;
pub mod rate_limit;
pub mod throttle;

pub use debounce::*;
pub use rate_limit::*;
pub use throttle::*;
