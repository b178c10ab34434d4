pub mod memo;
pub mod spatial;
pub mod stats;
pub mod storage;

pub use memo::*;
pub use spatial::*;
pub use stats::*;
pub use storage::*;
