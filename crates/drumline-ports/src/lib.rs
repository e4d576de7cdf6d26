pub mod midi;
pub mod sink;
pub mod storage;
pub mod types;

pub use midi::*;
pub use sink::*;
pub use storage::*;
pub use types::*;
