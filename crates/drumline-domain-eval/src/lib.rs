pub mod judge;
pub mod scoreboard;

pub use judge::*;
pub use scoreboard::*;
