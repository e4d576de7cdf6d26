pub mod app;
pub mod clock;
pub mod ipc;
pub mod playback_engine;
pub mod playback_params;
pub mod scheduler;
pub mod transport;

pub use app::*;
pub use clock::*;
pub use ipc::*;
pub use playback_engine::*;
pub use playback_params::*;
pub use scheduler::*;
pub use transport::*;
