pub mod kit;
pub mod layout;
pub mod measure;
pub mod midi_import;
pub mod model;
pub mod song;
pub mod tempo;

pub use kit::*;
pub use layout::*;
pub use measure::*;
pub use midi_import::*;
pub use model::*;
pub use song::*;
pub use tempo::*;
