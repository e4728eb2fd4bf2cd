mod media_gate;
mod media_source;
mod synthetic_source;

pub use media_gate::*;
pub use media_source::*;
pub use synthetic_source::*;
