mod relay;

pub use relay::{RelayChannel, RelayEvent};
