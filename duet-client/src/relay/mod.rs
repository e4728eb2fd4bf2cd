mod ws_relay;

pub use ws_relay::*;
