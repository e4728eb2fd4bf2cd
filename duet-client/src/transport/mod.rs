mod rtc_transport;
mod transport_engine;
mod transport_event;

pub use rtc_transport::*;
pub use transport_engine::*;
pub use transport_event::*;
