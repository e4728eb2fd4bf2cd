pub use duet_core::model::{MemberId, RoomId};

pub mod model {
    pub use duet_core::model::*;
}

pub mod error {
    pub use duet_core::error::*;
}

pub mod relay {
    pub use duet_core::traits::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use duet_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use duet_client::*;
}
