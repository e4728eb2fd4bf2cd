use clap::Parser;
use duet_core::utils::DEFAULT_RELAY_BIND;
use std::net::SocketAddr;
use std::num::NonZeroUsize;

pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Signaling relay for two-party rooms.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address the relay listens on
    #[arg(long, default_value_t = DEFAULT_RELAY_BIND, env = "DUET_BIND")]
    pub bind: SocketAddr,

    /// Capacity of the membership actor's command queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "DUET_QUEUE")]
    pub queue_capacity: NonZeroUsize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_RELAY_BIND,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
