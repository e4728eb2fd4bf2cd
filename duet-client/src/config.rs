use duet_core::utils::{
    DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3, DEFAULT_STUN_ADDR_4,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(urls: Vec<String>) -> Self {
        Self {
            urls,
            username: None,
            credential: None,
        }
    }
}

/// ICE configuration handed to every transport the client creates.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl TransportConfig {
    /// Host candidates only. Enough for peers on one machine or LAN.
    pub fn local_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }

    pub fn with_stun(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.ice_servers.push(IceServerConfig::stun(urls));
        }
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(vec![
                DEFAULT_STUN_ADDR.to_owned(),
                DEFAULT_STUN_ADDR_2.to_owned(),
                DEFAULT_STUN_ADDR_3.to_owned(),
                DEFAULT_STUN_ADDR_4.to_owned(),
            ])],
        }
    }
}
