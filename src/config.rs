//! Tunable parameters, in the spirit of `GossipsubConfig`/
//! `GossipsubConfigBuilder` in the gossipsub protocol crate.

use std::time::Duration;

/// Protocol identifier registered with the substrate.
pub const PROTOCOL_ID: &str = "/multicast/0.0.1";

/// Default validity window of the duplicate-suppression cache.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);

#[derive(Clone, Debug)]
pub struct Config {
    /// Protocol identifier to register with the substrate and to negotiate
    /// on outbound dials.
    pub protocol_id: &'static str,
    /// How long a message identifier is remembered by the duplicate
    /// suppression cache before it may be delivered/forwarded again.
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            protocol_id: PROTOCOL_ID,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder::default()
    }

    pub fn protocol_id(mut self, id: &'static str) -> Self {
        self.config.protocol_id = id;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
