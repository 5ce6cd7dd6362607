//! Configuration for the mutex daemon.

use serde::{Deserialize, Serialize};

/// Default port the daemon listens on for peer connections.
pub const DEFAULT_PORT: u16 = 7420;

/// Default mutex name when none is given.
pub const DEFAULT_MUTEX_NAME: &str = "default";

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_mutex_name() -> String {
    DEFAULT_MUTEX_NAME.to_string()
}

/// Configuration for one mutex daemon instance.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name of the mutex this instance coordinates.
    #[clap(name = "mutex-name", long, default_value = DEFAULT_MUTEX_NAME)]
    #[serde(default = "default_mutex_name")]
    pub mutex_name: String,

    /// TCP port this instance listens on.
    #[clap(name = "port", long, default_value_t = default_port())]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address. If not specified, binds to 0.0.0.0.
    #[clap(name = "bind-address", long)]
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Peers to add on startup, as `host:port` strings.
    #[clap(name = "peer", long)]
    #[serde(default)]
    pub peers: Vec<String>,

    /// Address this instance is reachable at, as its peers would dial it.
    /// Required whenever `--bind-address` is left as (or defaults to) the
    /// all-interfaces wildcard, since `0.0.0.0` can't serve as a
    /// coordination identity (spec §7 configuration error).
    #[clap(name = "identity-address", long)]
    #[serde(default)]
    pub identity_address: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mutex_name: DEFAULT_MUTEX_NAME.to_string(),
            port: DEFAULT_PORT,
            bind_address: None,
            peers: Vec::new(),
            identity_address: None,
        }
    }
}

impl NodeConfig {
    pub fn get_bind_address(&self) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", self.port))
    }

    /// The address this instance identifies itself with to peers: the
    /// explicit override if given, otherwise the bind address if it names a
    /// concrete host. `None` if the only candidate is the all-interfaces
    /// wildcard — that can't disambiguate this instance from any other
    /// default-configured instance on the same port.
    pub fn identity_address(&self) -> Option<String> {
        if let Some(addr) = &self.identity_address {
            return Some(addr.clone());
        }
        match &self.bind_address {
            Some(addr) if !addr.starts_with("0.0.0.0") => Some(addr.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_constants() {
        let config = NodeConfig::default();
        assert_eq!(config.mutex_name, DEFAULT_MUTEX_NAME);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.bind_address.is_none());
        assert!(config.peers.is_empty());
    }

    #[test]
    fn get_bind_address_defaults_to_all_interfaces() {
        let config = NodeConfig::default();
        assert_eq!(config.get_bind_address(), "0.0.0.0:7420");
    }

    #[test]
    fn get_bind_address_honors_override() {
        let mut config = NodeConfig::default();
        config.bind_address = Some("127.0.0.1:9000".to_string());
        assert_eq!(config.get_bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn identity_address_is_ambiguous_by_default() {
        let config = NodeConfig::default();
        assert_eq!(config.identity_address(), None);
    }

    #[test]
    fn identity_address_falls_back_to_a_concrete_bind_address() {
        let mut config = NodeConfig::default();
        config.bind_address = Some("192.168.1.5:9000".to_string());
        assert_eq!(config.identity_address().as_deref(), Some("192.168.1.5:9000"));
    }

    #[test]
    fn identity_address_override_wins_over_bind_address() {
        let mut config = NodeConfig::default();
        config.bind_address = Some("0.0.0.0:9000".to_string());
        config.identity_address = Some("203.0.113.7:9000".to_string());
        assert_eq!(config.identity_address().as_deref(), Some("203.0.113.7:9000"));
    }
}
