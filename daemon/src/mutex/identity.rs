//! Peer identity and the tiebreak order used to resolve simultaneous requests.

use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use super::error::{MutexError, MutexResult};

/// A peer's coordination identity: its IPv4 address and port, compared as
/// the unsigned tuple `(ip, port)`.
///
/// This is deliberately *not* the transport handle: handles may rotate on
/// reconnect, but the identity tuple is what the protocol tiebreaks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    ip: u32,
    port: u16,
}

impl Identity {
    pub fn new(ip: u32, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> u32 {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve `"host:port"` to an identity. Rejects anything that doesn't
    /// resolve to at least one IPv4 address.
    pub fn resolve(addr: &str) -> MutexResult<Self> {
        let mut candidates = addr
            .to_socket_addrs()
            .map_err(|_| MutexError::UnresolvableAddress(addr.to_string()))?;

        let resolved = candidates
            .find(|s| s.is_ipv4())
            .ok_or_else(|| MutexError::UnresolvableAddress(addr.to_string()))?;

        Ok(Self::from(resolved))
    }
}

impl From<SocketAddr> for Identity {
    fn from(addr: SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(v4) => Self::new(u32::from(v4), addr.port()),
            IpAddr::V6(_) => unreachable!("Identity::from only called with IPv4 addresses"),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octets = self.ip.to_be_bytes();
        write!(
            f,
            "{}.{}.{}.{}:{}",
            octets[0], octets[1], octets[2], octets[3], self.port
        )
    }
}
