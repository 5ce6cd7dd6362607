//! The peer table (spec §4.2): an append-only list of known peers, each with
//! a per-request "has granted" flag. Indexed by position rather than keyed
//! by transport handle, because handles may rotate on reconnect but the
//! table position (and the identity it holds) does not (spec §9).

use super::error::{MutexError, MutexResult};
use super::identity::Identity;

#[derive(Debug, Clone, Copy)]
pub struct PeerRecord {
    pub identity: Identity,
    /// Meaningful only while the owning instance is REQUESTING.
    pub granted_this_request: bool,
}

#[derive(Debug, Default)]
pub struct PeerTable {
    peers: Vec<PeerRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.peers.iter().map(|p| p.identity)
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.peers.iter().any(|p| p.identity == identity)
    }

    /// Append a peer. Rejects duplicates and self-identity collisions.
    pub fn add(&mut self, identity: Identity, my_identity: Identity) -> MutexResult<()> {
        if identity == my_identity {
            return Err(MutexError::IdentityCollision(identity.to_string()));
        }
        if self.contains(identity) {
            return Err(MutexError::DuplicatePeer(identity.to_string()));
        }
        self.peers.push(PeerRecord {
            identity,
            granted_this_request: false,
        });
        Ok(())
    }

    /// Remove a peer whose connection was lost. Returns whether it was
    /// present in the table.
    pub fn remove(&mut self, identity: Identity) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p.identity != identity);
        self.peers.len() != before
    }

    /// Reset every peer's grant flag at the start of a new REQUESTING episode.
    pub fn reset_grants(&mut self) {
        for peer in &mut self.peers {
            peer.granted_this_request = false;
        }
    }

    /// Mark one peer as having granted. Returns the new count of granted
    /// peers, or `None` if the identity isn't in the table.
    pub fn mark_granted(&mut self, identity: Identity) -> Option<usize> {
        let peer = self.peers.iter_mut().find(|p| p.identity == identity)?;
        peer.granted_this_request = true;
        Some(self.peers.iter().filter(|p| p.granted_this_request).count())
    }
}
