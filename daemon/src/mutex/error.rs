//! Error taxonomy for the mutex protocol: configuration errors are
//! reported synchronously; everything else is either a callback-visible
//! transient, or silently discarded and optionally logged.

use meshlock_common::error::ReaderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MutexError {
    /// `add_peer` host portion didn't resolve to an IPv4 address.
    #[error("peer address does not resolve to an IPv4 address: {0}")]
    UnresolvableAddress(String),

    /// `add_peer` called with an identity already present in the peer table.
    #[error("peer already present in the table: {0}")]
    DuplicatePeer(String),

    /// Two peers (including us) share the same identity tuple. The protocol
    /// requires identities to be unique to make the tiebreak total.
    #[error("identity collision: {0} is already in use")]
    IdentityCollision(String),

    /// `add_peer` called while state != AVAILABLE (spec §9 open question,
    /// resolved: reject rather than silently corrupt grant tracking).
    #[error("cannot add a peer while the lock is not AVAILABLE")]
    NotAvailable,

    /// A wire message failed to decode.
    #[error("malformed message: {0}")]
    Decode(#[from] ReaderError),
}

pub type MutexResult<T> = Result<T, MutexError>;
