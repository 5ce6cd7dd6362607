//! A distributed mutual-exclusion service: a named lock shared by a fixed
//! set of peer processes. Any peer may request the lock; at most one peer
//! holds it at any instant; when the holder releases, every peer learns of
//! it. The resource the lock protects is external — this module governs
//! only the coordination protocol.
//!
//! ## Message types
//!
//! | Type | ID | Payload |
//! |------|-----|---------|
//! | Request | 0x01 | sender identity |
//! | Grant   | 0x02 | target identity |
//! | Deny    | 0x03 | target identity |
//! | Release | 0x04 | sender identity |
//!
//! ## Local states
//!
//! `AVAILABLE` → `REQUESTING` → `OURS` | `AVAILABLE` (denied), and
//! `AVAILABLE` → `HELD_REMOTELY` → `AVAILABLE` on the matching `Release` or
//! on losing the holder's connection.
//!
//! ## Non-goals
//!
//! No fairness guarantee, no dynamic peer discovery, no membership changes
//! while the lock is contested, no state persisted across restarts, and no
//! detection of a stale holder that crashed while holding the lock — the
//! lock is then lost until every peer restarts. Traffic is O(n²) in peer
//! count; this is sized for small peer sets (tens, not thousands).

pub mod callbacks;
pub mod error;
pub mod identity;
pub mod messages;
pub mod peer;
pub mod state;
pub mod transport;

pub use callbacks::{HolderLost, ReleaseReason};
pub use error::{MutexError, MutexResult};
pub use identity::Identity;
pub use messages::{MutexMessage, NamedMessage};
pub use peer::{PeerRecord, PeerTable};
pub use state::{MutexInstance, State};
pub use transport::{InMemoryTransport, InboundEvent, Network, TcpTransport, Transport};
