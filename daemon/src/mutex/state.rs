//! The lock state machine (spec §3-§4): the ~40% state-machine share plus
//! the dispatch/pump loop, wired together as one `MutexInstance`.

use strum::Display;

use super::callbacks::{CallbackRegistry, HolderLost, ReleaseReason};
use super::error::{MutexError, MutexResult};
use super::identity::Identity;
use super::messages::{MutexMessage, NamedMessage};
use super::peer::PeerTable;
use super::transport::{InboundEvent, Transport};

/// Local lock state (spec §3). Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Available,
    Requesting,
    Ours,
    HeldRemotely,
}

/// One peer's local representative of the distributed lock. Owns its state,
/// peer table, and callback lists; driven entirely through `request`,
/// `release`, `add_peer` and `pump` from a single thread of dispatch
/// (spec §5 — no internal thread, no suspension points).
pub struct MutexInstance<T: Transport> {
    name: String,
    identity: Identity,
    state: State,
    peers: PeerTable,
    /// Recorded while HELD_REMOTELY: the peer we granted to.
    holder: Option<Identity>,
    /// Count of peers that have granted the current REQUESTING episode.
    grant_count: usize,
    transport: T,
    callbacks: CallbackRegistry,
    // Queued by dispatch/request/release, fired in `fire_scheduled` at the
    // end of `pump` — never from inside `request`/`release` directly.
    scheduled_grants: u32,
    scheduled_denies: u32,
    scheduled_releases: Vec<ReleaseReason>,
    scheduled_holder_lost: Vec<HolderLost>,
}

impl<T: Transport> MutexInstance<T> {
    pub fn new(name: impl Into<String>, identity: Identity, transport: T) -> Self {
        Self {
            name: name.into(),
            identity,
            state: State::Available,
            peers: PeerTable::new(),
            holder: None,
            grant_count: 0,
            transport,
            callbacks: CallbackRegistry::new(),
            scheduled_grants: 0,
            scheduled_denies: 0,
            scheduled_releases: Vec::new(),
            scheduled_holder_lost: Vec::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == State::Available
    }

    pub fn is_held_locally(&self) -> bool {
        self.state == State::Ours
    }

    pub fn is_held_remotely(&self) -> bool {
        self.state == State::HeldRemotely
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn on_granted(&mut self, cb: impl FnMut() + 'static) {
        self.callbacks.on_granted(cb);
    }

    pub fn on_denied(&mut self, cb: impl FnMut() + 'static) {
        self.callbacks.on_denied(cb);
    }

    pub fn on_released(&mut self, cb: impl FnMut(ReleaseReason) + 'static) {
        self.callbacks.on_released(cb);
    }

    pub fn on_holder_lost(&mut self, cb: impl FnMut(HolderLost) + 'static) {
        self.callbacks.on_holder_lost(cb);
    }

    /// Append a peer. Rejected unless AVAILABLE (spec §9 open question,
    /// resolved in favor of rejecting rather than silently corrupting
    /// in-flight grant tracking).
    pub fn add_peer(&mut self, addr: &str) -> MutexResult<()> {
        if self.state != State::Available {
            return Err(MutexError::NotAvailable);
        }
        let identity = Identity::resolve(addr)?;
        self.peers.add(identity, self.identity)
    }

    fn send_to(&mut self, peer: Identity, message: MutexMessage) {
        self.transport.send(
            peer,
            NamedMessage {
                mutex_name: self.name.clone(),
                message,
            },
        );
    }

    fn broadcast(&mut self, message: MutexMessage) {
        let peers: Vec<Identity> = self.peers.identities().collect();
        for peer in peers {
            self.send_to(peer, message);
        }
    }

    /// Request the lock (spec §4.1). Non-blocking; effects land on the next
    /// `pump` (the DENIED callback for an immediate rejection is scheduled
    /// here but, per §4.4, only fired during `pump`).
    pub fn request(&mut self) {
        match self.state {
            State::Available => {
                self.peers.reset_grants();
                self.grant_count = 0;
                if self.peers.is_empty() {
                    // No peers to wait on: the grant counter trivially
                    // matches the peer count (spec §8, invariant 5).
                    self.state = State::Ours;
                    self.scheduled_grants += 1;
                } else {
                    self.state = State::Requesting;
                    self.broadcast(MutexMessage::request(self.identity));
                }
            }
            _ => self.scheduled_denies += 1,
        }
    }

    /// Release the lock, or cancel a pending request (spec §4.1).
    pub fn release(&mut self) {
        match self.state {
            State::Ours => {
                self.state = State::Available;
                self.broadcast(MutexMessage::release(self.identity));
                self.scheduled_releases.push(ReleaseReason::Ours);
            }
            State::Requesting => {
                self.state = State::Available;
                self.scheduled_denies += 1;
            }
            _ => {}
        }
    }

    /// Drain inbound messages, dispatch each, then fire whatever callbacks
    /// were scheduled — synchronously, in this call, never inside
    /// `request`/`release` (spec §4.4, §4.5).
    pub fn pump(&mut self) {
        let events = self.transport.poll();
        for event in events {
            match event {
                InboundEvent::Message { from, message } => {
                    if message.mutex_name != self.name {
                        continue;
                    }
                    self.dispatch(from, message.message);
                }
                InboundEvent::PeerLost { peer } => self.handle_peer_lost(peer),
            }
        }
        self.fire_scheduled();
    }

    fn dispatch(&mut self, from: Identity, message: MutexMessage) {
        match message {
            MutexMessage::Request(p) => self.handle_request(p.sender),
            MutexMessage::Grant(p) => self.handle_grant(from, p.target),
            MutexMessage::Deny(p) => self.handle_deny(p.target),
            MutexMessage::Release(_) => self.handle_release(),
        }
    }

    fn handle_request(&mut self, sender: Identity) {
        match self.state {
            State::Available => {
                self.state = State::HeldRemotely;
                self.holder = Some(sender);
                self.send_to(sender, MutexMessage::grant(sender));
            }
            State::HeldRemotely | State::Ours => {
                self.send_to(sender, MutexMessage::deny(sender));
            }
            State::Requesting => {
                use std::cmp::Ordering;
                match sender.cmp(&self.identity) {
                    Ordering::Less => {
                        // Sender wins the tiebreak: abandon our request.
                        self.state = State::HeldRemotely;
                        self.holder = Some(sender);
                        self.send_to(sender, MutexMessage::grant(sender));
                        self.scheduled_denies += 1;
                    }
                    Ordering::Greater => {
                        self.send_to(sender, MutexMessage::deny(sender));
                    }
                    Ordering::Equal => {
                        if log::log_enabled!(log::Level::Error) {
                            error!(
                                "identity collision with peer {sender}: two instances share an \
                                 identity tuple, tiebreak cannot be total"
                            );
                        }
                        self.send_to(sender, MutexMessage::deny(sender));
                    }
                }
            }
        }
    }

    fn handle_grant(&mut self, from: Identity, target: Identity) {
        if target != self.identity || self.state != State::Requesting {
            return;
        }
        if let Some(count) = self.peers.mark_granted(from) {
            self.grant_count = count;
            if self.grant_count == self.peers.len() {
                self.state = State::Ours;
                self.scheduled_grants += 1;
            }
        }
    }

    fn handle_deny(&mut self, target: Identity) {
        if target != self.identity || self.state != State::Requesting {
            return;
        }
        self.state = State::Available;
        self.scheduled_denies += 1;
    }

    fn handle_release(&mut self) {
        if self.state == State::HeldRemotely {
            self.state = State::Available;
            self.holder = None;
            self.scheduled_releases.push(ReleaseReason::RemoteReleased);
        } else if log::log_enabled!(log::Level::Debug) {
            debug!("Release received while in state {}: discarded as anomalous", self.state);
        }
    }

    fn handle_peer_lost(&mut self, peer: Identity) {
        match self.state {
            State::Requesting => {
                self.state = State::Available;
                self.scheduled_denies += 1;
            }
            State::HeldRemotely if self.holder == Some(peer) => {
                self.holder = None;
                self.state = State::Available;
                self.scheduled_holder_lost.push(HolderLost { holder: peer });
            }
            State::Ours | State::Available | State::HeldRemotely => {
                self.peers.remove(peer);
            }
        }
    }

    fn fire_scheduled(&mut self) {
        for _ in 0..self.scheduled_grants {
            self.callbacks.fire_granted();
        }
        self.scheduled_grants = 0;

        for _ in 0..self.scheduled_denies {
            self.callbacks.fire_denied();
        }
        self.scheduled_denies = 0;

        for reason in self.scheduled_releases.drain(..) {
            self.callbacks.fire_released(reason);
        }

        for event in self.scheduled_holder_lost.drain(..) {
            self.callbacks.fire_holder_lost(event);
        }
    }
}
