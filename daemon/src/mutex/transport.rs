//! The transport contract the core consumes (spec §6): reliable, in-order
//! per-peer delivery, a non-blocking drain of inbound events, and a
//! "peer lost" notification. The core never touches a socket directly.
//!
//! Two implementations: `InMemoryTransport`, a test double wiring several
//! in-process instances together without any networking, and `TcpTransport`,
//! a real implementation built the way the discovery server drives its UDP
//! socket (`discovery::server::DiscoveryServer`) — except connection-oriented
//! and TCP, since the wire contract here needs ordered reliable delivery
//! rather than the discovery protocol's own expiry/signature layer.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use meshlock_common::serializer::Serializer;

use super::error::MutexError;
use super::identity::Identity;
use super::messages::NamedMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message { from: Identity, message: NamedMessage },
    PeerLost { peer: Identity },
}

/// Injected capability the core depends on. Every method is non-blocking:
/// `poll` drains whatever has already arrived and returns immediately.
pub trait Transport {
    fn send(&mut self, peer: Identity, message: NamedMessage);

    fn broadcast(&mut self, peers: &[Identity], message: NamedMessage) {
        for &peer in peers {
            self.send(peer, message.clone());
        }
    }

    fn poll(&mut self) -> Vec<InboundEvent>;
}

/// An in-process transport double: several `InMemoryTransport` handles share
/// a `Network` hub and exchange messages without touching a socket. Used by
/// the scenario tests in spec §8 and by anything exercising several mutex
/// instances in one process.
#[derive(Default)]
pub struct Network {
    mailboxes: RefCell<HashMap<Identity, VecDeque<InboundEvent>>>,
}

impl Network {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn deliver(&self, to: Identity, event: InboundEvent) {
        self.mailboxes
            .borrow_mut()
            .entry(to)
            .or_default()
            .push_back(event);
    }

    /// Simulate a connection drop: every other participant gets a
    /// `PeerLost` for `peer`.
    pub fn drop_peer(&self, peer: Identity) {
        let recipients: Vec<Identity> =
            self.mailboxes.borrow().keys().copied().filter(|&id| id != peer).collect();
        for to in recipients {
            self.deliver(to, InboundEvent::PeerLost { peer });
        }
    }
}

pub struct InMemoryTransport {
    identity: Identity,
    network: Rc<Network>,
}

impl InMemoryTransport {
    pub fn new(identity: Identity, network: Rc<Network>) -> Self {
        network.mailboxes.borrow_mut().entry(identity).or_default();
        Self { identity, network }
    }
}

impl Transport for InMemoryTransport {
    fn send(&mut self, peer: Identity, message: NamedMessage) {
        self.network.deliver(
            peer,
            InboundEvent::Message {
                from: self.identity,
                message,
            },
        );
    }

    fn poll(&mut self) -> Vec<InboundEvent> {
        self.network
            .mailboxes
            .borrow_mut()
            .get_mut(&self.identity)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

/// A real TCP transport. Each peer gets one persistent connection; a
/// background task per connection reads length-prefixed `NamedMessage`s and
/// forwards them (or a `PeerLost` on disconnect) onto an unbounded channel
/// that `poll` drains without blocking, keeping the core's single-threaded
/// cooperative model intact while the actual I/O happens off to the side.
pub struct TcpTransport {
    identity: Identity,
    senders: HashMap<Identity, mpsc::UnboundedSender<NamedMessage>>,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    event_tx: mpsc::UnboundedSender<InboundEvent>,
}

impl TcpTransport {
    pub fn new(identity: Identity) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        Self {
            identity,
            senders: HashMap::new(),
            events,
            event_tx,
        }
    }

    /// Start accepting inbound connections on `listener`, spawning a reader
    /// task per connection that feeds this transport's event channel.
    pub async fn listen(&self, listener: TcpListener) -> io::Result<()> {
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        spawn_reader(stream, event_tx.clone());
                    }
                    Err(err) => {
                        if log::log_enabled!(log::Level::Warn) {
                            warn!("failed to accept inbound connection: {err}");
                        }
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// Register an outgoing connection to `peer`, spawning the writer task
    /// that drains an unbounded channel onto the socket and a reader task
    /// that feeds inbound events back to `poll`.
    pub async fn connect(&mut self, peer: Identity, stream: TcpStream) -> io::Result<()> {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel::<NamedMessage>();
        spawn_writer(write_half, rx);
        spawn_reader_for_peer(read_half, peer, self.event_tx.clone());
        self.senders.insert(peer, tx);
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, peer: Identity, message: NamedMessage) {
        if let Some(tx) = self.senders.get(&peer) {
            if tx.send(message).is_err() {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("{}: dropping message to {peer}: writer task gone", self.identity);
                }
                self.senders.remove(&peer);
                // The writer task only dies when its socket half closed; tell
                // the core the same way a failed read would (spec §4.1, §6).
                let _ = self.event_tx.send(InboundEvent::PeerLost { peer });
            }
        } else if log::log_enabled!(log::Level::Debug) {
            debug!(
                "{}: send({peer}) with no open connection; dropped, not queued (no retries)",
                self.identity
            );
        }
    }

    fn poll(&mut self) -> Vec<InboundEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn spawn_writer(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<NamedMessage>,
) {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let bytes = message.to_bytes();
            let len = (bytes.len() as u32).to_be_bytes();
            if write_half.write_all(&len).await.is_err() {
                break;
            }
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });
}

/// What one `read_one` call produced: a decoded message, an orderly or
/// abrupt disconnect, or a payload that violated framing (spec §7's
/// "Fatal" class — the message is dropped, the connection is not).
enum ReadOutcome {
    Message(NamedMessage),
    Disconnected,
    Decode(MutexError),
}

fn spawn_reader_for_peer(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    peer: Identity,
    event_tx: mpsc::UnboundedSender<InboundEvent>,
) {
    tokio::spawn(async move {
        loop {
            match read_one(&mut read_half).await {
                Ok(ReadOutcome::Message(message)) => {
                    let _ = event_tx.send(InboundEvent::Message {
                        from: peer,
                        message,
                    });
                }
                Ok(ReadOutcome::Decode(err)) => {
                    if log::log_enabled!(log::Level::Warn) {
                        warn!("malformed message from {peer}: {err}");
                    }
                }
                Ok(ReadOutcome::Disconnected) | Err(_) => {
                    let _ = event_tx.send(InboundEvent::PeerLost { peer });
                    break;
                }
            }
        }
    });
}

// For freshly-accepted sockets we don't yet know which identity they'll
// claim; the first message on the wire carries the sender identity for
// `Request`/`Release`, or the target identity for `Grant`/`Deny`, so the
// peer identity is recovered from whichever decoded message names it first.
// `Grant`/`Deny` never do (they only name us), so a connection whose sender
// never issues a `Request`/`Release` stays anonymous for its whole lifetime;
// that is logged rather than silently dropped.
fn spawn_reader(stream: TcpStream, event_tx: mpsc::UnboundedSender<InboundEvent>) {
    let (mut read_half, _write_half) = stream.into_split();
    tokio::spawn(async move {
        let mut identity: Option<Identity> = None;
        loop {
            match read_one(&mut read_half).await {
                Ok(ReadOutcome::Message(message)) => {
                    if let Some(sender) = sender_identity(&message) {
                        identity = Some(sender);
                    }
                    match identity {
                        Some(from) => {
                            let _ = event_tx.send(InboundEvent::Message { from, message });
                        }
                        None if log::log_enabled!(log::Level::Warn) => {
                            warn!(
                                "dropping {:?} on an accepted connection whose peer identity \
                                 is still unknown",
                                message.message
                            );
                        }
                        None => {}
                    }
                }
                Ok(ReadOutcome::Decode(err)) => {
                    if log::log_enabled!(log::Level::Warn) {
                        warn!("malformed message on accepted connection: {err}");
                    }
                }
                Ok(ReadOutcome::Disconnected) | Err(_) => {
                    if let Some(peer) = identity {
                        let _ = event_tx.send(InboundEvent::PeerLost { peer });
                    }
                    break;
                }
            }
        }
    });
}

fn sender_identity(message: &NamedMessage) -> Option<Identity> {
    use super::messages::MutexMessage;
    match &message.message {
        MutexMessage::Request(p) | MutexMessage::Release(p) => Some(p.sender),
        MutexMessage::Grant(_) | MutexMessage::Deny(_) => None,
    }
}

async fn read_one(read_half: &mut tokio::net::tcp::OwnedReadHalf) -> io::Result<ReadOutcome> {
    let mut len_buf = [0u8; 4];
    if read_half.read_exact(&mut len_buf).await.is_err() {
        return Ok(ReadOutcome::Disconnected);
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    read_half.read_exact(&mut buf).await?;
    match NamedMessage::from_bytes(&buf) {
        Ok(message) => Ok(ReadOutcome::Message(message)),
        Err(err) => Ok(ReadOutcome::Decode(MutexError::from(err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_transport_delivers_to_mailbox() {
        let network = Network::new();
        let a = Identity::new(1, 100);
        let b = Identity::new(2, 200);
        let mut ta = InMemoryTransport::new(a, network.clone());
        let mut tb = InMemoryTransport::new(b, network.clone());

        ta.send(b, NamedMessage {
            mutex_name: "lock".into(),
            message: super::super::messages::MutexMessage::request(a),
        });

        assert!(ta.poll().is_empty());
        let events = tb.poll();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], InboundEvent::Message { from, .. } if from == a));
    }

    #[test]
    fn drop_peer_notifies_everyone_else() {
        let network = Network::new();
        let a = Identity::new(1, 100);
        let b = Identity::new(2, 200);
        let _ta = InMemoryTransport::new(a, network.clone());
        let mut tb = InMemoryTransport::new(b, network.clone());

        network.drop_peer(a);

        let events = tb.poll();
        assert_eq!(events, vec![InboundEvent::PeerLost { peer: a }]);
    }
}
