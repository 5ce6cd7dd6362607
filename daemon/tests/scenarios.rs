//! Scenario tests from the lock protocol's concrete test plan: single-peer
//! self-grant, uncontested two-peer handoff, simultaneous contention in
//! both tiebreak directions, cancellation mid-request, and holder loss.

use std::cell::RefCell;
use std::rc::Rc;

use meshlockd::mutex::{HolderLost, Identity, InMemoryTransport, MutexInstance, Network, ReleaseReason};

fn identity(ip: u32, port: u16) -> Identity {
    Identity::new(ip, port)
}

fn instance(
    network: &Rc<Network>,
    name: &str,
    ip: u32,
    port: u16,
) -> MutexInstance<InMemoryTransport> {
    let id = identity(ip, port);
    MutexInstance::new(name, id, InMemoryTransport::new(id, network.clone()))
}

fn pump_to_quiescence(instances: &mut [&mut MutexInstance<InMemoryTransport>]) {
    // A handful of rounds is enough for any single-hop message exchange in
    // these scenarios; each round drains everything already queued.
    for _ in 0..4 {
        for instance in instances.iter_mut() {
            instance.pump();
        }
    }
}

#[test]
fn single_peer_self_grant() {
    let network = Network::new();
    let mut a = instance(&network, "lock", 0x0102_0304, 100);

    let granted = Rc::new(RefCell::new(0));
    let g = granted.clone();
    a.on_granted(move || *g.borrow_mut() += 1);

    let released = Rc::new(RefCell::new(0));
    let r = released.clone();
    a.on_released(move |_| *r.borrow_mut() += 1);

    a.request();
    a.pump();
    assert!(a.is_held_locally());
    assert_eq!(*granted.borrow(), 1);

    a.release();
    a.pump();
    assert!(a.is_available());
    assert_eq!(*released.borrow(), 1);
}

#[test]
fn two_peers_uncontested() {
    let network = Network::new();
    let mut a = instance(&network, "lock", 0x0102_0304, 100);
    let mut b = instance(&network, "lock", 0x0506_0708, 200);

    a.add_peer("5.6.7.8:200").unwrap();
    b.add_peer("1.2.3.4:100").unwrap();

    let b_released = Rc::new(RefCell::new(false));
    let br = b_released.clone();
    b.on_released(move |reason| {
        assert_eq!(reason, ReleaseReason::RemoteReleased);
        *br.borrow_mut() = true;
    });

    a.request();
    pump_to_quiescence(&mut [&mut a, &mut b]);

    assert!(a.is_held_locally());
    assert!(b.is_held_remotely());

    a.release();
    pump_to_quiescence(&mut [&mut a, &mut b]);

    assert!(a.is_available());
    assert!(b.is_available());
    assert!(*b_released.borrow());
}

#[test]
fn simultaneous_contention_lower_tuple_wins() {
    let network = Network::new();
    // A has the strictly smaller identity tuple: A wins.
    let mut a = instance(&network, "lock", 0x0102_0304, 100);
    let mut b = instance(&network, "lock", 0x0506_0708, 200);

    a.add_peer("5.6.7.8:200").unwrap();
    b.add_peer("1.2.3.4:100").unwrap();

    let b_denied = Rc::new(RefCell::new(false));
    let bd = b_denied.clone();
    b.on_denied(move || *bd.borrow_mut() = true);

    a.request();
    b.request();
    pump_to_quiescence(&mut [&mut a, &mut b]);

    assert!(a.is_held_locally());
    assert!(b.is_available());
    assert!(*b_denied.borrow());
}

#[test]
fn simultaneous_contention_identities_swapped() {
    let network = Network::new();
    // Same topology, identities swapped: B now has the smaller tuple.
    let mut a = instance(&network, "lock", 0x0506_0708, 200);
    let mut b = instance(&network, "lock", 0x0102_0304, 100);

    a.add_peer("1.2.3.4:100").unwrap();
    b.add_peer("5.6.7.8:200").unwrap();

    a.request();
    b.request();
    pump_to_quiescence(&mut [&mut a, &mut b]);

    assert!(b.is_held_locally());
    assert!(a.is_available());
}

#[test]
fn cancel_during_requesting() {
    let network = Network::new();
    let mut a = instance(&network, "lock", 0x0102_0304, 100);
    let mut b = instance(&network, "lock", 0x0506_0708, 200);

    a.add_peer("5.6.7.8:200").unwrap();
    b.add_peer("1.2.3.4:100").unwrap();

    let a_granted = Rc::new(RefCell::new(0));
    let ag = a_granted.clone();
    a.on_granted(move || *ag.borrow_mut() += 1);

    a.request();
    a.release();
    pump_to_quiescence(&mut [&mut a, &mut b]);

    assert!(a.is_available());
    assert_eq!(*a_granted.borrow(), 0);
}

#[test]
fn peer_loss_while_holder() {
    let network = Network::new();
    let mut a = instance(&network, "lock", 0x0102_0304, 100);
    let mut b = instance(&network, "lock", 0x0506_0708, 200);

    a.add_peer("5.6.7.8:200").unwrap();
    b.add_peer("1.2.3.4:100").unwrap();

    a.request();
    pump_to_quiescence(&mut [&mut a, &mut b]);
    assert!(a.is_held_locally());
    assert!(b.is_held_remotely());

    let lost: Rc<RefCell<Option<HolderLost>>> = Rc::new(RefCell::new(None));
    let l = lost.clone();
    b.on_holder_lost(move |event| *l.borrow_mut() = Some(event));

    network.drop_peer(identity(0x0102_0304, 100));
    b.pump();

    assert!(b.is_available());
    assert_eq!(lost.borrow().unwrap().holder, identity(0x0102_0304, 100));
    // A is unaffected: it never saw the disconnect from its own side here.
    assert!(a.is_held_locally());
}
