//! The three callback lists (spec §4.4): granted / denied / released.
//! Callbacks fire synchronously, only during `pump`, in registration order,
//! and never from inside `request`/`release` — this is the one well-defined
//! reentrancy point a caller gets.

use super::identity::Identity;

/// Why a RELEASE callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// We released our own hold.
    Ours,
    /// The peer we'd granted to sent `Release`.
    RemoteReleased,
}

/// A one-shot peer-loss event distinct from a normal release (spec §7, §9):
/// the holder vanished and the lock is permanently lost from our view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolderLost {
    pub holder: Identity,
}

#[derive(Default)]
pub struct CallbackRegistry {
    granted: Vec<Box<dyn FnMut()>>,
    denied: Vec<Box<dyn FnMut()>>,
    released: Vec<Box<dyn FnMut(ReleaseReason)>>,
    holder_lost: Vec<Box<dyn FnMut(HolderLost)>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_granted(&mut self, cb: impl FnMut() + 'static) {
        self.granted.push(Box::new(cb));
    }

    pub fn on_denied(&mut self, cb: impl FnMut() + 'static) {
        self.denied.push(Box::new(cb));
    }

    pub fn on_released(&mut self, cb: impl FnMut(ReleaseReason) + 'static) {
        self.released.push(Box::new(cb));
    }

    pub fn on_holder_lost(&mut self, cb: impl FnMut(HolderLost) + 'static) {
        self.holder_lost.push(Box::new(cb));
    }

    pub(super) fn fire_granted(&mut self) {
        for cb in &mut self.granted {
            cb();
        }
    }

    pub(super) fn fire_denied(&mut self) {
        for cb in &mut self.denied {
            cb();
        }
    }

    pub(super) fn fire_released(&mut self, reason: ReleaseReason) {
        for cb in &mut self.released {
            cb(reason);
        }
    }

    pub(super) fn fire_holder_lost(&mut self, event: HolderLost) {
        for cb in &mut self.holder_lost {
            cb(event);
        }
    }
}
