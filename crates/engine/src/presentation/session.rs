use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

static SESSION_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

pub(crate) fn lock_recovering<'a, T>(
    mutex: &'a Mutex<T>,
    operation: &'static str,
) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            if SESSION_LOCK_POISON_WARNED
                .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                warn!(operation, "session lock poisoned; recovered inner value");
            }
            poisoned.into_inner()
        }
    }
}

/// Process-wide state shared by every scene for the lifetime of one session.
///
/// Cloning is cheap and every clone observes the same state. Tests build a
/// fresh context each instead of touching globals.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    guard: TransitionGuard,
    handoff: SpawnHandoff,
    movement: MovementGate,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    pub fn handoff(&self) -> &SpawnHandoff {
        &self.handoff
    }

    pub fn movement(&self) -> &MovementGate {
        &self.movement
    }
}

/// "A scene transition is in flight." At most one holder exists at a time.
#[derive(Debug, Clone, Default)]
pub struct TransitionGuard {
    held: Arc<AtomicBool>,
}

impl TransitionGuard {
    pub fn try_acquire(&self, holder: &str) -> Option<TransitionLease> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!(holder, "transition_guard_acquired");
        Some(TransitionLease {
            held: Arc::clone(&self.held),
            holder: holder.to_string(),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the transition guard when dropped, on every exit path.
#[derive(Debug)]
pub struct TransitionLease {
    held: Arc<AtomicBool>,
    holder: String,
}

impl TransitionLease {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for TransitionLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
        debug!(holder = self.holder.as_str(), "transition_guard_released");
    }
}

/// Identifier of the entry point a relocated player should appear at after the
/// next scene load. Written by whoever starts the load, consumed once by the
/// matching entry point.
#[derive(Debug, Clone, Default)]
pub struct SpawnHandoff {
    pending: Arc<Mutex<Option<String>>>,
}

impl SpawnHandoff {
    pub fn write(&self, id: &str) {
        let mut pending = lock_recovering(&self.pending, "handoff_write");
        if let Some(previous) = pending.as_deref() {
            if previous != id {
                warn!(previous, next = id, "spawn_handoff_overwritten");
            }
        }
        *pending = Some(id.to_string());
    }

    pub fn consume_if_matches(&self, candidate: &str) -> bool {
        let mut pending = lock_recovering(&self.pending, "handoff_consume");
        if pending.as_deref() == Some(candidate) {
            *pending = None;
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> Option<String> {
        lock_recovering(&self.pending, "handoff_read").clone()
    }
}

/// Counted toggle for player movement. Movement is enabled while no lock is held.
#[derive(Debug, Clone, Default)]
pub struct MovementGate {
    locks: Arc<AtomicUsize>,
}

impl MovementGate {
    pub fn lock(&self, reason: &'static str) -> MovementLock {
        let previous = self.locks.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            debug!(reason, "player_movement_disabled");
        }
        MovementLock {
            locks: Arc::clone(&self.locks),
            reason,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.locks.load(Ordering::Acquire) == 0
    }
}

#[derive(Debug)]
pub struct MovementLock {
    locks: Arc<AtomicUsize>,
    reason: &'static str,
}

impl Drop for MovementLock {
    fn drop(&mut self) {
        if self.locks.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!(reason = self.reason, "player_movement_enabled");
        }
    }
}
