//! Admission gate bounding concurrent fingerprint work.
//!
//! # Overview
//!
//! The walker discovers files far faster than they can be hashed. Before
//! launching a worker it calls [`AdmissionGate::acquire`], which blocks
//! while `limit` permits are outstanding. Each worker holds its
//! [`GatePermit`] until it has published its result; dropping the permit
//! frees the slot and wakes one waiter.
//!
//! A limit of zero means unlimited: `acquire` never blocks, but
//! occupancy is still tracked.
//!
//! ```
//! use dupescan::scanner::AdmissionGate;
//!
//! let gate = AdmissionGate::new(2);
//! let a = gate.acquire();
//! let b = gate.acquire();
//! assert!(gate.try_acquire().is_none());
//! drop(a);
//! assert!(gate.try_acquire().is_some());
//! # drop(b);
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct GateState {
    in_flight: usize,
    peak: usize,
}

/// Blocking counting semaphore with a high-water mark.
///
/// Shared between the walker (acquiring) and workers (releasing) via `Arc`.
#[derive(Debug)]
pub struct AdmissionGate {
    /// Maximum concurrent permits, 0 for unlimited.
    limit: usize,
    state: Mutex<GateState>,
    cv: Condvar,
}

impl AdmissionGate {
    /// Create a gate with `limit` slots (0 = unlimited).
    #[must_use]
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            state: Mutex::new(GateState::default()),
            cv: Condvar::new(),
        })
    }

    /// Lock state with poison recovery.
    ///
    /// Permits are released from `Drop`, where panicking would abort.
    fn lock_or_recover(&self) -> MutexGuard<'_, GateState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Configured slot count (0 = unlimited).
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the gate never blocks.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    fn has_room(&self, state: &GateState) -> bool {
        self.is_unlimited() || state.in_flight < self.limit
    }

    fn occupy(state: &mut GateState) {
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
    }

    /// Block until a slot is free, then occupy it.
    pub fn acquire(self: &Arc<Self>) -> GatePermit {
        let mut state = self.lock_or_recover();
        while !self.has_room(&state) {
            state = match self.cv.wait(state) {
                Ok(guard) => guard,
                Err(poison) => poison.into_inner(),
            };
        }
        Self::occupy(&mut state);
        drop(state);

        GatePermit {
            gate: Arc::clone(self),
            released: false,
        }
    }

    /// Occupy a slot if one is free right now.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        let mut state = self.lock_or_recover();
        if !self.has_room(&state) {
            return None;
        }
        Self::occupy(&mut state);
        drop(state);

        Some(GatePermit {
            gate: Arc::clone(self),
            released: false,
        })
    }

    fn release(&self) {
        let mut state = self.lock_or_recover();
        debug_assert!(state.in_flight > 0, "gate released more permits than acquired");
        state.in_flight = state.in_flight.saturating_sub(1);
        drop(state);
        self.cv.notify_one();
    }

    /// Permits currently held. A snapshot; may be stale immediately.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_or_recover().in_flight
    }

    /// Highest number of permits ever held at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.lock_or_recover().peak
    }
}

/// One occupied slot of an [`AdmissionGate`]. Released on drop.
#[derive(Debug)]
#[must_use = "dropping a permit immediately releases the slot"]
pub struct GatePermit {
    gate: Arc<AdmissionGate>,
    released: bool,
}

impl GatePermit {
    /// Release the slot explicitly.
    pub fn release(mut self) {
        self.released = true;
        self.gate.release();
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        if !self.released {
            self.gate.release();
        }
    }
}
