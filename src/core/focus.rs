//! Exclusive focus arbitration.
//!
//! At most one registered contender holds focus at any time. An explicit
//! [`take`](FocusArbitrator::take) always wins regardless of priority; priority
//! only decides who is promoted automatically when the holder lets go
//! (highest priority, then earliest registration).
//!
//! Focus-gated work reads the holder latched at the start of the update pass
//! ([`FocusArbitrator::latch`]), so a change made by a callback is only seen
//! from the next pass on.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::ids::{ContenderId, Priority};

/// Notification delivered to a contender's listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusNotice {
    /// The contender now holds focus.
    Gained,
    /// The contender lost focus.
    Lost,
}

/// Callback told about focus changes of one contender.
pub type FocusListener = Box<dyn FnMut(FocusNotice) + Send>;

/// Audit record of a focus change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusEvent {
    /// Focus granted to a contender while the slot was empty.
    Granted {
        /// New holder.
        contender: ContenderId,
    },
    /// Focus moved from one contender to another by explicit request.
    Transferred {
        /// Previous holder.
        from: ContenderId,
        /// New holder.
        to: ContenderId,
    },
    /// Holder gave up focus.
    Released {
        /// Previous holder.
        contender: ContenderId,
    },
    /// Focus handed automatically to the best remaining contender.
    Promoted {
        /// New holder.
        contender: ContenderId,
    },
}

struct Contender {
    id: ContenderId,
    priority: Priority,
    seq: u64,
    listener: Option<Arc<Mutex<FocusListener>>>,
}

/// Audit entries kept by [`FocusArbitrator::new`].
pub const DEFAULT_AUDIT_CAPACITY: usize = 256;

struct FocusState {
    contenders: Vec<Contender>,
    holder: Option<ContenderId>,
    /// Holder as of the start of the current update pass.
    latched: Option<ContenderId>,
    next_seq: u64,
    events: VecDeque<FocusEvent>,
    audit_capacity: usize,
}

impl FocusState {
    fn new(audit_capacity: usize) -> Self {
        Self {
            contenders: Vec::new(),
            holder: None,
            latched: None,
            next_seq: 0,
            events: VecDeque::with_capacity(audit_capacity.min(1024)),
            audit_capacity,
        }
    }

    fn find(&self, id: ContenderId) -> Option<&Contender> {
        self.contenders.iter().find(|c| c.id == id)
    }

    fn listener(&self, id: ContenderId) -> Option<Arc<Mutex<FocusListener>>> {
        self.find(id).and_then(|c| c.listener.clone())
    }

    /// Highest priority, then earliest registration.
    fn successor(&self, excluding: ContenderId) -> Option<ContenderId> {
        self.contenders
            .iter()
            .filter(|c| c.id != excluding)
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|c| c.id)
    }

    fn record(&mut self, event: FocusEvent) {
        tracing::debug!("focus: {:?}", event);
        if self.audit_capacity == 0 {
            return;
        }
        if self.events.len() >= self.audit_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

fn notify(listener: Option<Arc<Mutex<FocusListener>>>, notice: FocusNotice) {
    if let Some(listener) = listener {
        if let Some(mut listener) = listener.try_lock() {
            (&mut **listener)(notice);
        } else {
            tracing::warn!("focus listener re-entered; {:?} dropped", notice);
        }
    }
}

/// Owner of the single focus slot.
///
/// Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct FocusArbitrator {
    state: Arc<Mutex<FocusState>>,
}

impl Default for FocusArbitrator {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusArbitrator {
    /// Create an arbitrator with no contenders, keeping the last
    /// [`DEFAULT_AUDIT_CAPACITY`] focus events.
    pub fn new() -> Self {
        Self::with_audit_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Create an arbitrator keeping at most `capacity` focus events; older
    /// events are dropped first. Zero keeps none.
    pub fn with_audit_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FocusState::new(capacity))),
        }
    }

    /// Whether both handles share one focus slot.
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Register a contender. Re-registering an id only updates its priority.
    pub fn register(&self, id: ContenderId, priority: Priority) {
        self.insert(id, priority, None);
    }

    /// Register a contender that is told when it gains or loses focus.
    pub fn register_with_listener(&self, id: ContenderId, priority: Priority, listener: FocusListener) {
        self.insert(id, priority, Some(Arc::new(Mutex::new(listener))));
    }

    fn insert(&self, id: ContenderId, priority: Priority, listener: Option<Arc<Mutex<FocusListener>>>) {
        let mut state = self.state.lock();
        if let Some(existing) = state.contenders.iter_mut().find(|c| c.id == id) {
            existing.priority = priority;
            if listener.is_some() {
                existing.listener = listener;
            }
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.contenders.push(Contender {
            id,
            priority,
            seq,
            listener,
        });
    }

    /// Remove a contender. If it holds focus, focus is released first and
    /// handed to the best remaining contender.
    pub fn unregister(&self, id: ContenderId) {
        self.release(id);
        let mut state = self.state.lock();
        state.contenders.retain(|c| c.id != id);
    }

    /// Give focus to `id` unconditionally.
    ///
    /// The previous holder is told it lost focus before `id` is marked as the
    /// holder. Taking focus you already hold does nothing.
    pub fn take(&self, id: ContenderId) -> Result<(), SchedulerError> {
        let (previous, previous_listener) = {
            let mut state = self.state.lock();
            if state.find(id).is_none() {
                tracing::warn!("{} tried to take focus without registering", id);
                return Err(SchedulerError::UnregisteredContender(id.to_string()));
            }
            if state.holder == Some(id) {
                return Ok(());
            }
            let previous = state.holder.take();
            let listener = previous.and_then(|p| state.listener(p));
            (previous, listener)
        };
        notify(previous_listener, FocusNotice::Lost);

        let listener = {
            let mut state = self.state.lock();
            if state.find(id).is_none() {
                return Err(SchedulerError::UnregisteredContender(id.to_string()));
            }
            if let Some(current) = state.holder {
                // The displaced holder's listener took focus again; that
                // later take stands.
                if current != id {
                    tracing::warn!("take by {} superseded by {} during hand-off", id, current);
                }
                return Ok(());
            }
            state.holder = Some(id);
            let event = previous.map_or(FocusEvent::Granted { contender: id }, |from| {
                FocusEvent::Transferred { from, to: id }
            });
            state.record(event);
            state.listener(id)
        };
        notify(listener, FocusNotice::Gained);
        Ok(())
    }

    /// Give up focus held by `id`; does nothing if `id` is not the holder.
    ///
    /// Returns whether focus was released.
    pub fn release(&self, id: ContenderId) -> bool {
        let listener = {
            let mut state = self.state.lock();
            if state.holder != Some(id) {
                return false;
            }
            state.holder = None;
            state.record(FocusEvent::Released { contender: id });
            state.listener(id)
        };
        notify(listener, FocusNotice::Lost);

        let promoted = {
            let mut state = self.state.lock();
            if state.holder.is_some() {
                // The releaser's listener already handed focus on.
                return true;
            }
            state.successor(id).map(|next| {
                state.holder = Some(next);
                state.record(FocusEvent::Promoted { contender: next });
                state.listener(next)
            })
        };
        if let Some(listener) = promoted {
            notify(listener, FocusNotice::Gained);
        }
        true
    }

    /// Current holder.
    pub fn holder(&self) -> Option<ContenderId> {
        self.state.lock().holder
    }

    /// Whether `id` holds focus.
    pub fn has_focus(&self, id: ContenderId) -> bool {
        self.holder() == Some(id)
    }

    /// Whether `id` is registered.
    pub fn is_registered(&self, id: ContenderId) -> bool {
        self.state.lock().find(id).is_some()
    }

    /// Number of registered contenders.
    pub fn contender_count(&self) -> usize {
        self.state.lock().contenders.len()
    }

    /// Retained focus changes, oldest first.
    pub fn events(&self) -> Vec<FocusEvent> {
        self.state.lock().events.iter().copied().collect()
    }

    /// Record the current holder as the one seen by focus-gated jobs until
    /// the next latch. Called at the start of every update pass.
    pub fn latch(&self) {
        let mut state = self.state.lock();
        state.latched = state.holder;
    }

    /// Whether `id` held focus when the current update pass started.
    pub fn held_at_latch(&self, id: ContenderId) -> bool {
        self.state.lock().latched == Some(id)
    }
}

/// A standalone focus contender bound to an arbitrator.
///
/// Registration happens on construction; [`dispose`](Self::dispose) must be
/// called explicitly to withdraw.
pub struct FocusTarget {
    id: ContenderId,
    priority: Priority,
    arbitrator: FocusArbitrator,
}

impl FocusTarget {
    /// Register a new contender with `arbitrator`.
    pub fn new(arbitrator: &FocusArbitrator, priority: Priority) -> Self {
        let id = ContenderId::new();
        arbitrator.register(id, priority);
        Self {
            id,
            priority,
            arbitrator: arbitrator.clone(),
        }
    }

    /// Register a new contender that is told about focus changes.
    pub fn with_listener(arbitrator: &FocusArbitrator, priority: Priority, listener: FocusListener) -> Self {
        let id = ContenderId::new();
        arbitrator.register_with_listener(id, priority, listener);
        Self {
            id,
            priority,
            arbitrator: arbitrator.clone(),
        }
    }

    /// Contender identity.
    pub const fn id(&self) -> ContenderId {
        self.id
    }

    /// Priority used for automatic promotion.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether this target holds focus.
    pub fn has_focus(&self) -> bool {
        self.arbitrator.has_focus(self.id)
    }

    /// Take focus from whoever holds it.
    pub fn take_focus(&self) -> Result<(), SchedulerError> {
        self.arbitrator.take(self.id)
    }

    /// Give up focus if held.
    pub fn yield_focus(&self) {
        self.arbitrator.release(self.id);
    }

    /// Withdraw from arbitration, releasing focus if held.
    pub fn dispose(&self) {
        self.arbitrator.unregister(self.id);
    }
}
