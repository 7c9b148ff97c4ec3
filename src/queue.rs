use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::cancel::{CancelToken, WaitSite};

/// Backing storage. Selected once at construction; `expand` performs the
/// only transitions between the two modes.
enum Store<T> {
    /// Capacity 0: a single hand-off slot, occupied only while a push is
    /// mid rendezvous. The tag names the depositing push, so a waiting
    /// pusher can tell its own deposit from a competitor's after the slot
    /// has been emptied and refilled.
    Rendezvous { slot: Option<(u64, T)> },
    /// Capacity > 0: a FIFO buffer holding at most `capacity` items.
    Buffered { items: VecDeque<T>, capacity: usize },
}

impl<T> Store<T> {
    fn capacity(&self) -> usize {
        match self {
            Store::Rendezvous { .. } => 0,
            Store::Buffered { capacity, .. } => *capacity,
        }
    }

    fn len(&self) -> usize {
        match self {
            Store::Rendezvous { slot } => usize::from(slot.is_some()),
            Store::Buffered { items, .. } => items.len(),
        }
    }

    fn has_room(&self) -> bool {
        match self {
            Store::Rendezvous { slot } => slot.is_none(),
            Store::Buffered { items, capacity } => items.len() < *capacity,
        }
    }
}

struct State<T> {
    store: Store<T>,
    closed: bool,
    /// Consumers currently parked in `pop`. Gates rendezvous `try_push`.
    waiting_pops: usize,
    /// Tag for the next rendezvous deposit. Monotonic over the queue's
    /// lifetime, so it stays unique across capacity changes.
    next_ticket: u64,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T: Send> WaitSite for Shared<T> {
    fn wake_all(&self) {
        // Taking and releasing the state lock serializes this wake with a
        // waiter that has passed its cancel check but not yet parked.
        drop(self.state.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

/// A bounded blocking queue with close-and-drain semantics, cooperative
/// cancellation, and runtime-adjustable capacity.
///
/// Capacity 0 selects rendezvous mode: `push` completes only once a
/// consumer has taken the item, so at most one item is ever in flight.
///
/// Handles are cheap clones over one shared monitor; every method takes
/// `&self`. Blocking calls report failure by value (`Err` hands the item
/// back, `None` means nothing was delivered) rather than through an error
/// type; see the operator layer for deadline-aware error reporting.
pub struct BlockingQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BlockingQueue<T> {
    fn clone(&self) -> Self {
        BlockingQueue { shared: Arc::clone(&self.shared) }
    }
}

impl<T: Send + 'static> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let store = if capacity == 0 {
            Store::Rendezvous { slot: None }
        } else {
            Store::Buffered { items: VecDeque::with_capacity(capacity), capacity }
        };
        BlockingQueue {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    store,
                    closed: false,
                    waiting_pops: 0,
                    next_ticket: 0,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Blocks until the item is stored (buffered) or handed to a consumer
    /// (rendezvous), the queue closes, or `cancel` fires.
    ///
    /// `Err` returns the item: nothing was stored. A fired token fails the
    /// call immediately, even when room is available.
    pub fn push(&self, item: T, cancel: Option<&CancelToken>) -> Result<(), T> {
        self.push_inner(item, cancel, None)
    }

    /// [`push`](Self::push) with a bound on the total time spent waiting.
    pub fn push_for(
        &self,
        item: T,
        timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> Result<(), T> {
        self.push_inner(item, cancel, Some(Instant::now() + timeout))
    }

    /// Blocks until an item is available, the queue is closed and drained,
    /// or `cancel` fires. Items stored before a close are still delivered,
    /// in FIFO order; `None` is definitive only after that drain.
    pub fn pop(&self, cancel: Option<&CancelToken>) -> Option<T> {
        self.pop_inner(cancel, None)
    }

    /// [`pop`](Self::pop) with a bound on the total time spent waiting.
    pub fn pop_for(&self, timeout: Duration, cancel: Option<&CancelToken>) -> Option<T> {
        self.pop_inner(cancel, Some(Instant::now() + timeout))
    }

    fn push_inner(
        &self,
        item: T,
        cancel: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> Result<(), T> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if cancel.map_or(false, |t| t.is_cancelled()) {
            return Err(item);
        }

        // Wait for room: buffer space, or a free slot in rendezvous mode.
        loop {
            if state.closed {
                return Err(item);
            }
            if state.store.has_room() {
                break;
            }
            if !self.park(&shared.not_full, &mut state, cancel, deadline) {
                return Err(item);
            }
        }

        let st = &mut *state;
        let deposit = match &mut st.store {
            Store::Buffered { items, .. } => {
                items.push_back(item);
                None
            }
            Store::Rendezvous { slot } => {
                let ticket = st.next_ticket;
                st.next_ticket += 1;
                *slot = Some((ticket, item));
                Some(ticket)
            }
        };
        shared.not_empty.notify_all();
        let ticket = match deposit {
            Some(ticket) => ticket,
            None => return Ok(()),
        };

        // Rendezvous: hold the call open until a consumer takes the item.
        // Only the deposit carrying our own ticket is still ours to watch;
        // once the slot is empty, promoted away, or holding a competing
        // push's deposit, a consumer has taken our item.
        loop {
            match &state.store {
                Store::Rendezvous { slot: Some((owner, _)) } if *owner == ticket => {}
                _ => return Ok(()),
            }
            let keep_waiting =
                !state.closed && self.park(&shared.not_full, &mut state, cancel, deadline);
            if !keep_waiting {
                // Closed, cancelled, or out of time with our deposit still
                // in the slot: reclaim it so a failed push stores nothing.
                // Reclaiming checks the ticket again, since another push
                // may have refilled the slot while we were being woken.
                if let Store::Rendezvous { slot } = &mut state.store {
                    if slot.as_ref().is_some_and(|(owner, _)| *owner == ticket) {
                        if let Some((_, item)) = slot.take() {
                            shared.not_full.notify_all();
                            return Err(item);
                        }
                    }
                }
                return Ok(());
            }
        }
    }

    fn pop_inner(&self, cancel: Option<&CancelToken>, deadline: Option<Instant>) -> Option<T> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if cancel.map_or(false, |t| t.is_cancelled()) {
            return None;
        }

        loop {
            // Anything already stored is delivered, even after a close.
            let taken = match &mut state.store {
                Store::Rendezvous { slot } => slot.take().map(|(_, item)| item),
                Store::Buffered { items, .. } => items.pop_front(),
            };
            if let Some(item) = taken {
                shared.not_full.notify_all();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state.waiting_pops += 1;
            let keep_waiting = self.park(&shared.not_empty, &mut state, cancel, deadline);
            state.waiting_pops -= 1;
            if !keep_waiting {
                return None;
            }
        }
    }

    /// One sleep on `cond`, bounded by `deadline` if present. Returns
    /// `false` when the wait is abandoned (token fired or deadline passed),
    /// `true` when the caller should recheck its predicate.
    ///
    /// The token registration is attached before the fired check: a cancel
    /// landing after the check then finds the registration and wakes us.
    fn park(
        &self,
        cond: &Condvar,
        state: &mut MutexGuard<'_, State<T>>,
        cancel: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> bool {
        if let Some(tok) = cancel {
            let weak = Arc::downgrade(&self.shared);
            let site: Weak<dyn WaitSite> = weak;
            tok.attach(site);
            if tok.is_cancelled() {
                tok.detach();
                return false;
            }
        }
        let expired = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    true
                } else {
                    cond.wait_for(state, remaining).timed_out()
                }
            }
            None => {
                cond.wait(state);
                false
            }
        };
        if let Some(tok) = cancel {
            tok.detach();
            if tok.is_cancelled() {
                return false;
            }
        }
        !expired
    }

    /// Non-blocking push: one atomic check-and-act under the queue lock.
    ///
    /// In rendezvous mode this succeeds only when a consumer is parked at
    /// deposit time. That consumer's own bounded wait can still give up
    /// first, in which case the deposit stays in the slot for the next
    /// receive.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(item);
        }
        let st = &mut *state;
        match &mut st.store {
            Store::Rendezvous { slot } => {
                if slot.is_some() || st.waiting_pops == 0 {
                    return Err(item);
                }
                let ticket = st.next_ticket;
                st.next_ticket += 1;
                *slot = Some((ticket, item));
            }
            Store::Buffered { items, capacity } => {
                if items.len() >= *capacity {
                    return Err(item);
                }
                items.push_back(item);
            }
        }
        self.shared.not_empty.notify_all();
        Ok(())
    }

    /// Non-blocking pop: takes whatever is instantaneously available,
    /// including a rendezvous deposit still waiting on its pickup.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        let taken = match &mut state.store {
            Store::Rendezvous { slot } => slot.take().map(|(_, item)| item),
            Store::Buffered { items, .. } => items.pop_front(),
        };
        if taken.is_some() {
            self.shared.not_full.notify_all();
        }
        taken
    }

    /// Adjusts capacity by `delta`, waking every waiter on success.
    ///
    /// Rejected (returning `false`) when the queue is closed, the resulting
    /// capacity would be negative, or it would be smaller than the items
    /// currently held. Growing from 0 leaves rendezvous mode; an item mid
    /// hand-off moves to the head of the new buffer and its push completes
    /// as delivered. Shrinking to 0 (possible only when empty) enters
    /// rendezvous mode.
    pub fn expand(&self, delta: isize) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            return false;
        }
        let current = state.store.capacity();
        let next = match (current as isize).checked_add(delta) {
            Some(n) if n >= 0 => n as usize,
            _ => return false,
        };
        if next == current {
            // No state change, but still a broadcast: callers may rely on
            // a successful expand waking waiters.
            self.shared.not_full.notify_all();
            self.shared.not_empty.notify_all();
            return true;
        }
        if state.store.len() > next {
            return false;
        }
        let store = std::mem::replace(&mut state.store, Store::Rendezvous { slot: None });
        state.store = match store {
            Store::Rendezvous { slot } => {
                // next > 0 here: promotion out of rendezvous mode. A
                // deposit mid hand-off sheds its tag and becomes the head
                // of the new buffer; its push completes as delivered.
                let mut items = VecDeque::with_capacity(next);
                if let Some((_, item)) = slot {
                    items.push_back(item);
                }
                Store::Buffered { items, capacity: next }
            }
            Store::Buffered { items, .. } => {
                if next == 0 {
                    // The occupancy check above guarantees items is empty.
                    Store::Rendezvous { slot: None }
                } else {
                    Store::Buffered { items, capacity: next }
                }
            }
        };
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
        true
    }

    /// Closes the queue. Idempotent. Every parked operation wakes: pushes
    /// fail, pops drain what is stored and then fail.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Point-in-time capacity; 0 means rendezvous mode.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().store.capacity()
    }

    /// Point-in-time item count. In rendezvous mode this counts an item
    /// currently mid hand-off (0 or 1).
    pub fn len(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
