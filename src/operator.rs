//! Deadline-bounded operations and stream composition over [`Channel`]s.
//!
//! Deadlines are enforced here, never inside the queue: a blocking operator
//! makes repeated bounded attempts, each clipped to the channel's check
//! interval, rechecking the closed state between attempts. Composition
//! operators (`merge`, `map`, `pipe`) run one plain forwarding thread per
//! hop; each hop is an independent pop-then-push, so an item is in exactly
//! one queue at a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

/// Builds a channel. Capacity 0 is a rendezvous channel: a send completes
/// only when paired with a receive.
pub fn make<T: Send + 'static>(capacity: usize) -> Channel<T> {
    Channel::new(capacity)
}

/// Closes the channel. Idempotent; parked operations wake promptly.
pub fn close<T: Send + 'static>(ch: &Channel<T>) {
    ch.close();
}

/// Blocking send bounded by the channel's send deadline (or the implicit
/// one-minute horizon).
///
/// Fails with `Closed` when the channel is closed on entry or becomes
/// closed while waiting, `Timeout` once the deadline passes; the cargo is
/// dropped on failure. Use [`try_send`] to get a refused cargo back.
pub fn send<T: Send + 'static>(ch: &Channel<T>, cargo: T) -> Result<()> {
    let deadline = ch.send_deadline();
    let interval = ch.check_interval();
    let queue = ch.ingress();
    let mut cargo = cargo;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match queue.push_for(cargo, interval.min(remaining), None) {
            Ok(()) => return Ok(()),
            Err(back) => {
                if queue.is_closed() {
                    return Err(ChannelError::Closed);
                }
                if remaining.is_zero() {
                    return Err(ChannelError::Timeout);
                }
                cargo = back;
            }
        }
    }
}

/// Blocking receive bounded by the channel's receive deadline.
///
/// `Closed` is reported only once the receive side is closed and drained;
/// items buffered before a close keep flowing. An item that is ready beats
/// an already-expired deadline.
pub fn recv<T: Send + 'static>(ch: &Channel<T>) -> Result<T> {
    let deadline = ch.receive_deadline();
    let interval = ch.check_interval();
    let queue = ch.egress();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Some(cargo) = queue.pop_for(interval.min(remaining), None) {
            return Ok(cargo);
        }
        if queue.is_closed() {
            // A failed bounded pop on a closed queue means it is drained.
            return Err(ChannelError::Closed);
        }
        if remaining.is_zero() {
            return Err(ChannelError::Timeout);
        }
    }
}

/// Sends a batch in order via [`send`]. Stops at the first failure and
/// returns it: items already sent stay in the channel (no rollback); the
/// failing item and the rest of the batch are dropped.
pub fn multi_send<T: Send + 'static>(ch: &Channel<T>, cargos: Vec<T>) -> Result<()> {
    for cargo in cargos {
        send(ch, cargo)?;
    }
    Ok(())
}

/// Receives at least one item (blocking, deadline-bounded), then greedily
/// drains whatever else is instantaneously available, preserving FIFO
/// order.
pub fn multi_recv<T: Send + 'static>(ch: &Channel<T>) -> Result<Vec<T>> {
    let first = recv(ch)?;
    let mut batch = vec![first];
    while let Some(cargo) = ch.egress().try_pop() {
        batch.push(cargo);
    }
    Ok(batch)
}

/// Non-blocking send. `Err` hands the cargo back: the channel was full,
/// closed, or (rendezvous) had no consumer parked.
pub fn try_send<T: Send + 'static>(ch: &Channel<T>, cargo: T) -> std::result::Result<(), T> {
    ch.ingress().try_push(cargo)
}

/// Non-blocking receive of whatever is instantaneously available.
pub fn try_recv<T: Send + 'static>(ch: &Channel<T>) -> Option<T> {
    ch.egress().try_pop()
}

/// Adjusts the channel's send-side capacity by `delta` and returns a handle
/// over the same backing state; every clone observes the change, including
/// waiters blocked on the old capacity.
///
/// `Closed` when the channel is closed, `InvalidCapacity` when the resize
/// is rejected (negative result, or below the current occupancy).
pub fn expand<T: Send + 'static>(ch: &Channel<T>, delta: isize) -> Result<Channel<T>> {
    if ch.ingress().expand(delta) {
        Ok(ch.clone())
    } else if ch.is_closed() {
        Err(ChannelError::Closed)
    } else {
        Err(ChannelError::InvalidCapacity)
    }
}

/// Fans several source channels into one.
///
/// One forwarding thread per source keeps that source's FIFO order; no
/// order holds across sources. The merged capacity is the sum of the source
/// capacities. The merged channel closes once every source has closed and
/// drained; merging an empty list yields an immediately closed channel.
/// Sources stay open if the merged channel is closed early.
pub fn merge<T: Send + 'static>(sources: &[Channel<T>]) -> Channel<T> {
    let capacity = sources.iter().map(|ch| ch.capacity()).sum();
    let joined = sources.iter().map(|ch| ch.name()).collect::<Vec<_>>().join("+");
    let merged = Channel::with_name(capacity, format!("merge({})", joined));
    if sources.is_empty() {
        merged.close();
        return merged;
    }
    let live = Arc::new(AtomicUsize::new(sources.len()));
    for src in sources {
        let src = src.clone();
        let dst = merged.clone();
        let live = Arc::clone(&live);
        thread::spawn(move || {
            forward(&src, &dst);
            if live.fetch_sub(1, Ordering::AcqRel) == 1 {
                log::trace!("merge into {} complete", dst.name());
                dst.close();
            }
        });
    }
    merged
}

/// A channel fed by applying `f` to every item of `ch`, in order, with the
/// same capacity. It closes once `ch` is closed and drained. Closing the
/// mapped channel early stops the forwarder; the item being transferred at
/// that moment is dropped, and `ch` stays open for other consumers.
pub fn map<T, U, F>(ch: &Channel<T>, mut f: F) -> Channel<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    let out = Channel::with_name(ch.capacity(), format!("map({})", ch.name()));
    let src = ch.clone();
    let dst = out.clone();
    thread::spawn(move || {
        while let Some(cargo) = src.egress().pop(None) {
            if dst.ingress().push(f(cargo), None).is_err() {
                break;
            }
        }
        dst.close();
    });
    out
}

/// Connects `src` to `dst`: a forwarding thread moves every item from
/// `src`'s receive side into `dst`'s send side. The returned channel sends
/// into `src` and receives from `dst`, with its own fresh deadline
/// configuration.
///
/// Closure propagates through the composition. Once `src` closes and
/// drains, the forwarder closes `dst` so receivers observe the usual
/// drain-then-`Closed`; if `dst` closes first, the forwarder closes `src`
/// so senders fail promptly (the one in-flight item is dropped). The pipe
/// assumes it is `dst`'s producer.
pub fn pipe<T: Send + 'static>(src: &Channel<T>, dst: &Channel<T>) -> Channel<T> {
    let name = format!("pipe({},{})", src.name(), dst.name());
    let composed = Channel::from_queues(name, src.ingress().clone(), dst.egress().clone());
    let src = src.clone();
    let dst = dst.clone();
    thread::spawn(move || {
        if forward(&src, &dst) {
            dst.close();
        } else {
            src.close();
        }
        log::trace!("pipe {} -> {} finished", src.name(), dst.name());
    });
    composed
}

/// Receives and hands every item to `f` until the channel closes and
/// drains (clean `Ok`), `f` fails (its error is returned and the loop
/// stops, leaving the rest of the channel untouched), or a receive
/// deadline elapses (`Timeout` converted into `E`).
pub fn for_recv<T, E, F>(ch: &Channel<T>, mut f: F) -> std::result::Result<(), E>
where
    T: Send + 'static,
    E: From<ChannelError>,
    F: FnMut(T) -> std::result::Result<(), E>,
{
    loop {
        match recv(ch) {
            Ok(cargo) => f(cargo)?,
            Err(ChannelError::Closed) => return Ok(()),
            Err(err) => return Err(E::from(err)),
        }
    }
}

/// Moves items from `src`'s receive side into `dst`'s send side until the
/// source is closed and drained (returns `true`) or the destination
/// refuses a push (returns `false`, the refused item dropped).
fn forward<T: Send + 'static>(src: &Channel<T>, dst: &Channel<T>) -> bool {
    while let Some(cargo) = src.egress().pop(None) {
        if dst.ingress().push(cargo, None).is_err() {
            return false;
        }
    }
    true
}
