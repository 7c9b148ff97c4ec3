use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;

/// A monitor that a blocked queue operation can be parked on.
///
/// `wake_all` must acquire and release the monitor's own lock before
/// broadcasting, so a wake raced against a waiter that has checked its
/// cancel flag but not yet parked cannot be lost.
pub(crate) trait WaitSite: Send + Sync {
    fn wake_all(&self);
}

struct TokenState {
    fired: bool,
    site: Option<Weak<dyn WaitSite>>,
}

/// One-shot cooperative cancellation for blocking queue operations.
///
/// A token starts open and moves to fired exactly once; the transition never
/// reverts. While a `push`/`pop` is parked with this token it registers the
/// queue it is waiting on, and [`cancel`](CancelToken::cancel) wakes that
/// queue immediately instead of letting the waiter sleep out its poll.
///
/// A fired token is single-use: any blocking call handed one fails
/// immediately, without waiting, even if the operation could proceed.
pub struct CancelToken {
    inner: Mutex<TokenState>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken { inner: Mutex::new(TokenState { fired: false, site: None }) }
    }

    /// Fires the token and wakes the operation currently parked with it, if
    /// any. Idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        let site = {
            let mut st = self.inner.lock();
            if st.fired {
                return;
            }
            st.fired = true;
            st.site.take()
        };
        // The token lock is released before touching the queue, so the lock
        // order is always queue before token, never both ways.
        if let Some(site) = site.and_then(|w| w.upgrade()) {
            site.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().fired
    }

    /// Registers the monitor the caller is about to park on. Set just before
    /// each wait, cleared right after it returns.
    pub(crate) fn attach(&self, site: Weak<dyn WaitSite>) {
        self.inner.lock().site = Some(site);
    }

    pub(crate) fn detach(&self) {
        self.inner.lock().site = None;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken").field("fired", &self.is_cancelled()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct WakeCounter(AtomicUsize);

    impl WaitSite for WakeCounter {
        fn wake_all(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn starts_open_and_fires_once() {
        let tok = CancelToken::new();
        assert!(!tok.is_cancelled());
        tok.cancel();
        assert!(tok.is_cancelled());
        tok.cancel();
        assert!(tok.is_cancelled());
    }

    fn weak_site(site: &Arc<WakeCounter>) -> Weak<dyn WaitSite> {
        let weak = Arc::downgrade(site);
        weak
    }

    #[test]
    fn cancel_wakes_registered_site_once() {
        let tok = CancelToken::new();
        let site = Arc::new(WakeCounter(AtomicUsize::new(0)));
        tok.attach(weak_site(&site));
        tok.cancel();
        assert_eq!(site.0.load(Ordering::SeqCst), 1);
        // The registration is consumed by the fire.
        tok.cancel();
        assert_eq!(site.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_site_is_not_woken() {
        let tok = CancelToken::new();
        let site = Arc::new(WakeCounter(AtomicUsize::new(0)));
        tok.attach(weak_site(&site));
        tok.detach();
        tok.cancel();
        assert_eq!(site.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_site_is_ignored() {
        let tok = CancelToken::new();
        let site = Arc::new(WakeCounter(AtomicUsize::new(0)));
        tok.attach(weak_site(&site));
        drop(site);
        tok.cancel();
        assert!(tok.is_cancelled());
    }
}
