//! # Callback Bridge
//!
//! Moves continuations from worker, driver and poller threads onto the host's
//! logical thread, and drops them there if the façade has been torn down.
//!
//! ## Liveness
//!
//! [`Liveness`] is owned by the façade. Every continuation carries a
//! [`LivenessToken`], a weak reference to the same flag. The token is checked
//! on the logical thread right before the continuation runs, never at
//! submission time: submission always succeeds, delivery is what may be
//! suppressed. Once revoked the flag never comes back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bridge_traits::CallInvoker;
use tracing::trace;

use crate::error::StreamError;
use crate::pending::Settlement;

#[derive(Debug)]
struct LiveState {
    alive: AtomicBool,
}

/// Owning side of the liveness flag.
#[derive(Debug)]
pub struct Liveness {
    state: Arc<LiveState>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            state: Arc::new(LiveState {
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub fn token(&self) -> LivenessToken {
        LivenessToken {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Marks the owner as gone. Returns `true` only for the call that
    /// actually flipped the flag.
    pub fn revoke(&self) -> bool {
        self.state.alive.swap(false, Ordering::AcqRel)
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak observer of a [`Liveness`] flag.
#[derive(Debug, Clone)]
pub struct LivenessToken {
    state: Weak<LiveState>,
}

impl LivenessToken {
    /// True while the owner exists and has not revoked the flag.
    pub fn is_alive(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.alive.load(Ordering::Acquire))
    }
}

/// Delivers continuations on the logical thread, gated by liveness.
#[derive(Clone)]
pub struct CallbackBridge {
    invoker: Arc<dyn CallInvoker>,
    token: LivenessToken,
}

impl CallbackBridge {
    pub fn new(invoker: Arc<dyn CallInvoker>, token: LivenessToken) -> Self {
        Self { invoker, token }
    }

    /// Schedules `job` on the logical thread. It runs only if the owner is
    /// still alive when the invoker gets to it; otherwise it is dropped
    /// unexecuted.
    pub fn deliver<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        self.invoker.invoke_async(Box::new(move || {
            if token.is_alive() {
                job();
            } else {
                trace!("Continuation dropped after teardown");
            }
        }));
    }

    /// Delivers the single settlement of an operation.
    ///
    /// A suppressed delivery drops `settlement` without sending, which the
    /// waiting [`PendingOperation`](crate::PendingOperation) observes as
    /// [`StreamError::Detached`].
    pub fn settle<T>(&self, settlement: Settlement<T>, result: Result<T, StreamError>)
    where
        T: Send + 'static,
    {
        self.deliver(move || {
            // The receiver may already be gone; nobody is waiting then.
            let _ = settlement.send(result);
        });
    }

    pub fn is_alive(&self) -> bool {
        self.token.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingOperation;
    use bridge_traits::InvokerJob;
    use std::sync::Mutex;

    /// Holds jobs until the test runs them, to force delivery races.
    #[derive(Default)]
    struct DeferredInvoker {
        jobs: Mutex<Vec<InvokerJob>>,
    }

    impl DeferredInvoker {
        fn run_all(&self) -> usize {
            let jobs: Vec<InvokerJob> = self.jobs.lock().unwrap().drain(..).collect();
            let count = jobs.len();
            for job in jobs {
                job();
            }
            count
        }
    }

    impl CallInvoker for DeferredInvoker {
        fn invoke_async(&self, job: InvokerJob) {
            self.jobs.lock().unwrap().push(job);
        }
    }

    #[test]
    fn test_revoke_is_one_way() {
        let liveness = Liveness::new();
        let token = liveness.token();
        assert!(token.is_alive());

        assert!(liveness.revoke());
        assert!(!liveness.revoke());
        assert!(!liveness.is_alive());
        assert!(!token.is_alive());
    }

    #[test]
    fn test_token_dies_with_owner() {
        let liveness = Liveness::new();
        let token = liveness.token();
        drop(liveness);
        assert!(!token.is_alive());
    }

    #[test]
    fn test_delivery_checked_at_run_time() {
        let invoker = Arc::new(DeferredInvoker::default());
        let liveness = Liveness::new();
        let bridge = CallbackBridge::new(invoker.clone(), liveness.token());
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        bridge.deliver(move || flag.store(true, Ordering::SeqCst));

        // Submitted while alive, revoked before the logical thread runs it.
        liveness.revoke();
        assert_eq!(invoker.run_all(), 1);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_settle_while_alive() {
        let invoker = Arc::new(DeferredInvoker::default());
        let liveness = Liveness::new();
        let bridge = CallbackBridge::new(invoker.clone(), liveness.token());

        let (tx, mut pending) = PendingOperation::<usize>::channel();
        bridge.settle(tx, Ok(7));
        assert!(pending.try_settled().is_none());

        invoker.run_all();
        assert_eq!(pending.try_settled(), Some(Ok(7)));
    }

    #[test]
    fn test_settle_after_teardown_detaches() {
        let invoker = Arc::new(DeferredInvoker::default());
        let liveness = Liveness::new();
        let bridge = CallbackBridge::new(invoker.clone(), liveness.token());

        let (tx, mut pending) = PendingOperation::<usize>::channel();
        bridge.settle(tx, Ok(7));
        drop(liveness);
        invoker.run_all();

        assert_eq!(pending.try_settled(), Some(Err(StreamError::Detached)));
    }
}
