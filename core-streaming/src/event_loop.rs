//! Reference logical thread.
//!
//! [`EventLoop`] stands in for a script runtime's job queue: every job handed
//! to its [`LoopInvoker`] is queued and later run, in submission order, by
//! whichever thread drives the loop. Hosts with their own call invoker do not
//! need it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{CallInvoker, InvokerJob};
use tokio::sync::mpsc;
use tracing::trace;

/// FIFO job queue driven by its owner.
pub struct EventLoop {
    tx: mpsc::UnboundedSender<InvokerJob>,
    rx: mpsc::UnboundedReceiver<InvokerJob>,
}

/// [`CallInvoker`] feeding an [`EventLoop`].
#[derive(Clone)]
pub struct LoopInvoker {
    tx: mpsc::UnboundedSender<InvokerJob>,
}

impl CallInvoker for LoopInvoker {
    fn invoke_async(&self, job: InvokerJob) {
        if self.tx.send(job).is_err() {
            trace!("Event loop is gone; job dropped");
        }
    }
}

impl EventLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn invoker(&self) -> Arc<dyn CallInvoker> {
        Arc::new(LoopInvoker {
            tx: self.tx.clone(),
        })
    }

    /// Runs every job queued so far, plus any they enqueue. Returns the count.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `fut` completes, then returns its output.
    ///
    /// Queued jobs take priority over polling `fut`, so a settlement delivered
    /// by a job is observed on the next poll.
    pub async fn run_until<F: Future>(&mut self, fut: F) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                Some(job) = self.rx.recv() => job(),
                output = &mut fut => return output,
            }
        }
    }

    /// Keeps running jobs for `duration`.
    pub async fn run_for(&mut self, duration: Duration) -> usize {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let mut ran = 0;
        loop {
            tokio::select! {
                biased;
                Some(job) = self.rx.recv() => {
                    job();
                    ran += 1;
                }
                _ = &mut deadline => return ran + self.run_until_idle(),
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
