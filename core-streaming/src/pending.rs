//! Future returned by asynchronous façade operations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::StreamError;

pub(crate) type Settlement<T> = oneshot::Sender<Result<T, StreamError>>;

/// The pending result of one asynchronous operation.
///
/// Resolves exactly once, on the logical thread, with the operation's outcome.
/// If the settlement is never delivered (the façade was torn down first, or the
/// invoker discarded the job) it resolves to [`StreamError::Detached`].
#[must_use = "operations settle asynchronously; await or poll the result"]
#[derive(Debug)]
pub struct PendingOperation<T> {
    rx: oneshot::Receiver<Result<T, StreamError>>,
}

impl<T> PendingOperation<T> {
    pub(crate) fn channel() -> (Settlement<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, PendingOperation { rx })
    }

    /// An operation that has already settled with `result`.
    pub fn settled(result: Result<T, StreamError>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(result);
        pending
    }

    /// Checks for a settlement without blocking.
    ///
    /// Returns `None` while the operation is still in flight. Once this has
    /// returned `Some`, the outcome has been consumed and later calls report
    /// [`StreamError::Detached`].
    pub fn try_settled(&mut self) -> Option<Result<T, StreamError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(StreamError::Detached)),
        }
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = Result<T, StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(StreamError::Detached)),
            Poll::Pending => Poll::Pending,
        }
    }
}
