//! Asynchronous invocation onto the host's logical thread.

/// A unit of work to run on the logical thread.
pub type InvokerJob = Box<dyn FnOnce() + Send + 'static>;

/// Schedules jobs on the host's single logical execution thread.
///
/// Implementations are supplied by the host (a JS runtime's call invoker, a
/// UI run loop, a test event loop). `invoke_async` must never block and must
/// never run the job inline on the calling thread; jobs submitted from one
/// thread are expected to run in submission order.
pub trait CallInvoker: Send + Sync {
    fn invoke_async(&self, job: InvokerJob);
}
