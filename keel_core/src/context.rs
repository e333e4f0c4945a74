use crate::PanicReport;
use crate::signal::{SignalListener, TerminationSignal};
use futures::FutureExt;
use keel_sync::{Gate, Latch};
use std::future::Future;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// The execution context of one application run.
///
/// The context starts out alive and can be [shut down](AppContext::shutdown)
/// exactly once; repeated shutdown requests are no-ops. It is also possible to
/// shut it down automatically when an OS [termination signal] is
/// [intercepted](AppContext::listening).
///
/// Every unit of concurrent work ("worker") started through the context is
/// tracked, so that the owner can [wait](AppContext::workers_finished) for all
/// of them to finish without knowing how many there are. Cancellation is
/// cooperative: shutting down never aborts a worker, each worker is expected
/// to observe the [notification](AppContext::terminated) and return.
///
/// The context is cheap to clone, and all clones share the same state.
///
/// [termination signal]: TerminationSignal
///
/// ## Example
///
/// ```rust
/// use keel_core::AppContext;
///
/// #[tokio::main]
/// async fn main() {
///     let ctx = AppContext::new();
///
///     // Start a worker that cleans up after shutdown
///     let worker_ctx = ctx.clone();
///     ctx.start_worker(async move {
///         worker_ctx.terminated().await;
///
///         // Perform some cleanup...
///     });
///
///     // Shut down manually
///     ctx.shutdown();
///
///     // Wait for the cleanup to complete
///     ctx.workers_finished().await;
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    latch: Latch,
    abandon: Latch,
    tracker: TaskTracker,
    listening: AtomicBool,
    faults: AtomicUsize,
}

impl AppContext {
    /// Creates a fresh, alive context with no workers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppContext {
    /// Requests the shutdown of this context, waking every task that
    /// [waits](AppContext::terminated) on it.
    ///
    /// Safe to call any number of times from any thread. Returns `true` only
    /// for the one call that actually performed the shutdown.
    pub fn shutdown(&self) -> bool {
        if !self.inner.latch.release() {
            return false;
        }

        info!("Shutting down application context");

        true
    }

    /// Reports whether a shutdown has been requested. Once this returns
    /// `true`, it keeps returning `true`.
    ///
    /// Not suitable for waiting; use [`AppContext::terminated`] for that.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.latch.is_released()
    }

    /// Waits until a shutdown is requested. Completes immediately if it
    /// already has been.
    pub async fn terminated(&self) {
        self.inner.latch.gate().opened().await;
    }

    /// Returns a [`Gate`] that opens on shutdown. Any number of gates may be
    /// awaited concurrently; none of them consumes the notification.
    pub fn done(&self) -> Gate {
        self.inner.latch.gate()
    }

    /// Returns a [`CancellationToken`] that is cancelled on shutdown.
    /// Cancelling the returned token does not shut down this context.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.latch.gate().child_token()
    }
}

impl AppContext {
    /// Gives up on the workers that are still running: shuts this context
    /// down and wakes every task that [waits](AppContext::abandoned) for
    /// that decision. The workers themselves are left alone; it is up to the
    /// owner to stop waiting for them.
    ///
    /// Returns `true` only for the one call that actually abandoned them.
    pub fn abandon(&self) -> bool {
        self.shutdown();

        self.inner.abandon.release()
    }

    /// Reports whether the running workers have been abandoned.
    pub fn is_abandoned(&self) -> bool {
        self.inner.abandon.is_released()
    }

    /// Waits until the running workers are abandoned.
    pub async fn abandoned(&self) {
        self.inner.abandon.gate().opened().await;
    }
}

impl AppContext {
    /// Starts the given future as a tracked worker and returns immediately.
    ///
    /// The worker leaves the tracked set when the future completes, on every
    /// exit path. A panic inside the future is caught at the worker boundary:
    /// it is counted as a [fault](AppContext::faults), logged, and shuts down
    /// this context.
    ///
    /// ## Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start_worker<F>(&self, worker: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ctx = self.clone();

        self.inner.tracker.spawn(async move {
            if let Err(payload) = AssertUnwindSafe(worker).catch_unwind().await {
                ctx.record_fault(PanicReport::describe_payload(payload.as_ref()));
            }
        })
    }

    /// Starts the given closure as a tracked worker on a dedicated blocking
    /// thread, and returns immediately. Otherwise identical to
    /// [`AppContext::start_worker`].
    ///
    /// ## Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start_blocking_worker<F>(&self, worker: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let ctx = self.clone();

        self.inner.tracker.spawn_blocking(move || {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(worker)) {
                ctx.record_fault(PanicReport::describe_payload(payload.as_ref()));
            }
        })
    }

    /// Waits until every worker started so far, and every worker they start
    /// in turn, has finished. Completes immediately when there are none.
    ///
    /// There is no timeout: a worker that never returns stalls this future
    /// forever.
    pub async fn workers_finished(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// The number of workers that are currently running.
    pub fn workers(&self) -> usize {
        self.inner.tracker.len()
    }

    /// The number of workers that ended in a panic.
    pub fn faults(&self) -> usize {
        self.inner.faults.load(Ordering::Acquire)
    }

    fn record_fault(&self, reason: String) {
        self.inner.faults.fetch_add(1, Ordering::AcqRel);

        error!(%reason, "Worker panicked; shutting down");

        self.shutdown();
    }
}

impl AppContext {
    /// Subscribes to the given OS termination signals (the
    /// [defaults](TerminationSignal::DEFAULTS) when empty) and starts watching
    /// them in the background. The first intercepted signal shuts this
    /// context down.
    ///
    /// After a shutdown, the watcher keeps the subscriptions until all
    /// workers have finished, so that a second signal is never swallowed
    /// before the workers observed the first. A repeated signal in that
    /// window [abandons](AppContext::abandon) the remaining workers. Once the
    /// workers are done, the subscriptions are released.
    ///
    /// Subscribing replaces the default OS behavior for these signals for the
    /// remainder of the process. Repeated calls produce no additional effect.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listening(&self, signals: &[TerminationSignal]) -> io::Result<()> {
        if self.inner.listening.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let listener = match SignalListener::subscribe(signals) {
            Ok(listener) => listener,
            Err(error) => {
                self.inner.listening.store(false, Ordering::Release);
                return Err(error);
            }
        };

        tokio::spawn(self.clone().watch(listener));

        Ok(())
    }

    async fn watch(self, mut listener: SignalListener) {
        tokio::select! {
            biased;
            _ = self.terminated() => {}
            signal = listener.recv() => {
                info!(%signal, "Termination signal intercepted");
                self.shutdown();
            }
        }

        tokio::select! {
            biased;
            _ = self.workers_finished() => {}
            signal = listener.recv() => {
                warn!(
                    %signal,
                    workers = self.workers(),
                    "Repeated termination signal intercepted; abandoning workers",
                );
                self.abandon();
            }
        }

        drop(listener);
    }
}
