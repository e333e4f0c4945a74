use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// A one-shot broadcast primitive: it is released at most once, and the
/// release is observed by every associated [`Gate`].
///
/// Releasing is idempotent and safe to call concurrently from any number of
/// threads. Exactly one [`release`](Latch::release) call reports that it
/// performed the transition; the rest report a no-op.
///
/// ## Example
///
/// ```
/// use keel_sync::Latch;
///
/// # tokio_test::block_on(async {
/// let latch = Latch::new();
/// let gate = latch.gate();
///
/// tokio::spawn(async move {
///     // Perform some work, then announce it
///     assert!(latch.release());
///
///     // Repeated releases change nothing
///     assert!(!latch.release());
/// });
///
/// gate.opened().await;
/// assert!(gate.is_open());
/// # })
/// ```
#[derive(Debug, Default, Clone)]
pub struct Latch {
    token: CancellationToken,
    released: Arc<AtomicBool>,
}

/// A read-only view of a [`Latch`]: it opens when the latch is
/// [released](Latch::release).
///
/// Gates are cheap to clone. Waiting on a gate never consumes the
/// notification, so all waiters observe it.
#[derive(Debug, Clone)]
pub struct Gate {
    token: CancellationToken,
}

impl Latch {
    /// Returns a brand new, unreleased [`Latch`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new [`Gate`] tied to this latch.
    pub fn gate(&self) -> Gate {
        Gate {
            token: self.token.clone(),
        }
    }

    /// Releases this latch, opening all associated [`Gate`]s.
    ///
    /// Returns `true` only for the single call that actually released the
    /// latch.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.token.cancel();

        true
    }

    /// Reports whether this latch has been released.
    pub fn is_released(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Gate {
    /// Waits until the associated [`Latch`] is released. Completes
    /// immediately if it already is.
    pub async fn opened(&self) {
        self.token.cancelled().await;
    }

    /// Reports whether the associated [`Latch`] has been released.
    pub fn is_open(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns a [`CancellationToken`] that is cancelled together with this
    /// gate. Cancelling the returned token does not affect the gate.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
