//! Cancellation primitives.
//!
//! - [`CancelController`] - the trigger side, cloneable so any task can cancel.
//! - [`CancelSignal`] - the observer side, handed to every step of a call.
//! - [`CancelableOperation`] - a future plus the controller that aborts it.
//!
//! # Example
//!
//! ```
//! use tollgate_core::{CancelController, CancelableOperation, Error};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let controller = CancelController::new();
//! let operation = CancelableOperation::new(controller, std::future::pending::<tollgate_core::Result<()>>());
//!
//! operation.cancel();
//! assert!(matches!(operation.await, Err(Error::Cancelled)));
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tokio::sync::Notify;

use crate::{Error, Result};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Read-only view of a cancellation request.
///
/// Cheap to clone; all clones observe the same controller.
#[derive(Clone, Default)]
pub struct CancelSignal {
    state: Arc<CancelState>,
}

impl CancelSignal {
    /// A signal with no controller: it never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Returns `true` once the owning controller has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Resolves when the owning controller cancels.
    ///
    /// Resolves immediately if cancellation already happened.
    pub async fn cancelled(&self) {
        let mut notified = pin!(self.state.notify.notified());
        // Register before checking the flag so a concurrent cancel cannot slip between.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Trigger side of a cancellation.
#[derive(Clone, Default)]
pub struct CancelController {
    state: Arc<CancelState>,
}

impl CancelController {
    /// Creates a controller that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal observing this controller.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            state: Arc::clone(&self.state),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::AcqRel) {
            self.state.notify.notify_waiters();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelController")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

type OperationFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// An asynchronous result that can be aborted.
///
/// Await it to get the value. Calling [`cancel`](Self::cancel) while it is
/// still pending drops the inner future (every step derived from it stops at
/// its next suspension point) and the operation resolves to
/// [`Error::Cancelled`]. Cancelling after it settled has no effect.
#[must_use = "operations do nothing unless awaited"]
pub struct CancelableOperation<T> {
    future: OperationFuture<T>,
    controller: CancelController,
}

impl<T: Send + 'static> CancelableOperation<T> {
    /// Wrap `future` so that `controller` can abort it.
    pub fn new<F>(controller: CancelController, future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let signal = controller.signal();
        let future = async move {
            tokio::select! {
                biased;
                () = signal.cancelled() => Err(Error::Cancelled),
                result = future => result,
            }
        };
        Self {
            future: Box::pin(future),
            controller,
        }
    }
}

impl<T> CancelableOperation<T> {
    /// Abort the operation.
    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// Signal observed by every step of this operation.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        self.controller.signal()
    }

    /// A controller clone, to cancel from another task while this one awaits.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelController {
        self.controller.clone()
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.controller.is_cancelled()
    }
}

impl<T> Future for CancelableOperation<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().future.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for CancelableOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelableOperation")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
