//! Single-flight request queue.
//!
//! When a response says the request's credentials are stale (a `401` by
//! default), the [`RequestQueue`] starts one recovery action (e.g. a token
//! refresh) and parks the request. Every other request that hits the same
//! condition while that recovery runs is parked too, without starting a
//! second one. When the recovery settles:
//!
//! - on success, each parked request is sent through the rest of the chain
//!   again (once per retry, bounded by the retry budget);
//! - on failure, each parked request fails with [`Error::RecoveryFailed`].
//!
//! ```text
//!            needs recovery, no episode running
//!   Idle ───────────────────────────────────────▶ RecoveryInFlight
//!    ▲                                                   │
//!    └───────────── settle(success) drains waiters ──────┘
//! ```
//!
//! The queue state belongs to the [`RequestQueue`] value. Clones share it;
//! two queues built separately never do. Installing one queue in several
//! chains makes its single-flight guarantee span all of them.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::chain::{BoxFuture, Context, Interceptor, Next};
use crate::{Error, Request, Response, Result};

/// Default number of retries per request.
pub const DEFAULT_RETRY_BUDGET: u32 = 1;

type BypassFn = Arc<dyn Fn(&Request<Bytes>) -> bool + Send + Sync>;
type TriggerFn = Arc<dyn Fn(&TriggerInfo<'_>) -> bool + Send + Sync>;
type RecoverFn = Arc<dyn Fn(Settle) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A request and the response it received, used to decide whether recovery
/// must run.
#[derive(Debug, Clone, Copy)]
pub struct TriggerInfo<'a> {
    /// The request as it was sent.
    pub request: &'a Request<Bytes>,
    /// The response it got.
    pub response: &'a Response<Bytes>,
}

/// Phase of a [`RequestQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No recovery running.
    Idle,
    /// A recovery action runs; triggering requests wait for its outcome.
    RecoveryInFlight,
}

#[derive(Debug)]
struct QueueState {
    phase: Phase,
    waiters: BTreeMap<u64, oneshot::Sender<bool>>,
    next_waiter: u64,
    episodes: u64,
}

struct Shared {
    should_bypass: Option<BypassFn>,
    needs_recovery: TriggerFn,
    recover: RecoverFn,
    retry_budget: u32,
    debug: bool,
    state: Mutex<QueueState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_bypassed(&self, request: &Request<Bytes>) -> bool {
        request.meta().is_protected()
            || self
                .should_bypass
                .as_ref()
                .is_some_and(|bypass| bypass(request))
    }

    /// Park the caller; returns the episode number if this call started one.
    fn enqueue(self: &Arc<Self>) -> (Waiter, Option<u64>) {
        let mut state = self.lock();
        let id = state.next_waiter;
        state.next_waiter += 1;

        let (sender, receiver) = oneshot::channel();
        state.waiters.insert(id, sender);

        let started = if state.phase == Phase::Idle {
            state.phase = Phase::RecoveryInFlight;
            state.episodes += 1;
            Some(state.episodes)
        } else {
            None
        };

        let waiter = Waiter {
            id,
            receiver,
            shared: Arc::clone(self),
        };
        (waiter, started)
    }

    fn start_recovery(self: &Arc<Self>, episode: u64) {
        let slot = Arc::new(SettleSlot {
            shared: Arc::clone(self),
            fired: AtomicBool::new(false),
            episode,
        });
        let settle = Settle {
            slot: Arc::clone(&slot),
        };
        let recover = Arc::clone(&self.recover);

        if self.debug {
            debug!(episode, "starting recovery");
        }

        // Detached so that cancelling the triggering request cannot stop it.
        tokio::spawn(async move {
            if let Err(err) = recover(settle).await {
                if slot.shared.debug {
                    debug!(episode, error = %err, "recovery action failed");
                }
                slot.fire(false);
            }
        });
    }

    fn settle(&self, episode: u64, success: bool) {
        let waiters = {
            let mut state = self.lock();
            state.phase = Phase::Idle;
            std::mem::take(&mut state.waiters)
        };

        if self.debug {
            debug!(episode, success, waiters = waiters.len(), "recovery settled");
        }

        for sender in waiters.into_values() {
            // The waiter may have been cancelled in the meantime.
            let _ = sender.send(success);
        }
    }

    async fn handle(
        self: &Arc<Self>,
        mut request: Request<Bytes>,
        next: Next<'_>,
    ) -> Result<Response<Bytes>> {
        loop {
            let response = next.run(request.clone()).await?;

            if self.is_bypassed(&request) || request.meta().retries() >= self.retry_budget {
                return Ok(response);
            }

            let trigger = TriggerInfo {
                request: &request,
                response: &response,
            };
            if !(self.needs_recovery)(&trigger) {
                return Ok(response);
            }

            let (waiter, started) = self.enqueue();
            if self.debug {
                debug!(
                    url = %request.url(),
                    status = response.status(),
                    retries = request.meta().retries(),
                    "request waiting for recovery"
                );
            }
            if let Some(episode) = started {
                self.start_recovery(episode);
            }

            drop(response);
            if !waiter.outcome().await {
                return Err(Error::RecoveryFailed);
            }

            let retries = request.meta_mut().record_retry();
            if self.debug {
                debug!(url = %request.url(), retries, "retrying after recovery");
            }
        }
    }
}

/// A parked request. Dropping it before settlement leaves the queue.
struct Waiter {
    id: u64,
    receiver: oneshot::Receiver<bool>,
    shared: Arc<Shared>,
}

impl Waiter {
    async fn outcome(mut self) -> bool {
        (&mut self.receiver).await.unwrap_or(false)
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let removed = self.shared.lock().waiters.remove(&self.id).is_some();
        if removed && self.shared.debug {
            debug!(waiter = self.id, "waiter left the queue before settlement");
        }
    }
}

struct SettleSlot {
    shared: Arc<Shared>,
    fired: AtomicBool,
    episode: u64,
}

impl SettleSlot {
    fn fire(&self, success: bool) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.shared.settle(self.episode, success);
        }
    }
}

/// Resolver for one recovery episode.
///
/// The recovery action receives it and reports the outcome exactly once by
/// consuming it. If it is dropped unresolved, if the recovery future returns
/// an error, or if the recovery panics, the episode settles as a failure.
///
/// The handle may be moved elsewhere (another task, a UI callback) to settle
/// the episode later; the queued requests keep waiting until it does.
#[must_use = "dropping a Settle fails the recovery episode"]
pub struct Settle {
    slot: Arc<SettleSlot>,
}

impl Settle {
    /// Report the outcome of the episode.
    pub fn resolve(self, success: bool) {
        self.slot.fire(success);
    }

    /// Report success: waiting requests are retried.
    pub fn success(self) {
        self.resolve(true);
    }

    /// Report failure: waiting requests fail with [`Error::RecoveryFailed`].
    pub fn failure(self) {
        self.resolve(false);
    }

    /// Sequence number of the episode, starting at 1.
    #[must_use]
    pub fn episode(&self) -> u64 {
        self.slot.episode
    }
}

impl Drop for Settle {
    fn drop(&mut self) {
        self.slot.fire(false);
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("episode", &self.slot.episode)
            .field("settled", &self.slot.fired.load(Ordering::Acquire))
            .finish()
    }
}

/// Interceptor coordinating single-flight recovery.
///
/// # Example
///
/// ```ignore
/// use tollgate::middleware::RequestQueue;
///
/// let queue = RequestQueue::builder()
///     .should_bypass(|request| request.url().path() == "/auth/refresh")
///     .recover_with(move || {
///         let tokens = tokens.clone();
///         async move { tokens.refresh().await.is_ok() }
///     })
///     .build();
/// ```
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl RequestQueue {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> RequestQueueBuilder {
        RequestQueueBuilder::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Number of requests currently waiting on a recovery.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    /// Number of recovery episodes started so far.
    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.shared.lock().episodes
    }

    /// Maximum retries per request.
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        self.shared.retry_budget
    }
}

impl Interceptor for RequestQueue {
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        _ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        Box::pin(self.shared.handle(request, next))
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("RequestQueue")
            .field("phase", &state.phase)
            .field("waiting", &state.waiters.len())
            .field("episodes", &state.episodes)
            .field("retry_budget", &self.shared.retry_budget)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestQueue`].
pub struct RequestQueueBuilder {
    should_bypass: Option<BypassFn>,
    needs_recovery: Option<TriggerFn>,
    recover: Option<RecoverFn>,
    retry_budget: u32,
    debug: bool,
}

impl Default for RequestQueueBuilder {
    fn default() -> Self {
        Self {
            should_bypass: None,
            needs_recovery: None,
            recover: None,
            retry_budget: DEFAULT_RETRY_BUDGET,
            debug: false,
        }
    }
}

impl RequestQueueBuilder {
    /// Requests for which `predicate` returns `true` never wait on, nor
    /// start, a recovery. Use it to exclude the recovery's own requests.
    #[must_use]
    pub fn should_bypass<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> bool + Send + Sync + 'static,
    {
        self.should_bypass = Some(Arc::new(predicate));
        self
    }

    /// Decide whether a response requires recovery.
    ///
    /// Defaults to "status is 401".
    #[must_use]
    pub fn needs_recovery<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TriggerInfo<'_>) -> bool + Send + Sync + 'static,
    {
        self.needs_recovery = Some(Arc::new(predicate));
        self
    }

    /// Recovery action reporting through a [`Settle`] handle.
    ///
    /// Returning `Err` without having settled fails the episode.
    #[must_use]
    pub fn recover<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(Settle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.recover = Some(Arc::new(
            move |settle: Settle| -> BoxFuture<'static, Result<()>> { Box::pin(action(settle)) },
        ));
        self
    }

    /// Recovery action returning its outcome directly.
    #[must_use]
    pub fn recover_with<F, Fut>(self, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.recover(move |settle| {
            let outcome = action();
            async move {
                settle.resolve(outcome.await);
                Ok(())
            }
        })
    }

    /// Maximum retries per request (default 1).
    #[must_use]
    pub const fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Emit `debug!` events for every queue transition.
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Build the queue.
    ///
    /// Without a recovery action every episode fails.
    #[must_use]
    pub fn build(self) -> RequestQueue {
        let recover = self.recover.unwrap_or_else(|| {
            warn!("request queue built without a recovery action");
            Arc::new(fail_recovery)
        });
        let needs_recovery = self
            .needs_recovery
            .unwrap_or_else(|| Arc::new(is_unauthorized));

        RequestQueue {
            shared: Arc::new(Shared {
                should_bypass: self.should_bypass,
                needs_recovery,
                recover,
                retry_budget: self.retry_budget,
                debug: self.debug,
                state: Mutex::new(QueueState {
                    phase: Phase::Idle,
                    waiters: BTreeMap::new(),
                    next_waiter: 0,
                    episodes: 0,
                }),
            }),
        }
    }
}

fn is_unauthorized(trigger: &TriggerInfo<'_>) -> bool {
    trigger.response.is_unauthorized()
}

fn fail_recovery(settle: Settle) -> BoxFuture<'static, Result<()>> {
    settle.failure();
    Box::pin(async { Ok(()) })
}

impl fmt::Debug for RequestQueueBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueueBuilder")
            .field("should_bypass", &self.should_bypass.is_some())
            .field("needs_recovery", &self.needs_recovery.is_some())
            .field("recover", &self.recover.is_some())
            .field("retry_budget", &self.retry_budget)
            .field("debug", &self.debug)
            .finish()
    }
}
