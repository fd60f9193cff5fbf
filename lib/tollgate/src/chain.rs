//! Interceptor chain execution.
//!
//! A [`Chain`] composes an ordered list of [`Interceptor`]s around a terminal
//! [`HttpClient`]. The first interceptor is the outermost: it sees the
//! request first and the response last.
//!
//! ```text
//! execute(request)
//!   └─ interceptor[0] ── next.run ──▶ interceptor[1] ── next.run ──▶ … ──▶ terminal
//!      ◀──────────────── response ──────────────────────────────────────────┘
//! ```
//!
//! Every top-level call gets one [`Context`] holding the call's
//! [`CancelSignal`]. The same context is handed to every interceptor and the
//! terminal call is raced against its signal.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tollgate_core::{CancelController, CancelSignal, CancelableOperation, HttpClient};

use crate::{Error, Request, Response, Result};

/// Boxed, `Send` future used at the interceptor boundary.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-call state shared by every interceptor of one top-level call.
#[derive(Debug, Clone)]
pub struct Context {
    signal: CancelSignal,
}

impl Context {
    /// Creates a context observing `signal`.
    #[must_use]
    pub const fn new(signal: CancelSignal) -> Self {
        Self { signal }
    }

    /// Cancellation signal of the call.
    #[must_use]
    pub const fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Returns `true` if the caller cancelled the call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}

/// A step of the chain.
///
/// An interceptor receives the request, the rest of the chain as [`Next`],
/// and the call [`Context`]. It may rewrite the request before calling
/// [`Next::run`], rewrite the response after it, call `next` several times
/// (retries) or not at all (short-circuit).
///
/// Errors returned by `next` should be propagated unchanged unless the
/// interceptor explicitly handles them.
pub trait Interceptor: Send + Sync + 'static {
    /// Process one request.
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>>;
}

impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        (**self).intercept(request, next, ctx)
    }
}

/// Interceptor built from a closure, see [`interceptor_fn`].
#[derive(Clone)]
pub struct FnInterceptor<F> {
    handler: F,
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor").finish_non_exhaustive()
    }
}

/// Build an [`Interceptor`] from a closure.
///
/// # Example
///
/// ```
/// use tollgate::chain::interceptor_fn;
///
/// let tag = interceptor_fn(|mut request, next, _ctx| {
///     request
///         .headers_mut()
///         .insert("X-Client".to_string(), "tollgate".to_string());
///     Box::pin(async move { next.run(request).await })
/// });
/// ```
pub fn interceptor_fn<F>(handler: F) -> FnInterceptor<F>
where
    F: for<'a> Fn(Request<Bytes>, Next<'a>, &'a Context) -> BoxFuture<'a, Result<Response<Bytes>>>
        + Send
        + Sync
        + 'static,
{
    FnInterceptor { handler }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(Request<Bytes>, Next<'a>, &'a Context) -> BoxFuture<'a, Result<Response<Bytes>>>
        + Send
        + Sync
        + 'static,
{
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        (self.handler)(request, next, ctx)
    }
}

/// Object-safe view of the terminal client.
trait Terminal: Send + Sync {
    fn call<'a>(
        &'a self,
        request: Request<Bytes>,
        signal: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<Response<Bytes>>>;
}

impl<C: HttpClient> Terminal for C {
    fn call<'a>(
        &'a self,
        request: Request<Bytes>,
        signal: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        Box::pin(self.execute_with_signal(request, signal))
    }
}

/// The remainder of the chain, as seen from one interceptor.
///
/// `Next` is `Copy`: calling [`run`](Self::run) more than once sends the
/// request through the same downstream interceptors again.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Terminal,
    ctx: &'a Context,
}

impl<'a> Next<'a> {
    /// Send `request` through the rest of the chain.
    pub fn run(self, request: Request<Bytes>) -> BoxFuture<'a, Result<Response<Bytes>>> {
        if let Some((head, tail)) = self.interceptors.split_first() {
            let next = Next {
                interceptors: tail,
                ..self
            };
            return head.intercept(request, next, self.ctx);
        }

        let terminal = self.terminal;
        let signal = self.ctx.signal();
        Box::pin(async move {
            tokio::select! {
                biased;
                () = signal.cancelled() => Err(Error::Cancelled),
                result = terminal.call(request, signal) => result,
            }
        })
    }

    /// Number of interceptors left before the terminal.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.interceptors.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

struct ChainInner {
    interceptors: Vec<Arc<dyn Interceptor>>,
    terminal: Box<dyn Terminal>,
}

/// A composed request handler: interceptors around a terminal client.
///
/// Cloning is cheap and clones share the same interceptor values, so any
/// state an interceptor holds (such as a
/// [`RequestQueue`](crate::middleware::RequestQueue)) is shared too.
#[derive(Clone)]
pub struct Chain {
    inner: Arc<ChainInner>,
}

/// Compose `interceptors` (outermost first) around `terminal`.
pub fn compose<C>(interceptors: Vec<Arc<dyn Interceptor>>, terminal: C) -> Chain
where
    C: HttpClient + 'static,
{
    Chain {
        inner: Arc::new(ChainInner {
            interceptors,
            terminal: Box::new(terminal),
        }),
    }
}

impl Chain {
    /// Create a new chain builder.
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// Number of interceptors in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.interceptors.len()
    }

    /// Returns `true` if requests go straight to the terminal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.interceptors.is_empty()
    }

    /// Run `request` through the chain.
    ///
    /// A fresh cancellation controller is created for the call; cancelling the
    /// returned operation aborts every step still running.
    pub fn execute(&self, request: Request<Bytes>) -> CancelableOperation<Response<Bytes>> {
        let controller = CancelController::new();
        let ctx = Context::new(controller.signal());
        let chain = self.clone();
        CancelableOperation::new(controller, async move { chain.dispatch(request, &ctx).await })
    }

    /// Run `request` under a cancellation signal owned by the caller.
    ///
    /// Used when this chain is itself one step of a larger call: as the
    /// terminal of another chain, or for a refresh request issued from inside
    /// a recovery action.
    pub async fn call_with_signal(
        &self,
        request: Request<Bytes>,
        signal: CancelSignal,
    ) -> Result<Response<Bytes>> {
        let ctx = Context::new(signal);
        tokio::select! {
            biased;
            () = ctx.signal().cancelled() => Err(Error::Cancelled),
            result = self.dispatch(request, &ctx) => result,
        }
    }

    fn dispatch<'a>(
        &'a self,
        request: Request<Bytes>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        Next {
            interceptors: &self.inner.interceptors,
            terminal: &*self.inner.terminal,
            ctx,
        }
        .run(request)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("interceptors", &self.inner.interceptors.len())
            .finish_non_exhaustive()
    }
}

/// A chain is itself a terminal, so pipelines nest. Nested in another chain,
/// it runs under the outer call's signal.
impl HttpClient for Chain {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        Chain::execute(self, request)
    }

    fn execute_with_signal(
        &self,
        request: Request<Bytes>,
        signal: &CancelSignal,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        self.call_with_signal(request, signal.clone())
    }
}

/// Builder for [`Chain`].
///
/// Interceptors are applied in order: first added = outermost.
///
/// # Example
///
/// ```ignore
/// use tollgate::{Chain, HyperClient};
/// use tollgate::middleware::{LoggingInterceptor, SessionRefresh};
///
/// let chain = Chain::builder()
///     .interceptor(LoggingInterceptor::new())
///     .interceptor(session_refresh)
///     .build(HyperClient::new());
/// ```
#[derive(Default)]
pub struct ChainBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ChainBuilder {
    /// Append an interceptor (inside every interceptor added before it).
    #[must_use]
    pub fn interceptor<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append an already shared interceptor.
    #[must_use]
    pub fn shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Alias for [`interceptor`](Self::interceptor), reqwest-middleware style.
    #[must_use]
    pub fn with<I: Interceptor>(self, interceptor: I) -> Self {
        self.interceptor(interceptor)
    }

    /// Finish the chain with its terminal client.
    #[must_use]
    pub fn build<C>(self, terminal: C) -> Chain
    where
        C: HttpClient + 'static,
    {
        compose(self.interceptors, terminal)
    }
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("interceptors_count", &self.interceptors.len())
            .finish()
    }
}
