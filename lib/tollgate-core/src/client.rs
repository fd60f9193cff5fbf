//! The terminal HTTP client trait.
//!
//! [`HttpClient`] is what sits at the inner end of an interceptor chain: it
//! turns a [`Request`] into a [`Response`]. The hyper transport implements
//! it, and so do test doubles.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::{CancelSignal, Request, Response, Result};

/// Core HTTP client trait.
///
/// Implementations must not treat error statuses as errors: a `401` is an
/// `Ok(Response)` so that interceptors can react to it.
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn execute(&self, request: Request<Bytes>)
    -> impl Future<Output = Result<Response<Bytes>>> + Send;

    /// Execute a request as one step of a larger call observing `signal`.
    ///
    /// The default ignores the signal: the caller drops the returned future
    /// on cancellation. Clients that run their own steps (a nested chain)
    /// override it so those steps see the caller's signal.
    fn execute_with_signal(
        &self,
        request: Request<Bytes>,
        signal: &CancelSignal,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        let _ = signal;
        self.execute(request)
    }
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        (**self).execute(request)
    }

    fn execute_with_signal(
        &self,
        request: Request<Bytes>,
        signal: &CancelSignal,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        (**self).execute_with_signal(request, signal)
    }
}

/// An [`HttpClient`] backed by a closure.
///
/// Handy for wiring a pipeline to something that is not a network client,
/// such as an in-process handler or a test stub.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use bytes::Bytes;
/// use tollgate_core::{FnClient, Request, Response, Result};
///
/// let client = FnClient::new(|_request: Request| async {
///     Result::Ok(Response::new(204, HashMap::new(), Bytes::new()))
/// });
/// ```
#[derive(Clone)]
pub struct FnClient<F> {
    handler: F,
}

impl<F> FnClient<F> {
    /// Wrap a closure.
    pub const fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> std::fmt::Debug for FnClient<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClient").finish_non_exhaustive()
    }
}

impl<F, Fut> HttpClient for FnClient<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>>> + Send,
{
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        (self.handler)(request)
    }
}
