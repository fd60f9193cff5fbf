//! tower adapters.
//!
//! A [`Chain`] is a `tower::Service`, so it fits anywhere a service is
//! expected; [`ServiceClient`] goes the other way and turns any tower
//! service into the terminal of a chain.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tollgate_core::{CancelableOperation, HttpClient};
use tower::ServiceExt;
use tower_service::Service;

use crate::chain::Chain;
use crate::{Error, Request, Response, Result};

impl Service<Request<Bytes>> for Chain {
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = CancelableOperation<Response<Bytes>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        self.execute(request)
    }
}

/// Adapts a tower [`Service`] into an [`HttpClient`].
///
/// The service sits behind a mutex and is cloned for every call, which is
/// how `Sync` is obtained from services that are only `Send`.
///
/// # Example
///
/// ```ignore
/// use tollgate::{Chain, ServiceClient};
///
/// let chain = Chain::builder()
///     .interceptor(queue)
///     .build(ServiceClient::new(my_tower_service));
/// ```
pub struct ServiceClient<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> ServiceClient<S> {
    /// Wrap `service`.
    pub fn new(service: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }
}

impl<S> Clone for ServiceClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for ServiceClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient").finish_non_exhaustive()
    }
}

impl<S> HttpClient for ServiceClient<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        service.oneshot(request)
    }
}
