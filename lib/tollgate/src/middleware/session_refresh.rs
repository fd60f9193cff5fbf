//! Session refresh on `401`.
//!
//! [`SessionRefresh`] configures a [`RequestQueue`] for the common case of
//! session-based credentials:
//!
//! - a response with the unauthorized status (401 by default) triggers a
//!   refresh, unless the request is bypassed;
//! - requests to the refresh endpoint, protected requests, and requests
//!   matching the ignore predicate are bypassed on every attempt;
//! - when the refresh fails, the invalid-session handler decides the final
//!   outcome (e.g. after sending the user back to a login screen).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::request_queue::{RequestQueue, RequestQueueBuilder, Settle};
use crate::chain::{BoxFuture, Context, Interceptor, Next};
use crate::{Request, Response, Result};

/// Status that signals an expired session, unless overridden.
pub const DEFAULT_UNAUTHORIZED_STATUS: u16 = 401;

type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type InvalidFn = Arc<dyn Fn(Settle) -> BoxFuture<'static, ()> + Send + Sync>;
type IgnoreFn = Arc<dyn Fn(&Request<Bytes>) -> bool + Send + Sync>;

/// Interceptor refreshing the session once for all concurrent `401`s.
///
/// # Example
///
/// ```ignore
/// use tollgate::middleware::SessionRefresh;
///
/// let refresh = SessionRefresh::builder(move || {
///     let auth = auth.clone();
///     async move { auth.refresh().await }
/// })
/// .refresh_endpoint("/auth/refresh")
/// .build();
/// ```
#[derive(Clone)]
pub struct SessionRefresh {
    queue: RequestQueue,
    endpoint: Option<Arc<str>>,
}

impl SessionRefresh {
    /// Start configuring with the action that refreshes the session.
    ///
    /// The action's own requests must be bypassed, either through
    /// [`refresh_endpoint`](SessionRefreshBuilder::refresh_endpoint) or by
    /// marking them protected.
    pub fn builder<F, Fut>(refresh_session: F) -> SessionRefreshBuilder
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        SessionRefreshBuilder {
            refresh: Arc::new(move || -> BoxFuture<'static, Result<()>> {
                Box::pin(refresh_session())
            }),
            on_invalid: None,
            ignore: None,
            endpoint: None,
            retry_budget: super::request_queue::DEFAULT_RETRY_BUDGET,
            unauthorized_status: DEFAULT_UNAUTHORIZED_STATUS,
            debug: false,
        }
    }

    /// The underlying queue, for observing its phase and episodes.
    #[must_use]
    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// URL substring that is never queued.
    #[must_use]
    pub fn refresh_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

impl Interceptor for SessionRefresh {
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        self.queue.intercept(request, next, ctx)
    }
}

impl fmt::Debug for SessionRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRefresh")
            .field("queue", &self.queue)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Builder for [`SessionRefresh`].
pub struct SessionRefreshBuilder {
    refresh: RefreshFn,
    on_invalid: Option<InvalidFn>,
    ignore: Option<IgnoreFn>,
    endpoint: Option<Arc<str>>,
    retry_budget: u32,
    unauthorized_status: u16,
    debug: bool,
}

impl SessionRefreshBuilder {
    /// Handle a failed refresh.
    ///
    /// The handler receives the episode's [`Settle`] and reports the final
    /// outcome through it. Without a handler the episode fails.
    #[must_use]
    pub fn on_session_invalid<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Settle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_invalid = Some(Arc::new(move |settle: Settle| -> BoxFuture<'static, ()> {
            Box::pin(handler(settle))
        }));
        self
    }

    /// Never queue requests for which `predicate` returns `true`.
    #[must_use]
    pub fn ignore_request<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> bool + Send + Sync + 'static,
    {
        self.ignore = Some(Arc::new(predicate));
        self
    }

    /// Never queue requests whose URL contains `pattern`.
    #[must_use]
    pub fn refresh_endpoint(mut self, pattern: impl Into<String>) -> Self {
        self.endpoint = Some(Arc::from(pattern.into()));
        self
    }

    /// Maximum retries per request (default 1).
    #[must_use]
    pub const fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Status that signals an expired session (default 401).
    #[must_use]
    pub const fn unauthorized_status(mut self, status: u16) -> Self {
        self.unauthorized_status = status;
        self
    }

    /// Emit `debug!` events for refreshes and queue transitions.
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Build the interceptor.
    #[must_use]
    pub fn build(self) -> SessionRefresh {
        let bypass = Bypass {
            endpoint: self.endpoint.clone(),
            ignore: self.ignore,
        };
        let trigger_bypass = bypass.clone();
        let status = self.unauthorized_status;
        let refresh = self.refresh;
        let on_invalid = self.on_invalid;
        let debug_enabled = self.debug;

        let queue = RequestQueueBuilder::default()
            .should_bypass(move |request| bypass.matches(request))
            .needs_recovery(move |trigger| {
                trigger.response.status() == status && !trigger_bypass.matches(trigger.request)
            })
            .recover(move |settle| {
                let refresh = Arc::clone(&refresh);
                let on_invalid = on_invalid.clone();
                async move {
                    match refresh().await {
                        Ok(()) => {
                            if debug_enabled {
                                debug!(episode = settle.episode(), "session refreshed");
                            }
                            settle.success();
                        }
                        Err(err) => {
                            if debug_enabled {
                                debug!(episode = settle.episode(), error = %err, "session refresh failed");
                            }
                            match on_invalid {
                                Some(handler) => handler(settle).await,
                                None => settle.failure(),
                            }
                        }
                    }
                    Ok(())
                }
            })
            .retry_budget(self.retry_budget)
            .debug(self.debug)
            .build();

        SessionRefresh {
            queue,
            endpoint: self.endpoint,
        }
    }
}

impl fmt::Debug for SessionRefreshBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRefreshBuilder")
            .field("on_session_invalid", &self.on_invalid.is_some())
            .field("ignore_request", &self.ignore.is_some())
            .field("refresh_endpoint", &self.endpoint)
            .field("retry_budget", &self.retry_budget)
            .field("unauthorized_status", &self.unauthorized_status)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct Bypass {
    endpoint: Option<Arc<str>>,
    ignore: Option<IgnoreFn>,
}

impl Bypass {
    fn matches(&self, request: &Request<Bytes>) -> bool {
        self.endpoint
            .as_deref()
            .is_some_and(|pattern| request.url().as_str().contains(pattern))
            || self.ignore.as_ref().is_some_and(|ignore| ignore(request))
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    fn request(path: &str) -> Request {
        let url = url::Url::parse("https://api.example.com")
            .and_then(|base| base.join(path))
            .expect("url");
        Request::get(url).build()
    }

    #[test]
    fn bypass_matches_endpoint_or_predicate() {
        let bypass = Bypass {
            endpoint: Some(Arc::from("/auth/refresh")),
            ignore: Some(Arc::new(|request: &Request| request.header("X-Public").is_some())),
        };

        check!(bypass.matches(&request("/auth/refresh?grant=cookie")));
        check!(!bypass.matches(&request("/orders")));

        let mut public = request("/orders");
        public
            .headers_mut()
            .insert("X-Public".to_string(), "1".to_string());
        check!(bypass.matches(&public));
    }

    #[test]
    fn builder_defaults() {
        let refresh = SessionRefresh::builder(|| async { Ok(()) }).build();
        check!(refresh.queue().retry_budget() == 1);
        check!(refresh.refresh_endpoint().is_none());
    }

    #[test]
    fn builder_debug_hides_closures() {
        let builder = SessionRefresh::builder(|| async { Ok(()) })
            .refresh_endpoint("/refresh")
            .unauthorized_status(419);
        let text = format!("{builder:?}");
        check!(text.contains("unauthorized_status: 419"));
        check!(text.contains("\"/refresh\""));
    }
}
