//! Request/response logging interceptor.
//!
//! Logs every attempt that passes through it using `tracing`. Placed inside
//! a [`RequestQueue`](super::RequestQueue) it also logs retries, each with
//! its retry counter. An attempt dropped before it completes (the call was
//! cancelled) is logged as cancelled.

use std::time::Instant;

use bytes::Bytes;
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::chain::{BoxFuture, Context, Interceptor, Next};
use crate::{Request, Response, Result};

/// Log level for [`LoggingInterceptor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level, headers included.
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

/// Logs an attempt dropped before `finish`.
struct InFlight {
    start: Instant,
    finished: bool,
}

impl InFlight {
    fn start() -> Self {
        Self {
            start: Instant::now(),
            finished: false,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn finish(mut self) -> u64 {
        self.finished = true;
        self.elapsed_ms()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            info!(elapsed_ms = self.elapsed_ms(), "request cancelled");
        }
    }
}

/// Interceptor logging requests and their outcome.
///
/// # Example
///
/// ```ignore
/// use tollgate::Chain;
/// use tollgate::middleware::LoggingInterceptor;
///
/// let chain = Chain::builder()
///     .interceptor(LoggingInterceptor::new())
///     .build(client);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor {
    level: LogLevel,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging interceptor that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl Interceptor for LoggingInterceptor {
    fn intercept<'a>(
        &'a self,
        request: Request<Bytes>,
        next: Next<'a>,
        _ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let retries = request.meta().retries();
        let level = self.level;

        let span = span!(Level::INFO, "http_request", %method, %url, retries);

        Box::pin(
            async move {
                let in_flight = InFlight::start();

                match level {
                    LogLevel::Debug => {
                        debug!(headers = ?request.headers(), "sending request");
                    }
                    LogLevel::Info => {
                        info!("sending request");
                    }
                }

                let result = next.run(request).await;
                let elapsed_ms = in_flight.finish();

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        if response.is_success() {
                            info!(status, elapsed_ms, "request completed");
                        } else {
                            warn!(status, elapsed_ms, "request completed with HTTP error");
                        }
                    }
                    Err(err) if err.is_cancelled() => {
                        info!(elapsed_ms, "request cancelled");
                    }
                    Err(err) => {
                        warn!(error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
