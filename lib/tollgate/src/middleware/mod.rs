//! Interceptors.
//!
//! # Available interceptors
//!
//! - [`RequestQueue`] - single-flight recovery: one recovery action for any
//!   number of concurrent requests needing it, then retries
//! - [`SessionRefresh`] - a [`RequestQueue`] configured for session refresh
//!   on `401`
//! - [`BearerAuth`] - adds `Authorization: Bearer <token>` from a [`TokenStore`]
//! - [`LoggingInterceptor`] - logs requests/responses using `tracing`
//!
//! # Ordering
//!
//! The first interceptor added to a [`ChainBuilder`](crate::chain::ChainBuilder)
//! is the outermost. Interceptors placed after the queue run again on every
//! retry, so [`BearerAuth`] goes after it to pick up a refreshed token:
//!
//! ```ignore
//! use tollgate::Chain;
//! use tollgate::middleware::{BearerAuth, LoggingInterceptor, SessionRefresh, TokenStore};
//!
//! let tokens = TokenStore::new();
//! let chain = Chain::builder()
//!     .interceptor(LoggingInterceptor::new())
//!     .interceptor(session_refresh)
//!     .interceptor(BearerAuth::new(tokens.clone()))
//!     .build(HyperClient::new());
//! ```

mod bearer_auth;
mod logging;
mod request_queue;
mod session_refresh;

pub use bearer_auth::{BearerAuth, TokenStore};
pub use logging::{LogLevel, LoggingInterceptor};
pub use request_queue::{
    DEFAULT_RETRY_BUDGET, Phase, RequestQueue, RequestQueueBuilder, Settle, TriggerInfo,
};
pub use session_refresh::{DEFAULT_UNAUTHORIZED_STATUS, SessionRefresh, SessionRefreshBuilder};
