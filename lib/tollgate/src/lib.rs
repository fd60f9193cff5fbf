//! Interceptor pipeline for HTTP clients with single-flight credential
//! recovery.
//!
//! A [`Chain`] runs each request through an ordered list of interceptors
//! down to a terminal client. The [`RequestQueue`](middleware::RequestQueue)
//! interceptor makes sure that when many concurrent requests find their
//! credentials stale, one recovery runs and every one of them waits for it,
//! then retries or fails together.
//!
//! # Example
//!
//! ```ignore
//! use tollgate::prelude::*;
//! use tollgate::middleware::{BearerAuth, SessionRefresh, TokenStore};
//!
//! let tokens = TokenStore::with_token("stale");
//! let refresh = SessionRefresh::builder({
//!     let tokens = tokens.clone();
//!     move || {
//!         let tokens = tokens.clone();
//!         async move {
//!             tokens.set(fetch_new_token().await?);
//!             Ok(())
//!         }
//!     }
//! })
//! .refresh_endpoint("/auth/refresh")
//! .build();
//!
//! let chain = Chain::builder()
//!     .interceptor(refresh)
//!     .interceptor(BearerAuth::new(tokens))
//!     .build(HyperClient::new());
//!
//! let response = chain.execute(Request::get(url).build()).await?;
//! ```

pub mod chain;
mod client;
mod config;
mod connector;
pub mod middleware;
pub mod prelude;
mod service;

pub use chain::{Chain, ChainBuilder, Context, Interceptor, Next, compose, interceptor_fn};
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use service::ServiceClient;

// Re-export tower for layer composition around the transport
pub use tower;

pub use tollgate_core::{
    CancelController, CancelSignal, CancelableOperation, ContentType, Error, Extensions, FnClient,
    HttpClient, Method, Request, RequestBuilder, RequestMeta, Response, Result, StatusCode,
    from_json, header, to_form, to_json,
};
