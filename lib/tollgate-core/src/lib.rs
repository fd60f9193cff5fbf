//! Core types and traits for the tollgate interceptor pipeline.
//!
//! This crate holds the values that flow through a pipeline and the traits
//! at its edges:
//! - [`Request`], [`RequestBuilder`] and [`RequestMeta`] - requests with pipeline metadata
//! - [`Response`] - HTTP response type
//! - [`Error`] and [`Result`] - error handling, including [`Error::RecoveryFailed`]
//! - [`HttpClient`] - the terminal trait a pipeline ends in
//! - [`CancelController`], [`CancelSignal`], [`CancelableOperation`] - cancellation
//! - [`Method`], [`StatusCode`], [`header`] - re-exported from the `http` crate

mod body;
mod cancel;
mod client;
mod error;
pub mod prelude;
mod request;
mod response;

pub use body::{ContentType, from_json, to_form, to_json};
pub use cancel::{CancelController, CancelSignal, CancelableOperation};
pub use client::{FnClient, HttpClient};
pub use error::{Error, Result};
pub use request::{Request, RequestBuilder, RequestMeta};
pub use response::Response;

// Re-export http crate types for methods, status codes and headers
pub use http::{Extensions, Method, StatusCode, header};
