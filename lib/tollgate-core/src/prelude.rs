//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tollgate_core::prelude::*;
//! ```

pub use crate::{
    CancelController, CancelSignal, CancelableOperation, Error, HttpClient, Method, Request,
    RequestBuilder, RequestMeta, Response, Result,
};
