//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tollgate::prelude::*;
//! ```

pub use crate::{
    CancelableOperation, Chain, ClientConfig, Context, Error, HttpClient, HyperClient,
    Interceptor, Method, Next, Request, RequestBuilder, RequestMeta, Response, Result, StatusCode,
};
pub use serde::{Deserialize, Serialize};
