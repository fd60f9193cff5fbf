//! HTTP request values flowing through the pipeline.
//!
//! A [`Request`] carries, next to the usual method/url/headers/body, two
//! pieces of pipeline state:
//!
//! - [`RequestMeta`]: the fixed schema interceptors agree on (retry counter,
//!   protection flag).
//! - [`http::Extensions`]: a typed side table for interceptor-specific values.
//!
//! # Example
//!
//! ```
//! use tollgate_core::{Method, Request};
//!
//! let request = Request::get("https://api.example.com/me".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .query("expand", "roles")
//!     .build();
//!
//! assert_eq!(request.method(), &Method::GET);
//! assert_eq!(request.meta().retries(), 0);
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, Method};
use url::Url;

/// Pipeline metadata attached to every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMeta {
    retries: u32,
    protected: bool,
}

impl RequestMeta {
    /// Number of times this request has been retried after a recovery.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Protected requests never wait on, nor start, a recovery episode.
    ///
    /// Use it for the requests the recovery itself sends (e.g. the token
    /// refresh call) when they go through the same pipeline.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.protected
    }

    /// Set the protection flag.
    pub const fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    /// Count one more retry and return the new counter.
    ///
    /// The request queue calls this exactly once per retry attempt; the
    /// counter saturates instead of wrapping.
    pub const fn record_retry(&mut self) -> u32 {
        self.retries = self.retries.saturating_add(1);
        self.retries
    }
}

/// An HTTP request with method, URL, headers, optional body and pipeline metadata.
#[derive(Debug, Clone)]
pub struct Request<B = Bytes> {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<B>,
    meta: RequestMeta,
    extensions: Extensions,
}

impl<B> Request<B> {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: Url) -> RequestBuilder<B> {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Mutable access to headers.
    pub const fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    /// Pipeline metadata.
    #[must_use]
    pub const fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    /// Mutable pipeline metadata.
    pub const fn meta_mut(&mut self) -> &mut RequestMeta {
        &mut self.meta
    }

    /// Typed side table.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable typed side table.
    pub const fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Consume into `(method, url, headers, body, extensions)`.
    ///
    /// The metadata is dropped: it only has meaning inside the pipeline.
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HashMap<String, String>, Option<B>, Extensions) {
        (
            self.method,
            self.url,
            self.headers,
            self.body,
            self.extensions,
        )
    }
}

impl Request<Bytes> {
    /// Shorthand for a `GET` builder.
    #[must_use]
    pub fn get(url: Url) -> RequestBuilder<Bytes> {
        RequestBuilder::new(Method::GET, url)
    }

    /// Shorthand for a `POST` builder.
    #[must_use]
    pub fn post(url: Url) -> RequestBuilder<Bytes> {
        RequestBuilder::new(Method::POST, url)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder<B = Bytes> {
    request: Request<B>,
}

impl<B> RequestBuilder<B> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            request: Request {
                method,
                url,
                headers: HashMap::new(),
                body: None,
                meta: RequestMeta::default(),
                extensions: Extensions::new(),
            },
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.request.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: B) -> Self {
        self.request.body = Some(body);
        self
    }

    /// Marks the request as protected, see [`RequestMeta::is_protected`].
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.request.meta.protected = true;
        self
    }

    /// Stores a typed value in the request extensions.
    #[must_use]
    pub fn extension<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.request.extensions.insert(value);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request<B> {
        self.request
    }
}

impl RequestBuilder<Bytes> {
    /// Set a JSON body.
    pub fn json<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self
            .header("Content-Type", crate::ContentType::Json.as_str())
            .body(body))
    }

    /// Set a form-urlencoded body.
    pub fn form<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_form(value)?;
        Ok(self
            .header("Content-Type", crate::ContentType::FormUrlEncoded.as_str())
            .body(body))
    }
}
