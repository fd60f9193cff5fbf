//! HTTP response values.
//!
//! The pipeline treats a [`Response`] as an opaque pass-through value; the
//! only thing interceptors are expected to read for decisions is
//! [`Response::status`].

use std::collections::HashMap;

use bytes::Bytes;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<B = Bytes> {
    status: u16,
    headers: HashMap<String, String>,
    body: B,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub const fn new(status: u16, headers: HashMap<String, String>, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Status is `401 Unauthorized`.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Transform the body with a function.
    pub fn map_body<F, B2>(self, f: F) -> Response<B2>
    where
        F: FnOnce(B) -> B2,
    {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

impl Response<Bytes> {
    /// Deserialize the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Turn a non-2xx response into [`crate::Error::Http`], keeping the body.
    pub fn error_for_status(self) -> crate::Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("unknown status");
        Err(crate::Error::http_with_body(
            self.status,
            message,
            self.body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    fn response(status: u16, body: &'static str) -> Response {
        Response::new(status, HashMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn status_classes() {
        check!(response(204, "").is_success());
        check!(response(401, "").is_unauthorized());
        check!(response(401, "").is_client_error());
        check!(!response(403, "").is_unauthorized());
        check!(response(502, "").is_server_error());
    }

    #[test]
    fn error_for_status_keeps_body() {
        let_assert!(Err(err) = response(401, r#"{"error":"expired"}"#).error_for_status());
        check!(err.status() == Some(401));
        check!(err.to_string() == "HTTP error 401: Unauthorized");
        check!(err.body() == Some(&Bytes::from_static(br#"{"error":"expired"}"#)));
    }

    #[test]
    fn error_for_status_passes_success() {
        let_assert!(Ok(ok) = response(200, "fine").error_for_status());
        check!(ok.text().as_deref() == Ok("fine"));
    }

    #[test]
    fn json_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Profile {
            id: u64,
        }

        let profile: Profile = response(200, r#"{"id":7}"#).json().expect("json");
        check!(profile == Profile { id: 7 });
    }

    #[test]
    fn map_body_keeps_status() {
        let mapped = response(201, "abc").map_body(|body| body.len());
        check!(mapped.status() == 201);
        check!(*mapped.body() == 3);
    }
}
