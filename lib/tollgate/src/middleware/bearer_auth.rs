//! Bearer token authentication interceptor.
//!
//! Adds `Authorization: Bearer <token>` to every attempt. The token lives in
//! a [`TokenStore`] shared with whatever refreshes it, so a request retried
//! after a successful recovery carries the new token.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use crate::chain::{BoxFuture, Context, Interceptor, Next};
use crate::{Request, Response, Result};

/// Swappable bearer token.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<Arc<str>>>>,
}

impl TokenStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Replace the token.
    pub fn set(&self, token: impl Into<String>) {
        let token: Arc<str> = Arc::from(token.into());
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Remove the token; requests go out unauthenticated.
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Current token.
    #[must_use]
    pub fn get(&self) -> Option<Arc<str>> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token itself.
        f.debug_struct("TokenStore")
            .field("present", &self.get().is_some())
            .finish()
    }
}

/// Interceptor adding the current bearer token to requests.
///
/// # Example
///
/// ```ignore
/// use tollgate::middleware::{BearerAuth, TokenStore};
///
/// let tokens = TokenStore::with_token("initial");
/// let auth = BearerAuth::new(tokens.clone());
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuth {
    tokens: TokenStore,
}

impl BearerAuth {
    /// Read tokens from `tokens`.
    #[must_use]
    pub const fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }

    /// The backing store.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

impl Interceptor for BearerAuth {
    fn intercept<'a>(
        &'a self,
        mut request: Request<Bytes>,
        next: Next<'a>,
        _ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Response<Bytes>>> {
        if let Some(token) = self.tokens.get() {
            request
                .headers_mut()
                .insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        next.run(request)
    }
}
