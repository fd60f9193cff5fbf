//! End-to-end session refresh against a mock server.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use assert2::{check, let_assert};
use futures_util::future::join_all;
use serde::Deserialize;
use tollgate::middleware::{BearerAuth, SessionRefresh, TokenStore};
use tollgate::{Chain, Error, HyperClient, Request, Result};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

fn url(server: &MockServer, path: &str) -> url::Url {
    url::Url::parse(&format!("{}{path}", server.uri())).expect("url")
}

/// `/orders` answers 200 with the fresh token and 401 otherwise.
async fn mount_orders(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/orders"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"orders": []})))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

/// Refresh action that posts to `/auth/refresh` through `chain` and stores the token.
fn refresh_through(
    chain: Arc<OnceLock<Chain>>,
    server_uri: String,
    tokens: TokenStore,
) -> impl Fn() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync + 'static
{
    move || -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
        let chain = Arc::clone(&chain);
        let tokens = tokens.clone();
        let refresh_url = format!("{server_uri}/auth/refresh");
        Box::pin(async move {
            let chain = chain.get().ok_or(Error::invalid_request("chain not ready"))?;
            let request = Request::post(url::Url::parse(&refresh_url)?).build();
            let response = chain.execute(request).await?.error_for_status()?;
            let body: TokenBody = response.json()?;
            tokens.set(body.token);
            Ok(())
        })
    }
}

#[tokio::test]
async fn concurrent_401s_trigger_a_single_refresh() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"token": "fresh"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenStore::with_token("stale");
    let slot = Arc::new(OnceLock::new());
    let refresh = SessionRefresh::builder(refresh_through(
        Arc::clone(&slot),
        server.uri(),
        tokens.clone(),
    ))
    .refresh_endpoint("/auth/refresh")
    .debug(true)
    .build();

    let chain = Chain::builder()
        .interceptor(refresh.clone())
        .interceptor(BearerAuth::new(tokens.clone()))
        .build(HyperClient::new());
    slot.set(chain.clone()).expect("slot");

    let calls = (0..3).map(|_| chain.execute(Request::get(url(&server, "/orders")).build()));
    for result in join_all(calls).await {
        let_assert!(Ok(response) = result);
        check!(response.status() == 200);
    }

    check!(tokens.get().as_deref() == Some("fresh"));
    check!(refresh.queue().episodes() == 1);
}

#[tokio::test]
async fn rejected_refresh_fails_waiters_without_looping() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let invalidated = Arc::new(AtomicU32::new(0));
    let tokens = TokenStore::with_token("stale");
    let slot = Arc::new(OnceLock::new());
    let refresh = SessionRefresh::builder(refresh_through(
        Arc::clone(&slot),
        server.uri(),
        tokens.clone(),
    ))
    .refresh_endpoint("/auth/refresh")
    .on_session_invalid({
        let invalidated = Arc::clone(&invalidated);
        move |settle| {
            invalidated.fetch_add(1, Ordering::SeqCst);
            async move { settle.failure() }
        }
    })
    .build();

    let chain = Chain::builder()
        .interceptor(refresh)
        .interceptor(BearerAuth::new(tokens.clone()))
        .build(HyperClient::new());
    slot.set(chain.clone()).expect("slot");

    let calls = (0..2).map(|_| chain.execute(Request::get(url(&server, "/orders")).build()));
    for result in join_all(calls).await {
        let_assert!(Err(err) = result);
        check!(err.is_recovery_failure());
    }
    check!(invalidated.load(Ordering::SeqCst) == 1);
    check!(tokens.get().as_deref() == Some("stale"));
}

#[tokio::test]
async fn invalid_session_handler_can_still_succeed() {
    let server = MockServer::start().await;
    mount_orders(&server).await;

    let tokens = TokenStore::with_token("stale");
    let refresh = SessionRefresh::builder(|| async { Err(Error::http(401, "session expired")) })
        .on_session_invalid({
            let tokens = tokens.clone();
            move |settle| {
                let tokens = tokens.clone();
                async move {
                    // Signed in again by other means.
                    tokens.set("fresh");
                    settle.success();
                }
            }
        })
        .build();

    let chain = Chain::builder()
        .interceptor(refresh)
        .interceptor(BearerAuth::new(tokens))
        .build(HyperClient::new());

    let_assert!(Ok(response) = chain.execute(Request::get(url(&server, "/orders")).build()).await);
    check!(response.status() == 200);
}

#[tokio::test]
async fn ignored_requests_keep_their_401() {
    let server = MockServer::start().await;
    mount_orders(&server).await;

    let refreshes = Arc::new(AtomicU32::new(0));
    let refresh = SessionRefresh::builder({
        let refreshes = Arc::clone(&refreshes);
        move || {
            refreshes.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    })
    .ignore_request(|request| request.header("X-Anonymous").is_some())
    .build();

    let chain = Chain::builder()
        .interceptor(refresh)
        .build(HyperClient::new());

    let request = Request::get(url(&server, "/orders"))
        .header("X-Anonymous", "1")
        .build();
    let_assert!(Ok(response) = chain.execute(request).await);
    check!(response.status() == 401);
    check!(refreshes.load(Ordering::SeqCst) == 0);
}

#[tokio::test]
async fn custom_unauthorized_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/legacy"))
        .respond_with(ResponseTemplate::new(419))
        .mount(&server)
        .await;

    let refreshes = Arc::new(AtomicU32::new(0));
    let refresh = SessionRefresh::builder({
        let refreshes = Arc::clone(&refreshes);
        move || {
            refreshes.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    })
    .unauthorized_status(419)
    .build();

    let chain = Chain::builder()
        .interceptor(refresh)
        .build(HyperClient::new());

    // The retry still gets 419 and the budget is spent, so the response comes back.
    let_assert!(Ok(response) = chain.execute(Request::get(url(&server, "/legacy")).build()).await);
    check!(response.status() == 419);
    check!(refreshes.load(Ordering::SeqCst) == 1);
}
