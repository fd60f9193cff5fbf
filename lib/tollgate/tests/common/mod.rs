//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tollgate::{HttpClient, Request, Response, Result};

type StatusFn = dyn Fn(&Request) -> Result<u16> + Send + Sync;

/// In-process terminal answering with a status computed from the request.
#[derive(Clone)]
pub struct Backend {
    calls: Arc<AtomicU32>,
    max_retries: Arc<AtomicU32>,
    status: Arc<StatusFn>,
}

impl Backend {
    pub fn new(status: impl Fn(&Request) -> Result<u16> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            max_retries: Arc::new(AtomicU32::new(0)),
            status: Arc::new(status),
        }
    }

    /// 401 for first attempts, 200 for retries.
    pub fn stale_then_fresh() -> Self {
        Self::new(|request| Ok(if request.meta().retries() == 0 { 401 } else { 200 }))
    }

    /// Always the same status.
    pub fn fixed(status: u16) -> Self {
        Self::new(move |_| Ok(status))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_retries_seen(&self) -> u32 {
        self.max_retries.load(Ordering::SeqCst)
    }
}

impl HttpClient for Backend {
    fn execute(&self, request: Request<Bytes>) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.max_retries
            .fetch_max(request.meta().retries(), Ordering::SeqCst);
        let status = (self.status)(&request);
        async move {
            tokio::task::yield_now().await;
            Ok(Response::new(status?, HashMap::new(), Bytes::new()))
        }
    }
}

pub fn request(path: &str) -> Request {
    let url = url::Url::parse("https://api.example.com")
        .and_then(|base| base.join(path))
        .expect("url");
    Request::get(url).build()
}

/// Wait until `condition` holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
