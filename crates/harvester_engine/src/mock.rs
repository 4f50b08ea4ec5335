//! Scripted in-memory fetcher.
//!
//! Every URL gets a script of responses; the n-th fetch of a URL plays the
//! n-th entry and the last entry repeats once the script runs out. Latency is
//! simulated with `tokio::time::sleep`, so tests on a paused clock stay
//! deterministic.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use harvester_core::{FailureKind, NavigationPolicy};

use crate::links::extract_anchors;
use crate::{FetchError, FetchedPage, Fetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Page(String),
    Fail(FailureKind),
}

#[derive(Debug, Clone)]
struct Route {
    script: Vec<MockResponse>,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: HashMap<String, Route>,
    default_latency: Duration,
    calls: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_script(url, vec![MockResponse::Page(html.into())])
    }

    pub fn with_failure(self, url: impl Into<String>, kind: FailureKind) -> Self {
        self.with_script(url, vec![MockResponse::Fail(kind)])
    }

    pub fn with_script(mut self, url: impl Into<String>, script: Vec<MockResponse>) -> Self {
        let latency = None;
        self.routes.insert(url.into(), Route { script, latency });
        self
    }

    /// Latency for one URL. The URL must already have a script.
    pub fn with_latency(mut self, url: &str, latency: Duration) -> Self {
        if let Some(route) = self.routes.get_mut(url) {
            route.latency = Some(latency);
        }
        self
    }

    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Every URL fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn record_call(&self, url: &str) -> usize {
        match self.calls.lock() {
            Ok(mut calls) => {
                let previous = calls.iter().filter(|c| c.as_str() == url).count();
                calls.push(url.to_string());
                previous
            }
            Err(_) => 0,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        policy: NavigationPolicy,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let attempt = self.record_call(url);
        let Some(route) = self.routes.get(url) else {
            return Err(FetchError::new(FailureKind::Network, format!("no route for {url}")));
        };

        let latency = route.latency.unwrap_or(self.default_latency);
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::timeout(timeout));
        }
        tokio::time::sleep(latency).await;

        let response = route
            .script
            .get(attempt)
            .or_else(|| route.script.last())
            .cloned()
            .unwrap_or(MockResponse::Fail(FailureKind::Network));

        match response {
            MockResponse::Fail(kind) => Err(FetchError::new(kind, "scripted failure")),
            MockResponse::Page(html) => {
                if let Some(settle) = policy.settle_delay() {
                    tokio::time::sleep(settle).await;
                }
                let anchors = extract_anchors(&html, Some(url));
                Ok(FetchedPage {
                    requested_url: url.to_string(),
                    final_url: url.to_string(),
                    content: html,
                    anchors,
                })
            }
        }
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
