//! Headless Chromium fetcher.
//!
//! One browser process per [`BrowserSession`], launched on the first fetch and
//! torn down once by [`BrowserSession::close`]. Every fetch opens its own page
//! and closes it again on every path, including timeouts and cancellation.
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, SetLifecycleEventsEnabledParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use futures_util::StreamExt;
use harvester_core::{FailureKind, NavigationPolicy};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::links::extract_anchors;
use crate::{FetchError, FetchedPage, Fetcher};

#[derive(Debug, Clone, Default)]
pub struct BrowserSettings {
    /// Chromium binary; when unset the usual install locations are searched.
    pub chrome_path: Option<PathBuf>,
}

enum SessionState {
    Idle,
    Running {
        browser: Browser,
        handler: JoinHandle<()>,
    },
    Closed,
}

/// Scoped handle on the browser process.
pub struct BrowserSession {
    settings: BrowserSettings,
    state: Mutex<SessionState>,
    launches: AtomicUsize,
    open_pages: AtomicUsize,
}

impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(SessionState::Idle),
            launches: AtomicUsize::new(0),
            open_pages: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }

    /// Open a blank page, launching the browser first if needed.
    async fn open_page(&self) -> Result<PageGuard<'_>, FetchError> {
        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::Idle) {
            *state = self.launch().await?;
        }
        let SessionState::Running { browser, .. } = &*state else {
            return Err(FetchError::new(FailureKind::Cancelled, "browser session is closed"));
        };
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| FetchError::new(FailureKind::Network, format!("cannot open page: {err}")))?;
        self.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(PageGuard {
            page: Some(page),
            open_pages: &self.open_pages,
        })
    }

    async fn launch(&self) -> Result<SessionState, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            // Target sites are often misconfigured; see FetchSettings::accept_invalid_certs.
            .arg("--ignore-certificate-errors");
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, format!("browser config: {err}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| FetchError::new(FailureKind::Network, format!("cannot launch browser: {err}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_trace!("browser handler event error: {}", err);
                }
            }
        });

        self.launches.fetch_add(1, Ordering::SeqCst);
        engine_info!("Browser launched");
        Ok(SessionState::Running { browser, handler })
    }

    /// Tear the browser down. Later calls, and fetches after the first call,
    /// do nothing. Returns whether a running browser was stopped.
    pub async fn close(&self) -> bool {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Closed) {
            SessionState::Running {
                mut browser,
                handler,
            } => {
                if let Err(err) = browser.close().await {
                    engine_warn!("Browser close failed: {}", err);
                }
                if let Err(err) = browser.wait().await {
                    engine_warn!("Browser did not exit cleanly: {}", err);
                }
                handler.abort();
                engine_info!("Browser closed");
                true
            }
            SessionState::Idle | SessionState::Closed => false,
        }
    }
}

/// Closes its page when dropped if `close` was never awaited.
struct PageGuard<'a> {
    page: Option<Page>,
    open_pages: &'a AtomicUsize,
}

impl PageGuard<'_> {
    fn page(&self) -> Result<&Page, FetchError> {
        self.page
            .as_ref()
            .ok_or_else(|| FetchError::new(FailureKind::Network, "page already closed"))
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            self.open_pages.fetch_sub(1, Ordering::SeqCst);
            if let Err(err) = page.close().await {
                engine_debug!("Page close failed: {}", err);
            }
        }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.open_pages.fetch_sub(1, Ordering::SeqCst);
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(err) = page.close().await {
                        engine_debug!("Deferred page close failed: {}", err);
                    }
                });
            }
        }
    }
}

pub struct BrowserFetcher {
    session: BrowserSession,
}

impl BrowserFetcher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            session: BrowserSession::new(settings),
        }
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }
}

#[async_trait::async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(
        &self,
        url: &str,
        policy: NavigationPolicy,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        if url::Url::parse(url).is_err() {
            return Err(FetchError::new(FailureKind::InvalidUrl, url.to_string()));
        }
        let guard = self.session.open_page().await?;
        let result = render(guard.page()?, url, policy, timeout).await;
        guard.close().await;
        result
    }

    async fn shutdown(&self) {
        self.session.close().await;
    }
}

async fn render(
    page: &Page,
    url: &str,
    policy: NavigationPolicy,
    timeout: Duration,
) -> Result<FetchedPage, FetchError> {
    match tokio::time::timeout(timeout, navigate(page, url, policy)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err),
        Err(_) => return Err(FetchError::timeout(timeout)),
    }

    if let Some(settle) = policy.settle_delay() {
        tokio::time::sleep(settle).await;
    }

    let content = page
        .content()
        .await
        .map_err(|err| FetchError::new(FailureKind::Network, format!("cannot read content: {err}")))?;
    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string());
    let anchors = extract_anchors(&content, Some(&final_url));

    Ok(FetchedPage {
        requested_url: url.to_string(),
        final_url,
        content,
        anchors,
    })
}

/// Load `url`. Under `NetworkIdle` this also waits for Chromium's
/// `networkIdle` lifecycle event of the new document, which fires after
/// 500 ms without network activity.
async fn navigate(page: &Page, url: &str, policy: NavigationPolicy) -> Result<(), FetchError> {
    if policy != NavigationPolicy::NetworkIdle {
        page.goto(url).await.map_err(cdp_error)?;
        return Ok(());
    }

    let main_frame = page.mainframe().await.map_err(cdp_error)?;
    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(cdp_error)?;
    // Subscribe before navigating so no event of the new document is missed.
    let mut lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(cdp_error)?;
    page.goto(url).await.map_err(cdp_error)?;

    let mut watch = IdleWatch::default();
    while let Some(event) = lifecycle.next().await {
        if main_frame.as_ref().is_some_and(|frame| *frame != event.frame_id) {
            continue;
        }
        if watch.observe(&event.name, event.loader_id.clone()) {
            engine_trace!("{} reached network idle", url);
            return Ok(());
        }
    }
    Err(FetchError::new(
        FailureKind::Network,
        "page went away before the network was idle",
    ))
}

const DOCUMENT_INIT: &str = "init";
const NETWORK_IDLE: &str = "networkIdle";

/// Tracks lifecycle events down to the network-idle event of the newest
/// document. Events of an earlier document (the blank page, or a page that
/// redirected away) never count.
#[derive(Debug)]
struct IdleWatch<L> {
    document: Option<L>,
}

impl<L> Default for IdleWatch<L> {
    fn default() -> Self {
        Self { document: None }
    }
}

impl<L: PartialEq> IdleWatch<L> {
    /// Feed one event; true once the newest document is idle.
    fn observe(&mut self, name: &str, loader: L) -> bool {
        match name {
            DOCUMENT_INIT => {
                self.document = Some(loader);
                false
            }
            NETWORK_IDLE => self.document.as_ref() == Some(&loader),
            _ => false,
        }
    }
}

fn cdp_error(err: CdpError) -> FetchError {
    map_navigation_error(&err.to_string())
}

/// Chromium reports navigation failures as `net::ERR_*` codes.
fn map_navigation_error(message: &str) -> FetchError {
    let upper = message.to_ascii_uppercase();
    let kind = if upper.contains("ERR_CERT") || upper.contains("ERR_SSL") {
        FailureKind::Tls
    } else if upper.contains("ERR_TIMED_OUT") || upper.contains("TIMEOUT") {
        FailureKind::Timeout
    } else if upper.contains("ERR_INVALID_URL") {
        FailureKind::InvalidUrl
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromium_error_codes_map_to_failure_kinds() {
        assert_eq!(
            map_navigation_error("net::ERR_CERT_AUTHORITY_INVALID").kind,
            FailureKind::Tls
        );
        assert_eq!(map_navigation_error("net::ERR_SSL_PROTOCOL_ERROR").kind, FailureKind::Tls);
        assert_eq!(map_navigation_error("net::ERR_TIMED_OUT").kind, FailureKind::Timeout);
        assert_eq!(
            map_navigation_error("net::ERR_NAME_NOT_RESOLVED").kind,
            FailureKind::Network
        );
    }

    #[test]
    fn idle_counts_only_for_the_newest_document() {
        let mut watch = IdleWatch::default();
        assert!(!watch.observe(NETWORK_IDLE, "blank"));
        assert!(!watch.observe(DOCUMENT_INIT, "first"));
        assert!(!watch.observe("load", "first"));
        assert!(!watch.observe(DOCUMENT_INIT, "redirected"));
        assert!(!watch.observe(NETWORK_IDLE, "first"));
        assert!(!watch.observe("networkAlmostIdle", "redirected"));
        assert!(watch.observe(NETWORK_IDLE, "redirected"));
    }

    #[tokio::test]
    async fn closing_an_unused_session_is_a_no_op() {
        let session = BrowserSession::new(BrowserSettings::default());
        assert!(!session.close().await);
        assert!(!session.close().await);
        assert_eq!(session.launches(), 0);
    }

    #[tokio::test]
    async fn closed_session_refuses_new_pages() {
        let session = BrowserSession::new(BrowserSettings::default());
        session.close().await;
        let err = session.open_page().await.err().map(|e| e.kind);
        assert_eq!(err, Some(FailureKind::Cancelled));
        assert_eq!(session.launches(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn renders_page_and_collects_anchors() {
        let fetcher = BrowserFetcher::new(BrowserSettings::default());
        let page = fetcher
            .fetch(
                "data:text/html,<a href='https://shop.example/contact'>Contact</a>",
                NavigationPolicy::NetworkIdle,
                Duration::from_secs(10),
            )
            .await
            .expect("render");
        assert_eq!(page.anchors.len(), 1);
        assert_eq!(fetcher.session().open_pages(), 0);

        fetcher.shutdown().await;
        assert_eq!(fetcher.session().launches(), 1);
        assert!(!fetcher.session().close().await);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn network_idle_waits_for_late_script_content() {
        // The link is inserted 200 ms after load, well inside the idle window.
        let html = "<body></body><script>setTimeout(function () {\
                    document.body.innerHTML = '<a href=\"https://shop.example/contact\">Contact</a>';\
                    }, 200);</script>";
        let fetcher = BrowserFetcher::new(BrowserSettings::default());
        let page = fetcher
            .fetch(
                &format!("data:text/html,{html}"),
                NavigationPolicy::NetworkIdle,
                Duration::from_secs(10),
            )
            .await
            .expect("render");
        fetcher.shutdown().await;

        assert_eq!(page.anchors.len(), 1);
        assert_eq!(page.anchors[0].href, "https://shop.example/contact");
    }
}
