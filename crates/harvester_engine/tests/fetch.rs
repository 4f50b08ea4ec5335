use std::time::Duration;

use harvester_core::{FailureKind, NavigationPolicy};
use harvester_engine::{FetchSettings, Fetcher, HttpFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(FetchSettings::default()).expect("client builds")
}

#[test]
fn invalid_certificates_are_accepted_by_default() {
    // Small business sites often serve expired or self-signed certificates.
    assert!(FetchSettings::default().accept_invalid_certs);
    assert!(HttpFetcher::new(FetchSettings::default()).is_ok());
}

#[tokio::test]
async fn page_content_and_anchors_are_returned_in_dom_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r##"<html><body>
                 <a href="/about">About   us</a>
                 <a href="#top">Top</a>
                 <a href="https://elsewhere.example/contact">Contact</a>
               </body></html>"##,
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let url = format!("{}/home", server.uri());
    let page = fetcher()
        .fetch(&url, NavigationPolicy::NetworkIdle, TIMEOUT)
        .await
        .expect("fetch ok");

    assert_eq!(page.requested_url, url);
    assert_eq!(page.final_url, url);
    assert!(page.content.contains("About"));
    let anchors: Vec<(&str, &str)> = page
        .anchors
        .iter()
        .map(|a| (a.text.as_str(), a.href.as_str()))
        .collect();
    let about = format!("{}/about", server.uri());
    assert_eq!(
        anchors,
        vec![
            ("About us", about.as_str()),
            ("Contact", "https://elsewhere.example/contact"),
        ]
    );
}

#[tokio::test]
async fn error_status_is_reported_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/missing", server.uri()), NavigationPolicy::NetworkIdle, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html></html>", "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(
            &format!("{}/slow", server.uri()),
            NavigationPolicy::NetworkIdle,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn non_http_scheme_is_an_invalid_url() {
    let err = fetcher()
        .fetch("ftp://files.example/", NavigationPolicy::NetworkIdle, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);

    let err = fetcher()
        .fetch("https://", NavigationPolicy::NetworkIdle, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn disallowed_content_type_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "image/png"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/logo", server.uri()), NavigationPolicy::NetworkIdle, TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
}
