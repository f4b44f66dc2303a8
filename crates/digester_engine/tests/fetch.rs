use std::time::Duration;

use digester_engine::{FailureKind, FetchSettings, Fetcher, ReqwestFetcher};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_with(settings: FetchSettings) -> ReqwestFetcher {
    ReqwestFetcher::new(settings).expect("client builds")
}

#[tokio::test]
async fn fetch_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<p>ok</p>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings::default());
    let url = format!("{}/doc", server.uri());
    let output = fetcher
        .fetch(&url, &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(output.bytes, b"<p>ok</p>");
    assert_eq!(output.metadata.url, url);
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.byte_len, 9);
    assert!(!output.metadata.truncated);
    assert!(output
        .metadata
        .content_type
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn fetch_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings::default());
    let url = format!("{}/missing", server.uri());
    let err = fetcher
        .fetch(&url, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetch_rejects_invalid_url() {
    let fetcher = fetcher_with(FetchSettings::default());
    let err = fetcher
        .fetch("not a url", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn fetch_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    });
    let url = format!("{}/slow", server.uri());
    let err = fetcher
        .fetch(&url, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetch_truncates_at_size_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("0123456789abcdef"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    });
    let url = format!("{}/large", server.uri());
    let output = fetcher
        .fetch(&url, &CancellationToken::new())
        .await
        .expect("truncated fetch still succeeds");
    assert_eq!(output.bytes, b"0123456789");
    assert!(output.metadata.truncated);
    assert_eq!(output.metadata.byte_len, 10);

    let text = fetcher
        .fetch_as_string(&url, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "0123456789");
}

#[tokio::test]
async fn stream_copies_whole_body_past_the_cap() {
    let server = MockServer::start().await;
    let body = vec![7u8; 4096];
    Mock::given(method("GET"))
        .and(path("/image.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "image/png"))
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    });
    let url = format!("{}/image.png", server.uri());
    let mut sink = Vec::new();
    let metadata = fetcher
        .stream(&url, &mut sink, &CancellationToken::new())
        .await
        .expect("stream ok");

    assert_eq!(sink, body);
    assert_eq!(metadata.byte_len, 4096);
    assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn cancelled_token_aborts_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_string("late"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings::default());
    let url = format!("{}/slow", server.uri());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = fetcher.fetch(&url, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn fetch_as_string_honours_declared_charset() {
    let server = MockServer::start().await;
    // "café" in ISO-8859-1
    Mock::given(method("GET"))
        .and(path("/latin1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(vec![b'c', b'a', b'f', 0xE9], "text/html; charset=ISO-8859-1"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_with(FetchSettings::default());
    let url = format!("{}/latin1", server.uri());
    let text = fetcher
        .fetch_as_string(&url, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "café");
}
