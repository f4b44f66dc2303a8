use std::fs;

use digester_app::config::Config;
use digester_app::run;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn feed_server() -> MockServer {
    let server = MockServer::start().await;
    let feed = format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title><link>{base}</link><description>d</description>
<item><title>Zeta</title><link>{base}/z</link><description>&lt;p&gt;Zeta body&lt;/p&gt;</description></item>
<item><title>Alpha</title><link>{base}/a</link><description>&lt;p&gt;Alpha body&lt;/p&gt;</description></item>
<item><title>Blocked</title><link>{base}/b</link><description>&lt;p&gt;spam here&lt;/p&gt;</description></item>
</channel></rss>"#,
        base = server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(feed, "application/rss+xml"))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, output: &std::path::Path, format: &str) -> Config {
    Config::parse(&format!(
        r#"
[digest]
title = "Test digest"
format = "{format}"
output_path = "{output}"
sort = ["Title:asc"]

[fetcher]
rate_limit_secs = 0

[processing]
processors = ["sanitizer"]

[[sources]]
type = "rss"
name = "Mock feed"
url = "{base}/feed.xml"
word_denylist = ["spam"]
"#,
        output = output.display().to_string().replace('\\', "/"),
        base = server.uri()
    ))
    .unwrap()
}

#[tokio::test]
async fn run_writes_sorted_filtered_markdown() {
    let server = feed_server().await;
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("digest.md");
    let config = config_for(&server, &target, "markdown");

    let written = run(&config, &CancellationToken::new()).await.unwrap();
    assert_eq!(written, target);

    let text = fs::read_to_string(&target).unwrap();
    assert!(text.starts_with("# Test digest\n"));
    let alpha = text.find("## Alpha").unwrap();
    let zeta = text.find("## Zeta").unwrap();
    assert!(alpha < zeta);
    assert!(!text.contains("Blocked"));
    assert!(text.contains("**Source:** [Mock feed]"));
}

#[tokio::test]
async fn run_writes_epub() {
    let server = feed_server().await;
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("digest.epub");
    let config = config_for(&server, &target, "epub");

    run(&config, &CancellationToken::new()).await.unwrap();
    let bytes = fs::read(&target).unwrap();
    // Zip local file header.
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn cancelled_run_leaves_no_output() {
    let server = feed_server().await;
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("digest.md");
    let config = config_for(&server, &target, "markdown");

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(run(&config, &cancel).await.is_err());
    assert!(!target.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}
