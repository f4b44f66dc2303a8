use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use digester_core::{Article, SortField};
use digester_engine::source::{Source, SourceError};
use digester_engine::{
    DigestPipeline, FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher, PipelineError,
    ProcessOptions, SanitizerProcessor, SourceEntry,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

/// Fetcher that must never be reached by these sources.
struct NoNetwork;

#[async_trait::async_trait]
impl Fetcher for NoNetwork {
    async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<FetchOutput, FetchError> {
        Err(FetchError::new(FailureKind::Network, format!("unexpected fetch of {url}")))
    }

    async fn stream(
        &self,
        url: &str,
        _sink: &mut (dyn Write + Send),
        _cancel: &CancellationToken,
    ) -> Result<FetchMetadata, FetchError> {
        Err(FetchError::new(FailureKind::Network, format!("unexpected fetch of {url}")))
    }
}

enum Behaviour {
    Articles(Vec<Article>),
    Fail,
    Cancelled,
}

struct StaticSource {
    name: String,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    fn boxed(name: &str, behaviour: Behaviour) -> Box<dyn Source> {
        Box::new(Self {
            name: name.to_string(),
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait::async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _fetcher: &dyn Fetcher,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Article>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Articles(articles) => Ok(articles.clone()),
            Behaviour::Fail => Err(SourceError::InvalidConfig("broken".to_string())),
            Behaviour::Cancelled => Err(SourceError::Fetch {
                url: "https://x.test".to_string(),
                source: FetchError::cancelled(),
            }),
        }
    }
}

fn article(title: &str, url: &str, content: &str) -> Article {
    let mut article = Article::new(title, url);
    article.content = content.to_string();
    article
}

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(digester_logging::initialize_for_tests);
}

#[tokio::test]
async fn run_assembles_dedups_filters_and_sorts() {
    init_logging();
    let first = StaticSource::boxed(
        "one",
        Behaviour::Articles(vec![
            article("Beta", "https://a.test/b", "<p>fine</p>"),
            article("Crypto news", "https://a.test/c", "<p>coins</p>"),
            article("Alpha", "https://a.test/a", "<p>fine</p>"),
        ]),
    );
    let broken = StaticSource::boxed("broken", Behaviour::Fail);
    let second = StaticSource::boxed(
        "two",
        Behaviour::Articles(vec![
            article("Alpha again", "https://a.test/a", "<p>dup</p>"),
            article("Gamma", "https://a.test/g", "<p>crypto inside</p>"),
        ]),
    );

    let mut pipeline = DigestPipeline::new(vec![
        SourceEntry::new(first).with_denylist(vec!["CRYPTO".to_string()]),
        SourceEntry::new(broken),
        SourceEntry::new(second),
    ]);
    pipeline.processors = vec![Box::new(SanitizerProcessor)];
    pipeline.process_options = ProcessOptions::default();
    pipeline.sort_fields = vec!["Title:asc".parse::<SortField>().unwrap()];

    let digest = pipeline
        .run(&NoNetwork, "Morning", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(digest.title, "Morning");
    let titles: Vec<_> = digest.articles.iter().map(|a| a.title.as_str()).collect();
    // The denylist only applies to its own source, so Gamma survives.
    assert_eq!(titles, vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn cancelled_source_stops_the_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let after = Box::new(StaticSource {
        name: "after".to_string(),
        behaviour: Behaviour::Articles(Vec::new()),
        calls: calls.clone(),
    });
    let pipeline = DigestPipeline::new(vec![
        SourceEntry::new(StaticSource::boxed("cancelled", Behaviour::Cancelled)),
        SourceEntry::new(after),
    ]);

    let err = pipeline
        .run(&NoNetwork, "t", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pre_cancelled_token_fetches_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = Box::new(StaticSource {
        name: "s".to_string(),
        behaviour: Behaviour::Articles(Vec::new()),
        calls: calls.clone(),
    });
    let pipeline = DigestPipeline::new(vec![SourceEntry::new(source)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.run(&NoNetwork, "t", &cancel).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn articles_failing_processing_are_dropped() {
    init_logging();
    let source = StaticSource::boxed(
        "s",
        Behaviour::Articles(vec![
            article("Short", "https://a.test/short", "<p>tiny</p>"),
            article("Bad url", "not a url", "<p>x</p>"),
        ]),
    );
    let mut pipeline = DigestPipeline::new(vec![SourceEntry::new(source)]);
    pipeline.processors = digester_engine::processors_from_names(&["readability"]).unwrap();

    let digest = pipeline
        .run(&NoNetwork, "t", &CancellationToken::new())
        .await
        .unwrap();
    assert!(digest.articles.is_empty());
}
