use digester_core::Article;
use digester_engine::{
    processors_from_names, remove_tags, ExtractError, ExtractedContent, Extractor, ProcessError,
    ProcessOptions, Processor, ReadabilityProcessor, SanitizerProcessor, TABLE_TAGS,
};
use pretty_assertions::assert_eq;

/// Returns a fixed extraction regardless of input.
struct FixedExtractor(ExtractedContent);

impl Extractor for FixedExtractor {
    fn extract(
        &self,
        _html: &str,
        _base_url: &str,
        _classes_to_preserve: &[String],
    ) -> Result<ExtractedContent, ExtractError> {
        Ok(self.0.clone())
    }
}

fn processor_returning(content_html: &str) -> ReadabilityProcessor {
    ReadabilityProcessor::new(Box::new(FixedExtractor(ExtractedContent {
        title: Some("Extracted title".to_string()),
        byline: Some("Extracted author".to_string()),
        excerpt: Some("Extracted excerpt".to_string()),
        content_html: content_html.to_string(),
    })))
}

fn article_with_content(content: &str) -> Article {
    let mut article = Article::new("", "https://example.test/post");
    article.content = content.to_string();
    article
}

#[test]
fn long_content_is_cut_to_max_length() {
    let processor = processor_returning(&"a".repeat(80));
    let options = ProcessOptions {
        min_content_length: 10,
        max_content_length: 20,
        ..ProcessOptions::default()
    };
    let mut article = article_with_content("<html><body>anything</body></html>");
    processor.process(&mut article, &options).unwrap();
    assert_eq!(article.content.len(), 20);
}

#[test]
fn short_content_fails_with_content_processing_failed() {
    let processor = processor_returning("<p>tiny</p>");
    let mut article = article_with_content("<p>tiny</p>");
    let err = processor
        .process(&mut article, &ProcessOptions::default())
        .unwrap_err();
    assert!(err.is_content_processing_failed());
    assert!(matches!(
        err,
        ProcessError::ContentProcessingFailed { actual: 11, min: 100 }
    ));
}

#[test]
fn empty_content_is_left_alone() {
    let processor = processor_returning("should not be used");
    let mut article = article_with_content("");
    processor
        .process(&mut article, &ProcessOptions::default())
        .unwrap();
    assert_eq!(article.content, "");
    assert_eq!(article.title, "");
}

#[test]
fn invalid_article_url_is_rejected() {
    let processor = processor_returning(&"a".repeat(200));
    let mut article = article_with_content("<p>body</p>");
    article.url = "::not a url::".to_string();
    let err = processor
        .process(&mut article, &ProcessOptions::default())
        .unwrap_err();
    assert!(matches!(err, ProcessError::InvalidUrl { .. }));
}

#[test]
fn extraction_fills_only_missing_fields() {
    let processor = processor_returning(&"x".repeat(150));
    let mut article = article_with_content("<p>body</p>");
    article.author = "Feed author".to_string();
    processor
        .process(&mut article, &ProcessOptions::default())
        .unwrap();
    assert_eq!(article.title, "Extracted title");
    assert_eq!(article.author, "Feed author");
    assert_eq!(article.summary, "Extracted excerpt");
}

#[test]
fn excluded_tables_are_removed_and_text_kept() {
    let body = format!(
        "<p>{}</p><table><tr><td>cell</td></tr></table><p>after</p>",
        "lead ".repeat(30)
    );
    let processor = processor_returning(&body);
    let options = ProcessOptions {
        include_tables: false,
        ..ProcessOptions::default()
    };
    let mut article = article_with_content("<p>body</p>");
    processor.process(&mut article, &options).unwrap();

    assert!(!article.content.contains("<table"));
    assert!(!article.content.contains("cell"));
    assert!(article.content.contains("after"));
    assert!(!article.content.contains("<html>"));
}

#[test]
fn remove_tags_handles_nesting() {
    let html = "<div><table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table><p>kept</p></div>";
    let out = remove_tags(html, TABLE_TAGS).unwrap();
    assert_eq!(out, "<div><p>kept</p></div>");
}

#[test]
fn remove_tags_drops_videos_and_iframes() {
    let html = r#"<p>a</p><video src="v.mp4"></video><iframe src="https://x.test"></iframe><p>b</p>"#;
    let out = remove_tags(html, digester_engine::VIDEO_TAGS).unwrap();
    assert_eq!(out, "<p>a</p><p>b</p>");
}

#[test]
fn sanitizer_strips_scripts_and_keeps_data_images() {
    let mut article = article_with_content(
        r#"<p onclick="x()">hi</p><script>alert(1)</script><img src="data:image/png;base64,AAAA">"#,
    );
    SanitizerProcessor
        .process(&mut article, &ProcessOptions::default())
        .unwrap();
    assert!(!article.content.contains("script"));
    assert!(!article.content.contains("onclick"));
    assert!(article.content.contains("data:image/png;base64,AAAA"));
}

#[test]
fn processors_resolve_by_name() {
    let chain = processors_from_names(&["readability", "sanitizer"]).unwrap();
    let names: Vec<_> = chain.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["readability", "sanitizer"]);

    assert!(matches!(
        processors_from_names(&["nope"]),
        Err(ProcessError::UnknownProcessor(_))
    ));
}
