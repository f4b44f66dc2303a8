use std::io::Write;

use digester_core::Digest;

use crate::render::{format_timestamp, RenderError, RenderOptions, Renderer};

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// `html2md` with runs of blank lines collapsed and the ends trimmed, so
/// the converted body sits cleanly under its heading.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        collapse_blank_lines(&html2md::parse_html(html))
    }
}

fn collapse_blank_lines(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

/// Linear Markdown document: contents list with in-document anchors, then
/// every article in order separated by horizontal rules.
pub struct MarkdownRenderer {
    converter: Box<dyn Converter>,
}

impl MarkdownRenderer {
    pub fn new(converter: Box<dyn Converter>) -> Self {
        Self { converter }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(Box::new(Html2MdConverter))
    }
}

#[async_trait::async_trait]
impl Renderer for MarkdownRenderer {
    async fn render(
        &self,
        digest: &Digest,
        options: &RenderOptions,
        writer: &mut (dyn Write + Send),
    ) -> Result<(), RenderError> {
        write_document(self.converter.as_ref(), digest, options, writer)?;
        Ok(())
    }
}

fn write_document(
    converter: &dyn Converter,
    digest: &Digest,
    options: &RenderOptions,
    w: &mut (dyn Write + Send),
) -> std::io::Result<()> {
    writeln!(w, "# {}\n", digest.title)?;
    writeln!(w, "Generated on: {}\n", format_timestamp(&digest.generated_at))?;
    writeln!(w, "## Contents\n")?;
    for (i, article) in digest.articles.iter().enumerate() {
        writeln!(w, "{}. [{}](#article-{})", i + 1, article.title, i + 1)?;
    }
    writeln!(w)?;

    let last = digest.articles.len().saturating_sub(1);
    for (i, article) in digest.articles.iter().enumerate() {
        writeln!(w, "<a id=\"article-{}\"></a>", i + 1)?;
        writeln!(w, "## {}\n", article.title)?;

        if !article.author.is_empty() {
            writeln!(w, "**Author:** {}  ", article.author)?;
        }
        if let Some(published) = &article.published_at {
            writeln!(w, "**Published:** {}  ", format_timestamp(published))?;
        }
        writeln!(w, "**Source:** [{}]({})  \n", article.source_name, article.url)?;

        if !article.tags.is_empty() {
            writeln!(w, "**Tags:** {}  \n", article.tags.join(", "))?;
        }

        if options.include_summary && !article.summary.is_empty() {
            writeln!(w, "### Summary\n\n{}\n", article.summary)?;
        }

        writeln!(w, "### Content\n\n{}\n", converter.to_markdown(&article.content))?;

        if options.include_metadata && !article.metadata.is_empty() {
            writeln!(w, "### Metadata\n")?;
            for (key, value) in &article.metadata {
                writeln!(w, "- **{key}:** {value}")?;
            }
            writeln!(w)?;
        }

        if i < last {
            writeln!(w, "---\n")?;
        }
    }
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_runs_collapse() {
        assert_eq!(collapse_blank_lines("\n\na\n\n\n\nb  \n\n"), "a\n\nb");
    }
}
