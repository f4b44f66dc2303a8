use std::io::Write;

use digester_core::{Article, Digest};
use digester_logging::{digester_info, digester_warn};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::fragment::{parse_fragment, serialize_fragment_xhtml, FragmentError};
use crate::render::assets::AssetStore;
use crate::render::images::{embed_article_images, EmbedError};
use crate::render::{format_timestamp, RenderError, RenderOptions, Renderer};

const TOC_FILE: &str = "toc.xhtml";

/// Packages a digest as an EPUB 3 book: one table of contents page followed
/// by one section per article, optionally with images downloaded into the
/// package.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpubRenderer;

struct Section {
    title: String,
    markup: String,
}

#[async_trait::async_trait]
impl Renderer for EpubRenderer {
    async fn render(
        &self,
        digest: &Digest,
        options: &RenderOptions,
        writer: &mut (dyn Write + Send),
    ) -> Result<(), RenderError> {
        let fetcher = match (options.store_images, options.fetcher.as_ref()) {
            (false, _) => None,
            (true, None) => return Err(RenderError::MissingFetcher),
            (true, Some(fetcher)) => Some(fetcher.clone()),
        };
        let mut store = if fetcher.is_some() {
            Some(match &options.scratch_dir {
                Some(parent) => AssetStore::new_in(parent)?,
                None => AssetStore::new()?,
            })
        } else {
            None
        };

        let mut sections = Vec::with_capacity(digest.articles.len());
        for (i, article) in digest.articles.iter().enumerate() {
            let mut content = article.content.clone();
            if let (Some(fetcher), Some(store)) = (fetcher.as_deref(), store.as_mut()) {
                match embed_article_images(&content, &article.url, fetcher, store, &options.cancel)
                    .await
                {
                    Ok(rewritten) => content = rewritten,
                    Err(EmbedError::Cancelled) => return Err(RenderError::Cancelled),
                    Err(err) => digester_warn!(
                        "keeping original image sources for article {}: {}",
                        i + 1,
                        err
                    ),
                }
            }
            let content = xhtml_content(&content).map_err(|err| RenderError::Section {
                index: i + 1,
                message: err.to_string(),
            })?;
            sections.push(Section {
                title: article.title.clone(),
                markup: article_page(article, &content, options),
            });
        }

        if let Some(store) = &store {
            digester_info!(
                "packaging {} articles with {} embedded images",
                sections.len(),
                store.len()
            );
        }
        package(digest, &sections, store.as_ref(), writer)
    }
}

fn package(
    digest: &Digest,
    sections: &[Section],
    store: Option<&AssetStore>,
    writer: &mut (dyn Write + Send),
) -> Result<(), RenderError> {
    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(package_err)?).map_err(package_err)?;
    builder.epub_version(EpubVersion::V30);
    builder
        .metadata("title", digest.title.as_str())
        .map_err(package_err)?;
    builder
        .metadata("author", format!("digester v{}", env!("CARGO_PKG_VERSION")))
        .map_err(package_err)?;
    builder
        .metadata(
            "description",
            format!("Digest generated on {}", format_timestamp(&digest.generated_at)),
        )
        .map_err(package_err)?;

    if let Some(store) = store {
        for asset in store.assets() {
            let file = asset.open()?;
            builder
                .add_resource(&asset.href, file, asset.mime.as_str())
                .map_err(package_err)?;
        }
    }

    let toc = toc_page(digest);
    builder
        .add_content(
            EpubContent::new(TOC_FILE, toc.as_bytes())
                .title("Table of Contents")
                .reftype(ReferenceType::Toc),
        )
        .map_err(|err| RenderError::Section {
            index: 0,
            message: err.to_string(),
        })?;

    for (i, section) in sections.iter().enumerate() {
        let index = i + 1;
        builder
            .add_content(
                EpubContent::new(article_file(index), section.markup.as_bytes())
                    .title(section.title.as_str())
                    .reftype(ReferenceType::Text),
            )
            .map_err(|err| RenderError::Section {
                index,
                message: err.to_string(),
            })?;
    }

    builder.generate(&mut *writer).map_err(package_err)?;
    writer.flush()?;
    Ok(())
}

/// Article bodies are HTML5 fragments; EPUB content documents are XML.
fn xhtml_content(content: &str) -> Result<String, FragmentError> {
    serialize_fragment_xhtml(&parse_fragment(content))
}

fn package_err(err: impl std::fmt::Display) -> RenderError {
    RenderError::Package(err.to_string())
}

fn article_file(index: usize) -> String {
    format!("article-{index}.xhtml")
}

fn xhtml_page(title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n\
         <head>\n<meta charset=\"UTF-8\"/>\n<title>{}</title>\n</head>\n\
         <body>\n{}</body>\n</html>\n",
        text(title),
        body
    )
}

fn toc_page(digest: &Digest) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", text(&digest.title)));
    body.push_str(&format!(
        "<p>Generated on {}</p>\n",
        text(&format_timestamp(&digest.generated_at))
    ));
    body.push_str("<nav epub:type=\"toc\">\n<ol>\n");
    for (i, article) in digest.articles.iter().enumerate() {
        body.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            article_file(i + 1),
            text(&article.title)
        ));
    }
    body.push_str("</ol>\n</nav>\n");
    xhtml_page(&digest.title, &body)
}

fn article_page(article: &Article, content: &str, options: &RenderOptions) -> String {
    let mut body = format!("<h1>{}</h1>\n", text(&article.title));

    let mut meta = Vec::new();
    if !article.author.is_empty() {
        meta.push(format!("By {}", text(&article.author)));
    }
    if let Some(published) = &article.published_at {
        meta.push(text(&format_timestamp(published)).into_owned());
    }
    if !article.url.is_empty() {
        let label = if article.source_name.is_empty() {
            "Link"
        } else {
            article.source_name.as_str()
        };
        meta.push(format!(
            "<a href=\"{}\">{}</a>",
            attr(&article.url),
            text(label)
        ));
    }
    if !meta.is_empty() {
        body.push_str(&format!("<p class=\"meta\">{}</p>\n", meta.join(" | ")));
    }
    if !article.tags.is_empty() {
        let tags: Vec<String> = article.tags.iter().map(|t| text(t).into_owned()).collect();
        body.push_str(&format!("<p class=\"tags\">Tags: {}</p>\n", tags.join(", ")));
    }

    if options.include_summary && !article.summary.is_empty() {
        body.push_str(&format!(
            "<blockquote class=\"summary\"><p>{}</p></blockquote>\n",
            text(&article.summary)
        ));
    }

    body.push_str("<div class=\"content\">\n");
    body.push_str(content);
    body.push_str("\n</div>\n");

    if options.include_metadata && !article.metadata.is_empty() {
        body.push_str("<dl class=\"metadata\">\n");
        for (key, value) in &article.metadata {
            body.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>\n",
                text(key),
                text(&value.to_string())
            ));
        }
        body.push_str("</dl>\n");
    }

    xhtml_page(&article.title, &body)
}
