//! Digester engine: network IO, content processing and rendering.
mod decode;
mod extract;
mod fetch;
mod filter;
mod fragment;
mod pipeline;
mod process;
mod rate_limit;
pub mod render;
pub mod source;
mod types;

pub use decode::{decode_html, decode_html_lossy, DecodeError, DecodedHtml};
pub use extract::{ExtractError, ExtractedContent, Extractor, ReadabilityExtractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_MAX_BYTES};
pub use filter::{remove_tags, IMAGE_TAGS, TABLE_TAGS, VIDEO_TAGS};
pub use fragment::{parse_fragment, serialize_fragment, serialize_fragment_xhtml, FragmentError};
pub use pipeline::{DigestPipeline, PipelineError, SourceEntry};
pub use process::{
    processor_by_name, processors_from_names, ProcessError, ProcessOptions, Processor,
    ReadabilityProcessor, SanitizerProcessor, AVAILABLE_PROCESSORS,
};
pub use rate_limit::{LimitedFetcher, RateLimiter};
pub use render::{renderer_for, OutputFormat, RenderError, RenderOptions, Renderer};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
