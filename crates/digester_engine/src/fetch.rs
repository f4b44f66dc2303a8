use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use digester_logging::digester_debug;

use crate::decode::{decode_html, decode_html_lossy};
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Default response size cap for buffered fetches.
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Buffered bodies are truncated, not rejected, past this size.
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("digester/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            redirect_limit: 5,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body, truncated at the implementation's size cap.
    async fn fetch(&self, url: &str, cancel: &CancellationToken)
        -> Result<FetchOutput, FetchError>;

    /// Fetch and decode the body to UTF-8.
    async fn fetch_as_string(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let output = self.fetch(url, cancel).await?;
        body_to_string(&output)
    }

    /// Copy the body into `sink` chunk by chunk without buffering it.
    async fn stream(
        &self,
        url: &str,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<FetchMetadata, FetchError>;
}

#[async_trait::async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchOutput, FetchError> {
        (**self).fetch(url, cancel).await
    }

    async fn fetch_as_string(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        (**self).fetch_as_string(url, cancel).await
    }

    async fn stream(
        &self,
        url: &str,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<FetchMetadata, FetchError> {
        (**self).stream(url, sink, cancel).await
    }
}

pub(crate) fn body_to_string(output: &FetchOutput) -> Result<String, FetchError> {
    let content_type = output.metadata.content_type.as_deref();
    if output.metadata.truncated {
        // The cut may land inside a multi-byte sequence.
        return Ok(decode_html_lossy(&output.bytes, content_type).html);
    }
    decode_html(&output.bytes, content_type)
        .map(|decoded| decoded.html)
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    async fn send(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            result = self.client.get(parsed).send() => result.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }
}

fn metadata_for(url: &str, response: &reqwest::Response) -> FetchMetadata {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    FetchMetadata {
        url: url.to_string(),
        final_url: response.url().to_string(),
        content_type,
        byte_len: 0,
        truncated: false,
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchOutput, FetchError> {
        let response = self.send(url, cancel).await?;
        let mut metadata = metadata_for(url, &response);
        let max_bytes = usize::try_from(self.settings.max_bytes).unwrap_or(usize::MAX);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(map_reqwest_error)?;

            let remaining = max_bytes - bytes.len();
            if chunk.len() > remaining {
                bytes.extend_from_slice(&chunk[..remaining]);
                metadata.truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        if metadata.truncated {
            digester_debug!(
                "response from {} truncated at {} bytes",
                url,
                max_bytes
            );
        }
        metadata.byte_len = bytes.len() as u64;
        Ok(FetchOutput { bytes, metadata })
    }

    async fn stream(
        &self,
        url: &str,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<FetchMetadata, FetchError> {
        let response = self.send(url, cancel).await?;
        let mut metadata = metadata_for(url, &response);

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(map_reqwest_error)?;
            sink.write_all(&chunk)
                .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
            metadata.byte_len += chunk.len() as u64;
        }
        sink.flush()
            .map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;

        Ok(metadata)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
