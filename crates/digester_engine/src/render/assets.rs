use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest as _, Sha256};
use tempfile::{NamedTempFile, TempDir, TempPath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("downloaded image is empty")]
    Empty,
    #[error("content type {0:?} is not an image")]
    NotAnImage(String),
    #[error("cannot determine image type of {0}")]
    UnknownType(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn scratch_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("digester-images-");
    builder
}

/// A downloaded image waiting to be written into the package.
#[derive(Debug)]
pub struct PackagedAsset {
    /// Path inside the package, relative to the content directory.
    pub href: String,
    pub mime: String,
    path: TempPath,
}

impl PackagedAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// Render-scoped scratch space for embedded images.
///
/// Bytes stay on disk until the package is written; dropping the store
/// removes the directory and every file in it.
#[derive(Debug)]
pub struct AssetStore {
    assets: Vec<PackagedAsset>,
    next_index: usize,
    dir: TempDir,
}

impl AssetStore {
    pub fn new() -> io::Result<Self> {
        Ok(Self::from_dir(scratch_builder().tempdir()?))
    }

    /// Like [`AssetStore::new`] but creates the scratch directory in `parent`.
    pub fn new_in(parent: &Path) -> io::Result<Self> {
        Ok(Self::from_dir(scratch_builder().tempdir_in(parent)?))
    }

    fn from_dir(dir: TempDir) -> Self {
        Self {
            assets: Vec::new(),
            next_index: 1,
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn temp_file(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(self.dir.path())
    }

    /// Take ownership of a downloaded file and assign it a package path.
    /// The file is rejected (and deleted) if it is empty or not an image.
    pub fn register(
        &mut self,
        file: NamedTempFile,
        source_url: &str,
        content_type: Option<&str>,
    ) -> Result<&PackagedAsset, AssetError> {
        if file.as_file().metadata()?.len() == 0 {
            return Err(AssetError::Empty);
        }
        let mime = image_mime(source_url, content_type)?;
        let href = format!(
            "images/img-{:04}-{}.{}",
            self.next_index,
            short_hash(source_url),
            extension_for(&mime)
        );
        self.next_index += 1;
        self.assets.push(PackagedAsset {
            href,
            mime,
            path: file.into_temp_path(),
        });
        let last = self.assets.len() - 1;
        Ok(&self.assets[last])
    }

    pub fn mark(&self) -> usize {
        self.assets.len()
    }

    /// Forget (and delete) everything registered after `mark`.
    pub fn rollback_to(&mut self, mark: usize) {
        self.assets.truncate(mark);
    }

    pub fn assets(&self) -> &[PackagedAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn image_mime(source_url: &str, content_type: Option<&str>) -> Result<String, AssetError> {
    if let Some(raw) = content_type {
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.starts_with("image/") {
            return Ok(essence);
        }
        // Servers commonly label images as octet-stream; fall back to the URL then.
        if !essence.is_empty() && essence != "application/octet-stream" {
            return Err(AssetError::NotAnImage(essence));
        }
    }
    mime_from_url(source_url).ok_or_else(|| AssetError::UnknownType(source_url.to_string()))
}

fn mime_from_url(source_url: &str) -> Option<String> {
    let path = url::Url::parse(source_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| source_url.to_string());
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn extension_for(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        other => other
            .strip_prefix("image/")
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("img"),
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
