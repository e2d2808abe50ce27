// Output artifact types and the persistence collaborator contract.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::HlsDownloadError;

/// Container actually produced by the remux pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Fragmented MP4: init segment followed by media fragments.
    FragmentedMp4,
    /// Raw MPEG transport stream concatenation (fallback).
    MpegTs,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::FragmentedMp4 => ".mp4",
            ContainerFormat::MpegTs => ".ts",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::FragmentedMp4 => "video/mp4",
            ContainerFormat::MpegTs => "video/mp2t",
        }
    }
}

/// Final bytes, container type and suggested filename, owned until handed
/// to the sink.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub data: Bytes,
    pub container: ContainerFormat,
    /// Suggested filename, extension already normalized to `container`.
    pub filename: String,
}

/// Persistence collaborator. The engine never assumes synchronous
/// completion of the save action behind this call.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, artifact: OutputArtifact) -> Result<(), HlsDownloadError>;
}

const STRIPPED_EXTENSIONS: [&str; 4] = [".ts", ".mp4", ".m3u8", ".txt"];

/// Normalizes `base` into a filename whose extension matches the produced
/// container, stripping any stale media extension first.
pub fn suggested_filename(base: &str, container: ContainerFormat) -> String {
    let trimmed = base.trim();
    let base = if trimmed.is_empty() { "download" } else { trimmed };

    let lower = base.to_ascii_lowercase();
    let stem = STRIPPED_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &base[..base.len() - ext.len()])
        .unwrap_or(base);

    let stem = if stem.is_empty() { "download" } else { stem };
    format!("{stem}{}", container.extension())
}

/// Derives a base filename from the playlist URL's last path segment.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}
