use std::sync::Arc;

/// Error taxonomy for a download job.
///
/// Per-segment fetch and decrypt failures are recovered inside the batch
/// fetcher and never surface here; everything in this enum is either fatal
/// to the job or (`Transcode`) recovered by the remux fallback.
#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsDownloadError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("playlist error: {0}")]
    Parse(String),
    #[error("key fetch failed: {0}")]
    KeyFetch(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("unsupported encryption method: {0}")]
    UnsupportedMethod(String),
    #[error("transcode failed: {0}")]
    Transcode(String),
    #[error("download aborted")]
    Aborted,
    #[error("network error: {source}")]
    Network {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: Arc<std::io::Error>,
    },
}

// Manual From impls because the sources are Arc-wrapped to keep the enum Clone.
impl From<reqwest::Error> for HlsDownloadError {
    fn from(err: reqwest::Error) -> Self {
        HlsDownloadError::Network {
            source: Arc::new(err),
        }
    }
}

impl From<std::io::Error> for HlsDownloadError {
    fn from(err: std::io::Error) -> Self {
        HlsDownloadError::Io {
            source: Arc::new(err),
        }
    }
}
