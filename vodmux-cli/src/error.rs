use vodmux_engine::HlsDownloadError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Download failed: {0}")]
    Download(#[from] HlsDownloadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
