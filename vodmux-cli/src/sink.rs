use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use vodmux_engine::{DownloadSink, HlsDownloadError, OutputArtifact};

/// Sink that persists the artifact into a directory on the local filesystem.
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl DownloadSink for FileSink {
    async fn deliver(&self, artifact: OutputArtifact) -> Result<(), HlsDownloadError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&artifact.filename);
        tokio::fs::write(&path, &artifact.data).await?;
        info!(
            path = %path.display(),
            bytes = artifact.data.len(),
            mime = artifact.container.mime_type(),
            "Saved download"
        );
        Ok(())
    }
}
