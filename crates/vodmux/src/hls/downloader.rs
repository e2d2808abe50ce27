// HLS download job orchestrator: playlist resolution, encryption setup,
// batched segment retrieval, remux and delivery to the sink.

use m3u8_rs::KeyMethod;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::HlsDownloadError;
use crate::client::create_client;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::{EncryptionContext, KeyFetcher};
use crate::hls::fetcher::{BatchFetcher, HttpSegmentFetcher, SegmentDownloader};
use crate::hls::observer::DownloadObserver;
use crate::hls::playlist::PlaylistResolver;
use crate::hls::remux::{Remuxer, Transcoder};
use crate::hls::sink::{
    ContainerFormat, DownloadSink, OutputArtifact, filename_from_url, suggested_filename,
};

pub struct HlsDownloader {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, HlsDownloadError> {
        let http_client = create_client(&config.base)?;
        Ok(Self {
            http_client,
            config: Arc::new(config),
        })
    }

    /// Build with an externally constructed client, e.g. to share one
    /// connection pool across jobs.
    pub fn with_client(http_client: Client, config: HlsConfig) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    /// Runs one download job end to end and hands the artifact to `sink`.
    ///
    /// `transcoder` is the job's remux capability; `None` means every
    /// artifact takes the raw transport-stream path. The token is honored
    /// at every network suspension point; once cancelled the job resolves
    /// to [`HlsDownloadError::Aborted`] with no artifact delivered.
    pub async fn download(
        &self,
        url: &str,
        filename: Option<&str>,
        transcoder: Option<Box<dyn Transcoder>>,
        sink: &dyn DownloadSink,
        observer: &dyn DownloadObserver,
        token: &CancellationToken,
    ) -> Result<(), HlsDownloadError> {
        match self
            .run_job(url, filename, transcoder, sink, observer, token)
            .await
        {
            Ok(()) => {
                observer.on_status("Done!");
                Ok(())
            }
            Err(e) => {
                observer.on_status(&format!("Error: {e}"));
                Err(e)
            }
        }
    }

    async fn run_job(
        &self,
        url: &str,
        filename: Option<&str>,
        transcoder: Option<Box<dyn Transcoder>>,
        sink: &dyn DownloadSink,
        observer: &dyn DownloadObserver,
        token: &CancellationToken,
    ) -> Result<(), HlsDownloadError> {
        observer.on_status("Fetching playlist...");
        let resolver = PlaylistResolver::new(self.http_client.clone(), Arc::clone(&self.config));
        let resolved = resolver.resolve(url, token, observer).await?;

        let wants_decryption = resolved
            .key
            .as_ref()
            .is_some_and(|k| k.method == KeyMethod::AES128);
        if wants_decryption {
            observer.on_status("Detected AES-128 encryption, fetching key...");
        }
        let key_fetcher = KeyFetcher::new(self.http_client.clone(), Arc::clone(&self.config));
        let crypto = EncryptionContext::build(&resolved, &key_fetcher, token).await?;
        if wants_decryption {
            observer.on_status("Key fetched, decryption enabled.");
        }

        let total = resolved.segments.len();
        observer.on_status(&format!("Found {total} segments, starting download..."));
        info!(url = %resolved.url, segments = total, encrypted = !crypto.is_clear(), "Starting segment retrieval");

        let segment_downloader: Arc<dyn SegmentDownloader> = Arc::new(HttpSegmentFetcher::new(
            self.http_client.clone(),
            Arc::clone(&self.config),
        ));
        let fetcher = BatchFetcher::new(
            segment_downloader,
            self.config.fetcher_config.segment_batch_size,
        );
        let fetched = fetcher
            .fetch_all(&resolved.segments, &crypto, token, observer)
            .await?;
        debug!(kept = fetched.len(), total, "Segment retrieval finished");

        let mut remuxer = Remuxer::new(transcoder);
        let had_transcoder = remuxer.has_transcoder();
        if had_transcoder {
            observer.on_status("Merging and converting to MP4...");
        } else {
            observer.on_status("Merging segments...");
        }
        let output = remuxer.remux(&fetched);
        if had_transcoder && output.container == ContainerFormat::MpegTs {
            observer.on_status("Transmuxing failed, saving as raw transport stream...");
        }

        let base = match filename {
            Some(name) => name.to_string(),
            None => filename_from_url(&resolved.url),
        };
        let artifact = OutputArtifact {
            filename: suggested_filename(&base, output.container),
            data: output.data,
            container: output.container,
        };
        info!(
            filename = %artifact.filename,
            bytes = artifact.data.len(),
            mime = artifact.container.mime_type(),
            "Delivering artifact"
        );
        sink.deliver(artifact).await
    }
}
