// HLS Segment Fetcher: downloads ordered segments in fixed-size batches of
// concurrent requests, tolerating per-segment failure.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::HlsDownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::EncryptionContext;
use crate::hls::observer::DownloadObserver;
use crate::hls::playlist::SegmentEntry;

/// One fetched (and decrypted) segment, still in playlist order.
#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub data: Bytes,
    pub discontinuity: bool,
    pub index: u64,
}

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    async fn download_segment(
        &self,
        segment: &SegmentEntry,
        token: &CancellationToken,
    ) -> Result<Bytes, HlsDownloadError>;
}

pub struct HttpSegmentFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl HttpSegmentFetcher {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Fetches a segment with retry logic.
    /// Retries on network errors and server errors (5xx); 4xx is terminal.
    async fn fetch_with_retries(&self, segment: &SegmentEntry) -> Result<Bytes, HlsDownloadError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self
                .http_client
                .get(segment.url.clone())
                .timeout(self.config.fetcher_config.segment_download_timeout)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        return response.bytes().await.map_err(HlsDownloadError::from);
                    } else if response.status().is_client_error() {
                        return Err(HlsDownloadError::Fetch(format!(
                            "client error {} for segment {}",
                            response.status(),
                            segment.url
                        )));
                    }
                    if attempts > self.config.fetcher_config.max_segment_retries {
                        return Err(HlsDownloadError::Fetch(format!(
                            "max retries ({}) exceeded for segment {}, last status: {}",
                            self.config.fetcher_config.max_segment_retries,
                            segment.url,
                            response.status()
                        )));
                    }
                }
                Err(e) => {
                    if !e.is_connect() && !e.is_timeout() && !e.is_request() {
                        return Err(HlsDownloadError::from(e));
                    }
                    if attempts > self.config.fetcher_config.max_segment_retries {
                        return Err(HlsDownloadError::Fetch(format!(
                            "max retries ({}) exceeded for segment {}: {e}",
                            self.config.fetcher_config.max_segment_retries, segment.url
                        )));
                    }
                }
            }

            let delay = self.config.fetcher_config.segment_retry_delay_base
                * (2_u32.pow(attempts.saturating_sub(1)));
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SegmentDownloader for HttpSegmentFetcher {
    async fn download_segment(
        &self,
        segment: &SegmentEntry,
        token: &CancellationToken,
    ) -> Result<Bytes, HlsDownloadError> {
        let data = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(HlsDownloadError::Aborted),
            res = self.fetch_with_retries(segment) => res?,
        };
        debug!(url = %segment.url, bytes = data.len(), "Segment downloaded");
        Ok(data)
    }
}

/// Drives segment retrieval over sequential fixed-size batches; within a
/// batch all fetches run concurrently.
pub struct BatchFetcher {
    downloader: Arc<dyn SegmentDownloader>,
    batch_size: usize,
}

impl BatchFetcher {
    pub fn new(downloader: Arc<dyn SegmentDownloader>, batch_size: usize) -> Self {
        Self {
            downloader,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetches and decrypts every segment. A failed fetch or decrypt drops
    /// that segment and the job continues; only cancellation terminates the
    /// fetch, discarding anything already gathered. Result order is always
    /// playlist order.
    pub async fn fetch_all(
        &self,
        segments: &[SegmentEntry],
        crypto: &EncryptionContext,
        token: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> Result<Vec<FetchedSegment>, HlsDownloadError> {
        let total = segments.len();
        let mut fetched = Vec::with_capacity(total);
        let mut attempted = 0usize;

        for batch in segments.chunks(self.batch_size) {
            if token.is_cancelled() {
                return Err(HlsDownloadError::Aborted);
            }

            let results = join_all(batch.iter().map(|segment| async move {
                self.downloader.download_segment(segment, token).await
            }))
            .await;

            for (segment, result) in batch.iter().zip(results) {
                match result {
                    Ok(raw) => match crypto.decrypt(raw, segment.index) {
                        Ok(data) => fetched.push(FetchedSegment {
                            data,
                            discontinuity: segment.discontinuity,
                            index: segment.index,
                        }),
                        Err(e) => {
                            warn!(url = %segment.url, error = %e, "Segment dropped: decryption failed");
                        }
                    },
                    Err(HlsDownloadError::Aborted) => return Err(HlsDownloadError::Aborted),
                    Err(e) => {
                        warn!(url = %segment.url, error = %e, "Segment dropped: fetch failed");
                    }
                }
            }

            // Progress counts segments attempted, not segments kept.
            attempted += batch.len();
            observer.on_progress(attempted.min(total), total);
        }

        Ok(fetched)
    }
}
