use std::time::Duration;

use crate::DownloaderConfig;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base transport configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub fetcher_config: HlsFetcherConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    pub playlist_fetch_timeout: Duration,
    /// Hard cap on master -> media resolution hops. A malformed playlist can
    /// reference itself, so resolution must be depth-bounded.
    pub max_resolution_depth: u32,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(15),
            max_resolution_depth: 5,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    /// Number of segments fetched concurrently per batch. Batches run
    /// strictly in sequence, so this also bounds total concurrency.
    pub segment_batch_size: usize,
    pub segment_download_timeout: Duration,
    pub max_segment_retries: u32,
    pub segment_retry_delay_base: Duration, // Base for exponential backoff
    pub key_download_timeout: Duration,
    pub max_key_retries: u32,
    pub key_retry_delay_base: Duration,
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            segment_batch_size: 5,
            segment_download_timeout: Duration::from_secs(10),
            max_segment_retries: 3,
            segment_retry_delay_base: Duration::from_millis(500),
            key_download_timeout: Duration::from_secs(5),
            max_key_retries: 3,
            key_retry_delay_base: Duration::from_millis(200),
        }
    }
}
