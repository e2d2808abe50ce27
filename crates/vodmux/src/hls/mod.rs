// HLS retrieval-and-reassembly pipeline.

pub mod config;
pub mod decryption;
pub mod downloader;
pub mod fetcher;
pub mod observer;
pub mod playlist;
pub mod remux;
pub mod sink;

// Re-exports for easier access
pub use config::HlsConfig;
pub use decryption::{EncryptionContext, KeyFetcher};
pub use downloader::HlsDownloader;
pub use fetcher::{BatchFetcher, FetchedSegment, HttpSegmentFetcher, SegmentDownloader};
pub use observer::{DownloadObserver, NoopObserver};
pub use playlist::{PlaylistFetcher, PlaylistResolver, ResolvedPlaylist, SegmentEntry};
pub use remux::{RemuxOutput, Remuxer, TranscodeChunk, Transcoder};
pub use sink::{ContainerFormat, DownloadSink, OutputArtifact};
