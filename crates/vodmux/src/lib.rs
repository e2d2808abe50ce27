//! # vodmux
//!
//! A client-side retrieval-and-reassembly engine for HLS-style segmented
//! streaming media: resolves a playlist URL to a single media playlist,
//! retrieves and decrypts segments with bounded concurrency and
//! partial-failure tolerance, and reassembles them into one playable file,
//! falling back to a raw transport stream when remuxing is impossible.
//!
//! ## Features
//!
//! - Depth-bounded master playlist resolution (highest-bandwidth variant)
//! - AES-128-CBC segment decryption with derived or explicit IVs
//! - Batched concurrent segment retrieval that tolerates dropped segments
//! - Injected transcoder seam with a deterministic raw fallback
//! - Cooperative cancellation threaded through every network call
//!
//! Each job holds all fetched segment bytes in memory until assembly, so
//! achievable asset size is bounded by available memory.

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod hls;

pub use builder::DownloaderConfigBuilder;
pub use client::create_client;
pub use config::DownloaderConfig;
pub use error::HlsDownloadError;

pub use hls::{
    BatchFetcher, ContainerFormat, DownloadObserver, DownloadSink, EncryptionContext,
    FetchedSegment, HlsConfig, HlsDownloader, NoopObserver, OutputArtifact, PlaylistFetcher,
    PlaylistResolver, RemuxOutput, Remuxer, SegmentDownloader, SegmentEntry, TranscodeChunk,
    Transcoder,
};
