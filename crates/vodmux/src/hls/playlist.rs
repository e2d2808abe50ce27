// HLS Playlist Resolver: fetches playlist documents and resolves master
// playlists down to a single media playlist.

use std::sync::Arc;

use async_trait::async_trait;
use m3u8_rs::{Key, MasterPlaylist, MediaPlaylist, VariantStream, parse_playlist_res};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::HlsDownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::observer::DownloadObserver;

/// One addressable media chunk, in playlist (assembly) order.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// Absolute segment URL.
    pub url: Url,
    /// True when a discontinuity marker immediately precedes this segment.
    pub discontinuity: bool,
    /// Position within the playlist, used for IV derivation.
    pub index: u64,
}

/// The single media playlist a job operates on, after variant resolution.
#[derive(Debug, Clone)]
pub struct ResolvedPlaylist {
    /// URL of the selected media playlist.
    pub url: Url,
    /// Raw playlist text as fetched.
    pub raw: String,
    /// Starting media sequence number.
    pub media_sequence: u64,
    /// Segments in fetch/assembly order.
    pub segments: Vec<SegmentEntry>,
    /// Effective key directive: the last one encountered in the playlist.
    /// Per-segment key rotation is deliberately collapsed to a single
    /// whole-playlist key.
    pub key: Option<Key>,
}

/// Source of playlist documents, one text body per URL.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch_playlist(
        &self,
        playlist_url: &Url,
        token: &CancellationToken,
    ) -> Result<String, HlsDownloadError>;
}

pub struct PlaylistResolver {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl PlaylistResolver {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Resolves `url` to a media playlist, following master playlists by
    /// selecting the highest-bandwidth variant. Resolution is depth-bounded:
    /// a malformed playlist chain that never reaches a media playlist fails
    /// instead of recursing forever.
    pub async fn resolve(
        &self,
        url: &str,
        token: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> Result<ResolvedPlaylist, HlsDownloadError> {
        resolve_chain(
            self,
            url,
            self.config.playlist_config.max_resolution_depth,
            token,
            observer,
        )
        .await
    }
}

#[async_trait]
impl PlaylistFetcher for PlaylistResolver {
    async fn fetch_playlist(
        &self,
        playlist_url: &Url,
        token: &CancellationToken,
    ) -> Result<String, HlsDownloadError> {
        let fetch = async {
            let response = self
                .http_client
                .get(playlist_url.clone())
                .timeout(self.config.playlist_config.playlist_fetch_timeout)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(HlsDownloadError::Fetch(format!(
                    "failed to fetch playlist {playlist_url}: HTTP {}",
                    response.status()
                )));
            }
            let bytes = response.bytes().await?;
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                HlsDownloadError::Parse(format!("playlist content is not valid UTF-8: {e}"))
            })
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(HlsDownloadError::Aborted),
            res = fetch => res,
        }
    }
}

async fn resolve_chain(
    fetcher: &dyn PlaylistFetcher,
    url: &str,
    max_depth: u32,
    token: &CancellationToken,
    observer: &dyn DownloadObserver,
) -> Result<ResolvedPlaylist, HlsDownloadError> {
    let mut current_url = Url::parse(url)
        .map_err(|e| HlsDownloadError::Parse(format!("invalid playlist URL {url}: {e}")))?;

    for _depth in 0..max_depth {
        let raw = fetcher.fetch_playlist(&current_url, token).await?;

        match parse_playlist_res(raw.as_bytes()) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(master)) => {
                observer.on_status("Parsing master playlist...");
                let variant = select_variant(&master).ok_or_else(|| {
                    HlsDownloadError::Parse("no valid stream found in master playlist".to_string())
                })?;
                let variant_url = current_url.join(&variant.uri).map_err(|e| {
                    HlsDownloadError::Parse(format!(
                        "could not resolve variant URI {}: {e}",
                        variant.uri
                    ))
                })?;
                debug!(bandwidth = variant.bandwidth, url = %variant_url, "Selected variant");
                current_url = variant_url;
            }
            Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => {
                return build_resolved(media, current_url, raw);
            }
            Err(e) => {
                return Err(HlsDownloadError::Parse(format!(
                    "failed to parse playlist {current_url}: {e}"
                )));
            }
        }
    }

    Err(HlsDownloadError::Parse(format!(
        "no media playlist reached within {max_depth} resolution steps"
    )))
}

/// Picks the variant with the strictly highest bandwidth; ties keep the
/// first variant seen.
pub(crate) fn select_variant(master: &MasterPlaylist) -> Option<&VariantStream> {
    let mut best: Option<&VariantStream> = None;
    for variant in &master.variants {
        match best {
            Some(b) if variant.bandwidth <= b.bandwidth => {}
            _ => best = Some(variant),
        }
    }
    best
}

/// The effective key directive is the last one encountered in the playlist.
pub(crate) fn collapse_key(media: &MediaPlaylist) -> Option<Key> {
    media
        .segments
        .iter()
        .filter_map(|s| s.key.as_ref())
        .next_back()
        .cloned()
}

fn build_resolved(
    media: MediaPlaylist,
    url: Url,
    raw: String,
) -> Result<ResolvedPlaylist, HlsDownloadError> {
    let mut segments = Vec::with_capacity(media.segments.len());
    for (index, segment) in media.segments.iter().enumerate() {
        let segment_url = match url.join(&segment.uri) {
            Ok(u) => u,
            Err(e) => {
                warn!(uri = %segment.uri, error = %e, "Skipping segment with unresolvable URI");
                continue;
            }
        };
        segments.push(SegmentEntry {
            url: segment_url,
            discontinuity: segment.discontinuity,
            index: index as u64,
        });
    }

    if segments.is_empty() {
        return Err(HlsDownloadError::Parse("no segments found".to_string()));
    }

    let key = collapse_key(&media);
    Ok(ResolvedPlaylist {
        url,
        raw,
        media_sequence: media.media_sequence,
        segments,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::observer::NoopObserver;
    use std::collections::HashMap;

    fn parse_master(text: &str) -> MasterPlaylist {
        match parse_playlist_res(text.as_bytes()).unwrap() {
            m3u8_rs::Playlist::MasterPlaylist(pl) => pl,
            _ => panic!("expected master playlist"),
        }
    }

    fn parse_media(text: &str) -> MediaPlaylist {
        match parse_playlist_res(text.as_bytes()).unwrap() {
            m3u8_rs::Playlist::MediaPlaylist(pl) => pl,
            _ => panic!("expected media playlist"),
        }
    }

    #[test]
    fn selects_highest_bandwidth_variant() {
        let master = parse_master(
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=500000\nlow.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=1200000\nhigh.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000\nmid.m3u8\n",
        );
        let variant = select_variant(&master).unwrap();
        assert_eq!(variant.bandwidth, 1200000);
        assert_eq!(variant.uri, "high.m3u8");
    }

    #[test]
    fn bandwidth_tie_keeps_first_variant() {
        let master = parse_master(
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000\nfirst.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=800000\nsecond.m3u8\n",
        );
        assert_eq!(select_variant(&master).unwrap().uri, "first.m3u8");
    }

    #[test]
    fn empty_master_has_no_variant() {
        let master = parse_master("#EXTM3U\n");
        assert!(select_variant(&master).is_none());
    }

    #[test]
    fn builds_segment_entries_with_discontinuities() {
        let media = parse_media(
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:6\n\
             #EXT-X-MEDIA-SEQUENCE:42\n\
             #EXTINF:6.0,\nseg0.ts\n\
             #EXTINF:6.0,\nseg1.ts\n\
             #EXT-X-DISCONTINUITY\n\
             #EXTINF:6.0,\nseg2.ts\n\
             #EXT-X-ENDLIST\n",
        );
        let base = Url::parse("https://cdn.example.com/stream/index.m3u8").unwrap();
        let resolved = build_resolved(media, base, String::new()).unwrap();

        assert_eq!(resolved.media_sequence, 42);
        assert_eq!(resolved.segments.len(), 3);
        assert_eq!(
            resolved.segments[0].url.as_str(),
            "https://cdn.example.com/stream/seg0.ts"
        );
        assert!(!resolved.segments[0].discontinuity);
        assert!(!resolved.segments[1].discontinuity);
        assert!(resolved.segments[2].discontinuity);
        assert_eq!(resolved.segments[2].index, 2);
    }

    #[test]
    fn empty_media_playlist_is_an_error() {
        let media = parse_media(
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:6\n\
             #EXT-X-ENDLIST\n",
        );
        let base = Url::parse("https://cdn.example.com/stream/index.m3u8").unwrap();
        let err = build_resolved(media, base, String::new()).unwrap_err();
        assert!(matches!(err, HlsDownloadError::Parse(_)));
    }

    #[test]
    fn last_key_directive_wins() {
        let media = parse_media(
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:6\n\
             #EXT-X-KEY:METHOD=AES-128,URI=\"first.key\"\n\
             #EXTINF:6.0,\nseg0.ts\n\
             #EXT-X-KEY:METHOD=AES-128,URI=\"second.key\"\n\
             #EXTINF:6.0,\nseg1.ts\n\
             #EXT-X-ENDLIST\n",
        );
        let key = collapse_key(&media).unwrap();
        assert_eq!(key.uri.as_deref(), Some("second.key"));
    }

    /// Serves canned playlist text per URL, no network.
    struct ScriptedPlaylistFetcher {
        documents: HashMap<String, String>,
    }

    #[async_trait]
    impl PlaylistFetcher for ScriptedPlaylistFetcher {
        async fn fetch_playlist(
            &self,
            playlist_url: &Url,
            _token: &CancellationToken,
        ) -> Result<String, HlsDownloadError> {
            self.documents
                .get(playlist_url.as_str())
                .cloned()
                .ok_or_else(|| {
                    HlsDownloadError::Fetch(format!("no document for {playlist_url}"))
                })
        }
    }

    #[tokio::test]
    async fn master_chain_resolves_to_media_playlist() {
        let mut documents = HashMap::new();
        documents.insert(
            "https://cdn.example.com/master.m3u8".to_string(),
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nvariant.m3u8\n".to_string(),
        );
        documents.insert(
            "https://cdn.example.com/variant.m3u8".to_string(),
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:6\n\
             #EXTINF:6.0,\nseg0.ts\n\
             #EXT-X-ENDLIST\n"
                .to_string(),
        );
        let fetcher = ScriptedPlaylistFetcher { documents };
        let token = CancellationToken::new();

        let resolved = resolve_chain(
            &fetcher,
            "https://cdn.example.com/master.m3u8",
            5,
            &token,
            &NoopObserver,
        )
        .await
        .unwrap();

        assert_eq!(
            resolved.url.as_str(),
            "https://cdn.example.com/variant.m3u8"
        );
        assert_eq!(resolved.segments.len(), 1);
    }

    #[tokio::test]
    async fn self_referencing_master_fails_at_the_depth_cap() {
        let mut documents = HashMap::new();
        documents.insert(
            "https://cdn.example.com/master.m3u8".to_string(),
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nmaster.m3u8\n".to_string(),
        );
        let fetcher = ScriptedPlaylistFetcher { documents };
        let token = CancellationToken::new();

        let err = resolve_chain(
            &fetcher,
            "https://cdn.example.com/master.m3u8",
            5,
            &token,
            &NoopObserver,
        )
        .await
        .unwrap_err();

        match err {
            HlsDownloadError::Parse(msg) => {
                assert!(msg.contains("5 resolution steps"), "unexpected message: {msg}");
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}
