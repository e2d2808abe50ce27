// End-to-end pipeline tests over the public API with scripted collaborators:
// batched retrieval into the remuxer and on to a collecting sink, no network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;

use vodmux_engine::{
    BatchFetcher, ContainerFormat, DownloadSink, EncryptionContext, HlsDownloadError,
    NoopObserver, OutputArtifact, Remuxer, SegmentDownloader, SegmentEntry, TranscodeChunk,
    Transcoder,
};

fn entries(n: usize) -> Vec<SegmentEntry> {
    (0..n)
        .map(|i| SegmentEntry {
            url: Url::parse(&format!("https://cdn.example.com/vod/seg{i}.ts")).unwrap(),
            discontinuity: false,
            index: i as u64,
        })
        .collect()
}

/// Serves deterministic payloads, failing the configured indices.
struct ScriptedDownloader {
    fail_indices: Vec<u64>,
}

#[async_trait]
impl SegmentDownloader for ScriptedDownloader {
    async fn download_segment(
        &self,
        segment: &SegmentEntry,
        _token: &CancellationToken,
    ) -> Result<Bytes, HlsDownloadError> {
        if self.fail_indices.contains(&segment.index) {
            return Err(HlsDownloadError::Fetch("scripted failure".to_string()));
        }
        Ok(Bytes::from(vec![
            segment.index as u8;
            (segment.index as usize + 1) * 3
        ]))
    }
}

struct CollectingSink {
    delivered: Mutex<Vec<OutputArtifact>>,
}

#[async_trait]
impl DownloadSink for CollectingSink {
    async fn deliver(&self, artifact: OutputArtifact) -> Result<(), HlsDownloadError> {
        self.delivered.lock().unwrap().push(artifact);
        Ok(())
    }
}

/// Passes bytes through unchanged as single fragments, emitting one init
/// segment on the first flush.
struct PassthroughTranscoder {
    buffered: Vec<Bytes>,
    emitted_init: bool,
}

impl Transcoder for PassthroughTranscoder {
    fn push(&mut self, data: &[u8]) -> Result<(), HlsDownloadError> {
        self.buffered.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<TranscodeChunk>, HlsDownloadError> {
        let chunks = self
            .buffered
            .drain(..)
            .map(|data| TranscodeChunk {
                init_segment: if self.emitted_init {
                    None
                } else {
                    self.emitted_init = true;
                    Some(Bytes::from_static(b""))
                },
                data,
            })
            .collect();
        Ok(chunks)
    }
}

#[tokio::test]
async fn artifact_length_is_sum_of_segment_lengths_in_order() {
    let segments = entries(8);
    let fetcher = BatchFetcher::new(
        Arc::new(ScriptedDownloader {
            fail_indices: vec![],
        }),
        5,
    );
    let token = CancellationToken::new();
    let fetched = fetcher
        .fetch_all(&segments, &EncryptionContext::Clear, &token, &NoopObserver)
        .await
        .unwrap();

    let expected: usize = (0..8).map(|i| (i + 1) * 3).sum();
    let mut remuxer = Remuxer::new(Some(Box::new(PassthroughTranscoder {
        buffered: Vec::new(),
        emitted_init: false,
    })));
    let out = remuxer.remux(&fetched);

    assert_eq!(out.container, ContainerFormat::FragmentedMp4);
    assert_eq!(out.data.len(), expected);
    // Assembly order is playlist order: payload bytes ascend with the index.
    assert_eq!(out.data[0], 0);
    assert_eq!(out.data[out.data.len() - 1], 7);
}

#[tokio::test]
async fn one_failure_among_five_keeps_the_other_four() {
    let segments = entries(5);
    let fetcher = BatchFetcher::new(
        Arc::new(ScriptedDownloader {
            fail_indices: vec![1],
        }),
        5,
    );
    let token = CancellationToken::new();
    let fetched = fetcher
        .fetch_all(&segments, &EncryptionContext::Clear, &token, &NoopObserver)
        .await
        .unwrap();

    let mut remuxer = Remuxer::new(None);
    let out = remuxer.remux(&fetched);

    let expected: usize = [0usize, 2, 3, 4].iter().map(|i| (i + 1) * 3).sum();
    assert_eq!(out.container, ContainerFormat::MpegTs);
    assert_eq!(out.data.len(), expected);

    let sink = CollectingSink {
        delivered: Mutex::new(Vec::new()),
    };
    sink.deliver(OutputArtifact {
        filename: format!("episode{}", out.container.extension()),
        data: out.data,
        container: out.container,
    })
    .await
    .unwrap();

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].filename, "episode.ts");
    assert_eq!(delivered[0].container.mime_type(), "video/mp2t");
}

#[tokio::test]
async fn cancellation_mid_job_delivers_nothing() {
    let segments = entries(20);
    let fetcher = BatchFetcher::new(
        Arc::new(ScriptedDownloader {
            fail_indices: vec![],
        }),
        5,
    );
    let token = CancellationToken::new();
    token.cancel();

    let result = fetcher
        .fetch_all(&segments, &EncryptionContext::Clear, &token, &NoopObserver)
        .await;
    assert!(matches!(result, Err(HlsDownloadError::Aborted)));
}
