// Remuxer: reassembles fetched segments into a fragmented MP4 through an
// injected transcoder, falling back to raw transport-stream concatenation
// whenever transcoding is unavailable or fails.

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::HlsDownloadError;
use crate::hls::fetcher::FetchedSegment;
use crate::hls::sink::ContainerFormat;

/// One emission from a transcoder flush: an optional initialization segment
/// (expected at most once, from the first flush) plus fragment bytes.
#[derive(Debug, Clone)]
pub struct TranscodeChunk {
    pub init_segment: Option<Bytes>,
    pub data: Bytes,
}

/// Transport-stream-to-fragmented-container transcoder.
///
/// Injected at job construction; may be absent (capability unavailable) and
/// may fail at any call. Failures are never fatal to the job.
pub trait Transcoder: Send {
    fn push(&mut self, data: &[u8]) -> Result<(), HlsDownloadError>;
    fn flush(&mut self) -> Result<Vec<TranscodeChunk>, HlsDownloadError>;
}

/// Output of a remux pass: final container bytes plus the format actually
/// produced.
#[derive(Debug, Clone)]
pub struct RemuxOutput {
    pub data: Bytes,
    pub container: ContainerFormat,
}

pub struct Remuxer {
    transcoder: Option<Box<dyn Transcoder>>,
}

impl Remuxer {
    /// The transcoder is selected once here; `None` means the capability is
    /// unavailable and every job takes the raw fallback path.
    pub fn new(transcoder: Option<Box<dyn Transcoder>>) -> Self {
        Self { transcoder }
    }

    pub fn has_transcoder(&self) -> bool {
        self.transcoder.is_some()
    }

    /// Reassembles the ordered segments into a single artifact. Never fails:
    /// any transcoding problem degrades to the raw concatenation fallback,
    /// which never loses previously fetched bytes.
    pub fn remux(&mut self, segments: &[FetchedSegment]) -> RemuxOutput {
        if let Some(transcoder) = self.transcoder.as_deref_mut() {
            match transcode(transcoder, segments) {
                Ok(data) if !data.is_empty() => {
                    return RemuxOutput {
                        data,
                        container: ContainerFormat::FragmentedMp4,
                    };
                }
                Ok(_) => {
                    warn!("Transcoder emitted no bytes, falling back to raw transport stream");
                }
                Err(e) => {
                    warn!(error = %e, "Transcoding failed, falling back to raw transport stream");
                }
            }
        }

        RemuxOutput {
            data: concat_raw(segments),
            container: ContainerFormat::MpegTs,
        }
    }
}

/// Feeds segments through the transcoder, flushing before any segment that
/// sits on a discontinuity boundary and once after the last segment, then
/// concatenates the emissions in order.
fn transcode(
    transcoder: &mut dyn Transcoder,
    segments: &[FetchedSegment],
) -> Result<Bytes, HlsDownloadError> {
    let mut out = BytesMut::new();
    let mut append = |chunks: Vec<TranscodeChunk>| {
        for chunk in chunks {
            if let Some(init) = chunk.init_segment {
                out.extend_from_slice(&init);
            }
            out.extend_from_slice(&chunk.data);
        }
    };

    for segment in segments {
        if segment.discontinuity {
            // Timestamp continuity must not span a declared discontinuity.
            append(transcoder.flush()?);
        }
        transcoder.push(&segment.data)?;
    }
    append(transcoder.flush()?);

    debug!(bytes = out.len(), "Transcode pass complete");
    Ok(out.freeze())
}

fn concat_raw(segments: &[FetchedSegment]) -> Bytes {
    let total: usize = segments.iter().map(|s| s.data.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    for segment in segments {
        out.extend_from_slice(&segment.data);
    }
    out.freeze()
}
