// HLS decryption: key retrieval and per-segment AES-128-CBC decryption with
// derived initialization vectors.

use aes::Aes128;
use bytes::Bytes;
use cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use m3u8_rs::KeyMethod;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::HlsDownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::playlist::ResolvedPlaylist;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

// --- KeyFetcher ---
// Responsible for fetching raw key data from a URI.
pub struct KeyFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl KeyFetcher {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub async fn fetch_key(
        &self,
        key_url: &Url,
        token: &CancellationToken,
    ) -> Result<Bytes, HlsDownloadError> {
        let fetch = async {
            let mut attempts = 0;
            loop {
                attempts += 1;
                match self
                    .http_client
                    .get(key_url.clone())
                    .timeout(self.config.fetcher_config.key_download_timeout)
                    .send()
                    .await
                {
                    Ok(response) => {
                        if response.status().is_success() {
                            return response
                                .bytes()
                                .await
                                .map_err(|e| HlsDownloadError::KeyFetch(e.to_string()));
                        } else if response.status().is_client_error() {
                            return Err(HlsDownloadError::KeyFetch(format!(
                                "client error {} fetching key from {key_url}",
                                response.status()
                            )));
                        }
                        // Server errors or other retryable issues
                        if attempts > self.config.fetcher_config.max_key_retries {
                            return Err(HlsDownloadError::KeyFetch(format!(
                                "max retries ({}) exceeded for key {key_url}, last status: {}",
                                self.config.fetcher_config.max_key_retries,
                                response.status()
                            )));
                        }
                    }
                    Err(e) => {
                        if !e.is_connect() && !e.is_timeout() && !e.is_request() {
                            return Err(HlsDownloadError::KeyFetch(e.to_string()));
                        }
                        if attempts > self.config.fetcher_config.max_key_retries {
                            return Err(HlsDownloadError::KeyFetch(format!(
                                "max retries ({}) exceeded for key {key_url}: {e}",
                                self.config.fetcher_config.max_key_retries
                            )));
                        }
                    }
                }
                let delay = self.config.fetcher_config.key_retry_delay_base
                    * (2_u32.pow(attempts.saturating_sub(1)));
                tokio::time::sleep(delay).await;
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(HlsDownloadError::Aborted),
            res = fetch => res,
        }
    }
}

// --- EncryptionContext ---

/// Per-job encryption descriptor. Built once per playlist; the key is
/// fetched exactly once and owned by the job for its duration.
#[derive(Debug)]
pub enum EncryptionContext {
    /// METHOD=NONE, or no key directive at all: bytes pass through.
    Clear,
    Aes128 {
        key: [u8; 16],
        /// Explicit IV from the key directive, used for every segment.
        /// When absent, the IV is derived per segment.
        iv: Option<[u8; 16]>,
        media_sequence: u64,
    },
}

impl EncryptionContext {
    /// Builds the descriptor from a resolved playlist. Any method other than
    /// NONE/AES-128 aborts the whole job with no partial output.
    pub async fn build(
        resolved: &ResolvedPlaylist,
        key_fetcher: &KeyFetcher,
        token: &CancellationToken,
    ) -> Result<Self, HlsDownloadError> {
        let Some(key_info) = &resolved.key else {
            return Ok(EncryptionContext::Clear);
        };

        match &key_info.method {
            KeyMethod::None => Ok(EncryptionContext::Clear),
            KeyMethod::AES128 => {
                let key_uri = key_info.uri.as_deref().ok_or_else(|| {
                    HlsDownloadError::KeyFetch("AES-128 key directive has no URI".to_string())
                })?;
                let key_url = resolved.url.join(key_uri).map_err(|e| {
                    HlsDownloadError::KeyFetch(format!(
                        "could not resolve key URI {key_uri}: {e}"
                    ))
                })?;

                let key_bytes = key_fetcher.fetch_key(&key_url, token).await?;
                if key_bytes.len() != 16 {
                    return Err(HlsDownloadError::KeyFetch(format!(
                        "key from {key_url} has incorrect length: {} bytes (expected 16)",
                        key_bytes.len()
                    )));
                }
                let mut key = [0u8; 16];
                key.copy_from_slice(&key_bytes);

                let iv = match &key_info.iv {
                    Some(iv_hex) => Some(parse_iv(iv_hex)?),
                    None => None,
                };

                debug!(url = %key_url, explicit_iv = iv.is_some(), "AES-128 key fetched");
                Ok(EncryptionContext::Aes128 {
                    key,
                    iv,
                    media_sequence: resolved.media_sequence,
                })
            }
            other => Err(HlsDownloadError::UnsupportedMethod(format!("{other:?}"))),
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, EncryptionContext::Clear)
    }

    /// Decrypts one segment's bytes. `index` is the segment's position
    /// within the playlist, used to derive the IV when none is explicit.
    pub fn decrypt(&self, data: Bytes, index: u64) -> Result<Bytes, HlsDownloadError> {
        match self {
            EncryptionContext::Clear => Ok(data),
            EncryptionContext::Aes128 {
                key,
                iv,
                media_sequence,
            } => {
                let iv_bytes = match iv {
                    Some(explicit) => *explicit,
                    None => derive_iv(*media_sequence + index),
                };

                let mut buffer = data.to_vec();
                let cipher = Aes128CbcDec::new_from_slices(key, &iv_bytes).map_err(|e| {
                    HlsDownloadError::Decryption(format!(
                        "failed to initialize AES decryptor: {e}"
                    ))
                })?;
                let decrypted_len = cipher
                    .decrypt_padded_mut::<Pkcs7>(&mut buffer)
                    .map_err(|e| HlsDownloadError::Decryption(e.to_string()))?
                    .len();

                Ok(Bytes::copy_from_slice(&buffer[..decrypted_len]))
            }
        }
    }
}

/// IV for sequence number `sequence`: 12 zero bytes followed by the
/// big-endian 4-byte encoding of the sequence number.
fn derive_iv(sequence: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[12..].copy_from_slice(&(sequence as u32).to_be_bytes());
    iv
}

fn parse_iv(iv_hex: &str) -> Result<[u8; 16], HlsDownloadError> {
    let trimmed = iv_hex.trim_start_matches("0x").trim_start_matches("0X");
    let mut iv = [0u8; 16];
    hex::decode_to_slice(trimmed, &mut iv).map_err(|e| {
        HlsDownloadError::Decryption(format!("failed to parse IV '{iv_hex}': {e}"))
    })?;
    Ok(iv)
}
