use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::types::AudioData;

/// Why a track could not be turned into samples.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("Failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to decode audio: {0}")]
    Decode(String),
}

impl LoadError {
    fn fetch(url: &str, reason: impl ToString) -> Self {
        LoadError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Turns an encoded payload into planar PCM.
///
/// `hint` is the lowercase file extension of the resource, when it has one.
pub trait PcmDecoder: Send + Sync {
    fn decode(&self, bytes: Vec<u8>, hint: Option<&str>) -> Result<AudioData, LoadError>;
}

/// Default backend: everything symphonia was built with (mp3, flac, wav, aac).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl PcmDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, hint: Option<&str>) -> Result<AudioData, LoadError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(format!("failed to probe format: {e}")))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| LoadError::Decode("no default track found".into()))?
            .clone();

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("no sample rate in track".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(format!("failed to create decoder: {e}")))?;

        let mut planes: Vec<Vec<f32>> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(format!("error reading packet: {e}"))),
            };

            if packet.track_id() != track.id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable packet: {e}");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let frames = decoded.frames();
            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if frames == 0 || channels == 0 {
                continue;
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_planar_ref(decoded);

            if planes.len() < channels {
                planes.resize_with(channels, Vec::new);
            }
            // Planar layout: `frames` samples of channel 0, then channel 1, ...
            for (plane, chunk) in planes
                .iter_mut()
                .zip(sample_buf.samples().chunks_exact(frames))
            {
                plane.extend_from_slice(chunk);
            }
        }

        let audio = AudioData::new(planes, sample_rate);
        if audio.num_frames() == 0 {
            return Err(LoadError::Decode("no audio frames in payload".into()));
        }
        Ok(audio)
    }
}

/// Fetches a resource and hands its bytes to the plugged-in [`PcmDecoder`].
#[derive(Clone)]
pub struct Decoder {
    client: reqwest::Client,
    codec: Arc<dyn PcmDecoder>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(Arc::new(SymphoniaDecoder))
    }
}

impl Decoder {
    pub fn new(codec: Arc<dyn PcmDecoder>) -> Self {
        Self::with_client(reqwest::Client::new(), codec)
    }

    pub fn with_client(client: reqwest::Client, codec: Arc<dyn PcmDecoder>) -> Self {
        Self { client, codec }
    }

    /// Read the raw bytes behind `url`.
    ///
    /// `http(s)://` goes over the network, uncached; `file://` URLs and bare paths are
    /// read from disk.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        log::debug!("Fetching {url}");

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .send()
                .await
                .map_err(|e| LoadError::fetch(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::fetch(url, format!("HTTP {status}")));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| LoadError::fetch(url, e))?;
            return Ok(bytes.to_vec());
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::fetch(url, e))
    }

    /// Fetch `url` and decode it on a blocking worker.
    pub async fn decode(&self, url: &str) -> Result<AudioData, LoadError> {
        let bytes = self.fetch(url).await?;
        let codec = Arc::clone(&self.codec);
        let hint = extension_hint(url);

        tokio::task::spawn_blocking(move || codec.decode(bytes, hint.as_deref()))
            .await
            .map_err(|e| LoadError::Decode(format!("decode worker failed: {e}")))?
    }
}

/// Lowercase extension of the last path segment, ignoring query and fragment.
fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
