//! Audio decoder using symphonia
//!
//! Decodes a whole file (WAV, MP3, FLAC, AAC, Vorbis) into an in-memory
//! [`PcmBuffer`] that backs simulated playback.

use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

pub struct MediaDecoder;

impl MediaDecoder {
    /// Decode entire audio file to interleaved f32 samples.
    ///
    /// Channel layout and sample rate are kept as found in the source.
    ///
    /// # Errors
    /// - Failed to open file
    /// - Unsupported audio format
    /// - No decodable audio track
    pub fn decode_file(path: &Path) -> Result<PcmBuffer> {
        debug!("Decoding entire file: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        debug!("Audio format: sample_rate={}, channels={}", sample_rate, channels);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of file");
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                    });
                    if buf.capacity() < decoded.frames() * decoded.spec().channels.count() {
                        *buf = SampleBuffer::new(decoded.capacity() as u64, *decoded.spec());
                    }
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decoder failed: {}", e))),
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!("No audio decoded from {}", path.display())));
        }

        let buffer = PcmBuffer::new(samples, sample_rate, channels);
        debug!(
            "Decoded {} frames ({:.2}s)",
            buffer.frame_count,
            buffer.duration_secs()
        );
        Ok(buffer)
    }
}
