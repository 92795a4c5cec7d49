use crate::core::config::AudioFormat;
use crate::core::error::StoryError;
use anyhow::{Context, Result};
use base64::Engine;
use std::io::{Seek, Write};
use std::time::Duration;

/// Normalized per-channel samples, rebuilt for every play request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudioBuffer {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Frame-major samples, as audio outputs expect them.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, StoryError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// Interprets `bytes` as little-endian i16 samples, interleaved across
/// `channel_count` channels. A trailing odd byte and any incomplete last frame
/// are dropped.
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channel_count: u16) -> DecodedAudioBuffer {
    let channel_count = channel_count as usize;
    if channel_count == 0 {
        return DecodedAudioBuffer {
            sample_rate,
            channels: Vec::new(),
        };
    }

    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let frame_count = samples.len() / channel_count;

    let channels = (0..channel_count)
        .map(|c| {
            (0..frame_count)
                .map(|i| samples[i * channel_count + c] as f32 / 32768.0)
                .collect()
        })
        .collect();

    DecodedAudioBuffer {
        sample_rate,
        channels,
    }
}

/// Base64 payload straight to a playable buffer.
pub fn decode_payload(
    payload: &str,
    format: AudioFormat,
) -> Result<DecodedAudioBuffer, StoryError> {
    let bytes = decode_base64(payload)?;
    Ok(decode_pcm(&bytes, format.sample_rate, format.channels))
}

/// Encodes a decoded buffer as 16-bit PCM WAV.
pub fn write_wav<W: Write + Seek>(buffer: &DecodedAudioBuffer, writer: W) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count().max(1),
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut wav = hound::WavWriter::new(writer, spec).context("Failed to create WAV writer")?;
    for sample in buffer.interleaved() {
        let value = (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        wav.write_sample(value)?;
    }
    wav.finalize().context("Failed to finalize WAV data")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_pcm_mono() {
        let buffer = decode_pcm(&[0x00, 0x00, 0xFF, 0x7F], 24000, 1);
        assert_eq!(buffer.sample_rate, 24000);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channels[0], vec![0.0, 32767.0 / 32768.0]);
    }

    #[test]
    fn test_decode_pcm_negative_full_scale() {
        let buffer = decode_pcm(&to_le_bytes(&[i16::MIN, -16384]), 24000, 1);
        assert_eq!(buffer.channels[0], vec![-1.0, -0.5]);
    }

    #[test]
    fn test_decode_pcm_drops_odd_trailing_byte() {
        let buffer = decode_pcm(&[0x00, 0x40, 0x00, 0xC0, 0x12], 24000, 1);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channels[0], vec![0.5, -0.5]);
    }

    #[test]
    fn test_decode_pcm_drops_partial_frame() {
        // 5 samples over 2 channels -> 2 frames.
        let bytes = to_le_bytes(&[1, 2, 3, 4, 5]);
        let buffer = decode_pcm(&bytes, 48000, 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channels[0], vec![1.0 / 32768.0, 3.0 / 32768.0]);
        assert_eq!(buffer.channels[1], vec![2.0 / 32768.0, 4.0 / 32768.0]);
        assert_eq!(
            buffer.interleaved(),
            vec![1.0 / 32768.0, 2.0 / 32768.0, 3.0 / 32768.0, 4.0 / 32768.0]
        );
    }

    #[test]
    fn test_decode_pcm_empty_and_zero_channels() {
        assert!(decode_pcm(&[], 24000, 1).is_empty());
        assert!(decode_pcm(&[0x01], 24000, 1).is_empty());
        assert!(decode_pcm(&[0x00, 0x10], 24000, 0).is_empty());
    }

    #[test]
    fn test_decode_pcm_is_deterministic() {
        let bytes = to_le_bytes(&[12, -7, 30000, -30000, 0, 1]);
        let a = decode_pcm(&bytes, 24000, 2);
        let b = decode_pcm(&bytes, 24000, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_base64_payload_round_trip() {
        let samples = [0i16, 1000, -1000, i16::MAX, i16::MIN, 42];
        let payload = base64::engine::general_purpose::STANDARD.encode(to_le_bytes(&samples));

        let buffer = decode_payload(&payload, AudioFormat::default()).unwrap();
        let expected: Vec<f32> = samples.iter().map(|s| *s as f32 / 32768.0).collect();

        assert_eq!(buffer.frame_count(), samples.len());
        for (got, want) in buffer.channels[0].iter().zip(&expected) {
            assert!((got - want).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_decode_base64_rejects_garbage() {
        let err = decode_base64("not*base64!").unwrap_err();
        assert!(matches!(err, StoryError::InvalidEncoding(_)));
    }

    #[test]
    fn test_duration() {
        let buffer = decode_pcm(&vec![0u8; 48000], 24000, 1);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_write_wav_preserves_samples() -> Result<()> {
        let samples = [0i16, 32767, -32768, 123, -456, 7];
        let buffer = decode_pcm(&to_le_bytes(&samples), 24000, 2);

        let mut out = Cursor::new(Vec::new());
        write_wav(&buffer, &mut out)?;
        out.set_position(0);

        let mut reader = hound::WavReader::new(out)?;
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.bits_per_sample, 16);

        let read: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(read, samples);
        Ok(())
    }
}
