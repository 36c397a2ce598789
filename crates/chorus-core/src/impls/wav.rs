//! PcmEncoder - 16-bit little-endian PCM, bare or in a RIFF/WAVE container.
//!
//! Compressed formats (mp3, flac) need a real codec and are reported as
//! unsupported, which fails the job like any other serialization error.

use crate::domain::{AudioBuffer, AudioFormat, EncodeError};
use crate::ports::AudioEncoder;

const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;
const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Clone, Copy, Default)]
pub struct PcmEncoder;

impl PcmEncoder {
    fn pcm16(samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    fn wav(audio: &AudioBuffer) -> Result<Vec<u8>, EncodeError> {
        let data_len = u32::try_from(audio.samples.len() * 2)
            .ok()
            .filter(|len| *len <= u32::MAX - (WAV_HEADER_LEN as u32 - 8))
            .ok_or(EncodeError::TooLong(audio.samples.len()))?;
        let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
        let byte_rate = audio.sample_rate * u32::from(block_align);

        let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&CHANNELS.to_le_bytes());
        out.extend_from_slice(&audio.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&Self::pcm16(&audio.samples));
        Ok(out)
    }
}

impl AudioEncoder for PcmEncoder {
    fn encode(&self, audio: &AudioBuffer, format: AudioFormat) -> Result<Vec<u8>, EncodeError> {
        if audio.sample_rate == 0 {
            return Err(EncodeError::InvalidSampleRate(audio.sample_rate));
        }
        match format {
            AudioFormat::Wav => Self::wav(audio),
            AudioFormat::Pcm => Ok(Self::pcm16(&audio.samples)),
            AudioFormat::Mp3 | AudioFormat::Flac => Err(EncodeError::Unsupported(format)),
        }
    }
}
