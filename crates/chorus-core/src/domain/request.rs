//! The work payload of a synthesis job.
//!
//! The manager never looks inside a request except for `format`, which names
//! the artifact. Everything else is handed to the `Synthesizer` untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Pcm,
    Mp3,
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Pcm => "audio/pcm",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Inline reference voice: raw audio plus its transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAudio {
    #[serde(with = "base64_bytes")]
    pub audio: Vec<u8>,
    pub text: String,
}

/// Immutable description of one synthesis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisRequest {
    pub text: String,
    pub chunk_length: u32,
    pub format: AudioFormat,
    pub references: Vec<ReferenceAudio>,
    pub reference_id: Option<String>,
    pub seed: Option<u64>,
    pub use_memory_cache: bool,
    pub normalize: bool,
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub temperature: f32,
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            chunk_length: 200,
            format: AudioFormat::Wav,
            references: Vec::new(),
            reference_id: None,
            seed: None,
            use_memory_cache: false,
            normalize: true,
            max_new_tokens: 1024,
            top_p: 0.8,
            repetition_penalty: 1.1,
            temperature: 0.8,
        }
    }
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Text length in characters, as the front end limits it.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Reference audio travels as a base64 string inside JSON bodies.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded.trim()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::wav(AudioFormat::Wav, "wav", "audio/wav")]
    #[case::pcm(AudioFormat::Pcm, "pcm", "audio/pcm")]
    #[case::mp3(AudioFormat::Mp3, "mp3", "audio/mpeg")]
    #[case::flac(AudioFormat::Flac, "flac", "audio/flac")]
    fn format_naming(#[case] format: AudioFormat, #[case] ext: &str, #[case] mime: &str) {
        assert_eq!(format.extension(), ext);
        assert_eq!(format.content_type(), mime);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let req: SynthesisRequest = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(req.text, "hello");
        assert_eq!(req.format, AudioFormat::Wav);
        assert_eq!(req.chunk_length, 200);
        assert!(req.normalize);
    }

    #[test]
    fn reference_audio_is_base64_in_json() {
        let req = SynthesisRequest {
            references: vec![ReferenceAudio {
                audio: b"RIFF1".to_vec(),
                text: "hi".into(),
            }],
            ..SynthesisRequest::new("x")
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["references"][0]["audio"], "UklGRjE=");

        let back: SynthesisRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.references[0].audio, b"RIFF1");
    }

    #[test]
    fn text_len_counts_chars() {
        assert_eq!(SynthesisRequest::new("你好").text_len(), 2);
    }
}
