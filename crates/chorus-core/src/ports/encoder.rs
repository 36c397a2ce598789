//! AudioEncoder port - `AudioBuffer` to file bytes.

use crate::domain::{AudioBuffer, AudioFormat, EncodeError};

pub trait AudioEncoder: Send + Sync {
    fn encode(&self, audio: &AudioBuffer, format: AudioFormat) -> Result<Vec<u8>, EncodeError>;
}
