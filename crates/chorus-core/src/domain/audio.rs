//! What a synthesizer produces.

/// Decoded mono audio, samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// One item of a synthesis stream.
///
/// A stream yields any number of `Segment`s (already-encoded chunks meant for
/// streaming clients) and exactly one `Final` holding the merged audio. The
/// task path only keeps `Final`.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutput {
    Segment(Vec<u8>),
    Final(AudioBuffer),
}

impl SynthesisOutput {
    pub fn is_final(&self) -> bool {
        matches!(self, SynthesisOutput::Final(_))
    }
}
