//! ToneSynthesizer - a stand-in engine that "speaks" a sine tone.
//!
//! Used by the CLI demo and by tests. It behaves like a real engine from the
//! manager's point of view: it runs on its own task, takes time, emits
//! streaming segments followed by one merged final buffer, and stops early
//! when cancellation is requested.

use std::f32::consts::TAU;
use std::time::Duration;

use async_trait::async_trait;

use super::channel_stream::ChannelStream;
use crate::domain::{AudioBuffer, CancelSignal, SynthesisError, SynthesisOutput, SynthesisRequest};
use crate::ports::{SynthesisStream, Synthesizer};

#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: u32,
    /// Audio emitted per character of input text.
    per_char: Duration,
    /// Number of streaming segments before the final output.
    segments: usize,
    /// Simulated inference time per segment.
    segment_delay: Duration,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            per_char: Duration::from_millis(60),
            segments: 4,
            segment_delay: Duration::from_millis(25),
        }
    }
}

impl ToneSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments(mut self, segments: usize, delay: Duration) -> Self {
        self.segments = segments;
        self.segment_delay = delay;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Pitch depends on the seed so distinct requests sound distinct.
    fn frequency(seed: Option<u64>) -> f32 {
        220.0 + (seed.unwrap_or(0) % 24) as f32 * 20.0
    }

    fn render(&self, request: &SynthesisRequest) -> Vec<f32> {
        let micros = self.per_char.as_micros() * request.text_len() as u128;
        let len = (micros * u128::from(self.sample_rate) / 1_000_000) as usize;
        let freq = Self::frequency(request.seed);
        let amplitude = if request.normalize { 0.5 } else { 0.8 };
        (0..len)
            .map(|i| amplitude * (TAU * freq * i as f32 / self.sample_rate as f32).sin())
            .collect()
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: CancelSignal,
    ) -> Result<Box<dyn SynthesisStream>, SynthesisError> {
        if request.text.trim().is_empty() {
            return Err(SynthesisError::Engine("text is empty".to_string()));
        }

        let samples = self.render(request);
        let sample_rate = self.sample_rate;
        let segments = self.segments;
        let delay = self.segment_delay;
        let (tx, stream) = ChannelStream::channel(segments + 1);

        tokio::spawn(async move {
            let chunk = samples.len().div_ceil(segments.max(1)).max(1);
            for part in samples.chunks(chunk).take(segments) {
                tokio::select! {
                    _ = cancel.requested() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                let bytes = part
                    .iter()
                    .flat_map(|s| ((s * f32::from(i16::MAX)) as i16).to_le_bytes())
                    .collect();
                if tx.send(Ok(SynthesisOutput::Segment(bytes))).await.is_err() {
                    return;
                }
            }
            let merged = AudioBuffer::new(sample_rate, samples);
            let _ = tx.send(Ok(SynthesisOutput::Final(merged))).await;
        });

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_segments_then_final() {
        let synth = ToneSynthesizer::new().with_segments(3, Duration::from_millis(1));
        let req = SynthesisRequest::new("hello");
        let mut stream = synth.synthesize(&req, CancelSignal::new()).await.unwrap();

        let mut outputs = Vec::new();
        while let Some(item) = stream.next().await {
            outputs.push(item.unwrap());
        }
        assert_eq!(outputs.len(), 4);
        assert!(outputs[..3].iter().all(|o| !o.is_final()));
        match outputs.last().unwrap() {
            SynthesisOutput::Final(buf) => {
                assert_eq!(buf.sample_rate, 24_000);
                // five characters at 60ms each
                assert_eq!(buf.samples.len(), 7_200);
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_without_final_when_cancelled() {
        let synth = ToneSynthesizer::new().with_segments(3, Duration::from_millis(50));
        let cancel = CancelSignal::new();
        let mut stream = synth
            .synthesize(&SynthesisRequest::new("hello"), cancel.clone())
            .await
            .unwrap();
        cancel.request();

        while let Some(item) = stream.next().await {
            assert!(!item.unwrap().is_final());
        }
    }

    #[tokio::test]
    async fn empty_text_is_an_engine_error() {
        let err = ToneSynthesizer::new()
            .synthesize(&SynthesisRequest::new("  "), CancelSignal::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SynthesisError::Engine(_)));
    }
}
