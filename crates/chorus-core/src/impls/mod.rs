//! Impls - in-tree implementations of the ports.
//!
//! - **LocalArtifactStore**: artifacts as files in the working directory
//! - **PcmEncoder**: WAV / raw PCM serialization
//! - **ChannelStream**, **VecStream**: `SynthesisStream` adapters
//! - **ToneSynthesizer**: stand-in engine for the demo CLI and tests
//!
//! A real inference engine plugs in by implementing `ports::Synthesizer`
//! outside this crate.

pub mod channel_stream;
pub mod local_artifacts;
pub mod tone;
pub mod wav;

pub use self::channel_stream::{ChannelStream, OutputSender, VecStream};
pub use self::local_artifacts::LocalArtifactStore;
pub use self::tone::ToneSynthesizer;
pub use self::wav::PcmEncoder;
