//! Ports - traits at the seams to the outside world.
//!
//! The manager only ever talks to the inference engine, the audio encoder,
//! artifact storage and the clock through these traits. In-tree
//! implementations live in `impls`.

pub mod artifact_store;
pub mod clock;
pub mod encoder;
pub mod synthesizer;

pub use self::artifact_store::ArtifactStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::encoder::AudioEncoder;
pub use self::synthesizer::{SynthesisStream, Synthesizer};
