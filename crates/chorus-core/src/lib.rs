//! chorus-core
//!
//! In-process manager for long-running, cancellable speech-synthesis jobs.
//!
//! # Modules
//! - **domain**: ids, requests, job records, the state machine, errors
//! - **ports**: traits at the seams (Synthesizer, AudioEncoder, ArtifactStore, Clock)
//! - **registry**: the in-memory job registry
//! - **app**: supervisor, retention sweeper, job manager, front-end service
//! - **impls**: local artifact store, PCM/WAV encoder, tone synthesizer
//! - **config**: `ManagerConfig`
//! - **observability**: per-status counts

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod registry;

pub use app::{ErrorClass, ServiceError, TaskInfo, TaskService};
pub use config::ManagerConfig;
pub use domain::{AudioFormat, JobId, JobStatus, SynthesisRequest};
