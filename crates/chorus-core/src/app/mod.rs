//! App - the job lifecycle built on top of the ports.
//!
//! # Components
//! - **Supervisor**: runs one job on its own task (start -> stream -> encode -> persist)
//! - **RetentionSweeper**: evicts old jobs and their artifacts
//! - **JobManager**: registry + supervisor + sweeper, plus the cancel path
//! - **TaskService**: the front-end contract and its wire types

pub mod facade;
pub mod manager;
pub mod supervisor;
pub mod sweeper;

pub use self::facade::{
    BuildError, Download, ErrorClass, ServiceError, TaskCreated, TaskInfo, TaskService,
    TaskServiceBuilder,
};
pub use self::manager::JobManager;
pub use self::supervisor::Supervisor;
pub use self::sweeper::{RetentionSweeper, SweepReport};
