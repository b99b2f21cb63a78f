//! Asynchronous thumbnail jobs: submit now, poll later.
//!
//! - **Types**: [`JobId`], [`JobStatus`], and the [`Job`] snapshot
//! - **Store**: [`JobStore`], the single owner of job records
//! - **Orchestrator**: [`JobOrchestrator`], the fixed worker pool feeding the store

mod orchestrator;
mod store;
mod types;

pub use orchestrator::{JobError, JobOrchestrator, OrchestratorConfig, ShutdownOutcome};
pub use store::{JobStore, StoreError};
pub use types::{Job, JobId, JobStatus};
