//! Speculative HTML parsing pipeline.
//!
//! A [`BackgroundWorker`] tokenizes network input ahead of the main thread
//! and ships it in [`bus::Chunk`]s. The [`Coordinator`] owns the document,
//! commits those chunks, runs parser-blocking scripts through a
//! [`ScriptHost`], and rewinds the worker when script output invalidates
//! what it predicted.

pub mod config;
pub mod coordinator;
pub mod drive;
pub mod error;
pub mod host;
pub mod scheduler;
pub mod stats;
pub mod worker;

pub use config::ParserConfig;
pub use coordinator::{Coordinator, Lifecycle, PumpStatus};
pub use drive::{Driver, WakeSignal};
pub use error::{ConfigError, PipelineError};
pub use host::{
    Collaborators, DocumentWriteHost, NoScripts, NullLoader, ParseObserver, RecordingLoader,
    ResourceLoader, ScriptContext, ScriptHost, ScriptOutcome, WakeHook,
};
pub use scheduler::{PumpSession, Scheduler, SchedulerConfig};
pub use stats::PipelineStats;
pub use worker::{BackgroundWorker, WorkerConfig, WorkerHandle};
