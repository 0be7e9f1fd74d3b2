//! Analysis job pipeline: scope resolution, report assembly, the job
//! orchestrator and the queue-driven worker.
//!
//! Storage and queue handles are constructed once by the binary and injected
//! into [`AnalysisService`]; nothing here holds process-wide state.

pub mod error;
pub mod queue;
pub mod report;
pub mod resolver;
pub mod service;
pub mod store;
pub mod worker;

pub use error::{AnalysisError, FailureKind, QueueError};
pub use queue::{ChannelQueue, Delivery, JobConsumer, JobMessage, JobQueue, PgJobQueue};
pub use report::{build_report, ReportInputs};
pub use resolver::ScopeResolver;
pub use service::{AnalysisService, ExecuteOutcome, SubmitRequest};
pub use store::{AnalysisStore, NewJob, PgAnalysisStore};
pub use worker::{handle_delivery, run_worker, DeliveryResult, WorkerConfig, WorkerStats};
