//! Prism Gen - multi-provider image generation comparison
//!
//! Fans one prompt out to several image generation providers (fal.ai,
//! Gemini, or the offline mock), records one ledger task per model, and
//! reconciles task status on demand until every task is terminal. A
//! follow-up iteration re-dispatches a single chosen model as a new,
//! unrelated session.

pub mod admission;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod history;
pub mod ledger;
pub mod poll;
pub mod provider;
pub mod providers;
pub mod reconcile;
pub mod session;
pub mod task;
pub mod telemetry;

pub use admission::{AdmissionGate, AdmissionPass, CreditBalance, StaticCredits};
pub use catalog::{ModelCatalog, ModelConfig};
pub use config::PrismConfig;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use history::{HistoryEntry, IterationHistory};
pub use ledger::{FileLedger, MemoryLedger, TaskLedger, TaskUpdate};
pub use poll::{poll_session, CancelHandle, CancelToken, PollOptions, PollOutcome};
pub use provider::{
    GenerateRequest, GenerationProvider, ProviderError, QueryOutcome, Submission, TaskQuery,
};
pub use providers::ProviderRegistry;
pub use reconcile::{Reconciler, SessionSnapshot};
pub use session::{
    ApiResponse, CompareRequest, CompareService, CurrentUser, DispatchResponse, IterateRequest,
    ReconcileRequest, ResponseCode, StaticUser,
};
pub use task::{CompareView, Task};
