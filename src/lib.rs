// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{build_oracle, ScoringConfig, ScoringOrchestrator};
pub use crate::config::{load_config_default, load_config_from, ScannerConfig};
pub use crate::ingest::gate::{AdmissionGate, AdmissionOutcome};
pub use crate::ingest::types::{CandidateItem, SourceAdapter};
pub use crate::scheduler::{CycleOutcome, CycleScheduler, Pipeline};
pub use crate::store::{MemoryStore, SqliteStore};
