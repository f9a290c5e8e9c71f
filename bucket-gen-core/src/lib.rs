//! Adaptive bucket-name candidate generation.
//!
//! This crate learns the structure of known storage bucket names and keeps
//! sampling new candidates from it:
//! - Frequency models (character/token n-grams, PCFGs, word mutation,
//!   uniform baselines) trained from a corpus of confirmed names
//! - A retrain/generate loop that specializes each model toward names
//!   that were confirmed to exist
//! - A persistent novelty filter, so nothing is submitted twice
//! - Backpressure-aware dispatch to a downstream validation queue
//! - CPU-time profiling of every training pass and generation

/// Bucket-name validation and the name alphabet.
pub mod candidate;

/// Run configuration (TOML).
pub mod config;

/// Training corpora and confirmed-name parsing.
pub mod corpus;

/// Work queues and backpressure.
pub mod dispatch;

/// The retrain/generate state machine.
pub mod engine;

/// Error types.
pub mod error;

/// Frequency models and their strategies.
pub mod model;

/// Previously emitted candidates.
pub mod novelty;

/// Scoped CPU-time measurement.
pub mod profiler;

/// Serialized copies of trained models.
pub mod snapshot;

/// I/O utilities (line reading, append logs, path helpers).
///
/// Not exposed
pub(crate) mod io;

pub use candidate::Candidate;
pub use config::GeneratorConfig;
pub use corpus::{Corpus, CorpusSource};
pub use dispatch::{Backpressure, BeanstalkQueue, Dispatcher, MemoryQueue, WorkQueue};
pub use engine::{Engine, EngineSettings, EngineState, EngineStats, TrialBudget};
pub use error::{GenError, Result};
pub use model::{CandidateModel, Strategy};
pub use novelty::NoveltyStore;
pub use profiler::{Phase, Profiler};
