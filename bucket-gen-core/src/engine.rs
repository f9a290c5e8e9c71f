//! The retrain/generate loop.
//!
//! An `Engine` owns one strategy and drives it through
//! `Idle → Training → Generating → Training → ... → Terminal`:
//! - Training rebuilds the model wholesale from a freshly assembled corpus
//! - Generating spends one batch of attempts on that model, then the model
//!   is discarded and training is re-entered
//! - Terminal is reached when the trial budget runs out or a
//!   non-recoverable error occurs
//!
//! The engine is an `Iterator` over accepted candidates, so callers can
//! consume it lazily; `Engine::run` pairs it with a `Dispatcher`. A batch
//! skipped for lack of corpus surfaces as an `Err` item and the next call
//! backs off and retrains.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::candidate::Candidate;
use crate::config::GeneratorConfig;
use crate::corpus::CorpusSource;
use crate::dispatch::{Dispatcher, WorkQueue, job_payload};
use crate::error::Result;
use crate::model::{CandidateModel, Strategy};
use crate::novelty::NoveltyStore;
use crate::profiler::{Phase, Profiler};
use crate::snapshot;

/// Where the loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
	Idle,
	Training,
	Generating,
	Terminal,
}

/// How many accepted candidates the engine may still produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialBudget {
	Limited(u64),
	Unbounded,
}

impl TrialBudget {
	/// `None` means run forever.
	pub fn from_trials(trials: Option<u64>) -> Self {
		match trials {
			Some(n) => Self::Limited(n),
			None => Self::Unbounded,
		}
	}

	pub fn is_exhausted(&self) -> bool {
		matches!(self, Self::Limited(0))
	}

	pub fn remaining(&self) -> Option<u64> {
		match self {
			Self::Limited(n) => Some(*n),
			Self::Unbounded => None,
		}
	}

	fn consume(&mut self) {
		if let Self::Limited(n) = self {
			*n = n.saturating_sub(1);
		}
	}
}

/// Counters reported at every batch boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
	/// Generation attempts
	pub generated: u64,
	/// Novel candidates handed downstream
	pub accepted: u64,
	/// Attempts dropped because the name was already seen
	pub duplicates: u64,
	/// Attempts dropped because the model produced no valid name
	pub invalid: u64,
	pub batches_trained: u64,
	pub batches_skipped: u64,
}

/// Loop parameters, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineSettings {
	/// Attempts per trained model
	pub batch_size: usize,
	pub budget: TrialBudget,
	/// Consecutive skipped batches `Engine::run` tolerates
	pub max_skipped_batches: u32,
	/// Wait after a batch skipped for lack of corpus
	pub skip_backoff: Duration,
	/// Where each trained model is snapshotted, if anywhere
	pub snapshot_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self::from_config(&GeneratorConfig::default())
	}
}

impl EngineSettings {
	pub fn from_config(config: &GeneratorConfig) -> Self {
		Self {
			batch_size: config.engine.batch_size.max(1),
			budget: TrialBudget::from_trials(config.engine.num_trials),
			max_skipped_batches: config.engine.max_skipped_batches,
			skip_backoff: Duration::from_secs(config.engine.skip_backoff_secs),
			snapshot_dir: config.paths.snapshot_dir.clone(),
		}
	}
}

/// Adaptive candidate generator for one strategy.
///
/// # Responsibilities
/// - Retrain the strategy's model from the assembled corpus every batch
/// - Draw candidates, drop invalid and already-seen ones
/// - Record accepted candidates in the novelty store and count them
///   against the trial budget
/// - Profile every training pass and generation attempt
///
/// # Invariants
/// - At most one model is current; it is replaced, never updated
/// - Duplicate and invalid draws never consume the trial budget
/// - A candidate is recorded only after it was successfully submitted
pub struct Engine<S: Strategy, R: Rng> {
	name: String,
	strategy: S,
	source: CorpusSource,
	novelty: NoveltyStore,
	profiler: Profiler,
	rng: R,
	settings: EngineSettings,
	pause: fn(Duration),

	state: EngineState,
	model: Option<S::Model>,
	budget: TrialBudget,
	stats: EngineStats,
	/// Attempts spent on the current model
	batch_attempts: usize,
	/// Candidates accepted from the current model
	batch_accepted: u64,
	/// Consecutive training passes that lacked corpus
	skipped_in_row: u32,
	/// Wait `skip_backoff` before the next training pass
	backoff_pending: bool,
}

impl<S: Strategy, R: Rng> Engine<S, R> {
	pub fn new(strategy: S, source: CorpusSource, novelty: NoveltyStore, rng: R) -> Self {
		let settings = EngineSettings::default();
		Self {
			name: strategy.kind().to_owned(),
			strategy,
			source,
			novelty,
			profiler: Profiler::disabled(),
			rng,
			budget: settings.budget,
			settings,
			pause: std::thread::sleep,
			state: EngineState::Idle,
			model: None,
			stats: EngineStats::default(),
			batch_attempts: 0,
			batch_accepted: 0,
			skipped_in_row: 0,
			backoff_pending: false,
		}
	}

	/// Name used in logs, payloads and snapshots (defaults to the
	/// strategy kind).
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn with_profiler(mut self, profiler: Profiler) -> Self {
		self.profiler = profiler;
		self
	}

	pub fn with_settings(mut self, settings: EngineSettings) -> Self {
		self.budget = settings.budget;
		self.settings = settings;
		self
	}

	/// Replaces the blocking sleep used between skipped batches.
	pub fn with_pause(mut self, pause: fn(Duration)) -> Self {
		self.pause = pause;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn state(&self) -> EngineState {
		self.state
	}

	pub fn stats(&self) -> EngineStats {
		self.stats
	}

	pub fn budget(&self) -> TrialBudget {
		self.budget
	}

	pub fn novelty(&self) -> &NoveltyStore {
		&self.novelty
	}

	/// Runs the loop to completion, submitting every accepted candidate.
	///
	/// Each submission happens inside the candidate's profiling scope, so
	/// backpressure pauses show up in the generation profile.
	///
	/// Skipped batches are retried until more than `max_skipped_batches`
	/// happen in a row.
	///
	/// # Errors
	/// The first non-recoverable error (queue failure, IO), or the last
	/// insufficient-corpus error once too many batches were skipped. The
	/// engine is terminal afterwards.
	pub fn run<Q: WorkQueue>(&mut self, dispatcher: &mut Dispatcher<Q>) -> Result<EngineStats> {
		info!(strategy = %self.name, budget = ?self.budget.remaining(), "Starting generation");
		let name = self.name.clone();
		let mut submit = |candidate: &Candidate| dispatcher.submit(&job_payload(&name, candidate)).map(|_| ());
		while let Some(result) = self.advance(&mut submit) {
			match result {
				Ok(_) => {}
				Err(e) if e.is_recoverable() => {
					if self.skipped_in_row > self.settings.max_skipped_batches {
						self.finish("too many skipped batches");
						return Err(e);
					}
				}
				Err(e) => return Err(e),
			}
		}
		Ok(self.stats)
	}

	/// Drives the state machine until a candidate is accepted or the loop
	/// ends.
	fn advance<F>(&mut self, submit: &mut F) -> Option<Result<Candidate>>
	where
		F: FnMut(&Candidate) -> Result<()>,
	{
		loop {
			match self.state {
				EngineState::Terminal => return None,
				EngineState::Idle | EngineState::Training => {
					if self.budget.is_exhausted() {
						self.finish("trial budget exhausted");
						return None;
					}
					self.state = EngineState::Training;
					if self.backoff_pending {
						self.backoff_pending = false;
						(self.pause)(self.settings.skip_backoff);
					}
					match self.train() {
						Ok(model) => {
							self.model = Some(model);
							self.batch_attempts = 0;
							self.batch_accepted = 0;
							self.skipped_in_row = 0;
							self.stats.batches_trained += 1;
							self.state = EngineState::Generating;
						}
						Err(e) if e.is_recoverable() => {
							self.stats.batches_skipped += 1;
							self.skipped_in_row += 1;
							warn!(strategy = %self.name, error = %e, skipped_in_row = self.skipped_in_row, "Skipping batch");
							self.backoff_pending = true;
							return Some(Err(e));
						}
						Err(e) => {
							self.finish("training failed");
							return Some(Err(e));
						}
					}
				}
				EngineState::Generating => {
					if self.budget.is_exhausted() {
						self.finish("trial budget exhausted");
						return None;
					}
					if self.batch_attempts >= self.settings.batch_size {
						self.end_batch();
						continue;
					}
					self.batch_attempts += 1;
					match self.attempt(submit) {
						Ok(Some(candidate)) => {
							self.budget.consume();
							self.batch_accepted += 1;
							return Some(Ok(candidate));
						}
						Ok(None) => {}
						Err(e) => {
							self.finish("dispatch failed");
							return Some(Err(e));
						}
					}
				}
			}
		}
	}

	fn train(&mut self) -> Result<S::Model> {
		let model = {
			let _scope = self.profiler.scope(Phase::Train);
			let corpus = self.source.assemble()?;
			info!(strategy = %self.name, corpus = corpus.len(), "Training model");
			self.strategy.train(&corpus)?
		};

		if let Some(dir) = &self.settings.snapshot_dir {
			match snapshot::save(dir, &self.name, &model) {
				Ok(path) => debug!(strategy = %self.name, path = %path.display(), "Saved model snapshot"),
				Err(e) => warn!(strategy = %self.name, error = %e, "Failed to save model snapshot"),
			}
		}
		Ok(model)
	}

	/// One generation attempt; `Ok(None)` when the draw was dropped.
	fn attempt<F>(&mut self, submit: &mut F) -> Result<Option<Candidate>>
	where
		F: FnMut(&Candidate) -> Result<()>,
	{
		let Some(model) = self.model.as_ref() else {
			return Ok(None);
		};
		let mut scope = self.profiler.scope(Phase::Generate);
		self.stats.generated += 1;

		let Some(raw) = model.sample(&mut self.rng) else {
			self.stats.invalid += 1;
			debug!(strategy = %self.name, "Model produced no candidate");
			return Ok(None);
		};
		scope.candidate(&raw);

		let candidate = match Candidate::parse(&raw) {
			Ok(candidate) => candidate,
			Err(e) => {
				self.stats.invalid += 1;
				debug!(strategy = %self.name, error = %e, "Dropped invalid candidate");
				return Ok(None);
			}
		};
		if self.novelty.seen(candidate.as_str()) {
			self.stats.duplicates += 1;
			debug!(strategy = %self.name, candidate = %candidate, "Dropped duplicate");
			return Ok(None);
		}

		submit(&candidate)?;
		self.novelty.record(&candidate)?;
		self.stats.accepted += 1;
		info!(strategy = %self.name, candidate = %candidate, "Generated candidate");
		Ok(Some(candidate))
	}

	fn end_batch(&mut self) {
		self.log_stats("Batch complete");
		self.model = None;
		self.state = EngineState::Training;
		if self.batch_accepted == 0 {
			// The corpus may still grow, so keep retraining
			warn!(strategy = %self.name, "Batch produced no new candidates");
		}
	}

	fn finish(&mut self, reason: &str) {
		if self.state == EngineState::Terminal {
			return;
		}
		self.model = None;
		self.state = EngineState::Terminal;
		self.log_stats(reason);
	}

	fn log_stats(&self, message: &str) {
		let stats = &self.stats;
		info!(
			strategy = %self.name,
			generated = stats.generated,
			accepted = stats.accepted,
			duplicates = stats.duplicates,
			invalid = stats.invalid,
			batches_trained = stats.batches_trained,
			batches_skipped = stats.batches_skipped,
			trials_left = ?self.budget.remaining(),
			"{message}"
		);
	}
}

impl<S: Strategy, R: Rng> Iterator for Engine<S, R> {
	type Item = Result<Candidate>;

	/// Next accepted candidate.
	///
	/// Candidates are recorded in the novelty store as they are yielded;
	/// forwarding them downstream is left to the caller. Each skipped batch
	/// yields its `InsufficientCorpus` error; calling again backs off and
	/// retrains, so the caller decides when to stop.
	fn next(&mut self) -> Option<Self::Item> {
		self.advance(&mut |_: &Candidate| Ok(()))
	}
}
