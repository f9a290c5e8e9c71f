//! Frequency models and the strategies that train them.
//!
//! Every strategy follows the same contract:
//! - `Strategy::train` is a pure function of the corpus that builds a
//!   complete model (never updated incrementally)
//! - `CandidateModel::sample` draws one raw string from a trained model
//!
//! Strategies:
//! - Character n-grams (`CharGramStrategy`)
//! - Token n-grams (`TokenGramStrategy`)
//! - Character/length PCFG (`PcfgStrategy`)
//! - Typed-token PCFG (`TokenPcfgStrategy`)
//! - Dictionary word mutation (`MutationStrategy`)
//! - Uniform baselines (`UniformStrategy`, `ShortNameStrategy`)
//! - Externally sampled candidates (`ExternalSampleStrategy`)

use rand::Rng;

use crate::corpus::Corpus;
use crate::error::Result;

/// Counted distributions and the shared weighted sampler.
pub mod distribution;

/// Character-level n-grams over a fixed context window.
pub mod char_gram;

/// Token-level n-grams with a separate delimiter distribution.
pub mod token_gram;

/// Character/length probabilistic grammar (`C<k>`/`N<k>` templates).
pub mod pcfg;

/// Probabilistic grammar over typed tokens (words, TLDs, tech terms, ...).
pub mod token_pcfg;

/// Random walk of dictionary-word mutations.
pub mod mutation;

/// Uniform-random baselines.
pub mod uniform;

/// Candidates sampled by an external (e.g. neural) trainer.
pub mod external;

/// Chunked counting on worker threads.
mod parallel;

pub use char_gram::{CharGramModel, CharGramStrategy};
pub use distribution::Distribution;
pub use external::{ExternalSampleStrategy, ExternalSamples};
pub use mutation::{Mutation, MutationModel, MutationStrategy};
pub use pcfg::{PcfgModel, PcfgStrategy};
pub use token_gram::{FallbackPolicy, TokenGramModel, TokenGramStrategy};
pub use token_pcfg::{ReferenceSets, TokenPcfgModel, TokenPcfgStrategy, TokenType};
pub use uniform::{ShortNameModel, ShortNameStrategy, UniformModel, UniformStrategy};

/// A trained model that can be sampled.
///
/// Read-only once built: sampling never mutates the model.
pub trait CandidateModel {
	/// Draws one raw string.
	///
	/// Returns `None` when this draw produced nothing usable (for example a
	/// token n-gram output that overflowed the length ceiling). The caller
	/// simply draws again.
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String>;
}

/// A candidate-generation strategy.
pub trait Strategy {
	/// The model built by one training pass.
	type Model: CandidateModel + serde::Serialize;

	/// Short identifier used for logs, profiles and snapshots.
	fn kind(&self) -> &'static str;

	/// Builds a fresh model from `corpus`.
	///
	/// Deterministic for a given corpus and configuration.
	///
	/// # Errors
	/// `GenError::InsufficientCorpus` when a structural distribution
	/// (lengths, templates, ...) would be empty.
	fn train(&self, corpus: &Corpus) -> Result<Self::Model>;
}
