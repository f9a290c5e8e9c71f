use std::path::PathBuf;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{CandidateModel, Strategy};
use crate::corpus::{Corpus, read_log_names};
use crate::error::{GenError, Result};

/// Draws from candidates produced by an external sampler.
///
/// Used for generators whose training happens outside this crate (a
/// neural sequence model, for instance): the external trainer keeps
/// rewriting a line-oriented samples file, and each training pass here
/// simply reloads it.
#[derive(Debug, Clone)]
pub struct ExternalSampleStrategy {
	samples: PathBuf,
}

impl ExternalSampleStrategy {
	pub fn new(samples: impl Into<PathBuf>) -> Self {
		Self { samples: samples.into() }
	}
}

impl Strategy for ExternalSampleStrategy {
	type Model = ExternalSamples;

	fn kind(&self) -> &'static str {
		"external"
	}

	fn train(&self, _corpus: &Corpus) -> Result<ExternalSamples> {
		let samples: Vec<String> = read_log_names(&self.samples)?.into_iter().collect();
		if samples.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "external samples" });
		}
		Ok(ExternalSamples { samples })
	}
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExternalSamples {
	samples: Vec<String>,
}

impl CandidateModel for ExternalSamples {
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		self.samples.choose(rng).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn reloads_samples_on_every_pass() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("rnn.txt");
		let strategy = ExternalSampleStrategy::new(&path);

		assert!(matches!(strategy.train(&Corpus::new()), Err(GenError::InsufficientCorpus { .. })));

		fs::write(&path, "alpha\nbeta\nnot valid!\n").unwrap();
		let model = strategy.train(&Corpus::new()).unwrap();
		let mut rng = StdRng::seed_from_u64(4);
		for _ in 0..100 {
			let name = model.sample(&mut rng).unwrap();
			assert!(name == "alpha" || name == "beta");
		}

		fs::write(&path, "gamma\n").unwrap();
		let model = strategy.train(&Corpus::new()).unwrap();
		assert_eq!(model.sample(&mut rng).as_deref(), Some("gamma"));
	}
}
