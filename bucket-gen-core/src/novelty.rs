//! Novelty filter backed by the strategy's append log.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::candidate::Candidate;
use crate::corpus::{Corpus, read_log_names};
use crate::error::{GenError, Result};
use crate::io;

/// Every name this strategy has already emitted, plus a seed set.
///
/// # Responsibilities
/// - Answer "was this candidate produced (or seeded) before?"
/// - Persist each newly accepted candidate to the strategy log, so the
///   set can be rebuilt after a restart
///
/// # Invariants
/// - Monotonic: names are never removed while the process runs
pub struct NoveltyStore {
	seen: HashSet<String>,
	log_path: Option<PathBuf>,
	log: Option<BufWriter<File>>,
}

impl NoveltyStore {
	/// A store without persistence.
	pub fn in_memory(seed: &Corpus) -> Self {
		Self {
			seen: seed.iter().map(str::to_owned).collect(),
			log_path: None,
			log: None,
		}
	}

	/// Rebuilds the store from `seed` and the log at `log_path`.
	///
	/// A missing log is treated as empty and unparsable lines are skipped,
	/// so a damaged log never prevents startup. The log is opened lazily on
	/// the first `record`.
	pub fn open(log_path: impl Into<PathBuf>, seed: &Corpus) -> Result<Self> {
		let log_path = log_path.into();
		let mut store = Self::in_memory(seed);
		let replayed = store.replay(&log_path)?;
		info!(log = %log_path.display(), seeded = seed.len(), replayed, "Novelty store ready");
		store.log_path = Some(log_path);
		Ok(store)
	}

	/// Adds every name found in a log file; returns how many were new.
	pub fn replay(&mut self, log_path: &Path) -> Result<usize> {
		let before = self.seen.len();
		self.seen.extend(read_log_names(log_path)?);
		Ok(self.seen.len() - before)
	}

	pub fn seen(&self, candidate: &str) -> bool {
		self.seen.contains(candidate)
	}

	/// Records a candidate, appending it to the log when it is new.
	///
	/// Returns `false` (and writes nothing) for a name already seen.
	pub fn record(&mut self, candidate: &Candidate) -> Result<bool> {
		if !self.seen.insert(candidate.as_str().to_owned()) {
			return Ok(false);
		}
		if let Some(path) = &self.log_path {
			if self.log.is_none() {
				let writer = io::open_append(path)
					.map_err(|e| GenError::io(format!("opening {}", path.display()), e))?;
				self.log = Some(writer);
			}
			if let Some(log) = self.log.as_mut() {
				io::append_line(log, candidate.as_str())
					.map_err(|e| GenError::io(format!("appending to {}", path.display()), e))?;
			}
		}
		Ok(true)
	}

	pub fn len(&self) -> usize {
		self.seen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seen.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn candidate(name: &str) -> Candidate {
		Candidate::parse(name).unwrap()
	}

	#[test]
	fn fresh_store_has_seen_nothing() {
		let dir = TempDir::new().unwrap();
		let store = NoveltyStore::open(dir.path().join("ngrams.txt"), &Corpus::new()).unwrap();
		assert!(store.is_empty());
		assert!(!store.seen("foo123"));
	}

	#[test]
	fn record_then_seen() {
		let dir = TempDir::new().unwrap();
		let mut store = NoveltyStore::open(dir.path().join("ngrams.txt"), &Corpus::new()).unwrap();
		assert!(store.record(&candidate("foo123")).unwrap());
		assert!(store.seen("foo123"));
		assert!(!store.record(&candidate("foo123")).unwrap());
	}

	#[test]
	fn seed_names_count_as_seen() {
		let seed: Corpus = ["seeded-name"].into_iter().collect();
		let store = NoveltyStore::in_memory(&seed);
		assert!(store.seen("seeded-name"));
	}

	#[test]
	fn survives_restart_through_the_log() {
		let dir = TempDir::new().unwrap();
		let log = dir.path().join("gen/pcfg.txt");
		{
			let mut store = NoveltyStore::open(&log, &Corpus::new()).unwrap();
			store.record(&candidate("alpha")).unwrap();
			store.record(&candidate("beta")).unwrap();
			store.record(&candidate("alpha")).unwrap();
		}
		assert_eq!(fs::read_to_string(&log).unwrap(), "alpha\nbeta\n");

		let store = NoveltyStore::open(&log, &Corpus::new()).unwrap();
		assert_eq!(store.len(), 2);
		assert!(store.seen("beta"));
	}

	#[test]
	fn hostname_shaped_names_survive_restart() {
		let dir = TempDir::new().unwrap();
		let log = dir.path().join("ngrams.txt");
		{
			let mut store = NoveltyStore::open(&log, &Corpus::new()).unwrap();
			store.record(&candidate("media.s3-backup.amazonaws.com")).unwrap();
		}

		let store = NoveltyStore::open(&log, &Corpus::new()).unwrap();
		assert!(store.seen("media.s3-backup.amazonaws.com"));
		assert!(!store.seen("media"));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn replaying_twice_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let log = dir.path().join("ngrams.txt");
		fs::write(&log, "one\ntwo\ntwo\n!!bad line!!\nthree\n").unwrap();

		let mut store = NoveltyStore::in_memory(&Corpus::new());
		assert_eq!(store.replay(&log).unwrap(), 3);
		let once = store.len();
		assert_eq!(store.replay(&log).unwrap(), 0);
		assert_eq!(store.len(), once);
	}
}
