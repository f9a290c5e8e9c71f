//! Error types shared by every generation strategy.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for candidate generation.
#[derive(Debug, Error)]
pub enum GenError {
	/// A structural distribution (lengths, templates, transitions) had no
	/// observations to train from.
	#[error("Insufficient corpus: no observations for {level}")]
	InsufficientCorpus { level: &'static str },

	#[error("Failed to load reference set {path}: {source}")]
	ReferenceSet {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("IO error: {context}")]
	Io {
		context: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Work queue error: {0}")]
	Queue(String),

	#[error("Work queue IO error: {context}")]
	QueueIo {
		context: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Snapshot error: {0}")]
	Snapshot(#[from] postcard::Error),

	#[error("Configuration error: {0}")]
	Config(#[from] crate::config::ConfigError),

	#[error("Invalid candidate: {0:?}")]
	InvalidCandidate(String),
}

impl GenError {
	/// Create an IO error with context.
	pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
		Self::Io {
			context: context.into(),
			source,
		}
	}

	/// Create a queue IO error with context.
	pub fn queue_io(context: impl Into<String>, source: std::io::Error) -> Self {
		Self::QueueIo {
			context: context.into(),
			source,
		}
	}

	/// Whether the engine may skip the current batch and carry on.
	///
	/// Only an empty corpus is recoverable: the corpus is refreshed
	/// externally, so a later training pass can succeed. Everything else
	/// (queue failures in particular) halts the loop.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::InsufficientCorpus { .. })
	}
}

/// Result type alias for candidate generation.
pub type Result<T> = std::result::Result<T, GenError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_insufficient_corpus_is_recoverable() {
		assert!(GenError::InsufficientCorpus { level: "templates" }.is_recoverable());
		assert!(!GenError::Queue("down".into()).is_recoverable());
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
		assert!(!GenError::io("reading log", io).is_recoverable());
	}

	#[test]
	fn messages_name_the_failing_level() {
		let err = GenError::InsufficientCorpus { level: "length distribution" };
		assert_eq!(err.to_string(), "Insufficient corpus: no observations for length distribution");
	}
}
