use tracing::info;

use super::WorkQueue;
use crate::error::{GenError, Result};

/// A job held by `MemoryQueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
	pub topic: String,
	pub payload: String,
}

/// Work queue kept in memory.
///
/// Reports its depth as the number of stored jobs plus a fixed backlog,
/// which lets tests simulate a busy validator.
#[derive(Debug, Default)]
pub struct MemoryQueue {
	jobs: Vec<Job>,
	backlog: u64,
	unavailable: bool,
	echo: bool,
}

impl MemoryQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue whose depth starts at `backlog`.
	pub fn with_backlog(backlog: u64) -> Self {
		Self {
			backlog,
			..Self::default()
		}
	}

	/// Queue that logs every job it receives (dry runs).
	pub fn echoing() -> Self {
		Self {
			echo: true,
			..Self::default()
		}
	}

	/// Makes every subsequent call fail, as a disconnected queue would.
	pub fn set_available(&mut self, available: bool) {
		self.unavailable = !available;
	}

	pub fn jobs(&self) -> &[Job] {
		&self.jobs
	}

	fn check(&self) -> Result<()> {
		if self.unavailable {
			return Err(GenError::Queue("memory queue unavailable".to_owned()));
		}
		Ok(())
	}
}

impl WorkQueue for MemoryQueue {
	fn enqueue(&mut self, topic: &str, payload: &str) -> Result<()> {
		self.check()?;
		if self.echo {
			info!(topic, payload, "Dry-run job");
		}
		self.jobs.push(Job {
			topic: topic.to_owned(),
			payload: payload.to_owned(),
		});
		Ok(())
	}

	fn depth(&mut self) -> Result<u64> {
		self.check()?;
		if self.echo {
			// Nothing drains a dry-run queue; report it as idle
			return Ok(0);
		}
		Ok(self.backlog + self.jobs.len() as u64)
	}
}
