//! Backpressure-aware submission of candidates to the validation queue.

use std::time::Duration;

use tracing::debug;

use crate::candidate::Candidate;
use crate::config::QueueConfig;
use crate::error::Result;

/// beanstalkd text-protocol client.
pub mod beanstalk;

/// In-process queue for tests and dry runs.
pub mod memory;

pub use beanstalk::BeanstalkQueue;
pub use memory::MemoryQueue;

/// Downstream work queue.
///
/// The engine only ever writes to it and reads its depth; acknowledgments
/// and retries belong to the validator on the other side.
pub trait WorkQueue {
	/// Enqueues one job on `topic`.
	fn enqueue(&mut self, topic: &str, payload: &str) -> Result<()>;

	/// Number of jobs currently waiting to be processed.
	fn depth(&mut self) -> Result<u64>;
}

impl<Q: WorkQueue + ?Sized> WorkQueue for Box<Q> {
	fn enqueue(&mut self, topic: &str, payload: &str) -> Result<()> {
		(**self).enqueue(topic, payload)
	}

	fn depth(&mut self) -> Result<u64> {
		(**self).depth()
	}
}

/// Linear admission control: sleep in proportion to queue depth.
///
/// With the default divisor of 100 000 a queue of 1M waiting jobs costs a
/// 10 s pause per submission, so the producer slows to a crawl long before
/// the queue grows unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backpressure {
	depth_divisor: f64,
	max_delay: Option<Duration>,
}

impl Default for Backpressure {
	fn default() -> Self {
		Self {
			depth_divisor: 100_000.0,
			max_delay: None,
		}
	}
}

impl Backpressure {
	pub fn new(depth_divisor: f64, max_delay: Option<Duration>) -> Self {
		Self { depth_divisor, max_delay }
	}

	pub fn from_config(config: &QueueConfig) -> Self {
		Self::new(
			config.depth_divisor,
			config.max_backoff_secs.filter(|s| s.is_finite() && *s >= 0.0).map(Duration::from_secs_f64),
		)
	}

	/// Pause to apply before submitting when `depth` jobs are waiting.
	pub fn delay(&self, depth: u64) -> Duration {
		if depth == 0 || self.depth_divisor <= 0.0 {
			return Duration::ZERO;
		}
		let delay = Duration::try_from_secs_f64(depth as f64 / self.depth_divisor).unwrap_or(Duration::MAX);
		match self.max_delay {
			Some(max) => delay.min(max),
			None => delay,
		}
	}
}

/// Formats the job body the validator expects.
pub fn job_payload(strategy: &str, candidate: &Candidate) -> String {
	format!("generation/{strategy},{candidate}")
}

/// Forwards candidates to a `WorkQueue`, throttled by its depth.
///
/// Assumes a single producer per strategy; the depth reading is advisory.
pub struct Dispatcher<Q: WorkQueue> {
	queue: Q,
	topic: String,
	backpressure: Backpressure,
	pause: fn(Duration),
}

impl<Q: WorkQueue> Dispatcher<Q> {
	pub fn new(queue: Q, topic: impl Into<String>, backpressure: Backpressure) -> Self {
		Self {
			queue,
			topic: topic.into(),
			backpressure,
			pause: std::thread::sleep,
		}
	}

	/// Replaces the blocking sleep (tests use a no-op).
	pub fn with_pause(mut self, pause: fn(Duration)) -> Self {
		self.pause = pause;
		self
	}

	/// Submits one job, sleeping first according to the queue depth.
	///
	/// Returns the pause that was applied.
	///
	/// # Errors
	/// Queue failures are returned as-is; nothing is retried here.
	pub fn submit(&mut self, payload: &str) -> Result<Duration> {
		let depth = self.queue.depth()?;
		let delay = self.backpressure.delay(depth);
		if !delay.is_zero() {
			debug!(depth, delay_ms = delay.as_millis() as u64, "Applying backpressure");
			(self.pause)(delay);
		}
		self.queue.enqueue(&self.topic, payload)?;
		Ok(delay)
	}

	pub fn queue(&self) -> &Q {
		&self.queue
	}

	pub fn into_queue(self) -> Q {
		self.queue
	}
}
