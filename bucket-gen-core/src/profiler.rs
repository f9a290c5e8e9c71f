//! CPU-time profiling of training and generation, for offline analysis.
//!
//! Records are appended to `<timing_dir>/<phase>/<strategy>` as
//! `candidate,cpu_seconds,unix_timestamp`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use cpu_time::ProcessTime;
use tracing::warn;

use crate::error::{GenError, Result};
use crate::io;

/// Which part of the loop a record measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	Train,
	Generate,
}

impl Phase {
	pub fn dir_name(self) -> &'static str {
		match self {
			Self::Train => "train",
			Self::Generate => "generate",
		}
	}
}

/// One profiled unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
	/// Candidate produced in the scope (empty for training passes)
	pub candidate: String,
	/// CPU time spent by the process inside the scope
	pub cpu: Duration,
	/// Wall-clock time at the end of the scope, in seconds since the epoch
	pub timestamp: f64,
}

impl ProfileRecord {
	fn to_line(&self) -> String {
		format!("{},{:.6},{:.6}", self.candidate, self.cpu.as_secs_f64(), self.timestamp)
	}

	/// Parses one log line; `None` if malformed.
	pub fn parse(line: &str) -> Option<Self> {
		let mut fields = line.trim().rsplitn(3, ',');
		let timestamp = fields.next()?.parse::<f64>().ok()?;
		let cpu = fields.next()?.parse::<f64>().ok()?;
		let candidate = fields.next()?.to_owned();
		if !cpu.is_finite() || cpu < 0.0 {
			return None;
		}
		Some(Self {
			candidate,
			cpu: Duration::from_secs_f64(cpu),
			timestamp,
		})
	}
}

/// Reads every well-formed record from a profile log.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<ProfileRecord>> {
	let path = path.as_ref();
	let lines = io::read_lines(path).map_err(|e| GenError::io(format!("reading {}", path.display()), e))?;
	Ok(lines.iter().filter_map(|line| ProfileRecord::parse(line)).collect())
}

/// Per-strategy profile writer.
pub struct Profiler {
	/// `None` disables profiling entirely
	root: Option<PathBuf>,
	name: String,
	train: Option<BufWriter<File>>,
	generate: Option<BufWriter<File>>,
}

impl Profiler {
	pub fn new(timing_dir: impl Into<PathBuf>, name: &str) -> Self {
		Self {
			root: Some(timing_dir.into()),
			name: name.to_owned(),
			train: None,
			generate: None,
		}
	}

	/// A profiler that measures nothing and writes nothing.
	pub fn disabled() -> Self {
		Self {
			root: None,
			name: String::new(),
			train: None,
			generate: None,
		}
	}

	/// Log file of a phase, if profiling is enabled.
	pub fn log_path(&self, phase: Phase) -> Option<PathBuf> {
		self.root.as_ref().map(|root| root.join(phase.dir_name()).join(&self.name))
	}

	/// Starts measuring one unit of work.
	///
	/// The record is written when the returned guard is dropped, whichever
	/// way the scope is left.
	pub fn scope(&mut self, phase: Phase) -> ProfileScope<'_> {
		let start = if self.root.is_some() { ProcessTime::try_now().ok() } else { None };
		ProfileScope {
			profiler: self,
			phase,
			start,
			candidate: String::new(),
		}
	}

	fn write(&mut self, phase: Phase, record: &ProfileRecord) -> std::io::Result<()> {
		let Some(path) = self.log_path(phase) else {
			return Ok(());
		};
		let slot = match phase {
			Phase::Train => &mut self.train,
			Phase::Generate => &mut self.generate,
		};
		if slot.is_none() {
			*slot = Some(io::open_append(&path)?);
		}
		match slot.as_mut() {
			Some(writer) => io::append_line(writer, &record.to_line()),
			None => Ok(()),
		}
	}
}

/// Guard measuring a single training pass or generation.
pub struct ProfileScope<'a> {
	profiler: &'a mut Profiler,
	phase: Phase,
	start: Option<ProcessTime>,
	candidate: String,
}

impl ProfileScope<'_> {
	/// Attaches the candidate produced inside this scope.
	pub fn candidate(&mut self, name: &str) {
		self.candidate.clear();
		self.candidate.push_str(name);
	}
}

impl Drop for ProfileScope<'_> {
	fn drop(&mut self) {
		let Some(start) = self.start.take() else {
			return;
		};
		let record = ProfileRecord {
			candidate: std::mem::take(&mut self.candidate),
			cpu: start.try_elapsed().unwrap_or_default(),
			timestamp: Utc::now().timestamp_micros() as f64 / 1e6,
		};
		if let Err(e) = self.profiler.write(self.phase, &record) {
			warn!(phase = self.phase.dir_name(), error = %e, "Failed to write profile record");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn scope_writes_on_drop() {
		let dir = TempDir::new().unwrap();
		let mut profiler = Profiler::new(dir.path(), "pcfg");
		{
			let mut scope = profiler.scope(Phase::Generate);
			scope.candidate("my-bucket");
		}
		{
			let _scope = profiler.scope(Phase::Train);
		}

		let generated = read_records(profiler.log_path(Phase::Generate).unwrap()).unwrap();
		assert_eq!(generated.len(), 1);
		assert_eq!(generated[0].candidate, "my-bucket");
		assert!(generated[0].timestamp > 0.0);

		let trained = read_records(dir.path().join("train/pcfg")).unwrap();
		assert_eq!(trained.len(), 1);
		assert_eq!(trained[0].candidate, "");
	}

	#[test]
	fn scope_is_flushed_on_early_exit() {
		fn failing(profiler: &mut Profiler) -> std::result::Result<(), String> {
			let mut scope = profiler.scope(Phase::Generate);
			scope.candidate("half-done");
			Err("boom".to_owned())
		}

		let dir = TempDir::new().unwrap();
		let mut profiler = Profiler::new(dir.path(), "ngrams");
		assert!(failing(&mut profiler).is_err());

		let records = read_records(dir.path().join("generate/ngrams")).unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].candidate, "half-done");
	}

	#[test]
	fn disabled_profiler_writes_nothing() {
		let mut profiler = Profiler::disabled();
		{
			let mut scope = profiler.scope(Phase::Generate);
			scope.candidate("ignored");
		}
		assert_eq!(profiler.log_path(Phase::Generate), None);
	}

	#[test]
	fn parse_rejects_malformed_lines() {
		let record = ProfileRecord::parse("name,0.000125,1595203200.5").unwrap();
		assert_eq!(record.candidate, "name");
		assert_eq!(record.timestamp, 1595203200.5);
		assert!(ProfileRecord::parse("garbage").is_none());
		assert!(ProfileRecord::parse("name,abc,1").is_none());
		assert!(ProfileRecord::parse("name,-1,1").is_none());
		assert_eq!(ProfileRecord::parse(",0.5,1").unwrap().candidate, "");
	}
}
