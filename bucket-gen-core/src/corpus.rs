//! Training corpora: seed sets, confirmed buckets, and line parsing.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::candidate::Candidate;
use crate::error::{GenError, Result};
use crate::io;

/// Bucket hostnames and path-style URLs, checked in order; the first
/// pattern that matches a line wins.
static BUCKET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		r"([\w.-]+)\.s3[\w-]*\.amazonaws\.com",
		r"([\w.-]+)\.storage\.googleapis\.com",
		r"([\w.-]+)\.[\w.-]*\.cdn\.digitaloceanspaces\.com",
		r"([\w-]+)\.oss[\w-]*\.aliyuncs\.com",
		r"^[^.]*s3[\w-]*\.amazonaws\.com/([\w.-]+)",
		r"^[^.]*s3[\w.-]*\.wasabisys\.com/([\w.-]+)",
		r"^[^.]*storage\.googleapis\.com/([\w.-]+)",
		r"^[^.]*oss[\w-]*\.aliyuncs\.com/([\w.-]+)",
	]
	.iter()
	.filter_map(|pattern| Regex::new(pattern).ok())
	.collect()
});

/// Extracts every bucket name a line refers to.
///
/// Accepted shapes:
/// - a storage hostname or URL (`name.s3.amazonaws.com`, `s3.amazonaws.com/name`, ...)
/// - `name,timestamp`
/// - a bare name
///
/// Anything that does not yield a valid `Candidate` is dropped, so a
/// malformed line contributes nothing instead of failing the read.
pub fn names_from_line(line: &str) -> Vec<Candidate> {
	let lowered = line.trim().to_lowercase();
	if lowered.is_empty() {
		return Vec::new();
	}

	for pattern in BUCKET_PATTERNS.iter() {
		let found: Vec<Candidate> = pattern
			.captures_iter(&lowered)
			.filter_map(|captures| captures.get(1))
			.filter_map(|m| Candidate::parse(m.as_str()).ok())
			.collect();
		if !found.is_empty() {
			return found;
		}
	}

	let first_field = lowered.split(',').next().unwrap_or_default();
	Candidate::parse(first_field).into_iter().collect()
}

/// Reads every bucket name referenced in a file.
///
/// A missing file yields an empty set; unparsable lines are skipped.
pub fn read_names<P: AsRef<Path>>(path: P) -> Result<BTreeSet<String>> {
	let path = path.as_ref();
	let lines = io::read_lines_if_exists(path)
		.map_err(|e| GenError::io(format!("reading {}", path.display()), e))?;

	let mut names = BTreeSet::new();
	let mut skipped = 0usize;
	for line in &lines {
		let found = names_from_line(line);
		if found.is_empty() && !line.trim().is_empty() {
			skipped += 1;
		}
		names.extend(found.into_iter().map(Candidate::into_string));
	}
	if skipped > 0 {
		debug!(path = %path.display(), skipped, "Skipped unparsable lines");
	}
	Ok(names)
}

/// Reads a list of bare names, such as a strategy log this crate wrote.
///
/// Each line is taken literally (only a trailing `,`-separated field is
/// dropped): `media.s3-backup.amazonaws.com` is itself a valid bucket
/// name here, not a URL to extract from. A missing file yields an empty
/// set; invalid lines are skipped.
pub fn read_log_names<P: AsRef<Path>>(path: P) -> Result<BTreeSet<String>> {
	let path = path.as_ref();
	let lines = io::read_lines_if_exists(path)
		.map_err(|e| GenError::io(format!("reading {}", path.display()), e))?;

	Ok(lines
		.iter()
		.filter_map(|line| Candidate::parse(line.split(',').next().unwrap_or_default()).ok())
		.map(Candidate::into_string)
		.collect())
}

/// A set of normalized bucket names used as training input.
///
/// Read-only for the duration of a training pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
	names: BTreeSet<String>,
}

impl Corpus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a name after validation; invalid names are ignored.
	pub fn insert(&mut self, name: &str) -> bool {
		match Candidate::parse(name) {
			Ok(candidate) => self.names.insert(candidate.into_string()),
			Err(_) => false,
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.names.contains(name)
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.names.iter().map(String::as_str)
	}

	/// Names as a slice-friendly vector, for chunked processing.
	pub(crate) fn as_vec(&self) -> Vec<&str> {
		self.iter().collect()
	}

	/// Union with another corpus.
	pub fn extend(&mut self, other: &Corpus) {
		self.names.extend(other.names.iter().cloned());
	}
}

impl<'a> FromIterator<&'a str> for Corpus {
	fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
		let mut corpus = Self::new();
		for name in iter {
			corpus.insert(name);
		}
		corpus
	}
}

impl From<BTreeSet<String>> for Corpus {
	fn from(names: BTreeSet<String>) -> Self {
		names.iter().map(String::as_str).collect()
	}
}

/// Where a strategy's training corpus comes from.
///
/// On every training pass the corpus is recomputed as
/// `seed ∪ (confirmed ∩ strategy log)`: the seed set plus whatever this
/// strategy generated earlier that the validator has since confirmed.
#[derive(Debug, Clone)]
pub struct CorpusSource {
	seed: Corpus,
	confirmed: PathBuf,
	strategy_log: PathBuf,
}

impl CorpusSource {
	pub fn new(seed: Corpus, confirmed: impl Into<PathBuf>, strategy_log: impl Into<PathBuf>) -> Self {
		Self {
			seed,
			confirmed: confirmed.into(),
			strategy_log: strategy_log.into(),
		}
	}

	pub fn seed(&self) -> &Corpus {
		&self.seed
	}

	/// Names this strategy generated that turned out to exist.
	pub fn confirmed_self_generated(&self) -> Result<Corpus> {
		let confirmed = read_names(&self.confirmed)?;
		if confirmed.is_empty() {
			return Ok(Corpus::new());
		}
		let generated = read_log_names(&self.strategy_log)?;
		Ok(generated.iter().filter(|name| confirmed.contains(*name)).map(String::as_str).collect())
	}

	/// Builds the corpus for the next training pass.
	pub fn assemble(&self) -> Result<Corpus> {
		let mut corpus = self.seed.clone();
		corpus.extend(&self.confirmed_self_generated()?);
		Ok(corpus)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn names(line: &str) -> Vec<String> {
		names_from_line(line).into_iter().map(Candidate::into_string).collect()
	}

	#[test]
	fn extracts_virtual_host_style_names() {
		assert_eq!(names("https://My-Assets.s3.amazonaws.com/logo.png"), vec!["my-assets"]);
		assert_eq!(names("media.prod.s3-us-west-2.amazonaws.com"), vec!["media.prod"]);
		assert_eq!(names("static-files.storage.googleapis.com"), vec!["static-files"]);
		assert_eq!(names("uploads.oss-cn-hangzhou.aliyuncs.com"), vec!["uploads"]);
	}

	#[test]
	fn extracts_path_style_names() {
		assert_eq!(names("s3.amazonaws.com/backup_2020"), vec!["backup_2020"]);
		assert_eq!(names("storage.googleapis.com/site-data/index.html"), vec!["site-data"]);
	}

	#[test]
	fn accepts_bare_names_and_timestamped_lines() {
		assert_eq!(names("photos-archive"), vec!["photos-archive"]);
		assert_eq!(names("photos-archive,1595203200"), vec!["photos-archive"]);
		assert!(names("").is_empty());
		assert!(names("not a bucket at all").is_empty());
	}

	#[test]
	fn every_bucket_pattern_compiles() {
		assert_eq!(BUCKET_PATTERNS.len(), 8);
	}

	#[test]
	fn log_names_are_read_literally() {
		let dir = TempDir::new().unwrap();
		let log = dir.path().join("ngrams.txt");
		fs::write(&log, "media.s3-backup.amazonaws.com\nplain,1595203200\nNot Valid!\n").unwrap();

		let names = read_log_names(&log).unwrap();
		assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["media.s3-backup.amazonaws.com", "plain"]);
		assert!(read_log_names(dir.path().join("missing.txt")).unwrap().is_empty());
	}

	#[test]
	fn corpus_rejects_invalid_names() {
		let corpus: Corpus = ["ok-name", "Bad Name", "", "UPPER"].into_iter().collect();
		assert_eq!(corpus.iter().collect::<Vec<_>>(), vec!["ok-name", "upper"]);
	}

	#[test]
	fn assemble_adds_only_confirmed_self_generated_names() {
		let dir = TempDir::new().unwrap();
		let confirmed = dir.path().join("all_platforms_all.txt");
		let log = dir.path().join("pcfg.txt");
		fs::write(&confirmed, "hit-one,1\nhit-two.s3.amazonaws.com\nelsewhere\n").unwrap();
		fs::write(&log, "hit-one\nhit-two\nmiss\n%%garbage%%\n").unwrap();

		let seed: Corpus = ["seed-a"].into_iter().collect();
		let source = CorpusSource::new(seed, &confirmed, &log);
		let corpus = source.assemble().unwrap();

		assert_eq!(corpus.iter().collect::<Vec<_>>(), vec!["hit-one", "hit-two", "seed-a"]);
	}

	#[test]
	fn assemble_tolerates_missing_files() {
		let dir = TempDir::new().unwrap();
		let seed: Corpus = ["seed-a"].into_iter().collect();
		let source = CorpusSource::new(seed.clone(), dir.path().join("none"), dir.path().join("log"));
		assert_eq!(source.assemble().unwrap(), seed);
	}
}
