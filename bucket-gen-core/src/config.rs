//! Configuration for a generation run.
//!
//! Every field has a default, so an empty (or missing) file yields a usable
//! configuration. Values are resolved once at process start and passed by
//! value into the engine; nothing in the generation loop reads the file again.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::token_gram::FallbackPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
	#[serde(default)]
	pub engine: EngineConfig,

	#[serde(default)]
	pub paths: PathsConfig,

	#[serde(default)]
	pub queue: QueueConfig,

	#[serde(default)]
	pub reference: ReferenceConfig,

	#[serde(default)]
	pub models: ModelsConfig,
}

/// Training/generation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Generation attempts between two training passes
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,

	/// Number of accepted candidates before stopping (absent = unbounded)
	#[serde(default)]
	pub num_trials: Option<u64>,

	/// Optional RNG seed, for reproducible runs
	#[serde(default)]
	pub seed: Option<u64>,

	/// Consecutive skipped batches tolerated before giving up
	#[serde(default = "default_max_skipped_batches")]
	pub max_skipped_batches: u32,

	/// Wait between a skipped batch and the next training attempt
	#[serde(default = "default_skip_backoff_secs")]
	pub skip_backoff_secs: u64,
}

fn default_batch_size() -> usize {
	10_000
}

fn default_max_skipped_batches() -> u32 {
	3
}

fn default_skip_backoff_secs() -> u64 {
	30
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			batch_size: default_batch_size(),
			num_trials: None,
			seed: None,
			max_skipped_batches: default_max_skipped_batches(),
			skip_backoff_secs: default_skip_backoff_secs(),
		}
	}
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
	/// Directory holding one append log per strategy (`<name>.txt`)
	#[serde(default = "default_generation_dir")]
	pub generation_dir: PathBuf,

	/// Directory holding the profiler logs (`<phase>/<name>`)
	#[serde(default = "default_timing_dir")]
	pub timing_dir: PathBuf,

	/// Where trained models are serialized, if anywhere
	#[serde(default)]
	pub snapshot_dir: Option<PathBuf>,

	/// Every confirmed bucket, public or private
	#[serde(default = "default_confirmed_all")]
	pub confirmed_all: PathBuf,

	/// Confirmed public buckets only
	#[serde(default = "default_confirmed_public")]
	pub confirmed_public: PathBuf,

	/// Explicit seed set; defaults to the confirmed corpus
	#[serde(default)]
	pub seed_file: Option<PathBuf>,
}

fn default_generation_dir() -> PathBuf {
	PathBuf::from("./data/generation")
}

fn default_timing_dir() -> PathBuf {
	PathBuf::from("./data/timing")
}

fn default_confirmed_all() -> PathBuf {
	PathBuf::from("./final_output/all_platforms_all.txt")
}

fn default_confirmed_public() -> PathBuf {
	PathBuf::from("./final_output/all_platforms_public.txt")
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			generation_dir: default_generation_dir(),
			timing_dir: default_timing_dir(),
			snapshot_dir: None,
			confirmed_all: default_confirmed_all(),
			confirmed_public: default_confirmed_public(),
			seed_file: None,
		}
	}
}

impl PathsConfig {
	/// Append log of the given strategy.
	pub fn strategy_log(&self, name: &str) -> PathBuf {
		self.generation_dir.join(format!("{name}.txt"))
	}

	/// Confirmed corpus matching the requested visibility.
	pub fn confirmed(&self, public_only: bool) -> &Path {
		if public_only {
			&self.confirmed_public
		} else {
			&self.confirmed_all
		}
	}
}

/// Downstream work queue (beanstalkd).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
	#[serde(default = "default_queue_host")]
	pub host: String,

	#[serde(default = "default_queue_port")]
	pub port: u16,

	#[serde(default = "default_tube")]
	pub tube: String,

	/// Backpressure sleep is `depth / depth_divisor` seconds
	#[serde(default = "default_depth_divisor")]
	pub depth_divisor: f64,

	/// Upper bound on a single backpressure sleep
	#[serde(default)]
	pub max_backoff_secs: Option<f64>,

	#[serde(default = "default_priority")]
	pub priority: u32,

	#[serde(default = "default_ttr_secs")]
	pub ttr_secs: u32,
}

fn default_queue_host() -> String {
	"127.0.0.1".to_string()
}

fn default_queue_port() -> u16 {
	11300
}

fn default_tube() -> String {
	"default".to_string()
}

fn default_depth_divisor() -> f64 {
	100_000.0
}

fn default_priority() -> u32 {
	1024
}

fn default_ttr_secs() -> u32 {
	60
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			host: default_queue_host(),
			port: default_queue_port(),
			tube: default_tube(),
			depth_divisor: default_depth_divisor(),
			max_backoff_secs: None,
			priority: default_priority(),
			ttr_secs: default_ttr_secs(),
		}
	}
}

/// Reference word lists used by the typed-token PCFG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
	#[serde(default = "default_words")]
	pub words: PathBuf,

	#[serde(default = "default_suffixes")]
	pub suffixes: PathBuf,

	#[serde(default = "default_tech_terms")]
	pub tech_terms: PathBuf,

	#[serde(default = "default_domains")]
	pub domains: PathBuf,

	#[serde(default = "default_file_extensions")]
	pub file_extensions: PathBuf,
}

fn default_words() -> PathBuf {
	PathBuf::from("/usr/share/dict/words")
}

fn default_suffixes() -> PathBuf {
	PathBuf::from("./data/aux/public_suffix_list.dat")
}

fn default_tech_terms() -> PathBuf {
	PathBuf::from("./data/aux/tech_terms.txt")
}

fn default_domains() -> PathBuf {
	PathBuf::from("./data/aux/top-1e5-domains.txt")
}

fn default_file_extensions() -> PathBuf {
	PathBuf::from("./data/aux/wikipedia-file-extensions.txt")
}

impl Default for ReferenceConfig {
	fn default() -> Self {
		Self {
			words: default_words(),
			suffixes: default_suffixes(),
			tech_terms: default_tech_terms(),
			domains: default_domains(),
			file_extensions: default_file_extensions(),
		}
	}
}

/// Model hyper-parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
	/// Laplace pseudo-count added to every alphabet symbol
	#[serde(default = "default_smoothing")]
	pub smoothing: u64,

	/// Characters of context used by the character n-gram model
	#[serde(default = "default_char_context")]
	pub char_context: usize,

	/// Weight of one observed length in the character n-gram model
	#[serde(default = "default_length_weight")]
	pub length_weight: u64,

	/// What the token n-gram model does with an unseen preceding token
	#[serde(default)]
	pub token_fallback: FallbackPolicy,

	/// Output length of the uniform-random baseline
	#[serde(default = "default_random_length")]
	pub random_length: usize,
}

fn default_smoothing() -> u64 {
	1
}

fn default_char_context() -> usize {
	4
}

fn default_length_weight() -> u64 {
	1000
}

fn default_random_length() -> usize {
	5
}

impl Default for ModelsConfig {
	fn default() -> Self {
		Self {
			smoothing: default_smoothing(),
			char_context: default_char_context(),
			length_weight: default_length_weight(),
			token_fallback: FallbackPolicy::default(),
			random_length: default_random_length(),
		}
	}
}

impl GeneratorConfig {
	/// Load configuration from a TOML file.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.to_owned(),
			source: e,
		})?;

		let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
			path: path.to_owned(),
			source: e,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Load `path` if it exists, otherwise fall back to the defaults.
	pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
		if path.exists() {
			Self::from_file(path)
		} else {
			Ok(Self::default())
		}
	}

	/// Reject values that would make the loop degenerate.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.engine.batch_size == 0 {
			return Err(ConfigError::Invalid("engine.batch_size must be > 0".into()));
		}
		if self.queue.depth_divisor <= 0.0 || !self.queue.depth_divisor.is_finite() {
			return Err(ConfigError::Invalid("queue.depth_divisor must be a positive number".into()));
		}
		if self.models.char_context == 0 {
			return Err(ConfigError::Invalid("models.char_context must be > 0".into()));
		}
		if self.models.random_length == 0 || self.models.random_length > crate::candidate::MAX_LEN {
			return Err(ConfigError::Invalid(format!(
				"models.random_length must be between 1 and {}",
				crate::candidate::MAX_LEN
			)));
		}
		Ok(())
	}
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("Failed to parse config file {path}: {source}")]
	Parse {
		path: PathBuf,
		source: toml::de::Error,
	},

	#[error("Invalid configuration: {0}")]
	Invalid(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn empty_file_yields_defaults() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("bucket-gen.toml");
		std::fs::write(&path, "").unwrap();

		let config = GeneratorConfig::from_file(&path).unwrap();
		assert_eq!(config.engine.batch_size, 10_000);
		assert_eq!(config.engine.num_trials, None);
		assert_eq!(config.queue.port, 11300);
		assert_eq!(config.models.char_context, 4);
		assert_eq!(config.models.token_fallback, FallbackPolicy::Unconditioned);
	}

	#[test]
	fn partial_sections_override_only_their_fields() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("bucket-gen.toml");
		std::fs::write(
			&path,
			"[engine]\nbatch_size = 50\nnum_trials = 7\n\n[queue]\nport = 11301\n\n[models]\ntoken_fallback = \"truncate\"\n",
		)
		.unwrap();

		let config = GeneratorConfig::from_file(&path).unwrap();
		assert_eq!(config.engine.batch_size, 50);
		assert_eq!(config.engine.num_trials, Some(7));
		assert_eq!(config.queue.port, 11301);
		assert_eq!(config.queue.host, "127.0.0.1");
		assert_eq!(config.models.token_fallback, FallbackPolicy::Truncate);
	}

	#[test]
	fn missing_file_falls_back_to_defaults() {
		let dir = TempDir::new().unwrap();
		let config = GeneratorConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
		assert_eq!(config.paths.strategy_log("pcfg"), PathBuf::from("./data/generation/pcfg.txt"));
	}

	#[test]
	fn zero_batch_size_is_rejected() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("bucket-gen.toml");
		std::fs::write(&path, "[engine]\nbatch_size = 0\n").unwrap();
		assert!(matches!(GeneratorConfig::from_file(&path), Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn malformed_toml_reports_path() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("bucket-gen.toml");
		std::fs::write(&path, "[engine\n").unwrap();
		let err = GeneratorConfig::from_file(&path).unwrap_err();
		assert!(err.to_string().contains("bucket-gen.toml"));
	}
}
