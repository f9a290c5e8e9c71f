//! bucket-gen CLI - run one candidate-generation strategy against the
//! validation queue.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bucket_gen_core::corpus::read_names;
use bucket_gen_core::model::{
	CharGramStrategy, ExternalSampleStrategy, MutationStrategy, PcfgStrategy, ShortNameStrategy, TokenGramStrategy,
	TokenPcfgStrategy, UniformStrategy,
};
use bucket_gen_core::{
	Backpressure, BeanstalkQueue, Corpus, CorpusSource, Dispatcher, Engine, EngineSettings, GeneratorConfig,
	MemoryQueue, NoveltyStore, Profiler, Strategy, WorkQueue,
};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "bucket-gen")]
#[command(version)]
#[command(about = "Adaptive bucket-name candidate generation")]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Path to configuration file (defaults are used if it does not exist)
	#[arg(short, long, global = true, default_value = "bucket-gen.toml")]
	config: PathBuf,

	/// Generator identifier (log, profile and payload name)
	#[arg(short, long, global = true)]
	name: Option<String>,

	/// Number of candidates to submit before stopping (unbounded if unset)
	#[arg(long, global = true)]
	num_trials: Option<u64>,

	/// The beanstalk job queue port
	#[arg(long, global = true)]
	port: Option<u16>,

	/// Only learn from public buckets
	#[arg(long, global = true)]
	public: bool,

	/// Seed names (defaults to the confirmed corpus)
	#[arg(long, global = true)]
	seed_file: Option<PathBuf>,

	/// RNG seed, for reproducible runs
	#[arg(long, global = true)]
	rng_seed: Option<u64>,

	/// Log candidates instead of submitting them
	#[arg(long, global = true)]
	dry_run: bool,

	/// Verbose output
	#[arg(short, long, global = true)]
	verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Character n-grams over the trailing characters
	CharGrams,

	/// Token n-grams split on '.', '-' and '_'
	TokenGrams,

	/// Character/length probabilistic grammar
	Pcfg,

	/// Probabilistic grammar over typed tokens
	TokenPcfg,

	/// Random mutations of dictionary words
	Mutate {
		/// Word list (defaults to `reference.words`)
		#[arg(long)]
		words: Option<PathBuf>,
	},

	/// Uniformly random names
	Random {
		/// Name length (defaults to `models.random_length`)
		#[arg(long)]
		length: Option<usize>,
	},

	/// Uniformly random 3- and 4-letter names
	ShortNames,

	/// Candidates sampled by an external trainer
	External {
		/// File the external trainer writes its samples to
		#[arg(long)]
		samples: PathBuf,
	},

	/// Validate the configuration file
	Validate,
}

fn setup_logging(verbose: bool) -> Result<()> {
	let level = if verbose { Level::DEBUG } else { Level::INFO };
	let subscriber = FmtSubscriber::builder()
		.with_max_level(level)
		.with_target(false)
		.with_thread_ids(false)
		.compact()
		.finish();
	tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

/// Loads the file and folds the command-line overrides into it.
fn resolve_config(cli: &Cli) -> Result<GeneratorConfig> {
	let mut config = GeneratorConfig::load_or_default(&cli.config)
		.with_context(|| format!("Failed to load config from {:?}", cli.config))?;

	if let Some(trials) = cli.num_trials {
		config.engine.num_trials = Some(trials);
	}
	if let Some(seed) = cli.rng_seed {
		config.engine.seed = Some(seed);
	}
	if let Some(port) = cli.port {
		config.queue.port = port;
	}
	if let Some(seed_file) = &cli.seed_file {
		config.paths.seed_file = Some(seed_file.clone());
	}
	config.validate().context("Invalid configuration")?;
	Ok(config)
}

fn load_names(path: &Path) -> Result<Corpus> {
	let names = read_names(path).with_context(|| format!("Failed to read names from {}", path.display()))?;
	Ok(Corpus::from(names))
}

fn open_queue(config: &GeneratorConfig, dry_run: bool) -> Result<Box<dyn WorkQueue>> {
	if dry_run {
		info!("Dry run: candidates are logged, not submitted");
		return Ok(Box::new(MemoryQueue::echoing()));
	}
	let queue = BeanstalkQueue::connect(&config.queue)
		.with_context(|| format!("Failed to connect to beanstalkd at {}:{}", config.queue.host, config.queue.port))?;
	Ok(Box::new(queue))
}

fn run_strategy<S: Strategy>(strategy: S, config: &GeneratorConfig, cli: &Cli) -> Result<()> {
	let name = cli.name.clone().unwrap_or_else(|| strategy.kind().to_owned());
	let paths = &config.paths;
	let confirmed = paths.confirmed(cli.public);
	let strategy_log = paths.strategy_log(&name);

	let seed = match &paths.seed_file {
		Some(path) => load_names(path)?,
		None => load_names(confirmed)?,
	};
	info!(strategy = %name, seed = seed.len(), public = cli.public, "Loaded seed names");

	let novelty = NoveltyStore::open(&strategy_log, &seed).context("Failed to rebuild novelty store")?;
	let source = CorpusSource::new(seed, confirmed, &strategy_log);
	let rng = match config.engine.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_rng(&mut rand::rng()),
	};

	let mut engine = Engine::new(strategy, source, novelty, rng)
		.with_name(name.as_str())
		.with_profiler(Profiler::new(&paths.timing_dir, &name))
		.with_settings(EngineSettings::from_config(config));

	let queue = open_queue(config, cli.dry_run)?;
	let mut dispatcher = Dispatcher::new(queue, config.queue.tube.as_str(), Backpressure::from_config(&config.queue));

	let stats = engine
		.run(&mut dispatcher)
		.with_context(|| format!("Generator {name} stopped"))?;
	info!(
		strategy = %name,
		accepted = stats.accepted,
		generated = stats.generated,
		"Generation finished"
	);
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logging(cli.verbose)?;
	let config = resolve_config(&cli)?;

	match &cli.command {
		Commands::Validate => {
			info!(config = ?cli.config, "Configuration is valid");
			println!("{config:#?}");
			Ok(())
		}
		Commands::CharGrams => {
			let models = &config.models;
			let strategy = CharGramStrategy::new(models.char_context, models.length_weight, models.smoothing)
				.map_err(|e| anyhow!(e))?;
			run_strategy(strategy, &config, &cli)
		}
		Commands::TokenGrams => run_strategy(TokenGramStrategy::new(config.models.token_fallback), &config, &cli),
		Commands::Pcfg => run_strategy(PcfgStrategy::new(config.models.smoothing), &config, &cli),
		Commands::TokenPcfg => {
			let strategy =
				TokenPcfgStrategy::from_files(config.reference.clone()).context("Failed to load reference sets")?;
			run_strategy(strategy, &config, &cli)
		}
		Commands::Mutate { words } => {
			let words = words.as_ref().unwrap_or(&config.reference.words);
			let strategy = MutationStrategy::from_word_list(words)
				.with_context(|| format!("Failed to load word list {}", words.display()))?;
			run_strategy(strategy, &config, &cli)
		}
		Commands::Random { length } => {
			let strategy = UniformStrategy::new(length.unwrap_or(config.models.random_length)).map_err(|e| anyhow!(e))?;
			run_strategy(strategy, &config, &cli)
		}
		Commands::ShortNames => run_strategy(ShortNameStrategy, &config, &cli),
		Commands::External { samples } => run_strategy(ExternalSampleStrategy::new(samples), &config, &cli),
	}
}
