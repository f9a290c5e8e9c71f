use std::fs;
use std::time::Duration;

use bucket_gen_core::model::{PcfgStrategy, TokenGramStrategy};
use bucket_gen_core::{
	Backpressure, Corpus, CorpusSource, Dispatcher, Engine, EngineSettings, MemoryQueue, NoveltyStore, TrialBudget,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

fn settings(batch_size: usize, trials: u64) -> EngineSettings {
	EngineSettings {
		batch_size,
		budget: TrialBudget::Limited(trials),
		max_skipped_batches: 3,
		skip_backoff: Duration::ZERO,
		snapshot_dir: None,
	}
}

fn no_pause(_: Duration) {}

#[test]
fn token_grams_feed_the_queue() {
	let dir = TempDir::new().unwrap();
	let log = dir.path().join("generation/ngrams.txt");
	let known = ["my-bucket-1", "my-bucket-2", "my-data-3", "our-data-logs", "dev-bucket-logs", "prod-data-1"];
	let seed: Corpus = known.into_iter().collect();

	let novelty = NoveltyStore::open(&log, &seed).unwrap();
	let source = CorpusSource::new(seed, dir.path().join("confirmed.txt"), &log);
	let mut engine = Engine::new(TokenGramStrategy::default(), source, novelty, StdRng::seed_from_u64(42))
		.with_name("ngrams")
		.with_settings(settings(1_000, 5))
		.with_pause(no_pause);
	let mut dispatcher = Dispatcher::new(MemoryQueue::new(), "default", Backpressure::default()).with_pause(no_pause);

	let stats = engine.run(&mut dispatcher).unwrap();
	assert_eq!(stats.accepted, 5);

	let jobs = dispatcher.queue().jobs();
	assert_eq!(jobs.len(), 5);
	let names: Vec<&str> = jobs
		.iter()
		.map(|job| job.payload.strip_prefix("generation/ngrams,").unwrap())
		.collect();
	for name in &names {
		assert!(name.len() < 64);
		assert!(!known.contains(name));
	}
	// Token fallback may emit a lone token, but the corpus is all joined names
	assert!(names.iter().any(|name| name.contains('-')));

	let logged = fs::read_to_string(&log).unwrap();
	assert_eq!(logged.lines().count(), 5);
}

#[test]
fn restart_never_resubmits_logged_candidates() {
	let dir = TempDir::new().unwrap();
	let log = dir.path().join("pcfg.txt");
	let confirmed = dir.path().join("confirmed.txt");
	let seed: Corpus = ["abc-12", "xyz-34", "data-2020", "logs-2021"].into_iter().collect();

	let run = |rng_seed: u64| {
		let novelty = NoveltyStore::open(&log, &seed).unwrap();
		let source = CorpusSource::new(seed.clone(), &confirmed, &log);
		let mut engine = Engine::new(PcfgStrategy::default(), source, novelty, StdRng::seed_from_u64(rng_seed))
			.with_settings(settings(500, 20))
			.with_pause(no_pause);
		let mut dispatcher =
			Dispatcher::new(MemoryQueue::new(), "default", Backpressure::default()).with_pause(no_pause);
		engine.run(&mut dispatcher).unwrap();
		dispatcher.into_queue().jobs().iter().map(|job| job.payload.clone()).collect::<Vec<_>>()
	};

	let first = run(1);
	// Same RNG stream: every draw of the first run is now a duplicate
	let second = run(1);
	assert_eq!(first.len(), 20);
	assert!(second.iter().all(|payload| !first.contains(payload)));
	assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), first.len() + second.len());
}

#[test]
fn confirmed_candidates_join_the_next_corpus() {
	let dir = TempDir::new().unwrap();
	let log = dir.path().join("ngrams.txt");
	let confirmed = dir.path().join("confirmed.txt");
	fs::write(&log, "found-it\nmissed\n").unwrap();
	fs::write(&confirmed, "https://found-it.s3.amazonaws.com/\nother-bucket\n").unwrap();

	let seed: Corpus = ["seed-name"].into_iter().collect();
	let corpus = CorpusSource::new(seed, &confirmed, &log).assemble().unwrap();
	assert!(corpus.contains("found-it"));
	assert!(!corpus.contains("missed"));
	assert!(!corpus.contains("other-bucket"));
}
