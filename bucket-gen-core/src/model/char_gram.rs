use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::parallel::{Merge, count_in_parallel};
use super::{CandidateModel, Strategy};
use crate::candidate::ALPHABET;
use crate::corpus::Corpus;
use crate::error::{GenError, Result};

/// Trains character-level n-gram models.
///
/// For every position `i` of every training name, the character at `i`
/// is counted under the (up to) `context` characters preceding it. The
/// name length is counted separately, with a large weight, so that the
/// output length is drawn independently of the characters.
#[derive(Debug, Clone)]
pub struct CharGramStrategy {
	context: usize,
	length_weight: u64,
	smoothing: u64,
}

impl Default for CharGramStrategy {
	fn default() -> Self {
		Self {
			context: 4,
			length_weight: 1000,
			smoothing: 1,
		}
	}
}

impl CharGramStrategy {
	/// Creates a strategy with an explicit context size, length weight and
	/// Laplace pseudo-count.
	///
	/// # Errors
	/// Returns an error if `context` is 0 or `length_weight` is 0.
	pub fn new(context: usize, length_weight: u64, smoothing: u64) -> std::result::Result<Self, String> {
		if context == 0 {
			return Err("context must be >= 1".to_owned());
		}
		if length_weight == 0 {
			return Err("length weight must be >= 1".to_owned());
		}
		Ok(Self { context, length_weight, smoothing })
	}
}

/// Raw (unsmoothed) counts, built per chunk and merged.
#[derive(Default)]
struct CharGramCounts {
	transitions: HashMap<String, Distribution<char>>,
	lengths: Distribution<usize>,
}

impl Merge for CharGramCounts {
	fn merge(&mut self, other: Self) {
		for (key, distribution) in other.transitions {
			match self.transitions.get_mut(&key) {
				Some(existing) => existing.merge(&distribution),
				None => {
					self.transitions.insert(key, distribution);
				}
			}
		}
		self.lengths.merge(&other.lengths);
	}
}

/// Returns the last `n` characters of a string (all of it if shorter).
fn last_n_chars(s: &str, n: usize) -> &str {
	match s.char_indices().rev().nth(n.saturating_sub(1)) {
		Some((idx, _)) if n > 0 => &s[idx..],
		_ if n == 0 => "",
		_ => s,
	}
}

impl Strategy for CharGramStrategy {
	type Model = CharGramModel;

	fn kind(&self) -> &'static str {
		"char_grams"
	}

	fn train(&self, corpus: &Corpus) -> Result<CharGramModel> {
		let context = self.context;
		let length_weight = self.length_weight;

		let counts: CharGramCounts = count_in_parallel(corpus, |table: &mut CharGramCounts, name| {
			let chars: Vec<char> = name.chars().collect();
			for i in 0..chars.len() {
				let key: String = chars[i.saturating_sub(context)..i].iter().collect();
				table.transitions.entry(key).or_default().observe(chars[i]);
			}
			table.lengths.observe_weighted(chars.len(), length_weight);
		});

		if counts.lengths.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "character n-gram lengths" });
		}

		let base = Distribution::smoothed(ALPHABET, self.smoothing);
		let transitions = counts
			.transitions
			.into_iter()
			.map(|(key, observed)| {
				let mut smoothed = base.clone();
				smoothed.merge(&observed);
				(key, smoothed)
			})
			.collect();

		Ok(CharGramModel {
			context,
			transitions,
			base,
			lengths: counts.lengths,
		})
	}
}

/// A trained character n-gram model.
///
/// # Invariants
/// - Every context distribution contains the smoothing pseudo-counts over
///   the full alphabet
/// - `lengths` is never empty
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CharGramModel {
	/// Number of preceding characters used as context
	context: usize,

	/// Mapping from a context (up to `context` characters) to the next
	/// character distribution
	transitions: HashMap<String, Distribution<char>>,

	/// Distribution used for contexts never seen in training
	base: Distribution<char>,

	/// Weighted distribution of name lengths
	lengths: Distribution<usize>,
}

impl CharGramModel {
	/// Next-character distribution for a context, falling back to the
	/// smoothed alphabet when the context was never observed.
	pub fn next_distribution(&self, prefix: &str) -> &Distribution<char> {
		let key = last_n_chars(prefix, self.context);
		self.transitions.get(key).unwrap_or(&self.base)
	}

	pub fn lengths(&self) -> &Distribution<usize> {
		&self.lengths
	}
}

impl CandidateModel for CharGramModel {
	/// Samples a target length, then appends characters conditioned on the
	/// trailing context until that length is reached.
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		let length = *self.lengths.sample(rng)?;
		let mut name = String::with_capacity(length);
		for _ in 0..length {
			let next = *self.next_distribution(&name).sample(rng)?;
			name.push(next);
		}
		Some(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn last_n_chars_handles_short_strings() {
		assert_eq!(last_n_chars("abcdef", 4), "cdef");
		assert_eq!(last_n_chars("ab", 4), "ab");
		assert_eq!(last_n_chars("", 4), "");
		assert_eq!(last_n_chars("abc", 0), "");
	}

	#[test]
	fn empty_corpus_is_insufficient() {
		let err = CharGramStrategy::default().train(&Corpus::new()).unwrap_err();
		assert!(matches!(err, GenError::InsufficientCorpus { .. }));
	}

	#[test]
	fn unsmoothed_model_reproduces_a_single_name() {
		let corpus: Corpus = ["abc123"].into_iter().collect();
		let model = CharGramStrategy::new(4, 1000, 0).unwrap().train(&corpus).unwrap();
		let mut rng = StdRng::seed_from_u64(3);

		for _ in 0..500 {
			assert_eq!(model.sample(&mut rng).as_deref(), Some("abc123"));
		}
	}

	#[test]
	fn first_character_follows_start_distribution() {
		let corpus: Corpus = ["abc123"].into_iter().collect();
		let model = CharGramStrategy::default().train(&corpus).unwrap();
		let start = model.next_distribution("");
		let mut rng = StdRng::seed_from_u64(11);

		for _ in 0..2_000 {
			let name = model.sample(&mut rng).unwrap();
			assert_eq!(name.chars().count(), 6);
			let first = name.chars().next().unwrap();
			assert!(start.count(&first) > 0);
		}
		// Observed start symbol carries one pseudo-count plus its observation
		assert_eq!(start.count(&'a'), 2);
		assert_eq!(start.count(&'z'), 1);
	}

	#[test]
	fn transitions_converge_to_trained_proportions() {
		let names: Vec<String> = (0..10).flat_map(|i| [format!("ab{i}"), format!("ac{i}")]).collect();
		let corpus: Corpus = names.iter().map(String::as_str).collect();
		let model = CharGramStrategy::default().train(&corpus).unwrap();

		let after_a = model.next_distribution("a");
		let expected = after_a.count(&'b') as f64 / after_a.total() as f64;
		assert_eq!(after_a.count(&'b'), 11);

		let mut rng = StdRng::seed_from_u64(5);
		let (mut starts_with_a, mut then_b) = (0usize, 0usize);
		for _ in 0..20_000 {
			let name = model.sample(&mut rng).unwrap();
			let mut chars = name.chars();
			if chars.next() == Some('a') {
				starts_with_a += 1;
				if chars.next() == Some('b') {
					then_b += 1;
				}
			}
		}
		let observed = then_b as f64 / starts_with_a as f64;
		assert!((observed - expected).abs() < 0.03, "observed {observed}, expected {expected}");
	}

	#[test]
	fn length_is_weighted_per_sample() {
		let corpus: Corpus = ["ab", "abcd", "wxyz"].into_iter().collect();
		let model = CharGramStrategy::default().train(&corpus).unwrap();
		assert_eq!(model.lengths().count(&2), 1000);
		assert_eq!(model.lengths().count(&4), 2000);
	}
}
