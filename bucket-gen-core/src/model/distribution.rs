use std::collections::BTreeMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

/// A counted distribution over keys (next characters, tokens, lengths,
/// templates, ...).
///
/// Conceptually this is one node of a Markov chain: every key is an
/// outgoing edge weighted by how many times it was observed, plus any
/// additive (Laplace) pseudo-count it was created with.
///
/// ## Responsibilities:
/// - Accumulate observations during training
/// - Draw a key with probability proportional to its count
/// - Merge with a partial distribution built on another thread
///
/// ## Invariants
/// - Every stored count is strictly positive
/// - `total` is the sum of all counts
/// - A distribution created with `smoothed(alphabet, k)` keeps every
///   alphabet symbol at a count >= `k`, so `total >= k * alphabet.len()`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Distribution<K: Ord> {
	/// Observation count per key.
	/// Example: { 'e' => 42, 'a' => 3 }
	counts: BTreeMap<K, u64>,
	total: u64,
}

impl<K: Ord> Default for Distribution<K> {
	fn default() -> Self {
		Self {
			counts: BTreeMap::new(),
			total: 0,
		}
	}
}

impl<K: Ord + Clone> Distribution<K> {
	/// Creates an empty distribution (no smoothing).
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a distribution where each of `symbols` starts at `pseudo_count`.
	///
	/// A `pseudo_count` of 0 yields an empty distribution.
	pub fn smoothed<I: IntoIterator<Item = K>>(symbols: I, pseudo_count: u64) -> Self {
		let mut distribution = Self::new();
		if pseudo_count > 0 {
			for symbol in symbols {
				distribution.observe_weighted(symbol, pseudo_count);
			}
		}
		distribution
	}

	/// Records one occurrence of `key`.
	pub fn observe(&mut self, key: K) {
		self.observe_weighted(key, 1);
	}

	/// Records `weight` occurrences of `key`. A zero weight is ignored.
	pub fn observe_weighted(&mut self, key: K, weight: u64) {
		if weight == 0 {
			return;
		}
		*self.counts.entry(key).or_insert(0) += weight;
		self.total += weight;
	}

	/// Count currently held by `key` (0 if unseen).
	pub fn count(&self, key: &K) -> u64 {
		self.counts.get(key).copied().unwrap_or(0)
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	/// Number of distinct keys.
	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.total == 0
	}

	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.counts.keys()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
		self.counts.iter().map(|(k, v)| (k, *v))
	}

	/// Draws a key with probability proportional to its count.
	///
	/// This method performs:
	/// - an O(n) scan over the keys
	/// - a cumulative subtraction to select a bucket
	///
	/// Returns `None` only if the distribution is empty; a key with zero
	/// mass is never stored and therefore never returned.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
		if self.total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..self.total);
		for (key, count) in &self.counts {
			if r < *count {
				return Some(key);
			}
			r -= count;
		}

		// Unreachable while `total` matches the stored counts
		self.counts.keys().next_back()
	}

	/// Merges another distribution into this one, summing counts.
	///
	/// Intended for parallel training where partial tables are built on
	/// separate threads and combined before the model is published.
	pub fn merge(&mut self, other: &Self) {
		for (key, count) in &other.counts {
			self.observe_weighted(key.clone(), *count);
		}
	}
}

impl<K: Ord + Clone> FromIterator<K> for Distribution<K> {
	fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
		let mut distribution = Self::new();
		for key in iter {
			distribution.observe(key);
		}
		distribution
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::candidate::ALPHABET;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use std::collections::HashMap;

	#[test]
	fn smoothing_covers_the_whole_alphabet() {
		let distribution = Distribution::smoothed(ALPHABET, 1);
		assert_eq!(distribution.len(), ALPHABET.len());
		assert_eq!(distribution.total(), ALPHABET.len() as u64);
		assert!(ALPHABET.iter().all(|c| distribution.count(c) >= 1));
	}

	#[test]
	fn zero_pseudo_count_is_empty() {
		let distribution = Distribution::smoothed(ALPHABET, 0);
		assert!(distribution.is_empty());
		assert_eq!(distribution.sample(&mut StdRng::seed_from_u64(1)), None);
	}

	#[test]
	fn never_samples_a_key_without_mass() {
		let mut distribution = Distribution::smoothed(['a', 'b', 'c'], 1);
		distribution.observe('a');
		distribution.observe_weighted('b', 0);
		let mut rng = StdRng::seed_from_u64(7);

		for _ in 0..10_000 {
			let key = distribution.sample(&mut rng).unwrap();
			assert!(distribution.count(key) > 0);
			assert!(['a', 'b', 'c'].contains(key));
		}
	}

	#[test]
	fn frequencies_follow_counts() {
		let mut distribution = Distribution::new();
		distribution.observe_weighted("x", 3);
		distribution.observe_weighted("y", 1);
		let mut rng = StdRng::seed_from_u64(42);

		let mut seen: HashMap<&str, usize> = HashMap::new();
		for _ in 0..20_000 {
			*seen.entry(*distribution.sample(&mut rng).unwrap()).or_default() += 1;
		}
		let ratio = seen["x"] as f64 / 20_000.0;
		assert!((ratio - 0.75).abs() < 0.02, "ratio was {ratio}");
	}

	#[test]
	fn merge_sums_counts() {
		let mut left: Distribution<char> = "aab".chars().collect();
		let right: Distribution<char> = "bc".chars().collect();
		left.merge(&right);

		assert_eq!(left.count(&'a'), 2);
		assert_eq!(left.count(&'b'), 2);
		assert_eq!(left.count(&'c'), 1);
		assert_eq!(left.total(), 5);
	}
}
