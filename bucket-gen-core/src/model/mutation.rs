use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{CandidateModel, Strategy};
use crate::candidate::MAX_LEN;
use crate::corpus::Corpus;
use crate::error::{GenError, Result};
use crate::io;

/// One step of the mutation random walk.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
	/// Remove one random character (only if more than one remains)
	Delete,
	/// Double one random character
	Duplicate,
	/// Glue another random word before or after
	Concatenate,
	/// End the walk
	Stop,
}

impl Mutation {
	pub const ALL: [Mutation; 4] = [Self::Delete, Self::Duplicate, Self::Concatenate, Self::Stop];

	fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
		Self::ALL[rng.random_range(0..Self::ALL.len())]
	}
}

/// Keeps ASCII alphanumeric words that fit in a bucket name, lowercased.
fn dictionary_entry(line: &str) -> Option<String> {
	let word = line.trim();
	let usable = !word.is_empty() && word.len() <= MAX_LEN && word.chars().all(|c| c.is_ascii_alphanumeric());
	usable.then(|| word.to_ascii_lowercase())
}

/// Generates names by mutating random dictionary words.
///
/// There is no training phase: `train` ignores the corpus and hands out
/// the same shared dictionary every time.
#[derive(Debug, Clone)]
pub struct MutationStrategy {
	dictionary: Arc<Vec<String>>,
}

impl MutationStrategy {
	/// Builds the strategy from an in-memory word list.
	///
	/// # Errors
	/// `GenError::InsufficientCorpus` if no word is usable.
	pub fn new<I, S>(words: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut dictionary: Vec<String> = words.into_iter().filter_map(|w| dictionary_entry(w.as_ref())).collect();
		dictionary.sort();
		dictionary.dedup();
		if dictionary.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "mutation dictionary" });
		}
		Ok(Self {
			dictionary: Arc::new(dictionary),
		})
	}

	/// Loads the word list from a line-oriented file.
	pub fn from_word_list<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let lines = io::read_lines(path).map_err(|e| GenError::ReferenceSet {
			path: path.to_owned(),
			source: e,
		})?;
		Self::new(lines)
	}
}

impl Strategy for MutationStrategy {
	type Model = MutationModel;

	fn kind(&self) -> &'static str {
		"continella_dictionary"
	}

	fn train(&self, _corpus: &Corpus) -> Result<MutationModel> {
		Ok(MutationModel {
			dictionary: Arc::clone(&self.dictionary),
		})
	}
}

/// Dictionary shared by every draw.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MutationModel {
	dictionary: Arc<Vec<String>>,
}

/// Applies one mutation to `word` in place.
///
/// Every step keeps the word between 1 and `MAX_LEN` characters: a delete
/// on a single character and a duplicate or concatenation that would
/// overflow are no-ops. Positions are picked per character, so words
/// outside ASCII are handled too.
pub fn mutate<R: Rng + ?Sized>(word: &mut String, mutation: Mutation, dictionary: &[String], rng: &mut R) {
	let len = word.chars().count();
	match mutation {
		Mutation::Delete if len > 1 => {
			let nth = rng.random_range(0..len);
			if let Some((idx, _)) = word.char_indices().nth(nth) {
				word.remove(idx);
			}
		}
		Mutation::Duplicate if len > 0 && len < MAX_LEN => {
			let nth = rng.random_range(0..len);
			if let Some((idx, c)) = word.char_indices().nth(nth) {
				word.insert(idx, c);
			}
		}
		Mutation::Concatenate => {
			if let Some(other) = dictionary.choose(rng) {
				if len + other.chars().count() <= MAX_LEN {
					if rng.random_bool(0.5) {
						word.push_str(other);
					} else {
						word.insert_str(0, other);
					}
				}
			}
		}
		_ => {}
	}
}

impl CandidateModel for MutationModel {
	/// Picks a random word, then applies random mutations until `Stop` is
	/// drawn.
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		let mut word = self.dictionary.choose(rng)?.clone();
		let mut mutation = Mutation::random(rng);
		while mutation != Mutation::Stop {
			mutate(&mut word, mutation, &self.dictionary, rng);
			mutation = Mutation::random(rng);
		}
		Some(word)
	}
}
