use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::parallel::{Merge, count_in_parallel};
use super::{CandidateModel, Strategy};
use crate::candidate::{MAX_LEN, is_delimiter};
use crate::corpus::Corpus;
use crate::error::{GenError, Result};

/// What to do when the preceding token was never seen as a context.
///
/// A token observed only in final position has no outgoing transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
	/// Draw from the unconditioned token distribution.
	#[default]
	Unconditioned,
	/// Stop emitting tokens; the name ends at the previous token.
	Truncate,
}

/// Splits a name into its tokens and the delimiters between them.
///
/// `"my-bucket.1"` → `(["my", "bucket", "1"], ['-', '.'])`. Consecutive
/// delimiters produce empty tokens, so there is always exactly one more
/// token than delimiters.
pub fn split_tokens(name: &str) -> (Vec<&str>, Vec<char>) {
	let tokens = name.split(is_delimiter).collect();
	let delimiters = name.chars().filter(|c| is_delimiter(*c)).collect();
	(tokens, delimiters)
}

/// Trains token-level bigram models.
#[derive(Debug, Clone, Default)]
pub struct TokenGramStrategy {
	fallback: FallbackPolicy,
}

impl TokenGramStrategy {
	pub fn new(fallback: FallbackPolicy) -> Self {
		Self { fallback }
	}
}

#[derive(Default)]
struct TokenGramCounts {
	transitions: HashMap<Option<String>, Distribution<String>>,
	tokens: Distribution<String>,
	lengths: Distribution<usize>,
	delimiters: Distribution<char>,
}

impl Merge for TokenGramCounts {
	fn merge(&mut self, other: Self) {
		for (key, distribution) in other.transitions {
			match self.transitions.get_mut(&key) {
				Some(existing) => existing.merge(&distribution),
				None => {
					self.transitions.insert(key, distribution);
				}
			}
		}
		self.tokens.merge(&other.tokens);
		self.lengths.merge(&other.lengths);
		self.delimiters.merge(&other.delimiters);
	}
}

impl Strategy for TokenGramStrategy {
	type Model = TokenGramModel;

	fn kind(&self) -> &'static str {
		"ngrams"
	}

	fn train(&self, corpus: &Corpus) -> Result<TokenGramModel> {
		let counts: TokenGramCounts = count_in_parallel(corpus, |table: &mut TokenGramCounts, name| {
			let (tokens, delimiters) = split_tokens(name);
			let mut previous: Option<String> = None;
			for token in &tokens {
				table.transitions.entry(previous.clone()).or_default().observe((*token).to_owned());
				table.tokens.observe((*token).to_owned());
				previous = Some((*token).to_owned());
			}
			for delimiter in delimiters {
				table.delimiters.observe(delimiter);
			}
			table.lengths.observe(tokens.len());
		});

		if counts.lengths.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "token n-gram lengths" });
		}

		Ok(TokenGramModel {
			transitions: counts.transitions,
			tokens: counts.tokens,
			lengths: counts.lengths,
			delimiters: counts.delimiters,
			fallback: self.fallback,
		})
	}
}

/// A trained token bigram model.
///
/// # Invariants
/// - `lengths` counts tokens per name, not characters, and is never empty
/// - `delimiters` is non-empty whenever a length > 1 was observed
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TokenGramModel {
	/// Previous token (`None` at the start of a name) → next token
	transitions: HashMap<Option<String>, Distribution<String>>,

	/// Unconditioned token distribution
	tokens: Distribution<String>,

	/// Number of tokens per name
	lengths: Distribution<usize>,

	delimiters: Distribution<char>,

	fallback: FallbackPolicy,
}

impl TokenGramModel {
	pub fn fallback(&self) -> FallbackPolicy {
		self.fallback
	}
}

impl CandidateModel for TokenGramModel {
	/// Samples a token count, then alternates sampled delimiters and tokens
	/// conditioned on the previous token.
	///
	/// Outputs longer than `MAX_LEN` characters are discarded (`None`).
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		let count = *self.lengths.sample(rng)?;
		let mut name = String::new();
		let mut previous: Option<String> = None;

		for i in 0..count {
			let delimiter = if i > 0 { Some(*self.delimiters.sample(rng)?) } else { None };

			let token = match self.transitions.get(&previous) {
				Some(distribution) => distribution.sample(rng)?,
				None => match self.fallback {
					FallbackPolicy::Unconditioned => self.tokens.sample(rng)?,
					FallbackPolicy::Truncate => break,
				},
			};

			if let Some(delimiter) = delimiter {
				name.push(delimiter);
			}
			name.push_str(token);
			previous = Some(token.clone());
		}

		if name.chars().count() > MAX_LEN {
			return None;
		}
		Some(name)
	}
}
