use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::distribution::Distribution;
use super::token_gram::split_tokens;
use super::{CandidateModel, Strategy};
use crate::config::ReferenceConfig;
use crate::corpus::Corpus;
use crate::error::{GenError, Result};
use crate::io;

/// Category of a token.
///
/// Classification checks the categories in a fixed precedence order, see
/// `ReferenceSets::classify`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenType {
	/// Technical term (`cdn`, `api`, `prod`, ...)
	Tech,
	/// Public suffix / TLD
	Tld,
	/// Dictionary word
	Word,
	/// File extension
	File,
	/// All digits
	Number,
	/// Two dictionary words glued together
	Compound,
	/// Second-level label of a popular domain
	Domain,
	Other,
}

impl TokenType {
	pub fn tag(self) -> &'static str {
		match self {
			Self::Tech => "TECH",
			Self::Tld => "TLD",
			Self::Word => "WORD",
			Self::File => "FILE",
			Self::Number => "NUMBER",
			Self::Compound => "COMPOUND",
			Self::Domain => "DOMAIN",
			Self::Other => "OTHER",
		}
	}
}

impl fmt::Display for TokenType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// Reference word lists used to type tokens.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
	pub tech_terms: HashSet<String>,
	pub suffixes: HashSet<String>,
	pub file_extensions: HashSet<String>,
	pub domains: HashSet<String>,
	pub words: HashSet<String>,
}

/// Drops blank lines and `//` / `#` comments, lowercases the rest.
fn plain_entry(line: &str) -> Option<String> {
	let line = line.trim();
	if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
		return None;
	}
	Some(line.to_lowercase())
}

/// Keeps the second-level label of a domain (`www.example.com` → `example`).
fn domain_label(line: &str) -> Option<String> {
	let line = plain_entry(line)?;
	let labels: Vec<&str> = line.split('.').collect();
	if labels.len() < 2 {
		return None;
	}
	let label = labels[labels.len() - 2];
	(!label.is_empty()).then(|| label.to_owned())
}

fn extension_entry(line: &str) -> Option<String> {
	let entry = plain_entry(line)?;
	let entry = entry.trim_start_matches('.');
	(!entry.is_empty()).then(|| entry.to_owned())
}

fn read_set(path: &Path, parse: fn(&str) -> Option<String>) -> Result<HashSet<String>> {
	let lines = io::read_lines(path).map_err(|e| GenError::ReferenceSet {
		path: path.to_owned(),
		source: e,
	})?;
	Ok(lines.iter().filter_map(|line| parse(line)).collect())
}

/// Returns `token` without its last character, if it has more than one.
fn without_last_char(token: &str) -> Option<&str> {
	let (idx, _) = token.char_indices().last()?;
	(idx > 0).then(|| &token[..idx])
}

impl ReferenceSets {
	/// Loads every reference list.
	///
	/// # Errors
	/// `GenError::ReferenceSet` naming the first list that cannot be read.
	pub fn load(config: &ReferenceConfig) -> Result<Self> {
		let sets = Self {
			tech_terms: read_set(&config.tech_terms, plain_entry)?,
			suffixes: read_set(&config.suffixes, plain_entry)?,
			file_extensions: read_set(&config.file_extensions, extension_entry)?,
			domains: read_set(&config.domains, domain_label)?,
			words: read_set(&config.words, plain_entry)?,
		};
		debug!(
			tech_terms = sets.tech_terms.len(),
			suffixes = sets.suffixes.len(),
			file_extensions = sets.file_extensions.len(),
			domains = sets.domains.len(),
			words = sets.words.len(),
			"Loaded reference sets"
		);
		Ok(sets)
	}

	/// Membership test that also accepts the token minus its last
	/// character (plurals and similar derived forms).
	fn contains_loosely(set: &HashSet<String>, token: &str) -> bool {
		set.contains(token) || without_last_char(token).is_some_and(|stem| set.contains(stem))
	}

	fn is_compound(&self, token: &str) -> bool {
		token
			.char_indices()
			.skip(1)
			.any(|(i, _)| self.words.contains(&token[..i]) && self.words.contains(&token[i..]))
	}

	/// Classifies a token.
	///
	/// Precedence: tech term → suffix → file extension → domain →
	/// dictionary word → number → compound → other. File extensions,
	/// domains and dictionary words also match with the last character
	/// stripped.
	///
	/// Returns `None` for the empty token.
	pub fn classify(&self, token: &str) -> Option<TokenType> {
		if token.is_empty() {
			return None;
		}
		let token_type = if self.tech_terms.contains(token) {
			TokenType::Tech
		} else if self.suffixes.contains(token) {
			TokenType::Tld
		} else if Self::contains_loosely(&self.file_extensions, token) {
			TokenType::File
		} else if Self::contains_loosely(&self.domains, token) {
			TokenType::Domain
		} else if Self::contains_loosely(&self.words, token) {
			TokenType::Word
		} else if token.chars().all(|c| c.is_ascii_digit()) {
			TokenType::Number
		} else if self.is_compound(token) {
			TokenType::Compound
		} else {
			TokenType::Other
		};
		Some(token_type)
	}
}

/// One element of a typed-token template.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Part {
	Typed(TokenType),
	Delimiter(char),
}

/// A template such as `WORD-NUMBER`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenTemplate(Vec<Part>);

impl TokenTemplate {
	pub fn parts(&self) -> &[Part] {
		&self.0
	}
}

impl fmt::Display for TokenTemplate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for part in &self.0 {
			match part {
				Part::Typed(token_type) => write!(f, "{token_type}")?,
				Part::Delimiter(c) => write!(f, "{c}")?,
			}
		}
		Ok(())
	}
}

/// Where the reference sets come from.
#[derive(Debug, Clone)]
enum ReferenceSource {
	/// Reloaded from disk on every training pass
	Files(ReferenceConfig),
	/// Fixed, already-loaded sets
	Loaded(Arc<ReferenceSets>),
}

/// Trains the typed-token PCFG.
#[derive(Debug, Clone)]
pub struct TokenPcfgStrategy {
	source: ReferenceSource,
}

impl TokenPcfgStrategy {
	/// Strategy backed by reference files.
	///
	/// The files are loaded once here so that a missing list is reported at
	/// startup; they are then reloaded on every training pass.
	///
	/// # Errors
	/// `GenError::ReferenceSet` if any list cannot be read.
	pub fn from_files(config: ReferenceConfig) -> Result<Self> {
		ReferenceSets::load(&config)?;
		Ok(Self {
			source: ReferenceSource::Files(config),
		})
	}

	/// Strategy backed by fixed, in-memory sets.
	pub fn with_references(sets: ReferenceSets) -> Self {
		Self {
			source: ReferenceSource::Loaded(Arc::new(sets)),
		}
	}

	fn references(&self) -> Result<Arc<ReferenceSets>> {
		match &self.source {
			ReferenceSource::Files(config) => Ok(Arc::new(ReferenceSets::load(config)?)),
			ReferenceSource::Loaded(sets) => Ok(Arc::clone(sets)),
		}
	}
}

impl Strategy for TokenPcfgStrategy {
	type Model = TokenPcfgModel;

	fn kind(&self) -> &'static str {
		"token_pcfg"
	}

	fn train(&self, corpus: &Corpus) -> Result<TokenPcfgModel> {
		let references = self.references()?;
		let mut model = TokenPcfgModel {
			templates: Distribution::new(),
			tokens: BTreeMap::new(),
		};

		for name in corpus.iter() {
			let (tokens, delimiters) = split_tokens(name);
			let mut parts = Vec::with_capacity(tokens.len() + delimiters.len());
			for (i, token) in tokens.iter().enumerate() {
				if let Some(token_type) = references.classify(token) {
					parts.push(Part::Typed(token_type));
					model.tokens.entry(token_type).or_default().observe((*token).to_owned());
				}
				if let Some(delimiter) = delimiters.get(i) {
					parts.push(Part::Delimiter(*delimiter));
				}
			}
			model.templates.observe(TokenTemplate(parts));
		}

		if model.templates.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "token PCFG templates" });
		}
		Ok(model)
	}
}

/// A trained typed-token PCFG.
///
/// # Invariants
/// - `templates` is never empty
/// - Every type tag used by a stored template has a token distribution
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TokenPcfgModel {
	templates: Distribution<TokenTemplate>,
	tokens: BTreeMap<TokenType, Distribution<String>>,
}

impl TokenPcfgModel {
	pub fn templates(&self) -> &Distribution<TokenTemplate> {
		&self.templates
	}

	pub fn tokens(&self, token_type: TokenType) -> Option<&Distribution<String>> {
		self.tokens.get(&token_type)
	}
}

impl CandidateModel for TokenPcfgModel {
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		let template = self.templates.sample(rng)?;
		let mut name = String::new();
		for part in template.parts() {
			match part {
				Part::Typed(token_type) => name.push_str(self.tokens.get(token_type)?.sample(rng)?),
				Part::Delimiter(c) => name.push(*c),
			}
		}
		Some(name)
	}
}
