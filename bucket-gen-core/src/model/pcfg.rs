use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::{CandidateModel, Strategy};
use crate::corpus::Corpus;
use crate::error::{GenError, Result};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// One slot of a structural template.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
	/// A run of `k` letters (`C<k>`)
	Alpha(usize),
	/// A run of `k` digits (`N<k>`)
	Numeric(usize),
	/// Any other character, copied verbatim
	Literal(char),
}

/// A coarse template such as `C2-C6N1`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Template(Vec<Slot>);

impl Template {
	pub fn slots(&self) -> &[Slot] {
		&self.0
	}
}

impl fmt::Display for Template {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for slot in &self.0 {
			match slot {
				Slot::Alpha(k) => write!(f, "C{k}")?,
				Slot::Numeric(k) => write!(f, "N{k}")?,
				Slot::Literal(c) => write!(f, "{c}")?,
			}
		}
		Ok(())
	}
}

/// Splits a name into its template and the content of each span.
///
/// `"my-app2"` → `C2-C3N1` with spans `[(C2, "my"), (C3, "app"), (N1, "2")]`.
pub fn parse_template(name: &str) -> (Template, Vec<(Slot, &str)>) {
	let mut slots = Vec::new();
	let mut spans = Vec::new();
	let mut rest = name;

	while let Some(first) = rest.chars().next() {
		let alpha = first.is_ascii_lowercase();
		if !alpha && !first.is_ascii_digit() {
			slots.push(Slot::Literal(first));
			rest = &rest[first.len_utf8()..];
			continue;
		}

		let end = rest
			.find(|c: char| if alpha { !c.is_ascii_lowercase() } else { !c.is_ascii_digit() })
			.unwrap_or(rest.len());
		let slot = if alpha { Slot::Alpha(end) } else { Slot::Numeric(end) };
		slots.push(slot);
		spans.push((slot, &rest[..end]));
		rest = &rest[end..];
	}

	(Template(slots), spans)
}

/// Content distribution for one span type and length.
///
/// Observed spans are drawn in proportion to their counts. On top of that,
/// each symbol of the span's alphabet carries `smoothing` pseudo-mass that
/// is spent on a fresh span drawn uniformly, character by character.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct SpanContent {
	observed: Distribution<String>,
}

impl SpanContent {
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R, len: usize, symbols: &[u8], smoothing: u64) -> Option<String> {
		let fresh = smoothing.saturating_mul(symbols.len() as u64);
		let total = self.observed.total() + fresh;
		if total == 0 {
			return None;
		}
		if rng.random_range(0..total) < self.observed.total() {
			return self.observed.sample(rng).cloned();
		}
		Some(
			(0..len)
				.map(|_| symbols[rng.random_range(0..symbols.len())] as char)
				.collect(),
		)
	}
}

/// Trains the character/length PCFG.
#[derive(Debug, Clone)]
pub struct PcfgStrategy {
	smoothing: u64,
}

impl Default for PcfgStrategy {
	fn default() -> Self {
		Self { smoothing: 1 }
	}
}

impl PcfgStrategy {
	pub fn new(smoothing: u64) -> Self {
		Self { smoothing }
	}
}

impl Strategy for PcfgStrategy {
	type Model = PcfgModel;

	fn kind(&self) -> &'static str {
		"pcfg"
	}

	fn train(&self, corpus: &Corpus) -> Result<PcfgModel> {
		let mut model = PcfgModel {
			templates: Distribution::new(),
			alpha: BTreeMap::new(),
			numeric: BTreeMap::new(),
			smoothing: self.smoothing,
		};

		for name in corpus.iter() {
			let (template, spans) = parse_template(name);
			for (slot, content) in spans {
				let table = match slot {
					Slot::Alpha(k) => model.alpha.entry(k),
					Slot::Numeric(k) => model.numeric.entry(k),
					Slot::Literal(_) => continue,
				};
				table.or_default().observed.observe(content.to_owned());
			}
			model.templates.observe(template);
		}

		if model.templates.is_empty() {
			return Err(GenError::InsufficientCorpus { level: "PCFG templates" });
		}
		Ok(model)
	}
}

/// A trained character/length PCFG.
///
/// # Invariants
/// - `templates` is never empty
/// - Every `C<k>`/`N<k>` slot of a stored template has a matching content
///   distribution
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PcfgModel {
	templates: Distribution<Template>,
	alpha: BTreeMap<usize, SpanContent>,
	numeric: BTreeMap<usize, SpanContent>,
	smoothing: u64,
}

impl PcfgModel {
	pub fn templates(&self) -> &Distribution<Template> {
		&self.templates
	}

	fn fill<R: Rng + ?Sized>(&self, slot: Slot, rng: &mut R) -> Option<String> {
		let (table, len, symbols) = match slot {
			Slot::Alpha(k) => (&self.alpha, k, LETTERS),
			Slot::Numeric(k) => (&self.numeric, k, DIGITS),
			Slot::Literal(c) => return Some(c.to_string()),
		};
		match table.get(&len) {
			Some(content) => content.sample(rng, len, symbols, self.smoothing),
			None => SpanContent::default().sample(rng, len, symbols, self.smoothing),
		}
	}
}

impl CandidateModel for PcfgModel {
	/// Samples a template, then fills each span from the content
	/// distribution of its type and length; literals are copied verbatim.
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		let template = self.templates.sample(rng)?;
		let mut name = String::new();
		for slot in template.slots() {
			name.push_str(&self.fill(*slot, rng)?);
		}
		Some(name)
	}
}
