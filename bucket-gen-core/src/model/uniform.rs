use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{CandidateModel, Strategy};
use crate::candidate::{ALPHABET, MAX_LEN};
use crate::corpus::Corpus;
use crate::error::Result;

/// Baseline: every character drawn independently and uniformly.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformStrategy {
	length: usize,
}

impl UniformStrategy {
	/// # Errors
	/// Returns an error if `length` is 0 or longer than `MAX_LEN`.
	pub fn new(length: usize) -> std::result::Result<Self, String> {
		if length == 0 || length > MAX_LEN {
			return Err(format!("length must be between 1 and {MAX_LEN}"));
		}
		Ok(Self { length })
	}
}

impl Strategy for UniformStrategy {
	type Model = UniformModel;

	fn kind(&self) -> &'static str {
		"random"
	}

	fn train(&self, _corpus: &Corpus) -> Result<UniformModel> {
		Ok(UniformModel { length: self.length })
	}
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformModel {
	length: usize,
}

impl CandidateModel for UniformModel {
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		Some((0..self.length).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())]).collect())
	}
}

const LETTER_COUNT: u64 = 26;
const THREE_LETTER_NAMES: u64 = LETTER_COUNT * LETTER_COUNT * LETTER_COUNT;
const FOUR_LETTER_NAMES: u64 = THREE_LETTER_NAMES * LETTER_COUNT;

/// Baseline: uniform draws over every 3- and 4-letter lowercase name.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShortNameStrategy;

impl Strategy for ShortNameStrategy {
	type Model = ShortNameModel;

	fn kind(&self) -> &'static str {
		"continella_threefour"
	}

	fn train(&self, _corpus: &Corpus) -> Result<ShortNameModel> {
		Ok(ShortNameModel)
	}
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShortNameModel;

impl ShortNameModel {
	/// Name at position `index` of the enumeration (3-letter names first).
	pub fn name_at(index: u64) -> Option<String> {
		let (mut rest, len) = if index < THREE_LETTER_NAMES {
			(index, 3)
		} else if index < THREE_LETTER_NAMES + FOUR_LETTER_NAMES {
			(index - THREE_LETTER_NAMES, 4)
		} else {
			return None;
		};

		let mut letters = vec![b'a'; len];
		for slot in letters.iter_mut().rev() {
			*slot = b'a' + (rest % LETTER_COUNT) as u8;
			rest /= LETTER_COUNT;
		}
		String::from_utf8(letters).ok()
	}
}

impl CandidateModel for ShortNameModel {
	fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
		Self::name_at(rng.random_range(0..THREE_LETTER_NAMES + FOUR_LETTER_NAMES))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::candidate::is_name_char;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn uniform_respects_length_and_alphabet() {
		let model = UniformStrategy::new(5).unwrap().train(&Corpus::new()).unwrap();
		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..1_000 {
			let name = model.sample(&mut rng).unwrap();
			assert_eq!(name.chars().count(), 5);
			assert!(name.chars().all(is_name_char));
		}
	}

	#[test]
	fn uniform_rejects_bad_lengths() {
		assert!(UniformStrategy::new(0).is_err());
		assert!(UniformStrategy::new(MAX_LEN + 1).is_err());
	}

	#[test]
	fn short_name_enumeration_bounds() {
		assert_eq!(ShortNameModel::name_at(0).as_deref(), Some("aaa"));
		assert_eq!(ShortNameModel::name_at(THREE_LETTER_NAMES - 1).as_deref(), Some("zzz"));
		assert_eq!(ShortNameModel::name_at(THREE_LETTER_NAMES).as_deref(), Some("aaaa"));
		assert_eq!(ShortNameModel::name_at(THREE_LETTER_NAMES + FOUR_LETTER_NAMES - 1).as_deref(), Some("zzzz"));
		assert_eq!(ShortNameModel::name_at(THREE_LETTER_NAMES + FOUR_LETTER_NAMES), None);
	}

	#[test]
	fn short_names_are_three_or_four_letters() {
		let mut rng = StdRng::seed_from_u64(2);
		for _ in 0..1_000 {
			let name = ShortNameModel.sample(&mut rng).unwrap();
			assert!(name.len() == 3 || name.len() == 4);
			assert!(name.chars().all(|c| c.is_ascii_lowercase()));
		}
	}
}
