use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};

/// Longest name a storage bucket may carry.
pub const MAX_LEN: usize = 63;

/// Characters a bucket name is built from.
pub const ALPHABET: [char; 39] = [
	'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
	't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '-', '.',
	'_',
];

/// Separators between the tokens of a name.
pub const DELIMITERS: [char; 3] = ['.', '-', '_'];

/// Returns `true` for characters that may appear in a candidate.
pub fn is_name_char(c: char) -> bool {
	c.is_ascii_lowercase() || c.is_ascii_digit() || DELIMITERS.contains(&c)
}

/// Returns `true` for token separators.
pub fn is_delimiter(c: char) -> bool {
	DELIMITERS.contains(&c)
}

/// A generated (or observed) bucket name.
///
/// # Invariants
/// - 1 to `MAX_LEN` characters
/// - only `[a-z0-9._-]`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Candidate(String);

impl Candidate {
	/// Normalizes (trim + lowercase) and validates a raw string.
	///
	/// # Errors
	/// Returns `GenError::InvalidCandidate` when the string is empty, too
	/// long, or carries a character outside the bucket alphabet.
	pub fn parse(raw: &str) -> Result<Self> {
		let name = raw.trim().to_lowercase();
		let len = name.chars().count();
		if len == 0 || len > MAX_LEN || !name.chars().all(is_name_char) {
			return Err(GenError::InvalidCandidate(raw.to_owned()));
		}
		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl AsRef<str> for Candidate {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Candidate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_normalizes_case_and_whitespace() {
		let candidate = Candidate::parse("  My-Bucket.01 \n").unwrap();
		assert_eq!(candidate.as_str(), "my-bucket.01");
	}

	#[test]
	fn parse_rejects_out_of_alphabet_and_bounds() {
		assert!(Candidate::parse("").is_err());
		assert!(Candidate::parse("   ").is_err());
		assert!(Candidate::parse("has space").is_err());
		assert!(Candidate::parse("slash/name").is_err());
		assert!(Candidate::parse(&"a".repeat(MAX_LEN)).is_ok());
		assert!(Candidate::parse(&"a".repeat(MAX_LEN + 1)).is_err());
	}

	#[test]
	fn alphabet_matches_predicate() {
		assert!(ALPHABET.iter().all(|c| is_name_char(*c)));
		assert_eq!(ALPHABET.iter().filter(|c| is_delimiter(**c)).count(), DELIMITERS.len());
	}
}
