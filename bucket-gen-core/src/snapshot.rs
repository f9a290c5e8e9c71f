//! Persisted copies of trained models, for offline inspection.
//!
//! A snapshot is the postcard encoding of the model, written to
//! `<dir>/<strategy>.bin`. The file is written to a temporary sibling and
//! renamed into place, so a reader never sees a half-written model.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{GenError, Result};
use crate::io;

/// Serializes `model` to `<dir>/<name>.bin` and returns the path written.
pub fn save<T: Serialize>(dir: &Path, name: &str, model: &T) -> Result<PathBuf> {
	let path = io::build_output_path(dir, name, "bin").map_err(|e| GenError::io("building snapshot path", e))?;
	fs::create_dir_all(dir).map_err(|e| GenError::io(format!("creating {}", dir.display()), e))?;

	let bytes = postcard::to_stdvec(model)?;
	let mut tmp = NamedTempFile::new_in(dir).map_err(|e| GenError::io("creating snapshot temp file", e))?;
	tmp.write_all(&bytes)
		.map_err(|e| GenError::io("writing snapshot", e))?;
	tmp.as_file()
		.sync_all()
		.map_err(|e| GenError::io("syncing snapshot", e))?;
	tmp.persist(&path)
		.map_err(|e| GenError::io(format!("persisting {}", path.display()), e.error))?;
	Ok(path)
}

/// Reads back a model written by `save`.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let bytes = fs::read(path).map_err(|e| GenError::io(format!("reading {}", path.display()), e))?;
	Ok(postcard::from_bytes(&bytes)?)
}
