use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Splits on `\n` / `\r\n`
/// - Lines that are not valid UTF-8 are skipped rather than failing the read
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let reader = BufReader::new(File::open(filename)?);
	let mut lines = Vec::new();
	for line in reader.split(b'\n') {
		let bytes = line?;
		if let Ok(text) = String::from_utf8(bytes) {
			lines.push(text.trim_end_matches('\r').to_owned());
		}
	}
	Ok(lines)
}

/// Same as `read_lines`, but a missing file reads as empty.
///
/// Logs and corpora that have not been written yet are simply empty.
pub(crate) fn read_lines_if_exists<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	match read_lines(filename) {
		Ok(lines) => Ok(lines),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
		Err(e) => Err(e),
	}
}

/// Opens `path` for appending, creating it and its parent directories.
pub(crate) fn open_append<P: AsRef<Path>>(path: P) -> io::Result<BufWriter<File>> {
	let path = path.as_ref();
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}
	let file = OpenOptions::new().create(true).append(true).open(path)?;
	Ok(BufWriter::new(file))
}

/// Appends one line and flushes it to the OS.
pub(crate) fn append_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
	writeln!(writer, "{line}")?;
	writer.flush()
}

/// Builds an output path from a directory, a base name and an extension.
///
/// Example:
/// `data/snapshots` + `"pcfg"` + `"bin"` → `data/snapshots/pcfg.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(dir: P, name: &str, extension: &str) -> io::Result<PathBuf> {
	if name.is_empty() || name.contains(['/', '\\']) {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "Output name must be a plain file name"));
	}
	let mut output = PathBuf::from(dir.as_ref());
	output.push(name);
	output.set_extension(extension);
	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn missing_file_reads_as_empty() {
		let dir = TempDir::new().unwrap();
		assert!(read_lines_if_exists(dir.path().join("nope.txt")).unwrap().is_empty());
		assert!(read_lines(dir.path().join("nope.txt")).is_err());
	}

	#[test]
	fn invalid_utf8_lines_are_skipped() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("log.txt");
		fs::write(&path, b"alpha\r\n\xff\xfe\nbeta\n").unwrap();
		assert_eq!(read_lines(&path).unwrap(), vec!["alpha", "beta"]);
	}

	#[test]
	fn append_creates_parents() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("nested/dir/log.txt");
		let mut writer = open_append(&path).unwrap();
		append_line(&mut writer, "one").unwrap();
		append_line(&mut writer, "two").unwrap();
		assert_eq!(read_lines(&path).unwrap(), vec!["one", "two"]);
	}

	#[test]
	fn output_path_rejects_nested_names() {
		assert_eq!(build_output_path("snap", "pcfg", "bin").unwrap(), PathBuf::from("snap/pcfg.bin"));
		assert!(build_output_path("snap", "../pcfg", "bin").is_err());
		assert!(build_output_path("snap", "", "bin").is_err());
	}
}
