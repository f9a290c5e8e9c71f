use std::sync::mpsc;
use std::thread;

use crate::corpus::Corpus;

/// Partial counting tables that can be combined.
pub(crate) trait Merge {
	fn merge(&mut self, other: Self);
}

/// Counts a corpus in chunks on worker threads, then merges the partial
/// tables into one.
///
/// # Behavior
/// - Splits the names into chunks (based on CPU cores * factor).
/// - Spawns one scoped thread per chunk, each building a partial table.
/// - Merges all partial tables sequentially.
///
/// # Notes
/// - Counting is additive, so the merged table is identical to a
///   sequential count regardless of chunking.
/// - Small corpora are counted on the calling thread.
pub(crate) fn count_in_parallel<T, F>(corpus: &Corpus, count: F) -> T
where
	T: Default + Merge + Send,
	F: Fn(&mut T, &str) + Sync,
{
	let names = corpus.as_vec();
	let cpus = num_cpus::get();
	let factor = 8;
	let chunks = cpus * factor;

	if names.len() < chunks * 16 {
		let mut table = T::default();
		for name in names {
			count(&mut table, name);
		}
		return table;
	}

	let chunk_size = names.len().div_ceil(chunks);
	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for chunk in names.chunks(chunk_size) {
			let tx = tx.clone();
			let count = &count;
			scope.spawn(move || {
				let mut partial = T::default();
				for name in chunk {
					count(&mut partial, name);
				}
				// The receiver outlives the scope
				let _ = tx.send(partial);
			});
		}
	});
	drop(tx);

	let mut table = T::default();
	for partial in rx.iter() {
		table.merge(partial);
	}
	table
}
