/// Counters accumulated over one item sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
	/// Pages fetched from the provider feed.
	pub pages: usize,
	/// Rows inserted from `added` deltas.
	pub added: usize,
	/// Rows refreshed from `modified` deltas.
	pub modified: usize,
	/// Rows hard-deleted from `removed` deltas.
	pub removed: usize,
	/// Removals skipped because the row was manual or a split parent.
	pub skipped_removals: usize,
	/// Newly added rows that received a category suggestion.
	pub categorized: usize,
}

impl SyncStats {
	/// Get a human-readable summary of the sync statistics
	pub fn summary(&self) -> String {
		format!(
			"{} pages: {} added, {} modified, {} removed ({} kept), {} categorized",
			self.pages,
			self.added,
			self.modified,
			self.removed,
			self.skipped_removals,
			self.categorized,
		)
	}
}
