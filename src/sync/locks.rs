use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-item async locks.
///
/// Reconnection confirmation is a critical section per item: interleaving a
/// delta-sync with an in-flight credential swap and mass-delete would apply
/// deltas against the wrong credential or lose them to the mass-delete. The
/// sync engine and the reconnection coordinator share one map and take the
/// item's lock for the duration of their mutation.
#[derive(Default)]
pub struct ItemLocks {
	inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ItemLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Get (or lazily create) the lock for one item. Locks are never removed;
	/// the map grows with the number of items, which is small.
	pub fn lock_for(&self, item_id: &str) -> Arc<tokio::sync::Mutex<()>> {
		let mut map = self.inner.lock().unwrap();
		map.entry(item_id.to_string())
			.or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
			.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn same_item_serializes_different_items_do_not() {
		let locks = ItemLocks::new();

		let a = locks.lock_for("item-a");
		let _guard = a.lock().await;

		// Same item: second acquisition would block.
		assert!(locks.lock_for("item-a").try_lock().is_err());
		// Different item: free to proceed.
		assert!(locks.lock_for("item-b").try_lock().is_ok());
	}
}
