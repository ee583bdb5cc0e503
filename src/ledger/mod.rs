/// Domain model types
pub mod models;
/// Abstract persistence interface
pub mod store;

/// In-memory store for tests and the demo binary
pub mod memory;

pub use models::*;
pub use store::{LedgerStore, StoreError};

use rand::Rng;

/// Mint an opaque row id for locally created rows.
pub fn new_row_id() -> String {
	let mut bytes = [0u8; 16];
	rand::rng().fill(&mut bytes);
	hex::encode(bytes)
}
