//! Transaction Synchronization Module
//!
//! This module provides the core logic for reconciling the provider's
//! incremental transactions feed against the local ledger. It is composed of
//! several submodules, each responsible for a specific aspect of the process:
//!
//! - `engine`: The sync engine itself. Paginates the feed, applies
//!   added/modified/removed deltas, and advances the resumable cursor.
//! - `category_map`: Pure mapping from provider category strings to the user's
//!   category set.
//! - `stats`: Per-sync counters and a human-readable summary.
//! - `locks`: Per-item async locks serializing sync against reconnection.
//!
//! The engine relies on idempotent upsert-by-external-id semantics rather than
//! store-level locking: a crashed-and-retried sync re-applies the same window
//! safely, and the cursor moves only after the whole window is durably written.

/// Provider-category to local-category mapping
pub mod category_map;
/// The cursor-based sync engine
pub mod engine;
/// Per-item critical sections
pub mod locks;
/// Sync counters and summaries
pub mod stats;

pub use engine::*;
pub use stats::SyncStats;
