//! Transaction synchronization and categorization pipeline for a
//! personal-finance ledger.
//!
//! The crate reconciles an aggregation provider's incremental change feed
//! (added/modified/removed transactions, paginated via cursors) against a
//! local transaction store, manages split-transaction trees, coordinates
//! reconnection flows that preserve user edits while discarding stale
//! provider rows, and applies best-effort automatic categorization.
//!
//! The route/UI layer lives elsewhere and consumes the operations exposed
//! here: `sync_item`, `split_transaction`, `undo_split`,
//! `prepare_reconnection`, `confirm_reconnection`, and `update_item_status`.

/// Best-effort categorization assistant
pub mod categorize;
/// Domain model and abstract persistence
pub mod ledger;
/// Provider API client and wire types
pub mod provider;
/// Reconnection/reauthentication coordinator
pub mod reconnect;
/// Split-transaction manager
pub mod split;
/// Cursor-based sync engine
pub mod sync;
