//! Cursor-based sync engine.
//!
//! Drives paginated fetch-and-reconcile cycles against the provider's
//! incremental transactions feed, one item at a time. Pages are fetched
//! strictly sequentially (the cursor is a linear resumption token), deltas are
//! applied through the ledger store, and the new cursor is persisted only
//! after every row in the window is durably written. A failure mid-window
//! leaves the old cursor in place, so the next sync retries the same window;
//! upserts keyed by external transaction id make the replay idempotent.

use crate::categorize::Categorizer;
use crate::ledger::{ItemStatus, LedgerStore, StoreError, Transaction, new_row_id};
use crate::provider::{
	ProviderApi, ProviderError, ProviderTransaction, RemovedTransaction, TransactionsSyncPage,
};
use crate::sync::category_map::map_provider_category;
use crate::sync::locks::ItemLocks;
use crate::sync::stats::SyncStats;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Maximum rows per feed page.
	pub page_size: u32,
	/// Suggestions below this confidence are discarded.
	pub min_confidence: f32,
	/// Total retry budget per page fetch; transient errors are retried with
	/// exponential backoff until this elapses.
	pub max_retry_elapsed: Duration,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			page_size: 100,
			min_confidence: 0.6,
			max_retry_elapsed: Duration::from_secs(30),
		}
	}
}

/// Error types for item synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("item not found: {0}")]
	ItemNotFound(String),

	#[error("item {item_id} requires reconnection: {code}")]
	CredentialInvalid { item_id: String, code: String },

	#[error("provider error: {0}")]
	Provider(#[from] ProviderError),

	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

/// Accumulated feed deltas for one sync window
#[derive(Default)]
struct TransactionDelta {
	added: Vec<ProviderTransaction>,
	modified: Vec<ProviderTransaction>,
	removed: Vec<RemovedTransaction>,
}

/// Sync engine over a provider feed, a ledger store, and a best-effort
/// categorizer.
pub struct SyncEngine {
	provider: Arc<dyn ProviderApi>,
	store: Arc<dyn LedgerStore>,
	categorizer: Arc<dyn Categorizer>,
	locks: Arc<ItemLocks>,
	config: SyncConfig,
}

impl SyncEngine {
	pub fn new(
		provider: Arc<dyn ProviderApi>,
		store: Arc<dyn LedgerStore>,
		categorizer: Arc<dyn Categorizer>,
		locks: Arc<ItemLocks>,
		config: SyncConfig,
	) -> Self {
		Self {
			provider,
			store,
			categorizer,
			locks,
			config,
		}
	}

	/// Sync one item's transactions feed, holding the item's lock for the
	/// duration so a reconnection cannot interleave.
	pub async fn sync_item(&self, item_id: &str) -> Result<SyncStats, SyncError> {
		let lock = self.locks.lock_for(item_id);
		let _guard = lock.lock().await;
		self.sync_item_locked(item_id).await
	}

	/// Sync every syncable item as independent concurrent tasks.
	///
	/// One item's failure never aborts the others; per-item results are
	/// returned alongside the item id. Items already known to be dead
	/// (`Error`) or on the way out (`PendingDisconnect`) are skipped.
	pub async fn sync_all_items(
		&self,
	) -> Result<Vec<(String, Result<SyncStats, SyncError>)>, StoreError> {
		let items = self.store.list_items().await?;

		let tasks = items
			.into_iter()
			.filter(|item| {
				matches!(
					item.status,
					ItemStatus::Active | ItemStatus::PendingExpiration
				)
			})
			.map(|item| async move {
				let result = self.sync_item(&item.id).await;
				(item.id, result)
			});

		Ok(futures::future::join_all(tasks).await)
	}

	/// Apply a provider webhook status code to an item.
	///
	/// Unknown codes leave the status unchanged. Returns the item's status
	/// after the update.
	pub async fn update_item_status(
		&self,
		item_id: &str,
		provider_status_code: &str,
	) -> Result<ItemStatus, SyncError> {
		let mut item = self
			.store
			.get_item(item_id)
			.await?
			.ok_or_else(|| SyncError::ItemNotFound(item_id.to_string()))?;

		let status = match provider_status_code {
			"ITEM_LOGIN_REQUIRED" => ItemStatus::Error,
			"PENDING_EXPIRATION" => ItemStatus::PendingExpiration,
			"PENDING_DISCONNECT" | "USER_PERMISSION_REVOKED" => ItemStatus::PendingDisconnect,
			"OK" | "ITEM_OK" => ItemStatus::Active,
			other => {
				warn!(
					"Ignoring unknown provider status code '{}' for item {}",
					other, item_id
				);
				return Ok(item.status);
			}
		};

		if status != item.status {
			info!(
				"Item {} status: {:?} -> {:?} ({})",
				item_id, item.status, status, provider_status_code
			);
			item.status = status;
			item.updated_at = Utc::now();
			self.store.put_item(item).await?;
		}

		Ok(status)
	}

	async fn sync_item_locked(&self, item_id: &str) -> Result<SyncStats, SyncError> {
		let mut item = self
			.store
			.get_item(item_id)
			.await?
			.ok_or_else(|| SyncError::ItemNotFound(item_id.to_string()))?;

		info!("Starting transaction sync for item {}", item_id);

		let mut stats = SyncStats::default();
		let mut cursor = item.transactions_cursor.clone();
		let mut delta = TransactionDelta::default();

		loop {
			let page = match self
				.fetch_page_with_retry(&item.access_token, cursor.as_deref())
				.await
			{
				Ok(page) => page,
				Err(ProviderError::CredentialInvalid { code }) => {
					warn!(
						"Credential for item {} rejected ({}), marking item for reconnection",
						item_id, code
					);
					item.status = ItemStatus::Error;
					item.updated_at = Utc::now();
					self.store.put_item(item).await?;
					return Err(SyncError::CredentialInvalid {
						item_id: item_id.to_string(),
						code,
					});
				}
				Err(e) => return Err(e.into()),
			};

			stats.pages += 1;
			delta.added.extend(page.added);
			delta.modified.extend(page.modified);
			delta.removed.extend(page.removed);
			cursor = Some(page.next_cursor);

			if !page.has_more {
				break;
			}
		}

		let categories = self.store.category_set().await?;

		let mut new_uncategorized = Vec::new();
		for provider_tx in delta.added {
			if let Some((row, fresh)) = self.upsert_provider_row(provider_tx, &categories).await? {
				stats.added += 1;
				if fresh && row.category_id.is_none() {
					new_uncategorized.push(row);
				}
			}
		}
		for provider_tx in delta.modified {
			if self
				.upsert_provider_row(provider_tx, &categories)
				.await?
				.is_some()
			{
				stats.modified += 1;
			}
		}
		for removed in delta.removed {
			self.apply_removed(&removed, &mut stats).await?;
		}

		// Best-effort; a classification failure never fails the sync.
		stats.categorized = self
			.categorize_new_rows(new_uncategorized, &categories)
			.await;

		// The cursor moves only once every row above is durably written, so a
		// crashed sync replays the same window on the next invocation.
		item.transactions_cursor = cursor;
		item.updated_at = Utc::now();
		self.store.put_item(item).await?;

		info!("Item {} sync complete: {}", item_id, stats.summary());
		Ok(stats)
	}

	/// Fetch one feed page, retrying transient errors with exponential
	/// backoff. Credential and validation errors are permanent and surface
	/// immediately.
	async fn fetch_page_with_retry(
		&self,
		access_token: &str,
		cursor: Option<&str>,
	) -> Result<TransactionsSyncPage, ProviderError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.config.max_retry_elapsed),
			..ExponentialBackoff::default()
		};

		backoff::future::retry(policy, || async {
			self.provider
				.transactions_sync(access_token, cursor, self.config.page_size)
				.await
				.map_err(|e| {
					if e.is_transient() {
						debug!("Transient provider error, will retry: {}", e);
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
		})
		.await
	}

	/// Upsert one provider row by external transaction id.
	///
	/// Returns the stored row and whether it was freshly inserted; `None` when
	/// the row references an account this ledger does not know. Provider-owned
	/// fields always refresh, but a locally assigned category survives: manual
	/// assignment beats provider state.
	async fn upsert_provider_row(
		&self,
		provider_tx: ProviderTransaction,
		categories: &crate::ledger::CategorySet,
	) -> Result<Option<(Transaction, bool)>, SyncError> {
		let Some(account) = self
			.store
			.find_account_by_external_id(&provider_tx.account_id)
			.await?
		else {
			warn!(
				"Skipping transaction {} for unknown account {}",
				provider_tx.transaction_id, provider_tx.account_id
			);
			return Ok(None);
		};

		let now = Utc::now();
		match self
			.store
			.find_transaction_by_external_id(&provider_tx.transaction_id)
			.await?
		{
			Some(mut existing) => {
				existing.account_id = account.id;
				existing.amount = provider_tx.amount;
				existing.currency = provider_tx.iso_currency_code;
				existing.date = provider_tx.date;
				existing.authorized_date = provider_tx.authorized_date;
				existing.name = provider_tx.name;
				existing.merchant_name = provider_tx.merchant_name;
				existing.provider_categories = provider_tx.category;
				existing.pending = provider_tx.pending;
				existing.updated_at = now;
				// A still-uncategorized row may pick up a deterministic
				// mapping; an assigned category is never overwritten.
				if existing.category_id.is_none() {
					if let Some(mapped) =
						map_provider_category(&existing.provider_categories, categories)
					{
						existing.category_id = Some(mapped.category_id);
						existing.subcategory_id = mapped.subcategory_id;
					}
				}
				self.store.put_transaction(existing.clone()).await?;
				Ok(Some((existing, false)))
			}
			None => {
				let mapped = map_provider_category(&provider_tx.category, categories);
				let row = Transaction {
					id: new_row_id(),
					account_id: account.id,
					external_id: provider_tx.transaction_id,
					amount: provider_tx.amount,
					currency: provider_tx.iso_currency_code,
					date: provider_tx.date,
					authorized_date: provider_tx.authorized_date,
					name: provider_tx.name,
					merchant_name: provider_tx.merchant_name,
					provider_categories: provider_tx.category,
					category_id: mapped.as_ref().map(|m| m.category_id.clone()),
					subcategory_id: mapped.and_then(|m| m.subcategory_id),
					pending: provider_tx.pending,
					is_manual: false,
					is_split: false,
					parent_transaction_id: None,
					original_transaction_id: None,
					created_at: now,
					updated_at: now,
				};
				self.store.put_transaction(row.clone()).await?;
				Ok(Some((row, true)))
			}
		}
	}

	/// Hard-delete a provider-removed row, unless user intent protects it:
	/// manual rows and split parents survive provider removal.
	async fn apply_removed(
		&self,
		removed: &RemovedTransaction,
		stats: &mut SyncStats,
	) -> Result<(), SyncError> {
		let Some(row) = self
			.store
			.find_transaction_by_external_id(&removed.transaction_id)
			.await?
		else {
			return Ok(());
		};

		if row.is_manual || row.is_split {
			debug!(
				"Keeping transaction {} despite provider removal (manual or split)",
				row.external_id
			);
			stats.skipped_removals += 1;
			return Ok(());
		}

		self.store.delete_tag_links_for_transaction(&row.id).await?;
		self.store.delete_transaction(&row.id).await?;
		stats.removed += 1;
		Ok(())
	}

	async fn categorize_new_rows(
		&self,
		rows: Vec<Transaction>,
		categories: &crate::ledger::CategorySet,
	) -> usize {
		let mut categorized = 0;

		for mut row in rows {
			match self.categorizer.classify(&row, categories).await {
				Ok(Some(suggestion)) if suggestion.confidence >= self.config.min_confidence => {
					row.category_id = Some(suggestion.category_id);
					row.subcategory_id = suggestion.subcategory_id;
					row.updated_at = Utc::now();
					match self.store.put_transaction(row).await {
						Ok(()) => categorized += 1,
						Err(e) => warn!("Failed to store category suggestion: {}", e),
					}
				}
				Ok(Some(suggestion)) => {
					debug!(
						"Discarding low-confidence suggestion ({:.2}) for {}",
						suggestion.confidence, row.external_id
					);
				}
				Ok(None) => {}
				Err(e) => {
					warn!("Categorization failed for {}: {}", row.external_id, e);
				}
			}
		}

		categorized
	}
}
