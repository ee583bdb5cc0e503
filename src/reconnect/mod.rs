//! Reconnection/reauthentication coordinator.
//!
//! Institutions sometimes issue a new external item id on a routine credential
//! refresh. Without care that looks identical to a full reconnection and would
//! needlessly wipe history, so the coordinator classifies every public-token
//! exchange:
//!
//! - **Reauth** (same external item id): the stored credential is replaced and
//!   the item goes back to `Active`. Terminal, no data mutation.
//! - **Reconnection** (new external item id): the new credential, item id, and
//!   freshly fetched account list are stashed under a short-lived reconnection
//!   id, and nothing mutates until the user explicitly confirms. Confirmation
//!   preserves user work (split children become manual rows, manual rows are
//!   never deleted), discards stale provider rows, remaps accounts by a
//!   `(name, mask)` signature so history stays attached, clears both cursors,
//!   and kicks a full resync.
//!
//! The stash is an injected dependency rather than process-global state, so
//! tests can swap the backing store and control expiry.

use crate::ledger::{Account, BalanceSnapshot, ItemStatus, LedgerStore, StoreError, new_row_id};
use crate::provider::{ProviderAccount, ProviderApi, ProviderError};
use crate::split::{SplitError, SplitManager};
use crate::sync::SyncEngine;
use crate::sync::locks::ItemLocks;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configuration for stashed reconnection data
#[derive(Debug, Clone)]
pub struct StashConfig {
	/// How long a prepared reconnection stays confirmable.
	pub ttl: Duration,
}

impl Default for StashConfig {
	fn default() -> Self {
		Self {
			ttl: Duration::from_secs(15 * 60),
		}
	}
}

/// Error types for reconnection operations
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
	#[error("item not found: {0}")]
	ItemNotFound(String),

	#[error("unknown or expired reconnection id: {0}")]
	UnknownOrExpired(String),

	#[error("provider error: {0}")]
	Provider(#[from] ProviderError),

	#[error("store error: {0}")]
	Store(#[from] StoreError),

	#[error("split error: {0}")]
	Split(#[from] SplitError),

	#[error("stash backend error: {0}")]
	Stash(String),
}

/// Data stashed between prepare and confirm
#[derive(Debug, Clone)]
pub struct PreparedReconnection {
	pub item_id: String,
	pub access_token: String,
	pub external_item_id: String,
	pub institution_id: Option<String>,
	pub institution_name: Option<String>,
	pub accounts: Vec<ProviderAccount>,
}

/// Short-lived key-value store for prepared reconnections.
///
/// Entries are single-shot: `take` removes the entry, so a reconnection id can
/// be confirmed at most once.
#[async_trait::async_trait]
pub trait ReconnectionStash: Send + Sync {
	async fn put(
		&self,
		id: &str,
		prepared: PreparedReconnection,
		ttl: Duration,
	) -> Result<(), ReconnectError>;

	async fn take(&self, id: &str) -> Result<Option<PreparedReconnection>, ReconnectError>;

	async fn discard(&self, id: &str) -> Result<(), ReconnectError>;
}

/// In-process stash with expiry checked on `take`. Entries are short-lived
/// and single-shot, so no background sweeper is needed.
#[derive(Default)]
pub struct MemoryStash {
	entries: Mutex<HashMap<String, (PreparedReconnection, Instant)>>,
}

impl MemoryStash {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl ReconnectionStash for MemoryStash {
	async fn put(
		&self,
		id: &str,
		prepared: PreparedReconnection,
		ttl: Duration,
	) -> Result<(), ReconnectError> {
		self.entries
			.lock()
			.unwrap()
			.insert(id.to_string(), (prepared, Instant::now() + ttl));
		Ok(())
	}

	async fn take(&self, id: &str) -> Result<Option<PreparedReconnection>, ReconnectError> {
		let mut entries = self.entries.lock().unwrap();
		match entries.remove(id) {
			Some((prepared, deadline)) if Instant::now() < deadline => Ok(Some(prepared)),
			_ => Ok(None),
		}
	}

	async fn discard(&self, id: &str) -> Result<(), ReconnectError> {
		self.entries.lock().unwrap().remove(id);
		Ok(())
	}
}

/// Classification of a public-token exchange
#[derive(Debug, Clone)]
pub enum ReconnectionOutcome {
	/// Same external item id: credential refreshed in place, nothing else
	/// touched.
	Reauthorized { item_id: String },
	/// New external item id: destructive reconnection prepared, awaiting
	/// explicit confirmation.
	ConfirmationRequired {
		reconnection_id: String,
		/// Provider-sourced rows that confirmation will delete.
		pending_removal_count: usize,
		account_count: usize,
	},
}

/// Coordinator for reconnection attempts. Owns no storage of its own; it
/// drives the split manager, the ledger store, and the sync engine.
pub struct ReconnectionCoordinator {
	provider: Arc<dyn ProviderApi>,
	store: Arc<dyn LedgerStore>,
	splits: Arc<SplitManager>,
	engine: Arc<SyncEngine>,
	stash: Arc<dyn ReconnectionStash>,
	locks: Arc<ItemLocks>,
	config: StashConfig,
}

impl ReconnectionCoordinator {
	pub fn new(
		provider: Arc<dyn ProviderApi>,
		store: Arc<dyn LedgerStore>,
		splits: Arc<SplitManager>,
		engine: Arc<SyncEngine>,
		stash: Arc<dyn ReconnectionStash>,
		locks: Arc<ItemLocks>,
		config: StashConfig,
	) -> Self {
		Self {
			provider,
			store,
			splits,
			engine,
			stash,
			locks,
			config,
		}
	}

	/// Exchange a public token and classify the result.
	///
	/// Reauth is terminal and mutates nothing but the credential and status.
	/// Reconnection stashes everything needed for the destructive commit and
	/// reports how many provider-sourced rows a confirm would delete.
	pub async fn prepare_reconnection(
		&self,
		item_id: &str,
		public_token: &str,
	) -> Result<ReconnectionOutcome, ReconnectError> {
		let mut item = self
			.store
			.get_item(item_id)
			.await?
			.ok_or_else(|| ReconnectError::ItemNotFound(item_id.to_string()))?;

		let exchange = self.provider.exchange_public_token(public_token).await?;

		if exchange.item_id == item.external_item_id {
			item.access_token = exchange.access_token;
			item.status = ItemStatus::Active;
			item.updated_at = Utc::now();
			self.store.put_item(item).await?;
			info!("Item {} reauthorized in place", item_id);
			return Ok(ReconnectionOutcome::Reauthorized {
				item_id: item_id.to_string(),
			});
		}

		let provider_item = self.provider.item_get(&exchange.access_token).await?;
		let accounts = self.provider.accounts_get(&exchange.access_token).await?;
		let pending_removal_count = self.count_provider_rows(item_id).await?;

		let reconnection_id = new_reconnection_id();
		self.stash
			.put(
				&reconnection_id,
				PreparedReconnection {
					item_id: item.id.clone(),
					access_token: exchange.access_token,
					external_item_id: exchange.item_id,
					institution_id: provider_item.institution_id,
					institution_name: provider_item.institution_name,
					accounts: accounts.clone(),
				},
				self.config.ttl,
			)
			.await?;

		info!(
			"Prepared reconnection {} for item {}: {} rows pending removal, {} provider accounts",
			reconnection_id,
			item_id,
			pending_removal_count,
			accounts.len()
		);

		Ok(ReconnectionOutcome::ConfirmationRequired {
			reconnection_id,
			pending_removal_count,
			account_count: accounts.len(),
		})
	}

	/// Commit a prepared reconnection, then kick a full resync.
	///
	/// The commit runs under the item's lock so no delta-sync can interleave
	/// with the credential swap and mass-delete. The resync happens after the
	/// lock is released; its failure is logged rather than surfaced, since the
	/// reconnection itself already committed and the next scheduled sync picks
	/// up from the cleared cursor.
	pub async fn confirm_and_resync(&self, reconnection_id: &str) -> Result<String, ReconnectError> {
		let item_id = self.confirm_reconnection(reconnection_id).await?;

		if let Err(e) = self.engine.sync_item(&item_id).await {
			warn!("Post-reconnection sync for item {} failed: {}", item_id, e);
		}

		Ok(item_id)
	}

	/// Commit a prepared reconnection without the follow-up sync. Returns the
	/// item id on success; an unknown or expired reconnection id rejects with
	/// no mutation.
	pub async fn confirm_reconnection(
		&self,
		reconnection_id: &str,
	) -> Result<String, ReconnectError> {
		let prepared = self
			.stash
			.take(reconnection_id)
			.await?
			.ok_or_else(|| ReconnectError::UnknownOrExpired(reconnection_id.to_string()))?;

		let item_id = prepared.item_id.clone();
		let lock = self.locks.lock_for(&item_id);
		let _guard = lock.lock().await;
		self.commit(prepared).await?;

		Ok(item_id)
	}

	/// Discard a prepared reconnection with no ledger mutation.
	pub async fn cancel_reconnection(&self, reconnection_id: &str) -> Result<(), ReconnectError> {
		self.stash.discard(reconnection_id).await?;
		info!("Cancelled reconnection {}", reconnection_id);
		Ok(())
	}

	/// Provider-sourced rows that a confirm would delete: everything that is
	/// neither manual nor a split child (children are converted to manual
	/// before the delete pass and survive it).
	async fn count_provider_rows(&self, item_id: &str) -> Result<usize, ReconnectError> {
		let mut count = 0;
		for account in self.store.list_accounts_for_item(item_id).await? {
			for row in self
				.store
				.list_transactions_for_account(&account.id)
				.await?
			{
				if !row.is_manual && !row.is_split_child() {
					count += 1;
				}
			}
		}
		Ok(count)
	}

	async fn commit(&self, prepared: PreparedReconnection) -> Result<(), ReconnectError> {
		let mut item = self
			.store
			.get_item(&prepared.item_id)
			.await?
			.ok_or_else(|| ReconnectError::ItemNotFound(prepared.item_id.clone()))?;

		// Preserve user work first: split children become independent manual
		// rows before their parents are deleted.
		let converted = self.splits.convert_children_to_manual(&item.id).await?;

		let mut deleted = 0;
		for account in self.store.list_accounts_for_item(&item.id).await? {
			for row in self
				.store
				.list_transactions_for_account(&account.id)
				.await?
			{
				if row.is_manual {
					continue;
				}
				self.store.delete_tag_links_for_transaction(&row.id).await?;
				self.store.delete_transaction(&row.id).await?;
				deleted += 1;
			}
		}

		item.external_item_id = prepared.external_item_id;
		item.access_token = prepared.access_token;
		if let Some(institution_id) = prepared.institution_id {
			item.institution_id = institution_id;
		}
		if let Some(institution_name) = prepared.institution_name {
			item.institution_name = institution_name;
		}
		item.status = ItemStatus::Active;
		item.transactions_cursor = None;
		item.investments_cursor = None;
		item.updated_at = Utc::now();
		self.store.put_item(item.clone()).await?;

		let (matched, inserted) = self
			.reconcile_accounts(&item.id, prepared.accounts)
			.await?;

		info!(
			"Reconnected item {}: {} split children preserved, {} rows deleted, {} accounts matched, {} inserted",
			item.id, converted, deleted, matched, inserted
		);
		Ok(())
	}

	/// Match existing account rows to freshly fetched provider accounts via
	/// the `(name, mask)` signature. Matched rows are patched in place so
	/// historical transactions stay attached; unmatched provider accounts
	/// become new rows.
	async fn reconcile_accounts(
		&self,
		item_id: &str,
		provider_accounts: Vec<ProviderAccount>,
	) -> Result<(usize, usize), ReconnectError> {
		let existing = self.store.list_accounts_for_item(item_id).await?;
		let now = Utc::now();
		let mut matched = 0;
		let mut inserted = 0;

		for provider_account in provider_accounts {
			let signature = (
				provider_account.name.to_lowercase(),
				provider_account.mask.clone(),
			);
			let balance = BalanceSnapshot {
				current: provider_account.balances.current,
				available: provider_account.balances.available,
				limit: provider_account.balances.limit,
				as_of: Some(now),
			};

			if let Some(account) = existing.iter().find(|a| a.signature() == signature) {
				let mut account = account.clone();
				account.external_account_id = provider_account.account_id;
				account.official_name = provider_account.official_name;
				account.kind = provider_account.kind;
				account.subkind = provider_account.subtype;
				account.currency = provider_account
					.balances
					.iso_currency_code
					.clone()
					.or(account.currency);
				account.balance = balance;
				self.store.put_account(account).await?;
				matched += 1;
			} else {
				self.store
					.put_account(Account {
						id: new_row_id(),
						item_id: item_id.to_string(),
						external_account_id: provider_account.account_id,
						name: provider_account.name,
						official_name: provider_account.official_name,
						mask: provider_account.mask,
						kind: provider_account.kind,
						subkind: provider_account.subtype,
						currency: provider_account.balances.iso_currency_code.clone(),
						balance,
					})
					.await?;
				inserted += 1;
			}
		}

		Ok((matched, inserted))
	}
}

/// Mint an opaque short-lived reconnection id.
fn new_reconnection_id() -> String {
	let mut bytes = [0u8; 16];
	rand::rng().fill(&mut bytes);
	hex::encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::categorize::NoopCategorizer;
	use crate::ledger::memory::InMemoryLedgerStore;
	use crate::ledger::{Item, Transaction};
	use crate::provider::{ProviderBalances, ProviderItem, TokenExchange, TransactionsSyncPage};
	use crate::split::SplitConfig;
	use crate::sync::SyncConfig;
	use chrono::NaiveDate;
	use pretty_assertions::assert_eq;

	/// Provider double whose exchange result and account list are programmed
	/// per test.
	struct FakeProvider {
		exchange: TokenExchange,
		accounts: Vec<ProviderAccount>,
	}

	#[async_trait::async_trait]
	impl ProviderApi for FakeProvider {
		async fn transactions_sync(
			&self,
			_access_token: &str,
			cursor: Option<&str>,
			_count: u32,
		) -> Result<TransactionsSyncPage, ProviderError> {
			Ok(TransactionsSyncPage {
				added: vec![],
				modified: vec![],
				removed: vec![],
				next_cursor: cursor.unwrap_or("fresh").to_string(),
				has_more: false,
			})
		}

		async fn accounts_get(
			&self,
			_access_token: &str,
		) -> Result<Vec<ProviderAccount>, ProviderError> {
			Ok(self.accounts.clone())
		}

		async fn exchange_public_token(
			&self,
			_public_token: &str,
		) -> Result<TokenExchange, ProviderError> {
			Ok(self.exchange.clone())
		}

		async fn item_get(&self, _access_token: &str) -> Result<ProviderItem, ProviderError> {
			Ok(ProviderItem {
				item_id: self.exchange.item_id.clone(),
				institution_id: Some("ins-1".to_string()),
				institution_name: Some("First Test Bank".to_string()),
			})
		}
	}

	fn provider_account(external: &str, name: &str, mask: &str) -> ProviderAccount {
		ProviderAccount {
			account_id: external.to_string(),
			name: name.to_string(),
			official_name: None,
			mask: Some(mask.to_string()),
			kind: "depository".to_string(),
			subtype: Some("checking".to_string()),
			balances: ProviderBalances {
				current: Some(1200.0),
				available: Some(1100.0),
				limit: None,
				iso_currency_code: Some("USD".to_string()),
			},
		}
	}

	fn transaction(external_id: &str, manual: bool) -> Transaction {
		Transaction {
			id: new_row_id(),
			account_id: "acc-1".to_string(),
			external_id: external_id.to_string(),
			amount: -10.0,
			currency: Some("USD".to_string()),
			date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
			authorized_date: None,
			name: "row".to_string(),
			merchant_name: None,
			provider_categories: vec![],
			category_id: None,
			subcategory_id: None,
			pending: false,
			is_manual: manual,
			is_split: false,
			parent_transaction_id: None,
			original_transaction_id: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	async fn seeded_store() -> Arc<InMemoryLedgerStore> {
		let store = Arc::new(InMemoryLedgerStore::new());
		store
			.put_item(Item {
				id: "item-1".to_string(),
				external_item_id: "ext-item-A".to_string(),
				access_token: "access-old".to_string(),
				institution_id: "ins-1".to_string(),
				institution_name: "First Test Bank".to_string(),
				status: ItemStatus::Error,
				transactions_cursor: Some("cursor-old".to_string()),
				investments_cursor: Some("inv-cursor-old".to_string()),
				created_at: Utc::now(),
				updated_at: Utc::now(),
			})
			.await
			.unwrap();
		store
			.put_account(Account {
				id: "acc-1".to_string(),
				item_id: "item-1".to_string(),
				external_account_id: "ext-acc-old".to_string(),
				name: "Everyday Checking".to_string(),
				official_name: None,
				mask: Some("4321".to_string()),
				kind: "depository".to_string(),
				subkind: Some("checking".to_string()),
				currency: Some("USD".to_string()),
				balance: BalanceSnapshot::default(),
			})
			.await
			.unwrap();
		store
	}

	fn coordinator(
		provider: FakeProvider,
		store: Arc<InMemoryLedgerStore>,
		ttl: Duration,
	) -> ReconnectionCoordinator {
		let provider: Arc<dyn ProviderApi> = Arc::new(provider);
		let store_dyn: Arc<dyn LedgerStore> = store;
		let locks = Arc::new(ItemLocks::new());
		let splits = Arc::new(SplitManager::new(store_dyn.clone(), SplitConfig::default()));
		let engine = Arc::new(SyncEngine::new(
			provider.clone(),
			store_dyn.clone(),
			Arc::new(NoopCategorizer),
			locks.clone(),
			SyncConfig::default(),
		));
		ReconnectionCoordinator::new(
			provider,
			store_dyn,
			splits,
			engine,
			Arc::new(MemoryStash::new()),
			locks,
			StashConfig { ttl },
		)
	}

	#[tokio::test]
	async fn same_external_id_classifies_as_reauth() {
		let store = seeded_store().await;
		store.put_transaction(transaction("t1", false)).await.unwrap();

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-A".to_string(),
				},
				accounts: vec![],
			},
			store.clone(),
			Duration::from_secs(60),
		);

		let outcome = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap();
		assert!(matches!(outcome, ReconnectionOutcome::Reauthorized { .. }));

		let item = store.get_item("item-1").await.unwrap().unwrap();
		assert_eq!(ItemStatus::Active, item.status);
		assert_eq!("access-new", item.access_token);
		// No data mutation: rows and cursors are untouched.
		assert_eq!(Some("cursor-old".to_string()), item.transactions_cursor);
		assert!(store
			.find_transaction_by_external_id("t1")
			.await
			.unwrap()
			.is_some());
	}

	#[tokio::test]
	async fn new_external_id_requires_confirmation_and_counts_removals() {
		let store = seeded_store().await;
		for i in 0..10 {
			store
				.put_transaction(transaction(&format!("p{}", i), false))
				.await
				.unwrap();
		}
		store.put_transaction(transaction("m1", true)).await.unwrap();
		store.put_transaction(transaction("m2", true)).await.unwrap();

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-B".to_string(),
				},
				accounts: vec![provider_account("ext-acc-new", "Everyday Checking", "4321")],
			},
			store.clone(),
			Duration::from_secs(60),
		);

		let outcome = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap();
		let ReconnectionOutcome::ConfirmationRequired {
			reconnection_id,
			pending_removal_count,
			account_count,
		} = outcome
		else {
			panic!("expected a reconnection, got a reauth");
		};
		assert_eq!(10, pending_removal_count);
		assert_eq!(1, account_count);

		// Nothing mutates until confirmation.
		let item = store.get_item("item-1").await.unwrap().unwrap();
		assert_eq!("ext-item-A", item.external_item_id);
		assert_eq!(ItemStatus::Error, item.status);

		coordinator
			.confirm_reconnection(&reconnection_id)
			.await
			.unwrap();

		// Manual rows survive, provider rows are gone.
		let remaining = store.list_transactions_for_account("acc-1").await.unwrap();
		assert_eq!(2, remaining.len());
		assert!(remaining.iter().all(|t| t.is_manual));

		let item = store.get_item("item-1").await.unwrap().unwrap();
		assert_eq!("ext-item-B", item.external_item_id);
		assert_eq!("access-new", item.access_token);
		assert_eq!(ItemStatus::Active, item.status);
		assert_eq!(None, item.transactions_cursor);
		assert_eq!(None, item.investments_cursor);

		// The account row was matched by (name, mask) and patched in place.
		let account = store.get_account("acc-1").await.unwrap().unwrap();
		assert_eq!("ext-acc-new", account.external_account_id);
		assert_eq!(Some(1200.0), account.balance.current);

		// A reconnection id is single-shot.
		assert!(matches!(
			coordinator.confirm_reconnection(&reconnection_id).await,
			Err(ReconnectError::UnknownOrExpired(_))
		));
	}

	#[tokio::test]
	async fn confirmation_preserves_split_children_as_manual_rows() {
		let store = seeded_store().await;
		store
			.put_transaction(transaction("parent-ext", false))
			.await
			.unwrap();
		let parent_id = store
			.find_transaction_by_external_id("parent-ext")
			.await
			.unwrap()
			.unwrap()
			.id;

		let splits = SplitManager::new(store.clone(), SplitConfig::default());
		let outcome = splits
			.split_transaction(
				&parent_id,
				vec![
					crate::split::SplitPart {
						amount: -6.0,
						description: None,
						category_id: Some("cat-food".to_string()),
						subcategory_id: None,
					},
					crate::split::SplitPart {
						amount: -4.0,
						description: None,
						category_id: None,
						subcategory_id: None,
					},
				],
			)
			.await
			.unwrap();

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-B".to_string(),
				},
				accounts: vec![],
			},
			store.clone(),
			Duration::from_secs(60),
		);

		let ReconnectionOutcome::ConfirmationRequired {
			reconnection_id,
			pending_removal_count,
			..
		} = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap()
		else {
			panic!("expected a reconnection");
		};
		// Only the split parent counts; its children survive as manual rows.
		assert_eq!(1, pending_removal_count);

		coordinator
			.confirm_reconnection(&reconnection_id)
			.await
			.unwrap();

		// The parent (a provider row) is gone, the children stayed with their
		// categorization and are now manual and detached.
		assert!(store.get_transaction(&parent_id).await.unwrap().is_none());
		for child_id in outcome.child_ids {
			let child = store.get_transaction(&child_id).await.unwrap().unwrap();
			assert!(child.is_manual);
			assert_eq!(None, child.parent_transaction_id);
		}
		let first_child = store
			.list_transactions_for_account("acc-1")
			.await
			.unwrap()
			.into_iter()
			.find(|t| t.category_id.is_some())
			.unwrap();
		assert_eq!(Some("cat-food".to_string()), first_child.category_id);
	}

	#[tokio::test]
	async fn unmatched_provider_accounts_are_inserted() {
		let store = seeded_store().await;

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-B".to_string(),
				},
				accounts: vec![
					provider_account("ext-acc-new", "Everyday Checking", "4321"),
					provider_account("ext-acc-extra", "Holiday Savings", "9999"),
				],
			},
			store.clone(),
			Duration::from_secs(60),
		);

		let ReconnectionOutcome::ConfirmationRequired { reconnection_id, .. } = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap()
		else {
			panic!("expected a reconnection");
		};
		coordinator
			.confirm_reconnection(&reconnection_id)
			.await
			.unwrap();

		let accounts = store.list_accounts_for_item("item-1").await.unwrap();
		assert_eq!(2, accounts.len());
		// The matched row kept its id; the new one is a fresh row.
		assert!(accounts.iter().any(|a| a.id == "acc-1"));
		assert!(accounts
			.iter()
			.any(|a| a.external_account_id == "ext-acc-extra"));
	}

	#[tokio::test]
	async fn expired_or_cancelled_reconnections_mutate_nothing() {
		let store = seeded_store().await;
		store.put_transaction(transaction("t1", false)).await.unwrap();

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-B".to_string(),
				},
				accounts: vec![],
			},
			store.clone(),
			Duration::from_secs(0),
		);

		let ReconnectionOutcome::ConfirmationRequired { reconnection_id, .. } = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap()
		else {
			panic!("expected a reconnection");
		};

		// TTL of zero: the entry is already expired.
		assert!(matches!(
			coordinator.confirm_reconnection(&reconnection_id).await,
			Err(ReconnectError::UnknownOrExpired(_))
		));

		let item = store.get_item("item-1").await.unwrap().unwrap();
		assert_eq!("ext-item-A", item.external_item_id);
		assert!(store
			.find_transaction_by_external_id("t1")
			.await
			.unwrap()
			.is_some());

		// Cancel is a no-op on the ledger too.
		coordinator.cancel_reconnection("whatever").await.unwrap();
	}

	#[tokio::test]
	async fn confirm_and_resync_runs_a_full_sync_from_scratch() {
		let store = seeded_store().await;

		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "access-new".to_string(),
					item_id: "ext-item-B".to_string(),
				},
				accounts: vec![],
			},
			store.clone(),
			Duration::from_secs(60),
		);

		let ReconnectionOutcome::ConfirmationRequired { reconnection_id, .. } = coordinator
			.prepare_reconnection("item-1", "public-token")
			.await
			.unwrap()
		else {
			panic!("expected a reconnection");
		};
		coordinator
			.confirm_and_resync(&reconnection_id)
			.await
			.unwrap();

		// The resync started from a cleared cursor and stored the provider's
		// fresh one.
		let item = store.get_item("item-1").await.unwrap().unwrap();
		assert_eq!(Some("fresh".to_string()), item.transactions_cursor);
	}

	#[tokio::test]
	async fn unknown_item_rejects_before_exchanging() {
		let store = seeded_store().await;
		let coordinator = coordinator(
			FakeProvider {
				exchange: TokenExchange {
					access_token: "x".to_string(),
					item_id: "y".to_string(),
				},
				accounts: vec![],
			},
			store,
			Duration::from_secs(60),
		);

		assert!(matches!(
			coordinator.prepare_reconnection("ghost", "tok").await,
			Err(ReconnectError::ItemNotFound(_))
		));
	}
}
