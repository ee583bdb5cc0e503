//! Abstract persistence interface for the ledger.
//!
//! All writes are atomic at the single-row level. Multi-row sequences (for
//! example "delete tag links, then delete the transaction") are the caller's
//! responsibility and must be ordered by the caller. `put_*` methods are
//! whole-row upserts keyed by the row id, which is what makes replayed sync
//! windows idempotent.

use super::models::{Account, CategorySet, Category, Item, Subcategory, Tag, TagLink, Transaction};

/// Errors surfaced by a ledger store implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("row not found: {0}")]
	NotFound(String),

	#[error("storage backend error: {0}")]
	Backend(String),
}

#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
	// Items
	async fn put_item(&self, item: Item) -> Result<(), StoreError>;
	async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError>;
	async fn find_item_by_external_id(
		&self,
		external_item_id: &str,
	) -> Result<Option<Item>, StoreError>;
	async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

	// Accounts
	async fn put_account(&self, account: Account) -> Result<(), StoreError>;
	async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError>;
	async fn find_account_by_external_id(
		&self,
		external_account_id: &str,
	) -> Result<Option<Account>, StoreError>;
	async fn list_accounts_for_item(&self, item_id: &str) -> Result<Vec<Account>, StoreError>;

	// Transactions
	async fn put_transaction(&self, transaction: Transaction) -> Result<(), StoreError>;
	async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError>;
	async fn find_transaction_by_external_id(
		&self,
		external_id: &str,
	) -> Result<Option<Transaction>, StoreError>;
	async fn list_transactions_for_account(
		&self,
		account_id: &str,
	) -> Result<Vec<Transaction>, StoreError>;
	async fn list_children(
		&self,
		parent_transaction_id: &str,
	) -> Result<Vec<Transaction>, StoreError>;
	async fn delete_transaction(&self, id: &str) -> Result<(), StoreError>;

	// Categories
	async fn put_category(&self, category: Category) -> Result<(), StoreError>;
	async fn put_subcategory(&self, subcategory: Subcategory) -> Result<(), StoreError>;
	async fn category_set(&self) -> Result<CategorySet, StoreError>;

	// Tags
	async fn put_tag(&self, tag: Tag) -> Result<(), StoreError>;
	async fn put_tag_link(&self, link: TagLink) -> Result<(), StoreError>;
	async fn list_tag_links_for_transaction(
		&self,
		transaction_id: &str,
	) -> Result<Vec<TagLink>, StoreError>;
	async fn delete_tag_links_for_transaction(
		&self,
		transaction_id: &str,
	) -> Result<(), StoreError>;
}
