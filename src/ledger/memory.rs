//! In-memory implementation of the ledger store, used by tests and the demo
//! binary.

use super::models::{Account, CategorySet, Category, Item, Subcategory, Tag, TagLink, Transaction};
use super::store::{LedgerStore, StoreError};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
	items: HashMap<String, Item>,
	accounts: HashMap<String, Account>,
	transactions: HashMap<String, Transaction>,
	categories: HashMap<String, Category>,
	subcategories: HashMap<String, Subcategory>,
	tags: HashMap<String, Tag>,
	tag_links: Vec<TagLink>,
}

/// Hash-map backed store with whole-row upsert semantics
#[derive(Default)]
pub struct InMemoryLedgerStore {
	inner: Mutex<Inner>,
}

impl InMemoryLedgerStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
	async fn put_item(&self, item: Item) -> Result<(), StoreError> {
		self.inner.lock().unwrap().items.insert(item.id.clone(), item);
		Ok(())
	}

	async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
		Ok(self.inner.lock().unwrap().items.get(id).cloned())
	}

	async fn find_item_by_external_id(
		&self,
		external_item_id: &str,
	) -> Result<Option<Item>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.items
			.values()
			.find(|i| i.external_item_id == external_item_id)
			.cloned())
	}

	async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
		Ok(self.inner.lock().unwrap().items.values().cloned().collect())
	}

	async fn put_account(&self, account: Account) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.accounts
			.insert(account.id.clone(), account);
		Ok(())
	}

	async fn get_account(&self, id: &str) -> Result<Option<Account>, StoreError> {
		Ok(self.inner.lock().unwrap().accounts.get(id).cloned())
	}

	async fn find_account_by_external_id(
		&self,
		external_account_id: &str,
	) -> Result<Option<Account>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.accounts
			.values()
			.find(|a| a.external_account_id == external_account_id)
			.cloned())
	}

	async fn list_accounts_for_item(&self, item_id: &str) -> Result<Vec<Account>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.accounts
			.values()
			.filter(|a| a.item_id == item_id)
			.cloned()
			.collect())
	}

	async fn put_transaction(&self, transaction: Transaction) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.transactions
			.insert(transaction.id.clone(), transaction);
		Ok(())
	}

	async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
		Ok(self.inner.lock().unwrap().transactions.get(id).cloned())
	}

	async fn find_transaction_by_external_id(
		&self,
		external_id: &str,
	) -> Result<Option<Transaction>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.transactions
			.values()
			.find(|t| t.external_id == external_id)
			.cloned())
	}

	async fn list_transactions_for_account(
		&self,
		account_id: &str,
	) -> Result<Vec<Transaction>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.transactions
			.values()
			.filter(|t| t.account_id == account_id)
			.cloned()
			.collect())
	}

	async fn list_children(
		&self,
		parent_transaction_id: &str,
	) -> Result<Vec<Transaction>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.transactions
			.values()
			.filter(|t| t.parent_transaction_id.as_deref() == Some(parent_transaction_id))
			.cloned()
			.collect())
	}

	async fn delete_transaction(&self, id: &str) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.transactions
			.remove(id)
			.map(|_| ())
			.ok_or_else(|| StoreError::NotFound(id.to_string()))
	}

	async fn put_category(&self, category: Category) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.categories
			.insert(category.id.clone(), category);
		Ok(())
	}

	async fn put_subcategory(&self, subcategory: Subcategory) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.subcategories
			.insert(subcategory.id.clone(), subcategory);
		Ok(())
	}

	async fn category_set(&self) -> Result<CategorySet, StoreError> {
		let inner = self.inner.lock().unwrap();
		let mut categories: Vec<Category> = inner.categories.values().cloned().collect();
		let mut subcategories: Vec<Subcategory> = inner.subcategories.values().cloned().collect();
		categories.sort_by_key(|c| c.sort_order);
		subcategories.sort_by_key(|s| s.sort_order);
		Ok(CategorySet {
			categories,
			subcategories,
		})
	}

	async fn put_tag(&self, tag: Tag) -> Result<(), StoreError> {
		self.inner.lock().unwrap().tags.insert(tag.id.clone(), tag);
		Ok(())
	}

	async fn put_tag_link(&self, link: TagLink) -> Result<(), StoreError> {
		let mut inner = self.inner.lock().unwrap();
		if !inner.tag_links.contains(&link) {
			inner.tag_links.push(link);
		}
		Ok(())
	}

	async fn list_tag_links_for_transaction(
		&self,
		transaction_id: &str,
	) -> Result<Vec<TagLink>, StoreError> {
		Ok(self
			.inner
			.lock()
			.unwrap()
			.tag_links
			.iter()
			.filter(|l| l.transaction_id == transaction_id)
			.cloned()
			.collect())
	}

	async fn delete_tag_links_for_transaction(
		&self,
		transaction_id: &str,
	) -> Result<(), StoreError> {
		self.inner
			.lock()
			.unwrap()
			.tag_links
			.retain(|l| l.transaction_id != transaction_id);
		Ok(())
	}
}
