//! Domain model for the ledger: connected items, their accounts, transactions,
//! and the user's category/tag taxonomy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a connected item, driven by provider webhooks and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
	Active,
	Error,
	PendingExpiration,
	PendingDisconnect,
}

/// A single connected financial-institution login.
///
/// The access token and external item id are replaced wholesale on reconnection;
/// both cursors are cleared on reconnection to force a full resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
	pub id: String,
	pub external_item_id: String,
	pub access_token: String,
	pub institution_id: String,
	pub institution_name: String,
	pub status: ItemStatus,
	pub transactions_cursor: Option<String>,
	pub investments_cursor: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Point-in-time balance fields refreshed by periodic sync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
	pub current: Option<f64>,
	pub available: Option<f64>,
	pub limit: Option<f64>,
	pub as_of: Option<DateTime<Utc>>,
}

/// A bank or brokerage account under an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
	pub id: String,
	pub item_id: String,
	pub external_account_id: String,
	pub name: String,
	pub official_name: Option<String>,
	pub mask: Option<String>,
	pub kind: String,
	pub subkind: Option<String>,
	pub currency: Option<String>,
	pub balance: BalanceSnapshot,
}

impl Account {
	/// Matching signature used to pair existing rows with freshly fetched
	/// provider accounts after a reconnection. Institutions reissue external
	/// account ids, but name and mask survive the reissue.
	pub fn signature(&self) -> (String, Option<String>) {
		(self.name.to_lowercase(), self.mask.clone())
	}
}

/// A ledger transaction.
///
/// Negative amounts are outflows. `parent_transaction_id` forms a one-level
/// split tree: a row with a parent is never itself a split parent, enforced in
/// application logic rather than the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	pub id: String,
	pub account_id: String,
	/// Unique upsert key. Provider-sourced for synced rows, synthetic for
	/// split children and manual entries.
	pub external_id: String,
	pub amount: f64,
	pub currency: Option<String>,
	pub date: NaiveDate,
	pub authorized_date: Option<NaiveDate>,
	pub name: String,
	pub merchant_name: Option<String>,
	pub provider_categories: Vec<String>,
	pub category_id: Option<String>,
	pub subcategory_id: Option<String>,
	pub pending: bool,
	/// Manual rows are user-created or preserved through a reconnection and
	/// are immune to provider-driven deletion.
	pub is_manual: bool,
	/// Set once children exist; a split parent has no monetary effect of its
	/// own in aggregate views.
	pub is_split: bool,
	pub parent_transaction_id: Option<String>,
	pub original_transaction_id: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Transaction {
	pub fn is_split_child(&self) -> bool {
		self.parent_transaction_id.is_some()
	}
}

/// Top-level classification of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryGroup {
	Expenses,
	Income,
	Investment,
	Transfer,
}

/// User-defined category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
	pub id: String,
	pub name: String,
	pub group: CategoryGroup,
	pub sort_order: i32,
}

/// User-defined subcategory, belonging to exactly one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
	pub id: String,
	pub category_id: String,
	pub name: String,
	pub sort_order: i32,
}

/// User-defined label, many-to-many with transactions via `TagLink`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
	pub id: String,
	pub name: String,
	pub color: String,
}

/// Association row between a tag and a transaction, created and deleted
/// independently of the transaction lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLink {
	pub tag_id: String,
	pub transaction_id: String,
}

/// The user's full category taxonomy, loaded once per sync or classification
/// pass.
#[derive(Debug, Clone, Default)]
pub struct CategorySet {
	pub categories: Vec<Category>,
	pub subcategories: Vec<Subcategory>,
}

impl CategorySet {
	/// Case-insensitive exact lookup by category name.
	pub fn find_category(&self, name: &str) -> Option<&Category> {
		let needle = name.trim();
		self.categories
			.iter()
			.find(|c| c.name.eq_ignore_ascii_case(needle))
	}

	/// Case-insensitive exact lookup by subcategory name, across all categories.
	pub fn find_subcategory(&self, name: &str) -> Option<&Subcategory> {
		let needle = name.trim();
		self.subcategories
			.iter()
			.find(|s| s.name.eq_ignore_ascii_case(needle))
	}

	/// Case-insensitive exact lookup by subcategory name within one category.
	pub fn find_subcategory_of(&self, category_id: &str, name: &str) -> Option<&Subcategory> {
		let needle = name.trim();
		self.subcategories
			.iter()
			.find(|s| s.category_id == category_id && s.name.eq_ignore_ascii_case(needle))
	}
}
