//! Split-transaction manager.
//!
//! A split decomposes one transaction into child rows that carry the actual
//! category and amount detail, for receipt-based or manual splitting. The tree
//! is one level deep: a split child is never itself split. The parent keeps
//! its row but is excluded from amount aggregation once `is_split` is set.
//!
//! Child amounts should approximate the parent's amount, but receipt totals
//! (tax, tip, rounding) rarely match exactly, so the tolerance check is
//! advisory: the operation proceeds and the caller surfaces a warning.

use crate::ledger::{LedgerStore, StoreError, Transaction, new_row_id};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for the advisory split tolerance.
///
/// A split is flagged when the absolute difference between `|sum(children)|`
/// and `|parent|` exceeds `max(tolerance_floor, tolerance_ratio * |parent|)`.
#[derive(Debug, Clone)]
pub struct SplitConfig {
	pub tolerance_ratio: f64,
	pub tolerance_floor: f64,
}

impl Default for SplitConfig {
	fn default() -> Self {
		Self {
			tolerance_ratio: 0.02,
			tolerance_floor: 0.02,
		}
	}
}

/// Error types for split operations
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
	#[error("transaction not found: {0}")]
	NotFound(String),

	#[error("transaction {0} is already split")]
	AlreadySplit(String),

	#[error("transaction {0} is not split")]
	NotSplit(String),

	#[error("transaction {0} is a split child and cannot be split again")]
	SplitChild(String),

	#[error("a split needs at least one part")]
	EmptySplits,

	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

/// One requested child of a split
#[derive(Debug, Clone)]
pub struct SplitPart {
	pub amount: f64,
	pub description: Option<String>,
	pub category_id: Option<String>,
	pub subcategory_id: Option<String>,
}

/// Result of a successful split
#[derive(Debug, Clone)]
pub struct SplitOutcome {
	pub parent_id: String,
	pub child_ids: Vec<String>,
	/// The child amounts drifted past the configured tolerance. Advisory: the
	/// split was still applied, the caller decides whether to warn the user.
	pub tolerance_exceeded: bool,
}

/// Manager for split-transaction trees
pub struct SplitManager {
	store: Arc<dyn LedgerStore>,
	config: SplitConfig,
}

impl SplitManager {
	pub fn new(store: Arc<dyn LedgerStore>, config: SplitConfig) -> Self {
		Self { store, config }
	}

	/// Split a transaction into child rows.
	///
	/// Rejects if the parent is already split, is itself a split child, or the
	/// part list is empty; no partial mutation on rejection. Children get a
	/// synthetic external id derived from the parent's so they can never
	/// collide with provider-issued ids, and inherit the parent's account,
	/// dates, currency, and merchant metadata.
	pub async fn split_transaction(
		&self,
		parent_id: &str,
		parts: Vec<SplitPart>,
	) -> Result<SplitOutcome, SplitError> {
		if parts.is_empty() {
			return Err(SplitError::EmptySplits);
		}

		let mut parent = self
			.store
			.get_transaction(parent_id)
			.await?
			.ok_or_else(|| SplitError::NotFound(parent_id.to_string()))?;

		if parent.is_split {
			return Err(SplitError::AlreadySplit(parent_id.to_string()));
		}
		if parent.is_split_child() {
			return Err(SplitError::SplitChild(parent_id.to_string()));
		}

		let child_sum: f64 = parts.iter().map(|p| p.amount).sum::<f64>().abs();
		let drift = (child_sum - parent.amount.abs()).abs();
		let allowed = self
			.config
			.tolerance_floor
			.max(self.config.tolerance_ratio * parent.amount.abs());
		let tolerance_exceeded = drift > allowed;
		if tolerance_exceeded {
			warn!(
				"Split of {} drifts {:.2} from the parent amount {:.2}",
				parent_id, drift, parent.amount
			);
		}

		let now = Utc::now();
		let mut child_ids = Vec::with_capacity(parts.len());
		for (index, part) in parts.into_iter().enumerate() {
			let child = Transaction {
				id: new_row_id(),
				account_id: parent.account_id.clone(),
				external_id: format!("{}:split:{}", parent.external_id, index + 1),
				amount: part.amount,
				currency: parent.currency.clone(),
				date: parent.date,
				authorized_date: parent.authorized_date,
				name: part.description.unwrap_or_else(|| parent.name.clone()),
				merchant_name: parent.merchant_name.clone(),
				provider_categories: parent.provider_categories.clone(),
				category_id: part.category_id,
				subcategory_id: part.subcategory_id,
				pending: parent.pending,
				is_manual: false,
				is_split: false,
				parent_transaction_id: Some(parent.id.clone()),
				original_transaction_id: Some(parent.id.clone()),
				created_at: now,
				updated_at: now,
			};
			child_ids.push(child.id.clone());
			self.store.put_transaction(child).await?;
		}

		parent.is_split = true;
		parent.updated_at = now;
		self.store.put_transaction(parent).await?;

		info!(
			"Split transaction {} into {} children",
			parent_id,
			child_ids.len()
		);

		Ok(SplitOutcome {
			parent_id: parent_id.to_string(),
			child_ids,
			tolerance_exceeded,
		})
	}

	/// Undo a split: hard-delete all direct children and clear the parent's
	/// flag. Destructive, no history is kept.
	pub async fn undo_split(&self, parent_id: &str) -> Result<(), SplitError> {
		let mut parent = self
			.store
			.get_transaction(parent_id)
			.await?
			.ok_or_else(|| SplitError::NotFound(parent_id.to_string()))?;

		if !parent.is_split {
			return Err(SplitError::NotSplit(parent_id.to_string()));
		}

		for child in self.store.list_children(&parent.id).await? {
			self.store
				.delete_tag_links_for_transaction(&child.id)
				.await?;
			self.store.delete_transaction(&child.id).await?;
		}

		parent.is_split = false;
		parent.updated_at = Utc::now();
		self.store.put_transaction(parent).await?;

		info!("Undid split of transaction {}", parent_id);
		Ok(())
	}

	/// Detach every split child under the item's accounts, turning each into
	/// an independent manual row. Used during reconnection, right before the
	/// (about-to-be-deleted) parents go away, so the user's categorization
	/// work survives.
	pub async fn convert_children_to_manual(&self, item_id: &str) -> Result<usize, SplitError> {
		let mut converted = 0;

		for account in self.store.list_accounts_for_item(item_id).await? {
			for mut row in self
				.store
				.list_transactions_for_account(&account.id)
				.await?
			{
				if row.parent_transaction_id.is_none() {
					continue;
				}
				row.parent_transaction_id = None;
				row.is_manual = true;
				row.updated_at = Utc::now();
				self.store.put_transaction(row).await?;
				converted += 1;
			}
		}

		if converted > 0 {
			info!(
				"Converted {} split children to manual rows for item {}",
				converted, item_id
			);
		}
		Ok(converted)
	}
}
