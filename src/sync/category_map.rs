//! Deterministic mapping from provider category strings to the user's own
//! category set. Pure so it can be unit-tested without I/O.

use crate::ledger::CategorySet;

/// Resolved local category reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRef {
	pub category_id: String,
	pub subcategory_id: Option<String>,
}

/// Map the provider's category strings onto the user's set.
///
/// Matching is a case-insensitive exact comparison against names, trying
/// subcategories first (more specific, and a subcategory match pins down its
/// parent category too). Provider strings are tried in order; the first match
/// wins. No match leaves the row uncategorized.
pub fn map_provider_category(
	provider_categories: &[String],
	categories: &CategorySet,
) -> Option<CategoryRef> {
	for raw in provider_categories {
		let needle = raw.trim();
		if needle.is_empty() {
			continue;
		}
		if let Some(subcategory) = categories.find_subcategory(needle) {
			return Some(CategoryRef {
				category_id: subcategory.category_id.clone(),
				subcategory_id: Some(subcategory.id.clone()),
			});
		}
		if let Some(category) = categories.find_category(needle) {
			return Some(CategoryRef {
				category_id: category.id.clone(),
				subcategory_id: None,
			});
		}
	}
	None
}
