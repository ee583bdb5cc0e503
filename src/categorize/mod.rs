//! Best-effort categorization assistant.
//!
//! Everything in this module is advisory: a classifier may suggest a category
//! for a transaction, but it never blocks the operation that invoked it. The
//! sync engine swallows classifier errors and leaves rows uncategorized;
//! manual assignment always remains available and always wins on conflict.

use crate::ledger::{CategorySet, Transaction};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Confidence assigned to model-sourced suggestions. The engine's threshold
/// decides whether they are applied.
const MODEL_CONFIDENCE: f32 = 0.75;

/// A suggested category assignment with a confidence score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CategorySuggestion {
	pub category_id: String,
	pub subcategory_id: Option<String>,
	pub confidence: f32,
}

/// Error types for classification attempts
#[derive(Debug, thiserror::Error)]
pub enum CategorizeError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("model endpoint error: {0}")]
	Endpoint(String),
}

/// Trait for transaction classifiers.
///
/// `Ok(None)` means "no suggestion"; an `Err` is a failed attempt, which
/// callers treat the same way.
#[async_trait::async_trait]
pub trait Categorizer: Send + Sync {
	async fn classify(
		&self,
		transaction: &Transaction,
		categories: &CategorySet,
	) -> Result<Option<CategorySuggestion>, CategorizeError>;
}

/// Classifier that never suggests anything. Used where sync correctness is
/// under test and categorization must stay out of the way.
pub struct NoopCategorizer;

#[async_trait::async_trait]
impl Categorizer for NoopCategorizer {
	async fn classify(
		&self,
		_transaction: &Transaction,
		_categories: &CategorySet,
	) -> Result<Option<CategorySuggestion>, CategorizeError> {
		Ok(None)
	}
}

/// How a rule pattern is matched against transaction text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
	Contains,
	StartsWith,
}

/// One keyword rule. Rules are evaluated in order; the first match wins.
#[derive(Debug, Clone)]
pub struct CategoryRule {
	pub pattern: String,
	pub match_kind: RuleMatch,
	/// Category name, resolved against the user's set at classification time.
	pub category: String,
	pub subcategory: Option<String>,
}

/// Keyword-rule classifier over merchant name, description, and provider
/// category strings.
pub struct RuleCategorizer {
	rules: Vec<CategoryRule>,
}

impl RuleCategorizer {
	pub fn new(rules: Vec<CategoryRule>) -> Self {
		Self { rules }
	}

	fn matches(text: &str, rule: &CategoryRule) -> bool {
		let text_upper = text.to_uppercase();
		let pattern_upper = rule.pattern.to_uppercase();
		match rule.match_kind {
			RuleMatch::Contains => text_upper.contains(&pattern_upper),
			RuleMatch::StartsWith => text_upper.starts_with(&pattern_upper),
		}
	}

	fn haystacks(transaction: &Transaction) -> Vec<&str> {
		let mut texts = vec![transaction.name.as_str()];
		if let Some(merchant) = &transaction.merchant_name {
			texts.push(merchant.as_str());
		}
		texts.extend(transaction.provider_categories.iter().map(String::as_str));
		texts
	}
}

#[async_trait::async_trait]
impl Categorizer for RuleCategorizer {
	async fn classify(
		&self,
		transaction: &Transaction,
		categories: &CategorySet,
	) -> Result<Option<CategorySuggestion>, CategorizeError> {
		let texts = Self::haystacks(transaction);

		for rule in &self.rules {
			if !texts.iter().any(|t| Self::matches(t, rule)) {
				continue;
			}
			let Some(category) = categories.find_category(&rule.category) else {
				debug!(
					"Rule '{}' names unknown category '{}', skipping",
					rule.pattern, rule.category
				);
				continue;
			};
			let subcategory_id = rule
				.subcategory
				.as_deref()
				.and_then(|name| categories.find_subcategory_of(&category.id, name))
				.map(|s| s.id.clone());
			return Ok(Some(CategorySuggestion {
				category_id: category.id.clone(),
				subcategory_id,
				confidence: 1.0,
			}));
		}

		Ok(None)
	}
}

/// Classifier backed by an OpenAI-compatible chat-completions endpoint.
///
/// The model is asked for a single category name (optionally
/// `category / subcategory`) out of the user's set. Malformed or unknown
/// replies yield no suggestion; only transport failures surface as errors,
/// and the invoking operation swallows those too.
pub struct ModelCategorizer {
	http_client: Client,
	endpoint: String,
	api_key: String,
	model: String,
}

impl ModelCategorizer {
	pub fn new(endpoint: String, api_key: String, model: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			endpoint,
			api_key,
			model,
		}
	}

	fn prompt(transaction: &Transaction, categories: &CategorySet) -> String {
		let names: Vec<String> = categories
			.categories
			.iter()
			.map(|c| {
				let subs: Vec<&str> = categories
					.subcategories
					.iter()
					.filter(|s| s.category_id == c.id)
					.map(|s| s.name.as_str())
					.collect();
				if subs.is_empty() {
					c.name.clone()
				} else {
					format!("{} ({})", c.name, subs.join(", "))
				}
			})
			.collect();

		format!(
			"Pick the best matching category for this bank transaction.\n\
			Description: {}\nMerchant: {}\nAmount: {:.2}\nProvider labels: {}\n\
			Allowed categories (subcategories in parentheses): {}\n\
			Reply with only the category name, or 'Category / Subcategory', or NONE.",
			transaction.name,
			transaction.merchant_name.as_deref().unwrap_or("unknown"),
			transaction.amount,
			transaction.provider_categories.join(", "),
			names.join("; "),
		)
	}

	/// Resolve the model's one-line reply against the category set.
	fn parse_reply(reply: &str, categories: &CategorySet) -> Option<CategorySuggestion> {
		let line = reply.lines().next()?.trim().trim_matches('"');
		if line.is_empty() || line.eq_ignore_ascii_case("none") {
			return None;
		}

		let (category_name, subcategory_name) = match line.split_once('/') {
			Some((c, s)) => (c.trim(), Some(s.trim())),
			None => (line, None),
		};

		let category = categories.find_category(category_name)?;
		let subcategory_id = subcategory_name
			.and_then(|name| categories.find_subcategory_of(&category.id, name))
			.map(|s| s.id.clone());

		Some(CategorySuggestion {
			category_id: category.id.clone(),
			subcategory_id,
			confidence: MODEL_CONFIDENCE,
		})
	}
}

#[async_trait::async_trait]
impl Categorizer for ModelCategorizer {
	async fn classify(
		&self,
		transaction: &Transaction,
		categories: &CategorySet,
	) -> Result<Option<CategorySuggestion>, CategorizeError> {
		if categories.categories.is_empty() {
			return Ok(None);
		}

		let body = json!({
			"model": self.model,
			"messages": [{ "role": "user", "content": Self::prompt(transaction, categories) }],
			"temperature": 0,
		});

		let response = self
			.http_client
			.post(&self.endpoint)
			.bearer_auth(&self.api_key)
			.json(&body)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			return Err(CategorizeError::Endpoint(format!("HTTP {}", status)));
		}

		let payload: serde_json::Value = response.json().await?;
		let Some(content) = payload
			.get("choices")
			.and_then(|c| c.get(0))
			.and_then(|c| c.get("message"))
			.and_then(|m| m.get("content"))
			.and_then(|c| c.as_str())
		else {
			debug!("Model reply missing content, leaving uncategorized");
			return Ok(None);
		};

		Ok(Self::parse_reply(content, categories))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::{Category, CategoryGroup, Subcategory, new_row_id};
	use chrono::{NaiveDate, Utc};
	use pretty_assertions::assert_eq;

	fn category_set() -> CategorySet {
		CategorySet {
			categories: vec![
				Category {
					id: "cat-food".to_string(),
					name: "Food".to_string(),
					group: CategoryGroup::Expenses,
					sort_order: 0,
				},
				Category {
					id: "cat-transport".to_string(),
					name: "Transport".to_string(),
					group: CategoryGroup::Expenses,
					sort_order: 1,
				},
			],
			subcategories: vec![Subcategory {
				id: "sub-coffee".to_string(),
				category_id: "cat-food".to_string(),
				name: "Coffee".to_string(),
				sort_order: 0,
			}],
		}
	}

	fn transaction(name: &str, merchant: Option<&str>) -> Transaction {
		Transaction {
			id: new_row_id(),
			account_id: "acc-1".to_string(),
			external_id: new_row_id(),
			amount: -4.5,
			currency: Some("USD".to_string()),
			date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
			authorized_date: None,
			name: name.to_string(),
			merchant_name: merchant.map(|m| m.to_string()),
			provider_categories: vec![],
			category_id: None,
			subcategory_id: None,
			pending: false,
			is_manual: false,
			is_split: false,
			parent_transaction_id: None,
			original_transaction_id: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[tokio::test]
	async fn rule_match_is_case_insensitive_and_ordered() {
		let categorizer = RuleCategorizer::new(vec![
			CategoryRule {
				pattern: "uber".to_string(),
				match_kind: RuleMatch::Contains,
				category: "Transport".to_string(),
				subcategory: None,
			},
			CategoryRule {
				pattern: "UBER EATS".to_string(),
				match_kind: RuleMatch::StartsWith,
				category: "Food".to_string(),
				subcategory: None,
			},
		]);

		// The broader "uber" rule comes first, so it wins even for Uber Eats.
		let suggestion = categorizer
			.classify(&transaction("Uber Eats Amsterdam", None), &category_set())
			.await
			.unwrap()
			.unwrap();
		assert_eq!("cat-transport", suggestion.category_id);
	}

	#[tokio::test]
	async fn rule_matches_merchant_and_resolves_subcategory() {
		let categorizer = RuleCategorizer::new(vec![CategoryRule {
			pattern: "starbucks".to_string(),
			match_kind: RuleMatch::Contains,
			category: "Food".to_string(),
			subcategory: Some("Coffee".to_string()),
		}]);

		let suggestion = categorizer
			.classify(
				&transaction("POS purchase 4421", Some("STARBUCKS #2231")),
				&category_set(),
			)
			.await
			.unwrap()
			.unwrap();
		assert_eq!("cat-food", suggestion.category_id);
		assert_eq!(Some("sub-coffee".to_string()), suggestion.subcategory_id);
	}

	#[tokio::test]
	async fn unknown_rule_category_yields_no_suggestion() {
		let categorizer = RuleCategorizer::new(vec![CategoryRule {
			pattern: "rent".to_string(),
			match_kind: RuleMatch::Contains,
			category: "Housing".to_string(),
			subcategory: None,
		}]);

		let suggestion = categorizer
			.classify(&transaction("RENT MARCH", None), &category_set())
			.await
			.unwrap();
		assert!(suggestion.is_none());
	}

	#[test]
	fn model_reply_parses_category_and_subcategory() {
		let set = category_set();

		let suggestion = ModelCategorizer::parse_reply("Food / Coffee", &set).unwrap();
		assert_eq!("cat-food", suggestion.category_id);
		assert_eq!(Some("sub-coffee".to_string()), suggestion.subcategory_id);

		let suggestion = ModelCategorizer::parse_reply("transport\n", &set).unwrap();
		assert_eq!("cat-transport", suggestion.category_id);
		assert_eq!(None, suggestion.subcategory_id);
	}

	#[test]
	fn model_reply_none_or_unknown_yields_nothing() {
		let set = category_set();
		assert!(ModelCategorizer::parse_reply("NONE", &set).is_none());
		assert!(ModelCategorizer::parse_reply("Groceries", &set).is_none());
		assert!(ModelCategorizer::parse_reply("", &set).is_none());
	}
}
