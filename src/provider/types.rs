//! Wire types for the aggregation provider's JSON API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Balance fields as reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderBalances {
	pub current: Option<f64>,
	pub available: Option<f64>,
	pub limit: Option<f64>,
	pub iso_currency_code: Option<String>,
}

/// An account as returned by the provider's account-metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
	pub account_id: String,
	pub name: String,
	pub official_name: Option<String>,
	pub mask: Option<String>,
	#[serde(rename = "type")]
	pub kind: String,
	pub subtype: Option<String>,
	#[serde(default)]
	pub balances: ProviderBalances,
}

/// A transaction row from the incremental feed. Amounts arrive signed,
/// negative for outflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTransaction {
	pub transaction_id: String,
	pub account_id: String,
	pub amount: f64,
	pub iso_currency_code: Option<String>,
	pub date: NaiveDate,
	pub authorized_date: Option<NaiveDate>,
	pub name: String,
	pub merchant_name: Option<String>,
	#[serde(default)]
	pub category: Vec<String>,
	#[serde(default)]
	pub pending: bool,
}

/// A removal notice from the incremental feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedTransaction {
	pub transaction_id: String,
}

/// One page of the provider's incremental transactions feed.
///
/// The cursor is a linear resumption token: each page's cursor depends on the
/// prior page's response, so pages must be fetched strictly in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionsSyncPage {
	#[serde(default)]
	pub added: Vec<ProviderTransaction>,
	#[serde(default)]
	pub modified: Vec<ProviderTransaction>,
	#[serde(default)]
	pub removed: Vec<RemovedTransaction>,
	pub next_cursor: String,
	pub has_more: bool,
}

/// Result of exchanging a public token for a long-lived access credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExchange {
	pub access_token: String,
	pub item_id: String,
}

/// Item metadata as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderItem {
	pub item_id: String,
	pub institution_id: Option<String>,
	pub institution_name: Option<String>,
}

/// The provider's error envelope, returned in the body of non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderErrorBody {
	pub error_type: String,
	pub error_code: String,
	pub error_message: String,
	pub request_id: Option<String>,
}

/// Error codes that mean the stored access credential is dead and the item
/// needs reauthentication or reconnection.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
	"ITEM_LOGIN_REQUIRED",
	"INVALID_ACCESS_TOKEN",
	"ITEM_LOCKED",
	"USER_PERMISSION_REVOKED",
];

/// Error types for provider API operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
	#[error("credential rejected by provider: {code}")]
	CredentialInvalid { code: String },

	#[error("provider rate limit hit")]
	RateLimited,

	#[error("provider unavailable: HTTP {0}")]
	Unavailable(u16),

	#[error("provider API error {code}: {message}")]
	Api { code: String, message: String },

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),
}

impl ProviderError {
	/// The stored credential is dead; syncing this item must stop until the
	/// user reauthenticates.
	pub fn is_credential_invalid(&self) -> bool {
		matches!(self, ProviderError::CredentialInvalid { .. })
	}

	/// Worth retrying with backoff.
	pub fn is_transient(&self) -> bool {
		match self {
			ProviderError::RateLimited | ProviderError::Unavailable(_) => true,
			ProviderError::Http(e) => {
				e.is_timeout()
					|| e.is_connect()
					|| e.status().map(|s| s.is_server_error()).unwrap_or(false)
			}
			_ => false,
		}
	}
}

/// Map a parsed error envelope onto the error taxonomy.
pub fn classify_error_body(body: ProviderErrorBody) -> ProviderError {
	if CREDENTIAL_ERROR_CODES.contains(&body.error_code.as_str()) {
		return ProviderError::CredentialInvalid {
			code: body.error_code,
		};
	}
	if body.error_code == "RATE_LIMIT_EXCEEDED" {
		return ProviderError::RateLimited;
	}
	ProviderError::Api {
		code: body.error_code,
		message: body.error_message,
	}
}
