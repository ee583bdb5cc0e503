//!
//! HTTP client for the aggregation provider's JSON API.
//!
//! All endpoints are POST with credentials carried in the request body. The
//! client maps non-2xx responses onto the `ProviderError` taxonomy so callers
//! can distinguish dead credentials from transient failures.

use super::types::*;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Aggregation provider API client
#[derive(Clone)]
pub struct PlaidClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the provider environment (sandbox, development, production).
	base_url: String,
	client_id: String,
	secret: String,
}

impl PlaidClient {
	/// Create a new provider client.
	///
	/// # Arguments
	/// * `base_url` - The environment base URL, without a trailing slash.
	/// * `client_id` / `secret` - API credentials, sent in every request body.
	pub fn new(base_url: String, client_id: String, secret: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			base_url,
			client_id,
			secret,
		}
	}

	/// Execute one POST request and map the response onto the error taxonomy.
	async fn post(
		&self,
		path: &str,
		mut body: serde_json::Value,
	) -> Result<serde_json::Value, ProviderError> {
		if let Some(map) = body.as_object_mut() {
			map.insert("client_id".to_string(), json!(self.client_id));
			map.insert("secret".to_string(), json!(self.secret));
		}

		debug!("POST {}{}", self.base_url, path);

		let response = self
			.http_client
			.post(format!("{}{}", self.base_url, path))
			.header("Content-Type", "application/json")
			.json(&body)
			.send()
			.await?;

		let status = response.status();
		if status.as_u16() == 429 {
			return Err(ProviderError::RateLimited);
		}
		if status.is_server_error() {
			return Err(ProviderError::Unavailable(status.as_u16()));
		}
		if !status.is_success() {
			let text = response.text().await?;
			return match serde_json::from_str::<ProviderErrorBody>(&text) {
				Ok(envelope) => Err(classify_error_body(envelope)),
				Err(_) => Err(ProviderError::Api {
					code: status.to_string(),
					message: text,
				}),
			};
		}

		Ok(response.json().await?)
	}

	/// Fetch one page of the incremental transactions feed.
	///
	/// # Arguments
	/// * `access_token` - The item's access credential.
	/// * `cursor` - Resumption token from the prior page; `None` on first sync.
	/// * `count` - Maximum rows per page.
	pub async fn transactions_sync(
		&self,
		access_token: &str,
		cursor: Option<&str>,
		count: u32,
	) -> Result<TransactionsSyncPage, ProviderError> {
		let response = self
			.post(
				"/transactions/sync",
				json!({
					"access_token": access_token,
					"cursor": cursor,
					"count": count,
				}),
			)
			.await?;

		Ok(serde_json::from_value(response)?)
	}

	/// Fetch the item's current account list with balance snapshots.
	pub async fn accounts_get(
		&self,
		access_token: &str,
	) -> Result<Vec<ProviderAccount>, ProviderError> {
		let response = self
			.post("/accounts/get", json!({ "access_token": access_token }))
			.await?;

		let accounts = response
			.get("accounts")
			.cloned()
			.ok_or_else(|| ProviderError::Api {
				code: "MALFORMED_RESPONSE".to_string(),
				message: "accounts/get response missing accounts".to_string(),
			})?;

		Ok(serde_json::from_value(accounts)?)
	}

	/// Exchange a short-lived public token for a long-lived access credential.
	pub async fn exchange_public_token(
		&self,
		public_token: &str,
	) -> Result<TokenExchange, ProviderError> {
		let response = self
			.post(
				"/item/public_token/exchange",
				json!({ "public_token": public_token }),
			)
			.await?;

		Ok(serde_json::from_value(response)?)
	}

	/// Fetch item metadata (external item id and owning institution).
	pub async fn item_get(&self, access_token: &str) -> Result<ProviderItem, ProviderError> {
		let response = self
			.post("/item/get", json!({ "access_token": access_token }))
			.await?;

		let item = response
			.get("item")
			.cloned()
			.ok_or_else(|| ProviderError::Api {
				code: "MALFORMED_RESPONSE".to_string(),
				message: "item/get response missing item".to_string(),
			})?;

		Ok(serde_json::from_value(item)?)
	}
}

#[async_trait::async_trait]
impl super::ProviderApi for PlaidClient {
	async fn transactions_sync(
		&self,
		access_token: &str,
		cursor: Option<&str>,
		count: u32,
	) -> Result<TransactionsSyncPage, ProviderError> {
		PlaidClient::transactions_sync(self, access_token, cursor, count).await
	}

	async fn accounts_get(&self, access_token: &str) -> Result<Vec<ProviderAccount>, ProviderError> {
		PlaidClient::accounts_get(self, access_token).await
	}

	async fn exchange_public_token(
		&self,
		public_token: &str,
	) -> Result<TokenExchange, ProviderError> {
		PlaidClient::exchange_public_token(self, public_token).await
	}

	async fn item_get(&self, access_token: &str) -> Result<ProviderItem, ProviderError> {
		PlaidClient::item_get(self, access_token).await
	}
}
