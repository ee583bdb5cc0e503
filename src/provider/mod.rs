/// HTTP client for the provider API
pub mod client;
/// Wire types and the provider error taxonomy
pub mod types;

pub use client::PlaidClient;
pub use types::*;

/// Seam over the provider API consumed by the sync engine and the
/// reconnection coordinator. Implemented by `PlaidClient`; test doubles stand
/// in behind it.
#[async_trait::async_trait]
pub trait ProviderApi: Send + Sync {
	async fn transactions_sync(
		&self,
		access_token: &str,
		cursor: Option<&str>,
		count: u32,
	) -> Result<TransactionsSyncPage, ProviderError>;

	async fn accounts_get(&self, access_token: &str) -> Result<Vec<ProviderAccount>, ProviderError>;

	async fn exchange_public_token(
		&self,
		public_token: &str,
	) -> Result<TokenExchange, ProviderError>;

	async fn item_get(&self, access_token: &str) -> Result<ProviderItem, ProviderError>;
}
