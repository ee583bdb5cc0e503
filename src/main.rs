use chrono::Utc;
use ledger_sync::categorize::{Categorizer, ModelCategorizer, NoopCategorizer};
use ledger_sync::ledger::memory::InMemoryLedgerStore;
use ledger_sync::ledger::{Account, BalanceSnapshot, Item, ItemStatus, LedgerStore, new_row_id};
use ledger_sync::provider::PlaidClient;
use ledger_sync::sync::locks::ItemLocks;
use ledger_sync::sync::{SyncConfig, SyncEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SYNC_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting ledger sync service");

	let base_url =
		std::env::var("PLAID_ENV_URL").unwrap_or_else(|_| "https://sandbox.plaid.com".to_string());
	let client_id = match std::env::var("PLAID_CLIENT_ID") {
		Ok(value) => value,
		Err(_) => {
			error!("PLAID_CLIENT_ID is not set");
			return;
		}
	};
	let secret = match std::env::var("PLAID_SECRET") {
		Ok(value) => value,
		Err(_) => {
			error!("PLAID_SECRET is not set");
			return;
		}
	};

	let provider = Arc::new(PlaidClient::new(base_url, client_id, secret));
	let store = Arc::new(InMemoryLedgerStore::new());
	let locks = Arc::new(ItemLocks::new());

	let categorizer: Arc<dyn Categorizer> = match (
		std::env::var("MODEL_ENDPOINT"),
		std::env::var("MODEL_API_KEY"),
	) {
		(Ok(endpoint), Ok(api_key)) => {
			let model = std::env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string());
			info!("Using model categorizer via {}", endpoint);
			Arc::new(ModelCategorizer::new(endpoint, api_key, model))
		}
		_ => {
			info!("No model endpoint configured, categorization disabled");
			Arc::new(NoopCategorizer)
		}
	};

	let engine = Arc::new(SyncEngine::new(
		provider.clone(),
		store.clone(),
		categorizer,
		locks,
		SyncConfig::default(),
	));

	// A pre-linked item can be injected for local runs; the real application
	// creates items through its link flow.
	if let Ok(access_token) = std::env::var("PLAID_ACCESS_TOKEN") {
		if let Err(e) = seed_item(provider.as_ref(), store.as_ref(), access_token).await {
			error!("Failed to seed pre-linked item: {}", e);
			return;
		}
	}

	let mut ticker = tokio::time::interval(SYNC_INTERVAL);
	loop {
		ticker.tick().await;

		match engine.sync_all_items().await {
			Ok(results) => {
				for (item_id, result) in results {
					match result {
						Ok(stats) => info!("Item {}: {}", item_id, stats.summary()),
						Err(e) => error!("Item {} sync failed: {}", item_id, e),
					}
				}
			}
			Err(e) => error!("Failed to list items: {}", e),
		}
	}
}

/// Register an already-linked item and its accounts so the sync loop has
/// something to chew on.
async fn seed_item(
	provider: &PlaidClient,
	store: &InMemoryLedgerStore,
	access_token: String,
) -> Result<(), Box<dyn std::error::Error>> {
	let provider_item = provider.item_get(&access_token).await?;
	let accounts = provider.accounts_get(&access_token).await?;
	let now = Utc::now();

	let item = Item {
		id: new_row_id(),
		external_item_id: provider_item.item_id,
		access_token,
		institution_id: provider_item.institution_id.unwrap_or_default(),
		institution_name: provider_item
			.institution_name
			.unwrap_or_else(|| "Unknown institution".to_string()),
		status: ItemStatus::Active,
		transactions_cursor: None,
		investments_cursor: None,
		created_at: now,
		updated_at: now,
	};
	let item_id = item.id.clone();
	store.put_item(item).await?;

	for account in &accounts {
		store
			.put_account(Account {
				id: new_row_id(),
				item_id: item_id.clone(),
				external_account_id: account.account_id.clone(),
				name: account.name.clone(),
				official_name: account.official_name.clone(),
				mask: account.mask.clone(),
				kind: account.kind.clone(),
				subkind: account.subtype.clone(),
				currency: account.balances.iso_currency_code.clone(),
				balance: BalanceSnapshot {
					current: account.balances.current,
					available: account.balances.available,
					limit: account.balances.limit,
					as_of: Some(now),
				},
			})
			.await?;
	}

	info!("Seeded item {} with {} accounts", item_id, accounts.len());
	Ok(())
}
