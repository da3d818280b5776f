use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub limits: Limits,
	/// Per-model price overrides keyed by model name. Models absent here fall
	/// back to the hardcoded price table; models known to neither cost zero.
	#[serde(default)]
	pub pricing: HashMap<String, PriceOverride>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub objects: ObjectStoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Object storage is an external collaborator; only its store/get_url/delete
/// contract matters here.
#[derive(Debug, Deserialize)]
pub struct ObjectStoreConfig {
	pub api_base: String,
	pub api_token: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub chat: ChatProviderConfig,
	pub image: ImageProviderConfig,
	/// Optional. Product matching is skipped entirely when absent.
	pub shopping: Option<ShoppingProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ChatProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ImageProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ShoppingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	/// Results whose retailer link is outside this domain are discarded.
	pub storefront_domain: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
	pub analysis_per_hour: u32,
	pub recommendations_per_hour: u32,
	pub visualizations_per_hour: u32,
	pub window_secs: i64,
	pub max_retries: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
	/// Shopping lookups are best-effort enrichment and retry less.
	pub shopping_max_retries: u32,
}
impl Default for Limits {
	fn default() -> Self {
		Self {
			analysis_per_hour: 10,
			recommendations_per_hour: 20,
			visualizations_per_hour: 15,
			window_secs: 3_600,
			max_retries: 3,
			base_delay_ms: 1_000,
			max_delay_ms: 30_000,
			shopping_max_retries: 1,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PriceOverride {
	pub input_per_million: f64,
	pub output_per_million: f64,
	pub per_unit: f64,
}
