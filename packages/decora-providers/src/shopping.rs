//! Shopping search used for best-effort product matching.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct ShoppingResult {
	pub title: String,
	pub price: Option<String>,
	pub thumbnail: Option<String>,
	/// Direct retailer link when the search engine exposes one.
	pub link: Option<String>,
	/// Indirect product page that a detail call can resolve to a seller link.
	pub product_id: Option<String>,
	pub source: Option<String>,
}

pub async fn search(
	cfg: &decora_config::ShoppingProviderConfig,
	query: &str,
) -> Result<Vec<ShoppingResult>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.get(url)
		.query(&[
			("engine", "google_shopping"),
			("q", query),
			("api_key", cfg.api_key.as_str()),
		])
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Status { status });
	}

	let json: Value = res.json().await?;

	parse_search_response(json)
}

/// Resolves an indirect product page to the first online seller link whose
/// domain matches `storefront_domain`, if any.
pub async fn product_detail(
	cfg: &decora_config::ShoppingProviderConfig,
	product_id: &str,
) -> Result<Option<String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.get(url)
		.query(&[
			("engine", "google_product"),
			("product_id", product_id),
			("api_key", cfg.api_key.as_str()),
		])
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Status { status });
	}

	let json: Value = res.json().await?;

	Ok(parse_detail_response(json, &cfg.storefront_domain))
}

pub fn link_matches_domain(link: &str, domain: &str) -> bool {
	let host = link
		.trim_start_matches("https://")
		.trim_start_matches("http://")
		.split('/')
		.next()
		.unwrap_or("");

	host == domain || host.ends_with(&format!(".{domain}"))
}

fn parse_search_response(json: Value) -> Result<Vec<ShoppingResult>> {
	let results = json
		.get("shopping_results")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::invalid_response("Shopping response is missing results."))?;
	let mut out = Vec::with_capacity(results.len());

	for item in results {
		let Some(title) = item.get("title").and_then(|v| v.as_str()) else {
			continue;
		};
		let string_field = |key: &str| {
			item.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
		};

		out.push(ShoppingResult {
			title: title.to_string(),
			price: string_field("price"),
			thumbnail: string_field("thumbnail"),
			link: string_field("link"),
			product_id: string_field("product_id"),
			source: string_field("source"),
		});
	}

	Ok(out)
}

fn parse_detail_response(json: Value, storefront_domain: &str) -> Option<String> {
	let sellers = json
		.get("sellers_results")
		.and_then(|v| v.get("online_sellers"))
		.and_then(|v| v.as_array())?;

	sellers
		.iter()
		.filter_map(|seller| seller.get("link").and_then(|v| v.as_str()))
		.find(|link| link_matches_domain(link, storefront_domain))
		.map(|link| link.to_string())
}
