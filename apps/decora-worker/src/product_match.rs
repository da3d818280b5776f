//! Runs one product-matching batch: for every purchasable recommendation
//! item, search the configured storefront and attach the best match.
//!
//! Matching is best-effort end to end. Per-item failures are logged and
//! skipped, and the batch itself always completes; there is no failed state
//! to get stuck in.

use color_eyre::Result;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use decora_config::ShoppingProviderConfig;
use decora_domain::{
	job::ProductMatchStatus,
	pricing::Usage,
	recommendation::{MatchedProduct, RecommendationItem, strip_style_adjectives},
};
use decora_providers::{
	retry::{self, RetryPolicy},
	shopping::{ShoppingResult, link_matches_domain},
};
use decora_service::{DesignService, TrackUsage};
use decora_storage::jobs;

use crate::worker::WorkerState;

pub(crate) async fn run(state: &WorkerState, match_id: Uuid) -> Result<()> {
	let svc = &state.service;
	let Some(job) = jobs::fetch_product_match(&svc.db, match_id).await? else {
		tracing::warn!(%match_id, "Product match job vanished before it ran.");

		return Ok(());
	};

	match ProductMatchStatus::parse(&job.status) {
		Some(ProductMatchStatus::Pending) => {
			jobs::start_product_match(&svc.db, match_id).await?;
		},
		Some(ProductMatchStatus::Searching) => {},
		_ => return Ok(()),
	}

	let recommendation = jobs::fetch_recommendation(&svc.db, job.recommendation_id).await?;
	let items = recommendation.as_ref().and_then(|rec| rec.items.clone());
	let (Some(recommendation), Some(items)) = (recommendation, items) else {
		tracing::warn!(%match_id, "Recommendation items are gone. Completing an empty batch.");
		jobs::complete_product_match(&svc.db, match_id, &json!([]), OffsetDateTime::now_utc())
			.await?;

		return Ok(());
	};
	let Some(shopping_cfg) = svc.cfg.providers.shopping.clone() else {
		tracing::warn!(%match_id, "Shopping provider is no longer configured. Completing an empty batch.");
		jobs::complete_product_match(&svc.db, match_id, &json!([]), OffsetDateTime::now_utc())
			.await?;

		return Ok(());
	};
	let mut items: Vec<RecommendationItem> = match serde_json::from_value(items) {
		Ok(items) => items,
		Err(err) => {
			tracing::warn!(%match_id, error = %err, "Stored items do not parse. Completing an empty batch.");
			jobs::complete_product_match(&svc.db, match_id, &json!([]), OffsetDateTime::now_utc())
				.await?;

			return Ok(());
		},
	};
	let policy = RetryPolicy::shopping_from_limits(&svc.cfg.limits);
	let mut outcomes = Vec::with_capacity(items.len());
	let mut api_calls = 0_u64;

	for item in &mut items {
		if !item.category.is_purchasable() {
			continue;
		}

		let query = search_query(&item.title);
		let searched = retry::with_retry(policy, "product_search", || {
			svc.providers.shopping.search(&shopping_cfg, &query)
		})
		.await;

		api_calls += 1;

		let results = match searched {
			Ok(results) => results,
			Err(err) => {
				tracing::warn!(item_id = item.id.as_str(), error = %err, "Product search failed. Skipping item.");
				outcomes.push(json!({ "item_id": item.id, "matched": false }));

				continue;
			},
		};
		let matched =
			resolve_match(svc, &shopping_cfg, &results, &policy, &mut api_calls).await;

		match matched {
			Some(product) => {
				outcomes.push(json!({
					"item_id": item.id,
					"matched": true,
					"url": product.url,
				}));

				item.matched_product = Some(product);
			},
			None => {
				outcomes.push(json!({ "item_id": item.id, "matched": false }));
			},
		}
	}

	// The recommendation may have been regenerated while the batch ran; the
	// guarded update simply misses in that case and the stale batch result is
	// dropped.
	if !jobs::update_recommendation_items(
		&svc.db,
		recommendation.recommendation_id,
		&serde_json::to_value(&items)?,
	)
	.await?
	{
		tracing::warn!(
			recommendation_id = %recommendation.recommendation_id,
			"Recommendation changed under the batch. Discarding matches.",
		);
	}

	jobs::complete_product_match(&svc.db, match_id, &json!(outcomes), OffsetDateTime::now_utc())
		.await?;

	if api_calls > 0 {
		svc.track_usage_quietly(TrackUsage {
			provider: shopping_cfg.provider_id.clone(),
			model: shopping_cfg.model.clone(),
			operation: "product_match".to_string(),
			status: "success".to_string(),
			usage: Usage { input_tokens: 0, output_tokens: 0, units: api_calls },
			room_id: Some(recommendation.room_id),
			project_id: None,
			user_id: None,
			error: None,
		})
		.await;
	}

	Ok(())
}

/// Style adjectives hurt storefront search relevance; a title that is nothing
/// but adjectives falls back to the raw title.
fn search_query(title: &str) -> String {
	let stripped = strip_style_adjectives(title);

	if stripped.trim().is_empty() { title.to_string() } else { stripped }
}

/// Picks the first result that resolves to a storefront link: a direct link
/// on the result itself, or a product-detail lookup for indirect results.
async fn resolve_match(
	svc: &DesignService,
	cfg: &ShoppingProviderConfig,
	results: &[ShoppingResult],
	policy: &RetryPolicy,
	api_calls: &mut u64,
) -> Option<MatchedProduct> {
	for result in results {
		if let Some(link) = &result.link
			&& link_matches_domain(link, &cfg.storefront_domain)
		{
			return Some(matched_product(result, link.clone()));
		}
	}

	for result in results {
		let Some(product_id) = &result.product_id else {
			continue;
		};
		let detail = retry::with_retry(*policy, "product_detail", || {
			svc.providers.shopping.product_detail(cfg, product_id)
		})
		.await;

		*api_calls += 1;

		match detail {
			Ok(Some(link)) => return Some(matched_product(result, link)),
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(product_id = product_id.as_str(), error = %err, "Product detail lookup failed.");
			},
		}
	}

	None
}

fn matched_product(result: &ShoppingResult, url: String) -> MatchedProduct {
	MatchedProduct {
		name: result.title.clone(),
		price: result.price.clone(),
		image_url: result.thumbnail.clone(),
		url,
		fetched_at: OffsetDateTime::now_utc(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn query_strips_style_adjectives() {
		assert_eq!(search_query("Modern Scandinavian floor lamp"), "floor lamp");
	}

	#[test]
	fn all_adjective_titles_fall_back_to_the_raw_title() {
		assert_eq!(search_query("Modern minimalist"), "Modern minimalist");
	}

	#[test]
	fn matched_product_copies_the_result_fields() {
		let result = ShoppingResult {
			title: "BILLY bookcase".to_string(),
			price: Some("$79.99".to_string()),
			thumbnail: Some("https://cdn.example/thumb.jpg".to_string()),
			link: None,
			product_id: Some("123".to_string()),
			source: Some("IKEA".to_string()),
		};
		let product = matched_product(&result, "https://www.ikea.com/p/billy".to_string());

		assert_eq!(product.name, "BILLY bookcase");
		assert_eq!(product.price.as_deref(), Some("$79.99"));
		assert_eq!(product.url, "https://www.ikea.com/p/billy");
	}
}
