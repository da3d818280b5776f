use std::sync::Arc;

use decora_providers::shopping::ShoppingResult;
use decora_service::{
	GenerateAnalysisRequest, GenerateRecommendationsRequest, Providers,
};
use decora_domain::recommendation::{RecommendationItem, Tier};
use decora_storage::jobs;
use decora_worker::worker::process_outbox_once;

use super::{MemoryObjects, ScriptedChat, StubImage, StubShopping};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn successful_recommendations_trigger_storefront_matching() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping successful_recommendations_trigger_storefront_matching; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![
		ScriptedChat::json(super::analysis_payload()),
		ScriptedChat::json(super::quick_wins_payload()),
	]);
	let shopping = StubShopping {
		results: vec![
			ShoppingResult {
				title: "Somewhere-else lamp".to_string(),
				price: Some("$10.00".to_string()),
				thumbnail: None,
				link: Some("https://example.com/lamp".to_string()),
				product_id: None,
				source: Some("Other".to_string()),
			},
			ShoppingResult {
				title: "FADO table lamp".to_string(),
				price: Some("$24.99".to_string()),
				thumbnail: Some("https://cdn.test/fado.jpg".to_string()),
				link: Some("https://www.ikea.com/us/en/p/fado".to_string()),
				product_id: None,
				source: Some("IKEA".to_string()),
			},
		],
		detail_link: None,
	};
	let objects = MemoryObjects::default();
	let providers = Providers::new(
		Arc::new(chat),
		Arc::new(StubImage),
		Arc::new(shopping),
		Arc::new(objects),
	);
	let cfg = super::test_config(test_db.dsn().to_string(), true);
	let state = super::build_state(cfg, providers).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;

	state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");
	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let rec = state
		.service
		.generate_recommendations(GenerateRecommendationsRequest {
			user_id: "user-1".to_string(),
			room_id,
			tier: Tier::QuickWins,
		})
		.await
		.expect("Failed to schedule recommendations.");

	// First pass completes the recommendation and auto-enqueues the match
	// batch; the second pass runs the batch itself.
	process_outbox_once(&state).await.expect("Outbox pass failed.");
	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let job = jobs::fetch_recommendation(&state.service.db, rec.recommendation_id)
		.await
		.expect("Fetch failed.")
		.expect("Recommendation job is gone.");
	let items: Vec<RecommendationItem> =
		serde_json::from_value(job.items.expect("No items.")).expect("Items do not parse.");

	// Every item in the payload is purchasable (textiles and lighting) and
	// the stub matches each to the storefront result.
	for item in &items {
		let product = item.matched_product.as_ref().expect("Item has no match.");

		assert_eq!(product.url, "https://www.ikea.com/us/en/p/fado");
		assert_eq!(product.name, "FADO table lamp");
	}

	let batch = jobs::find_active_product_match(&state.service.db, rec.recommendation_id)
		.await
		.expect("Fetch failed.");

	// The batch completed; nothing is left pending or searching.
	assert!(batch.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
