use decora_service::{
	DeleteProjectRequest, GenerateAnalysisRequest, GenerateRecommendationsRequest,
};
use decora_domain::recommendation::Tier;
use decora_worker::worker::process_outbox_once;

use super::{MemoryObjects, ScriptedChat, providers_with};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn deleting_a_project_leaves_no_orphan_rows_or_objects() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping deleting_a_project_leaves_no_orphan_rows_or_objects; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![
		ScriptedChat::json(super::analysis_payload()),
		ScriptedChat::json(super::quick_wins_payload()),
	]);
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects.clone())).await;
	let (project_id, room_id) = super::seed_room(&state, "user-1").await;

	state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");
	process_outbox_once(&state).await.expect("Outbox pass failed.");
	state
		.service
		.generate_recommendations(GenerateRecommendationsRequest {
			user_id: "user-1".to_string(),
			room_id,
			tier: Tier::QuickWins,
		})
		.await
		.expect("Failed to schedule recommendations.");
	process_outbox_once(&state).await.expect("Outbox pass failed.");

	assert_eq!(objects.stored_count(), 2);

	state
		.service
		.delete_project(DeleteProjectRequest {
			user_id: "user-1".to_string(),
			project_id,
		})
		.await
		.expect("Delete failed.");

	for table in
		["projects", "rooms", "analysis_jobs", "recommendation_jobs", "visualization_jobs"]
	{
		let remaining: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
			.fetch_one(&state.service.db.pool)
			.await
			.expect("Count failed.");

		assert_eq!(remaining, 0, "{table} still has rows");
	}

	// The room photos were deleted from storage as well.
	assert_eq!(objects.stored_count(), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
