use decora_service::{GenerateAnalysisRequest, GenerateRecommendationsRequest,
	RegenerateAnalysisRequest};
use decora_domain::recommendation::{RecommendationItem, Tier};
use decora_storage::jobs;
use decora_worker::worker::process_outbox_once;

use super::{MemoryObjects, ScriptedChat, providers_with};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn analysis_and_recommendations_run_end_to_end() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping analysis_and_recommendations_run_end_to_end; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![
		ScriptedChat::json(super::analysis_payload()),
		ScriptedChat::json(super::quick_wins_payload()),
	]);
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects)).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let scheduled = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");

	assert!(!scheduled.already_running);

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let analysis = jobs::fetch_analysis(&state.service.db, scheduled.analysis_id)
		.await
		.expect("Fetch failed.")
		.expect("Analysis job is gone.");

	assert_eq!(analysis.status, "completed");
	assert!(analysis.completed_at.is_some());

	let results = analysis.results.expect("Completed analysis has no results.");

	assert_eq!(results["style"]["detected"], "scandinavian");

	let rec = state
		.service
		.generate_recommendations(GenerateRecommendationsRequest {
			user_id: "user-1".to_string(),
			room_id,
			tier: Tier::QuickWins,
		})
		.await
		.expect("Failed to schedule recommendations.");

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let job = jobs::fetch_recommendation(&state.service.db, rec.recommendation_id)
		.await
		.expect("Fetch failed.")
		.expect("Recommendation job is gone.");

	assert_eq!(job.status, "completed");
	assert!(job.summary.expect("No summary.").contains("upgrades"));

	let items: Vec<RecommendationItem> =
		serde_json::from_value(job.items.expect("No items.")).expect("Items do not parse.");

	assert_eq!(items.len(), 5);

	// suggested_photo_index 1 resolves to the room's second photo id.
	let room = decora_storage::projects::fetch_room(&state.service.db, room_id)
		.await
		.expect("Fetch failed.")
		.expect("Room is gone.");

	assert_eq!(items[0].suggested_photo_id.as_deref(), Some(room.photo_ids()[1].as_str()));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn provider_failure_lands_on_the_job_record_not_the_outbox() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping provider_failure_lands_on_the_job_record_not_the_outbox; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![ScriptedChat::server_error()]);
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects)).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let scheduled = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let analysis = jobs::fetch_analysis(&state.service.db, scheduled.analysis_id)
		.await
		.expect("Fetch failed.")
		.expect("Analysis job is gone.");

	assert_eq!(analysis.status, "failed");
	assert!(analysis.error.expect("Failed analysis has no error.").contains("500"));

	// The entry was handled, not redelivered: provider failures are DONE.
	let outbox_status: String = sqlx::query_scalar(
		"SELECT status FROM job_outbox WHERE job_id = $1",
	)
	.bind(scheduled.analysis_id)
	.fetch_one(&state.service.db.pool)
	.await
	.expect("Outbox entry is gone.");

	assert_eq!(outbox_status, "DONE");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn duplicate_generation_returns_the_live_record() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping duplicate_generation_returns_the_live_record; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(Vec::new());
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects)).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let first = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");
	let second = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Dedup should not error.");

	assert!(!first.already_running);
	assert!(second.already_running);
	assert_eq!(first.analysis_id, second.analysis_id);

	let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_outbox")
		.fetch_one(&state.service.db.pool)
		.await
		.expect("Count failed.");

	assert_eq!(entries, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn regenerate_resets_the_same_record() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping regenerate_resets_the_same_record; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![
		ScriptedChat::server_error(),
		ScriptedChat::json(super::analysis_payload()),
	]);
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects)).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let scheduled = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id,
		})
		.await
		.expect("Failed to schedule analysis.");

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let failed = jobs::fetch_analysis(&state.service.db, scheduled.analysis_id)
		.await
		.expect("Fetch failed.")
		.expect("Analysis job is gone.");

	assert_eq!(failed.status, "failed");

	let regenerated = state
		.service
		.regenerate_analysis(RegenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			analysis_id: scheduled.analysis_id,
		})
		.await
		.expect("Failed to regenerate.");

	// The reset reuses the record rather than creating a sibling.
	assert_eq!(regenerated.analysis_id, scheduled.analysis_id);

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let completed = jobs::fetch_analysis(&state.service.db, scheduled.analysis_id)
		.await
		.expect("Fetch failed.")
		.expect("Analysis job is gone.");

	assert_eq!(completed.status, "completed");
	assert!(completed.error.is_none());
	assert!(completed.results.is_some());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
