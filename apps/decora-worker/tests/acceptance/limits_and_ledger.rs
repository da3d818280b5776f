use decora_service::{
	CreateRoomRequest, Error, GenerateAnalysisRequest, UsageSummaryRequest,
};
use decora_worker::worker::process_outbox_once;

use super::{MemoryObjects, ScriptedChat, providers_with};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn rate_limit_denies_the_next_request_and_recovers_after_the_window() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping rate_limit_denies_the_next_request_and_recovers_after_the_window; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(Vec::new());
	let objects = MemoryObjects::default();
	let mut cfg = super::test_config(test_db.dsn().to_string(), false);

	cfg.limits.analysis_per_hour = 2;

	let state = super::build_state(cfg, providers_with(chat, objects)).await;
	let (project_id, first_room) = super::seed_room(&state, "user-1").await;
	let mut rooms = vec![first_room];

	for name in ["Bedroom", "Kitchen"] {
		let room = state
			.service
			.create_room(CreateRoomRequest {
				user_id: "user-1".to_string(),
				project_id,
				name: name.to_string(),
				room_type: "other".to_string(),
			})
			.await
			.expect("Failed to create room.");

		state
			.service
			.add_room_photo(decora_service::AddRoomPhotoRequest {
				user_id: "user-1".to_string(),
				room_id: room.room_id,
				bytes: vec![7; 16],
				mime_type: "image/jpeg".to_string(),
			})
			.await
			.expect("Failed to add photo.");
		rooms.push(room.room_id);
	}

	for room_id in &rooms[..2] {
		state
			.service
			.generate_analysis(GenerateAnalysisRequest {
				user_id: "user-1".to_string(),
				room_id: *room_id,
			})
			.await
			.expect("Scheduling inside the limit should succeed.");
	}

	let denied = state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id: rooms[2],
		})
		.await;

	match denied {
		Err(Error::RateLimited { message }) => {
			assert!(message.contains("Try again in"), "unexpected message: {message}");
		},
		other => panic!("Expected a rate-limit denial, got {other:?}."),
	}

	// A denial consumes no budget and another user is unaffected.
	let count: i32 =
		sqlx::query_scalar("SELECT count FROM rate_limits WHERE user_id = $1 AND operation = $2")
			.bind("user-1")
			.bind("analysis")
			.fetch_one(&state.service.db.pool)
			.await
			.expect("Counter row is missing.");

	assert_eq!(count, 2);

	// Age the window out; the same request is allowed again.
	sqlx::query(
		"UPDATE rate_limits SET window_start = window_start - interval '2 hours' WHERE user_id = $1",
	)
	.bind("user-1")
	.execute(&state.service.db.pool)
	.await
	.expect("Failed to age the window.");

	state
		.service
		.generate_analysis(GenerateAnalysisRequest {
			user_id: "user-1".to_string(),
			room_id: rooms[2],
		})
		.await
		.expect("An expired window should admit the request.");

	// The lazy reset restarted the counter at one.
	let count: i32 =
		sqlx::query_scalar("SELECT count FROM rate_limits WHERE user_id = $1 AND operation = $2")
			.bind("user-1")
			.bind("analysis")
			.fetch_one(&state.service.db.pool)
			.await
			.expect("Counter row is missing.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn ledger_records_the_call_with_full_linkage() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping ledger_records_the_call_with_full_linkage; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let chat = ScriptedChat::new(vec![ScriptedChat::json(super::analysis_payload())]);
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers_with(chat, objects)).await;
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

	let summary = state
		.service
		.usage_summary(UsageSummaryRequest {
			user_id: "user-1".to_string(),
			days: 7,
			project_id: Some(project_id),
			limit: 10,
		})
		.await
		.expect("Summary failed.");

	assert_eq!(summary.request_count, 1);
	assert_eq!(summary.input_tokens, 1_000);
	assert_eq!(summary.output_tokens, 500);
	// 1000 input + 500 output tokens of gpt-4o: 0.0025 + 0.005.
	assert_eq!(summary.total_cost, 0.0075);
	assert_eq!(summary.by_operation.len(), 1);
	assert_eq!(summary.by_operation[0].key, "analysis");
	assert_eq!(summary.recent.len(), 1);
	assert_eq!(summary.recent[0].room_id, Some(room_id));
	assert_eq!(summary.recent[0].project_id, Some(project_id));
	assert_eq!(summary.recent[0].status, "success");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
