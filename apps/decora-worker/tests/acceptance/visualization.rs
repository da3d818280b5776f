use std::{
	collections::HashSet,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
};

use decora_config as config;
use decora_service::{
	BoxFuture, GenerateVisualizationRequest, ObjectStore, Providers, UsageSummaryRequest,
};
use decora_storage::{jobs, projects};
use decora_worker::worker::process_outbox_once;

use super::{MemoryObjects, ScriptedChat, StubImage, StubShopping, providers_with};

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn visualization_runs_queued_to_completed_and_bills_one_unit() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping visualization_runs_queued_to_completed_and_bills_one_unit; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state =
		super::build_state(cfg, providers_with(ScriptedChat::new(Vec::new()), objects)).await;
	let (project_id, room_id) = super::seed_room(&state, "user-1").await;
	let room = projects::fetch_room(&state.service.db, room_id)
		.await
		.expect("Fetch failed.")
		.expect("Room is gone.");
	let scheduled = state
		.service
		.generate_visualization(GenerateVisualizationRequest {
			user_id: "user-1".to_string(),
			room_id,
			photo_id: room.photo_ids()[0].clone(),
			prompt: "Add a blue rug under the seating area.".to_string(),
			render_type: "custom".to_string(),
			product_image_url: None,
		})
		.await
		.expect("Failed to schedule visualization.");
	let queued = jobs::fetch_visualization(&state.service.db, scheduled.visualization_id)
		.await
		.expect("Fetch failed.")
		.expect("Visualization job is gone.");

	assert_eq!(queued.status, "queued");

	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let job = jobs::fetch_visualization(&state.service.db, scheduled.visualization_id)
		.await
		.expect("Fetch failed.")
		.expect("Visualization job is gone.");

	assert_eq!(job.status, "completed");
	assert!(job.error.is_none());

	let output = job.output.expect("Completed visualization has no output.");
	let url = output["url"].as_str().expect("Output URL is not a string.");

	assert!(!url.is_empty());
	assert!(output["image_id"].as_str().is_some_and(|id| !id.is_empty()));

	let summary = state
		.service
		.usage_summary(UsageSummaryRequest {
			user_id: "user-1".to_string(),
			days: 7,
			project_id: None,
			limit: 10,
		})
		.await
		.expect("Summary failed.");

	// One billed render of gemini-2.5-flash-image at its per-unit price.
	assert_eq!(summary.request_count, 1);
	assert_eq!(summary.total_cost, 0.039);
	assert_eq!(summary.recent.len(), 1);
	assert_eq!(summary.recent[0].status, "success");
	assert_eq!(summary.recent[0].operation, "visualization");
	assert_eq!(summary.recent[0].room_id, Some(room_id));
	assert_eq!(summary.recent[0].project_id, Some(project_id));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn failure_before_the_image_call_records_a_zero_cost_entry() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping failure_before_the_image_call_records_a_zero_cost_entry; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let objects = MemoryObjects::default();
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state =
		super::build_state(cfg, providers_with(ScriptedChat::new(Vec::new()), objects.clone()))
			.await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let room = projects::fetch_room(&state.service.db, room_id)
		.await
		.expect("Fetch failed.")
		.expect("Room is gone.");
	let photo_id = room.photo_ids()[0].clone();
	let scheduled = state
		.service
		.generate_visualization(GenerateVisualizationRequest {
			user_id: "user-1".to_string(),
			room_id,
			photo_id: photo_id.clone(),
			prompt: "Add a blue rug under the seating area.".to_string(),
			render_type: "custom".to_string(),
			product_image_url: None,
		})
		.await
		.expect("Failed to schedule visualization.");

	// The photo object disappears between scheduling and the worker run, so
	// the job fails before the image provider is ever reached.
	objects.remove(&photo_id);
	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let job = jobs::fetch_visualization(&state.service.db, scheduled.visualization_id)
		.await
		.expect("Fetch failed.")
		.expect("Visualization job is gone.");

	assert_eq!(job.status, "failed");
	assert!(job.error.expect("Failed job has no error.").contains("could not be resolved"));

	let (status, cost, units): (String, f64, i64) = sqlx::query_as(
		"SELECT status, estimated_cost, unit_count FROM usage_events WHERE operation = 'visualization'",
	)
	.fetch_one(&state.service.db.pool)
	.await
	.expect("Ledger entry is missing.");

	assert_eq!(status, "failed");
	assert_eq!(cost, 0.0);
	assert_eq!(units, 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DECORA_TEST_PG_DSN to run."]
async fn a_render_without_a_resolvable_url_fails_the_job() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping a_render_without_a_resolvable_url_fails_the_job; set DECORA_TEST_PG_DSN to run this test."
		);

		return;
	};
	let objects = Arc::new(UrlLossAfterSeed::default());
	let providers = Providers::new(
		Arc::new(ScriptedChat::new(Vec::new())),
		Arc::new(StubImage),
		Arc::new(StubShopping { results: Vec::new(), detail_link: None }),
		objects.clone(),
	);
	let cfg = super::test_config(test_db.dsn().to_string(), false);
	let state = super::build_state(cfg, providers).await;
	let (_project_id, room_id) = super::seed_room(&state, "user-1").await;
	let room = projects::fetch_room(&state.service.db, room_id)
		.await
		.expect("Fetch failed.")
		.expect("Room is gone.");
	let scheduled = state
		.service
		.generate_visualization(GenerateVisualizationRequest {
			user_id: "user-1".to_string(),
			room_id,
			photo_id: room.photo_ids()[0].clone(),
			prompt: "Add a blue rug under the seating area.".to_string(),
			render_type: "custom".to_string(),
			product_image_url: None,
		})
		.await
		.expect("Failed to schedule visualization.");

	objects.arm();
	process_outbox_once(&state).await.expect("Outbox pass failed.");

	let job = jobs::fetch_visualization(&state.service.db, scheduled.visualization_id)
		.await
		.expect("Fetch failed.")
		.expect("Visualization job is gone.");

	assert_eq!(job.status, "failed");
	assert!(job.output.is_none());
	assert!(job.error.expect("Failed job has no error.").contains("URL did not resolve"));

	// The provider call did happen, so the failed entry still bills one unit.
	let (status, cost, units): (String, f64, i64) = sqlx::query_as(
		"SELECT status, estimated_cost, unit_count FROM usage_events WHERE operation = 'visualization'",
	)
	.fetch_one(&state.service.db.pool)
	.await
	.expect("Ledger entry is missing.");

	assert_eq!(status, "failed");
	assert_eq!(cost, 0.039);
	assert_eq!(units, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

/// Object store whose URLs stop resolving for anything stored after `arm`.
/// Seeded photos keep working; the render stored mid-job does not.
#[derive(Default)]
struct UrlLossAfterSeed {
	inner: MemoryObjects,
	armed: AtomicBool,
	broken: Mutex<HashSet<String>>,
}
impl UrlLossAfterSeed {
	fn arm(&self) {
		self.armed.store(true, Ordering::SeqCst);
	}
}
impl ObjectStore for UrlLossAfterSeed {
	fn store<'a>(
		&'a self,
		cfg: &'a config::ObjectStoreConfig,
		bytes: Vec<u8>,
		mime_type: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<String>> {
		Box::pin(async move {
			let id = self.inner.store(cfg, bytes, mime_type).await?;

			if self.armed.load(Ordering::SeqCst) {
				self.broken.lock().unwrap_or_else(|err| err.into_inner()).insert(id.clone());
			}

			Ok(id)
		})
	}

	fn get_url<'a>(
		&'a self,
		cfg: &'a config::ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<Option<String>>> {
		let broken = self.broken.lock().unwrap_or_else(|err| err.into_inner()).contains(id);

		if broken {
			return Box::pin(async { Ok(None) });
		}

		self.inner.get_url(cfg, id)
	}

	fn download<'a>(
		&'a self,
		cfg: &'a config::ObjectStoreConfig,
		url: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<(String, Vec<u8>)>> {
		self.inner.download(cfg, url)
	}

	fn delete<'a>(
		&'a self,
		cfg: &'a config::ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<()>> {
		self.inner.delete(cfg, id)
	}
}
