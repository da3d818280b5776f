//! The outbox poll loop.
//!
//! One claimant per entry: `claim_next` leases the entry, and only
//! infrastructure faults (storage errors, a vanished schema) mark it FAILED
//! for redelivery. Provider failures are the job's problem, not the outbox's:
//! they land on the job record as `failed` and the entry is marked DONE.

use std::time::Duration;

use color_eyre::Result;
use time::OffsetDateTime;
use tokio::time as tokio_time;
use uuid::Uuid;

use decora_domain::job::JobKind;
use decora_service::DesignService;
use decora_storage::outbox;

const POLL_INTERVAL_MS: u64 = 500;

pub struct WorkerState {
	pub service: DesignService,
}
impl WorkerState {
	pub fn new(service: DesignService) -> Self {
		Self { service }
	}
}

pub async fn run_worker(state: WorkerState) -> Result<()> {
	loop {
		if let Err(err) = process_outbox_once(&state).await {
			tracing::error!(error = %err, "Job outbox processing failed.");
		}

		tokio_time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
	}
}

/// Drains every due entry, then returns. Exposed so tests can drive the loop
/// one pass at a time.
pub async fn process_outbox_once(state: &WorkerState) -> Result<()> {
	loop {
		let now = OffsetDateTime::now_utc();
		let Some(entry) = outbox::claim_next(&state.service.db, now).await? else {
			return Ok(());
		};
		let Some(kind) = JobKind::parse(&entry.job_kind) else {
			tracing::error!(
				job_kind = entry.job_kind.as_str(),
				"Dropping an outbox entry with an unknown job kind.",
			);
			outbox::mark_done(&state.service.db, entry.outbox_id).await?;

			continue;
		};

		match run_job(state, kind, entry.job_id).await {
			Ok(()) => outbox::mark_done(&state.service.db, entry.outbox_id).await?,
			Err(err) => {
				tracing::error!(
					job_kind = kind.as_str(),
					job_id = %entry.job_id,
					error = %err,
					"Job handling hit an infrastructure fault. Scheduling redelivery.",
				);
				outbox::mark_failed(
					&state.service.db,
					entry.outbox_id,
					entry.attempts,
					&err.to_string(),
				)
				.await?;
			},
		}
	}
}

async fn run_job(state: &WorkerState, kind: JobKind, job_id: Uuid) -> Result<()> {
	match kind {
		JobKind::Analysis => crate::analysis::run(state, job_id).await,
		JobKind::Recommendation => crate::recommendation::run(state, job_id).await,
		JobKind::Visualization => crate::visualization::run(state, job_id).await,
		JobKind::ProductMatch => crate::product_match::run(state, job_id).await,
	}
}
