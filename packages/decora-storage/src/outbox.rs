//! The job outbox: the enqueue mechanism between handlers and the worker.
//!
//! A handler inserts an entry in the same transaction that creates or resets
//! the job record, so "durably recorded" and "enqueued" commit together. The
//! worker claims due entries one at a time under a short lease; a crashed
//! worker's entry becomes claimable again when the lease expires, giving
//! at-least-once delivery.
//!
//! FAILED here means the worker hit an infrastructure fault while handling
//! the entry and wants redelivery with backoff. A provider failure is not
//! that: it lands on the job record as `failed` and the entry is marked DONE.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use decora_domain::job::JobKind;

use crate::{Result, db::Db, models::JobOutboxEntry};

const CLAIM_LEASE_SECONDS: i64 = 30;
const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_OUTBOX_ERROR_CHARS: usize = 1_024;

pub async fn enqueue_tx(
	tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
	kind: JobKind,
	job_id: Uuid,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO job_outbox (outbox_id, job_kind, job_id, status) VALUES ($1, $2, $3, 'PENDING')",
	)
	.bind(Uuid::new_v4())
	.bind(kind.as_str())
	.bind(job_id)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn claim_next(db: &Db, now: OffsetDateTime) -> Result<Option<JobOutboxEntry>> {
	let mut tx = db.pool.begin().await?;
	let row = sqlx::query_as::<_, JobOutboxEntry>(
		"\
SELECT *
FROM job_outbox
WHERE status IN ('PENDING', 'FAILED') AND available_at <= $1
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let entry = if let Some(mut entry) = row {
		let lease_until = now + Duration::seconds(CLAIM_LEASE_SECONDS);

		sqlx::query("UPDATE job_outbox SET available_at = $1, updated_at = $2 WHERE outbox_id = $3")
			.bind(lease_until)
			.bind(now)
			.bind(entry.outbox_id)
			.execute(&mut *tx)
			.await?;

		entry.available_at = lease_until;
		entry.updated_at = now;

		Some(entry)
	} else {
		None
	};

	tx.commit().await?;

	Ok(entry)
}

pub async fn mark_done(db: &Db, outbox_id: Uuid) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query("UPDATE job_outbox SET status = 'DONE', updated_at = $1 WHERE outbox_id = $2")
		.bind(now)
		.bind(outbox_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn mark_failed(db: &Db, outbox_id: Uuid, attempts: i32, error: &str) -> Result<()> {
	let next_attempts = attempts.saturating_add(1);
	let backoff = backoff_for_attempt(next_attempts);
	let now = OffsetDateTime::now_utc();
	let available_at = now + backoff;
	let error_text = sanitize_outbox_error(error);

	sqlx::query(
		"\
UPDATE job_outbox
SET status = 'FAILED',
	attempts = $1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE outbox_id = $5",
	)
	.bind(next_attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(outbox_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

/// Stored error text may end up in dashboards; redact anything that looks
/// like a credential and bound the length.
pub fn sanitize_outbox_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = match raw.split(sep).next() {
					Some(prefix) => prefix,
					None => raw,
				};

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_OUTBOX_ERROR_CHARS {
		out = out.chars().take(MAX_OUTBOX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}
