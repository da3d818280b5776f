//! Fixed-window rate-limit counters.
//!
//! Reads and writes are deliberately separate: the check happens before a job
//! is scheduled, the increment only after the job row and its outbox entry
//! committed. The window resets lazily, and only in the increment path; the
//! check treats an expired window as allowed without touching the row.

use time::{Duration, OffsetDateTime};

use crate::{Result, db::Db, models::RateLimitCounter};

pub async fn fetch_counter(
	db: &Db,
	user_id: &str,
	operation: &str,
) -> Result<Option<RateLimitCounter>> {
	let counter = sqlx::query_as::<_, RateLimitCounter>(
		"SELECT * FROM rate_limits WHERE user_id = $1 AND operation = $2",
	)
	.bind(user_id)
	.bind(operation)
	.fetch_optional(&db.pool)
	.await?;

	Ok(counter)
}

/// Counts one successfully scheduled job. A fresh or expired window restarts
/// at one; a live window increments. Lost updates under concurrency are
/// acceptable; the limiter is approximate.
pub async fn record_started(
	db: &Db,
	user_id: &str,
	operation: &str,
	now: OffsetDateTime,
	window: Duration,
) -> Result<()> {
	let expired_before = now - window;

	sqlx::query(
		"\
INSERT INTO rate_limits (user_id, operation, count, window_start)
VALUES ($1, $2, 1, $3)
ON CONFLICT (user_id, operation) DO UPDATE
SET
	count = CASE WHEN rate_limits.window_start <= $4 THEN 1 ELSE rate_limits.count + 1 END,
	window_start =
		CASE WHEN rate_limits.window_start <= $4 THEN $3 ELSE rate_limits.window_start END",
	)
	.bind(user_id)
	.bind(operation)
	.bind(now)
	.bind(expired_before)
	.execute(&db.pool)
	.await?;

	Ok(())
}
