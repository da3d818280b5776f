//! Per-user fixed-window limits on job scheduling.
//!
//! The check runs before a job row exists; the increment runs only after the
//! row and its outbox entry committed, so a denied or failed request never
//! consumes budget. The window is approximate under concurrency on purpose.

use time::{Duration, OffsetDateTime};

use decora_config::Limits;

use crate::{DesignService, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
	Analysis,
	Recommendations,
	Visualization,
}
impl Operation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Analysis => "analysis",
			Self::Recommendations => "recommendations",
			Self::Visualization => "visualization",
		}
	}

	pub fn hourly_limit(&self, limits: &Limits) -> u32 {
		match self {
			Self::Analysis => limits.analysis_per_hour,
			Self::Recommendations => limits.recommendations_per_hour,
			Self::Visualization => limits.visualizations_per_hour,
		}
	}
}

impl DesignService {
	/// `None` means allowed. `Some(message)` carries the minutes until the
	/// window resets, ready to surface to the user.
	pub(crate) async fn check_rate_limit(
		&self,
		user_id: &str,
		operation: Operation,
	) -> Result<Option<String>> {
		let counter =
			decora_storage::rate_limit::fetch_counter(&self.db, user_id, operation.as_str())
				.await?;
		let Some(counter) = counter else {
			return Ok(None);
		};
		let denial = denial_message(
			operation,
			counter.count,
			operation.hourly_limit(&self.cfg.limits),
			counter.window_start,
			OffsetDateTime::now_utc(),
			Duration::seconds(self.cfg.limits.window_secs),
		);

		Ok(denial)
	}

	/// Counts one scheduled job. The job is already durably enqueued when this
	/// runs, so a counter failure is logged rather than surfaced.
	pub(crate) async fn count_scheduled(&self, user_id: &str, operation: Operation) {
		let result = decora_storage::rate_limit::record_started(
			&self.db,
			user_id,
			operation.as_str(),
			OffsetDateTime::now_utc(),
			Duration::seconds(self.cfg.limits.window_secs),
		)
		.await;

		if let Err(err) = result {
			tracing::warn!(
				operation = operation.as_str(),
				error = %err,
				"Failed to record a rate-limit increment.",
			);
		}
	}
}

/// Pure window math. An expired window is allowed without touching the row;
/// the increment path resets it lazily.
pub fn denial_message(
	operation: Operation,
	count: i32,
	limit: u32,
	window_start: OffsetDateTime,
	now: OffsetDateTime,
	window: Duration,
) -> Option<String> {
	if (count as i64) < limit as i64 {
		return None;
	}

	let window_end = window_start + window;

	if now >= window_end {
		return None;
	}

	let remaining = window_end - now;
	let minutes = (remaining.whole_seconds() + 59) / 60;

	Some(format!(
		"Rate limit reached for {}. Try again in {minutes} minute{}.",
		operation.as_str(),
		if minutes == 1 { "" } else { "s" },
	))
}
