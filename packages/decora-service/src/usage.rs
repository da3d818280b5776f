//! The usage ledger surface: tracking one provider call and summarizing spend.
//!
//! Tracking is deliberately forgiving. A ledger insert failure is logged and
//! swallowed at every call site; telemetry never changes a job outcome.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use decora_config::Config;
use decora_domain::pricing::{self, ModelPrice, Usage};
use decora_storage::usage::{NewUsageEvent, UsageGroupBy};

use crate::{DesignService, Result, require_user};

const MAX_SUMMARY_DAYS: i64 = 365;
const MAX_RECENT_EVENTS: i64 = 100;

#[derive(Clone, Debug)]
pub struct TrackUsage {
	pub provider: String,
	pub model: String,
	pub operation: String,
	pub status: String,
	pub usage: Usage,
	pub room_id: Option<Uuid>,
	pub project_id: Option<Uuid>,
	pub user_id: Option<String>,
	pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageSummaryRequest {
	pub user_id: String,
	pub days: i64,
	pub project_id: Option<Uuid>,
	pub limit: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageGroup {
	pub key: String,
	pub cost: f64,
	pub requests: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecentUsageEvent {
	pub event_id: Uuid,
	pub provider: String,
	pub model: String,
	pub operation: String,
	pub status: String,
	pub estimated_cost: f64,
	pub room_id: Option<Uuid>,
	pub project_id: Option<Uuid>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageSummaryResponse {
	pub days: i64,
	pub total_cost: f64,
	pub request_count: i64,
	pub input_tokens: i64,
	pub output_tokens: i64,
	pub by_provider: Vec<UsageGroup>,
	pub by_operation: Vec<UsageGroup>,
	pub by_model: Vec<UsageGroup>,
	pub recent: Vec<RecentUsageEvent>,
}

/// Per-model prices from config, layered over the hardcoded fallbacks by the
/// estimator itself.
pub fn pricing_overrides(cfg: &Config) -> HashMap<String, ModelPrice> {
	cfg.pricing
		.iter()
		.map(|(model, price)| {
			(model.clone(), ModelPrice {
				input_per_million: price.input_per_million,
				output_per_million: price.output_per_million,
				per_unit: price.per_unit,
			})
		})
		.collect()
}

pub(crate) fn clamp_days(days: i64) -> i64 {
	days.clamp(1, MAX_SUMMARY_DAYS)
}

pub(crate) fn clamp_limit(limit: i64) -> i64 {
	limit.clamp(1, MAX_RECENT_EVENTS)
}

impl DesignService {
	/// Appends one ledger row, resolving room -> project -> user linkage when
	/// only a room id was given.
	pub async fn track_usage(&self, event: TrackUsage) -> Result<()> {
		let mut project_id = event.project_id;
		let mut user_id = event.user_id;

		if let Some(room_id) = event.room_id
			&& (project_id.is_none() || user_id.is_none())
			&& let Some(room) = decora_storage::projects::fetch_room(&self.db, room_id).await?
		{
			project_id.get_or_insert(room.project_id);

			if user_id.is_none()
				&& let Some(project) =
					decora_storage::projects::fetch_project(&self.db, room.project_id).await?
			{
				user_id = Some(project.user_id);
			}
		}

		let overrides = pricing_overrides(&self.cfg);
		let estimated_cost = pricing::estimate_cost(&event.model, &event.usage, &overrides);
		let row = NewUsageEvent {
			provider: event.provider,
			model: event.model,
			operation: event.operation,
			status: event.status,
			estimated_cost,
			unit_count: event.usage.units as i64,
			input_tokens: Some(event.usage.input_tokens as i64),
			output_tokens: Some(event.usage.output_tokens as i64),
			room_id: event.room_id,
			project_id,
			user_id,
			error: event.error,
		};

		decora_storage::usage::insert_usage_event(&self.db, &row).await?;

		Ok(())
	}

	/// Ledger writes from worker paths go through here so a telemetry failure
	/// can never change what happens to the job.
	pub async fn track_usage_quietly(&self, event: TrackUsage) {
		let operation = event.operation.clone();

		if let Err(err) = self.track_usage(event).await {
			tracing::warn!(operation, error = %err, "Failed to record a usage event.");
		}
	}

	pub async fn usage_summary(&self, req: UsageSummaryRequest) -> Result<UsageSummaryResponse> {
		require_user(&req.user_id)?;

		let days = clamp_days(req.days);
		let limit = clamp_limit(req.limit);
		let since = OffsetDateTime::now_utc() - Duration::days(days);
		let totals =
			decora_storage::usage::totals_since(&self.db, &req.user_id, since, req.project_id)
				.await?;
		let mut groups = Vec::with_capacity(3);

		for group_by in [UsageGroupBy::Provider, UsageGroupBy::Operation, UsageGroupBy::Model] {
			let rows = decora_storage::usage::grouped_since(
				&self.db,
				&req.user_id,
				since,
				req.project_id,
				group_by,
			)
			.await?;

			groups.push(
				rows.into_iter()
					.map(|row| UsageGroup {
						key: row.key,
						cost: pricing::round6(row.cost),
						requests: row.requests,
					})
					.collect::<Vec<_>>(),
			);
		}

		let by_model = groups.pop().unwrap_or_default();
		let by_operation = groups.pop().unwrap_or_default();
		let by_provider = groups.pop().unwrap_or_default();
		let recent = decora_storage::usage::recent_events(
			&self.db,
			&req.user_id,
			since,
			req.project_id,
			limit,
		)
		.await?
		.into_iter()
		.map(|event| RecentUsageEvent {
			event_id: event.event_id,
			provider: event.provider,
			model: event.model,
			operation: event.operation,
			status: event.status,
			estimated_cost: event.estimated_cost,
			room_id: event.room_id,
			project_id: event.project_id,
			created_at: event.created_at,
		})
		.collect();

		Ok(UsageSummaryResponse {
			days,
			total_cost: pricing::round6(totals.total_cost),
			request_count: totals.request_count,
			input_tokens: totals.input_tokens,
			output_tokens: totals.output_tokens,
			by_provider,
			by_operation,
			by_model,
			recent,
		})
	}
}
