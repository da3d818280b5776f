//! Usage-ledger rows. Append-only: there is deliberately no UPDATE here.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::UsageEvent};

#[derive(Clone, Debug)]
pub struct NewUsageEvent {
	pub provider: String,
	pub model: String,
	pub operation: String,
	pub status: String,
	pub estimated_cost: f64,
	pub unit_count: i64,
	pub input_tokens: Option<i64>,
	pub output_tokens: Option<i64>,
	pub room_id: Option<Uuid>,
	pub project_id: Option<Uuid>,
	pub user_id: Option<String>,
	pub error: Option<String>,
}

pub async fn insert_usage_event(db: &Db, event: &NewUsageEvent) -> Result<Uuid> {
	let event_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO usage_events (
	event_id,
	provider,
	model,
	operation,
	status,
	estimated_cost,
	unit_count,
	input_tokens,
	output_tokens,
	room_id,
	project_id,
	user_id,
	error,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
	)
	.bind(event_id)
	.bind(event.provider.as_str())
	.bind(event.model.as_str())
	.bind(event.operation.as_str())
	.bind(event.status.as_str())
	.bind(event.estimated_cost)
	.bind(event.unit_count)
	.bind(event.input_tokens)
	.bind(event.output_tokens)
	.bind(event.room_id)
	.bind(event.project_id)
	.bind(event.user_id.as_deref())
	.bind(event.error.as_deref())
	.bind(OffsetDateTime::now_utc())
	.execute(&db.pool)
	.await?;

	Ok(event_id)
}

#[derive(Clone, Copy, Debug)]
pub enum UsageGroupBy {
	Provider,
	Operation,
	Model,
}
impl UsageGroupBy {
	fn column(&self) -> &'static str {
		match self {
			Self::Provider => "provider",
			Self::Operation => "operation",
			Self::Model => "model",
		}
	}
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UsageTotalsRow {
	pub total_cost: f64,
	pub request_count: i64,
	pub input_tokens: i64,
	pub output_tokens: i64,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct UsageGroupRow {
	pub key: String,
	pub cost: f64,
	pub requests: i64,
}

pub async fn totals_since(
	db: &Db,
	user_id: &str,
	since: OffsetDateTime,
	project_id: Option<Uuid>,
) -> Result<UsageTotalsRow> {
	let row = sqlx::query_as::<_, UsageTotalsRow>(
		"\
SELECT
	COALESCE(SUM(estimated_cost), 0)::double precision AS total_cost,
	COUNT(*) AS request_count,
	COALESCE(SUM(input_tokens), 0)::bigint AS input_tokens,
	COALESCE(SUM(output_tokens), 0)::bigint AS output_tokens
FROM usage_events
WHERE user_id = $1
	AND created_at >= $2
	AND ($3::uuid IS NULL OR project_id = $3)",
	)
	.bind(user_id)
	.bind(since)
	.bind(project_id)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}

pub async fn grouped_since(
	db: &Db,
	user_id: &str,
	since: OffsetDateTime,
	project_id: Option<Uuid>,
	group_by: UsageGroupBy,
) -> Result<Vec<UsageGroupRow>> {
	// The grouping column comes from a closed enum, never from user input.
	let sql = format!(
		"\
SELECT
	{column} AS key,
	COALESCE(SUM(estimated_cost), 0)::double precision AS cost,
	COUNT(*) AS requests
FROM usage_events
WHERE user_id = $1
	AND created_at >= $2
	AND ($3::uuid IS NULL OR project_id = $3)
GROUP BY {column}
ORDER BY cost DESC",
		column = group_by.column(),
	);
	let rows = sqlx::query_as::<_, UsageGroupRow>(&sql)
		.bind(user_id)
		.bind(since)
		.bind(project_id)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn recent_events(
	db: &Db,
	user_id: &str,
	since: OffsetDateTime,
	project_id: Option<Uuid>,
	limit: i64,
) -> Result<Vec<UsageEvent>> {
	let rows = sqlx::query_as::<_, UsageEvent>(
		"\
SELECT *
FROM usage_events
WHERE user_id = $1
	AND created_at >= $2
	AND ($3::uuid IS NULL OR project_id = $3)
ORDER BY created_at DESC
LIMIT $4",
	)
	.bind(user_id)
	.bind(since)
	.bind(project_id)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
