//! Job-record persistence.
//!
//! Status transitions are guarded in SQL: every UPDATE carries the expected
//! current status in its WHERE clause and reports through its affected-row
//! count, so a redelivered or stale worker can never overwrite a terminal
//! state. Handler-side writes that must be atomic with the outbox enqueue
//! take a transaction; worker-side transitions patch single records.

use serde_json::Value;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{AnalysisJob, ProductMatchJob, RecommendationJob, VisualizationJob},
};

// Analysis

pub async fn insert_analysis_tx(
	tx: &mut Transaction<'_, Postgres>,
	analysis_id: Uuid,
	room_id: Uuid,
	photo_ids: &Value,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO analysis_jobs (analysis_id, room_id, status, photo_ids, created_at)
VALUES ($1, $2, 'pending', $3, $4)",
	)
	.bind(analysis_id)
	.bind(room_id)
	.bind(photo_ids)
	.bind(now)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn fetch_analysis(db: &Db, analysis_id: Uuid) -> Result<Option<AnalysisJob>> {
	let job =
		sqlx::query_as::<_, AnalysisJob>("SELECT * FROM analysis_jobs WHERE analysis_id = $1")
			.bind(analysis_id)
			.fetch_optional(&db.pool)
			.await?;

	Ok(job)
}

/// The in-flight analysis for a room, if any. Handlers return this instead of
/// creating a second concurrent record.
pub async fn find_active_analysis(db: &Db, room_id: Uuid) -> Result<Option<AnalysisJob>> {
	let job = sqlx::query_as::<_, AnalysisJob>(
		"\
SELECT *
FROM analysis_jobs
WHERE room_id = $1 AND status IN ('pending', 'processing')
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(room_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn latest_completed_analysis(db: &Db, room_id: Uuid) -> Result<Option<AnalysisJob>> {
	let job = sqlx::query_as::<_, AnalysisJob>(
		"\
SELECT *
FROM analysis_jobs
WHERE room_id = $1 AND status = 'completed'
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(room_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn start_analysis(db: &Db, analysis_id: Uuid) -> Result<bool> {
	let result = sqlx::query(
		"UPDATE analysis_jobs SET status = 'processing' WHERE analysis_id = $1 AND status = 'pending'",
	)
	.bind(analysis_id)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn complete_analysis(
	db: &Db,
	analysis_id: Uuid,
	results: &Value,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE analysis_jobs
SET status = 'completed', results = $2, error = NULL, completed_at = $3
WHERE analysis_id = $1 AND status = 'processing'",
	)
	.bind(analysis_id)
	.bind(results)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn fail_analysis(
	db: &Db,
	analysis_id: Uuid,
	error: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE analysis_jobs
SET status = 'failed', results = NULL, error = $2, completed_at = $3
WHERE analysis_id = $1 AND status = 'processing'",
	)
	.bind(analysis_id)
	.bind(error)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Regenerate resets the SAME record back to its entry state. Only terminal
/// records can be reset, which keeps a single live worker per record.
pub async fn reset_analysis_tx(
	tx: &mut Transaction<'_, Postgres>,
	analysis_id: Uuid,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE analysis_jobs
SET status = 'pending', results = NULL, error = NULL, completed_at = NULL
WHERE analysis_id = $1 AND status IN ('completed', 'failed')",
	)
	.bind(analysis_id)
	.execute(&mut **tx)
	.await?;

	Ok(result.rows_affected() == 1)
}

// Recommendations

#[allow(clippy::too_many_arguments)]
pub async fn insert_recommendation_tx(
	tx: &mut Transaction<'_, Postgres>,
	recommendation_id: Uuid,
	room_id: Uuid,
	analysis_id: Uuid,
	tier: &str,
	question: Option<&str>,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO recommendation_jobs (
	recommendation_id,
	room_id,
	analysis_id,
	tier,
	question,
	status,
	created_at
)
VALUES ($1, $2, $3, $4, $5, 'generating', $6)",
	)
	.bind(recommendation_id)
	.bind(room_id)
	.bind(analysis_id)
	.bind(tier)
	.bind(question)
	.bind(now)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn fetch_recommendation(
	db: &Db,
	recommendation_id: Uuid,
) -> Result<Option<RecommendationJob>> {
	let job = sqlx::query_as::<_, RecommendationJob>(
		"SELECT * FROM recommendation_jobs WHERE recommendation_id = $1",
	)
	.bind(recommendation_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn find_active_recommendation(
	db: &Db,
	room_id: Uuid,
	tier: &str,
) -> Result<Option<RecommendationJob>> {
	let job = sqlx::query_as::<_, RecommendationJob>(
		"\
SELECT *
FROM recommendation_jobs
WHERE room_id = $1 AND tier = $2 AND status = 'generating'
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(room_id)
	.bind(tier)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn complete_recommendation(
	db: &Db,
	recommendation_id: Uuid,
	items: &Value,
	summary: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE recommendation_jobs
SET status = 'completed', items = $2, summary = $3, error = NULL, completed_at = $4
WHERE recommendation_id = $1 AND status = 'generating'",
	)
	.bind(recommendation_id)
	.bind(items)
	.bind(summary)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn fail_recommendation(
	db: &Db,
	recommendation_id: Uuid,
	error: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE recommendation_jobs
SET status = 'failed', items = NULL, summary = NULL, error = $2, completed_at = $3
WHERE recommendation_id = $1 AND status = 'generating'",
	)
	.bind(recommendation_id)
	.bind(error)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn reset_recommendation_tx(
	tx: &mut Transaction<'_, Postgres>,
	recommendation_id: Uuid,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE recommendation_jobs
SET status = 'generating', items = NULL, summary = NULL, error = NULL, completed_at = NULL
WHERE recommendation_id = $1 AND status IN ('completed', 'failed')",
	)
	.bind(recommendation_id)
	.execute(&mut **tx)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Patches the item array of a completed record in place. Used by the
/// selected-toggle and by product matching; neither re-runs generation.
pub async fn update_recommendation_items(
	db: &Db,
	recommendation_id: Uuid,
	items: &Value,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE recommendation_jobs
SET items = $2
WHERE recommendation_id = $1 AND status = 'completed'",
	)
	.bind(recommendation_id)
	.bind(items)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

// Visualizations

#[allow(clippy::too_many_arguments)]
pub async fn insert_visualization_tx(
	tx: &mut Transaction<'_, Postgres>,
	visualization_id: Uuid,
	room_id: Uuid,
	photo_id: &str,
	prompt: &str,
	render_type: &str,
	product_image_url: Option<&str>,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO visualization_jobs (
	visualization_id,
	room_id,
	photo_id,
	prompt,
	render_type,
	product_image_url,
	status,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, 'queued', $7)",
	)
	.bind(visualization_id)
	.bind(room_id)
	.bind(photo_id)
	.bind(prompt)
	.bind(render_type)
	.bind(product_image_url)
	.bind(now)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn fetch_visualization(
	db: &Db,
	visualization_id: Uuid,
) -> Result<Option<VisualizationJob>> {
	let job = sqlx::query_as::<_, VisualizationJob>(
		"SELECT * FROM visualization_jobs WHERE visualization_id = $1",
	)
	.bind(visualization_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn start_visualization(db: &Db, visualization_id: Uuid) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE visualization_jobs
SET status = 'processing'
WHERE visualization_id = $1 AND status = 'queued'",
	)
	.bind(visualization_id)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn complete_visualization(
	db: &Db,
	visualization_id: Uuid,
	output: &Value,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE visualization_jobs
SET status = 'completed', output = $2, error = NULL, completed_at = $3
WHERE visualization_id = $1 AND status = 'processing'",
	)
	.bind(visualization_id)
	.bind(output)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn fail_visualization(
	db: &Db,
	visualization_id: Uuid,
	error: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE visualization_jobs
SET status = 'failed', output = NULL, error = $2, completed_at = $3
WHERE visualization_id = $1 AND status = 'processing'",
	)
	.bind(visualization_id)
	.bind(error)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn reset_visualization_tx(
	tx: &mut Transaction<'_, Postgres>,
	visualization_id: Uuid,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE visualization_jobs
SET status = 'queued', output = NULL, error = NULL, completed_at = NULL
WHERE visualization_id = $1 AND status IN ('completed', 'failed')",
	)
	.bind(visualization_id)
	.execute(&mut **tx)
	.await?;

	Ok(result.rows_affected() == 1)
}

// Product matching

pub async fn insert_product_match_tx(
	tx: &mut Transaction<'_, Postgres>,
	match_id: Uuid,
	recommendation_id: Uuid,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO product_match_jobs (match_id, recommendation_id, status, created_at)
VALUES ($1, $2, 'pending', $3)",
	)
	.bind(match_id)
	.bind(recommendation_id)
	.bind(now)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

pub async fn fetch_product_match(db: &Db, match_id: Uuid) -> Result<Option<ProductMatchJob>> {
	let job = sqlx::query_as::<_, ProductMatchJob>(
		"SELECT * FROM product_match_jobs WHERE match_id = $1",
	)
	.bind(match_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn find_active_product_match(
	db: &Db,
	recommendation_id: Uuid,
) -> Result<Option<ProductMatchJob>> {
	let job = sqlx::query_as::<_, ProductMatchJob>(
		"\
SELECT *
FROM product_match_jobs
WHERE recommendation_id = $1 AND status IN ('pending', 'searching')
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(recommendation_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(job)
}

pub async fn start_product_match(db: &Db, match_id: Uuid) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE product_match_jobs
SET status = 'searching'
WHERE match_id = $1 AND status = 'pending'",
	)
	.bind(match_id)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn complete_product_match(
	db: &Db,
	match_id: Uuid,
	matched: &Value,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE product_match_jobs
SET status = 'completed', matched = $2, completed_at = $3
WHERE match_id = $1 AND status = 'searching'",
	)
	.bind(match_id)
	.bind(matched)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}
