use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Project {
	pub project_id: Uuid,
	pub user_id: String,
	pub name: String,
	pub style_profile: Option<Value>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Room {
	pub room_id: Uuid,
	pub project_id: Uuid,
	pub name: String,
	pub room_type: String,
	/// Ordered JSON array of object-storage ids.
	pub photos: Value,
	pub created_at: OffsetDateTime,
}
impl Room {
	pub fn photo_ids(&self) -> Vec<String> {
		self.photos
			.as_array()
			.map(|photos| {
				photos
					.iter()
					.filter_map(|photo| photo.as_str().map(|id| id.to_string()))
					.collect()
			})
			.unwrap_or_default()
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct AnalysisJob {
	pub analysis_id: Uuid,
	pub room_id: Uuid,
	pub status: String,
	pub photo_ids: Value,
	pub results: Option<Value>,
	pub error: Option<String>,
	pub created_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
}
impl AnalysisJob {
	pub fn photo_ids(&self) -> Vec<String> {
		self.photo_ids
			.as_array()
			.map(|ids| ids.iter().filter_map(|id| id.as_str().map(|id| id.to_string())).collect())
			.unwrap_or_default()
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct RecommendationJob {
	pub recommendation_id: Uuid,
	pub room_id: Uuid,
	pub analysis_id: Uuid,
	pub tier: String,
	pub question: Option<String>,
	pub status: String,
	pub items: Option<Value>,
	pub summary: Option<String>,
	pub error: Option<String>,
	pub created_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct VisualizationJob {
	pub visualization_id: Uuid,
	pub room_id: Uuid,
	pub photo_id: String,
	pub prompt: String,
	pub render_type: String,
	pub product_image_url: Option<String>,
	pub status: String,
	pub output: Option<Value>,
	pub error: Option<String>,
	pub created_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProductMatchJob {
	pub match_id: Uuid,
	pub recommendation_id: Uuid,
	pub status: String,
	pub matched: Value,
	pub created_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UsageEvent {
	pub event_id: Uuid,
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
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RateLimitCounter {
	pub user_id: String,
	pub operation: String,
	pub count: i32,
	pub window_start: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct JobOutboxEntry {
	pub outbox_id: Uuid,
	pub job_kind: String,
	pub job_id: Uuid,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
