//! Scheduling handlers for recommendation generation, plus the in-place item
//! edits that never re-run generation.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::{job::JobKind, recommendation::Tier};
use decora_storage::{jobs, outbox};

use crate::{DesignService, Error, Result, rate_limit::Operation, require_user};

pub const NO_COMPLETED_ANALYSIS: &str = "No completed analysis found for this room.";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateRecommendationsRequest {
	pub user_id: String,
	pub room_id: Uuid,
	pub tier: Tier,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateRecommendationsResponse {
	pub recommendation_id: Uuid,
	pub already_running: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AskCustomQuestionRequest {
	pub user_id: String,
	pub room_id: Uuid,
	pub question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegenerateRecommendationsRequest {
	pub user_id: String,
	pub recommendation_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetItemSelectedRequest {
	pub user_id: String,
	pub recommendation_id: Uuid,
	pub item_id: String,
	pub selected: bool,
}

impl DesignService {
	pub async fn generate_recommendations(
		&self,
		req: GenerateRecommendationsRequest,
	) -> Result<GenerateRecommendationsResponse> {
		require_user(&req.user_id)?;

		if req.tier == Tier::Custom {
			return Err(Error::InvalidRequest {
				message: "The custom tier is driven by ask_custom_question.".to_string(),
			});
		}

		self.schedule_recommendation(&req.user_id, req.room_id, req.tier, None).await
	}

	pub async fn ask_custom_question(
		&self,
		req: AskCustomQuestionRequest,
	) -> Result<GenerateRecommendationsResponse> {
		require_user(&req.user_id)?;

		let question = req.question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Question must not be empty.".to_string(),
			});
		}

		self.schedule_recommendation(&req.user_id, req.room_id, Tier::Custom, Some(question))
			.await
	}

	async fn schedule_recommendation(
		&self,
		user_id: &str,
		room_id: Uuid,
		tier: Tier,
		question: Option<&str>,
	) -> Result<GenerateRecommendationsResponse> {
		let (room, _project) = self.owned_room(user_id, room_id).await?;
		let analysis = jobs::latest_completed_analysis(&self.db, room.room_id)
			.await?
			.ok_or_else(|| Error::InvalidRequest { message: NO_COMPLETED_ANALYSIS.to_string() })?;

		if let Some(message) = self.check_rate_limit(user_id, Operation::Recommendations).await? {
			return Err(Error::RateLimited { message });
		}
		if let Some(existing) =
			jobs::find_active_recommendation(&self.db, room.room_id, tier.as_str()).await?
		{
			return Ok(GenerateRecommendationsResponse {
				recommendation_id: existing.recommendation_id,
				already_running: true,
			});
		}

		let recommendation_id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		jobs::insert_recommendation_tx(
			&mut tx,
			recommendation_id,
			room.room_id,
			analysis.analysis_id,
			tier.as_str(),
			question,
			now,
		)
		.await?;
		outbox::enqueue_tx(&mut tx, JobKind::Recommendation, recommendation_id).await?;
		tx.commit().await?;

		self.count_scheduled(user_id, Operation::Recommendations).await;

		Ok(GenerateRecommendationsResponse { recommendation_id, already_running: false })
	}

	pub async fn regenerate_recommendations(
		&self,
		req: RegenerateRecommendationsRequest,
	) -> Result<GenerateRecommendationsResponse> {
		require_user(&req.user_id)?;

		let (job, _room, _project) =
			self.owned_recommendation(&req.user_id, req.recommendation_id).await?;

		if let Some(message) =
			self.check_rate_limit(&req.user_id, Operation::Recommendations).await?
		{
			return Err(Error::RateLimited { message });
		}

		let mut tx = self.db.pool.begin().await?;

		if !jobs::reset_recommendation_tx(&mut tx, job.recommendation_id).await? {
			return Err(Error::Conflict {
				message: "Recommendations are still generating and cannot be regenerated."
					.to_string(),
			});
		}

		outbox::enqueue_tx(&mut tx, JobKind::Recommendation, job.recommendation_id).await?;
		tx.commit().await?;

		self.count_scheduled(&req.user_id, Operation::Recommendations).await;

		Ok(GenerateRecommendationsResponse {
			recommendation_id: job.recommendation_id,
			already_running: false,
		})
	}

	/// Toggles one item's `selected` flag in the stored item array. Unknown
	/// fields on the item survive untouched.
	pub async fn set_item_selected(&self, req: SetItemSelectedRequest) -> Result<()> {
		require_user(&req.user_id)?;

		let (job, _room, _project) =
			self.owned_recommendation(&req.user_id, req.recommendation_id).await?;
		let Some(mut items) = job.items else {
			return Err(Error::Conflict {
				message: "Recommendations are not completed yet.".to_string(),
			});
		};
		let updated = set_selected_in_items(&mut items, &req.item_id, req.selected);

		if !updated {
			return Err(Error::NotFound {
				message: "Recommendation item not found.".to_string(),
			});
		}
		if !jobs::update_recommendation_items(&self.db, job.recommendation_id, &items).await? {
			return Err(Error::Conflict {
				message: "Recommendations are not completed yet.".to_string(),
			});
		}

		Ok(())
	}
}

fn set_selected_in_items(items: &mut Value, item_id: &str, selected: bool) -> bool {
	let Some(array) = items.as_array_mut() else {
		return false;
	};

	for item in array {
		if item.get("id").and_then(|v| v.as_str()) == Some(item_id) {
			item["selected"] = json!(selected);

			return true;
		}
	}

	false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn toggles_only_the_named_item() {
		let mut items = json!([
			{ "id": "a", "title": "Rug", "selected": false },
			{ "id": "b", "title": "Lamp" },
		]);

		assert!(set_selected_in_items(&mut items, "b", true));
		assert_eq!(items[0]["selected"], json!(false));
		assert_eq!(items[1]["selected"], json!(true));
	}

	#[test]
	fn unknown_item_id_changes_nothing() {
		let mut items = json!([{ "id": "a", "selected": true }]);

		assert!(!set_selected_in_items(&mut items, "zzz", false));
		assert_eq!(items[0]["selected"], json!(true));
	}
}
