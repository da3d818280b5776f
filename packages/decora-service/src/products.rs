//! Explicit trigger for the product-matching batch. The recommendation worker
//! auto-enqueues the same job kind on success; this handler exists for
//! re-running a batch on demand.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::job::{JobKind, RecommendationStatus};
use decora_storage::{jobs, outbox};

use crate::{DesignService, Error, Result, require_user};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchProductsRequest {
	pub user_id: String,
	pub recommendation_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchProductsResponse {
	pub match_id: Uuid,
	pub already_running: bool,
}

impl DesignService {
	pub async fn match_products(&self, req: MatchProductsRequest) -> Result<MatchProductsResponse> {
		require_user(&req.user_id)?;

		if self.cfg.providers.shopping.is_none() {
			return Err(Error::InvalidRequest {
				message: "Shopping provider is not configured.".to_string(),
			});
		}

		let (job, _room, _project) =
			self.owned_recommendation(&req.user_id, req.recommendation_id).await?;

		if job.status != RecommendationStatus::Completed.as_str() {
			return Err(Error::Conflict {
				message: "Recommendations are not completed yet.".to_string(),
			});
		}
		if let Some(existing) =
			jobs::find_active_product_match(&self.db, job.recommendation_id).await?
		{
			return Ok(MatchProductsResponse {
				match_id: existing.match_id,
				already_running: true,
			});
		}

		let match_id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		jobs::insert_product_match_tx(&mut tx, match_id, job.recommendation_id, now).await?;
		outbox::enqueue_tx(&mut tx, JobKind::ProductMatch, match_id).await?;
		tx.commit().await?;

		Ok(MatchProductsResponse { match_id, already_running: false })
	}
}
