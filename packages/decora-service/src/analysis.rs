//! Scheduling handlers for room analysis.

use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::job::JobKind;
use decora_storage::{jobs, outbox};

use crate::{DesignService, Error, Result, rate_limit::Operation, require_user};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateAnalysisRequest {
	pub user_id: String,
	pub room_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateAnalysisResponse {
	pub analysis_id: Uuid,
	/// True when an in-flight analysis already existed and its id was returned
	/// instead of scheduling a second one.
	pub already_running: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegenerateAnalysisRequest {
	pub user_id: String,
	pub analysis_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegenerateAnalysisResponse {
	pub analysis_id: Uuid,
}

impl DesignService {
	pub async fn generate_analysis(
		&self,
		req: GenerateAnalysisRequest,
	) -> Result<GenerateAnalysisResponse> {
		require_user(&req.user_id)?;

		let (room, _project) = self.owned_room(&req.user_id, req.room_id).await?;
		let photo_ids = room.photo_ids();

		if photo_ids.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Room has no photos to analyze.".to_string(),
			});
		}
		if let Some(message) = self.check_rate_limit(&req.user_id, Operation::Analysis).await? {
			return Err(Error::RateLimited { message });
		}
		if let Some(existing) = jobs::find_active_analysis(&self.db, room.room_id).await? {
			return Ok(GenerateAnalysisResponse {
				analysis_id: existing.analysis_id,
				already_running: true,
			});
		}

		let analysis_id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		jobs::insert_analysis_tx(&mut tx, analysis_id, room.room_id, &json!(photo_ids), now)
			.await?;
		outbox::enqueue_tx(&mut tx, JobKind::Analysis, analysis_id).await?;
		tx.commit().await?;

		self.count_scheduled(&req.user_id, Operation::Analysis).await;

		Ok(GenerateAnalysisResponse { analysis_id, already_running: false })
	}

	/// Resets a terminal analysis back to `pending` and re-enqueues the SAME
	/// record. A still-running analysis cannot be reset.
	pub async fn regenerate_analysis(
		&self,
		req: RegenerateAnalysisRequest,
	) -> Result<RegenerateAnalysisResponse> {
		require_user(&req.user_id)?;

		let (job, room, _project) = self.owned_analysis(&req.user_id, req.analysis_id).await?;

		if room.photo_ids().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Room has no photos to analyze.".to_string(),
			});
		}
		if let Some(message) = self.check_rate_limit(&req.user_id, Operation::Analysis).await? {
			return Err(Error::RateLimited { message });
		}

		let mut tx = self.db.pool.begin().await?;

		if !jobs::reset_analysis_tx(&mut tx, job.analysis_id).await? {
			return Err(Error::Conflict {
				message: "Analysis is still running and cannot be regenerated.".to_string(),
			});
		}

		outbox::enqueue_tx(&mut tx, JobKind::Analysis, job.analysis_id).await?;
		tx.commit().await?;

		self.count_scheduled(&req.user_id, Operation::Analysis).await;

		Ok(RegenerateAnalysisResponse { analysis_id: job.analysis_id })
	}
}
