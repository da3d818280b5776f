//! Scheduling handlers for photorealistic room renders.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::job::JobKind;
use decora_storage::{jobs, outbox};

use crate::{DesignService, Error, Result, rate_limit::Operation, require_user};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateVisualizationRequest {
	pub user_id: String,
	pub room_id: Uuid,
	/// Storage id of the room photo to render over. Must be one of the room's
	/// own photos.
	pub photo_id: String,
	pub prompt: String,
	pub render_type: String,
	/// Reference image of a concrete product to place into the scene.
	pub product_image_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerateVisualizationResponse {
	pub visualization_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegenerateVisualizationRequest {
	pub user_id: String,
	pub visualization_id: Uuid,
}

impl DesignService {
	pub async fn generate_visualization(
		&self,
		req: GenerateVisualizationRequest,
	) -> Result<GenerateVisualizationResponse> {
		require_user(&req.user_id)?;

		let (room, _project) = self.owned_room(&req.user_id, req.room_id).await?;

		if !room.photo_ids().iter().any(|id| id == &req.photo_id) {
			return Err(Error::InvalidRequest {
				message: "Photo does not belong to this room.".to_string(),
			});
		}
		if req.prompt.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Visualization prompt must not be empty.".to_string(),
			});
		}
		if let Some(message) =
			self.check_rate_limit(&req.user_id, Operation::Visualization).await?
		{
			return Err(Error::RateLimited { message });
		}

		let visualization_id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		jobs::insert_visualization_tx(
			&mut tx,
			visualization_id,
			room.room_id,
			&req.photo_id,
			req.prompt.trim(),
			&req.render_type,
			req.product_image_url.as_deref(),
			now,
		)
		.await?;
		outbox::enqueue_tx(&mut tx, JobKind::Visualization, visualization_id).await?;
		tx.commit().await?;

		self.count_scheduled(&req.user_id, Operation::Visualization).await;

		Ok(GenerateVisualizationResponse { visualization_id })
	}

	pub async fn regenerate_visualization(
		&self,
		req: RegenerateVisualizationRequest,
	) -> Result<GenerateVisualizationResponse> {
		require_user(&req.user_id)?;

		let (job, _room, _project) =
			self.owned_visualization(&req.user_id, req.visualization_id).await?;

		if let Some(message) =
			self.check_rate_limit(&req.user_id, Operation::Visualization).await?
		{
			return Err(Error::RateLimited { message });
		}

		let mut tx = self.db.pool.begin().await?;

		if !jobs::reset_visualization_tx(&mut tx, job.visualization_id).await? {
			return Err(Error::Conflict {
				message: "Visualization is still running and cannot be regenerated.".to_string(),
			});
		}

		outbox::enqueue_tx(&mut tx, JobKind::Visualization, job.visualization_id).await?;
		tx.commit().await?;

		self.count_scheduled(&req.user_id, Operation::Visualization).await;

		Ok(GenerateVisualizationResponse { visualization_id: job.visualization_id })
	}
}
