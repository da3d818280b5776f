//! Cascading deletes. Rows go first, inside one transaction; the storage
//! objects they referenced are deleted best-effort after the commit, so a
//! storage hiccup can never resurrect a deleted room.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use decora_storage::projects as project_store;

use crate::{DesignService, Result, require_user};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteRoomRequest {
	pub user_id: String,
	pub room_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteProjectRequest {
	pub user_id: String,
	pub project_id: Uuid,
}

impl DesignService {
	pub async fn delete_room(&self, req: DeleteRoomRequest) -> Result<()> {
		require_user(&req.user_id)?;

		let (room, _project) = self.owned_room(&req.user_id, req.room_id).await?;
		let mut tx = self.db.pool.begin().await?;
		let object_ids = project_store::delete_room_rows(&mut tx, room.room_id).await?;

		tx.commit().await?;

		self.delete_objects(&object_ids).await;

		Ok(())
	}

	pub async fn delete_project(&self, req: DeleteProjectRequest) -> Result<()> {
		require_user(&req.user_id)?;

		let project = self.owned_project(&req.user_id, req.project_id).await?;
		let rooms = project_store::rooms_for_project(&self.db, project.project_id).await?;
		let mut tx = self.db.pool.begin().await?;
		let mut object_ids = Vec::new();

		for room in &rooms {
			object_ids.extend(project_store::delete_room_rows(&mut tx, room.room_id).await?);
		}

		project_store::delete_project_row(&mut tx, project.project_id).await?;
		tx.commit().await?;

		self.delete_objects(&object_ids).await;

		Ok(())
	}

	async fn delete_objects(&self, object_ids: &[String]) {
		for object_id in object_ids {
			let result =
				self.providers.objects.delete(&self.cfg.storage.objects, object_id).await;

			if let Err(err) = result {
				tracing::warn!(object_id, error = %err, "Failed to delete a storage object.");
			}
		}
	}
}
