//! Thin CRUD for projects, rooms, and room photos. The pipeline handlers all
//! hang off records created here.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use decora_storage::{
	models::{Project, Room},
	projects as project_store,
};

use crate::{DesignService, Error, Result, require_user};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateProjectRequest {
	pub user_id: String,
	pub name: String,
	/// Free-form style preferences carried into every prompt for the project.
	pub style_profile: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateProjectResponse {
	pub project_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateRoomRequest {
	pub user_id: String,
	pub project_id: Uuid,
	pub name: String,
	pub room_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
	pub room_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct AddRoomPhotoRequest {
	pub user_id: String,
	pub room_id: Uuid,
	pub bytes: Vec<u8>,
	pub mime_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddRoomPhotoResponse {
	pub photo_id: String,
}

impl DesignService {
	pub async fn create_project(&self, req: CreateProjectRequest) -> Result<CreateProjectResponse> {
		require_user(&req.user_id)?;

		if req.name.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Project name must not be empty.".to_string(),
			});
		}

		let project = Project {
			project_id: Uuid::new_v4(),
			user_id: req.user_id,
			name: req.name.trim().to_string(),
			style_profile: req.style_profile,
			created_at: OffsetDateTime::now_utc(),
		};

		project_store::insert_project(&self.db, &project).await?;

		Ok(CreateProjectResponse { project_id: project.project_id })
	}

	pub async fn create_room(&self, req: CreateRoomRequest) -> Result<CreateRoomResponse> {
		require_user(&req.user_id)?;

		if req.name.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Room name must not be empty.".to_string(),
			});
		}

		let _project = self.owned_project(&req.user_id, req.project_id).await?;
		let room = Room {
			room_id: Uuid::new_v4(),
			project_id: req.project_id,
			name: req.name.trim().to_string(),
			room_type: req.room_type,
			photos: json!([]),
			created_at: OffsetDateTime::now_utc(),
		};

		project_store::insert_room(&self.db, &room).await?;

		Ok(CreateRoomResponse { room_id: room.room_id })
	}

	/// Stores the photo bytes first, then appends the resulting id to the
	/// room's photo array. A failed append leaves an orphan object behind; the
	/// store is periodically compacted out of band.
	pub async fn add_room_photo(&self, req: AddRoomPhotoRequest) -> Result<AddRoomPhotoResponse> {
		require_user(&req.user_id)?;

		if req.bytes.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Photo upload is empty.".to_string(),
			});
		}

		let (room, _project) = self.owned_room(&req.user_id, req.room_id).await?;
		let photo_id = self
			.providers
			.objects
			.store(&self.cfg.storage.objects, req.bytes, &req.mime_type)
			.await?;

		project_store::append_room_photo(&self.db, room.room_id, &photo_id).await?;

		Ok(AddRoomPhotoResponse { photo_id })
	}
}
