//! Project and room rows, plus the cascade that keeps no job record alive
//! past its room.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{Project, Room},
};

pub async fn insert_project(db: &Db, project: &Project) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO projects (project_id, user_id, name, style_profile, created_at)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(project.project_id)
	.bind(project.user_id.as_str())
	.bind(project.name.as_str())
	.bind(project.style_profile.as_ref())
	.bind(project.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn fetch_project(db: &Db, project_id: Uuid) -> Result<Option<Project>> {
	let project =
		sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE project_id = $1")
			.bind(project_id)
			.fetch_optional(&db.pool)
			.await?;

	Ok(project)
}

pub async fn insert_room(db: &Db, room: &Room) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO rooms (room_id, project_id, name, room_type, photos, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(room.room_id)
	.bind(room.project_id)
	.bind(room.name.as_str())
	.bind(room.room_type.as_str())
	.bind(&room.photos)
	.bind(room.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn fetch_room(db: &Db, room_id: Uuid) -> Result<Option<Room>> {
	let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE room_id = $1")
		.bind(room_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(room)
}

pub async fn rooms_for_project(db: &Db, project_id: Uuid) -> Result<Vec<Room>> {
	let rooms = sqlx::query_as::<_, Room>(
		"SELECT * FROM rooms WHERE project_id = $1 ORDER BY created_at ASC",
	)
	.bind(project_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rooms)
}

pub async fn append_room_photo(db: &Db, room_id: Uuid, photo_id: &str) -> Result<()> {
	sqlx::query(
		"UPDATE rooms SET photos = photos || to_jsonb($2::text) WHERE room_id = $1",
	)
	.bind(room_id)
	.bind(photo_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Deletes every job row owned by the room and the room itself, returning the
/// storage object ids the deleted rows referenced (room photos and generated
/// visualization outputs). The caller deletes those objects best-effort after
/// the transaction commits.
pub async fn delete_room_rows(
	tx: &mut Transaction<'_, Postgres>,
	room_id: Uuid,
) -> Result<Vec<String>> {
	let mut object_ids: Vec<String> = sqlx::query_scalar(
		"\
SELECT output->>'image_id'
FROM visualization_jobs
WHERE room_id = $1 AND output->>'image_id' IS NOT NULL",
	)
	.bind(room_id)
	.fetch_all(&mut **tx)
	.await?;
	let photo_ids: Vec<String> = sqlx::query_scalar(
		"SELECT jsonb_array_elements_text(photos) FROM rooms WHERE room_id = $1",
	)
	.bind(room_id)
	.fetch_all(&mut **tx)
	.await?;

	object_ids.extend(photo_ids);

	sqlx::query(
		"\
DELETE FROM product_match_jobs
WHERE recommendation_id IN (SELECT recommendation_id FROM recommendation_jobs WHERE room_id = $1)",
	)
	.bind(room_id)
	.execute(&mut **tx)
	.await?;
	sqlx::query("DELETE FROM recommendation_jobs WHERE room_id = $1")
		.bind(room_id)
		.execute(&mut **tx)
		.await?;
	sqlx::query("DELETE FROM analysis_jobs WHERE room_id = $1")
		.bind(room_id)
		.execute(&mut **tx)
		.await?;
	sqlx::query("DELETE FROM visualization_jobs WHERE room_id = $1")
		.bind(room_id)
		.execute(&mut **tx)
		.await?;
	sqlx::query("DELETE FROM rooms WHERE room_id = $1").bind(room_id).execute(&mut **tx).await?;

	Ok(object_ids)
}

pub async fn delete_project_row(
	tx: &mut Transaction<'_, Postgres>,
	project_id: Uuid,
) -> Result<()> {
	sqlx::query("DELETE FROM projects WHERE project_id = $1")
		.bind(project_id)
		.execute(&mut **tx)
		.await?;

	Ok(())
}
