pub mod analysis;
pub mod delete;
pub mod products;
pub mod projects;
pub mod rate_limit;
pub mod recommendations;
pub mod usage;
pub mod visualization;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

use uuid::Uuid;

pub use analysis::{
	GenerateAnalysisRequest, GenerateAnalysisResponse, RegenerateAnalysisRequest,
	RegenerateAnalysisResponse,
};
use decora_config::{
	ChatProviderConfig, Config, ImageProviderConfig, ObjectStoreConfig, ShoppingProviderConfig,
};
use decora_providers::{
	chat::{self, ChatCompletion, ChatRequest},
	image::{self, GeneratedImage, ImagePart},
	shopping::{self, ShoppingResult},
};
use decora_storage::{
	db::Db,
	models::{AnalysisJob, Project, RecommendationJob, Room, VisualizationJob},
	objects::ObjectStoreClient,
	projects as project_store,
};
pub use delete::{DeleteProjectRequest, DeleteRoomRequest};
pub use error::{Error, Result};
pub use products::{MatchProductsRequest, MatchProductsResponse};
pub use projects::{
	AddRoomPhotoRequest, AddRoomPhotoResponse, CreateProjectRequest, CreateProjectResponse,
	CreateRoomRequest, CreateRoomResponse,
};
pub use recommendations::{
	AskCustomQuestionRequest, GenerateRecommendationsRequest, GenerateRecommendationsResponse,
	RegenerateRecommendationsRequest, SetItemSelectedRequest,
};
pub use usage::{TrackUsage, UsageGroup, UsageSummaryRequest, UsageSummaryResponse};
pub use visualization::{
	GenerateVisualizationRequest, GenerateVisualizationResponse, RegenerateVisualizationRequest,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, decora_providers::Result<ChatCompletion>>;
}

pub trait ImageProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a ImageProviderConfig,
		parts: &'a [ImagePart],
	) -> BoxFuture<'a, decora_providers::Result<GeneratedImage>>;
}

pub trait ShoppingProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a ShoppingProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, decora_providers::Result<Vec<ShoppingResult>>>;

	fn product_detail<'a>(
		&'a self,
		cfg: &'a ShoppingProviderConfig,
		product_id: &'a str,
	) -> BoxFuture<'a, decora_providers::Result<Option<String>>>;
}

pub trait ObjectStore
where
	Self: Send + Sync,
{
	fn store<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		bytes: Vec<u8>,
		mime_type: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<String>>;

	fn get_url<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<Option<String>>>;

	/// Fetches image bytes and their MIME type from a signed URL.
	fn download<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		url: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<(String, Vec<u8>)>>;

	fn delete<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<()>>;
}

struct DefaultProviders;

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, decora_providers::Result<ChatCompletion>> {
		Box::pin(chat::complete(cfg, req))
	}
}

impl ImageProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a ImageProviderConfig,
		parts: &'a [ImagePart],
	) -> BoxFuture<'a, decora_providers::Result<GeneratedImage>> {
		Box::pin(image::generate(cfg, parts))
	}
}

impl ShoppingProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a ShoppingProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, decora_providers::Result<Vec<ShoppingResult>>> {
		Box::pin(shopping::search(cfg, query))
	}

	fn product_detail<'a>(
		&'a self,
		cfg: &'a ShoppingProviderConfig,
		product_id: &'a str,
	) -> BoxFuture<'a, decora_providers::Result<Option<String>>> {
		Box::pin(shopping::product_detail(cfg, product_id))
	}
}

impl ObjectStore for DefaultProviders {
	fn store<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		bytes: Vec<u8>,
		mime_type: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<String>> {
		Box::pin(async move { ObjectStoreClient::new(cfg)?.store(bytes, mime_type).await })
	}

	fn get_url<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<Option<String>>> {
		Box::pin(async move { ObjectStoreClient::new(cfg)?.get_url(id).await })
	}

	fn download<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		url: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<(String, Vec<u8>)>> {
		Box::pin(async move { ObjectStoreClient::new(cfg)?.download(url).await })
	}

	fn delete<'a>(
		&'a self,
		cfg: &'a ObjectStoreConfig,
		id: &'a str,
	) -> BoxFuture<'a, decora_storage::Result<()>> {
		Box::pin(async move { ObjectStoreClient::new(cfg)?.delete(id).await })
	}
}

#[derive(Clone)]
pub struct Providers {
	pub chat: Arc<dyn ChatProvider>,
	pub image: Arc<dyn ImageProvider>,
	pub shopping: Arc<dyn ShoppingProvider>,
	pub objects: Arc<dyn ObjectStore>,
}
impl Providers {
	pub fn new(
		chat: Arc<dyn ChatProvider>,
		image: Arc<dyn ImageProvider>,
		shopping: Arc<dyn ShoppingProvider>,
		objects: Arc<dyn ObjectStore>,
	) -> Self {
		Self { chat, image, shopping, objects }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			chat: provider.clone(),
			image: provider.clone(),
			shopping: provider.clone(),
			objects: provider,
		}
	}
}

pub struct DesignService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl DesignService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}
}

pub(crate) fn require_user(user_id: &str) -> Result<()> {
	if user_id.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "Not authenticated.".to_string() });
	}

	Ok(())
}

// Ownership checks resolve job -> room -> project -> user and fail closed: a
// record owned by someone else reads the same as one that does not exist.
impl DesignService {
	pub(crate) async fn owned_project(&self, user_id: &str, project_id: Uuid) -> Result<Project> {
		let project = project_store::fetch_project(&self.db, project_id)
			.await?
			.filter(|project| project.user_id == user_id)
			.ok_or_else(|| Error::NotFound { message: "Project not found.".to_string() })?;

		Ok(project)
	}

	pub(crate) async fn owned_room(
		&self,
		user_id: &str,
		room_id: Uuid,
	) -> Result<(Room, Project)> {
		let room = project_store::fetch_room(&self.db, room_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Room not found.".to_string() })?;
		let project = project_store::fetch_project(&self.db, room.project_id)
			.await?
			.filter(|project| project.user_id == user_id)
			.ok_or_else(|| Error::NotFound { message: "Room not found.".to_string() })?;

		Ok((room, project))
	}

	pub(crate) async fn owned_analysis(
		&self,
		user_id: &str,
		analysis_id: Uuid,
	) -> Result<(AnalysisJob, Room, Project)> {
		let job = decora_storage::jobs::fetch_analysis(&self.db, analysis_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Analysis not found.".to_string() })?;
		let (room, project) = self
			.owned_room(user_id, job.room_id)
			.await
			.map_err(|_| Error::NotFound { message: "Analysis not found.".to_string() })?;

		Ok((job, room, project))
	}

	pub(crate) async fn owned_recommendation(
		&self,
		user_id: &str,
		recommendation_id: Uuid,
	) -> Result<(RecommendationJob, Room, Project)> {
		let job = decora_storage::jobs::fetch_recommendation(&self.db, recommendation_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Recommendation not found.".to_string() })?;
		let (room, project) = self
			.owned_room(user_id, job.room_id)
			.await
			.map_err(|_| Error::NotFound { message: "Recommendation not found.".to_string() })?;

		Ok((job, room, project))
	}

	pub(crate) async fn owned_visualization(
		&self,
		user_id: &str,
		visualization_id: Uuid,
	) -> Result<(VisualizationJob, Room, Project)> {
		let job = decora_storage::jobs::fetch_visualization(&self.db, visualization_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Visualization not found.".to_string() })?;
		let (room, project) = self
			.owned_room(user_id, job.room_id)
			.await
			.map_err(|_| Error::NotFound { message: "Visualization not found.".to_string() })?;

		Ok((job, room, project))
	}
}
