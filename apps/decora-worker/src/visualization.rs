//! Runs one visualization job: fetch the source photo (and the optional
//! product reference image), one image-generation call, store the result.
//!
//! The ledger cares whether the billable call actually happened: failures
//! before the provider call record zero units, anything after records one.

use color_eyre::Result;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::{job::VisualizationStatus, pricing::Usage};
use decora_providers::{
	image::ImagePart,
	retry::{self, RetryPolicy},
};
use decora_service::{DesignService, TrackUsage};
use decora_storage::{jobs, models::VisualizationJob};

use crate::worker::WorkerState;

pub(crate) async fn run(state: &WorkerState, visualization_id: Uuid) -> Result<()> {
	let svc = &state.service;
	let Some(job) = jobs::fetch_visualization(&svc.db, visualization_id).await? else {
		tracing::warn!(%visualization_id, "Visualization job vanished before it ran.");

		return Ok(());
	};

	match VisualizationStatus::parse(&job.status) {
		Some(VisualizationStatus::Queued) => {
			jobs::start_visualization(&svc.db, visualization_id).await?;
		},
		Some(VisualizationStatus::Processing) => {},
		_ => return Ok(()),
	}

	// Everything up to the provider call is zero-cost: the original photo has
	// to resolve and download before any billable work happens.
	let photo = match fetch_photo(svc, &job.photo_id).await {
		Ok(photo) => photo,
		Err(message) => {
			jobs::fail_visualization(&svc.db, visualization_id, &message, OffsetDateTime::now_utc())
				.await?;
			track(svc, &job, "failed", 0, Some(&message)).await;

			return Ok(());
		},
	};
	let mut parts = vec![ImagePart::Text(build_render_prompt(&job)), ImagePart::InlineImage {
		mime_type: photo.0,
		bytes: photo.1,
	}];

	// The product reference image is an enrichment; losing it degrades the
	// render rather than failing the job.
	if let Some(product_url) = &job.product_image_url {
		match svc.providers.objects.download(&svc.cfg.storage.objects, product_url).await {
			Ok((mime_type, bytes)) => parts.push(ImagePart::InlineImage { mime_type, bytes }),
			Err(err) => {
				let message = err.to_string();

				tracing::warn!(
					%visualization_id,
					error = message.as_str(),
					"Failed to fetch the product reference image. Rendering without it.",
				);
			},
		}
	}

	let policy = RetryPolicy::from_limits(&svc.cfg.limits);
	let image_cfg = &svc.cfg.providers.image;
	let outcome = retry::with_retry(policy, "visualization", || {
		svc.providers.image.generate(image_cfg, &parts)
	})
	.await;
	let now = OffsetDateTime::now_utc();

	match outcome {
		Ok(generated) => {
			let stored = store_render(svc, generated.bytes, &generated.mime_type).await;

			match stored {
				Ok((image_id, url)) => {
					let output = json!({ "image_id": image_id, "url": url });

					jobs::complete_visualization(&svc.db, visualization_id, &output, now).await?;
					track(svc, &job, "success", 1, None).await;
				},
				Err(message) => {
					jobs::fail_visualization(&svc.db, visualization_id, &message, now).await?;
					track(svc, &job, "failed", 1, Some(&message)).await;
				},
			}
		},
		Err(err) => {
			let message = err.to_string();

			jobs::fail_visualization(&svc.db, visualization_id, &message, now).await?;
			track(svc, &job, "failed", 1, Some(&message)).await;
		},
	}

	Ok(())
}

fn build_render_prompt(job: &VisualizationJob) -> String {
	let mut prompt = format!(
		"Edit the attached room photo to show the following change, keeping the \
room's geometry, camera angle, and everything else unchanged:\n\n{}",
		job.prompt,
	);

	if job.product_image_url.is_some() {
		prompt.push_str(
			"\n\nThe second attached image shows the exact product to place into \
the scene. Match its shape, color, and material.",
		);
	}

	prompt.push_str("\n\nThe result must look like a photograph, not a rendering.");

	prompt
}

async fn fetch_photo(svc: &DesignService, photo_id: &str) -> Result<(String, Vec<u8>), String> {
	let url = svc
		.providers
		.objects
		.get_url(&svc.cfg.storage.objects, photo_id)
		.await
		.map_err(|err| err.to_string())?
		.ok_or_else(|| "The source photo could not be resolved.".to_string())?;

	svc.providers
		.objects
		.download(&svc.cfg.storage.objects, &url)
		.await
		.map_err(|err| err.to_string())
}

// A completed visualization always carries a resolvable URL; a render the
// client cannot reach fails the job the same way a store failure does.
async fn store_render(
	svc: &DesignService,
	bytes: Vec<u8>,
	mime_type: &str,
) -> Result<(String, String), String> {
	let image_id = svc
		.providers
		.objects
		.store(&svc.cfg.storage.objects, bytes, mime_type)
		.await
		.map_err(|err| format!("Failed to store the generated image: {err}"))?;
	let url = svc
		.providers
		.objects
		.get_url(&svc.cfg.storage.objects, &image_id)
		.await
		.map_err(|err| format!("Stored the render but failed to resolve its URL: {err}"))?
		.ok_or_else(|| "Stored the render but its URL did not resolve.".to_string())?;

	Ok((image_id, url))
}

async fn track(
	svc: &DesignService,
	job: &VisualizationJob,
	status: &str,
	api_calls: u64,
	error: Option<&str>,
) {
	svc.track_usage_quietly(TrackUsage {
		provider: svc.cfg.providers.image.provider_id.clone(),
		model: svc.cfg.providers.image.model.clone(),
		operation: "visualization".to_string(),
		status: status.to_string(),
		usage: Usage { input_tokens: 0, output_tokens: 0, units: api_calls },
		room_id: Some(job.room_id),
		project_id: None,
		user_id: None,
		error: error.map(|e| e.to_string()),
	})
	.await;
}
