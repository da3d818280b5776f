//! Runs one analysis job: resolve signed photo URLs, make one vision chat
//! call, parse-then-validate the structured results.

use color_eyre::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::{
	analysis::AnalysisResults,
	job::AnalysisStatus,
	pricing::Usage,
};
use decora_providers::{
	chat::{ChatCompletion, ChatRequest},
	retry::{self, RetryPolicy},
};
use decora_service::{DesignService, TrackUsage};
use decora_storage::{jobs, models::Room, projects};

use crate::worker::WorkerState;

const ANALYSIS_SYSTEM: &str = "\
You are an interior-design analyst. You receive photos of one room and \
describe what is actually visible in them. Respond with a single JSON object \
and nothing else.";

pub(crate) async fn run(state: &WorkerState, analysis_id: Uuid) -> Result<()> {
	let svc = &state.service;
	let Some(job) = jobs::fetch_analysis(&svc.db, analysis_id).await? else {
		tracing::warn!(%analysis_id, "Analysis job vanished before it ran.");

		return Ok(());
	};

	match AnalysisStatus::parse(&job.status) {
		Some(AnalysisStatus::Pending) => {
			jobs::start_analysis(&svc.db, analysis_id).await?;
		},
		// Redelivered after a crash mid-run; we hold the lease, keep going.
		Some(AnalysisStatus::Processing) => {},
		_ => return Ok(()),
	}

	let Some(room) = projects::fetch_room(&svc.db, job.room_id).await? else {
		jobs::fail_analysis(
			&svc.db,
			analysis_id,
			"Room no longer exists.",
			OffsetDateTime::now_utc(),
		)
		.await?;

		return Ok(());
	};
	let style_profile = projects::fetch_project(&svc.db, room.project_id)
		.await?
		.and_then(|project| project.style_profile);
	let mut image_urls = Vec::new();

	for photo_id in job.photo_ids() {
		match svc.providers.objects.get_url(&svc.cfg.storage.objects, &photo_id).await {
			Ok(Some(url)) => image_urls.push(url),
			Ok(None) => {
				tracing::warn!(photo_id, "Room photo is missing from storage. Skipping.");
			},
			Err(err) => {
				tracing::warn!(photo_id, error = %err, "Failed to resolve a photo URL. Skipping.");
			},
		}
	}

	if image_urls.is_empty() {
		let message = "None of the room photos could be resolved.";

		jobs::fail_analysis(&svc.db, analysis_id, message, OffsetDateTime::now_utc()).await?;
		track(svc, job.room_id, "failed", Usage::default(), Some(message)).await;

		return Ok(());
	}

	let req = ChatRequest {
		system: ANALYSIS_SYSTEM.to_string(),
		user_text: build_analysis_prompt(&room, image_urls.len(), style_profile.as_ref()),
		image_urls,
		force_json: true,
	};
	let policy = RetryPolicy::from_limits(&svc.cfg.limits);
	let chat_cfg = &svc.cfg.providers.chat;
	let outcome =
		retry::with_retry(policy, "analysis", || svc.providers.chat.complete(chat_cfg, &req))
			.await;
	let now = OffsetDateTime::now_utc();

	match outcome {
		Ok(completion) => {
			let usage = Usage {
				input_tokens: completion.input_tokens,
				output_tokens: completion.output_tokens,
				units: 0,
			};

			match parse_analysis_results(&completion) {
				Ok(results) => {
					jobs::complete_analysis(
						&svc.db,
						analysis_id,
						&serde_json::to_value(&results)?,
						now,
					)
					.await?;
					track(svc, job.room_id, "success", usage, None).await;
				},
				Err(message) => {
					jobs::fail_analysis(&svc.db, analysis_id, &message, now).await?;
					track(svc, job.room_id, "failed", usage, Some(&message)).await;
				},
			}
		},
		Err(err) => {
			let message = err.to_string();

			jobs::fail_analysis(&svc.db, analysis_id, &message, now).await?;
			track(svc, job.room_id, "failed", Usage::default(), Some(&message)).await;
		},
	}

	Ok(())
}

fn build_analysis_prompt(
	room: &Room,
	photo_count: usize,
	style_profile: Option<&serde_json::Value>,
) -> String {
	let mut prompt = format!(
		"Analyze the {photo_count} attached photo(s) of the room {:?} (type: {}).\n\n",
		room.name, room.room_type,
	);

	if let Some(profile) = style_profile {
		prompt.push_str(&format!(
			"The owner recorded these style preferences: {profile}\n\n"
		));
	}

	prompt.push_str(&format!(
		"\
Return one JSON object with exactly these keys:
- \"furniture\": array of strings, every piece of furniture visible
- \"lighting\": string describing the lighting situation
- \"colors\": array of strings, the dominant colors
- \"layout\": string describing how the room is laid out
- \"style\": object with \"detected\" (the closest interior-design style name) \
and \"confidence\" (number between 0 and 1)
- \"photo_descriptions\": array of {photo_count} strings, one short description \
per photo in order

Describe only what is visible. Do not invent furniture that is not in the \
photos."
	));

	prompt
}

fn parse_analysis_results(completion: &ChatCompletion) -> Result<AnalysisResults, String> {
	let value = completion.json().map_err(|err| err.to_string())?;
	let results: AnalysisResults = serde_json::from_value(value)
		.map_err(|_| "Analysis response does not match the expected schema.".to_string())?;

	results.validate()?;

	Ok(results)
}

async fn track(
	svc: &DesignService,
	room_id: Uuid,
	status: &str,
	usage: Usage,
	error: Option<&str>,
) {
	svc.track_usage_quietly(TrackUsage {
		provider: svc.cfg.providers.chat.provider_id.clone(),
		model: svc.cfg.providers.chat.model.clone(),
		operation: "analysis".to_string(),
		status: status.to_string(),
		usage,
		room_id: Some(room_id),
		project_id: None,
		user_id: None,
		error: error.map(|e| e.to_string()),
	})
	.await;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn completion(content: &str) -> ChatCompletion {
		ChatCompletion { content: content.to_string(), input_tokens: 10, output_tokens: 5 }
	}

	#[test]
	fn well_formed_response_parses() {
		let results = parse_analysis_results(&completion(
			r#"{
				"furniture": ["sofa"],
				"lighting": "dim",
				"colors": ["gray"],
				"layout": "L-shaped seating",
				"style": { "detected": "industrial", "confidence": 0.7 }
			}"#,
		))
		.expect("parse failed");

		assert_eq!(results.style.detected, "industrial");
		assert!(results.photo_descriptions.is_empty());
	}

	#[test]
	fn schema_mismatch_becomes_a_failure_message() {
		let err = parse_analysis_results(&completion(r#"{ "furniture": "not-an-array" }"#))
			.expect_err("should not parse");

		assert!(err.contains("schema"));
	}

	#[test]
	fn invalid_confidence_becomes_a_failure_message() {
		let err = parse_analysis_results(&completion(
			r#"{
				"furniture": [],
				"lighting": "bright",
				"colors": [],
				"layout": "open",
				"style": { "detected": "boho", "confidence": 3.0 }
			}"#,
		))
		.expect_err("should fail validation");

		assert!(err.contains("confidence"));
	}

	#[test]
	fn prompt_mentions_room_and_photo_count() {
		let room = Room {
			room_id: Uuid::new_v4(),
			project_id: Uuid::new_v4(),
			name: "Living room".to_string(),
			room_type: "living_room".to_string(),
			photos: serde_json::json!(["a", "b"]),
			created_at: OffsetDateTime::now_utc(),
		};
		let prompt = build_analysis_prompt(&room, 2, None);

		assert!(prompt.contains("Living room"));
		assert!(prompt.contains("2 attached photo(s)"));
		assert!(prompt.contains("photo_descriptions"));
	}
}
