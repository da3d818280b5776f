//! Runs one recommendation job: build a context block from the completed
//! analysis, one chat call, parse-then-validate the item list, resolve
//! suggested photos, and kick off product matching when shopping is on.

use color_eyre::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use decora_domain::{
	job::{JobKind, RecommendationStatus},
	pricing::Usage,
	recommendation::{
		RecommendationItem, RecommendationPayload, Tier, clamp_photo_index,
	},
	style,
};
use decora_providers::{
	chat::{ChatCompletion, ChatRequest},
	retry::{self, RetryPolicy},
};
use decora_service::{DesignService, TrackUsage};
use decora_storage::{jobs, models::Room, outbox, projects};

use crate::worker::WorkerState;

const RECOMMENDATION_SYSTEM: &str = "\
You are an interior designer making concrete, actionable suggestions for one \
room, grounded in an analysis of its photos. Respond with a single JSON \
object and nothing else.";

pub(crate) async fn run(state: &WorkerState, recommendation_id: Uuid) -> Result<()> {
	let svc = &state.service;
	let Some(job) = jobs::fetch_recommendation(&svc.db, recommendation_id).await? else {
		tracing::warn!(%recommendation_id, "Recommendation job vanished before it ran.");

		return Ok(());
	};

	// `generating` doubles as the in-progress state; terminal records are a
	// redelivery of an entry that already finished.
	if RecommendationStatus::parse(&job.status) != Some(RecommendationStatus::Generating) {
		return Ok(());
	}

	let now = OffsetDateTime::now_utc();
	let Some(tier) = Tier::parse(&job.tier) else {
		jobs::fail_recommendation(
			&svc.db,
			recommendation_id,
			&format!("Unknown recommendation tier {:?}.", job.tier),
			now,
		)
		.await?;

		return Ok(());
	};
	let Some(analysis) = jobs::fetch_analysis(&svc.db, job.analysis_id).await? else {
		jobs::fail_recommendation(
			&svc.db,
			recommendation_id,
			"The analysis this job was based on no longer exists.",
			now,
		)
		.await?;

		return Ok(());
	};
	let Some(results) = analysis.results else {
		jobs::fail_recommendation(
			&svc.db,
			recommendation_id,
			"The analysis this job was based on has no results.",
			now,
		)
		.await?;

		return Ok(());
	};
	let Some(room) = projects::fetch_room(&svc.db, job.room_id).await? else {
		jobs::fail_recommendation(&svc.db, recommendation_id, "Room no longer exists.", now)
			.await?;

		return Ok(());
	};
	let style_profile = projects::fetch_project(&svc.db, room.project_id)
		.await?
		.and_then(|project| project.style_profile);
	let req = ChatRequest {
		system: RECOMMENDATION_SYSTEM.to_string(),
		user_text: build_recommendation_prompt(
			&room,
			&results,
			style_profile.as_ref(),
			tier,
			job.question.as_deref(),
		),
		image_urls: Vec::new(),
		force_json: true,
	};
	let policy = RetryPolicy::from_limits(&svc.cfg.limits);
	let chat_cfg = &svc.cfg.providers.chat;
	let outcome = retry::with_retry(policy, "recommendation", || {
		svc.providers.chat.complete(chat_cfg, &req)
	})
	.await;
	let now = OffsetDateTime::now_utc();

	match outcome {
		Ok(completion) => {
			let usage = Usage {
				input_tokens: completion.input_tokens,
				output_tokens: completion.output_tokens,
				units: 0,
			};

			match parse_recommendation_payload(&completion, tier) {
				Ok(mut payload) => {
					resolve_suggested_photos(&mut payload.items, &room.photo_ids());

					jobs::complete_recommendation(
						&svc.db,
						recommendation_id,
						&serde_json::to_value(&payload.items)?,
						&payload.summary,
						now,
					)
					.await?;
					track(svc, job.room_id, "success", usage, None).await;
					maybe_enqueue_product_match(svc, recommendation_id, &payload.items).await?;
				},
				Err(message) => {
					jobs::fail_recommendation(&svc.db, recommendation_id, &message, now).await?;
					track(svc, job.room_id, "failed", usage, Some(&message)).await;
				},
			}
		},
		Err(err) => {
			let message = err.to_string();

			jobs::fail_recommendation(&svc.db, recommendation_id, &message, now).await?;
			track(svc, job.room_id, "failed", Usage::default(), Some(&message)).await;
		},
	}

	Ok(())
}

fn build_recommendation_prompt(
	room: &Room,
	analysis_results: &serde_json::Value,
	style_profile: Option<&serde_json::Value>,
	tier: Tier,
	question: Option<&str>,
) -> String {
	let (min_items, max_items) = tier.item_bounds();
	let (min_cost, max_cost) = tier.cost_bounds();
	let mut prompt = format!(
		"Room: {:?} (type: {}).\n\nAnalysis of the room's photos:\n{analysis_results}\n\n",
		room.name, room.room_type,
	);

	if let Some(profile) = style_profile {
		prompt.push_str(&format!("Owner style preferences: {profile}\n\n"));
	}
	if let Some(detected) = analysis_results
		.pointer("/style/detected")
		.and_then(|v| v.as_str())
		&& let Some(hint) = style::style_vocabulary(detected)
	{
		prompt.push_str(&format!(
			"When suggesting items for the {detected} style, lean on: {hint}.\n\n"
		));
	}

	match tier {
		Tier::Custom => {
			let question = question.unwrap_or("How can this room be improved?");

			prompt.push_str(&format!(
				"The owner asks: {question:?}\n\nAnswer with exactly 1 recommendation item."
			));
		},
		_ => {
			prompt.push_str(&format!(
				"Suggest between {min_items} and {max_items} improvements, each costing \
between ${min_cost} and ${max_cost}."
			));
		},
	}

	prompt.push_str(&format!(
		"\n\n\
Return one JSON object with \"items\" and \"summary\". Each item needs: \
\"id\" (unique slug), \"title\", \"description\", \"category\" (one of \
furniture, decor, lighting, textiles, storage, paint, layout, plants), \
\"cost_range\" (e.g. \"$50-120\"), \"impact\" (low/medium/high), \
\"difficulty\" (easy/moderate/involved), \"reasoning\", \
\"visualization_prompt\" (how a photorealistic render of this change should \
look), and \"suggested_photo_index\" (0-based index of the photo the change \
applies to). \"summary\" is two or three sentences tying the items together."
	));

	prompt
}

fn parse_recommendation_payload(
	completion: &ChatCompletion,
	tier: Tier,
) -> Result<RecommendationPayload, String> {
	let value = completion.json().map_err(|err| err.to_string())?;
	let payload: RecommendationPayload = serde_json::from_value(value)
		.map_err(|_| "Recommendation response does not match the expected schema.".to_string())?;

	payload.validate()?;

	let (min_items, max_items) = tier.item_bounds();
	let count = payload.items.len();

	if count < min_items || count > max_items {
		return Err(format!(
			"Expected between {min_items} and {max_items} items for the {} tier, got {count}.",
			tier.as_str(),
		));
	}

	Ok(payload)
}

/// Resolves each model-suggested photo index to the room's storage id. The
/// raw index stays on the item for traceability.
fn resolve_suggested_photos(items: &mut [RecommendationItem], photo_ids: &[String]) {
	for item in items {
		if photo_ids.is_empty() {
			item.suggested_photo_id = None;

			continue;
		}

		let index = clamp_photo_index(item.suggested_photo_index, photo_ids.len());

		item.suggested_photo_id = Some(photo_ids[index].clone());
	}
}

async fn maybe_enqueue_product_match(
	svc: &DesignService,
	recommendation_id: Uuid,
	items: &[RecommendationItem],
) -> Result<()> {
	if svc.cfg.providers.shopping.is_none() {
		return Ok(());
	}
	if !items.iter().any(|item| item.category.is_purchasable()) {
		return Ok(());
	}
	if jobs::find_active_product_match(&svc.db, recommendation_id).await?.is_some() {
		return Ok(());
	}

	let match_id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();
	let mut tx = svc.db.pool.begin().await?;

	jobs::insert_product_match_tx(&mut tx, match_id, recommendation_id, now).await?;
	outbox::enqueue_tx(&mut tx, JobKind::ProductMatch, match_id).await?;
	tx.commit().await?;

	Ok(())
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
		operation: "recommendation".to_string(),
		status: status.to_string(),
		usage,
		room_id: Some(room_id),
		project_id: None,
		user_id: None,
		error: error.map(|e| e.to_string()),
	})
	.await;
}
