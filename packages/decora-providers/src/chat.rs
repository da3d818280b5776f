//! Vision-capable chat completion.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
	pub system: String,
	pub user_text: String,
	/// Signed URLs attached as inline image parts of the user message.
	pub image_urls: Vec<String>,
	pub force_json: bool,
}

#[derive(Clone, Debug)]
pub struct ChatCompletion {
	pub content: String,
	pub input_tokens: u64,
	pub output_tokens: u64,
}
impl ChatCompletion {
	/// The content is expected to be one JSON object when `force_json` was
	/// set. A model occasionally wraps it in a code fence anyway.
	pub fn json(&self) -> Result<Value> {
		let trimmed = self
			.content
			.trim()
			.trim_start_matches("```json")
			.trim_start_matches("```")
			.trim_end_matches("```")
			.trim();

		serde_json::from_str(trimmed)
			.map_err(|_| Error::invalid_response("Chat content is not valid JSON."))
	}
}

pub async fn complete(
	cfg: &decora_config::ChatProviderConfig,
	req: &ChatRequest,
) -> Result<ChatCompletion> {
	if cfg.api_key.trim().is_empty() {
		return Err(Error::MissingCredentials {
			message: "Chat provider api_key is not configured.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut user_parts = vec![serde_json::json!({ "type": "text", "text": req.user_text })];

	for image_url in &req.image_urls {
		user_parts.push(serde_json::json!({
			"type": "image_url",
			"image_url": { "url": image_url },
		}));
	}

	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": req.system },
			{ "role": "user", "content": user_parts },
		],
	});

	if req.force_json {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Status { status });
	}

	let json: Value = res.json().await?;

	parse_chat_response(json)
}

fn parse_chat_response(json: Value) -> Result<ChatCompletion> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::invalid_response("Chat response is missing message content."))?
		.to_string();
	let usage = json.get("usage");
	let input_tokens =
		usage.and_then(|u| u.get("prompt_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);
	let output_tokens =
		usage.and_then(|u| u.get("completion_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);

	Ok(ChatCompletion { content, input_tokens, output_tokens })
}
