//! Image generation from ordered text + inline-image parts.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One ordered part of the generation request. Inline images carry raw bytes;
/// encoding happens at the wire boundary.
#[derive(Clone, Debug)]
pub enum ImagePart {
	Text(String),
	InlineImage { mime_type: String, bytes: Vec<u8> },
}

#[derive(Clone, Debug)]
pub struct GeneratedImage {
	pub mime_type: String,
	pub bytes: Vec<u8>,
}

pub async fn generate(
	cfg: &decora_config::ImageProviderConfig,
	parts: &[ImagePart],
) -> Result<GeneratedImage> {
	if cfg.api_key.trim().is_empty() {
		return Err(Error::MissingCredentials {
			message: "Image provider api_key is not configured.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let wire_parts: Vec<Value> = parts
		.iter()
		.map(|part| match part {
			ImagePart::Text(text) => serde_json::json!({ "text": text }),
			ImagePart::InlineImage { mime_type, bytes } => serde_json::json!({
				"inline_data": {
					"mime_type": mime_type,
					"data": BASE64.encode(bytes),
				},
			}),
		})
		.collect();
	let body = serde_json::json!({
		"contents": [ { "parts": wire_parts } ],
		"generationConfig": { "responseModalities": ["IMAGE"] },
	});
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

	parse_image_response(json)
}

/// Takes the first inline image part found in any candidate.
fn parse_image_response(json: Value) -> Result<GeneratedImage> {
	let candidates = json
		.get("candidates")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::invalid_response("Image response is missing candidates."))?;

	for candidate in candidates {
		let Some(parts) = candidate
			.get("content")
			.and_then(|content| content.get("parts"))
			.and_then(|parts| parts.as_array())
		else {
			continue;
		};

		for part in parts {
			let Some(inline) = part.get("inline_data").or_else(|| part.get("inlineData")) else {
				continue;
			};
			let mime_type = inline
				.get("mime_type")
				.or_else(|| inline.get("mimeType"))
				.and_then(|v| v.as_str())
				.unwrap_or("image/png")
				.to_string();
			let data = inline
				.get("data")
				.and_then(|v| v.as_str())
				.ok_or_else(|| Error::invalid_response("Inline image part has no data."))?;
			let bytes = BASE64
				.decode(data)
				.map_err(|_| Error::invalid_response("Inline image data is not valid base64."))?;

			return Ok(GeneratedImage { mime_type, bytes });
		}
	}

	Err(Error::invalid_response("Image response contains no inline image."))
}
