//! HTTP client for the external object store.
//!
//! Only the store/get_url/download/delete contract matters; the store itself
//! is an external collaborator. A missing object resolves to `None` rather
//! than an error because workers decide per call site whether that is fatal.

use std::time::Duration;

use reqwest::{
	Client, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde_json::Value;

use crate::{Error, Result};

pub struct ObjectStoreClient {
	api_base: String,
	api_token: String,
	client: Client,
}
impl ObjectStoreClient {
	pub fn new(cfg: &decora_config::ObjectStoreConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			api_base: cfg.api_base.trim_end_matches('/').to_string(),
			api_token: cfg.api_token.clone(),
			client,
		})
	}

	pub async fn store(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String> {
		let res = self
			.client
			.post(format!("{}/objects", self.api_base))
			.header(AUTHORIZATION, format!("Bearer {}", self.api_token))
			.header("content-type", mime_type)
			.body(bytes)
			.send()
			.await?;

		if !res.status().is_success() {
			return Err(Error::ObjectStore(format!(
				"Store request returned HTTP {}.",
				res.status()
			)));
		}

		let json: Value = res.json().await?;

		json.get("id")
			.and_then(|v| v.as_str())
			.map(|id| id.to_string())
			.ok_or_else(|| Error::ObjectStore("Store response is missing an id.".to_string()))
	}

	pub async fn get_url(&self, id: &str) -> Result<Option<String>> {
		let res = self
			.client
			.get(format!("{}/objects/{id}/url", self.api_base))
			.header(AUTHORIZATION, format!("Bearer {}", self.api_token))
			.send()
			.await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !res.status().is_success() {
			return Err(Error::ObjectStore(format!(
				"URL request returned HTTP {}.",
				res.status()
			)));
		}

		let json: Value = res.json().await?;

		Ok(json.get("url").and_then(|v| v.as_str()).map(|url| url.to_string()))
	}

	/// Downloads image bytes from a signed URL previously handed out by
	/// `get_url`. Signed URLs carry their own authorization.
	pub async fn download(&self, url: &str) -> Result<(String, Vec<u8>)> {
		let res = self.client.get(url).send().await?;

		if !res.status().is_success() {
			return Err(Error::ObjectStore(format!(
				"Image download returned HTTP {}.",
				res.status()
			)));
		}

		let mime_type = res
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.unwrap_or("image/jpeg")
			.to_string();
		let bytes = res.bytes().await?.to_vec();

		if bytes.is_empty() {
			return Err(Error::ObjectStore("Image download returned an empty body.".to_string()));
		}

		Ok((mime_type, bytes))
	}

	pub async fn delete(&self, id: &str) -> Result<()> {
		let res = self
			.client
			.delete(format!("{}/objects/{id}", self.api_base))
			.header(AUTHORIZATION, format!("Bearer {}", self.api_token))
			.send()
			.await?;

		// Deleting an already-missing object is fine; cascade cleanup is
		// best-effort and may race itself.
		if !res.status().is_success() && res.status() != StatusCode::NOT_FOUND {
			return Err(Error::ObjectStore(format!(
				"Delete request returned HTTP {}.",
				res.status()
			)));
		}

		Ok(())
	}
}
