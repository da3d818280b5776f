//! The structured result of a room analysis.
//!
//! The vision model is asked for one JSON object matching this schema. The
//! worker parses first and validates second, so a malformed response becomes
//! an invalid-response failure rather than a panic or a silently wrong record.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResults {
	pub furniture: Vec<String>,
	pub lighting: String,
	pub colors: Vec<String>,
	pub layout: String,
	pub style: DetectedStyle,
	/// Per-photo text descriptions, used later to match recommendation items
	/// to specific photos. Older model outputs omit this field.
	#[serde(default)]
	pub photo_descriptions: Vec<String>,
}
impl AnalysisResults {
	pub fn validate(&self) -> Result<(), String> {
		if self.style.detected.trim().is_empty() {
			return Err("Analysis is missing a detected style.".to_string());
		}
		if !(0.0..=1.0).contains(&self.style.confidence) {
			return Err(format!(
				"Analysis style confidence {} is outside the range 0.0-1.0.",
				self.style.confidence
			));
		}

		Ok(())
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectedStyle {
	pub detected: String,
	pub confidence: f32,
}
