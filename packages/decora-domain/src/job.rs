//! Job lifecycle states.
//!
//! Every job record moves along a monotonic path from its initial state to one
//! of the terminal states. The only way back out of a terminal state is an
//! explicit user-triggered regenerate, which resets the same record to its
//! in-progress entry state.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
	Analysis,
	Recommendation,
	Visualization,
	ProductMatch,
}
impl JobKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Analysis => "analysis",
			Self::Recommendation => "recommendation",
			Self::Visualization => "visualization",
			Self::ProductMatch => "product_match",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"analysis" => Some(Self::Analysis),
			"recommendation" => Some(Self::Recommendation),
			"visualization" => Some(Self::Visualization),
			"product_match" => Some(Self::ProductMatch),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}
impl AnalysisStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"pending" => Some(Self::Pending),
			"processing" => Some(Self::Processing),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	pub fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Pending, Self::Processing)
				| (Self::Processing, Self::Completed)
				| (Self::Processing, Self::Failed)
		)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
	Generating,
	Completed,
	Failed,
}
impl RecommendationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Generating => "generating",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"generating" => Some(Self::Generating),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	pub fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Generating, Self::Completed) | (Self::Generating, Self::Failed)
		)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationStatus {
	Queued,
	Processing,
	Completed,
	Failed,
}
impl VisualizationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Queued => "queued",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"queued" => Some(Self::Queued),
			"processing" => Some(Self::Processing),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	pub fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Queued, Self::Processing)
				| (Self::Processing, Self::Completed)
				| (Self::Processing, Self::Failed)
		)
	}
}

/// Product matching is best-effort enrichment. Per-item misses are simply
/// absent from the result set, so the batch has no failed terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductMatchStatus {
	Pending,
	Searching,
	Completed,
}
impl ProductMatchStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Searching => "searching",
			Self::Completed => "completed",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"pending" => Some(Self::Pending),
			"searching" => Some(Self::Searching),
			"completed" => Some(Self::Completed),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analysis_transitions_follow_documented_paths() {
		assert!(AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Processing));
		assert!(AnalysisStatus::Processing.can_transition_to(AnalysisStatus::Completed));
		assert!(AnalysisStatus::Processing.can_transition_to(AnalysisStatus::Failed));
		assert!(!AnalysisStatus::Pending.can_transition_to(AnalysisStatus::Completed));
		assert!(!AnalysisStatus::Completed.can_transition_to(AnalysisStatus::Processing));
		assert!(!AnalysisStatus::Failed.can_transition_to(AnalysisStatus::Completed));
	}

	#[test]
	fn recommendation_skips_pending() {
		assert!(RecommendationStatus::Generating.can_transition_to(RecommendationStatus::Completed));
		assert!(RecommendationStatus::Generating.can_transition_to(RecommendationStatus::Failed));
		assert!(!RecommendationStatus::Completed.can_transition_to(RecommendationStatus::Failed));
	}

	#[test]
	fn status_strings_round_trip() {
		for status in [
			AnalysisStatus::Pending,
			AnalysisStatus::Processing,
			AnalysisStatus::Completed,
			AnalysisStatus::Failed,
		] {
			assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
		}
		for kind in [
			JobKind::Analysis,
			JobKind::Recommendation,
			JobKind::Visualization,
			JobKind::ProductMatch,
		] {
			assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
		}
	}
}
