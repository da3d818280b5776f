//! Recommendation tiers, items, and the helpers that shape them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
	QuickWins,
	Transformations,
	Custom,
}
impl Tier {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::QuickWins => "quick_wins",
			Self::Transformations => "transformations",
			Self::Custom => "custom",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"quick_wins" => Some(Self::QuickWins),
			"transformations" => Some(Self::Transformations),
			"custom" => Some(Self::Custom),
			_ => None,
		}
	}

	/// Inclusive bounds on how many items a generation for this tier returns.
	pub fn item_bounds(&self) -> (usize, usize) {
		match self {
			Self::QuickWins => (5, 7),
			Self::Transformations => (3, 5),
			Self::Custom => (1, 1),
		}
	}

	/// Inclusive USD bounds the prompt asks the model to stay within.
	pub fn cost_bounds(&self) -> (u32, u32) {
		match self {
			Self::QuickWins => (0, 200),
			Self::Transformations => (200, 2_000),
			Self::Custom => (0, 2_000),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
	Furniture,
	Decor,
	Lighting,
	Textiles,
	Storage,
	Paint,
	Layout,
	Plants,
}
impl Category {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Furniture => "furniture",
			Self::Decor => "decor",
			Self::Lighting => "lighting",
			Self::Textiles => "textiles",
			Self::Storage => "storage",
			Self::Paint => "paint",
			Self::Layout => "layout",
			Self::Plants => "plants",
		}
	}

	/// Categories worth a shopping-search lookup. Paint and layout advice have
	/// no single purchasable product behind them.
	pub fn is_purchasable(&self) -> bool {
		matches!(
			self,
			Self::Furniture | Self::Decor | Self::Lighting | Self::Textiles | Self::Storage
		)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
	Low,
	Medium,
	High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
	Easy,
	Moderate,
	Involved,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationItem {
	pub id: String,
	pub title: String,
	pub description: String,
	pub category: Category,
	pub cost_range: String,
	pub impact: ImpactTier,
	pub difficulty: DifficultyTier,
	pub reasoning: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub visualization_prompt: Option<String>,
	/// Raw index into the room's photo array as returned by the model. Kept
	/// for traceability; `suggested_photo_id` is what downstream code uses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub suggested_photo_index: Option<u32>,
	/// Concrete storage id resolved from `suggested_photo_index` before the
	/// record is persisted. The model never sees storage identifiers.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub suggested_photo_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selected: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub matched_product: Option<MatchedProduct>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchedProduct {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image_url: Option<String>,
	pub url: String,
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
}

/// What the recommendation model is asked to return.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendationPayload {
	pub items: Vec<RecommendationItem>,
	pub summary: String,
}
impl RecommendationPayload {
	pub fn validate(&self) -> Result<(), String> {
		if self.items.is_empty() {
			return Err("Recommendation payload contains no items.".to_string());
		}

		let mut seen = HashSet::new();

		for item in &self.items {
			if !seen.insert(item.id.as_str()) {
				return Err(format!("Recommendation item id {} is duplicated.", item.id));
			}
		}

		Ok(())
	}
}

/// Maps a model-suggested photo index onto the room's photo array. The model
/// cannot reference storage identifiers directly, so an absent or out-of-range
/// index falls back to the first photo.
pub fn clamp_photo_index(index: Option<u32>, photo_count: usize) -> usize {
	match index {
		Some(index) if (index as usize) < photo_count => index as usize,
		_ => 0,
	}
}

const STYLE_ADJECTIVES: &[&str] = &[
	"modern",
	"scandinavian",
	"minimalist",
	"cozy",
	"rustic",
	"bohemian",
	"boho",
	"industrial",
	"contemporary",
	"mid-century",
	"vintage",
	"elegant",
	"sleek",
	"chic",
	"stylish",
	"farmhouse",
	"coastal",
	"traditional",
];

/// Builds a shopping-search query from an item title by dropping style
/// adjectives the storefront's search handles poorly.
pub fn strip_style_adjectives(title: &str) -> String {
	title
		.split_whitespace()
		.filter(|word| {
			let bare: String =
				word.chars().filter(|c| c.is_alphanumeric() || *c == '-').collect();

			!STYLE_ADJECTIVES.iter().any(|adj| bare.eq_ignore_ascii_case(adj))
		})
		.collect::<Vec<_>>()
		.join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(id: &str) -> RecommendationItem {
		RecommendationItem {
			id: id.to_string(),
			title: "Wool area rug".to_string(),
			description: "Anchors the seating area.".to_string(),
			category: Category::Textiles,
			cost_range: "$80-150".to_string(),
			impact: ImpactTier::High,
			difficulty: DifficultyTier::Easy,
			reasoning: "The floor reads bare in every photo.".to_string(),
			visualization_prompt: None,
			suggested_photo_index: None,
			suggested_photo_id: None,
			selected: None,
			matched_product: None,
		}
	}

	#[test]
	fn out_of_range_photo_index_falls_back_to_first_photo() {
		assert_eq!(clamp_photo_index(Some(5), 2), 0);
		assert_eq!(clamp_photo_index(Some(1), 2), 1);
		assert_eq!(clamp_photo_index(None, 2), 0);
		assert_eq!(clamp_photo_index(Some(0), 0), 0);
	}

	#[test]
	fn duplicate_item_ids_fail_validation() {
		let payload = RecommendationPayload {
			items: vec![item("a"), item("a")],
			summary: "Two of a kind.".to_string(),
		};

		assert!(payload.validate().is_err());
	}

	#[test]
	fn empty_items_fail_validation() {
		let payload = RecommendationPayload { items: Vec::new(), summary: String::new() };

		assert!(payload.validate().is_err());
	}

	#[test]
	fn tier_bounds_match_product_rules() {
		assert_eq!(Tier::QuickWins.item_bounds(), (5, 7));
		assert_eq!(Tier::Transformations.item_bounds(), (3, 5));
		assert_eq!(Tier::Custom.item_bounds(), (1, 1));
		assert_eq!(Tier::QuickWins.cost_bounds(), (0, 200));
		assert_eq!(Tier::Transformations.cost_bounds(), (200, 2_000));
	}

	#[test]
	fn strips_style_adjectives_case_insensitively() {
		assert_eq!(
			strip_style_adjectives("Modern Scandinavian floor lamp"),
			"floor lamp"
		);
		assert_eq!(
			strip_style_adjectives("Mid-Century walnut sideboard"),
			"walnut sideboard"
		);
		assert_eq!(strip_style_adjectives("bookshelf"), "bookshelf");
	}
}
