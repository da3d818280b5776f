//! Cost estimation for external provider calls.
//!
//! Pure and fail-open: an unknown model estimates to zero so telemetry can
//! never block the user-facing operation. All monetary values are rounded to
//! six decimal places before storage or aggregation so repeated additions do
//! not accumulate floating-point drift.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
	#[serde(default)]
	pub input_tokens: u64,
	#[serde(default)]
	pub output_tokens: u64,
	/// Billable call units for per-call-billed providers (generated images,
	/// shopping searches).
	#[serde(default)]
	pub units: u64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPrice {
	/// USD per million input tokens.
	pub input_per_million: f64,
	/// USD per million output tokens.
	pub output_per_million: f64,
	/// Flat USD per billable unit for per-call-billed providers.
	pub per_unit: f64,
}

/// Fallback prices used when the config carries no override for a model.
pub fn fallback_price(model: &str) -> Option<ModelPrice> {
	let price = match model {
		"gpt-4o" => ModelPrice { input_per_million: 2.5, output_per_million: 10.0, per_unit: 0.0 },
		"gpt-4o-mini" =>
			ModelPrice { input_per_million: 0.15, output_per_million: 0.6, per_unit: 0.0 },
		"gemini-2.5-flash" =>
			ModelPrice { input_per_million: 0.3, output_per_million: 2.5, per_unit: 0.0 },
		"gemini-2.5-flash-image" =>
			ModelPrice { input_per_million: 0.0, output_per_million: 0.0, per_unit: 0.039 },
		"serpapi-shopping" =>
			ModelPrice { input_per_million: 0.0, output_per_million: 0.0, per_unit: 0.015 },
		_ => return None,
	};

	Some(price)
}

pub fn round6(value: f64) -> f64 {
	(value * 1_000_000.0).round() / 1_000_000.0
}

/// Estimated USD cost of one provider call. Config overrides win over the
/// hardcoded fallbacks; a model known to neither estimates to zero.
pub fn estimate_cost(model: &str, usage: &Usage, overrides: &HashMap<String, ModelPrice>) -> f64 {
	let Some(price) = overrides.get(model).copied().or_else(|| fallback_price(model)) else {
		return 0.0;
	};
	let token_cost = usage.input_tokens as f64 / 1_000_000.0 * price.input_per_million
		+ usage.output_tokens as f64 / 1_000_000.0 * price.output_per_million;
	let unit_cost = usage.units as f64 * price.per_unit;

	round6(token_cost + unit_cost)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn one_million_input_tokens_cost_the_input_price() {
		let usage = Usage { input_tokens: 1_000_000, output_tokens: 0, units: 0 };

		assert_eq!(estimate_cost("gpt-4o", &usage, &HashMap::new()), 2.5);
	}

	#[test]
	fn unknown_model_estimates_to_zero() {
		let usage = Usage { input_tokens: 1_000_000, output_tokens: 1_000_000, units: 3 };

		assert_eq!(estimate_cost("mystery-model", &usage, &HashMap::new()), 0.0);
	}

	#[test]
	fn overrides_win_over_fallbacks() {
		let mut overrides = HashMap::new();

		overrides.insert(
			"gpt-4o".to_string(),
			ModelPrice { input_per_million: 1.0, output_per_million: 2.0, per_unit: 0.0 },
		);

		let usage = Usage { input_tokens: 500_000, output_tokens: 250_000, units: 0 };

		assert_eq!(estimate_cost("gpt-4o", &usage, &overrides), 1.0);
	}

	#[test]
	fn per_unit_billing_applies_to_image_models() {
		let usage = Usage { input_tokens: 0, output_tokens: 0, units: 2 };

		assert_eq!(estimate_cost("gemini-2.5-flash-image", &usage, &HashMap::new()), 0.078);
	}

	#[test]
	fn rounds_to_six_decimal_places() {
		assert_eq!(round6(0.123_456_789), 0.123_457);
		assert_eq!(round6(1.000_000_4), 1.0);

		let usage = Usage { input_tokens: 1, output_tokens: 0, units: 0 };

		// 1 token of gpt-4o input is $0.0000025, which rounds to $0.000003.
		assert_eq!(estimate_cost("gpt-4o", &usage, &HashMap::new()), 0.000_003);
	}
}
