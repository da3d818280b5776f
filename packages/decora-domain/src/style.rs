//! Style vocabulary hints injected into recommendation prompts.

/// Vocabulary the recommendation prompt attaches to a detected or user-chosen
/// style name so the model speaks in concrete materials and shapes rather
/// than restating the style label.
pub fn style_vocabulary(style: &str) -> Option<&'static str> {
	let hint = match style.trim().to_ascii_lowercase().as_str() {
		"scandinavian" => "light woods, pale neutrals, clean lines, soft layered textiles",
		"mid-century" | "mid-century modern" =>
			"walnut and teak, tapered legs, geometric patterns, saturated accent colors",
		"industrial" => "exposed metal, reclaimed wood, matte black fixtures, raw finishes",
		"bohemian" | "boho" =>
			"layered patterns, rattan and jute, trailing plants, warm earthy tones",
		"minimalist" => "hidden storage, monochrome palette, negative space, low profiles",
		"rustic" | "farmhouse" =>
			"distressed wood, woven baskets, linen, wrought iron, vintage accents",
		"coastal" => "whites and blues, light linen, driftwood tones, airy layouts",
		"traditional" => "symmetry, rich wood tones, classic silhouettes, layered rugs",
		_ => return None,
	};

	Some(hint)
}
