use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
	entity,
	intent::IntentResult,
	params::{ScoreFunction, SearchParameters},
	profile::RelevanceAlgorithm,
};

pub const PROFILE_INTENT: &str = "intent";
pub const PROFILE_PERSONALIZED: &str = "personalized";
pub const PROFILE_STANDARD: &str = "standard";

/// A signed-in user's weighted preferences. Weights are relative; larger is stronger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceVector {
	#[serde(default)]
	pub categories: BTreeMap<String, f32>,
	#[serde(default)]
	pub brands: BTreeMap<String, f32>,
	#[serde(default)]
	pub values: BTreeMap<String, f32>,
	/// Keys are "min-max" price ranges.
	#[serde(default)]
	pub price_ranges: BTreeMap<String, f32>,
	/// 0 means indifferent to price; 1 means strongly price driven.
	#[serde(default)]
	pub price_sensitivity: f32,
}
impl PreferenceVector {
	pub fn is_empty(&self) -> bool {
		self.categories.is_empty()
			&& self.brands.is_empty()
			&& self.values.is_empty()
			&& self.price_ranges.is_empty()
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAssignment {
	pub test_id: String,
	pub variant_id: String,
	pub algorithm: RelevanceAlgorithm,
	/// Blend strength carried by the variant, if it overrides the default.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub strength: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendLimits {
	pub max_items: usize,
	pub max_price_ranges: usize,
}
impl Default for BlendLimits {
	fn default() -> Self {
		Self { max_items: 5, max_price_ranges: 3 }
	}
}

#[derive(Clone, Copy, Debug)]
pub struct OverlayContext<'a> {
	pub intent: Option<&'a IntentResult>,
	pub experiment: Option<&'a ExperimentAssignment>,
	pub preferences: Option<&'a PreferenceVector>,
	/// Personalization strength in [0, 1].
	pub strength: f32,
	pub limits: BlendLimits,
}

/// Which single relevance profile shaped the final parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
	pub relevance_profile: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub personalization_strength: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ab_test: Option<ExperimentAssignment>,
}
impl Provenance {
	fn profile(name: &str) -> Self {
		Self { relevance_profile: name.to_string(), personalization_strength: None, ab_test: None }
	}
}

type Strategy = fn(&SearchParameters, &OverlayContext<'_>) -> Option<(SearchParameters, Provenance)>;

// Strict priority: the first strategy that applies is the only one that runs.
const STRATEGIES: [Strategy; 3] = [intent_profile, experiment_profile, preference_profile];

pub fn overlay(base: SearchParameters, ctx: &OverlayContext<'_>) -> (SearchParameters, Provenance) {
	STRATEGIES
		.iter()
		.find_map(|strategy| strategy(&base, ctx))
		.unwrap_or_else(|| (base, Provenance::profile(PROFILE_STANDARD)))
}

/// Preference-derived score functions, each weighted by linear interpolation from the neutral
/// weight 1.0 toward the preference weight. A strength of zero yields nothing.
pub fn preference_functions(
	preferences: &PreferenceVector,
	strength: f32,
	limits: BlendLimits,
) -> Vec<ScoreFunction> {
	let strength = if strength.is_finite() { strength.clamp(0.0, 1.0) } else { 0.0 };

	if strength == 0.0 {
		return Vec::new();
	}

	let blend = |weight: f32| 1.0 + strength * (weight - 1.0);
	let mut functions = Vec::new();

	for (field, weights) in [
		("categories", &preferences.categories),
		("brand", &preferences.brands),
		("values", &preferences.values),
	] {
		functions.extend(top_weighted(weights, limits.max_items).into_iter().map(|(value, weight)| {
			ScoreFunction::Term { field: field.to_string(), value: value.to_string(), weight: blend(weight) }
		}));
	}

	let price_scale = 1.0 + preferences.price_sensitivity.clamp(0.0, 1.0);

	let price_ranges = top_weighted(&preferences.price_ranges, limits.max_price_ranges);

	functions.extend(price_ranges.into_iter().filter_map(|(range, weight)| {
		let (min, max) = entity::price_bounds(range)?;

		Some(ScoreFunction::Range {
			field: "price".to_string(),
			min,
			max,
			weight: blend(weight) * price_scale,
		})
	}));

	functions
}

fn intent_profile(
	base: &SearchParameters,
	ctx: &OverlayContext<'_>,
) -> Option<(SearchParameters, Provenance)> {
	ctx.intent.map(|_| (base.clone(), Provenance::profile(PROFILE_INTENT)))
}

fn experiment_profile(
	base: &SearchParameters,
	ctx: &OverlayContext<'_>,
) -> Option<(SearchParameters, Provenance)> {
	let assignment = ctx.experiment?;
	let mut params = assignment.algorithm.apply(base.clone());
	let mut provenance = Provenance::profile(assignment.algorithm.as_str());

	if assignment.algorithm.uses_preferences()
		&& let Some(preferences) = ctx.preferences.filter(|preferences| !preferences.is_empty())
	{
		let strength = assignment.strength.unwrap_or(ctx.strength);

		params = params.with_functions(preference_functions(preferences, strength, ctx.limits));
		provenance.personalization_strength = Some(strength);
	}

	provenance.ab_test = Some(assignment.clone());

	Some((params, provenance))
}

fn preference_profile(
	base: &SearchParameters,
	ctx: &OverlayContext<'_>,
) -> Option<(SearchParameters, Provenance)> {
	let preferences = ctx.preferences.filter(|preferences| !preferences.is_empty())?;
	let params =
		base.clone().with_functions(preference_functions(preferences, ctx.strength, ctx.limits));
	let provenance = Provenance {
		personalization_strength: Some(ctx.strength),
		..Provenance::profile(PROFILE_PERSONALIZED)
	};

	Some((params, provenance))
}

// Highest weight first; equal weights keep key order. Non-positive weights are dropped.
fn top_weighted(weights: &BTreeMap<String, f32>, limit: usize) -> Vec<(&str, f32)> {
	let mut ranked = weights
		.iter()
		.filter(|(_, weight)| weight.is_finite() && **weight > 0.0)
		.map(|(key, weight)| (key.as_str(), *weight))
		.collect::<Vec<_>>();

	ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
	ranked.truncate(limit);

	ranked
}
