use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
	Error, Result,
	params::{FactorModifier, ScoreFunction, SearchParameters},
};

/// Named scoring strategies an experiment variant can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceAlgorithm {
	Standard,
	Intent,
	Preference,
	Hybrid,
	Popularity,
	Recency,
	Semantic,
}
impl RelevanceAlgorithm {
	pub const ALL: [Self; 7] = [
		Self::Standard,
		Self::Intent,
		Self::Preference,
		Self::Hybrid,
		Self::Popularity,
		Self::Recency,
		Self::Semantic,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Standard => "standard",
			Self::Intent => "intent",
			Self::Preference => "preference",
			Self::Hybrid => "hybrid",
			Self::Popularity => "popularity",
			Self::Recency => "recency",
			Self::Semantic => "semantic",
		}
	}

	/// Whether the profile blends the caller's preference vector when one is available.
	pub fn uses_preferences(self) -> bool {
		matches!(self, Self::Preference | Self::Hybrid)
	}

	/// Boosts and score functions for this profile. `Semantic` has no profile.
	pub fn profile(self) -> Option<SearchParameters> {
		let base = SearchParameters::neutral();
		let profile = match self {
			Self::Standard => base.with_boosts([
				("name", 3.0),
				("description", 1.0),
				("categories", 2.0),
				("brand", 1.5),
				("tags", 1.2),
			]),
			Self::Intent | Self::Preference => base.with_boosts([("name", 2.0), ("description", 0.8)]),
			Self::Popularity => base
				.with_boosts([("name", 2.0), ("description", 0.8), ("categories", 1.5), ("brand", 1.2)])
				.with_functions([
					field_value_factor("viewCount", 0.1, FactorModifier::Log1p, 1.0),
					field_value_factor("rating", 1.0, FactorModifier::Sqrt, 2.0),
				]),
			Self::Recency => base
				.with_boosts([("name", 2.0), ("description", 1.0), ("categories", 1.5)])
				.with_functions([ScoreFunction::Decay {
					field: "createdAt".to_string(),
					scale_days: 30,
					offset_days: 1,
					decay: 0.5,
					weight: 2.0,
				}]),
			Self::Hybrid => base
				.with_boosts([("name", 2.0), ("description", 0.8), ("categories", 1.5), ("brand", 1.2)])
				.with_functions([
					field_value_factor("rating", 0.5, FactorModifier::Sqrt, 1.0),
					ScoreFunction::Decay {
						field: "createdAt".to_string(),
						scale_days: 60,
						offset_days: 1,
						decay: 0.5,
						weight: 1.0,
					},
				]),
			Self::Semantic => return None,
		};

		Some(profile)
	}

	/// Layers this profile over `base`. Profile boosts replace same-named base boosts.
	pub fn apply(self, base: SearchParameters) -> SearchParameters {
		let Some(profile) = self.profile() else {
			return base;
		};
		let SearchParameters { boost, functions, .. } = profile;

		boost
			.into_iter()
			.fold(base, |params, (field, weight)| params.with_boost(&field, weight))
			.with_functions(functions)
	}
}

impl fmt::Display for RelevanceAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RelevanceAlgorithm {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let name = raw.trim();

		Self::ALL
			.into_iter()
			.find(|algorithm| algorithm.as_str() == name)
			.ok_or_else(|| Error::UnknownAlgorithm { name: name.to_string() })
	}
}

fn field_value_factor(
	field: &str,
	factor: f32,
	modifier: FactorModifier,
	weight: f32,
) -> ScoreFunction {
	ScoreFunction::FieldValueFactor { field: field.to_string(), factor, modifier, weight }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn semantic_passes_base_through() {
		let base = SearchParameters::neutral().with_boost("name", 5.0);

		assert_eq!(RelevanceAlgorithm::Semantic.apply(base.clone()), base);
	}

	#[test]
	fn profile_boosts_override_base() {
		let base = SearchParameters::neutral().with_boost("name", 9.0).with_boost("values", 3.0);
		let applied = RelevanceAlgorithm::Popularity.apply(base);

		assert_eq!(applied.boost.get("name"), Some(&2.0));
		assert_eq!(applied.boost.get("values"), Some(&3.0));
		assert_eq!(applied.functions.len(), 2);
	}

	#[test]
	fn every_algorithm_name_parses() {
		for algorithm in RelevanceAlgorithm::ALL {
			assert_eq!(algorithm.as_str().parse::<RelevanceAlgorithm>().expect("known"), algorithm);
		}

		assert!("neural".parse::<RelevanceAlgorithm>().is_err());
	}
}
