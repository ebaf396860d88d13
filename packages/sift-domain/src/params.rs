use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
	Asc,
	Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortClause {
	pub field: String,
	pub direction: SortDirection,
}

/// Index filter predicates. List fields accumulate; scalar fields hold a single bound.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub categories: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub brands: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub values: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub colors: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub sizes: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub materials: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price_min: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub price_max: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rating_min: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rating: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub in_stock: Option<bool>,
}
impl Filters {
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorModifier {
	None,
	Log1p,
	Sqrt,
}
impl FactorModifier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Log1p => "log1p",
			Self::Sqrt => "sqrt",
		}
	}
}

/// Score adjustments layered on top of field boosts by relevance profiles and preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreFunction {
	Term { field: String, value: String, weight: f32 },
	Range { field: String, min: f64, max: f64, weight: f32 },
	FieldValueFactor { field: String, factor: f32, modifier: FactorModifier, weight: f32 },
	Decay { field: String, scale_days: u32, offset_days: u32, decay: f32, weight: f32 },
}

/// Terminal artifact of the pipeline.
///
/// Builders take `self` by value and return the updated value, so a caller that needs the
/// pre-update parameters keeps its own clone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
	pub boost: BTreeMap<String, f32>,
	pub sort: Vec<SortClause>,
	pub filters: Filters,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub functions: Vec<ScoreFunction>,
}
impl SearchParameters {
	/// No boosts, no filters, no sort. Always executable.
	pub fn neutral() -> Self {
		Self::default()
	}

	pub fn is_neutral(&self) -> bool {
		*self == Self::neutral()
	}

	/// Non-positive or non-finite weights are ignored.
	pub fn with_boost(mut self, field: &str, weight: f32) -> Self {
		if weight.is_finite() && weight > 0.0 {
			self.boost.insert(field.to_string(), weight);
		}

		self
	}

	pub fn with_boosts<'a, I>(self, boosts: I) -> Self
	where
		I: IntoIterator<Item = (&'a str, f32)>,
	{
		boosts.into_iter().fold(self, |params, (field, weight)| params.with_boost(field, weight))
	}

	pub fn with_sort(mut self, field: &str, direction: SortDirection) -> Self {
		self.sort.push(SortClause { field: field.to_string(), direction });

		self
	}

	pub fn with_filters<F>(mut self, update: F) -> Self
	where
		F: FnOnce(&mut Filters),
	{
		update(&mut self.filters);

		self
	}

	pub fn with_functions<I>(mut self, functions: I) -> Self
	where
		I: IntoIterator<Item = ScoreFunction>,
	{
		self.functions.extend(functions);

		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builders_leave_the_source_value_untouched() {
		let base = SearchParameters::neutral().with_boost("name", 2.0);
		let derived = base.clone().with_sort("price", SortDirection::Asc);

		assert!(base.sort.is_empty());
		assert_eq!(derived.sort.len(), 1);
		assert_eq!(derived.boost, base.boost);
	}

	#[test]
	fn non_positive_boosts_are_ignored() {
		let params = SearchParameters::neutral().with_boosts([("name", 0.0), ("brand", f32::NAN)]);

		assert!(params.is_neutral());
	}

	#[test]
	fn empty_filters_serialize_to_empty_object() {
		let json = serde_json::to_value(SearchParameters::neutral()).expect("serialize");

		assert_eq!(json, serde_json::json!({ "boost": {}, "sort": [], "filters": {} }));
	}

	#[test]
	fn filter_fields_use_camel_case() {
		let params = SearchParameters::neutral().with_filters(|filters| {
			filters.price_min = Some(10.0);
			filters.in_stock = Some(true);
		});
		let json = serde_json::to_value(&params.filters).expect("serialize");

		assert_eq!(json, serde_json::json!({ "priceMin": 10.0, "inStock": true }));
	}
}
