use crate::{
	entity::{self, Entity, EntityKind, RatingBound},
	intent::{IntentLabel, IntentResult},
	params::{Filters, SearchParameters, SortDirection},
};

/// Maps a classified intent and its entities to index parameters.
///
/// Every branch starts from the neutral parameters and only adds to them. Only the `filter`
/// intent consumes every entity; the other branches read the single entity kind they care about.
pub fn synthesize(intent: &IntentResult, entities: &[Entity], raw_query: &str) -> SearchParameters {
	let base = SearchParameters::neutral();

	match intent.primary {
		IntentLabel::ProductSearch =>
			base.with_boosts([("name", 2.0), ("description", 1.0), ("categories", 1.5)]),
		IntentLabel::CategoryBrowse => base
			.with_boosts([("categories", 3.0), ("name", 1.0), ("description", 0.5)])
			.with_filters(|filters| {
				push_values(&mut filters.categories, entities, EntityKind::Category)
			}),
		IntentLabel::BrandSpecific => base
			.with_boosts([("brand", 3.0), ("name", 1.0)])
			.with_filters(|filters| push_values(&mut filters.brands, entities, EntityKind::Brand)),
		IntentLabel::PriceQuery => {
			let bounds = entities
				.iter()
				.find(|entity| entity.kind == EntityKind::Price)
				.and_then(|entity| entity::price_bounds(&entity.value));

			base.with_sort("price", SortDirection::Asc).with_filters(|filters| {
				if let Some((min, max)) = bounds {
					filters.price_min = Some(min);
					filters.price_max = Some(max);
				}
			})
		},
		IntentLabel::ValueDriven => base
			.with_boosts([("values", 3.0), ("description", 2.0), ("name", 1.0)])
			.with_filters(|filters| push_values(&mut filters.values, entities, EntityKind::Value)),
		IntentLabel::Comparison => base,
		IntentLabel::Recommendation => base
			.with_sort("rating", SortDirection::Desc)
			.with_boosts([("rating", 2.0), ("reviewCount", 1.5), ("name", 1.0)]),
		IntentLabel::Availability => base.with_filters(|filters| filters.in_stock = Some(true)),
		IntentLabel::Filter => base.with_filters(|filters| apply_all(filters, entities)),
		IntentLabel::Sort => match sort_hint(raw_query) {
			Some((field, direction)) => base.with_sort(field, direction),
			None => base,
		},
	}
}

fn push_values(target: &mut Vec<String>, entities: &[Entity], kind: EntityKind) {
	for entity in entities.iter().filter(|entity| entity.kind == kind) {
		push_unique(target, &entity.value);
	}
}

fn push_unique(target: &mut Vec<String>, value: &str) {
	if !target.iter().any(|existing| existing == value) {
		target.push(value.to_string());
	}
}

fn apply_all(filters: &mut Filters, entities: &[Entity]) {
	for entity in entities {
		match entity.kind {
			EntityKind::Category => push_unique(&mut filters.categories, &entity.value),
			EntityKind::Brand => push_unique(&mut filters.brands, &entity.value),
			EntityKind::Value => push_unique(&mut filters.values, &entity.value),
			EntityKind::Color => push_unique(&mut filters.colors, &entity.value),
			EntityKind::Size => push_unique(&mut filters.sizes, &entity.value),
			EntityKind::Material => push_unique(&mut filters.materials, &entity.value),
			EntityKind::Price =>
				if let Some((min, max)) = entity::price_bounds(&entity.value) {
					filters.price_min = Some(min);
					filters.price_max = Some(max);
				},
			EntityKind::Rating => match entity::rating_bound(&entity.value) {
				Some(RatingBound::AtLeast(min)) => filters.rating_min = Some(min),
				Some(RatingBound::Exact(rating)) => filters.rating = Some(rating),
				None => {},
			},
		}
	}
}

fn sort_hint(raw_query: &str) -> Option<(&'static str, SortDirection)> {
	let query = raw_query.to_lowercase();

	if query.contains("price") {
		let direction =
			if query.contains("high to low") { SortDirection::Desc } else { SortDirection::Asc };

		Some(("price", direction))
	} else if query.contains("rating") || query.contains("reviews") {
		Some(("rating", SortDirection::Desc))
	} else if query.contains("new") || query.contains("recent") {
		Some(("createdAt", SortDirection::Desc))
	} else if query.contains("popular") || query.contains("trending") {
		Some(("popularity", SortDirection::Desc))
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;
	use crate::params::SortClause;

	fn intent(primary: IntentLabel) -> IntentResult {
		IntentResult { primary, confidence: 0.9, secondary: Vec::new() }
	}

	fn boosts(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
		pairs.iter().map(|(field, weight)| (field.to_string(), *weight)).collect()
	}

	#[test]
	fn product_search_boosts_without_filters() {
		let entities = vec![Entity::new(EntityKind::Color, "black", 0.9)];
		let params = synthesize(&intent(IntentLabel::ProductSearch), &entities, "find a black dress");

		assert_eq!(params.boost, boosts(&[("name", 2.0), ("description", 1.0), ("categories", 1.5)]));
		assert!(params.filters.is_empty());
		assert!(params.sort.is_empty());
	}

	#[test]
	fn filter_intent_consumes_every_entity() {
		let entities = vec![
			Entity::new(EntityKind::Price, "10-50", 0.95),
			Entity::new(EntityKind::Color, "red", 0.9),
			Entity::new(EntityKind::Category, "bags", 0.8),
		];
		let params = synthesize(&intent(IntentLabel::Filter), &entities, "");
		let expected = Filters {
			categories: vec!["bags".to_string()],
			colors: vec!["red".to_string()],
			price_min: Some(10.0),
			price_max: Some(50.0),
			..Filters::default()
		};

		assert_eq!(params.filters, expected);
		assert!(params.boost.is_empty());
	}

	#[test]
	fn filter_intent_distinguishes_rating_bounds() {
		let entities = vec![
			Entity::new(EntityKind::Rating, "4+", 0.85),
			Entity::new(EntityKind::Rating, "5", 0.9),
			Entity::new(EntityKind::Size, "m", 0.9),
			Entity::new(EntityKind::Size, "m", 0.9),
		];
		let params = synthesize(&intent(IntentLabel::Filter), &entities, "");

		assert_eq!(params.filters.rating_min, Some(4.0));
		assert_eq!(params.filters.rating, Some(5.0));
		assert_eq!(params.filters.sizes, vec!["m".to_string()]);
	}

	#[test]
	fn single_kind_branches_ignore_other_entities() {
		let entities = vec![
			Entity::new(EntityKind::Category, "bags", 0.8),
			Entity::new(EntityKind::Color, "red", 0.9),
		];
		let params = synthesize(&intent(IntentLabel::CategoryBrowse), &entities, "");

		assert_eq!(params.filters.categories, vec!["bags".to_string()]);
		assert!(params.filters.colors.is_empty());

		let params = synthesize(&intent(IntentLabel::Recommendation), &entities, "");

		assert!(params.filters.is_empty());
		assert_eq!(params.sort, vec![SortClause {
			field: "rating".to_string(),
			direction: SortDirection::Desc
		}]);
	}

	#[test]
	fn price_query_uses_first_price_entity() {
		let entities = vec![
			Entity::new(EntityKind::Price, "0-30", 0.9),
			Entity::new(EntityKind::Price, "100-9999", 0.7),
		];
		let params = synthesize(&intent(IntentLabel::PriceQuery), &entities, "");

		assert_eq!(params.filters.price_min, Some(0.0));
		assert_eq!(params.filters.price_max, Some(30.0));
		assert_eq!(params.sort[0].field, "price");
	}

	#[test]
	fn malformed_price_is_ignored() {
		let entities = vec![Entity::new(EntityKind::Price, "10-20-30", 0.9)];
		let params = synthesize(&intent(IntentLabel::PriceQuery), &entities, "");

		assert!(params.filters.is_empty());
	}

	#[test]
	fn sort_hints_pick_one_clause() {
		let cases = [
			("sort by price high to low", Some(("price", SortDirection::Desc))),
			("sort by price", Some(("price", SortDirection::Asc))),
			("order by reviews", Some(("rating", SortDirection::Desc))),
			("arrange by newest first", Some(("createdAt", SortDirection::Desc))),
			("order by trending", Some(("popularity", SortDirection::Desc))),
			("sort by distance", None),
		];

		for (query, expected) in cases {
			let params = synthesize(&intent(IntentLabel::Sort), &[], query);
			let expected = expected
				.map(|(field, direction)| vec![SortClause { field: field.to_string(), direction }])
				.unwrap_or_default();

			assert_eq!(params.sort, expected, "query: {query}");
		}
	}

	#[test]
	fn synthesis_is_pure() {
		let entities = vec![
			Entity::new(EntityKind::Value, "vegan", 0.9),
			Entity::new(EntityKind::Value, "organic", 0.9),
		];
		let intent = intent(IntentLabel::ValueDriven);

		assert_eq!(
			synthesize(&intent, &entities, "vegan organic soap"),
			synthesize(&intent, &entities, "vegan organic soap")
		);
	}

	#[test]
	fn availability_and_comparison() {
		let params = synthesize(&intent(IntentLabel::Availability), &[], "");

		assert_eq!(params.filters.in_stock, Some(true));
		assert!(synthesize(&intent(IntentLabel::Comparison), &[], "silk or wool").is_neutral());
	}
}
