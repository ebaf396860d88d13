// std
use std::time::Duration as StdDuration;

// crates.io
use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// self
use sift_config::IndexProviderConfig;
use sift_domain::params::{Filters, ScoreFunction, SearchParameters, SortDirection};

const AGGREGATION_NAME: &str = "related_terms";
const DEFAULT_QUERY_FIELDS: [&str; 2] = ["name", "description"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
	pub from: usize,
	pub size: usize,
}
impl Default for Pagination {
	fn default() -> Self {
		Self { from: 0, size: 20 }
	}
}

/// Asks the product index for terms that co-occur significantly with `term`.
pub async fn related_terms(
	cfg: &IndexProviderConfig,
	term: &str,
	max_terms: usize,
) -> Result<Vec<String>> {
	let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = json!({
		"size": 0,
		"query": { "match": { cfg.field.as_str(): term } },
		"aggs": {
			AGGREGATION_NAME: {
				"significant_text": {
					"field": cfg.field,
					"size": max_terms + 1,
					"exclude": [term],
				}
			}
		}
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_related_terms(json, term, max_terms)
}

/// Renders synthesized parameters as an index search body.
///
/// Boosts become weighted `multi_match` fields, filters become non-scoring clauses and score
/// functions wrap the query in a `function_score`. Relevance always breaks sort ties.
pub fn render_search_body(query: &str, params: &SearchParameters, page: Pagination) -> Value {
	let fields = if params.boost.is_empty() {
		DEFAULT_QUERY_FIELDS.iter().map(|field| field.to_string()).collect::<Vec<_>>()
	} else {
		params.boost.iter().map(|(field, weight)| format!("{field}^{weight}")).collect()
	};
	let must = if query.trim().is_empty() {
		json!([{ "match_all": {} }])
	} else {
		json!([{ "multi_match": { "query": query, "fields": fields, "lenient": true } }])
	};
	let bool_query = json!({ "bool": { "must": must, "filter": render_filters(&params.filters) } });
	let query = if params.functions.is_empty() {
		bool_query
	} else {
		json!({
			"function_score": {
				"query": bool_query,
				"functions": params.functions.iter().map(render_function).collect::<Vec<_>>(),
				"score_mode": "sum",
				"boost_mode": "multiply",
			}
		})
	};
	let mut sort = params
		.sort
		.iter()
		.map(|clause| {
			let order = match clause.direction {
				SortDirection::Asc => "asc",
				SortDirection::Desc => "desc",
			};

			json!({ clause.field.as_str(): { "order": order } })
		})
		.collect::<Vec<_>>();

	sort.push(json!("_score"));

	json!({ "from": page.from, "size": page.size, "query": query, "sort": sort })
}

fn parse_related_terms(json: Value, term: &str, max_terms: usize) -> Result<Vec<String>> {
	let buckets = json
		.get("aggregations")
		.and_then(|v| v.get(AGGREGATION_NAME))
		.and_then(|v| v.get("buckets"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Index response is missing related term buckets."))?;
	let mut terms = Vec::new();

	for bucket in buckets {
		let key = bucket
			.get("key")
			.and_then(|v| v.as_str())
			.ok_or_else(|| eyre::eyre!("Related term bucket is missing a key."))?
			.trim();

		if key.is_empty() || key.eq_ignore_ascii_case(term) {
			continue;
		}
		if terms.len() == max_terms {
			break;
		}

		terms.push(key.to_string());
	}

	Ok(terms)
}

fn render_filters(filters: &Filters) -> Vec<Value> {
	let mut clauses = Vec::new();

	for (field, values) in [
		("categories", &filters.categories),
		("brand", &filters.brands),
		("values", &filters.values),
		("color", &filters.colors),
		("size", &filters.sizes),
		("materials", &filters.materials),
	] {
		if !values.is_empty() {
			clauses.push(json!({ "terms": { field: values } }));
		}
	}

	let mut price = Map::new();

	if let Some(min) = filters.price_min {
		price.insert("gte".to_string(), json!(min));
	}
	if let Some(max) = filters.price_max {
		price.insert("lte".to_string(), json!(max));
	}
	if !price.is_empty() {
		clauses.push(json!({ "range": { "price": price } }));
	}
	if let Some(min) = filters.rating_min {
		clauses.push(json!({ "range": { "rating": { "gte": min } } }));
	}
	if let Some(rating) = filters.rating {
		clauses.push(json!({ "term": { "rating": rating } }));
	}
	if let Some(in_stock) = filters.in_stock {
		clauses.push(json!({ "term": { "inStock": in_stock } }));
	}

	clauses
}

fn render_function(function: &ScoreFunction) -> Value {
	match function {
		ScoreFunction::Term { field, value, weight } =>
			json!({ "filter": { "term": { field.as_str(): value } }, "weight": weight }),
		ScoreFunction::Range { field, min, max, weight } => json!({
			"filter": { "range": { field.as_str(): { "gte": min, "lte": max } } },
			"weight": weight,
		}),
		ScoreFunction::FieldValueFactor { field, factor, modifier, weight } => json!({
			"field_value_factor": {
				"field": field,
				"factor": factor,
				"modifier": modifier.as_str(),
				"missing": 0,
			},
			"weight": weight,
		}),
		ScoreFunction::Decay { field, scale_days, offset_days, decay, weight } => json!({
			"gauss": {
				field.as_str(): {
					"origin": "now",
					"scale": format!("{scale_days}d"),
					"offset": format!("{offset_days}d"),
					"decay": decay,
				}
			},
			"weight": weight,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drops_the_seed_term_and_caps_results() {
		let json = json!({
			"aggregations": {
				"related_terms": {
					"buckets": [
						{ "key": "Cotton", "doc_count": 40 },
						{ "key": "linen", "doc_count": 12 },
						{ "key": "hemp", "doc_count": 9 },
						{ "key": "bamboo", "doc_count": 3 }
					]
				}
			}
		});
		let terms = parse_related_terms(json, "cotton", 2).expect("parse failed");

		assert_eq!(terms, vec!["linen".to_string(), "hemp".to_string()]);
	}

	#[test]
	fn rejects_response_without_buckets() {
		assert!(parse_related_terms(json!({ "hits": {} }), "cotton", 3).is_err());
	}
}
