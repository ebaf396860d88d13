pub mod bayes;

pub use bayes::{BayesModel, trained_model};

use std::{fmt, str::FromStr, sync::Arc};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const PATTERN_CONFIDENCE: f32 = 0.9;
pub const FALLBACK_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

// Anchor patterns per intent, tried in declaration order of `IntentLabel`.
const INTENT_PATTERNS: &[(IntentLabel, &str)] = &[
	(
		IntentLabel::ProductSearch,
		r"\b(?:find|search for|looking for|need)\s+(?:(?:a|an|some)\s+)?[a-z&-]+",
	),
	// `show me` belongs to category browsing.
	(IntentLabel::ProductSearch, r"\bshow\s+(?:a|an|some)\s+[a-z&-]+"),
	(
		IntentLabel::ProductSearch,
		r"\b(?:where can i find|do you have|is there)\s+(?:(?:a|an|some)\s+)?[a-z&-]+",
	),
	(IntentLabel::CategoryBrowse, r"\b(?:browse|explore|show me|view|see)\s+(?:(?:all|the)\s+)?[a-z&-]+"),
	(
		IntentLabel::CategoryBrowse,
		r"\b(?:what|which)\s+[a-z\s&-]+?\s+(?:do you have|are available|can i find)\b",
	),
	(
		IntentLabel::BrandSpecific,
		r"\b(?:made by|products? by|items? from|products? from|brand:?)\s+[a-z&-]+",
	),
	(IntentLabel::BrandSpecific, r"\b[a-z&-]+\s+brand\b"),
	(IntentLabel::PriceQuery, r"\b(?:how much|what is the price of|price of|cost of|price for)\s+"),
	(IntentLabel::PriceQuery, r"\b(?:under|less than|below|above|over|more than)\s+\$\d+"),
	(IntentLabel::PriceQuery, r"\$\d+\s*(?:to|-)\s*\$\d+"),
	(IntentLabel::PriceQuery, r"\bbetween\s+\$\d+\s+and\s+\$\d+"),
	(
		IntentLabel::ValueDriven,
		r"\b(?:sustainable|ethical|eco-friendly|organic|vegan|fair trade|handmade|recycled|upcycled|local|small batch)\b",
	),
	(
		IntentLabel::ValueDriven,
		r"\b(?:environmentally friendly|socially responsible|ethically made|eco conscious)\b",
	),
	(
		IntentLabel::Comparison,
		r"\b(?:compare|difference between|vs|versus|or)\s+[a-z\s&-]+?\s+(?:and|or|vs|versus)\s+[a-z&-]+",
	),
	(
		IntentLabel::Comparison,
		r"\b(?:which is better|what's better|better option)\s+[a-z\s&-]+?\s+(?:or|vs|versus)\s+[a-z&-]+",
	),
	(IntentLabel::Recommendation, r"\b(?:recommend|suggest|what do you recommend|what should i|best)\s+"),
	(IntentLabel::Recommendation, r"\b(?:what are the best|top|popular|trending)\s+"),
	(IntentLabel::Availability, r"\b(?:is|are)\s+[a-z\s&-]+?\s+(?:in stock|available)\b"),
	(IntentLabel::Availability, r"\b(?:availability of|back in stock)\b"),
	(IntentLabel::Filter, r"\b(?:filter|show only|limit to|restrict to)\s+"),
	(IntentLabel::Filter, r"\b(?:by|with)\s+[a-z\s&-]+?\s+(?:only|filter)\b"),
	(IntentLabel::Sort, r"\b(?:sort|order|arrange)\s+(?:by|on)\s+"),
	(IntentLabel::Sort, r"\b(?:sort|order|arrange)\s+[a-z\s&-]+?\s+(?:by|on)\s+[a-z&-]+"),
];

const INTENT_KEYWORDS: [(IntentLabel, &[&str]); 10] = [
	(IntentLabel::ProductSearch, &["find", "search", "looking", "need", "want", "show", "get"]),
	(IntentLabel::CategoryBrowse, &["browse", "explore", "view", "see", "category", "categories", "all"]),
	(IntentLabel::BrandSpecific, &["brand", "by", "from", "made by", "manufacturer"]),
	(
		IntentLabel::PriceQuery,
		&["price", "cost", "how much", "affordable", "expensive", "cheap", "budget", "luxury"],
	),
	(
		IntentLabel::ValueDriven,
		&[
			"sustainable",
			"ethical",
			"eco-friendly",
			"organic",
			"vegan",
			"fair trade",
			"handmade",
			"recycled",
			"local",
		],
	),
	(
		IntentLabel::Comparison,
		&["compare", "comparison", "difference", "versus", "vs", "or", "better", "best"],
	),
	(
		IntentLabel::Recommendation,
		&["recommend", "suggest", "best", "top", "popular", "trending", "rated"],
	),
	(IntentLabel::Availability, &["available", "in stock", "stock", "inventory", "when"]),
	(IntentLabel::Filter, &["filter", "only", "limit", "restrict", "with", "has", "have"]),
	(IntentLabel::Sort, &["sort", "order", "arrange", "ranking", "highest", "lowest"]),
];

/// Closed set of query intents. Declaration order is the tie-break order of every tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
	ProductSearch,
	CategoryBrowse,
	BrandSpecific,
	PriceQuery,
	ValueDriven,
	Comparison,
	Recommendation,
	Availability,
	Filter,
	Sort,
}
impl IntentLabel {
	pub const ALL: [Self; 10] = [
		Self::ProductSearch,
		Self::CategoryBrowse,
		Self::BrandSpecific,
		Self::PriceQuery,
		Self::ValueDriven,
		Self::Comparison,
		Self::Recommendation,
		Self::Availability,
		Self::Filter,
		Self::Sort,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::ProductSearch => "product_search",
			Self::CategoryBrowse => "category_browse",
			Self::BrandSpecific => "brand_specific",
			Self::PriceQuery => "price_query",
			Self::ValueDriven => "value_driven",
			Self::Comparison => "comparison",
			Self::Recommendation => "recommendation",
			Self::Availability => "availability",
			Self::Filter => "filter",
			Self::Sort => "sort",
		}
	}
}

impl fmt::Display for IntentLabel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for IntentLabel {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let label = raw.trim();

		Self::ALL
			.into_iter()
			.find(|intent| intent.as_str() == label)
			.ok_or_else(|| Error::UnknownIntent { label: label.to_string() })
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredIntent {
	pub intent: IntentLabel,
	pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
	pub primary: IntentLabel,
	pub confidence: f32,
	/// Remaining candidates, highest confidence first.
	pub secondary: Vec<ScoredIntent>,
}
impl IntentResult {
	pub fn fallback() -> Self {
		Self { primary: IntentLabel::ProductSearch, confidence: FALLBACK_CONFIDENCE, secondary: Vec::new() }
	}

	fn from_ranked(mut ranked: Vec<ScoredIntent>) -> Option<Self> {
		if ranked.is_empty() {
			return None;
		}

		let top = ranked.remove(0);

		Some(Self { primary: top.intent, confidence: top.confidence, secondary: ranked })
	}
}

/// Three-tier classifier: anchor patterns, then keyword share, then the trained statistical
/// model. The first tier that produces a result wins; otherwise the fallback is returned.
pub struct IntentClassifier {
	patterns: Vec<(IntentLabel, Regex)>,
	threshold: f32,
	model: Arc<BayesModel>,
}
impl IntentClassifier {
	pub fn new(threshold: f32) -> Result<Self> {
		Self::with_model(threshold, trained_model())
	}

	pub fn with_model(threshold: f32, model: Arc<BayesModel>) -> Result<Self> {
		let patterns = INTENT_PATTERNS
			.iter()
			.map(|(intent, pattern)| crate::compile(pattern).map(|regex| (*intent, regex)))
			.collect::<Result<Vec<_>>>()?;

		Ok(Self { patterns, threshold, model })
	}

	pub fn classify(&self, query: &str) -> IntentResult {
		let lowered = query.to_lowercase();

		self.match_pattern(&lowered)
			.or_else(|| self.score_keywords(&lowered))
			.or_else(|| self.classify_statistically(&lowered))
			.unwrap_or_else(IntentResult::fallback)
	}

	pub fn match_pattern(&self, lowered: &str) -> Option<IntentResult> {
		self.patterns.iter().find(|(_, regex)| regex.is_match(lowered)).map(|(intent, _)| {
			IntentResult { primary: *intent, confidence: PATTERN_CONFIDENCE, secondary: Vec::new() }
		})
	}

	pub fn score_keywords(&self, lowered: &str) -> Option<IntentResult> {
		let counts = INTENT_KEYWORDS
			.iter()
			.map(|(intent, keywords)| {
				(*intent, keywords.iter().filter(|keyword| lowered.contains(*keyword)).count())
			})
			.filter(|(_, count)| *count > 0)
			.collect::<Vec<_>>();
		let total = counts.iter().map(|(_, count)| count).sum::<usize>();

		if total == 0 {
			return None;
		}

		let ranked = rank(
			counts
				.into_iter()
				.map(|(intent, count)| ScoredIntent {
					intent,
					confidence: count as f32 / total as f32,
				})
				.collect(),
		);

		self.accept(ranked)
	}

	pub fn classify_statistically(&self, lowered: &str) -> Option<IntentResult> {
		self.accept(self.model.classify(lowered))
	}

	fn accept(&self, ranked: Vec<ScoredIntent>) -> Option<IntentResult> {
		let top = ranked.first()?;

		if !top.confidence.is_finite() || top.confidence < self.threshold {
			return None;
		}

		IntentResult::from_ranked(ranked)
	}
}

/// Sorts descending by confidence. Ties keep declaration order.
pub(crate) fn rank(mut scored: Vec<ScoredIntent>) -> Vec<ScoredIntent> {
	scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

	scored
}
