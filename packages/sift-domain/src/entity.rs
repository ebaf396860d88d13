use std::ops::Range;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{Result, tokenize};

pub const PATTERN_KNOWN_CONFIDENCE: f32 = 0.9;
pub const PATTERN_UNKNOWN_CONFIDENCE: f32 = 0.7;
pub const TOKEN_CONFIDENCE: f32 = 0.8;
pub const BIGRAM_CONFIDENCE: f32 = 0.85;
/// Upper bound used for open-ended price ranges such as "over $100".
pub const PRICE_CEILING: &str = "9999";

pub const KNOWN_CATEGORIES: &[&str] = &[
	"clothing",
	"dresses",
	"tops",
	"bottoms",
	"pants",
	"jeans",
	"skirts",
	"shorts",
	"outerwear",
	"jackets",
	"coats",
	"sweaters",
	"activewear",
	"swimwear",
	"lingerie",
	"sleepwear",
	"accessories",
	"shoes",
	"bags",
	"jewelry",
	"watches",
	"sunglasses",
	"hats",
	"scarves",
	"gloves",
	"belts",
	"socks",
	"home",
	"bedding",
	"bath",
	"kitchen",
	"furniture",
	"decor",
	"beauty",
	"skincare",
	"makeup",
	"haircare",
	"fragrance",
	"wellness",
];
pub const KNOWN_BRANDS: &[&str] = &[
	"avnu",
	"eco-collective",
	"sustainable threads",
	"green earth",
	"ethical choice",
	"conscious couture",
	"fair fashion",
	"earth friendly",
	"pure planet",
	"organic basics",
	"recycled revolution",
	"upcycled unique",
	"local luxe",
	"small batch beauty",
	"artisan alliance",
];
pub const KNOWN_VALUES: &[&str] = &[
	"sustainable",
	"ethical",
	"eco-friendly",
	"organic",
	"vegan",
	"fair trade",
	"handmade",
	"recycled",
	"upcycled",
	"local",
	"small batch",
	"carbon neutral",
	"zero waste",
	"plastic free",
	"biodegradable",
	"compostable",
	"renewable",
	"cruelty-free",
	"non-toxic",
	"chemical-free",
];
pub const KNOWN_COLORS: &[&str] = &[
	"black",
	"white",
	"red",
	"blue",
	"green",
	"yellow",
	"orange",
	"purple",
	"pink",
	"brown",
	"gray",
	"grey",
	"beige",
	"navy",
	"teal",
	"gold",
	"silver",
	"multicolor",
	"multi-color",
];
pub const KNOWN_MATERIALS: &[&str] = &[
	"cotton",
	"organic cotton",
	"polyester",
	"recycled polyester",
	"wool",
	"silk",
	"linen",
	"leather",
	"vegan leather",
	"denim",
	"velvet",
	"satin",
	"nylon",
	"cashmere",
	"fleece",
	"suede",
	"canvas",
	"corduroy",
	"bamboo",
	"hemp",
	"tencel",
	"modal",
	"rayon",
	"viscose",
];

const KINDS: [EntityKind; 8] = [
	EntityKind::Category,
	EntityKind::Brand,
	EntityKind::Price,
	EntityKind::Rating,
	EntityKind::Color,
	EntityKind::Size,
	EntityKind::Material,
	EntityKind::Value,
];

// Detectors run per kind in this order. Within a kind, a match overlapping an earlier match of the
// same kind is skipped.
const DETECTORS: &[(EntityKind, &str, Rule)] = &[
	(
		EntityKind::Category,
		r"\b(?:category:?|browse|shop)\s+(?:for\s+)?(?:all\s+)?(?:the\s+)?([a-z&-]+)",
		Rule::Leading { known: KNOWN_CATEGORIES, accept_unknown: true },
	),
	(
		EntityKind::Category,
		r"\b([a-z&-]+)\s+(?:category|section|department)\b",
		Rule::Trailing { known: KNOWN_CATEGORIES },
	),
	(
		EntityKind::Brand,
		r"\b(?:brand:?|made by|products? by|items? from|products? from)\s+([a-z&-]+(?:\s+[a-z&-]+){0,2})",
		Rule::Leading { known: KNOWN_BRANDS, accept_unknown: true },
	),
	(
		EntityKind::Brand,
		r"\b([a-z&-]+(?:\s+[a-z&-]+)?)\s+brand\b",
		Rule::Trailing { known: KNOWN_BRANDS },
	),
	(
		EntityKind::Brand,
		r"\b(?:by|from)\s+([a-z&-]+(?:\s+[a-z&-]+){0,2})",
		Rule::Leading { known: KNOWN_BRANDS, accept_unknown: false },
	),
	(
		EntityKind::Price,
		r"\$(\d[\d,]*(?:\.\d+)?)\s*(?:to|-)\s*\$?(\d[\d,]*(?:\.\d+)?)",
		Rule::PriceRange,
	),
	(
		EntityKind::Price,
		r"\bbetween\s+\$(\d[\d,]*(?:\.\d+)?)\s+and\s+\$?(\d[\d,]*(?:\.\d+)?)",
		Rule::PriceRange,
	),
	(
		EntityKind::Price,
		r"\b(under|less than|below|above|over|more than)\s+\$(\d[\d,]*(?:\.\d+)?)",
		Rule::PriceModifier,
	),
	(
		EntityKind::Price,
		r"\b(cheap|affordable|budget|inexpensive|expensive|luxury|high-end|premium)\b",
		Rule::PriceQualifier,
	),
	(
		EntityKind::Rating,
		r"\b(?:above|over|more than|at least)\s+(\d(?:\.\d+)?)\s*stars?\b",
		Rule::RatingAtLeast,
	),
	(EntityKind::Rating, r"\b(\d(?:\.\d+)?)\+\s*stars?\b", Rule::RatingAtLeast),
	(EntityKind::Rating, r"\b(\d(?:\.\d+)?)\s*stars?\b", Rule::RatingExact),
	(
		EntityKind::Rating,
		r"\b(?:top|best|highest)[\s-]+rated\b",
		Rule::Fixed { value: "4+", confidence: 0.8 },
	),
	(
		EntityKind::Color,
		r"\b(?:color|colour):?\s+([a-z-]+)",
		Rule::Leading { known: KNOWN_COLORS, accept_unknown: true },
	),
	(
		EntityKind::Color,
		r"\b(black|white|red|blue|green|yellow|orange|purple|pink|brown|gray|grey|beige|navy|teal|gold|silver|multicolou?r|multi-colou?r)\b",
		Rule::Term { known: KNOWN_COLORS },
	),
	(
		EntityKind::Size,
		r"\bsizes?:?\s+(xxs|xs|s|m|l|xl|xxl|[2-9]?xl|10xl|small|medium|large|one size|\d{1,2})\b",
		Rule::Term { known: &[] },
	),
	(EntityKind::Size, r"\b(xxs|xs|xl|xxl|[2-9]xl|10xl|one size|petite)\b", Rule::Term { known: &[] }),
	(
		EntityKind::Material,
		r"\b(?:material:?|made of|made from)\s+([a-z-]+(?:\s+[a-z-]+)?)",
		Rule::Leading { known: KNOWN_MATERIALS, accept_unknown: true },
	),
	(
		EntityKind::Material,
		r"\b(organic cotton|recycled polyester|vegan leather|cotton|polyester|wool|silk|linen|leather|denim|velvet|satin|nylon|cashmere|fleece|suede|canvas|corduroy|bamboo|hemp|tencel|modal|rayon|viscose)\b",
		Rule::Term { known: KNOWN_MATERIALS },
	),
	(
		EntityKind::Value,
		r"\b(sustainable|ethical|eco-friendly|organic|vegan|fair trade|handmade|recycled|upcycled|local|small batch|carbon neutral|zero waste|plastic free|biodegradable|compostable|renewable|cruelty-free|non-toxic|chemical-free)\b",
		Rule::Term { known: KNOWN_VALUES },
	),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Category,
	Brand,
	Price,
	Rating,
	Color,
	Size,
	Material,
	Value,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Category => "category",
			Self::Brand => "brand",
			Self::Price => "price",
			Self::Rating => "rating",
			Self::Color => "color",
			Self::Size => "size",
			Self::Material => "material",
			Self::Value => "value",
		}
	}

	fn known(self) -> &'static [&'static str] {
		match self {
			Self::Category => KNOWN_CATEGORIES,
			Self::Brand => KNOWN_BRANDS,
			Self::Color => KNOWN_COLORS,
			Self::Material => KNOWN_MATERIALS,
			Self::Value => KNOWN_VALUES,
			Self::Price | Self::Rating | Self::Size => &[],
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
	#[serde(rename = "type")]
	pub kind: EntityKind,
	pub value: String,
	pub confidence: f32,
}
impl Entity {
	pub fn new(kind: EntityKind, value: impl Into<String>, confidence: f32) -> Self {
		Self { kind, value: value.into(), confidence }
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RatingBound {
	AtLeast(f32),
	Exact(f32),
}

#[derive(Clone, Copy, Debug)]
enum Rule {
	/// Capture 1 read from its start; the longest known prefix wins.
	Leading { known: &'static [&'static str], accept_unknown: bool },
	/// Capture 1 read from its end; the longest known suffix wins.
	Trailing { known: &'static [&'static str] },
	/// Capture 1 taken verbatim.
	Term { known: &'static [&'static str] },
	Fixed { value: &'static str, confidence: f32 },
	PriceRange,
	PriceModifier,
	PriceQualifier,
	RatingAtLeast,
	RatingExact,
}

struct Detector {
	kind: EntityKind,
	regex: Regex,
	rule: Rule,
}

struct Found {
	value: String,
	confidence: f32,
	span: Range<usize>,
}

/// Scans a query for typed entities. Built once and shared; extraction never fails.
pub struct EntityExtractor {
	detectors: Vec<Detector>,
}
impl EntityExtractor {
	pub fn new() -> Result<Self> {
		let detectors = DETECTORS
			.iter()
			.map(|(kind, pattern, rule)| {
				crate::compile(pattern).map(|regex| Detector { kind: *kind, regex, rule: *rule })
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(Self { detectors })
	}

	pub fn extract(&self, query: &str, tokens: &[String]) -> Vec<Entity> {
		let lowered = query.to_lowercase();
		let mut entities = Vec::new();

		for kind in KINDS {
			let mut found: Vec<Found> = Vec::new();

			for detector in self.detectors.iter().filter(|detector| detector.kind == kind) {
				for caps in detector.regex.captures_iter(&lowered) {
					let Some(whole) = caps.get(0) else {
						continue;
					};
					let span = whole.range();

					if found.iter().any(|prior| overlaps(&prior.span, &span)) {
						continue;
					}
					if let Some((value, confidence)) = apply_rule(detector.rule, kind, &caps) {
						found.push(Found { value, confidence, span });
					}
				}
			}

			lookup_known(kind.known(), tokens, &mut found);

			entities.extend(
				found.into_iter().map(|found| Entity::new(kind, found.value, found.confidence)),
			);
		}

		entities
	}
}

/// Splits a price value on its first hyphen. Exactly two numeric parts are required.
pub fn price_bounds(value: &str) -> Option<(f64, f64)> {
	let (min, max) = value.split_once('-')?;
	let min = min.trim().parse::<f64>().ok()?;
	let max = max.trim().parse::<f64>().ok()?;

	(min.is_finite() && max.is_finite()).then_some((min, max))
}

/// Drops thousands separators from a dollar amount.
fn amount(raw: &str) -> String {
	raw.replace(',', "")
}

/// A trailing `+` marks an at-least rating; anything else is an exact rating.
pub fn rating_bound(value: &str) -> Option<RatingBound> {
	match value.trim().strip_suffix('+') {
		Some(min) => min.trim().parse().ok().map(RatingBound::AtLeast),
		None => value.trim().parse().ok().map(RatingBound::Exact),
	}
}

fn apply_rule(rule: Rule, kind: EntityKind, caps: &Captures<'_>) -> Option<(String, f32)> {
	let capture = |index: usize| caps.get(index).map(|m| m.as_str().trim());

	match rule {
		Rule::Leading { known, accept_unknown } => {
			let words = capture(1)?.split_whitespace().collect::<Vec<_>>();

			resolve_known(known, &words, true).or_else(|| {
				let first = *words.first()?;

				(accept_unknown && !is_filler(first, kind))
					.then(|| (first.to_string(), PATTERN_UNKNOWN_CONFIDENCE))
			})
		},
		Rule::Trailing { known } => {
			let words = capture(1)?.split_whitespace().collect::<Vec<_>>();

			resolve_known(known, &words, false).or_else(|| {
				let last = *words.last()?;

				(!is_filler(last, kind)).then(|| (last.to_string(), PATTERN_UNKNOWN_CONFIDENCE))
			})
		},
		Rule::Term { known } => {
			let value = capture(1)?.to_string();
			let confidence = if known.is_empty() || known.contains(&value.as_str()) {
				PATTERN_KNOWN_CONFIDENCE
			} else {
				PATTERN_UNKNOWN_CONFIDENCE
			};

			Some((value, confidence))
		},
		Rule::Fixed { value, confidence } => Some((value.to_string(), confidence)),
		Rule::PriceRange => {
			let value = format!("{}-{}", amount(capture(1)?), amount(capture(2)?));

			price_bounds(&value).map(|_| (value, 0.95))
		},
		Rule::PriceModifier => {
			let amount = amount(capture(2)?);
			let value = match capture(1)? {
				"under" | "less than" | "below" => format!("0-{amount}"),
				_ => format!("{amount}-{PRICE_CEILING}"),
			};

			Some((value, 0.9))
		},
		Rule::PriceQualifier => {
			let value = match capture(1)? {
				"cheap" | "affordable" | "budget" | "inexpensive" => "0-50".to_string(),
				_ => format!("100-{PRICE_CEILING}"),
			};

			Some((value, PATTERN_UNKNOWN_CONFIDENCE))
		},
		Rule::RatingAtLeast => {
			let rating = capture(1)?;

			valid_rating(rating).then(|| (format!("{rating}+"), 0.85))
		},
		Rule::RatingExact => {
			let rating = capture(1)?;

			valid_rating(rating).then(|| (rating.to_string(), 0.9))
		},
	}
}

fn resolve_known(known: &[&str], words: &[&str], from_start: bool) -> Option<(String, f32)> {
	(1..=words.len()).rev().find_map(|len| {
		let slice = if from_start { &words[..len] } else { &words[words.len() - len..] };
		let candidate = slice.join(" ");

		known.contains(&candidate.as_str()).then_some((candidate, PATTERN_KNOWN_CONFIDENCE))
	})
}

// A capture that is a stop word or a known entity of another kind is not a new entity.
fn is_filler(word: &str, kind: EntityKind) -> bool {
	tokenize::STOP_WORDS.contains(&word)
		|| KINDS.iter().filter(|other| **other != kind).any(|other| other.known().contains(&word))
}

fn valid_rating(raw: &str) -> bool {
	raw.parse::<f32>().map(|rating| (0.0..=5.0).contains(&rating)).unwrap_or(false)
}

fn lookup_known(known: &[&str], tokens: &[String], found: &mut Vec<Found>) {
	if known.is_empty() {
		return;
	}

	let singles = tokens.iter().map(|token| (token.clone(), TOKEN_CONFIDENCE));
	let pairs = tokenize::bigrams(tokens).map(|pair| (pair, BIGRAM_CONFIDENCE));

	for (candidate, confidence) in singles.chain(pairs) {
		if known.contains(&candidate.as_str()) && !already_covered(found, &candidate) {
			found.push(Found { value: candidate, confidence, span: 0..0 });
		}
	}
}

// A token already inside a longer value ("cotton" within "organic cotton") is not repeated.
fn already_covered(found: &[Found], candidate: &str) -> bool {
	found.iter().any(|prior| {
		prior.value == candidate || prior.value.split_whitespace().any(|word| word == candidate)
	})
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
	a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenize::{self, DEFAULT_MIN_TOKEN_LENGTH};

	fn extract(query: &str) -> Vec<Entity> {
		let extractor = EntityExtractor::new().expect("Built-in patterns must compile.");
		let tokens = tokenize::normalize(query, DEFAULT_MIN_TOKEN_LENGTH);

		extractor.extract(query, &tokens)
	}

	fn of_kind(entities: &[Entity], kind: EntityKind) -> Vec<&str> {
		entities
			.iter()
			.filter(|entity| entity.kind == kind)
			.map(|entity| entity.value.as_str())
			.collect()
	}

	#[test]
	fn color_in_product_query_is_the_only_entity() {
		let entities = extract("find a black dress");

		assert_eq!(
			entities,
			vec![Entity::new(EntityKind::Color, "black", PATTERN_KNOWN_CONFIDENCE)]
		);
	}

	#[test]
	fn between_range_yields_single_price_entity() {
		let entities = extract("items between $20 and $100");
		let prices = of_kind(&entities, EntityKind::Price);

		assert_eq!(prices, vec!["20-100"]);
		assert_eq!(price_bounds(prices[0]), Some((20.0, 100.0)));
	}

	#[test]
	fn dollar_range_and_modifiers() {
		let entities = extract("bags $10-$50 or under $30 or over $200");

		assert_eq!(of_kind(&entities, EntityKind::Price), vec!["10-50", "0-30", "200-9999"]);
	}

	#[test]
	fn thousands_separators_are_part_of_the_amount() {
		let entities = extract("sofas under $1,000 or $1,200-$2,500");
		let prices = of_kind(&entities, EntityKind::Price);

		assert_eq!(prices, vec!["1200-2500", "0-1000"]);
		assert_eq!(price_bounds(prices[1]), Some((0.0, 1000.0)));
	}

	#[test]
	fn price_qualifiers_map_to_ranges() {
		let entities = extract("cheap or luxury watches");
		let prices = entities
			.iter()
			.filter(|entity| entity.kind == EntityKind::Price)
			.map(|entity| (entity.value.as_str(), entity.confidence))
			.collect::<Vec<_>>();

		assert_eq!(prices, vec![("0-50", 0.7), ("100-9999", 0.7)]);
	}

	#[test]
	fn at_least_rating_does_not_also_emit_exact() {
		let entities = extract("jackets above 4 stars");

		assert_eq!(of_kind(&entities, EntityKind::Rating), vec!["4+"]);
		assert_eq!(rating_bound("4+"), Some(RatingBound::AtLeast(4.0)));
	}

	#[test]
	fn exact_and_qualified_ratings() {
		assert_eq!(of_kind(&extract("5 stars only"), EntityKind::Rating), vec!["5"]);
		assert_eq!(of_kind(&extract("top rated skincare"), EntityKind::Rating), vec!["4+"]);
		assert_eq!(of_kind(&extract("filter by 4+ star rating"), EntityKind::Rating), vec!["4+"]);
		assert!(of_kind(&extract("9 stars"), EntityKind::Rating).is_empty());
	}

	#[test]
	fn multiple_entities_of_same_kind_are_kept() {
		let entities = extract("red and blue bags");

		assert_eq!(of_kind(&entities, EntityKind::Color), vec!["red", "blue"]);
		assert_eq!(of_kind(&entities, EntityKind::Category), vec!["bags"]);
	}

	#[test]
	fn known_brands_resolve_inside_longer_captures() {
		let entities = extract("dresses made by green earth today");

		assert_eq!(of_kind(&entities, EntityKind::Brand), vec!["green earth"]);
	}

	#[test]
	fn loose_by_phrase_requires_known_brand() {
		let entities = extract("sort by price high to low");

		assert!(of_kind(&entities, EntityKind::Brand).is_empty());
		assert!(entities.is_empty());
	}

	#[test]
	fn bigram_lookup_finds_multi_word_values() {
		let entities = extract("organic cotton fair trade tees");
		let materials = entities
			.iter()
			.filter(|entity| entity.kind == EntityKind::Material)
			.map(|entity| (entity.value.as_str(), entity.confidence))
			.collect::<Vec<_>>();

		assert_eq!(materials, vec![("organic cotton", PATTERN_KNOWN_CONFIDENCE)]);
		assert_eq!(of_kind(&entities, EntityKind::Value), vec!["organic", "fair trade"]);
	}

	#[test]
	fn sizes_need_word_boundaries() {
		assert!(of_kind(&extract("black shell jacket"), EntityKind::Size).is_empty());
		assert_eq!(of_kind(&extract("tops in size m"), EntityKind::Size), vec!["m"]);
		assert_eq!(of_kind(&extract("xl hoodie"), EntityKind::Size), vec!["xl"]);
	}

	#[test]
	fn price_bounds_split_on_first_hyphen_only() {
		assert_eq!(price_bounds("10-50"), Some((10.0, 50.0)));
		assert_eq!(price_bounds("0-19.99"), Some((0.0, 19.99)));
		assert_eq!(price_bounds("10-20-30"), None);
		assert_eq!(price_bounds("cheap"), None);
		assert_eq!(price_bounds("-5"), None);
	}
}
