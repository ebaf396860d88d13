use serde::Deserialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub nlp: Nlp,
	pub expansion: Expansion,
	pub index: IndexProviderConfig,
	pub personalization: Personalization,
	#[serde(default)]
	pub experiments: Experiments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nlp {
	pub enabled: bool,
	/// Tokens shorter than this many characters are dropped by the normalizer.
	#[serde(default = "default_min_token_length")]
	pub min_token_length: usize,
	/// Minimum score the keyword and statistical tiers must reach to name a primary intent.
	#[serde(default = "default_intent_confidence_threshold")]
	pub intent_confidence_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Expansion {
	pub enabled: bool,
	/// When false, only the curated thesaurus is consulted.
	pub index_lookup: bool,
	#[serde(default = "default_max_synonyms_per_term")]
	pub max_synonyms_per_term: usize,
	#[serde(default = "default_max_expansion_terms")]
	pub max_expansion_terms: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: Option<String>,
	/// Request path of the aggregation endpoint, e.g. "/products/_search".
	pub path: String,
	/// Text field whose significant terms are treated as related vocabulary.
	pub field: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Personalization {
	pub enabled: bool,
	pub default_strength: f32,
	#[serde(default = "default_max_preference_items")]
	pub max_preference_items: usize,
	#[serde(default = "default_max_price_ranges")]
	pub max_price_ranges: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Experiments {
	pub enabled: bool,
	/// Experiment consulted for callers without NLP intent data.
	pub active_experiment_id: Option<String>,
	#[serde(default)]
	pub tests: Vec<ExperimentTest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentTest {
	pub id: String,
	pub name: String,
	#[serde(default = "default_true")]
	pub is_active: bool,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub starts_at: Option<OffsetDateTime>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub ends_at: Option<OffsetDateTime>,
	pub analytics_event_name: Option<String>,
	pub variants: Vec<ExperimentVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentVariant {
	pub id: String,
	/// Scoring profile name, one of the relevance algorithms.
	pub algorithm: String,
	pub weight: u32,
	/// Optional blend strength carried by preference-style variants.
	pub strength: Option<f32>,
}

fn default_min_token_length() -> usize {
	3
}

fn default_intent_confidence_threshold() -> f32 {
	0.6
}

fn default_max_synonyms_per_term() -> usize {
	3
}

fn default_max_expansion_terms() -> usize {
	5
}

fn default_max_preference_items() -> usize {
	5
}

fn default_max_price_ranges() -> usize {
	3
}

fn default_true() -> bool {
	true
}
