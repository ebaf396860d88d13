use std::{
	collections::{BTreeMap, HashSet},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::IndexProvider;
use sift_config::Config;
use sift_domain::tokenize;

/// Hand-maintained synonyms for marketplace vocabulary. Multi-word keys match token bigrams.
pub const CURATED_SYNONYMS: &[(&str, &[&str])] = &[
	("sustainable", &["eco-friendly", "green", "environmentally friendly"]),
	("eco", &["sustainable", "green", "environmentally friendly"]),
	("organic", &["natural", "chemical-free", "pesticide-free"]),
	("vegan", &["plant-based", "cruelty-free", "animal-free"]),
	("ethical", &["fair trade", "responsible", "conscious"]),
	("recycled", &["upcycled", "repurposed", "reclaimed"]),
	("handmade", &["artisan", "handcrafted", "small batch"]),
	("local", &["locally made", "nearby", "community"]),
	("fair trade", &["ethically sourced", "fairly traded"]),
	("small batch", &["handmade", "artisan", "limited run"]),
	("zero waste", &["plastic-free", "package-free"]),
	("cheap", &["affordable", "budget", "inexpensive"]),
	("affordable", &["cheap", "budget", "value"]),
	("luxury", &["premium", "high-end", "designer"]),
	("shirt", &["tee", "top", "blouse"]),
	("shoes", &["footwear", "sneakers", "boots"]),
	("bag", &["tote", "purse", "backpack"]),
	("dress", &["gown", "frock", "sundress"]),
	("jeans", &["denim", "pants", "trousers"]),
	("jewelry", &["accessories", "necklace", "earrings"]),
	("skincare", &["beauty", "cosmetics", "moisturizer"]),
	("gift", &["present", "gift set"]),
	("bottle", &["flask", "tumbler"]),
	("mat", &["rug", "pad"]),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionSource {
	Thesaurus,
	Index,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionResult {
	/// The original query verbatim, followed by the retained expansion terms.
	pub expanded_query: String,
	pub expanded_terms: Vec<String>,
	pub source_by_term: BTreeMap<String, Vec<ExpansionSource>>,
}
impl ExpansionResult {
	pub fn passthrough(query: &str) -> Self {
		Self {
			expanded_query: query.to_string(),
			expanded_terms: Vec::new(),
			source_by_term: BTreeMap::new(),
		}
	}
}

/// Curated synonyms for `term`, falling back to a stem match for single words.
pub fn curated_synonyms(term: &str) -> Option<&'static [&'static str]> {
	CURATED_SYNONYMS.iter().find(|(key, _)| *key == term).map(|(_, synonyms)| *synonyms).or_else(
		|| {
			if term.contains(' ') {
				return None;
			}

			let stem = tokenize::stem(term);

			CURATED_SYNONYMS
				.iter()
				.find(|(key, _)| !key.contains(' ') && tokenize::stem(key) == stem)
				.map(|(_, synonyms)| *synonyms)
		},
	)
}

/// Expands `tokens` with curated synonyms first and index related terms second.
///
/// The index phase is bounded by the index timeout. Any index failure discards the whole phase
/// and the result falls back to curated terms only.
pub async fn expand(
	cfg: &Config,
	index: &dyn IndexProvider,
	query: &str,
	tokens: &[String],
) -> ExpansionResult {
	if !cfg.expansion.enabled || tokens.is_empty() {
		return ExpansionResult::passthrough(query);
	}

	let per_term = cfg.expansion.max_synonyms_per_term;
	let mut merger = Merger::new(query, tokens, cfg.expansion.max_expansion_terms);

	for term in tokens.iter().cloned().chain(tokenize::bigrams(tokens)) {
		for synonym in curated_synonyms(&term).unwrap_or_default().iter().take(per_term) {
			merger.offer(synonym, ExpansionSource::Thesaurus);
		}
	}

	if cfg.expansion.index_lookup && !merger.is_full() {
		let timeout = Duration::from_millis(cfg.index.timeout_ms);

		match tokio::time::timeout(timeout, index_terms(cfg, index, tokens)).await {
			Ok(Ok(related)) =>
				for term in related {
					merger.offer(&term, ExpansionSource::Index);
				},
			Ok(Err(err)) => {
				tracing::warn!(
					error = %err,
					"Index related-term lookup failed. Using curated synonyms only."
				);
			},
			Err(_) => {
				tracing::warn!(
					timeout_ms = cfg.index.timeout_ms,
					"Index related-term lookup timed out. Using curated synonyms only."
				);
			},
		}
	}

	merger.finish(query)
}

async fn index_terms(
	cfg: &Config,
	index: &dyn IndexProvider,
	tokens: &[String],
) -> color_eyre::Result<Vec<String>> {
	let mut seen = HashSet::new();
	let mut related = Vec::new();

	for token in tokens {
		if !seen.insert(token.as_str()) {
			continue;
		}

		let terms =
			index.related_terms(&cfg.index, token, cfg.expansion.max_synonyms_per_term).await?;

		related.extend(terms.into_iter().take(cfg.expansion.max_synonyms_per_term));
	}

	Ok(related)
}

struct Merger {
	existing: HashSet<String>,
	cap: usize,
	terms: Vec<String>,
	source_by_term: BTreeMap<String, Vec<ExpansionSource>>,
}
impl Merger {
	fn new(query: &str, tokens: &[String], cap: usize) -> Self {
		let existing = tokens
			.iter()
			.cloned()
			.chain(query.split_whitespace().map(str::to_lowercase))
			.collect();

		Self { existing, cap, terms: Vec::new(), source_by_term: BTreeMap::new() }
	}

	fn is_full(&self) -> bool {
		self.terms.len() >= self.cap
	}

	fn offer(&mut self, candidate: &str, source: ExpansionSource) {
		let candidate = candidate.trim();
		let key = candidate.to_lowercase();

		if key.is_empty() || self.existing.contains(&key) {
			return;
		}

		if let Some(retained) = self.terms.iter().find(|term| term.to_lowercase() == key) {
			let sources = self.source_by_term.entry(retained.clone()).or_default();

			if !sources.contains(&source) {
				sources.push(source);
			}

			return;
		}
		if self.is_full() {
			return;
		}

		self.terms.push(candidate.to_string());
		self.source_by_term.insert(candidate.to_string(), vec![source]);
	}

	fn finish(self, query: &str) -> ExpansionResult {
		if self.terms.is_empty() {
			return ExpansionResult::passthrough(query);
		}

		ExpansionResult {
			expanded_query: format!("{query} {}", self.terms.join(" ")),
			expanded_terms: self.terms,
			source_by_term: self.source_by_term,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stem_fallback_finds_plural_keys() {
		assert_eq!(curated_synonyms("dresses"), curated_synonyms("dress"));
		assert!(curated_synonyms("bags").is_some());
		assert!(curated_synonyms("fair trade").is_some());
		assert!(curated_synonyms("umbrella").is_none());
	}

	#[test]
	fn merger_dedups_case_insensitively_and_caps() {
		let tokens = vec!["organic".to_string()];
		let mut merger = Merger::new("Organic soap", &tokens, 2);

		merger.offer("Natural", ExpansionSource::Thesaurus);
		merger.offer("natural", ExpansionSource::Index);
		merger.offer("SOAP", ExpansionSource::Index);
		merger.offer("chemical-free", ExpansionSource::Thesaurus);
		merger.offer("handmade", ExpansionSource::Index);

		let result = merger.finish("Organic soap");

		assert_eq!(result.expanded_terms, vec!["Natural".to_string(), "chemical-free".to_string()]);
		assert_eq!(result.expanded_query, "Organic soap Natural chemical-free");
		assert_eq!(
			result.source_by_term.get("Natural"),
			Some(&vec![ExpansionSource::Thesaurus, ExpansionSource::Index])
		);
	}

	#[test]
	fn empty_merge_is_passthrough() {
		let result = Merger::new("blue umbrella", &[], 5).finish("blue umbrella");

		assert_eq!(result, ExpansionResult::passthrough("blue umbrella"));
	}
}
