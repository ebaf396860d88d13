use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sift_domain::{intent::IntentLabel, overlay::PreferenceVector};
use sift_providers::index::{self, Pagination};
use sift_service::{
	InMemoryPreferenceStore, Providers, SiftService, UnderstandRequest, UnderstandResponse,
};

#[derive(Debug, Parser)]
#[command(
	version = sift_cli::VERSION,
	rename_all = "kebab",
	styles = sift_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(
		long,
		short = 'q',
		value_name = "TEXT",
		required_unless_present = "dataset",
		conflicts_with = "dataset"
	)]
	pub query: Option<String>,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: Option<PathBuf>,
	#[arg(long, value_name = "ID")]
	pub user_id: Option<String>,
	#[arg(long, value_name = "ID")]
	pub client_id: Option<String>,
	#[arg(long, value_name = "ID")]
	pub experiment_id: Option<String>,
	/// JSON preference vector served for `--user-id`.
	#[arg(long, value_name = "FILE", requires = "user_id")]
	pub preferences: Option<PathBuf>,
	#[arg(long, value_name = "STRENGTH")]
	pub strength: Option<f32>,
	#[arg(long)]
	pub no_nlp: bool,
	/// Also print the index request body built from the final parameters.
	#[arg(long)]
	pub render: bool,
	#[arg(long, value_name = "N", default_value_t = 20)]
	pub size: usize,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	#[serde(default)]
	defaults: EvalDefaults,
	queries: Vec<EvalQuery>,
}

#[derive(Debug, Default, Deserialize, Clone)]
struct EvalDefaults {
	user_id: Option<String>,
	client_id: Option<String>,
	experiment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvalQuery {
	id: Option<String>,
	query: String,
	expected_intent: Option<String>,
	user_id: Option<String>,
	client_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryOutput {
	#[serde(flatten)]
	response: UnderstandResponse,
	#[serde(skip_serializing_if = "Option::is_none")]
	search_body: Option<Value>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: EvalDatasetInfo,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
}

#[derive(Debug, Default, Serialize)]
struct EvalSummary {
	labeled: usize,
	correct: usize,
	intent_accuracy: f64,
	nlp_processed: usize,
	profiles: BTreeMap<String, usize>,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	query: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	expected_intent: Option<IntentLabel>,
	#[serde(skip_serializing_if = "Option::is_none")]
	predicted_intent: Option<IntentLabel>,
	#[serde(skip_serializing_if = "Option::is_none")]
	confidence: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	correct: Option<bool>,
	relevance_profile: String,
	entity_count: usize,
	expanded_terms: Vec<String>,
	latency_ms: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	search_body: Option<Value>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = sift_config::load(&args.config)?;
	let filter = EnvFilter::try_new(cfg.service.log_level.clone())
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let mut providers = Providers::from_config(&cfg)?;

	if let (Some(path), Some(user_id)) = (&args.preferences, &args.user_id) {
		let mut store = InMemoryPreferenceStore::default();

		store.insert(user_id.clone(), load_preferences(path)?);

		providers.preferences = Arc::new(store);
	}

	let service = SiftService::with_providers(cfg, providers)?;
	let page = Pagination { from: 0, size: args.size };

	if let Some(query) = &args.query {
		let req = UnderstandRequest {
			query: query.clone(),
			user_id: args.user_id.clone(),
			client_id: args.client_id.clone(),
			nlp: args.no_nlp.then_some(false),
			personalization_strength: args.strength,
			experiment_id: args.experiment_id.clone(),
		};
		let response = service.understand(req).await;
		let search_body = args
			.render
			.then(|| index::render_search_body(&response.query, &response.parameters, page));
		let json = serde_json::to_string_pretty(&QueryOutput { response, search_body })?;

		println!("{json}");

		return Ok(());
	}

	let dataset_path =
		args.dataset.as_ref().ok_or_else(|| eyre::eyre!("--query or --dataset is required."))?;
	let dataset = load_dataset(dataset_path)?;
	let output = eval_dataset(&service, dataset, &args, page).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

async fn eval_dataset(
	service: &SiftService,
	dataset: EvalDataset,
	args: &Args,
	page: Pagination,
) -> color_eyre::Result<EvalOutput> {
	let EvalDataset { name, defaults, queries } = dataset;
	let query_count = queries.len();
	let mut reports = Vec::with_capacity(query_count);

	tracing::info!(queries = query_count, "Evaluating dataset.");

	for (ordinal, item) in queries.into_iter().enumerate() {
		let expected_intent = item
			.expected_intent
			.as_deref()
			.map(str::parse::<IntentLabel>)
			.transpose()
			.map_err(|err| eyre::eyre!("Query {ordinal}: {err}"))?;
		let req = UnderstandRequest {
			query: item.query,
			user_id: item
				.user_id
				.or_else(|| defaults.user_id.clone())
				.or_else(|| args.user_id.clone()),
			client_id: item
				.client_id
				.or_else(|| defaults.client_id.clone())
				.or_else(|| args.client_id.clone()),
			nlp: args.no_nlp.then_some(false),
			personalization_strength: args.strength,
			experiment_id: defaults.experiment_id.clone().or_else(|| args.experiment_id.clone()),
		};
		let started = Instant::now();
		let response = service.understand(req).await;
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let predicted_intent = response.metadata.intent;

		reports.push(QueryReport {
			id: item.id.unwrap_or_else(|| format!("q{ordinal}")),
			expected_intent,
			predicted_intent,
			confidence: response.intent.as_ref().map(|intent| intent.confidence),
			correct: expected_intent.map(|expected| predicted_intent == Some(expected)),
			relevance_profile: response.metadata.relevance_profile.clone(),
			entity_count: response.metadata.entities_detected,
			search_body: args
				.render
				.then(|| index::render_search_body(&response.query, &response.parameters, page)),
			expanded_terms: response.expansion.expanded_terms,
			latency_ms,
			query: response.query,
		});
	}

	Ok(EvalOutput {
		dataset: EvalDatasetInfo { name: name.unwrap_or_else(|| "unnamed".to_string()), query_count },
		summary: summarize(&reports),
		queries: reports,
	})
}

fn summarize(reports: &[QueryReport]) -> EvalSummary {
	let mut summary = EvalSummary::default();
	let mut latencies = reports.iter().map(|report| report.latency_ms).collect::<Vec<_>>();

	for report in reports {
		if let Some(correct) = report.correct {
			summary.labeled += 1;

			if correct {
				summary.correct += 1;
			}
		}
		if report.predicted_intent.is_some() {
			summary.nlp_processed += 1;
		}

		*summary.profiles.entry(report.relevance_profile.clone()).or_default() += 1;
	}

	if summary.labeled > 0 {
		summary.intent_accuracy = summary.correct as f64 / summary.labeled as f64;
	}

	latencies.sort_by(f64::total_cmp);

	summary.latency_ms_p50 = percentile(&latencies, 0.5);
	summary.latency_ms_p95 = percentile(&latencies, 0.95);

	summary
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

fn load_preferences(path: &Path) -> color_eyre::Result<PreferenceVector> {
	let raw = fs::read_to_string(path)?;

	Ok(serde_json::from_str(&raw)?)
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;
		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn report(
		expected: Option<IntentLabel>,
		predicted: Option<IntentLabel>,
		latency_ms: f64,
	) -> QueryReport {
		QueryReport {
			id: "q".to_string(),
			query: "q".to_string(),
			expected_intent: expected,
			predicted_intent: predicted,
			confidence: predicted.map(|_| 0.9),
			correct: expected.map(|expected| predicted == Some(expected)),
			relevance_profile: if predicted.is_some() { "intent" } else { "standard" }.to_string(),
			entity_count: 0,
			expanded_terms: Vec::new(),
			latency_ms,
			search_body: None,
		}
	}

	#[test]
	fn percentile_interpolates() {
		assert_eq!(percentile(&[], 0.5), 0.0);
		assert_eq!(percentile(&[1.0, 3.0], 0.5), 2.0);
		assert_eq!(percentile(&[1.0, 2.0, 3.0], 1.0), 3.0);
	}

	#[test]
	fn summary_counts_only_labeled_queries() {
		let reports = vec![
			report(Some(IntentLabel::Sort), Some(IntentLabel::Sort), 3.0),
			report(Some(IntentLabel::Filter), Some(IntentLabel::ProductSearch), 1.0),
			report(None, Some(IntentLabel::Comparison), 2.0),
			report(None, None, 4.0),
		];
		let summary = summarize(&reports);

		assert_eq!(summary.labeled, 2);
		assert_eq!(summary.correct, 1);
		assert_eq!(summary.intent_accuracy, 0.5);
		assert_eq!(summary.nlp_processed, 3);
		assert_eq!(summary.profiles.get("intent"), Some(&3));
		assert_eq!(summary.profiles.get("standard"), Some(&1));
		assert_eq!(summary.latency_ms_p50, 2.5);
	}

	#[test]
	fn dataset_parses_defaults_and_labels() {
		let dataset: EvalDataset = serde_json::from_str(
			r#"{
				"name": "smoke",
				"defaults": { "client_id": "browser-1" },
				"queries": [
					{ "query": "find a black dress", "expected_intent": "product_search" },
					{ "id": "sort", "query": "sort by price high to low" }
				]
			}"#,
		)
		.expect("Failed to parse dataset.");

		assert_eq!(dataset.queries.len(), 2);
		assert_eq!(dataset.defaults.client_id.as_deref(), Some("browser-1"));
		let expected = dataset.queries[0]
			.expected_intent
			.as_deref()
			.map(str::parse::<IntentLabel>)
			.transpose()
			.expect("Failed to parse intent label.");

		assert_eq!(expected, Some(IntentLabel::ProductSearch));
		assert!(dataset.queries[1].expected_intent.is_none());
	}
}
