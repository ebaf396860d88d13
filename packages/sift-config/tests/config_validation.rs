use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use sift_config::Config;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sift_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> sift_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = sift_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads_and_normalizes_blank_api_key() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Sample config must be valid.");

	assert!(cfg.index.api_key.is_none());
	assert_eq!(cfg.nlp.min_token_length, 3);
	assert_eq!(cfg.experiments.tests.len(), 2);
	assert!(cfg.experiments.tests[0].starts_at.is_some());
	assert!(cfg.experiments.tests[1].starts_at.is_none());
}

#[test]
fn intent_threshold_must_be_in_range() {
	let payload = sample_toml_with("nlp", "intent_confidence_threshold", Value::Float(1.5));
	let err = load_payload(payload).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("nlp.intent_confidence_threshold must be in the range"),
		"Unexpected error: {err}"
	);
}

#[test]
fn expansion_limits_must_be_positive() {
	let payload = sample_toml_with("expansion", "max_expansion_terms", Value::Integer(0));
	let err = load_payload(payload).expect_err("Expected expansion validation error.");

	assert!(
		err.to_string().contains("expansion.max_expansion_terms must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn index_lookup_requires_api_base() {
	let payload = sample_toml_with("index", "api_base", Value::String(" ".to_string()));
	let err = load_payload(payload).expect_err("Expected index validation error.");

	assert!(
		err.to_string().contains("index.api_base must be non-empty"),
		"Unexpected error: {err}"
	);
}

#[test]
fn personalization_strength_must_be_unit_interval() {
	let mut cfg = base_config();

	cfg.personalization.default_strength = 1.2;

	let err = sift_config::validate(&cfg).expect_err("Expected strength validation error.");

	assert!(
		err.to_string().contains("personalization.default_strength must be in the range 0.0-1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn experiment_variants_must_use_known_algorithms() {
	let mut cfg = base_config();

	cfg.experiments.tests[0].variants[1].algorithm = "neural".to_string();

	let err = sift_config::validate(&cfg).expect_err("Expected algorithm validation error.");

	assert!(err.to_string().contains("unknown algorithm neural"), "Unexpected error: {err}");
}

#[test]
fn active_experiment_must_be_configured() {
	let mut cfg = base_config();

	cfg.experiments.active_experiment_id = Some("missing-test".to_string());

	let err = sift_config::validate(&cfg).expect_err("Expected experiment validation error.");

	assert!(err.to_string().contains("missing-test"), "Unexpected error: {err}");
}

#[test]
fn experiment_weights_must_not_sum_to_zero() {
	let mut cfg = base_config();

	for variant in &mut cfg.experiments.tests[1].variants {
		variant.weight = 0;
	}

	let err = sift_config::validate(&cfg).expect_err("Expected weight validation error.");

	assert!(
		err.to_string().contains("variant weights must sum to more than zero"),
		"Unexpected error: {err}"
	);
}

#[test]
fn experiment_weights_may_exceed_u32_in_total() {
	let mut cfg = base_config();
	let variants = &mut cfg.experiments.tests[0].variants;

	variants[0].weight = u32::MAX;
	variants[1].weight = 1;

	assert!(sift_config::validate(&cfg).is_ok());
}
