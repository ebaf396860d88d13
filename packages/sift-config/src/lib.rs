mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, ExperimentTest, ExperimentVariant, Experiments, Expansion, IndexProviderConfig, Nlp,
	Personalization, Service,
};

use std::{fs, path::Path};

pub const RELEVANCE_ALGORITHMS: [&str; 7] =
	["standard", "intent", "preference", "hybrid", "popularity", "recency", "semantic"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.nlp.min_token_length == 0 {
		return Err(Error::Validation {
			message: "nlp.min_token_length must be greater than zero.".to_string(),
		});
	}
	if !cfg.nlp.intent_confidence_threshold.is_finite() {
		return Err(Error::Validation {
			message: "nlp.intent_confidence_threshold must be a finite number.".to_string(),
		});
	}
	if cfg.nlp.intent_confidence_threshold <= 0.0 || cfg.nlp.intent_confidence_threshold > 1.0 {
		return Err(Error::Validation {
			message: "nlp.intent_confidence_threshold must be in the range (0.0, 1.0]."
				.to_string(),
		});
	}
	if cfg.expansion.max_synonyms_per_term == 0 {
		return Err(Error::Validation {
			message: "expansion.max_synonyms_per_term must be greater than zero.".to_string(),
		});
	}
	if cfg.expansion.max_expansion_terms == 0 {
		return Err(Error::Validation {
			message: "expansion.max_expansion_terms must be greater than zero.".to_string(),
		});
	}
	if cfg.index.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "index.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.expansion.index_lookup {
		for (label, value) in [
			("index.api_base", &cfg.index.api_base),
			("index.path", &cfg.index.path),
			("index.field", &cfg.index.field),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation {
					message: format!("{label} must be non-empty when expansion.index_lookup is true."),
				});
			}
		}
	}
	if !cfg.personalization.default_strength.is_finite() {
		return Err(Error::Validation {
			message: "personalization.default_strength must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.personalization.default_strength) {
		return Err(Error::Validation {
			message: "personalization.default_strength must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.personalization.max_preference_items == 0 {
		return Err(Error::Validation {
			message: "personalization.max_preference_items must be greater than zero.".to_string(),
		});
	}

	validate_experiments(&cfg.experiments)?;

	Ok(())
}

fn validate_experiments(experiments: &Experiments) -> Result<()> {
	for test in &experiments.tests {
		if test.id.trim().is_empty() {
			return Err(Error::Validation {
				message: "experiments.tests.id must be non-empty.".to_string(),
			});
		}
		if test.variants.is_empty() {
			return Err(Error::Validation {
				message: format!("Experiment {} must declare at least one variant.", test.id),
			});
		}
		if test.variants.iter().map(|variant| u64::from(variant.weight)).sum::<u64>() == 0 {
			return Err(Error::Validation {
				message: format!("Experiment {} variant weights must sum to more than zero.", test.id),
			});
		}
		if let (Some(starts_at), Some(ends_at)) = (test.starts_at, test.ends_at)
			&& ends_at <= starts_at
		{
			return Err(Error::Validation {
				message: format!("Experiment {} ends_at must be after starts_at.", test.id),
			});
		}

		for variant in &test.variants {
			if !RELEVANCE_ALGORITHMS.contains(&variant.algorithm.as_str()) {
				return Err(Error::Validation {
					message: format!(
						"Experiment {} variant {} uses unknown algorithm {}.",
						test.id, variant.id, variant.algorithm
					),
				});
			}

			if let Some(strength) = variant.strength
				&& (!strength.is_finite() || !(0.0..=1.0).contains(&strength))
			{
				return Err(Error::Validation {
					message: format!(
						"Experiment {} variant {} strength must be in the range 0.0-1.0.",
						test.id, variant.id
					),
				});
			}
		}
	}

	if experiments.enabled
		&& let Some(active) = experiments.active_experiment_id.as_deref()
		&& !experiments.tests.iter().any(|test| test.id == active)
	{
		return Err(Error::Validation {
			message: format!(
				"experiments.active_experiment_id {active} does not name a configured test."
			),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.index.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.index.api_key = None;
	}
	if cfg
		.experiments
		.active_experiment_id
		.as_deref()
		.map(|id| id.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.experiments.active_experiment_id = None;
	}
}
