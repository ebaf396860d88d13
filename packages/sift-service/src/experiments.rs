use time::OffsetDateTime;

use crate::{BoxFuture, ExperimentAssigner, Result};
use sift_config::{ExperimentTest, Experiments};
use sift_domain::{overlay::ExperimentAssignment, profile::RelevanceAlgorithm};

/// Experiment registry backed by the `[experiments]` config section.
///
/// Assignment hashes the caller key together with the test id, so the same caller lands in the
/// same variant for as long as the test configuration is unchanged.
#[derive(Debug, Clone)]
pub struct ConfiguredExperiments {
	enabled: bool,
	tests: Vec<RegisteredTest>,
}
impl ConfiguredExperiments {
	pub fn new(cfg: &Experiments) -> Result<Self> {
		let tests = cfg.tests.iter().map(RegisteredTest::new).collect::<Result<Vec<_>>>()?;

		Ok(Self { enabled: cfg.enabled, tests })
	}

	pub fn assign_at(
		&self,
		experiment_id: &str,
		caller_key: &str,
		now: OffsetDateTime,
	) -> Option<ExperimentAssignment> {
		if !self.enabled || caller_key.is_empty() {
			return None;
		}

		let test = self.tests.iter().find(|test| test.id == experiment_id)?;

		if !test.is_running(now) {
			return None;
		}

		let variant = test.pick(caller_key)?;

		Some(ExperimentAssignment {
			test_id: test.id.clone(),
			variant_id: variant.id.clone(),
			algorithm: variant.algorithm,
			strength: variant.strength,
		})
	}
}

impl ExperimentAssigner for ConfiguredExperiments {
	fn assign_variant<'a>(
		&'a self,
		experiment_id: &'a str,
		user_id: Option<&'a str>,
		client_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<ExperimentAssignment>>> {
		let assignment = user_id
			.or(client_id)
			.and_then(|key| self.assign_at(experiment_id, key, OffsetDateTime::now_utc()));

		Box::pin(async move { Ok(assignment) })
	}
}

#[derive(Debug, Clone)]
struct RegisteredTest {
	id: String,
	is_active: bool,
	starts_at: Option<OffsetDateTime>,
	ends_at: Option<OffsetDateTime>,
	variants: Vec<RegisteredVariant>,
	total_weight: u64,
}
impl RegisteredTest {
	fn new(test: &ExperimentTest) -> Result<Self> {
		let variants = test
			.variants
			.iter()
			.map(|variant| -> Result<RegisteredVariant> {
				Ok(RegisteredVariant {
					id: variant.id.clone(),
					algorithm: variant.algorithm.parse::<RelevanceAlgorithm>()?,
					weight: u64::from(variant.weight),
					strength: variant.strength,
				})
			})
			.collect::<Result<Vec<_>>>()?;
		let total_weight = variants.iter().map(|variant| variant.weight).sum();

		Ok(Self {
			id: test.id.clone(),
			is_active: test.is_active,
			starts_at: test.starts_at,
			ends_at: test.ends_at,
			variants,
			total_weight,
		})
	}

	fn is_running(&self, now: OffsetDateTime) -> bool {
		self.is_active
			&& self.starts_at.is_none_or(|starts_at| now >= starts_at)
			&& self.ends_at.is_none_or(|ends_at| now < ends_at)
	}

	fn pick(&self, caller_key: &str) -> Option<&RegisteredVariant> {
		if self.total_weight == 0 {
			return None;
		}

		let mut point = bucket(caller_key, &self.id) % self.total_weight;

		self.variants.iter().find(|variant| {
			if point < variant.weight {
				return true;
			}

			point -= variant.weight;

			false
		})
	}
}

#[derive(Debug, Clone)]
struct RegisteredVariant {
	id: String,
	algorithm: RelevanceAlgorithm,
	weight: u64,
	strength: Option<f32>,
}

fn bucket(caller_key: &str, test_id: &str) -> u64 {
	let hash = blake3::hash(format!("{caller_key}-{test_id}").as_bytes());
	let mut prefix = [0_u8; 8];

	prefix.copy_from_slice(&hash.as_bytes()[..8]);

	u64::from_le_bytes(prefix)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;
	use sift_config::ExperimentVariant;

	const TEST_ID: &str = "search-relevance-test-001";

	fn variant(id: &str, algorithm: &str, weight: u32) -> ExperimentVariant {
		ExperimentVariant {
			id: id.to_string(),
			algorithm: algorithm.to_string(),
			weight,
			strength: None,
		}
	}

	fn experiment(variants: Vec<ExperimentVariant>) -> ExperimentTest {
		ExperimentTest {
			id: TEST_ID.to_string(),
			name: "relevance".to_string(),
			is_active: true,
			starts_at: Some(datetime!(2026-01-01 00:00 UTC)),
			ends_at: Some(datetime!(2026-12-31 00:00 UTC)),
			analytics_event_name: Some("search_relevance_test".to_string()),
			variants,
		}
	}

	fn registry(test: ExperimentTest) -> ConfiguredExperiments {
		let cfg = Experiments {
			enabled: true,
			active_experiment_id: Some(test.id.clone()),
			tests: vec![test],
		};

		ConfiguredExperiments::new(&cfg).expect("Registry must build.")
	}

	fn split_registry() -> ConfiguredExperiments {
		registry(experiment(vec![
			variant("control", "standard", 50),
			variant("treatment", "popularity", 50),
		]))
	}

	#[test]
	fn assignment_is_sticky_per_caller() {
		let registry = split_registry();
		let now = datetime!(2026-06-01 12:00 UTC);
		let first = registry.assign_at(TEST_ID, "user-42", now);

		assert!(first.is_some());

		for _ in 0..10 {
			assert_eq!(registry.assign_at(TEST_ID, "user-42", now), first);
		}
	}

	#[test]
	fn zero_weight_variants_are_never_picked() {
		let registry = registry(experiment(vec![
			variant("control", "standard", 0),
			variant("treatment", "recency", 10),
		]));
		let now = datetime!(2026-06-01 12:00 UTC);

		for index in 0..50 {
			let assignment = registry
				.assign_at(TEST_ID, &format!("user-{index}"), now)
				.expect("Running test must assign.");

			assert_eq!(assignment.variant_id, "treatment");
			assert_eq!(assignment.algorithm, RelevanceAlgorithm::Recency);
		}
	}

	#[test]
	fn both_variants_receive_traffic() {
		let registry = split_registry();
		let now = datetime!(2026-06-01 12:00 UTC);
		let treated = (0..200)
			.filter_map(|index| registry.assign_at(TEST_ID, &format!("user-{index}"), now))
			.filter(|assignment| assignment.variant_id == "treatment")
			.count();

		assert!(treated > 50 && treated < 150, "treated {treated} of 200");
	}

	#[test]
	fn window_and_activity_gate_assignment() {
		let running = registry(experiment(vec![variant("control", "standard", 1)]));
		let inside = datetime!(2026-06-01 00:00 UTC);

		assert!(running.assign_at(TEST_ID, "user-1", datetime!(2025-12-31 23:59 UTC)).is_none());
		assert!(running.assign_at(TEST_ID, "user-1", datetime!(2026-12-31 00:00 UTC)).is_none());
		assert!(running.assign_at("unknown-test", "user-1", inside).is_none());
		assert!(running.assign_at(TEST_ID, "", inside).is_none());
		assert!(running.assign_at(TEST_ID, "user-1", inside).is_some());

		let inactive = registry(ExperimentTest {
			is_active: false,
			..experiment(vec![variant("control", "standard", 1)])
		});

		assert!(inactive.assign_at(TEST_ID, "user-1", inside).is_none());
	}

	#[test]
	fn unknown_algorithm_is_rejected() {
		let cfg = Experiments {
			enabled: true,
			active_experiment_id: None,
			tests: vec![experiment(vec![variant("control", "neural", 1)])],
		};

		assert!(ConfiguredExperiments::new(&cfg).is_err());
	}

	#[test]
	fn disabled_registry_assigns_nothing() {
		let cfg = Experiments {
			enabled: false,
			active_experiment_id: None,
			tests: vec![experiment(vec![variant("control", "standard", 1)])],
		};
		let registry = ConfiguredExperiments::new(&cfg).expect("Registry must build.");

		assert!(registry.assign_at(TEST_ID, "user-1", datetime!(2026-06-01 00:00 UTC)).is_none());
	}
}
