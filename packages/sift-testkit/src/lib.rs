use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use serde_json::Map;

use sift_config::{
	Config, ExperimentTest, ExperimentVariant, Experiments, Expansion, IndexProviderConfig, Nlp,
	Personalization, Service,
};
use sift_domain::overlay::{ExperimentAssignment, PreferenceVector};
use sift_service::{
	AnalyticsEvent, AnalyticsSink, BoxFuture, ExperimentAssigner, IndexProvider, PreferenceStore,
	Providers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
	Respond,
	Fail,
	/// Sleeps for the given duration before responding.
	Stall(Duration),
}

/// Index double that answers related-term lookups from a fixed table.
pub struct ScriptedIndex {
	terms: HashMap<String, Vec<String>>,
	behavior: Behavior,
	calls: AtomicUsize,
}
impl ScriptedIndex {
	pub fn new<I, T>(terms: I) -> Self
	where
		I: IntoIterator<Item = (T, Vec<&'static str>)>,
		T: Into<String>,
	{
		let terms = terms
			.into_iter()
			.map(|(term, related)| (term.into(), related.into_iter().map(str::to_string).collect()))
			.collect();

		Self { terms, behavior: Behavior::Respond, calls: AtomicUsize::new(0) }
	}

	pub fn empty() -> Self {
		Self::new(Vec::<(String, Vec<&'static str>)>::new())
	}

	pub fn with_behavior(mut self, behavior: Behavior) -> Self {
		self.behavior = behavior;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl IndexProvider for ScriptedIndex {
	fn related_terms<'a>(
		&'a self,
		_cfg: &'a IndexProviderConfig,
		term: &'a str,
		max_terms: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let related = self
			.terms
			.get(term)
			.map(|related| related.iter().take(max_terms).cloned().collect())
			.unwrap_or_default();
		let behavior = self.behavior;

		Box::pin(async move {
			match behavior {
				Behavior::Respond => Ok(related),
				Behavior::Fail => Err(eyre::eyre!("Index is unavailable.")),
				Behavior::Stall(delay) => {
					tokio::time::sleep(delay).await;

					Ok(related)
				},
			}
		})
	}
}

/// Preference store double holding at most one vector, returned for every user.
pub struct ScriptedPreferences {
	preferences: Option<PreferenceVector>,
	fail: bool,
	calls: AtomicUsize,
}
impl ScriptedPreferences {
	pub fn new(preferences: Option<PreferenceVector>) -> Self {
		Self { preferences, fail: false, calls: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self { preferences: None, fail: true, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl PreferenceStore for ScriptedPreferences {
	fn preferences<'a>(
		&'a self,
		_user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<PreferenceVector>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.fail {
			Err(eyre::eyre!("Preference store is unavailable."))
		} else {
			Ok(self.preferences.clone())
		};

		Box::pin(async move { result })
	}
}

/// Experiment double that hands every caller the same assignment.
pub struct FixedAssignment {
	assignment: Option<ExperimentAssignment>,
	fail: bool,
	calls: AtomicUsize,
}
impl FixedAssignment {
	pub fn new(assignment: Option<ExperimentAssignment>) -> Self {
		Self { assignment, fail: false, calls: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self { assignment: None, fail: true, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl ExperimentAssigner for FixedAssignment {
	fn assign_variant<'a>(
		&'a self,
		_experiment_id: &'a str,
		_user_id: Option<&'a str>,
		_client_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<ExperimentAssignment>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let result = if self.fail {
			Err(eyre::eyre!("Experiment service is unavailable."))
		} else {
			Ok(self.assignment.clone())
		};

		Box::pin(async move { result })
	}
}

#[derive(Default)]
pub struct RecordingAnalytics {
	events: Mutex<Vec<AnalyticsEvent>>,
}
impl RecordingAnalytics {
	pub fn events(&self) -> Vec<AnalyticsEvent> {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl AnalyticsSink for RecordingAnalytics {
	fn track(&self, event: AnalyticsEvent) {
		self.events.lock().unwrap_or_else(|err| err.into_inner()).push(event);
	}
}

/// Handles to the doubles wired into a [`Providers`] value.
pub struct Doubles {
	pub index: Arc<ScriptedIndex>,
	pub preferences: Arc<ScriptedPreferences>,
	pub experiments: Arc<FixedAssignment>,
	pub analytics: Arc<RecordingAnalytics>,
}
impl Doubles {
	pub fn new(
		index: ScriptedIndex,
		preferences: ScriptedPreferences,
		experiments: FixedAssignment,
	) -> Self {
		Self {
			index: Arc::new(index),
			preferences: Arc::new(preferences),
			experiments: Arc::new(experiments),
			analytics: Arc::new(RecordingAnalytics::default()),
		}
	}

	pub fn providers(&self) -> Providers {
		Providers::new(
			self.index.clone(),
			self.preferences.clone(),
			self.experiments.clone(),
			self.analytics.clone(),
		)
	}
}

/// A valid configuration with NLP, expansion, personalization and experiments enabled and a
/// short index timeout.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "warn".to_string() },
		nlp: Nlp { enabled: true, min_token_length: 3, intent_confidence_threshold: 0.6 },
		expansion: Expansion {
			enabled: true,
			index_lookup: true,
			max_synonyms_per_term: 3,
			max_expansion_terms: 5,
		},
		index: IndexProviderConfig {
			provider_id: "scripted".to_string(),
			api_base: "http://127.0.0.1:9".to_string(),
			api_key: None,
			path: "/products/_search".to_string(),
			field: "description".to_string(),
			timeout_ms: 100,
			default_headers: Map::new(),
		},
		personalization: Personalization {
			enabled: true,
			default_strength: 0.5,
			max_preference_items: 5,
			max_price_ranges: 3,
		},
		experiments: Experiments {
			enabled: true,
			active_experiment_id: Some("search-relevance-test-001".to_string()),
			tests: vec![ExperimentTest {
				id: "search-relevance-test-001".to_string(),
				name: "Search relevance: standard vs popularity".to_string(),
				is_active: true,
				starts_at: None,
				ends_at: None,
				analytics_event_name: Some("search_relevance_test".to_string()),
				variants: vec![
					ExperimentVariant {
						id: "control".to_string(),
						algorithm: "standard".to_string(),
						weight: 50,
						strength: None,
					},
					ExperimentVariant {
						id: "treatment".to_string(),
						algorithm: "popularity".to_string(),
						weight: 50,
						strength: None,
					},
				],
			}],
		},
	}
}
