pub mod analytics;
pub mod expansion;
pub mod experiments;
pub mod preferences;
pub mod understand;

mod error;

pub use analytics::{AnalyticsEvent, TracingAnalytics};
pub use error::{Error, Result};
pub use expansion::{ExpansionResult, ExpansionSource};
pub use experiments::ConfiguredExperiments;
pub use preferences::InMemoryPreferenceStore;
pub use understand::{SearchMetadata, UnderstandRequest, UnderstandResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use sift_config::{Config, IndexProviderConfig};
use sift_domain::{
	entity::EntityExtractor,
	intent::IntentClassifier,
	overlay::{ExperimentAssignment, PreferenceVector},
};
use sift_providers::index;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait IndexProvider
where
	Self: Send + Sync,
{
	fn related_terms<'a>(
		&'a self,
		cfg: &'a IndexProviderConfig,
		term: &'a str,
		max_terms: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>>;
}

pub trait PreferenceStore
where
	Self: Send + Sync,
{
	fn preferences<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<PreferenceVector>>>;
}

pub trait ExperimentAssigner
where
	Self: Send + Sync,
{
	/// Must return the same variant for the same experiment and caller while the experiment runs.
	fn assign_variant<'a>(
		&'a self,
		experiment_id: &'a str,
		user_id: Option<&'a str>,
		client_id: Option<&'a str>,
	) -> BoxFuture<'a, color_eyre::Result<Option<ExperimentAssignment>>>;
}

/// Fire-and-forget event sink. Implementations must not block the caller.
pub trait AnalyticsSink
where
	Self: Send + Sync,
{
	fn track(&self, event: AnalyticsEvent);
}

#[derive(Clone)]
pub struct Providers {
	pub index: Arc<dyn IndexProvider>,
	pub preferences: Arc<dyn PreferenceStore>,
	pub experiments: Arc<dyn ExperimentAssigner>,
	pub analytics: Arc<dyn AnalyticsSink>,
}
impl Providers {
	pub fn new(
		index: Arc<dyn IndexProvider>,
		preferences: Arc<dyn PreferenceStore>,
		experiments: Arc<dyn ExperimentAssigner>,
		analytics: Arc<dyn AnalyticsSink>,
	) -> Self {
		Self { index, preferences, experiments, analytics }
	}

	/// HTTP index client, an empty preference store, the configured experiment registry and a
	/// tracing analytics sink.
	pub fn from_config(cfg: &Config) -> Result<Self> {
		Ok(Self {
			index: Arc::new(DefaultProviders),
			preferences: Arc::new(InMemoryPreferenceStore::default()),
			experiments: Arc::new(ConfiguredExperiments::new(&cfg.experiments)?),
			analytics: Arc::new(TracingAnalytics),
		})
	}
}

pub struct SiftService {
	pub cfg: Config,
	pub providers: Providers,
	extractor: EntityExtractor,
	classifier: IntentClassifier,
}
impl SiftService {
	pub fn new(cfg: Config) -> Result<Self> {
		let providers = Providers::from_config(&cfg)?;

		Self::with_providers(cfg, providers)
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		sift_config::validate(&cfg)?;

		let extractor = EntityExtractor::new()?;
		let classifier = IntentClassifier::new(cfg.nlp.intent_confidence_threshold)?;

		Ok(Self { cfg, providers, extractor, classifier })
	}
}

struct DefaultProviders;

impl IndexProvider for DefaultProviders {
	fn related_terms<'a>(
		&'a self,
		cfg: &'a IndexProviderConfig,
		term: &'a str,
		max_terms: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		Box::pin(index::related_terms(cfg, term, max_terms))
	}
}
