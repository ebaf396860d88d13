use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AnalyticsEvent, Error, ExpansionResult, SiftService, expansion};
use sift_domain::{
	entity::Entity,
	intent::{IntentLabel, IntentResult},
	overlay::{self, BlendLimits, ExperimentAssignment, OverlayContext, PreferenceVector, Provenance},
	params::SearchParameters,
	synthesize, tokenize,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnderstandRequest {
	pub query: String,
	pub user_id: Option<String>,
	/// Anonymous caller identity used for experiment bucketing when no user is signed in.
	pub client_id: Option<String>,
	/// Overrides `nlp.enabled` for this request.
	pub nlp: Option<bool>,
	/// Overrides `personalization.default_strength`. Clamped to [0, 1].
	pub personalization_strength: Option<f32>,
	/// Overrides `experiments.active_experiment_id`.
	pub experiment_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
	pub nlp_processed: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intent: Option<IntentLabel>,
	pub entities_detected: usize,
	pub relevance_profile: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub personalization_strength: Option<f32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ab_test: Option<ExperimentAssignment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderstandResponse {
	pub request_id: Uuid,
	pub query: String,
	pub tokens: Vec<String>,
	pub stems: Vec<String>,
	pub entities: Vec<Entity>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intent: Option<IntentResult>,
	pub expansion: ExpansionResult,
	pub parameters: SearchParameters,
	pub metadata: SearchMetadata,
}

impl SiftService {
	/// Runs the full understanding pipeline for one query.
	///
	/// Never fails: every stage either succeeds or degrades to its documented default, and the
	/// worst case is neutral parameters with `nlp_processed = false`.
	pub async fn understand(&self, req: UnderstandRequest) -> UnderstandResponse {
		let request_id = Uuid::new_v4();
		let query = req.query.as_str();
		let nlp_enabled = req.nlp.unwrap_or(self.cfg.nlp.enabled);
		let tokens = tokenize::normalize(query, self.cfg.nlp.min_token_length);
		let stems = tokenize::stems(&tokens);
		let analysis = async {
			nlp_enabled.then(|| {
				(self.classifier.classify(query), self.extractor.extract(query, &tokens))
			})
		};
		let expansion =
			expansion::expand(&self.cfg, self.providers.index.as_ref(), query, &tokens);
		let (analysis, expansion) = tokio::join!(analysis, expansion);
		let (intent, entities) = match analysis {
			Some((intent, entities)) => (Some(intent), entities),
			None => (None, Vec::new()),
		};
		let base = match &intent {
			Some(intent) => synthesize::synthesize(intent, &entities, query),
			None => SearchParameters::neutral(),
		};
		let experiment =
			if intent.is_none() { self.assign_experiment(&req).await } else { None };
		let preferences = if intent.is_none()
			&& experiment.as_ref().is_none_or(|assignment| assignment.algorithm.uses_preferences())
		{
			self.load_preferences(&req).await
		} else {
			None
		};
		let strength = req
			.personalization_strength
			.filter(|strength| strength.is_finite())
			.map(|strength| strength.clamp(0.0, 1.0))
			.unwrap_or(self.cfg.personalization.default_strength);
		let ctx = OverlayContext {
			intent: intent.as_ref(),
			experiment: experiment.as_ref(),
			preferences: preferences.as_ref(),
			strength,
			limits: BlendLimits {
				max_items: self.cfg.personalization.max_preference_items,
				max_price_ranges: self.cfg.personalization.max_price_ranges,
			},
		};
		let (parameters, provenance) = overlay::overlay(base, &ctx);
		let Provenance { relevance_profile, personalization_strength, ab_test } = provenance;
		let metadata = SearchMetadata {
			nlp_processed: intent.is_some(),
			intent: intent.as_ref().map(|intent| intent.primary),
			entities_detected: entities.len(),
			relevance_profile,
			personalization_strength,
			ab_test,
		};

		tracing::debug!(
			%request_id,
			tokens = tokens.len(),
			expanded_terms = expansion.expanded_terms.len(),
			relevance_profile = metadata.relevance_profile.as_str(),
			"Query pipeline completed."
		);

		self.track(request_id, &req, &metadata);

		UnderstandResponse {
			request_id,
			query: req.query,
			tokens,
			stems,
			entities,
			intent,
			expansion,
			parameters,
			metadata,
		}
	}

	async fn assign_experiment(&self, req: &UnderstandRequest) -> Option<ExperimentAssignment> {
		let experiments = &self.cfg.experiments;

		if !experiments.enabled {
			return None;
		}

		let experiment_id =
			req.experiment_id.as_deref().or(experiments.active_experiment_id.as_deref())?;
		let user_id = req.user_id.as_deref();
		let client_id = req.client_id.as_deref();

		if user_id.is_none() && client_id.is_none() {
			return None;
		}

		match self.providers.experiments.assign_variant(experiment_id, user_id, client_id).await {
			Ok(assignment) => assignment,
			Err(err) => {
				let err = Error::from(err);

				tracing::warn!(
					error = %err,
					experiment_id,
					"Experiment assignment failed. Skipping the experiment profile."
				);

				None
			},
		}
	}

	async fn load_preferences(&self, req: &UnderstandRequest) -> Option<PreferenceVector> {
		if !self.cfg.personalization.enabled {
			return None;
		}

		let user_id = req.user_id.as_deref()?;

		match self.providers.preferences.preferences(user_id).await {
			Ok(preferences) => preferences,
			Err(err) => {
				let err = Error::from(err);

				tracing::warn!(
					error = %err,
					user_id,
					"Preference lookup failed. Skipping personalization."
				);

				None
			},
		}
	}

	fn track(&self, request_id: Uuid, req: &UnderstandRequest, metadata: &SearchMetadata) {
		let at = OffsetDateTime::now_utc();

		self.providers.analytics.track(AnalyticsEvent::QueryUnderstood {
			request_id,
			query: req.query.clone(),
			intent: metadata.intent,
			entities_detected: metadata.entities_detected,
			relevance_profile: metadata.relevance_profile.clone(),
			experiment_id: metadata.ab_test.as_ref().map(|assignment| assignment.test_id.clone()),
			at,
		});

		let Some(assignment) = metadata.ab_test.as_ref() else {
			return;
		};
		let Some(name) = self
			.cfg
			.experiments
			.tests
			.iter()
			.find(|test| test.id == assignment.test_id)
			.and_then(|test| test.analytics_event_name.clone())
		else {
			return;
		};

		self.providers.analytics.track(AnalyticsEvent::ExperimentExposure {
			request_id,
			name,
			test_id: assignment.test_id.clone(),
			variant_id: assignment.variant_id.clone(),
			algorithm: assignment.algorithm,
			user_id: req.user_id.clone(),
			at,
		});
	}
}
