use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AnalyticsSink;
use sift_domain::{intent::IntentLabel, profile::RelevanceAlgorithm};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
	QueryUnderstood {
		request_id: Uuid,
		query: String,
		intent: Option<IntentLabel>,
		entities_detected: usize,
		relevance_profile: String,
		experiment_id: Option<String>,
		#[serde(with = "time::serde::rfc3339")]
		at: OffsetDateTime,
	},
	/// Emitted when a caller is served an experiment variant whose test names an analytics event.
	ExperimentExposure {
		request_id: Uuid,
		name: String,
		test_id: String,
		variant_id: String,
		algorithm: RelevanceAlgorithm,
		user_id: Option<String>,
		#[serde(with = "time::serde::rfc3339")]
		at: OffsetDateTime,
	},
}
impl AnalyticsEvent {
	pub fn request_id(&self) -> Uuid {
		match self {
			Self::QueryUnderstood { request_id, .. } | Self::ExperimentExposure { request_id, .. } =>
				*request_id,
		}
	}
}

/// Writes events to the tracing pipeline instead of an analytics store.
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
	fn track(&self, event: AnalyticsEvent) {
		match &event {
			AnalyticsEvent::QueryUnderstood {
				request_id,
				intent,
				entities_detected,
				relevance_profile,
				experiment_id,
				..
			} => {
				tracing::info!(
					%request_id,
					intent = intent.map(IntentLabel::as_str),
					entities_detected,
					relevance_profile = relevance_profile.as_str(),
					experiment_id = experiment_id.as_deref(),
					"Query understood."
				);
			},
			AnalyticsEvent::ExperimentExposure { request_id, name, test_id, variant_id, .. } => {
				tracing::info!(
					%request_id,
					event = name.as_str(),
					test_id = test_id.as_str(),
					variant_id = variant_id.as_str(),
					"Experiment exposure."
				);
			},
		}
	}
}
