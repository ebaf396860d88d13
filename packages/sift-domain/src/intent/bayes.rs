use std::{
	collections::HashMap,
	sync::{Arc, OnceLock},
};

use super::{IntentLabel, ScoredIntent, rank};
use crate::tokenize;

const SMOOTHING: f64 = 1.0;
const FEATURE_MIN_LENGTH: usize = 2;

pub const CURATED_EXAMPLES: &[(IntentLabel, &str)] = &[
	(IntentLabel::ProductSearch, "find a black dress"),
	(IntentLabel::ProductSearch, "looking for organic cotton t-shirts"),
	(IntentLabel::ProductSearch, "search for eco-friendly water bottles"),
	(IntentLabel::ProductSearch, "need a new pair of sustainable jeans"),
	(IntentLabel::ProductSearch, "show me vegan leather bags"),
	(IntentLabel::ProductSearch, "find recycled plastic sunglasses"),
	(IntentLabel::ProductSearch, "i need a fair trade coffee mug"),
	(IntentLabel::CategoryBrowse, "browse sustainable clothing"),
	(IntentLabel::CategoryBrowse, "explore eco-friendly home goods"),
	(IntentLabel::CategoryBrowse, "show me all vegan products"),
	(IntentLabel::CategoryBrowse, "view organic skincare"),
	(IntentLabel::CategoryBrowse, "see all recycled items"),
	(IntentLabel::CategoryBrowse, "what sustainable products do you have"),
	(IntentLabel::CategoryBrowse, "which ethical brands are available"),
	(IntentLabel::BrandSpecific, "products by eco collective"),
	(IntentLabel::BrandSpecific, "items from sustainable threads"),
	(IntentLabel::BrandSpecific, "green earth brand"),
	(IntentLabel::BrandSpecific, "show me ethical choice products"),
	(IntentLabel::BrandSpecific, "find conscious couture dresses"),
	(IntentLabel::BrandSpecific, "fair fashion jeans"),
	(IntentLabel::BrandSpecific, "earth friendly cleaning products"),
	(IntentLabel::PriceQuery, "how much are organic cotton sheets"),
	(IntentLabel::PriceQuery, "price of sustainable yoga mats"),
	(IntentLabel::PriceQuery, "cost of eco-friendly water bottles"),
	(IntentLabel::PriceQuery, "products under $50"),
	(IntentLabel::PriceQuery, "items between $20 and $100"),
	(IntentLabel::PriceQuery, "affordable ethical clothing"),
	(IntentLabel::PriceQuery, "luxury sustainable fashion"),
	(IntentLabel::ValueDriven, "sustainable kitchen products"),
	(IntentLabel::ValueDriven, "ethical jewelry brands"),
	(IntentLabel::ValueDriven, "eco-friendly cleaning supplies"),
	(IntentLabel::ValueDriven, "organic cotton bedding"),
	(IntentLabel::ValueDriven, "vegan leather alternatives"),
	(IntentLabel::ValueDriven, "fair trade chocolate"),
	(IntentLabel::ValueDriven, "locally made furniture"),
	(IntentLabel::Comparison, "compare organic cotton vs recycled polyester"),
	(IntentLabel::Comparison, "difference between vegan leather and real leather"),
	(IntentLabel::Comparison, "bamboo or recycled plastic toothbrushes"),
	(IntentLabel::Comparison, "which is better silk or tencel"),
	(IntentLabel::Comparison, "sustainable vs conventional cotton"),
	(IntentLabel::Comparison, "compare eco collective and green earth brands"),
	(IntentLabel::Comparison, "recycled paper or bamboo toilet paper"),
	(IntentLabel::Recommendation, "recommend sustainable gifts under $30"),
	(IntentLabel::Recommendation, "suggest eco-friendly cleaning products"),
	(IntentLabel::Recommendation, "what are the best vegan leather bags"),
	(IntentLabel::Recommendation, "top rated organic skincare"),
	(IntentLabel::Recommendation, "popular sustainable fashion brands"),
	(IntentLabel::Recommendation, "best value eco-friendly products"),
	(IntentLabel::Recommendation, "trending ethical jewelry"),
	(IntentLabel::Availability, "are organic cotton sheets in stock"),
	(IntentLabel::Availability, "do you have bamboo toothbrushes"),
	(IntentLabel::Availability, "availability of recycled paper notebooks"),
	(IntentLabel::Availability, "is the eco-friendly water bottle available"),
	(IntentLabel::Availability, "when will sustainable yoga mats be back in stock"),
	(IntentLabel::Availability, "check stock for vegan leather bags"),
	(IntentLabel::Availability, "are fair trade coffee beans available"),
	(IntentLabel::Filter, "filter by sustainable materials"),
	(IntentLabel::Filter, "show only vegan products"),
	(IntentLabel::Filter, "limit to local brands"),
	(IntentLabel::Filter, "restrict to items under $50"),
	(IntentLabel::Filter, "filter by 4+ star rating"),
	(IntentLabel::Filter, "show only organic options"),
	(IntentLabel::Filter, "with recycled packaging only"),
	(IntentLabel::Sort, "sort by price low to high"),
	(IntentLabel::Sort, "order by customer rating"),
	(IntentLabel::Sort, "arrange by newest first"),
	(IntentLabel::Sort, "sort sustainable clothing by price"),
	(IntentLabel::Sort, "order vegan products by popularity"),
	(IntentLabel::Sort, "arrange by eco-friendliness score"),
	(IntentLabel::Sort, "sort by distance from local"),
];

static TRAINED: OnceLock<Arc<BayesModel>> = OnceLock::new();

/// Multinomial-style naive Bayes over stemmed token presence.
///
/// Scores are the class prior times the product of smoothed per-feature likelihoods. They are
/// not normalized across classes, so a query sharing little vocabulary with the training set
/// scores low everywhere.
#[derive(Debug)]
pub struct BayesModel {
	vocabulary: HashMap<String, usize>,
	classes: Vec<ClassStats>,
	total_examples: f64,
}
impl BayesModel {
	pub fn train<'a, I>(examples: I) -> Self
	where
		I: IntoIterator<Item = (IntentLabel, &'a str)>,
	{
		let mut vocabulary: HashMap<String, usize> = HashMap::new();
		let mut classes = IntentLabel::ALL
			.into_iter()
			.map(|label| ClassStats { label, total: 1.0, feature_counts: HashMap::new() })
			.collect::<Vec<_>>();
		let mut total_examples = 1.0;

		for (label, text) in examples {
			let mut indices = Vec::new();

			for feature in features(text) {
				let next_index = vocabulary.len();

				indices.push(*vocabulary.entry(feature).or_insert(next_index));
			}

			let Some(class) = classes.iter_mut().find(|class| class.label == label) else {
				continue;
			};

			class.total += 1.0;

			for index in indices {
				*class.feature_counts.entry(index).or_insert(SMOOTHING) += 1.0;
			}

			total_examples += 1.0;
		}

		Self { vocabulary, classes, total_examples }
	}

	/// Scores every class for `text`, highest first.
	pub fn classify(&self, text: &str) -> Vec<ScoredIntent> {
		let observed = features(text)
			.into_iter()
			.filter_map(|feature| self.vocabulary.get(&feature).copied())
			.collect::<Vec<_>>();
		let scored = self
			.classes
			.iter()
			.map(|class| {
				let log_likelihood = observed
					.iter()
					.map(|index| {
						let count = class.feature_counts.get(index).copied().unwrap_or(SMOOTHING);

						(count / class.total).ln()
					})
					.sum::<f64>();
				let prior = class.total / self.total_examples;

				ScoredIntent { intent: class.label, confidence: (prior * log_likelihood.exp()) as f32 }
			})
			.collect();

		rank(scored)
	}
}

#[derive(Debug)]
struct ClassStats {
	label: IntentLabel,
	total: f64,
	feature_counts: HashMap<usize, f64>,
}

/// Returns the process-wide model trained on [`CURATED_EXAMPLES`]. Training runs once, on first
/// use, even under concurrent callers.
pub fn trained_model() -> Arc<BayesModel> {
	TRAINED
		.get_or_init(|| Arc::new(BayesModel::train(CURATED_EXAMPLES.iter().copied())))
		.clone()
}

/// Distinct stemmed tokens of `text`, in first-seen order.
fn features(text: &str) -> Vec<String> {
	let mut out = Vec::new();

	for stem in tokenize::stems(&tokenize::normalize(text, FEATURE_MIN_LENGTH)) {
		if !out.contains(&stem) {
			out.push(stem);
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trained_model_is_shared() {
		let first = trained_model();
		let second = trained_model();

		assert!(Arc::ptr_eq(&first, &second));
		assert!(!first.vocabulary.is_empty());
	}

	#[test]
	fn concurrent_first_use_trains_once() {
		let models = std::thread::scope(|scope| {
			let handles = (0..8).map(|_| scope.spawn(trained_model)).collect::<Vec<_>>();

			handles
				.into_iter()
				.map(|handle| handle.join().expect("Classifier thread panicked."))
				.collect::<Vec<_>>()
		});

		assert!(models.iter().all(|model| Arc::ptr_eq(model, &models[0])));
	}

	#[test]
	fn retraining_is_deterministic() {
		let a = BayesModel::train(CURATED_EXAMPLES.iter().copied());
		let b = BayesModel::train(CURATED_EXAMPLES.iter().copied());

		assert_eq!(a.classify("order vegan products"), b.classify("order vegan products"));
	}

	#[test]
	fn unseen_vocabulary_scores_equal_priors() {
		let scores = trained_model().classify("zzz qqq");
		let first = scores[0].confidence;

		assert_eq!(scores.len(), IntentLabel::ALL.len());
		assert!(scores.iter().all(|score| (score.confidence - first).abs() < 1e-9));
		// Equal scores keep declaration order.
		assert_eq!(scores[0].intent, IntentLabel::ProductSearch);
	}

	#[test]
	fn scores_stay_below_default_threshold() {
		for (_, text) in CURATED_EXAMPLES {
			let top = &trained_model().classify(text)[0];

			assert!(top.confidence < 0.6, "{text} scored {}", top.confidence);
		}
	}
}
