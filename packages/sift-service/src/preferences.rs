use std::collections::HashMap;

use crate::{BoxFuture, PreferenceStore};
use sift_domain::overlay::PreferenceVector;

/// Preference vectors keyed by user id, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreferenceStore {
	users: HashMap<String, PreferenceVector>,
}
impl InMemoryPreferenceStore {
	pub fn insert(&mut self, user_id: impl Into<String>, preferences: PreferenceVector) {
		self.users.insert(user_id.into(), preferences);
	}
}

impl PreferenceStore for InMemoryPreferenceStore {
	fn preferences<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<PreferenceVector>>> {
		let preferences = self.users.get(user_id).cloned();

		Box::pin(async move { Ok(preferences) })
	}
}
