pub mod entity;
pub mod intent;
pub mod overlay;
pub mod params;
pub mod profile;
pub mod synthesize;
pub mod tokenize;

mod error;

pub use error::{Error, Result};

pub(crate) fn compile(pattern: &str) -> Result<regex::Regex> {
	regex::Regex::new(pattern)
		.map_err(|err| Error::Pattern { pattern: pattern.to_string(), source: err })
}
