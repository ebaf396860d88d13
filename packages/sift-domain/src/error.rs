pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to compile built-in pattern {pattern:?}.")]
	Pattern { pattern: String, source: regex::Error },
	#[error("Unknown intent label {label:?}.")]
	UnknownIntent { label: String },
	#[error("Unknown relevance algorithm {name:?}.")]
	UnknownAlgorithm { name: String },
}
