use thiserror::Error;

/// Internal invariant violations.
///
/// These never come from user input: they mean the builder, the merger or a
/// hand-written mapping produced a structure that cannot be expanded safely.
/// An induction that hits one is aborted, no partial grammar is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
	/// A nonterminal reaches itself through its productions.
	/// The payload is the expansion path, root first.
	#[error("cycle detected through nonterminals: {}", .0.join(" -> "))]
	Cycle(Vec<String>),

	/// A production references a nonterminal that has no definition.
	#[error("nonterminal <{0}> is referenced but never defined")]
	UndefinedNonTerminal(String),
}

/// Errors surfaced by induction, generation and grammar persistence.
#[derive(Debug, Error)]
pub enum GrammarError {
	/// Empty dataset, or an empty example where empty strings are not allowed.
	#[error("invalid input: {0}")]
	InvalidInput(String),

	/// Out-of-range configuration value.
	#[error("invalid configuration: {0}")]
	Configuration(String),

	#[error(transparent)]
	Structural(#[from] StructuralError),

	/// `generate_all` would produce more than `limit` strings.
	#[error("enumeration exceeds the limit of {limit} results")]
	EnumerationLimit { limit: usize },

	/// Malformed mapping form (missing root, bad placeholder).
	#[error("cannot parse grammar: {0}")]
	Parse(String),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("binary encoding error: {0}")]
	Encoding(#[from] postcard::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GrammarError>;
