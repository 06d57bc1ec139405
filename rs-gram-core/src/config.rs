use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GrammarError, Result};
use crate::tokenizer::TokenizerKind;

/// Default merge aggressiveness for slot merging.
pub const DEFAULT_RELATIVE_SIMILARITY_THRESHOLD: f64 = 0.1;

/// Default share of literal tokens two templates must keep to be grouped.
pub const DEFAULT_MIN_TEMPLATE_SIMILARITY: f64 = 0.3;

/// Default recursion bound of the tree builder.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default bound on re-alignment rounds after slot merging.
pub const DEFAULT_MAX_RECALCULATION: usize = 10;

/// Input parameters of one grammar induction.
///
/// `InductionConfig` holds every knob of the pipeline: how examples are
/// grouped into templates, how deep templates may nest, when two slots are
/// considered the same category and whether redundant structure is pruned.
///
/// Fields are public for struct-literal construction; the setters validate
/// ranges eagerly, and `validate` is run again by the inducer before any
/// tree construction starts.
///
/// # Invariants (after `validate`)
/// - both thresholds are within `[0.0, 1.0]`
/// - `max_depth >= 1`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InductionConfig {
	/// Minimum Jaccard overlap between the filler sets of two slots for them
	/// to be merged into one nonterminal (0.0 = share one filler, 1.0 = identical).
	pub relative_similarity_threshold: f64,

	/// Whether a slot may be filled by the empty token sequence.
	pub allow_empty_string: bool,

	/// Maximum nesting depth of templates; deeper divergent spans stay opaque.
	pub max_depth: usize,

	/// Merge the globally best slot pair first (`true`) or the first eligible
	/// pair in tree order (`false`).
	pub use_best_merge_candidate: bool,

	/// Remove structure that does not change the generated language.
	pub prune_redundant: bool,

	/// Minimum share of literal tokens two templates must keep in common to
	/// be grouped under one template.
	pub min_template_similarity: f64,

	/// One slot per run of differing tokens (`true`), or one slot per
	/// substituted token pair (`false`).
	pub minimal_variables: bool,

	/// Maximum number of re-alignment rounds run after slot merging; each
	/// round aligns the productions of every category again, now that
	/// references to the same category can anchor an alignment. Rounds stop
	/// early once nothing changes; 0 disables the pass.
	pub max_recalculation: usize,

	/// How examples are split into tokens and joined back.
	pub tokenizer: TokenizerKind,
}

impl Default for InductionConfig {
	fn default() -> Self {
		Self {
			relative_similarity_threshold: DEFAULT_RELATIVE_SIMILARITY_THRESHOLD,
			allow_empty_string: false,
			max_depth: DEFAULT_MAX_DEPTH,
			use_best_merge_candidate: true,
			prune_redundant: true,
			min_template_similarity: DEFAULT_MIN_TEMPLATE_SIMILARITY,
			minimal_variables: true,
			max_recalculation: DEFAULT_MAX_RECALCULATION,
			tokenizer: TokenizerKind::Whitespace,
		}
	}
}

impl InductionConfig {
	/// Loads a configuration from a JSON file. Missing fields take their defaults.
	///
	/// # Errors
	/// Returns an error if the file cannot be read, is not valid JSON,
	/// or holds out-of-range values.
	pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		let config: InductionConfig = serde_json::from_str(&content)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks every field against its valid range.
	pub fn validate(&self) -> Result<()> {
		check_ratio("relative_similarity_threshold", self.relative_similarity_threshold)?;
		check_ratio("min_template_similarity", self.min_template_similarity)?;
		if self.max_depth == 0 {
			return Err(GrammarError::Configuration("max_depth must be >= 1".to_owned()));
		}
		Ok(())
	}

	/// Sets the slot merge threshold (0.0..=1.0).
	///
	/// # Errors
	/// Returns an error if the value is outside the valid range.
	pub fn set_relative_similarity_threshold(&mut self, threshold: f64) -> Result<()> {
		check_ratio("relative_similarity_threshold", threshold)?;
		self.relative_similarity_threshold = threshold;
		Ok(())
	}

	/// Sets the template grouping threshold (0.0..=1.0).
	///
	/// # Errors
	/// Returns an error if the value is outside the valid range.
	pub fn set_min_template_similarity(&mut self, similarity: f64) -> Result<()> {
		check_ratio("min_template_similarity", similarity)?;
		self.min_template_similarity = similarity;
		Ok(())
	}

	/// Sets the maximum template depth.
	///
	/// # Errors
	/// Returns an error if `max_depth` is zero.
	pub fn set_max_depth(&mut self, max_depth: usize) -> Result<()> {
		if max_depth == 0 {
			return Err(GrammarError::Configuration("max_depth must be >= 1".to_owned()));
		}
		self.max_depth = max_depth;
		Ok(())
	}
}

fn check_ratio(name: &str, value: f64) -> Result<()> {
	if !(0.0..=1.0).contains(&value) {
		return Err(GrammarError::Configuration(format!(
			"{} must be between 0.0 and 1.0, got {}",
			name, value
		)));
	}
	Ok(())
}
