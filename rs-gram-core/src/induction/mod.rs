//! Grammar induction pipeline.
//!
//! Tokenized examples flow through five stages:
//! - `TreeBuilder`: aligns examples into a template tree of literals and slots
//! - `SlotMerger`: groups slots with overlapping fillers into categories
//! - `recalculation`: aligns productions again now that categories are known,
//!   then merges the new categories, for a bounded number of rounds
//! - `pruner`: removes redundant rules without changing the language
//! - `materializer`: names categories and produces the `Grammar`

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::InductionConfig;
use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::tokenizer::{Token, Tokenizer};

/// Pairwise template alignment (longest common subsequence of literals).
///
/// Internal to the builder.
mod alignment;

/// Grouping policy shared by the builder and recalculation.
mod grouping;

/// Cluster-then-align construction of the template tree.
pub mod builder;

/// Arena of template nodes (`Literal`, `Sequence`, `Slot`) addressed by `NodeId`.
pub mod template_tree;

/// Similarity-driven merging of slots into categories.
pub mod slot_merger;

/// Unnamed rules flattened from the merged tree.
pub mod rules;

/// Re-alignment of category productions after merging.
pub mod recalculation;

/// Language-preserving simplification of rules.
pub mod pruner;

/// Naming scheme for categories.
pub mod naming;

/// Conversion of rules into a validated `Grammar`.
pub mod materializer;

use builder::TreeBuilder;
use grouping::Grouping;
use rules::RuleTable;
use slot_merger::SlotMerger;

/// Figures about one induction run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct InductionStats {
	/// Examples given.
	pub examples: usize,
	/// Examples left after removing duplicates.
	pub distinct_examples: usize,
	/// Slots in the template tree, root slot included.
	pub slots: usize,
	/// Slot merges performed on the template tree.
	pub merges: usize,
	/// Recalculation rounds that changed the rules.
	pub recalculations: usize,
	/// Category merges performed during recalculation.
	pub recalculation_merges: usize,
	/// Pruning rewrites applied.
	pub pruned: usize,
	/// Slots whose fillers were frozen because `max_depth` was reached.
	pub depth_truncations: usize,
	/// Nonterminals of the final grammar, root included.
	pub nonterminals: usize,
}

/// Result of `GrammarInducer::induce_detailed`.
#[derive(Clone, Debug)]
pub struct Induction {
	pub grammar: Grammar,
	pub stats: InductionStats,
}

/// Entry point of the induction engine.
///
/// # Responsibilities
/// - Validate the configuration and the dataset before any work
/// - Tokenize examples with the configured tokenizer
/// - Run the pipeline and log a summary per call
///
/// # Notes
/// An inducer holds no state between calls; the same dataset and
/// configuration always give the same grammar.
#[derive(Clone, Debug, Default)]
pub struct GrammarInducer {
	config: InductionConfig,
}

impl GrammarInducer {
	/// Creates an inducer.
	///
	/// # Errors
	/// Returns `Configuration` if the configuration is out of range.
	pub fn new(config: InductionConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config })
	}

	pub fn config(&self) -> &InductionConfig {
		&self.config
	}

	/// Induces a grammar from raw strings.
	///
	/// # Errors
	/// - `InvalidInput` on an empty dataset, or an example with no token when
	///   empty strings are not allowed
	/// - `Structural` if the produced rules are inconsistent
	pub fn induce<S: AsRef<str>>(&self, dataset: &[S]) -> Result<Grammar> {
		Ok(self.induce_detailed(dataset)?.grammar)
	}

	/// Same as `induce`, also returning run statistics.
	pub fn induce_detailed<S: AsRef<str>>(&self, dataset: &[S]) -> Result<Induction> {
		let examples: Vec<Vec<Token>> = dataset
			.iter()
			.map(|text| self.config.tokenizer.tokenize(text.as_ref()))
			.collect();
		self.induce_tokens(examples)
	}

	/// Induces a grammar from examples tokenized by the caller.
	///
	/// Generated strings are still joined with the configured tokenizer kind.
	/// Tokens may hold any character, including whitespace, but not be empty.
	pub fn induce_tokens(&self, examples: Vec<Vec<Token>>) -> Result<Induction> {
		self.config.validate()?;
		self.check_examples(&examples)?;

		let mut stats = InductionStats {
			examples: examples.len(),
			distinct_examples: examples.iter().collect::<HashSet<_>>().len(),
			..InductionStats::default()
		};

		let mut builder = TreeBuilder::new(
			self.config.max_depth,
			self.config.allow_empty_string,
			self.config.min_template_similarity,
		)
		.with_minimal_variables(self.config.minimal_variables);
		let tree = builder.build(&examples);
		stats.slots = tree.slots().len();
		stats.depth_truncations = builder.depth_truncations();

		let merger = SlotMerger::new(
			self.config.relative_similarity_threshold,
			self.config.use_best_merge_candidate,
		);
		let categories = merger.merge(&tree);
		stats.merges = categories.merges();

		let mut table = RuleTable::from_categories(&tree, &categories);
		let grouping = Grouping {
			allow_empty_string: self.config.allow_empty_string,
			min_template_similarity: self.config.min_template_similarity,
			minimal_variables: self.config.minimal_variables,
		};
		for round in 1..=self.config.max_recalculation {
			let regrouped = recalculation::realign(&mut table, grouping, self.config.max_depth);
			if regrouped == 0 {
				break;
			}
			stats.recalculations += 1;
			stats.recalculation_merges += merger.merge_rules(&mut table);
			debug!("recalculation round {}: {} categories regrouped", round, regrouped);
		}

		if self.config.prune_redundant {
			stats.pruned = pruner::prune(&mut table);
		} else {
			debug!("pruning disabled");
		}

		let grammar = materializer::materialize(&table, self.config.tokenizer)?;
		stats.nonterminals = grammar.rules().len();

		info!(
			"induced grammar from {} examples ({} distinct): {} slots, {} merges, {} recalculations, {} pruned, {} nonterminals, {} productions",
			stats.examples,
			stats.distinct_examples,
			stats.slots,
			stats.merges + stats.recalculation_merges,
			stats.recalculations,
			stats.pruned,
			stats.nonterminals,
			grammar.size()
		);
		Ok(Induction { grammar, stats })
	}

	fn check_examples(&self, examples: &[Vec<Token>]) -> Result<()> {
		if examples.is_empty() {
			return Err(GrammarError::InvalidInput("dataset is empty".to_owned()));
		}
		if let Some(index) = examples.iter().position(|example| example.iter().any(String::is_empty)) {
			return Err(GrammarError::InvalidInput(format!("example {} has an empty token", index)));
		}
		if !self.config.allow_empty_string {
			if let Some(index) = examples.iter().position(Vec::is_empty) {
				return Err(GrammarError::InvalidInput(format!(
					"example {} is empty and allow_empty_string is false",
					index
				)));
			}
		}
		Ok(())
	}
}
