use std::collections::HashSet;

use log::debug;

use super::alignment::Element;
use super::grouping::{Cluster, Grouping};
use super::template_tree::{NodeId, TemplateNode, TemplateTree};
use crate::tokenizer::Token;

/// Aligns tokenized examples into a single `TemplateTree`.
///
/// # Algorithm (cluster-then-align)
/// - Distinct sequences start as single-member clusters.
/// - The pair of clusters whose aligned templates keep the highest share of
///   literal tokens is merged first (ties: lowest cluster identifiers),
///   as long as the share reaches `min_template_similarity`.
/// - Each final cluster becomes a `Sequence`; each of its gaps becomes a
///   `Slot` whose fillers are the members' spans, grouped the same way one
///   level deeper.
/// - Beyond `max_depth`, spans are kept as opaque literal sequences.
///
/// Grouping itself is the `Grouping` policy shared with recalculation.
///
/// # Invariants
/// - every input sequence is reconstructible from the tree
/// - with `allow_empty_string == false`, no slot has an empty filler
pub struct TreeBuilder {
	max_depth: usize,
	grouping: Grouping,
	depth_truncations: usize,
}

impl TreeBuilder {
	pub fn new(max_depth: usize, allow_empty_string: bool, min_template_similarity: f64) -> Self {
		Self {
			max_depth,
			grouping: Grouping {
				allow_empty_string,
				min_template_similarity,
				minimal_variables: true,
			},
			depth_truncations: 0,
		}
	}

	/// Gives each substituted token pair its own slot instead of one slot per
	/// run of differing tokens.
	pub fn with_minimal_variables(mut self, minimal_variables: bool) -> Self {
		self.grouping.minimal_variables = minimal_variables;
		self
	}

	/// Number of slots whose fillers were frozen because `max_depth` was reached.
	pub fn depth_truncations(&self) -> usize {
		self.depth_truncations
	}

	/// Builds the tree covering every example.
	///
	/// A single template gives a root sequence without indirection; several
	/// templates are gathered under one root slot.
	pub fn build(&mut self, examples: &[Vec<Token>]) -> TemplateTree {
		let mut tree = TemplateTree::new();
		let alternatives = self.build_alternatives(&mut tree, examples, 1);

		let root = if alternatives.len() == 1 {
			alternatives[0]
		} else {
			let slot = tree.push(TemplateNode::Slot(alternatives));
			tree.push(TemplateNode::Sequence(vec![slot]))
		};
		tree.set_root(root);

		debug!(
			"built template tree: {} nodes, {} slots, depth {}",
			tree.len(),
			tree.slots().len(),
			tree.depth()
		);
		tree
	}

	/// Builds the alternative sequences covering `sequences`.
	fn build_alternatives(&mut self, tree: &mut TemplateTree, sequences: &[Vec<Token>], depth: usize) -> Vec<NodeId> {
		let mut seen = HashSet::new();
		let distinct: Vec<&Vec<Token>> = sequences.iter().filter(|s| seen.insert(*s)).collect();

		if depth > self.max_depth {
			if distinct.len() > 1 {
				self.depth_truncations += 1;
				debug!("max depth {} reached, keeping {} spans opaque", self.max_depth, distinct.len());
			}
			return distinct
				.into_iter()
				.map(|sequence| Self::literal_sequence(tree, sequence))
				.collect();
		}

		self.grouping
			.cluster(&distinct)
			.into_iter()
			.map(|cluster| self.build_cluster(tree, cluster, depth))
			.collect()
	}

	fn literal_sequence(tree: &mut TemplateTree, sequence: &[Token]) -> NodeId {
		let children = sequence
			.iter()
			.map(|token| tree.push(TemplateNode::Literal(token.clone())))
			.collect();
		tree.push(TemplateNode::Sequence(children))
	}

	fn build_cluster(&mut self, tree: &mut TemplateTree, cluster: Cluster<Token>, depth: usize) -> NodeId {
		let mut children = Vec::with_capacity(cluster.template.len());

		for (k, element) in cluster.template.iter().enumerate() {
			match element {
				Element::Literal(token) => children.push(tree.push(TemplateNode::Literal(token.clone()))),
				Element::Gap => {
					// Reserved first so slot ids follow first appearance
					let slot = tree.push(TemplateNode::Slot(Vec::new()));
					let fills: Vec<Vec<Token>> = cluster.members.iter().map(|m| m[k].clone()).collect();
					let fillers = self.build_alternatives(tree, &fills, depth + 1);
					tree.set(slot, TemplateNode::Slot(fillers));
					children.push(slot);
				}
			}
		}

		tree.push(TemplateNode::Sequence(children))
	}
}
