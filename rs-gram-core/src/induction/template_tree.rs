use std::collections::BTreeSet;
use std::fmt;

use crate::error::{GrammarError, Result};
use crate::tokenizer::Token;

/// Index of a node in a `TemplateTree` arena.
///
/// Identifiers are dense and stable for the lifetime of the tree, which is
/// what lets merged slots share categories without owning pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Position of the node in the arena.
	pub fn index(&self) -> usize {
		self.0
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// One node of a template tree.
///
/// A `Sequence` only ever holds `Literal` and `Slot` children, and the
/// fillers of a `Slot` are always `Sequence` nodes (possibly empty when empty
/// fillers are allowed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateNode {
	/// Matches exactly one token.
	Literal(Token),
	/// Concatenation of its children.
	Sequence(Vec<NodeId>),
	/// Point of variation; each child is one alternative filler.
	Slot(Vec<NodeId>),
}

/// Element of a flattened sequence: a token, or the slot found at that position.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TreeSymbol {
	Literal(Token),
	Slot(NodeId),
}

/// Arena holding the aligned structure of a whole dataset.
///
/// Built once per induction call by the `TreeBuilder`, read by the
/// `SlotMerger` and flattened into rules afterwards. Never shared.
#[derive(Clone, Debug)]
pub struct TemplateTree {
	nodes: Vec<TemplateNode>,
	root: NodeId,
}

impl TemplateTree {
	/// Creates a tree whose root is an empty sequence.
	pub(crate) fn new() -> Self {
		Self {
			nodes: vec![TemplateNode::Sequence(Vec::new())],
			root: NodeId(0),
		}
	}

	/// Appends a node and returns its identifier.
	pub(crate) fn push(&mut self, node: TemplateNode) -> NodeId {
		self.nodes.push(node);
		NodeId(self.nodes.len() - 1)
	}

	/// Replaces the content of an already allocated node.
	pub(crate) fn set(&mut self, id: NodeId, node: TemplateNode) {
		self.nodes[id.0] = node;
	}

	pub(crate) fn set_root(&mut self, root: NodeId) {
		self.root = root;
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn node(&self, id: NodeId) -> &TemplateNode {
		&self.nodes[id.0]
	}

	/// Number of allocated nodes, including unreachable placeholders.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Returns the slot holding the top-level alternatives, if the dataset
	/// was split into more than one template.
	///
	/// That is the case exactly when the root sequence is made of a single slot.
	pub fn root_slot(&self) -> Option<NodeId> {
		match self.node(self.root) {
			TemplateNode::Sequence(children) if children.len() == 1 => match self.node(children[0]) {
				TemplateNode::Slot(_) => Some(children[0]),
				_ => None,
			},
			_ => None,
		}
	}

	/// Fillers of a slot node. Empty for any other kind of node.
	pub fn fillers(&self, slot: NodeId) -> &[NodeId] {
		match self.node(slot) {
			TemplateNode::Slot(fillers) => fillers,
			_ => &[],
		}
	}

	/// Lists every reachable slot in pre-order (order of first appearance).
	///
	/// This is the canonical order used for every tie-break downstream.
	pub fn slots(&self) -> Vec<NodeId> {
		let mut slots = Vec::new();
		let mut stack = vec![self.root];
		while let Some(id) = stack.pop() {
			match self.node(id) {
				TemplateNode::Literal(_) => {}
				TemplateNode::Sequence(children) => stack.extend(children.iter().rev()),
				TemplateNode::Slot(fillers) => {
					slots.push(id);
					stack.extend(fillers.iter().rev());
				}
			}
		}
		slots
	}

	/// Flattens a sequence node into tokens and slot positions.
	pub fn flatten(&self, sequence: NodeId) -> Vec<TreeSymbol> {
		match self.node(sequence) {
			TemplateNode::Literal(token) => vec![TreeSymbol::Literal(token.clone())],
			TemplateNode::Slot(_) => vec![TreeSymbol::Slot(sequence)],
			TemplateNode::Sequence(children) => children
				.iter()
				.flat_map(|child| self.flatten(*child))
				.collect(),
		}
	}

	/// Maximum number of nested slots along any root-to-leaf path.
	pub fn depth(&self) -> usize {
		self.depth_of(self.root)
	}

	fn depth_of(&self, id: NodeId) -> usize {
		match self.node(id) {
			TemplateNode::Literal(_) => 0,
			TemplateNode::Sequence(children) => children.iter().map(|c| self.depth_of(*c)).max().unwrap_or(0),
			TemplateNode::Slot(fillers) => 1 + fillers.iter().map(|f| self.depth_of(*f)).max().unwrap_or(0),
		}
	}

	/// Reconstructs every token sequence the tree can produce, picking one
	/// filler per slot independently.
	///
	/// # Errors
	/// Returns `EnumerationLimit` as soon as more than `limit` sequences are produced.
	pub fn sequences(&self, limit: usize) -> Result<BTreeSet<Vec<Token>>> {
		self.sequences_of(self.root, limit)
	}

	fn sequences_of(&self, id: NodeId, limit: usize) -> Result<BTreeSet<Vec<Token>>> {
		let mut result = BTreeSet::new();
		match self.node(id) {
			TemplateNode::Literal(token) => {
				result.insert(vec![token.clone()]);
			}
			TemplateNode::Slot(fillers) => {
				for filler in fillers {
					result.extend(self.sequences_of(*filler, limit)?);
					if result.len() > limit {
						return Err(GrammarError::EnumerationLimit { limit });
					}
				}
			}
			TemplateNode::Sequence(children) => {
				result.insert(Vec::new());
				for child in children {
					let parts = self.sequences_of(*child, limit)?;
					let mut next = BTreeSet::new();
					for prefix in &result {
						for part in &parts {
							let mut joined = prefix.clone();
							joined.extend(part.iter().cloned());
							next.insert(joined);
						}
						if next.len() > limit {
							return Err(GrammarError::EnumerationLimit { limit });
						}
					}
					result = next;
				}
			}
		}
		Ok(result)
	}
}
