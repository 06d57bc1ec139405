use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;

use super::rules::{dedup, Production, RuleTable, Symbol};
use super::template_tree::{NodeId, TemplateTree, TreeSymbol};

/// Partition of the slots of a tree into categories.
///
/// Slots are numbered in pre-order; a category is identified by the smallest
/// slot number it contains, so ordering categories by identifier is ordering
/// them by first appearance in the tree.
#[derive(Clone, Debug)]
pub struct Categories {
	slots: Vec<NodeId>,
	index: HashMap<NodeId, usize>,
	representative: Vec<usize>,
	merges: usize,
}

impl Categories {
	/// One category per slot.
	pub fn new(tree: &TemplateTree) -> Self {
		let slots = tree.slots();
		let index = slots.iter().enumerate().map(|(i, slot)| (*slot, i)).collect();
		let representative = (0..slots.len()).collect();
		Self {
			slots,
			index,
			representative,
			merges: 0,
		}
	}

	/// Number of slots covered, which is also the first unused category identifier.
	pub fn slot_count(&self) -> usize {
		self.slots.len()
	}

	/// Number of merges performed so far.
	pub fn merges(&self) -> usize {
		self.merges
	}

	pub fn category_of(&self, slot: NodeId) -> Option<usize> {
		self.index.get(&slot).map(|i| self.representative[*i])
	}

	/// Category identifiers in ascending order.
	pub fn representatives(&self) -> Vec<usize> {
		(0..self.slots.len()).filter(|i| self.representative[*i] == *i).collect()
	}

	/// Slots belonging to a category, in pre-order.
	pub fn members(&self, category: usize) -> impl Iterator<Item = NodeId> + '_ {
		self.slots
			.iter()
			.enumerate()
			.filter(move |(i, _)| self.representative[*i] == category)
			.map(|(_, slot)| *slot)
	}

	/// Fillers of every member slot as productions, deduplicated in
	/// first-appearance order.
	pub fn productions(&self, tree: &TemplateTree, category: usize) -> Vec<Production> {
		let productions = self
			.members(category)
			.flat_map(|slot| tree.fillers(slot).iter())
			.map(|filler| self.production(&tree.flatten(*filler)))
			.collect();
		dedup(productions)
	}

	/// Maps flattened tree symbols to category symbols.
	pub fn production(&self, symbols: &[TreeSymbol]) -> Production {
		symbols
			.iter()
			.map(|symbol| match symbol {
				TreeSymbol::Literal(token) => Symbol::Literal(token.clone()),
				TreeSymbol::Slot(slot) => Symbol::Category(self.representative[self.index[slot]]),
			})
			.collect()
	}

	/// Joins two categories; the smaller identifier survives.
	fn union(&mut self, a: usize, b: usize) {
		let (keep, drop) = if a < b { (a, b) } else { (b, a) };
		for representative in self.representative.iter_mut() {
			if *representative == drop {
				*representative = keep;
			}
		}
		self.merges += 1;
	}
}

/// Filler overlap of two categories, kept as exact counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Overlap {
	shared: usize,
	union: usize,
}

impl Overlap {
	/// Jaccard counts, the empty filler left out of both sets.
	fn of(left: &BTreeSet<Production>, right: &BTreeSet<Production>) -> Self {
		let shared = left.intersection(right).filter(|p| !p.is_empty()).count();
		let non_empty = |set: &BTreeSet<Production>| set.iter().filter(|p| !p.is_empty()).count();
		Self {
			shared,
			union: non_empty(left) + non_empty(right) - shared,
		}
	}

	fn reaches(&self, threshold: f64) -> bool {
		self.shared > 0 && self.shared as f64 >= threshold * self.union as f64
	}

	fn beats(&self, other: &Overlap) -> bool {
		self.shared * other.union > other.shared * self.union
	}
}

/// Decides which slots of a template tree denote the same category.
///
/// # Responsibilities
/// - Score every pair of categories by the Jaccard overlap of their fillers
/// - Merge pairs whose overlap reaches the threshold, one at a time,
///   recomputing fillers after each merge (nested slots are compared by category)
/// - Stop at the fixpoint
///
/// # Invariants
/// - the root slot, holding the top-level templates, is never merged
/// - two categories where one reaches the other through its fillers are never
///   merged, so the resulting rules stay acyclic
///
/// # Notes
/// In best-candidate mode the chosen pair does not depend on the threshold
/// (only whether it is accepted does), so raising the threshold can only
/// shorten the merge sequence.
pub struct SlotMerger {
	threshold: f64,
	use_best_candidate: bool,
}

impl SlotMerger {
	pub fn new(threshold: f64, use_best_candidate: bool) -> Self {
		Self {
			threshold,
			use_best_candidate,
		}
	}

	/// Merges slots of `tree` to fixpoint and returns the final partition.
	pub fn merge(&self, tree: &TemplateTree) -> Categories {
		let mut categories = Categories::new(tree);
		let root = tree.root_slot().and_then(|slot| categories.category_of(slot));

		while let Some((a, b)) = self.next_pair(tree, &categories, root) {
			categories.union(a, b);
			debug!("merged slot categories {} and {}", a, b);
		}

		debug!(
			"slot merging done: {} slots, {} categories, {} merges",
			categories.slot_count(),
			categories.representatives().len(),
			categories.merges()
		);
		categories
	}

	/// Merges the categories of a rule table to fixpoint, the root excepted,
	/// with the same pair selection as `merge`. Returns the number of merges.
	///
	/// Used once recalculation has created new categories.
	pub fn merge_rules(&self, table: &mut RuleTable) -> usize {
		let mut merges = 0;
		loop {
			let root = table.root();
			let candidates: Vec<usize> = table.categories().filter(|c| *c != root).collect();
			let fillers: Vec<Vec<Production>> = candidates
				.iter()
				.map(|c| table.productions(*c).unwrap_or_default().to_vec())
				.collect();
			let Some((a, b)) = self.select(&candidates, &fillers) else { break };
			table.union(a, b);
			merges += 1;
			debug!("merged rule categories {} and {}", a, b);
		}
		merges
	}

	fn next_pair(&self, tree: &TemplateTree, categories: &Categories, root: Option<usize>) -> Option<(usize, usize)> {
		let candidates: Vec<usize> = categories
			.representatives()
			.into_iter()
			.filter(|c| Some(*c) != root)
			.collect();
		let fillers: Vec<Vec<Production>> = candidates.iter().map(|c| categories.productions(tree, *c)).collect();
		self.select(&candidates, &fillers)
	}

	/// Picks the next pair to merge among `candidates`, given their fillers.
	fn select(&self, candidates: &[usize], fillers: &[Vec<Production>]) -> Option<(usize, usize)> {
		if candidates.len() < 2 {
			return None;
		}
		let sets: Vec<BTreeSet<Production>> = fillers.iter().map(|f| f.iter().cloned().collect()).collect();
		let graph = Graph::new(candidates, fillers);

		let mut best: Option<(Overlap, usize, usize)> = None;
		for i in 0..candidates.len() {
			for j in i + 1..candidates.len() {
				let overlap = Overlap::of(&sets[i], &sets[j]);
				if overlap.shared == 0 {
					continue;
				}
				if self.use_best_candidate {
					if best.is_some_and(|(current, _, _)| !overlap.beats(&current)) {
						continue;
					}
				} else if !overlap.reaches(self.threshold) {
					continue;
				}
				if graph.connects(candidates[i], candidates[j]) {
					continue;
				}
				if !self.use_best_candidate {
					return Some((candidates[i], candidates[j]));
				}
				best = Some((overlap, candidates[i], candidates[j]));
			}
		}

		best.filter(|(overlap, _, _)| overlap.reaches(self.threshold))
			.map(|(_, a, b)| (a, b))
	}
}

/// Reference graph between categories.
struct Graph {
	edges: HashMap<usize, HashSet<usize>>,
}

impl Graph {
	fn new(categories: &[usize], fillers: &[Vec<Production>]) -> Self {
		let edges = categories
			.iter()
			.zip(fillers)
			.map(|(category, productions)| {
				let targets = productions
					.iter()
					.flatten()
					.filter_map(|symbol| match symbol {
						Symbol::Category(target) => Some(*target),
						Symbol::Literal(_) => None,
					})
					.collect();
				(*category, targets)
			})
			.collect();
		Self { edges }
	}

	/// Whether either category reaches the other.
	fn connects(&self, a: usize, b: usize) -> bool {
		self.reaches(a, b) || self.reaches(b, a)
	}

	fn reaches(&self, from: usize, to: usize) -> bool {
		let mut seen = HashSet::new();
		let mut stack = vec![from];
		while let Some(current) = stack.pop() {
			if !seen.insert(current) {
				continue;
			}
			if let Some(targets) = self.edges.get(&current) {
				if targets.contains(&to) {
					return true;
				}
				stack.extend(targets.iter().copied());
			}
		}
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::induction::builder::TreeBuilder;
	use crate::tokenizer::Token;

	fn build(lines: &[&str]) -> TemplateTree {
		let examples: Vec<Vec<Token>> = lines
			.iter()
			.map(|l| l.split_whitespace().map(str::to_owned).collect())
			.collect();
		TreeBuilder::new(10, false, 0.3).build(&examples)
	}

	fn scenario() -> TemplateTree {
		build(&[
			"I like my cat and my dog",
			"I like my dog and my chicken",
			"Alice the cat is jumping",
			"Bob the dog is walking",
			"Cathy the cat is walking",
		])
	}

	fn words(categories: &Categories, tree: &TemplateTree, category: usize) -> Vec<String> {
		categories
			.productions(tree, category)
			.iter()
			.map(|p| match p.as_slice() {
				[Symbol::Literal(token)] => token.clone(),
				other => format!("{:?}", other),
			})
			.collect()
	}

	#[test]
	fn scenario_merges_animal_slots() {
		let tree = scenario();
		let categories = SlotMerger::new(0.1, true).merge(&tree);
		assert_eq!(categories.merges(), 2);

		// root slot + {cat, dog, chicken} + names + verbs
		let representatives = categories.representatives();
		assert_eq!(representatives.len(), 4);
		assert_eq!(words(&categories, &tree, representatives[1]), vec!["cat", "dog", "chicken"]);
		assert_eq!(words(&categories, &tree, representatives[2]), vec!["Alice", "Cathy", "Bob"]);
		assert_eq!(words(&categories, &tree, representatives[3]), vec!["jumping", "walking"]);
	}

	#[test]
	fn first_candidate_mode_reaches_same_partition_here() {
		let tree = scenario();
		let categories = SlotMerger::new(0.1, false).merge(&tree);
		assert_eq!(categories.merges(), 2);
		assert_eq!(categories.representatives().len(), 4);
	}

	#[test]
	fn threshold_controls_merging() {
		let tree = scenario();
		// only {cat, dog} and {cat, dog} are identical
		let strict = SlotMerger::new(1.0, true).merge(&tree);
		assert_eq!(strict.merges(), 1);

		let loose = SlotMerger::new(0.0, true).merge(&tree);
		assert_eq!(loose.merges(), 2);
	}

	#[test]
	fn disjoint_fillers_never_merge() {
		let tree = build(&["start red middle big end", "start blue middle small end"]);
		for threshold in [0.0, 0.5, 1.0] {
			let categories = SlotMerger::new(threshold, true).merge(&tree);
			assert_eq!(categories.merges(), 0);
		}
	}

	#[test]
	fn tree_without_slots_short_circuits() {
		let tree = build(&["just one sentence"]);
		let categories = SlotMerger::new(0.1, true).merge(&tree);
		assert_eq!(categories.slot_count(), 0);
		assert_eq!(categories.merges(), 0);
	}

	#[test]
	fn overlap_ignores_empty_filler() {
		let empty: Production = Vec::new();
		let a: Production = vec![Symbol::Literal("a".to_owned())];
		let b: Production = vec![Symbol::Literal("b".to_owned())];
		let left: BTreeSet<Production> = [empty.clone(), a.clone()].into_iter().collect();
		let right: BTreeSet<Production> = [empty, a, b].into_iter().collect();
		assert_eq!(Overlap::of(&left, &right), Overlap { shared: 1, union: 2 });
	}

	#[test]
	fn graph_detects_reachability() {
		let fillers = vec![
			vec![vec![Symbol::Category(1)]],
			vec![vec![Symbol::Category(2)]],
			vec![vec![Symbol::Literal("x".to_owned())]],
		];
		let graph = Graph::new(&[0, 1, 2], &fillers);
		assert!(graph.connects(0, 2));
		assert!(graph.connects(2, 0));
		assert!(!graph.reaches(2, 0));
	}

	#[test]
	fn rule_tables_merge_like_trees() {
		let lit = |t: &str| vec![Symbol::Literal(t.to_owned())];
		let mut rules = std::collections::BTreeMap::new();
		rules.insert(0, vec![vec![Symbol::Category(1), Symbol::Literal("and".to_owned()), Symbol::Category(2)]]);
		rules.insert(1, vec![lit("cat"), lit("dog")]);
		rules.insert(2, vec![lit("dog"), lit("cow")]);
		rules.insert(3, vec![lit("red")]);
		let mut table = RuleTable::new(0, rules);

		assert_eq!(SlotMerger::new(0.5, true).merge_rules(&mut table.clone()), 0);
		assert_eq!(SlotMerger::new(0.3, true).merge_rules(&mut table), 1);
		assert_eq!(
			table.productions(0).unwrap(),
			&[vec![Symbol::Category(1), Symbol::Literal("and".to_owned()), Symbol::Category(1)]]
		);
		assert_eq!(table.productions(1).unwrap(), &[lit("cat"), lit("dog"), lit("cow")]);
		assert_eq!(table.productions(2), None);
	}
}
