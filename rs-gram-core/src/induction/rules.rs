use std::collections::{BTreeMap, HashMap, HashSet};

use super::slot_merger::Categories;
use super::template_tree::TemplateTree;
use crate::tokenizer::Token;

/// Element of an unnamed production: a token or a reference to a category.
///
/// Categories are identified by the pre-order index of their representative
/// slot, so the derived ordering is the tree order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
	Literal(Token),
	Category(usize),
}

/// Ordered list of symbols.
pub type Production = Vec<Symbol>;

/// Unnamed grammar produced from the merged tree, before naming.
///
/// # Invariants
/// - `rules` holds the root category
/// - productions of a category are unique and kept in first-appearance order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleTable {
	root: usize,
	rules: BTreeMap<usize, Vec<Production>>,
}

impl RuleTable {
	/// Flattens every category of a merged tree into productions.
	///
	/// The root category is the root slot when the dataset was split into
	/// several templates, otherwise a fresh category whose only production
	/// is the root sequence.
	pub fn from_categories(tree: &TemplateTree, categories: &Categories) -> Self {
		let mut rules = BTreeMap::new();
		for category in categories.representatives() {
			rules.insert(category, categories.productions(tree, category));
		}

		let root = match tree.root_slot().and_then(|slot| categories.category_of(slot)) {
			Some(category) => category,
			None => {
				let root = categories.slot_count();
				rules.insert(root, vec![categories.production(&tree.flatten(tree.root()))]);
				root
			}
		};

		Self { root, rules }
	}

	/// Builds a table from raw parts, deduplicating productions.
	pub fn new(root: usize, rules: BTreeMap<usize, Vec<Production>>) -> Self {
		let rules = rules.into_iter().map(|(category, productions)| (category, dedup(productions))).collect();
		Self { root, rules }
	}

	pub fn root(&self) -> usize {
		self.root
	}

	/// Productions of a category, or `None` if it is not defined.
	pub fn productions(&self, category: usize) -> Option<&[Production]> {
		self.rules.get(&category).map(Vec::as_slice)
	}

	pub fn categories(&self) -> impl Iterator<Item = usize> + '_ {
		self.rules.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Longest chain of categories from the root, the root counting as 1.
	pub fn depth(&self) -> usize {
		let mut memo = HashMap::new();
		self.depth_of(self.root, &mut memo)
	}

	fn depth_of(&self, category: usize, memo: &mut HashMap<usize, usize>) -> usize {
		if let Some(depth) = memo.get(&category) {
			return *depth;
		}
		let deepest = self
			.productions(category)
			.unwrap_or_default()
			.iter()
			.flatten()
			.filter_map(|symbol| match symbol {
				Symbol::Category(target) => Some(*target),
				Symbol::Literal(_) => None,
			})
			.collect::<Vec<_>>()
			.into_iter()
			.map(|target| self.depth_of(target, memo))
			.max()
			.unwrap_or(0);
		memo.insert(category, deepest + 1);
		deepest + 1
	}

	/// First identifier not used by any category.
	pub(crate) fn next_category(&self) -> usize {
		self.rules.keys().next_back().map_or(0, |last| last + 1)
	}

	/// Joins two categories: the smaller identifier keeps the pooled
	/// productions and every reference to the other now points to it.
	pub(crate) fn union(&mut self, a: usize, b: usize) {
		let (keep, drop) = if a < b { (a, b) } else { (b, a) };
		let moved = self.rules.remove(&drop).unwrap_or_default();
		if let Some(productions) = self.rules.get_mut(&keep) {
			productions.extend(moved);
		}
		for productions in self.rules.values_mut() {
			let rewritten = productions
				.iter()
				.map(|production| {
					production
						.iter()
						.map(|symbol| match symbol {
							Symbol::Category(c) if *c == drop => Symbol::Category(keep),
							other => other.clone(),
						})
						.collect()
				})
				.collect();
			*productions = dedup(rewritten);
		}
		if self.root == drop {
			self.root = keep;
		}
	}

	pub(crate) fn rules_mut(&mut self) -> &mut BTreeMap<usize, Vec<Production>> {
		&mut self.rules
	}
}

/// Removes duplicate productions, keeping the first occurrence.
pub(crate) fn dedup(productions: Vec<Production>) -> Vec<Production> {
	let mut seen = HashSet::new();
	productions.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lit(token: &str) -> Symbol {
		Symbol::Literal(token.to_owned())
	}

	#[test]
	fn new_deduplicates_in_order() {
		let mut rules = BTreeMap::new();
		rules.insert(0, vec![vec![lit("b")], vec![lit("a")], vec![lit("b")]]);
		let table = RuleTable::new(0, rules);
		assert_eq!(table.productions(0).unwrap(), &[vec![lit("b")], vec![lit("a")]]);
		assert_eq!(table.productions(1), None);
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn depth_counts_the_root() {
		let mut rules = BTreeMap::new();
		rules.insert(4, vec![vec![Symbol::Category(0), lit("x")], vec![lit("y")]]);
		rules.insert(0, vec![vec![Symbol::Category(1)]]);
		rules.insert(1, vec![vec![lit("z")]]);
		let table = RuleTable::new(4, rules);
		assert_eq!(table.depth(), 3);
		assert_eq!(table.next_category(), 5);
	}
}
