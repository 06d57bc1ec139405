use std::collections::{BTreeSet, HashMap};

use log::debug;

use super::rules::{dedup, Production, RuleTable, Symbol};

/// Removes redundant structure from a rule table without changing the
/// language it generates.
///
/// Rewrites are applied one at a time until none applies:
/// - a production covered position by position by a sibling is dropped
///   (at every differing position the sibling refers to a category that has
///   the covered symbol as a one-symbol production)
/// - a category with a single production is inlined
/// - a category used once, as a whole production, is spliced into its user
/// - a production `<B>` is dropped when every production of `B` already is
///   an alternative of the same category
/// - categories no longer reachable from the root are removed
///
/// Returns the number of rewrites applied.
pub fn prune(table: &mut RuleTable) -> usize {
	let mut rewrites = 0;
	loop {
		let changed = drop_covered(table)
			|| inline_single_production(table)
			|| splice_single_use(table)
			|| drop_absorbed_reference(table)
			|| collect_unreachable(table);
		if !changed {
			break;
		}
		rewrites += 1;
	}
	debug!("pruning done: {} rewrites, {} categories left", rewrites, table.len());
	rewrites
}

/// Whether `general` produces everything `specific` produces, position by position.
fn covers(table: &RuleTable, general: &Production, specific: &Production) -> bool {
	general.len() == specific.len()
		&& general.iter().zip(specific).all(|(g, s)| {
			g == s
				|| match g {
					Symbol::Category(category) => table
						.productions(*category)
						.is_some_and(|productions| productions.iter().any(|p| p.len() == 1 && p[0] == *s)),
					Symbol::Literal(_) => false,
				}
		})
}

fn drop_covered(table: &mut RuleTable) -> bool {
	let mut found = None;
	'search: for category in table.categories() {
		let Some(productions) = table.productions(category) else { continue };
		for (i, specific) in productions.iter().enumerate() {
			for (j, general) in productions.iter().enumerate() {
				if i != j && covers(table, general, specific) {
					found = Some((category, i));
					break 'search;
				}
			}
		}
	}

	let Some((category, index)) = found else { return false };
	if let Some(productions) = table.rules_mut().get_mut(&category) {
		productions.remove(index);
		debug!("dropped covered production {} of category {}", index, category);
	}
	true
}

fn inline_single_production(table: &mut RuleTable) -> bool {
	let root = table.root();
	let target = table
		.categories()
		.find(|c| *c != root && table.productions(*c).is_some_and(|p| p.len() == 1));
	let Some(target) = target else { return false };

	let Some(mut productions) = table.rules_mut().remove(&target) else { return false };
	let replacement = productions.remove(0);
	for productions in table.rules_mut().values_mut() {
		let rewritten = productions
			.iter()
			.map(|production| substitute(production, target, &replacement))
			.collect();
		*productions = dedup(rewritten);
	}
	debug!("inlined category {}", target);
	true
}

fn substitute(production: &Production, target: usize, replacement: &Production) -> Production {
	production
		.iter()
		.flat_map(|symbol| match symbol {
			Symbol::Category(c) if *c == target => replacement.clone(),
			other => vec![other.clone()],
		})
		.collect()
}

fn reference_counts(table: &RuleTable) -> HashMap<usize, usize> {
	let mut counts = HashMap::new();
	for category in table.categories() {
		for production in table.productions(category).unwrap_or_default() {
			for symbol in production {
				if let Symbol::Category(target) = symbol {
					*counts.entry(*target).or_insert(0) += 1;
				}
			}
		}
	}
	counts
}

fn splice_single_use(table: &mut RuleTable) -> bool {
	let root = table.root();
	let counts = reference_counts(table);

	let mut found = None;
	'search: for category in table.categories() {
		let Some(productions) = table.productions(category) else { continue };
		for (index, production) in productions.iter().enumerate() {
			if let [Symbol::Category(target)] = production.as_slice() {
				if *target != root && counts.get(target) == Some(&1) {
					found = Some((category, index, *target));
					break 'search;
				}
			}
		}
	}

	let Some((category, index, target)) = found else { return false };
	let Some(alternatives) = table.rules_mut().remove(&target) else { return false };
	if let Some(productions) = table.rules_mut().get_mut(&category) {
		let tail = productions.split_off(index + 1);
		productions.pop();
		productions.extend(alternatives);
		productions.extend(tail);
		*productions = dedup(std::mem::take(productions));
	}
	debug!("spliced category {} into category {}", target, category);
	true
}

fn drop_absorbed_reference(table: &mut RuleTable) -> bool {
	let mut found = None;
	'search: for category in table.categories() {
		let Some(productions) = table.productions(category) else { continue };
		for (index, production) in productions.iter().enumerate() {
			let [Symbol::Category(target)] = production.as_slice() else { continue };
			let absorbed = table
				.productions(*target)
				.is_some_and(|theirs| theirs.iter().all(|p| productions.contains(p)));
			if absorbed {
				found = Some((category, index));
				break 'search;
			}
		}
	}

	let Some((category, index)) = found else { return false };
	if let Some(productions) = table.rules_mut().get_mut(&category) {
		productions.remove(index);
		debug!("dropped absorbed reference {} of category {}", index, category);
	}
	true
}

fn collect_unreachable(table: &mut RuleTable) -> bool {
	let mut reachable = BTreeSet::new();
	let mut stack = vec![table.root()];
	while let Some(category) = stack.pop() {
		if !reachable.insert(category) {
			continue;
		}
		for production in table.productions(category).unwrap_or_default() {
			for symbol in production {
				if let Symbol::Category(target) = symbol {
					stack.push(*target);
				}
			}
		}
	}

	let before = table.len();
	table.rules_mut().retain(|category, _| reachable.contains(category));
	table.len() != before
}
