use log::debug;

use super::alignment::Element;
use super::grouping::{Cluster, Grouping};
use super::rules::{dedup, Production, RuleTable, Symbol};

/// Aligns the productions of every category again.
///
/// Once slots are merged, two productions may differ only where the tree
/// builder saw unrelated tokens but now see the same category (`the <A>` and
/// `a <A>`). Each category's productions are grouped with the same policy as
/// examples, a reference matching only the same reference. A group of several
/// productions becomes one production whose gaps are new categories.
///
/// A regrouping is kept only if the table gets no deeper than
/// `max_depth + 1` levels, or than it already was.
///
/// Returns the number of categories regrouped.
pub(crate) fn realign(table: &mut RuleTable, grouping: Grouping, max_depth: usize) -> usize {
	let mut regrouped = 0;
	let categories: Vec<usize> = table.categories().collect();

	for category in categories {
		let clusters = {
			let Some(productions) = table.productions(category) else { continue };
			if productions.len() < 2 {
				continue;
			}
			let sequences: Vec<&Production> = productions.iter().collect();
			grouping.cluster(&sequences)
		};
		if clusters.iter().all(|cluster| cluster.members.len() == 1) {
			continue;
		}

		let bound = table.depth().max(max_depth + 1);
		let mut candidate = table.clone();
		regroup(&mut candidate, category, clusters);
		if candidate.depth() > bound {
			debug!("regrouping category {} would exceed depth {}", category, bound);
			continue;
		}

		*table = candidate;
		regrouped += 1;
		debug!("regrouped productions of category {}", category);
	}
	regrouped
}

/// Replaces the productions of `category` by the templates of `clusters`,
/// each gap becoming a new category holding the members' spans.
fn regroup(table: &mut RuleTable, category: usize, clusters: Vec<Cluster<Symbol>>) {
	let mut next = table.next_category();
	let mut productions = Vec::with_capacity(clusters.len());
	let mut created = Vec::new();

	for cluster in clusters {
		let mut production = Vec::with_capacity(cluster.template.len());
		for (k, element) in cluster.template.iter().enumerate() {
			match element {
				Element::Literal(symbol) => production.push(symbol.clone()),
				Element::Gap => {
					let spans = cluster.members.iter().map(|member| member[k].clone()).collect();
					created.push((next, dedup(spans)));
					production.push(Symbol::Category(next));
					next += 1;
				}
			}
		}
		productions.push(production);
	}

	let rules = table.rules_mut();
	rules.insert(category, dedup(productions));
	rules.extend(created);
}
