use std::collections::{BTreeMap, HashMap, VecDeque};

use log::debug;

use super::naming::category_name;
use super::rules::{RuleTable, Symbol};
use crate::error::{Result, StructuralError};
use crate::grammar::{Element, Grammar, Production, ROOT};
use crate::tokenizer::TokenizerKind;

/// Names the categories of a rule table and builds the final `Grammar`.
///
/// Categories are named breadth-first from the root in order of first
/// reference, so identical tables always give identical names. Name counters
/// live in the call.
///
/// # Errors
/// - `UndefinedNonTerminal` if a reference points to a category the table lacks
/// - `Cycle` if a category reaches itself
pub fn materialize(table: &RuleTable, tokenizer: TokenizerKind) -> Result<Grammar> {
	let mut names: HashMap<usize, String> = HashMap::new();
	let mut queue = VecDeque::new();
	let mut rules: BTreeMap<String, Vec<Production>> = BTreeMap::new();

	names.insert(table.root(), ROOT.to_owned());
	queue.push_back(table.root());

	while let Some(category) = queue.pop_front() {
		let name = names[&category].clone();
		let Some(productions) = table.productions(category) else {
			return Err(StructuralError::UndefinedNonTerminal(name).into());
		};

		let mut named = Vec::with_capacity(productions.len());
		for production in productions {
			let mut elements = Vec::with_capacity(production.len());
			for symbol in production {
				match symbol {
					Symbol::Literal(token) => elements.push(Element::Literal(token.clone())),
					Symbol::Category(target) => {
						if !names.contains_key(target) {
							// root keeps its name, others take the next free letter
							let next = category_name(names.len() - 1);
							names.insert(*target, next);
							queue.push_back(*target);
						}
						elements.push(Element::NonTerminal(names[target].clone()));
					}
				}
			}
			named.push(elements);
		}
		rules.insert(name, named);
	}

	debug!("materialized {} nonterminals", rules.len());
	Grammar::new(ROOT, rules, tokenizer)
}
