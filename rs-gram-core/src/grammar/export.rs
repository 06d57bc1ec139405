use serde_json::{Map, Value};

use super::{Element, Grammar, Production};
use crate::error::Result;
use crate::tokenizer::Tokenizer;

/// Marker printed for an empty production in arrow notation.
pub const EMPTY_PRODUCTION: &str = "ε";

/// Renders a grammar one rule per line, root first:
///
/// ```text
/// origin -> I like my <A> | <B> is <A>
/// A -> cat | dog
/// ```
///
/// Reachable nonterminals come breadth-first from the root, any others follow
/// in name order.
pub fn to_arrow(grammar: &Grammar) -> String {
	ordered_names(grammar)
		.into_iter()
		.filter_map(|name| {
			let productions = grammar.productions(name)?;
			let alternatives: Vec<String> = productions
				.iter()
				.map(|production| {
					if production.is_empty() {
						EMPTY_PRODUCTION.to_owned()
					} else {
						super::render(production)
					}
				})
				.collect();
			Some(format!("{} -> {}", name, alternatives.join(" | ")))
		})
		.collect::<Vec<_>>()
		.join("\n")
}

/// Renders a grammar as a Tracery document: one array of strings per
/// nonterminal, references written `#Name#`.
///
/// Tokens are joined with the grammar's tokenizer so the document reads like
/// the generated text.
pub fn to_tracery(grammar: &Grammar) -> Result<String> {
	let mut document = Map::new();
	for name in ordered_names(grammar) {
		let Some(productions) = grammar.productions(name) else { continue };
		let alternatives = productions
			.iter()
			.map(|production| Value::String(tracery_text(grammar, production)))
			.collect();
		document.insert(name.to_owned(), Value::Array(alternatives));
	}
	Ok(serde_json::to_string_pretty(&Value::Object(document))?)
}

fn tracery_text(grammar: &Grammar, production: &Production) -> String {
	let tokens: Vec<String> = production
		.iter()
		.map(|element| match element {
			Element::Literal(token) => token.clone(),
			Element::NonTerminal(name) => format!("#{}#", name),
		})
		.collect();
	grammar.tokenizer().detokenize(&tokens)
}

fn ordered_names(grammar: &Grammar) -> Vec<&str> {
	let mut names = grammar.nonterminals_sorted();
	let unreachable: Vec<&str> = grammar
		.rules()
		.keys()
		.map(String::as_str)
		.filter(|name| !names.contains(name))
		.collect();
	names.extend(unreachable);
	names
}
