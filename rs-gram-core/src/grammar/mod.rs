//! Finished grammars: representation, validation, persistence, sampling and export.
//!
//! A `Grammar` maps nonterminal names to lists of productions. It is built
//! once (by induction or from a mapping) and never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GrammarError, Result, StructuralError};
use crate::tokenizer::{Token, Tokenizer, TokenizerKind};

/// Random and exhaustive generation over a grammar.
///
/// Exposes the `Generator` (seeded sampling, novelty-seeking retries,
/// bounded enumeration).
pub mod generator;

/// Text formats for grammars (arrow notation, Tracery JSON).
pub mod export;

/// Name of the start nonterminal of every induced grammar.
pub const ROOT: &str = "origin";

/// Default cap on the number of strings `generate_all` may produce.
pub const DEFAULT_MAX_RESULTS: usize = 1_000_000;

/// Element of a production.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
	Literal(Token),
	NonTerminal(String),
}

/// Ordered list of elements. May be empty when empty fillers are allowed.
pub type Production = Vec<Element>;

/// Context-free grammar over tokens.
///
/// # Invariants
/// - the root nonterminal is defined
/// - every referenced nonterminal is defined and has at least one production
/// - no nonterminal reaches itself, so every derivation terminates
/// - productions of a nonterminal are unique, in first-appearance order
///
/// The tokenizer kind used to build the grammar travels with it, so that
/// generated token sequences are joined back the same way.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Grammar {
	root: String,
	rules: BTreeMap<String, Vec<Production>>,
	tokenizer: TokenizerKind,
}

impl Grammar {
	/// Creates a validated grammar. Duplicate productions are dropped.
	///
	/// # Errors
	/// - `InvalidInput` if a nonterminal has no production
	/// - `Structural` if a reference (or the root) is undefined, or on a cycle
	pub fn new(root: impl Into<String>, rules: BTreeMap<String, Vec<Production>>, tokenizer: TokenizerKind) -> Result<Self> {
		let rules: BTreeMap<String, Vec<Production>> = rules
			.into_iter()
			.map(|(name, productions)| {
				let mut seen = HashSet::new();
				let unique: Vec<Production> = productions.into_iter().filter(|p| seen.insert(p.clone())).collect();
				(name, unique)
			})
			.collect();

		let grammar = Self {
			root: root.into(),
			rules,
			tokenizer,
		};
		grammar.check_structure()?;
		Ok(grammar)
	}

	/// Builds a grammar without any check, to exercise the defensive paths.
	#[cfg(test)]
	pub(crate) fn unchecked(root: &str, rules: BTreeMap<String, Vec<Production>>, tokenizer: TokenizerKind) -> Self {
		Self {
			root: root.to_owned(),
			rules,
			tokenizer,
		}
	}

	pub fn root(&self) -> &str {
		&self.root
	}

	pub fn tokenizer(&self) -> TokenizerKind {
		self.tokenizer
	}

	/// Read-only view of every rule.
	pub fn rules(&self) -> &BTreeMap<String, Vec<Production>> {
		&self.rules
	}

	pub fn productions(&self, nonterminal: &str) -> Option<&[Production]> {
		self.rules.get(nonterminal).map(Vec::as_slice)
	}

	/// Total number of productions.
	pub fn size(&self) -> usize {
		self.rules.values().map(Vec::len).sum()
	}

	/// Nonterminals reachable from the root, breadth-first in order of first reference.
	pub fn nonterminals_sorted(&self) -> Vec<&str> {
		let mut order: Vec<&str> = Vec::new();
		let mut seen: HashSet<&str> = HashSet::new();
		let mut queue: VecDeque<&str> = VecDeque::new();

		seen.insert(self.root.as_str());
		queue.push_back(self.root.as_str());
		while let Some(name) = queue.pop_front() {
			order.push(name);
			for production in self.productions(name).unwrap_or_default() {
				for element in production {
					if let Element::NonTerminal(target) = element {
						if seen.insert(target) {
							queue.push_back(target);
						}
					}
				}
			}
		}
		order
	}

	/// Longest chain of nested nonterminals from the root (a root made of
	/// literals only has depth 1).
	pub fn depth(&self) -> usize {
		let mut memo = HashMap::new();
		self.depth_of(&self.root, &mut memo)
	}

	fn depth_of<'a>(&'a self, name: &'a str, memo: &mut HashMap<&'a str, usize>) -> usize {
		if let Some(depth) = memo.get(name) {
			return *depth;
		}
		let mut deepest = 0;
		for production in self.productions(name).unwrap_or_default() {
			for element in production {
				if let Element::NonTerminal(target) = element {
					deepest = deepest.max(self.depth_of(target, memo));
				}
			}
		}
		memo.insert(name, deepest + 1);
		deepest + 1
	}

	/// Number of distinct derivations from the root, saturating at `u128::MAX`.
	///
	/// Counts derivation trees, not strings: an ambiguous grammar counts a
	/// string once per derivation.
	pub fn derivation_count(&self) -> u128 {
		let mut memo = HashMap::new();
		self.derivations_of(&self.root, &mut memo)
	}

	fn derivations_of<'a>(&'a self, name: &'a str, memo: &mut HashMap<&'a str, u128>) -> u128 {
		if let Some(count) = memo.get(name) {
			return *count;
		}
		let mut total: u128 = 0;
		for production in self.productions(name).unwrap_or_default() {
			let mut product: u128 = 1;
			for element in production {
				if let Element::NonTerminal(target) = element {
					product = product.saturating_mul(self.derivations_of(target, memo));
				}
			}
			total = total.saturating_add(product);
		}
		memo.insert(name, total);
		total
	}

	/// Whether `other` is this grammar with its nonterminals renamed.
	///
	/// Roots are paired with each other, then every nonterminal reachable
	/// from the root must pair with exactly one nonterminal of `other` so that
	/// their production sets match once renamed. Both grammars must hold the
	/// same number of nonterminals.
	pub fn is_isomorphic_with(&self, other: &Grammar) -> bool {
		if self.rules.len() != other.rules.len() {
			return false;
		}
		let mut renaming = Renaming::default();
		renaming.pair(self, &self.root, other, &other.root)
	}

	/// Mapping form: every production rendered as space-separated tokens,
	/// references written `<Name>`.
	///
	/// Inside a token, `\` escapes the next character: literal tokens are
	/// written with `\<`, `\\` and escaped whitespace, so that no literal
	/// can be read back as a reference or split in two.
	pub fn to_mapping(&self) -> BTreeMap<String, Vec<String>> {
		self.rules
			.iter()
			.map(|(name, productions)| (name.clone(), productions.iter().map(|p| render(p)).collect()))
			.collect()
	}

	/// Parses the mapping form back into a grammar rooted at `origin`.
	///
	/// Tokens are separated by unescaped whitespace. A token `<Name>` (with
	/// unescaped brackets) is a reference only when `Name` is a key of the
	/// mapping; any other token is a literal, with its escapes removed.
	///
	/// # Errors
	/// - `Parse` if the mapping has no `origin` key
	/// - any error of `Grammar::new`
	pub fn from_mapping(mapping: &BTreeMap<String, Vec<String>>, tokenizer: TokenizerKind) -> Result<Self> {
		if !mapping.contains_key(ROOT) {
			return Err(GrammarError::Parse(format!("missing root nonterminal `{}`", ROOT)));
		}

		let rules: BTreeMap<String, Vec<Production>> = mapping
			.iter()
			.map(|(name, productions)| {
				let parsed: Vec<Production> = productions.iter().map(|text| parse_production(text, mapping)).collect();
				(name.clone(), parsed)
			})
			.collect();

		Self::new(ROOT, rules, tokenizer)
	}

	/// Serializes the mapping form as pretty JSON.
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(&self.to_mapping())?)
	}

	/// Parses the JSON mapping form.
	///
	/// # Errors
	/// Returns an error on invalid JSON or an invalid grammar.
	pub fn from_json(json: &str, tokenizer: TokenizerKind) -> Result<Self> {
		let mapping: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
		Self::from_mapping(&mapping, tokenizer)
	}

	/// Writes the grammar to a binary file using `postcard`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	/// Reads a grammar written by `save` and validates it again.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		let grammar: Grammar = postcard::from_bytes(&bytes)?;
		Self::new(grammar.root, grammar.rules, grammar.tokenizer)
	}

	/// Samples one string with the thread-local random generator.
	pub fn generate(&self) -> Result<String> {
		let tokens = generator::sample(self, &mut rand::rng())?;
		Ok(self.detokenize(&tokens))
	}

	/// Enumerates every string of the language, up to `DEFAULT_MAX_RESULTS`.
	pub fn generate_all(&self) -> Result<BTreeSet<String>> {
		generator::enumerate(self, DEFAULT_MAX_RESULTS)
	}

	pub(crate) fn detokenize(&self, tokens: &[Token]) -> String {
		self.tokenizer.detokenize(tokens)
	}

	/// Checks the structural invariants.
	fn check_structure(&self) -> Result<()> {
		if !self.rules.contains_key(&self.root) {
			return Err(StructuralError::UndefinedNonTerminal(self.root.clone()).into());
		}
		for (name, productions) in &self.rules {
			if productions.is_empty() {
				return Err(GrammarError::InvalidInput(format!("nonterminal `{}` has no production", name)));
			}
			for element in productions.iter().flatten() {
				match element {
					Element::NonTerminal(target) if !self.rules.contains_key(target) => {
						return Err(StructuralError::UndefinedNonTerminal(target.clone()).into());
					}
					Element::Literal(token) if token.is_empty() => {
						return Err(GrammarError::InvalidInput(format!("nonterminal `{}` has an empty literal", name)));
					}
					_ => {}
				}
			}
		}

		// Iterative DFS; `path` holds the nonterminals being expanded
		let mut done: HashSet<&str> = HashSet::new();
		for start in self.rules.keys() {
			if done.contains(start.as_str()) {
				continue;
			}
			let mut path: Vec<&str> = Vec::new();
			let mut stack: Vec<(&str, bool)> = vec![(start.as_str(), false)];
			while let Some((name, leaving)) = stack.pop() {
				if leaving {
					path.pop();
					done.insert(name);
					continue;
				}
				if done.contains(name) {
					continue;
				}
				if let Some(position) = path.iter().position(|n| *n == name) {
					let mut cycle: Vec<String> = path[position..].iter().map(|n| n.to_string()).collect();
					cycle.push(name.to_owned());
					return Err(StructuralError::Cycle(cycle).into());
				}
				path.push(name);
				stack.push((name, true));
				for element in self.productions(name).unwrap_or_default().iter().flatten() {
					if let Element::NonTerminal(target) = element {
						stack.push((target.as_str(), false));
					}
				}
			}
		}
		Ok(())
	}
}

/// One-to-one pairing of nonterminal names built while comparing two grammars.
#[derive(Clone, Default)]
struct Renaming {
	forward: HashMap<String, String>,
	backward: HashMap<String, String>,
}

impl Renaming {
	fn pair(&mut self, left: &Grammar, a: &str, right: &Grammar, b: &str) -> bool {
		match (self.forward.get(a), self.backward.contains_key(b)) {
			(Some(bound), _) => return bound == b,
			(None, true) => return false,
			(None, false) => {}
		}
		self.forward.insert(a.to_owned(), b.to_owned());
		self.backward.insert(b.to_owned(), a.to_owned());

		match (left.productions(a), right.productions(b)) {
			(Some(ours), Some(theirs)) if ours.len() == theirs.len() => {
				let mut used = vec![false; theirs.len()];
				self.match_productions(left, ours, right, theirs, &mut used)
			}
			_ => false,
		}
	}

	/// Finds a one-to-one matching of productions, backtracking on the renaming.
	fn match_productions(
		&mut self,
		left: &Grammar,
		ours: &[Production],
		right: &Grammar,
		theirs: &[Production],
		used: &mut [bool],
	) -> bool {
		let Some((first, rest)) = ours.split_first() else {
			return true;
		};
		for (j, candidate) in theirs.iter().enumerate() {
			if used[j] || candidate.len() != first.len() {
				continue;
			}
			let snapshot = self.clone();
			if self.pair_production(left, first, right, candidate) {
				used[j] = true;
				if self.match_productions(left, rest, right, theirs, used) {
					return true;
				}
				used[j] = false;
			}
			*self = snapshot;
		}
		false
	}

	fn pair_production(&mut self, left: &Grammar, ours: &Production, right: &Grammar, theirs: &Production) -> bool {
		ours.iter().zip(theirs).all(|pair| match pair {
			(Element::Literal(x), Element::Literal(y)) => x == y,
			(Element::NonTerminal(a), Element::NonTerminal(b)) => self.pair(left, a, right, b),
			_ => false,
		})
	}
}

/// Escape character of the mapping form.
const ESCAPE: char = '\\';

fn parse_production(text: &str, mapping: &BTreeMap<String, Vec<String>>) -> Production {
	split_escaped(text)
		.into_iter()
		.map(|token| match reference_name(&token) {
			Some(target) if mapping.contains_key(&target) => Element::NonTerminal(target),
			_ => Element::Literal(token.iter().map(|(c, _)| *c).collect()),
		})
		.collect()
}

/// Splits on unescaped whitespace. Each character remembers whether it was escaped.
fn split_escaped(text: &str) -> Vec<Vec<(char, bool)>> {
	let mut tokens = Vec::new();
	let mut current = Vec::new();
	let mut chars = text.chars();
	while let Some(c) = chars.next() {
		if c == ESCAPE {
			// a trailing escape stands for itself
			current.push((chars.next().unwrap_or(ESCAPE), true));
		} else if c.is_whitespace() {
			if !current.is_empty() {
				tokens.push(std::mem::take(&mut current));
			}
		} else {
			current.push((c, false));
		}
	}
	if !current.is_empty() {
		tokens.push(current);
	}
	tokens
}

fn reference_name(token: &[(char, bool)]) -> Option<String> {
	match token {
		[('<', false), name @ .., ('>', false)] if !name.is_empty() => Some(name.iter().map(|(c, _)| *c).collect()),
		_ => None,
	}
}

fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		if c == ESCAPE || c == '<' || c.is_whitespace() {
			escaped.push(ESCAPE);
		}
		escaped.push(c);
	}
	escaped
}

pub(crate) fn render(production: &Production) -> String {
	production
		.iter()
		.map(|element| match element {
			Element::Literal(token) => escape(token),
			Element::NonTerminal(name) => format!("<{}>", escape(name)),
		})
		.collect::<Vec<_>>()
		.join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn mapping(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
		entries
			.iter()
			.map(|(name, productions)| (name.to_string(), productions.iter().map(|p| p.to_string()).collect()))
			.collect()
	}

	fn animals() -> Grammar {
		let map = mapping(&[
			("origin", &["I like my <A>", "<B> is <A>"]),
			("A", &["cat", "dog"]),
			("B", &["Alice", "Bob"]),
		]);
		Grammar::from_mapping(&map, TokenizerKind::Whitespace).unwrap()
	}

	#[test]
	fn mapping_round_trip() {
		let grammar = animals();
		assert_eq!(grammar.size(), 6);
		let again = Grammar::from_mapping(&grammar.to_mapping(), TokenizerKind::Whitespace).unwrap();
		assert_eq!(again, grammar);
	}

	#[test]
	fn literals_that_look_like_references_survive_the_mapping() {
		let mut rules = BTreeMap::new();
		rules.insert(
			ROOT.to_owned(),
			vec![
				vec![Element::Literal("<A>".to_owned()), Element::Literal("is".to_owned()), Element::NonTerminal("A".to_owned())],
				vec![Element::Literal("two words".to_owned()), Element::Literal("back\\slash".to_owned())],
			],
		);
		rules.insert("A".to_owned(), vec![vec![Element::Literal("cat".to_owned())]]);
		let grammar = Grammar::new(ROOT, rules, TokenizerKind::Whitespace).unwrap();

		let mapping = grammar.to_mapping();
		assert_eq!(mapping["origin"], vec!["\\<A> is <A>", "two\\ words back\\\\slash"]);
		let again = Grammar::from_mapping(&mapping, TokenizerKind::Whitespace).unwrap();
		assert_eq!(again, grammar);
	}

	#[test]
	fn empty_literal_is_rejected() {
		let mut rules = BTreeMap::new();
		rules.insert(ROOT.to_owned(), vec![vec![Element::Literal(String::new())]]);
		assert!(matches!(
			Grammar::new(ROOT, rules, TokenizerKind::Whitespace),
			Err(GrammarError::InvalidInput(_))
		));
	}

	#[test]
	fn isomorphism_ignores_names() {
		let renamed = mapping(&[
			("origin", &["<Who> is <Pet>", "I like my <Pet>"]),
			("Pet", &["dog", "cat"]),
			("Who", &["Bob", "Alice"]),
		]);
		let renamed = Grammar::from_mapping(&renamed, TokenizerKind::Whitespace).unwrap();
		assert!(animals().is_isomorphic_with(&renamed));
		assert!(renamed.is_isomorphic_with(&animals()));

		let different = mapping(&[
			("origin", &["I like my <A>", "<B> is <A>"]),
			("A", &["cat", "dog"]),
			("B", &["Alice", "Carol"]),
		]);
		let different = Grammar::from_mapping(&different, TokenizerKind::Whitespace).unwrap();
		assert!(!animals().is_isomorphic_with(&different));
	}

	#[test]
	fn isomorphism_keeps_nonterminals_apart() {
		// one shared nonterminal is not two nonterminals with equal productions
		let shared = mapping(&[("origin", &["<A> <A>", "x"]), ("A", &["a"]), ("B", &["b"])]);
		let split = mapping(&[("origin", &["<A> <B>", "x"]), ("A", &["a"]), ("B", &["a"])]);
		let shared = Grammar::from_mapping(&shared, TokenizerKind::Whitespace).unwrap();
		let split = Grammar::from_mapping(&split, TokenizerKind::Whitespace).unwrap();
		assert!(!shared.is_isomorphic_with(&split));
		assert!(!split.is_isomorphic_with(&shared));
	}

	#[test]
	fn unknown_placeholder_stays_literal() {
		let map = mapping(&[("origin", &["a <Z> b"])]);
		let grammar = Grammar::from_mapping(&map, TokenizerKind::Whitespace).unwrap();
		assert_eq!(
			grammar.productions("origin").unwrap()[0][1],
			Element::Literal("<Z>".to_owned())
		);
	}

	#[test]
	fn missing_root_is_parse_error() {
		let map = mapping(&[("A", &["x"])]);
		assert!(matches!(
			Grammar::from_mapping(&map, TokenizerKind::Whitespace),
			Err(GrammarError::Parse(_))
		));
	}

	#[test]
	fn cycles_are_rejected() {
		let map = mapping(&[("origin", &["<A>"]), ("A", &["a <B>"]), ("B", &["b <A>", "c"])]);
		match Grammar::from_mapping(&map, TokenizerKind::Whitespace) {
			Err(GrammarError::Structural(StructuralError::Cycle(cycle))) => {
				assert_eq!(cycle.first(), cycle.last());
				assert!(cycle.len() >= 3);
			}
			other => panic!("expected a cycle, got {:?}", other),
		}
	}

	#[test]
	fn empty_rule_is_rejected() {
		let mut rules = BTreeMap::new();
		rules.insert(ROOT.to_owned(), Vec::new());
		assert!(matches!(
			Grammar::new(ROOT, rules, TokenizerKind::Whitespace),
			Err(GrammarError::InvalidInput(_))
		));
	}

	#[test]
	fn statistics() {
		let grammar = animals();
		assert_eq!(grammar.depth(), 2);
		assert_eq!(grammar.derivation_count(), 6);
		assert_eq!(grammar.nonterminals_sorted(), vec!["origin", "A", "B"]);
	}

	#[test]
	fn json_round_trip() {
		let grammar = animals();
		let json = grammar.to_json().unwrap();
		assert!(json.contains("\"I like my <A>\""));
		let again = Grammar::from_json(&json, TokenizerKind::Whitespace).unwrap();
		assert_eq!(again.generate_all().unwrap(), grammar.generate_all().unwrap());
	}

	#[test]
	fn save_and_load() {
		let grammar = animals();
		let path = std::env::temp_dir().join(format!("rs-gram-save-{}.bin", std::process::id()));
		grammar.save(&path).unwrap();
		let loaded = Grammar::load(&path).unwrap();
		std::fs::remove_file(&path).unwrap();
		assert_eq!(loaded, grammar);
	}

	#[test]
	fn empty_production_renders_empty() {
		let map = mapping(&[("origin", &["a <A>"]), ("A", &["", "b"])]);
		let grammar = Grammar::from_mapping(&map, TokenizerKind::Whitespace).unwrap();
		assert_eq!(grammar.to_mapping()["A"], vec!["", "b"]);
		let all = grammar.generate_all().unwrap();
		assert!(all.contains("a"));
		assert!(all.contains("a b"));
	}
}
