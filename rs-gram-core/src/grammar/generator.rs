use std::collections::{BTreeSet, HashMap, HashSet};

use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{Element, Grammar, DEFAULT_MAX_RESULTS};
use crate::error::{GrammarError, Result, StructuralError};
use crate::tokenizer::Token;

/// Generation front-end over one grammar.
///
/// # Responsibilities
/// - Sample strings with an injectable random source (thread-local, any
///   `Rng`, or a ChaCha8 stream from a seed)
/// - Avoid returning known strings (usually the training set), retrying up
///   to `nb_try` times
/// - Enumerate the whole language, bounded by `max_results`
///
/// # Invariants
/// - `max_results > 0`
#[derive(Debug, Clone)]
pub struct Generator {
	grammar: Grammar,
	known: HashSet<String>,

	/// Number of extra attempts `generate_novel` makes to avoid a known string.
	pub nb_try: usize,

	max_results: usize,
}

impl Generator {
	/// Creates a generator with no known strings, `nb_try = 0` and the default result cap.
	pub fn new(grammar: Grammar) -> Self {
		Self {
			grammar,
			known: HashSet::new(),
			nb_try: 0,
			max_results: DEFAULT_MAX_RESULTS,
		}
	}

	/// Registers strings `generate_novel` should avoid.
	pub fn with_known<I, S>(mut self, known: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.known.extend(known.into_iter().map(Into::into));
		self
	}

	pub fn grammar(&self) -> &Grammar {
		&self.grammar
	}

	pub fn is_known(&self, text: &str) -> bool {
		self.known.contains(text)
	}

	pub fn max_results(&self) -> usize {
		self.max_results
	}

	/// Sets the enumeration cap.
	///
	/// # Errors
	/// Returns an error if `max_results` is zero.
	pub fn set_max_results(&mut self, max_results: usize) -> Result<()> {
		if max_results == 0 {
			return Err(GrammarError::Configuration("max_results must be >= 1".to_owned()));
		}
		self.max_results = max_results;
		Ok(())
	}

	/// Samples one string with the thread-local random generator.
	pub fn generate(&self) -> Result<String> {
		self.generate_with(&mut rand::rng())
	}

	/// Samples one string: a production is chosen uniformly at every
	/// nonterminal, starting from the root.
	pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String> {
		let tokens = sample(&self.grammar, rng)?;
		Ok(self.grammar.detokenize(&tokens))
	}

	/// Samples one string from a ChaCha8 stream seeded with `seed`.
	///
	/// The same seed on the same grammar always gives the same string.
	pub fn generate_seeded(&self, seed: u64) -> Result<String> {
		self.generate_with(&mut ChaCha8Rng::seed_from_u64(seed))
	}

	/// Samples a string while avoiding known strings.
	///
	/// # Behavior
	/// - Samples once, then up to `nb_try` more times while the result is known.
	/// - Returns the first unknown string, or the last attempt if all are known.
	pub fn generate_novel_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String> {
		let mut text = self.generate_with(rng)?;
		let mut nb_try = self.nb_try;
		while nb_try > 0 && self.is_known(&text) {
			text = self.generate_with(rng)?;
			nb_try -= 1;
		}
		Ok(text)
	}

	pub fn generate_novel(&self) -> Result<String> {
		self.generate_novel_with(&mut rand::rng())
	}

	/// Every string of the language.
	///
	/// # Errors
	/// Returns `EnumerationLimit` if the language exceeds `max_results` strings.
	pub fn generate_all(&self) -> Result<BTreeSet<String>> {
		enumerate(&self.grammar, self.max_results)
	}
}

/// Samples a token sequence from the root of `grammar`.
///
/// # Errors
/// - `Structural` on an undefined nonterminal or when a nonterminal is
///   re-entered during its own expansion
pub(crate) fn sample<R: Rng + ?Sized>(grammar: &Grammar, rng: &mut R) -> Result<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut stack = Vec::new();
	expand(grammar, grammar.root(), rng, &mut stack, &mut tokens)?;
	Ok(tokens)
}

fn expand<'a, R: Rng + ?Sized>(
	grammar: &'a Grammar,
	name: &'a str,
	rng: &mut R,
	stack: &mut Vec<&'a str>,
	tokens: &mut Vec<Token>,
) -> Result<()> {
	if stack.contains(&name) {
		let mut cycle: Vec<String> = stack.iter().map(|n| n.to_string()).collect();
		cycle.push(name.to_owned());
		return Err(StructuralError::Cycle(cycle).into());
	}
	let productions = grammar
		.productions(name)
		.ok_or_else(|| StructuralError::UndefinedNonTerminal(name.to_owned()))?;
	let Some(production) = productions.choose(rng) else {
		return Err(GrammarError::InvalidInput(format!("nonterminal `{}` has no production", name)));
	};

	stack.push(name);
	for element in production {
		match element {
			Element::Literal(token) => tokens.push(token.clone()),
			Element::NonTerminal(target) => expand(grammar, target, rng, stack, tokens)?,
		}
	}
	stack.pop();
	Ok(())
}

/// Enumerates the language of `grammar`, memoizing per nonterminal.
pub(crate) fn enumerate(grammar: &Grammar, limit: usize) -> Result<BTreeSet<String>> {
	let mut memo = HashMap::new();
	let mut in_progress = Vec::new();
	let sequences = expand_all(grammar, grammar.root(), limit, &mut memo, &mut in_progress)?;
	Ok(sequences.iter().map(|tokens| grammar.detokenize(tokens)).collect())
}

fn expand_all<'a>(
	grammar: &'a Grammar,
	name: &'a str,
	limit: usize,
	memo: &mut HashMap<&'a str, BTreeSet<Vec<Token>>>,
	in_progress: &mut Vec<&'a str>,
) -> Result<BTreeSet<Vec<Token>>> {
	if let Some(done) = memo.get(name) {
		return Ok(done.clone());
	}
	if in_progress.contains(&name) {
		let mut cycle: Vec<String> = in_progress.iter().map(|n| n.to_string()).collect();
		cycle.push(name.to_owned());
		return Err(StructuralError::Cycle(cycle).into());
	}
	let productions = grammar
		.productions(name)
		.ok_or_else(|| StructuralError::UndefinedNonTerminal(name.to_owned()))?;

	in_progress.push(name);
	let mut language = BTreeSet::new();
	for production in productions {
		let mut partial: BTreeSet<Vec<Token>> = BTreeSet::from([Vec::new()]);
		for element in production {
			let parts = match element {
				Element::Literal(token) => BTreeSet::from([vec![token.clone()]]),
				Element::NonTerminal(target) => expand_all(grammar, target, limit, memo, in_progress)?,
			};
			let mut next = BTreeSet::new();
			for prefix in &partial {
				for part in &parts {
					let mut joined = prefix.clone();
					joined.extend(part.iter().cloned());
					next.insert(joined);
				}
				if next.len() > limit {
					return Err(GrammarError::EnumerationLimit { limit });
				}
			}
			partial = next;
		}
		language.extend(partial);
		if language.len() > limit {
			return Err(GrammarError::EnumerationLimit { limit });
		}
	}
	in_progress.pop();

	memo.insert(name, language.clone());
	Ok(language)
}
