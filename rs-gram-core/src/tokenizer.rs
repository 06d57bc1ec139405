use serde::{Deserialize, Serialize};

/// Atomic unit of an example. Equality is exact string match.
pub type Token = String;

/// Splits a string into tokens and joins tokens back into a string.
///
/// `detokenize(tokenize(s))` should give back `s` for normalized input,
/// otherwise generated strings will not textually match the dataset.
pub trait Tokenizer {
	fn tokenize(&self, text: &str) -> Vec<Token>;
	fn detokenize(&self, tokens: &[Token]) -> String;
}

/// Stock tokenizers.
///
/// The kind travels with the grammar so generation can join tokens the same
/// way the dataset was split.
///
/// # Variants
/// - `Whitespace`: splits on whitespace, joins with a single space.
/// - `Words`: also splits punctuation into separate tokens
///   (`"Hello, world!"` → `Hello` `,` `world` `!`) and joins without a space
///   before closing punctuation or after opening brackets.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
	#[default]
	Whitespace,
	Words,
}

impl Tokenizer for TokenizerKind {
	fn tokenize(&self, text: &str) -> Vec<Token> {
		match self {
			TokenizerKind::Whitespace => text.split_whitespace().map(str::to_owned).collect(),
			TokenizerKind::Words => split_words(text),
		}
	}

	fn detokenize(&self, tokens: &[Token]) -> String {
		match self {
			TokenizerKind::Whitespace => tokens.join(" "),
			TokenizerKind::Words => join_words(tokens),
		}
	}
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '\'' || c == '_' || c == '-'
}

fn is_closing(token: &str) -> bool {
	matches!(token, "." | "," | "!" | "?" | ";" | ":" | ")" | "]" | "}" | "%")
}

fn is_opening(token: &str) -> bool {
	matches!(token, "(" | "[" | "{")
}

fn split_words(text: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut word = String::new();

	for c in text.chars() {
		if is_word_char(c) {
			word.push(c);
			continue;
		}
		if !word.is_empty() {
			tokens.push(std::mem::take(&mut word));
		}
		if !c.is_whitespace() {
			tokens.push(c.to_string());
		}
	}
	if !word.is_empty() {
		tokens.push(word);
	}

	tokens
}

fn join_words(tokens: &[Token]) -> String {
	let mut text = String::new();
	let mut previous: Option<&str> = None;

	for token in tokens {
		if let Some(prev) = previous {
			if !is_closing(token) && !is_opening(prev) {
				text.push(' ');
			}
		}
		text.push_str(token);
		previous = Some(token);
	}

	text
}
