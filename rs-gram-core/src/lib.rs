//! Grammar induction library.
//!
//! This crate learns a context-free grammar from a flat list of example
//! strings and generates new strings from it:
//! - Alignment of examples into templates of fixed text and variable slots
//! - Similarity-driven merging of slots into shared nonterminals
//! - Re-alignment of productions once nonterminals are known
//! - Language-preserving pruning and deterministic naming
//! - Sampling, bounded enumeration, export and persistence of grammars
//!
//! The usual entry point is `GrammarInducer`, which turns a dataset and an
//! `InductionConfig` into a `Grammar`.

/// Induction pipeline (template tree, slot merging, recalculation, pruning, materialization).
///
/// `GrammarInducer` is the high-level interface; the stages are public for
/// inspection and testing.
pub mod induction;

/// Finished grammars, generation and export formats.
pub mod grammar;

/// Induction parameters (`InductionConfig`) with validated setters and JSON loading.
pub mod config;

/// Error types shared by the whole crate.
pub mod error;

/// Tokenizers splitting examples into tokens and joining them back.
pub mod tokenizer;

/// I/O utilities (dataset loading, path helpers).
pub mod io;

pub use config::InductionConfig;
pub use error::{GrammarError, Result, StructuralError};
pub use grammar::generator::Generator;
pub use grammar::{Element, Grammar, Production};
pub use induction::{GrammarInducer, Induction, InductionStats};
pub use tokenizer::{Token, Tokenizer, TokenizerKind};
