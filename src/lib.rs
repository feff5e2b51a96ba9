//! Scores lines of text against a weighted finite-state language model.
//!
//! Each line is compiled into a linear acceptor, intersected with the
//! model, and the cost of the cheapest path through the lattice is
//! reported in bits per character.

pub mod driver;
pub mod lattice;
pub mod scorer;
pub mod strings;
pub mod token_type;

#[cfg(test)]
mod test_fixtures;

pub use driver::{run, score_corpus, Config, RunSummary};
pub use lattice::LanguageModel;
pub use scorer::{LineScore, ScoreOutcome, Scorer, SkipReason};
pub use strings::{compile_labels, escape, CompileError};
pub use token_type::TokenType;
