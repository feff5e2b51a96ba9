use crate::lattice::{intersect, shortest_cost, LanguageModel};
use crate::strings::{acceptor, assert_string_acceptor, compile_labels, escape, CompileError};
use crate::token_type::TokenType;
use anyhow::{Context, Result};
use log::info;
use rustfst::prelude::*;
use std::f64::consts::LN_2;
use std::fmt;
use std::path::PathBuf;

/// Why a line produced no score.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Empty,
    Compile(CompileError),
    /// No path through the model spells the line.
    CompositionFailure,
    NonFinite,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty line"),
            SkipReason::Compile(err) => write!(f, "string compilation failure: {}", err),
            SkipReason::CompositionFailure => write!(f, "composition failure"),
            SkipReason::NonFinite => write!(f, "non-finite cost"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(f64),
    Skipped(SkipReason),
}

impl ScoreOutcome {
    pub fn bits_per_char(&self) -> Option<f64> {
        match self {
            ScoreOutcome::Scored(bits) => Some(*bits),
            ScoreOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineScore {
    pub line: String,
    pub outcome: ScoreOutcome,
}

/// Converts a cost in nats over `chars` symbols to bits per character.
pub fn bits_per_char(cost: f64, chars: usize) -> Option<f64> {
    if chars == 0 {
        return None;
    }
    let bits = cost / LN_2;
    Some(bits / chars as f64)
}

/// Scores strings against a read-only weighted language model.
pub struct Scorer {
    lm: LanguageModel,
    token_type: TokenType,
}

impl Scorer {
    pub fn new(lm: VectorFst<TropicalWeight>, token_type: TokenType) -> Scorer {
        Scorer {
            lm: LanguageModel::new(lm),
            token_type,
        }
    }

    /// Loads the model and resolves the token type concurrently.
    pub async fn from_files(lm_path: PathBuf, token_type: String) -> Result<Scorer> {
        let start_time = std::time::Instant::now();
        info!(
            "Loading model from {} with token type {}",
            lm_path.display(),
            token_type
        );

        let lm_task = tokio::task::spawn_blocking(move || {
            VectorFst::<TropicalWeight>::read(&lm_path)
                .map(LanguageModel::new)
                .with_context(|| format!("Failed to read language model {}", lm_path.display()))
        });
        let token_task = tokio::task::spawn_blocking(move || TokenType::resolve(&token_type));

        let (lm_result, token_result) = tokio::try_join!(lm_task, token_task)?;
        let lm = lm_result?;
        let token_type = token_result?;

        info!(
            "Loaded model with {} states in {:.2?}",
            lm.num_states(),
            start_time.elapsed()
        );
        Ok(Scorer { lm, token_type })
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    /// Scores one line of text, already stripped of its newline.
    ///
    /// Errors are reserved for failures inside the automaton library; a
    /// line the model cannot score is a [`ScoreOutcome::Skipped`].
    pub fn score(&self, line: &str) -> Result<ScoreOutcome> {
        let labels = match compile_labels(&escape(line), &self.token_type) {
            Ok(labels) => labels,
            Err(err) => return Ok(ScoreOutcome::Skipped(SkipReason::Compile(err))),
        };
        let string = acceptor(&labels)?;
        // An n-symbol string acceptor has n + 1 states.
        let chars = assert_string_acceptor(&string);
        if chars == 0 {
            return Ok(ScoreOutcome::Skipped(SkipReason::Empty));
        }

        let lattice = intersect(&string, &self.lm)?;
        if lattice.start().is_none() {
            return Ok(ScoreOutcome::Skipped(SkipReason::CompositionFailure));
        }
        let cost = match shortest_cost(&lattice)? {
            Some(cost) if cost.is_finite() => cost,
            _ => return Ok(ScoreOutcome::Skipped(SkipReason::NonFinite)),
        };
        Ok(match bits_per_char(cost, chars) {
            Some(bits) if bits.is_finite() => ScoreOutcome::Scored(bits),
            _ => ScoreOutcome::Skipped(SkipReason::NonFinite),
        })
    }

    /// Scores a raw corpus line, trimming trailing whitespace first.
    pub fn score_line(&self, raw: &str) -> Result<LineScore> {
        let line = raw.trim_end().to_string();
        let outcome = self.score(&line)?;
        Ok(LineScore { line, outcome })
    }
}
