//! Turns text into linear acceptors.
//!
//! Text may use a small bracket syntax: `\x` is the literal character `x`,
//! `[97]` is the raw label 97 and `[word]` names a symbol from a symbol
//! table. [`escape`] makes arbitrary text safe to compile literally.

use crate::token_type::TokenType;
use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rustfst::prelude::*;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;

lazy_static! {
    static ref SPECIAL_PATTERN: Regex = Regex::new(r"[\[\]\\]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    DanglingEscape,
    UnterminatedBracket,
    UnbalancedBracket,
    EmptyBracket,
    NestedBracket,
    /// A bracketed name under a token type with no symbol table.
    GeneratedSymbol(String),
    OutOfVocabulary(String),
    /// Label 0 is epsilon and cannot appear in a string.
    Epsilon,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::DanglingEscape => write!(f, "trailing backslash"),
            CompileError::UnterminatedBracket => write!(f, "unterminated '['"),
            CompileError::UnbalancedBracket => write!(f, "unbalanced ']'"),
            CompileError::EmptyBracket => write!(f, "empty brackets"),
            CompileError::NestedBracket => write!(f, "nested '['"),
            CompileError::GeneratedSymbol(name) => {
                write!(f, "symbol [{}] needs a symbol table", name)
            }
            CompileError::OutOfVocabulary(token) => {
                write!(f, "symbol {:?} not in symbol table", token)
            }
            CompileError::Epsilon => write!(f, "epsilon label in string"),
        }
    }
}

impl Error for CompileError {}

/// Separates tokens under a symbol table, as in OpenFst's string compiler.
const TOKEN_SEPARATORS: [char; 2] = [' ', '\t'];

enum Piece {
    Char(char),
    Escaped(char),
    Bracketed(String),
}

/// Backslash-escapes `[`, `]` and `\`.
pub fn escape(text: &str) -> Cow<'_, str> {
    SPECIAL_PATTERN.replace_all(text, r"\$0")
}

fn parse_pieces(text: &str) -> std::result::Result<Vec<Piece>, CompileError> {
    let mut pieces = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) => pieces.push(Piece::Escaped(escaped)),
                None => return Err(CompileError::DanglingEscape),
            },
            '[' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('[') => return Err(CompileError::NestedBracket),
                        Some('\\') => match chars.next() {
                            Some(escaped) => name.push(escaped),
                            None => return Err(CompileError::DanglingEscape),
                        },
                        Some(c) => name.push(c),
                        None => return Err(CompileError::UnterminatedBracket),
                    }
                }
                if name.is_empty() {
                    return Err(CompileError::EmptyBracket);
                }
                pieces.push(Piece::Bracketed(name));
            }
            ']' => return Err(CompileError::UnbalancedBracket),
            c => pieces.push(Piece::Char(c)),
        }
    }
    Ok(pieces)
}

fn raw_label(name: &str) -> Option<Label> {
    if name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse::<Label>().ok()
    } else {
        None
    }
}

fn lookup(table: &SymbolTable, token: &str) -> std::result::Result<Label, CompileError> {
    table
        .get_label(token)
        .ok_or_else(|| CompileError::OutOfVocabulary(token.to_string()))
}

/// Compiles text into the label sequence it denotes under `token_type`.
pub fn compile_labels(
    text: &str,
    token_type: &TokenType,
) -> std::result::Result<Vec<Label>, CompileError> {
    let pieces = parse_pieces(text)?;
    let mut labels = Vec::with_capacity(pieces.len());
    match token_type {
        TokenType::Byte | TokenType::Utf8 => {
            for piece in pieces {
                match piece {
                    Piece::Char(c) | Piece::Escaped(c) => {
                        if let TokenType::Byte = token_type {
                            let mut buf = [0u8; 4];
                            labels.extend(c.encode_utf8(&mut buf).bytes().map(Label::from));
                        } else {
                            labels.push(c as Label);
                        }
                    }
                    Piece::Bracketed(name) => match raw_label(&name) {
                        Some(label) => labels.push(label),
                        None => return Err(CompileError::GeneratedSymbol(name)),
                    },
                }
            }
        }
        TokenType::Symbols(table) => {
            let mut token = String::new();
            for piece in pieces {
                match piece {
                    Piece::Char(c) if TOKEN_SEPARATORS.contains(&c) => {
                        if !token.is_empty() {
                            labels.push(lookup(table, &token)?);
                            token.clear();
                        }
                    }
                    Piece::Char(c) | Piece::Escaped(c) => token.push(c),
                    Piece::Bracketed(name) => {
                        if !token.is_empty() {
                            labels.push(lookup(table, &token)?);
                            token.clear();
                        }
                        match raw_label(&name) {
                            Some(label) => labels.push(label),
                            None => labels.push(lookup(table, &name)?),
                        }
                    }
                }
            }
            if !token.is_empty() {
                labels.push(lookup(table, &token)?);
            }
        }
    }
    if labels.contains(&EPS_LABEL) {
        return Err(CompileError::Epsilon);
    }
    Ok(labels)
}

/// Builds the unweighted linear acceptor for `labels`: N+1 states, one
/// transition per label, the last state final.
pub fn acceptor(labels: &[Label]) -> Result<VectorFst<TropicalWeight>> {
    let mut fst = VectorFst::new();
    let mut state = fst.add_state();
    fst.set_start(state)?;
    for &label in labels {
        let next = fst.add_state();
        fst.add_tr(state, Tr::new(label, label, TropicalWeight::one(), next))?;
        state = next;
    }
    fst.set_final(state, TropicalWeight::one())?;
    Ok(fst)
}

/// Checks that `fst` is an unweighted acceptor of exactly one string and
/// returns that string's length.
///
/// # Panics
///
/// If any of those properties does not hold.
pub fn assert_string_acceptor(fst: &VectorFst<TropicalWeight>) -> usize {
    let mut state = fst.start().expect("string acceptor has no start state");
    let mut length = 0;
    loop {
        let owned = fst.get_trs(state).expect("string acceptor state out of range");
        let trs = owned.trs();
        match trs {
            [] => break,
            [tr] => {
                assert_eq!(tr.ilabel, tr.olabel, "string FSA is not an acceptor");
                assert!(tr.weight.is_one(), "string FSA is weighted");
                assert!(tr.nextstate > state, "string FSA is not a linear chain");
                length += 1;
                state = tr.nextstate;
            }
            _ => panic!("string FSA state {} has {} transitions", state, trs.len()),
        }
    }
    let final_weight = fst
        .final_weight(state)
        .expect("string acceptor state out of range");
    assert!(
        matches!(final_weight, Some(w) if w.is_one()),
        "string FSA does not end in an unweighted final state"
    );
    assert_eq!(fst.num_states(), length + 1, "string FSA has unreachable states");
    length
}
