use anyhow::{Context, Result};
use rustfst::SymbolTable;
use std::fmt;
use std::path::Path;

/// How a line of text is broken into automaton labels.
pub enum TokenType {
    /// One label per UTF-8 byte.
    Byte,
    /// One label per Unicode code point.
    Utf8,
    /// Whitespace-separated tokens looked up in a symbol table.
    Symbols(SymbolTable),
}

impl TokenType {
    /// Resolves `byte`, `utf8`, or the path to an OpenFst text symbol table.
    pub fn resolve(spec: &str) -> Result<TokenType> {
        match spec {
            "byte" => Ok(TokenType::Byte),
            "utf8" => Ok(TokenType::Utf8),
            path => TokenType::from_symbol_file(path),
        }
    }

    pub fn from_symbol_file<P: AsRef<Path>>(path: P) -> Result<TokenType> {
        let path = path.as_ref();
        let table = SymbolTable::read_text(path)
            .with_context(|| format!("Failed to read symbol table {}", path.display()))?;
        Ok(TokenType::Symbols(table))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenType::Byte => "byte",
            TokenType::Utf8 => "utf8",
            TokenType::Symbols(_) => "symbols",
        }
    }
}

impl fmt::Debug for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Symbols(table) => write!(f, "Symbols({} entries)", table.len()),
            other => f.write_str(other.name()),
        }
    }
}
