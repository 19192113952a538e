//! The closed error-kind taxonomy.
//!
//! Every failure carries structured context — what was sought, what was
//! considered — rather than a bare message, so a transport layer (CLI/HTTP/UI,
//! none of which this crate owns) can render it however it likes.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Line/column position of a syntax error, when the parser's message exposes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

fn position_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("static regex is valid")
    })
}

fn parse_position(message: &str) -> Option<Position> {
    let caps = position_regex().captures(message)?;
    Some(Position {
        line: caps.get(1)?.as_str().parse().ok()?,
        column: caps.get(2)?.as_str().parse().ok()?,
    })
}

/// Candidates considered during a failed resolution, attached to
/// [`AnalysisError::TableNotFound`] / [`AnalysisError::ColumnNotFound`] so a
/// caller can tell "not found" apart from "ambiguous" without a separate
/// variant (ambiguous references are surfaced this way).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates(pub Vec<String>);

impl Candidates {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.0.len() > 1
    }
}

impl fmt::Display for Candidates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0.join(", "))
        }
    }
}

/// The closed error-kind set.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Raised by the parser adapter. At batch scope the offending query is
    /// logged and skipped.
    #[error("syntax error: {message}")]
    SyntaxError {
        message: String,
        position: Option<Position>,
    },

    #[error("source not found: {name}")]
    SourceNotFound { name: String },

    #[error("schema not found: {name} (source {source_name})")]
    SchemaNotFound { source_name: String, name: String },

    #[error("table not found: {sought} (candidates: {candidates})")]
    TableNotFound {
        sought: String,
        candidates: Candidates,
    },

    #[error("column not found: {sought} (candidates: {candidates})")]
    ColumnNotFound {
        sought: String,
        candidates: Candidates,
    },

    /// Structurally valid SQL the analyzer cannot treat as lineage-bearing DML,
    /// an arity mismatch, or CTAS with no default schema.
    #[error("semantic error: {0}")]
    SemanticError(String),

    /// Catalog I/O failure; aborts the single query's transaction.
    #[error("store error: {0}")]
    StoreError(String),
}

impl AnalysisError {
    pub fn syntax(message: impl Into<String>) -> Self {
        let message = message.into();
        let position = parse_position(&message);
        Self::SyntaxError { message, position }
    }

    pub fn table_not_found(sought: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::TableNotFound {
            sought: sought.into(),
            candidates: Candidates(candidates),
        }
    }

    pub fn column_not_found(sought: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::ColumnNotFound {
            sought: sought.into(),
            candidates: Candidates(candidates),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
