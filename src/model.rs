//! Core-internal entities: built per query, discarded after extraction.
//!
//! Unlike the catalog entities in [`crate::catalog`], nothing here is persisted —
//! an `AliasEnv` and the `BoundDML` it produces live only for the duration of
//! analyzing a single statement.

use indexmap::IndexMap;

use crate::catalog::{ColumnId, TableId};

/// Fully-qualified name of a catalog object. Comparisons are case-insensitive;
/// the original-case strings are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fqn {
    pub source: String,
    pub schema: Option<String>,
    pub table: String,
    pub column: Option<String>,
}

impl Fqn {
    pub fn table(source: impl Into<String>, schema: Option<String>, table: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            schema,
            table: table.into(),
            column: None,
        }
    }
}

/// A column reference as it appears in a projected expression, before binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// `c`
    Unqualified(String),
    /// `t.c`
    Qualified(String, String),
    /// `t.*`
    QualifiedStar(String),
    /// `*`
    Star,
}

/// The result of walking one projected expression.
#[derive(Debug, Clone, Default)]
pub struct ProjectedExpr {
    /// The output alias, if the SQL supplied one (`AS alias`). Resolved further
    /// downstream by the Binder when absent.
    pub alias: Option<String>,
    /// Every `ColumnRef` encountered during descent, in textual order.
    pub columns: Vec<ColumnRef>,
    /// True iff the expression is exactly `*` or `qualifier.*`.
    pub is_star: bool,
}

/// One entry in an alias environment.
#[derive(Debug, Clone)]
pub enum AliasEntry {
    /// A FROM-clause table reference: the set of catalog tables the alias stands for.
    /// A plain `FROM t` resolves to exactly one table; kept as a `Vec` so a CTE/subquery
    /// scope that unions branches can still use the same representation internally.
    Base(Vec<TableId>),
    /// A CTE or inline subquery: the tables transitively referenced, plus its fully
    /// bound, ordered projected-column list.
    Scoped {
        tables: Vec<TableId>,
        projected: Vec<ProjectedColumn>,
    },
}

impl AliasEntry {
    pub fn tables(&self) -> &[TableId] {
        match self {
            AliasEntry::Base(t) => t,
            AliasEntry::Scoped { tables, .. } => tables,
        }
    }
}

/// One exposed output column of a `ScopedAlias`.
#[derive(Debug, Clone)]
pub struct ProjectedColumn {
    pub exposed_name: String,
    pub underlying: Vec<ColumnId>,
}

/// Case-folded alias -> environment entry, preserving insertion order so star
/// expansion and "all candidate entries" iteration are deterministic.
#[derive(Debug, Clone, Default)]
pub struct AliasEnv {
    entries: IndexMap<String, AliasEntry>,
}

impl AliasEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an alias, case-folded. Returns the
    /// previous entry if the alias was already bound in this scope (callers use
    /// this to detect duplicate aliases).
    pub fn insert(&mut self, alias: &str, entry: AliasEntry) -> Option<AliasEntry> {
        self.entries.insert(alias.to_lowercase(), entry)
    }

    pub fn get(&self, alias: &str) -> Option<&AliasEntry> {
        self.entries.get(&alias.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AliasEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A fresh environment inheriting another scope's bindings, used when
    /// recursing into a CTE or subquery.
    pub fn inherit(outer: &AliasEnv) -> Self {
        outer.clone()
    }
}

/// A single bound output slot: an exposed alias paired with the non-empty set of
/// catalog columns that together feed it.
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub alias: String,
    pub columns: Vec<ColumnId>,
}

/// A fully bound DML statement, ready for edge extraction.
#[derive(Debug, Clone)]
pub struct BoundDml {
    pub target_table: TableId,
    pub target_columns: Vec<ColumnId>,
    pub bound_source_columns: Vec<BoundColumn>,
    pub source_tables: Vec<TableId>,
}
