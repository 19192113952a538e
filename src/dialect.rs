//! Dialect selection: a closed enumeration, not open polymorphism.
//!
//! A `Source`'s dialect picks the [`crate::expr::ExpressionVisitor`] variant;
//! it never affects table/column resolution.

use sqlparser::dialect::{Dialect as SqlDialect, GenericDialect, PostgreSqlDialect};

/// The closed set of dialects this analyzer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Generic,
    /// A warehouse-style dialect with `dateadd(unit, n, value)` lineage semantics.
    RedshiftLike,
}

impl Dialect {
    pub fn to_sqlparser_dialect(self) -> Box<dyn SqlDialect> {
        match self {
            Dialect::Generic => Box::new(GenericDialect {}),
            // sqlparser has no dedicated Redshift dialect; Postgres is its closest
            // documented ancestor for COPY/UNLOAD-era warehouse SQL.
            Dialect::RedshiftLike => Box::new(PostgreSqlDialect {}),
        }
    }
}

/// Argument indices of `func_name` that do not carry column lineage under
/// `dialect` (the Redshift-like `dateadd` exception, generalized the
/// way `flowscope-core`'s `skip_args_for_function` is: keyed by dialect and
/// function name rather than hardcoded to one call site).
pub fn skip_args_for_function(dialect: Dialect, func_name: &str) -> &'static [usize] {
    match (dialect, func_name.to_lowercase().as_str()) {
        (Dialect::RedshiftLike, "dateadd") => &[0, 1],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dateadd_skips_unit_and_offset_only_for_redshift_like() {
        assert_eq!(skip_args_for_function(Dialect::RedshiftLike, "dateadd"), &[0, 1]);
        assert_eq!(skip_args_for_function(Dialect::RedshiftLike, "DATEADD"), &[0, 1]);
        assert_eq!(skip_args_for_function(Dialect::Generic, "dateadd"), &[] as &[usize]);
    }

    #[test]
    fn unrelated_functions_skip_nothing() {
        assert_eq!(
            skip_args_for_function(Dialect::RedshiftLike, "to_char"),
            &[] as &[usize]
        );
    }
}
