//! Top-level orchestration:
//! parse → dispatch → extract, single queries or an independent batch.

use chrono::Utc;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::catalog::{self, Catalog, SourceId};
use crate::dialect::Dialect;
use crate::dispatcher;
use crate::error::{AnalysisError, Result};
use crate::extractor::{self, QueryOutcome};

/// Postgres-only operators that a generic-dialect parse can't handle; seeing
/// one of these after a failed parse is worth a retry against
/// `PostgreSqlDialect` before giving up.
const POSTGRES_ONLY_OPERATORS: [&str; 3] = ["::", "->", "?|"];

/// Parses `sql` against `dialect`, retrying once against `PostgreSqlDialect`
/// when the generic parse fails and the text looks like it leans on a
/// Postgres-only operator.
fn parse_with_fallback(dialect: Dialect, sql: &str) -> Result<Vec<Statement>> {
    match Parser::parse_sql(&*dialect.to_sqlparser_dialect(), sql) {
        Ok(statements) => Ok(statements),
        Err(first_err) => {
            if dialect == Dialect::Generic && POSTGRES_ONLY_OPERATORS.iter().any(|op| sql.contains(op)) {
                if let Ok(statements) = Parser::parse_sql(&PostgreSqlDialect {}, sql) {
                    return Ok(statements);
                }
            }
            Err(AnalysisError::syntax(first_err.to_string()))
        }
    }
}

/// Parses and analyzes a single SQL statement against `source`'s dialect,
/// writing a Job/JobExecution and the lineage edges it implies inside one
/// catalog transaction.
pub fn analyze_query<C: Catalog>(
    catalog: &mut C,
    source: SourceId,
    sql: &str,
    job_name: Option<&str>,
) -> Result<QueryOutcome> {
    let src = catalog.source(source)?;
    let dialect = src.dialect;

    let statements = parse_with_fallback(dialect, sql)?;
    let stmt = statements
        .first()
        .ok_or_else(|| AnalysisError::SemanticError("empty query".to_string()))?;

    catalog::in_transaction(catalog, |cat| {
        let bound = dispatcher::dispatch(cat, source, dialect, stmt)?;
        let started_at = Utc::now();
        let ended_at = Utc::now();
        extractor::extract(cat, source, sql, job_name, started_at, ended_at, bound)
    })
}

/// The per-query result of a batch run: syntax failures are
/// distinguished from semantic/binding failures so callers can tell
/// "skipped" apart from "aborted".
#[derive(Debug)]
pub enum BatchOutcome {
    Analyzed { query_index: usize, outcome: QueryOutcome },
    SyntaxSkipped { query_index: usize, error: AnalysisError },
    Aborted { query_index: usize, error: AnalysisError },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Analyzed { .. }))
            .count()
    }
}

/// Analyzes an independent sequence of query strings: a syntax
/// failure on one query is logged and skipped; a semantic/binding failure
/// aborts only that query. Either way the rest of the batch proceeds, in
/// input order.
pub fn analyze_batch<C: Catalog>(catalog: &mut C, source: SourceId, queries: &[&str]) -> BatchReport {
    let mut outcomes = Vec::with_capacity(queries.len());

    for (query_index, sql) in queries.iter().enumerate() {
        match analyze_query(catalog, source, sql, None) {
            Ok(outcome) => outcomes.push(BatchOutcome::Analyzed { query_index, outcome }),
            Err(error @ AnalysisError::SyntaxError { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(query_index, %error, "skipping query with syntax error");
                outcomes.push(BatchOutcome::SyntaxSkipped { query_index, error });
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(query_index, %error, "aborting query");
                outcomes.push(BatchOutcome::Aborted { query_index, error });
            }
        }
    }

    BatchReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::dialect::Dialect;

    fn seeded() -> (InMemoryCatalog, SourceId) {
        let mut cat = InMemoryCatalog::new();
        let source = cat.add_source("test", Dialect::Generic);
        let schema = cat.add_schema(source, "default");
        cat.set_default_schema(source, schema);
        cat.add_table_with_columns(schema, "page", &["page_id", "page_title", "page_latest"]);
        cat.add_table_with_columns(
            schema,
            "page_lookup_nonredirect",
            &["redirect_id", "redirect_title", "true_title", "page_id", "page_version"],
        );
        (cat, source)
    }

    #[test]
    fn postgres_only_operator_falls_back_to_postgres_dialect() {
        let (mut cat, source) = seeded();
        let outcome = analyze_query(
            &mut cat,
            source,
            "INSERT INTO page_lookup_nonredirect SELECT page.page_id, page.page_title, page.page_title, page.page_id, page.page_latest FROM page WHERE page.page_title::jsonb ?| array['x']",
            None,
        )
        .unwrap();
        assert_eq!(outcome.edges_written, 5);
    }

    #[test]
    fn analyze_query_writes_five_edges() {
        let (mut cat, source) = seeded();
        let outcome = analyze_query(
            &mut cat,
            source,
            "INSERT INTO page_lookup_nonredirect SELECT page.page_id, page.page_title, page.page_title, page.page_id, page.page_latest FROM page",
            None,
        )
        .unwrap();
        assert_eq!(outcome.edges_written, 5);
    }

    #[test]
    fn batch_skips_syntax_errors_and_continues() {
        let (mut cat, source) = seeded();
        let queries = [
            "INSERT INTO page_lookup_nonredirect SELEKT * FROM page",
            "INSERT INTO page_lookup_nonredirect SELECT page.page_id, page.page_title, page.page_title, page.page_id, page.page_latest FROM page",
        ];
        let report = analyze_batch(&mut cat, source, &queries);
        assert!(matches!(report.outcomes[0], BatchOutcome::SyntaxSkipped { .. }));
        assert!(matches!(report.outcomes[1], BatchOutcome::Analyzed { .. }));
        assert_eq!(report.succeeded(), 1);
    }

    #[test]
    fn transaction_rolls_back_ctas_target_on_later_failure() {
        let (mut cat, _source) = seeded();
        // No default schema set on this source: CTAS on an unqualified,
        // not-yet-existing target must fail and leave the catalog unchanged.
        let isolated = cat.add_source("isolated", Dialect::Generic);
        let isolated_schema = cat.add_schema(isolated, "s");
        cat.add_table_with_columns(isolated_schema, "src", &["redirect_title"]);

        let err = analyze_query(
            &mut cat,
            isolated,
            "CREATE TABLE temp_x (page_title varchar) AS SELECT redirect_title FROM src",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::SemanticError(_)));
        assert!(cat.search_table(isolated, None, "temp_x").is_err());
    }
}
