//! The Lineage Extractor: turns a bound DML into a Job,
//! JobExecution, and the edges it produced.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, JobContext, JobExecutionId, JobId, JobStatus, LineageContext, SourceId};
use crate::error::Result;
use crate::model::BoundDml;

/// Outcome of successfully extracting lineage for one query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub job: JobId,
    pub job_execution: JobExecutionId,
    pub edges_written: usize,
}

/// A deterministic fallback job name derived from the query text, used when
/// the caller supplies none.
pub fn deterministic_job_name(sql: &str) -> String {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    format!("query_{:016x}", hasher.finish())
}

/// Writes the Job, JobExecution, and edges for `bound`. Expects
/// to run inside a catalog transaction; the caller owns commit/rollback.
pub fn extract<C: Catalog>(
    catalog: &mut C,
    source: SourceId,
    sql: &str,
    job_name: Option<&str>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    bound: BoundDml,
) -> Result<QueryOutcome> {
    let name = job_name
        .map(str::to_string)
        .unwrap_or_else(|| deterministic_job_name(sql));

    let mut context = JobContext::default();
    context.0.insert("query".to_string(), sql.to_string());
    let job = catalog.add_job(source, &name, context)?;
    let job_execution = catalog.add_job_execution(job, started_at, ended_at, JobStatus::Success)?;

    let mut edges_written = 0;
    for (source_bound, target_column) in bound.bound_source_columns.iter().zip(bound.target_columns.iter()) {
        for col in &source_bound.columns {
            catalog.add_column_lineage(*col, *target_column, job_execution, LineageContext::default())?;
            edges_written += 1;
        }
    }

    Ok(QueryOutcome {
        job,
        job_execution,
        edges_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::dialect::Dialect;
    use crate::model::BoundColumn;

    #[test]
    fn deterministic_job_name_is_stable() {
        assert_eq!(deterministic_job_name("SELECT 1"), deterministic_job_name("SELECT 1"));
        assert_ne!(deterministic_job_name("SELECT 1"), deterministic_job_name("SELECT 2"));
    }

    #[test]
    fn extract_writes_one_edge_per_underlying_column() {
        let mut cat = InMemoryCatalog::new();
        let source = cat.add_source("test", Dialect::Generic);
        let schema = cat.add_schema(source, "default");
        let src_table = cat.add_table_with_columns(schema, "src", &["a", "b"]);
        let dst_table = cat.add_table_with_columns(schema, "dst", &["x"]);
        let src_cols = cat.get_columns_for_table(src_table, None).unwrap();
        let dst_cols = cat.get_columns_for_table(dst_table, None).unwrap();

        let bound = BoundDml {
            target_table: dst_table,
            target_columns: vec![dst_cols[0].id],
            bound_source_columns: vec![BoundColumn {
                alias: "x".to_string(),
                columns: vec![src_cols[0].id, src_cols[1].id],
            }],
            source_tables: vec![src_table],
        };

        let now = Utc::now();
        let outcome = extract(&mut cat, source, "INSERT INTO dst SELECT a, b FROM src", None, now, now, bound).unwrap();
        assert_eq!(outcome.edges_written, 2);
    }
}
