//! The catalog / lineage store interface and its entities.
//!
//! This module is the narrow seam between the analyzer and whatever actually
//! persists the catalog — a real implementation would back `Catalog` with a
//! database; scanning live sources to populate it is explicitly out of scope.
//! [`InMemoryCatalog`] is a reference implementation used by tests
//! and embedders that don't need durability.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::dialect::Dialect;
use crate::error::{AnalysisError, Result};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

entity_id!(SourceId);
entity_id!(SchemaId);
entity_id!(TableId);
entity_id!(ColumnId);
entity_id!(JobId);
entity_id!(JobExecutionId);
entity_id!(LineageId);

#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub dialect: Dialect,
    pub default_schema: Option<SchemaId>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub id: SchemaId,
    pub source: SourceId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub id: TableId,
    pub schema: SchemaId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub id: ColumnId,
    pub table: TableId,
    pub name: String,
    pub data_type: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct JobContext(pub HashMap<String, String>);

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source: SourceId,
    pub name: String,
    pub context: JobContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct JobExecution {
    pub id: JobExecutionId,
    pub job: JobId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Default)]
pub struct LineageContext(pub HashMap<String, String>);

#[derive(Debug, Clone)]
pub struct ColumnLineage {
    pub id: LineageId,
    pub source_column: ColumnId,
    pub target_column: ColumnId,
    pub job_execution: JobExecutionId,
    pub context: LineageContext,
}

/// The store interface the analyzer drives. Each operation may
/// fail with a well-defined `NotFound`/`Ambiguous`/IO error via
/// [`AnalysisError`].
pub trait Catalog {
    fn search_table(&self, source: SourceId, schema: Option<&str>, table: &str) -> Result<TableId>;

    /// Ordered by `sort_order`; filtered to `names` (case-insensitive) when given.
    fn get_columns_for_table(&self, table: TableId, names: Option<&[String]>) -> Result<Vec<Column>>;

    fn get_schema(&self, source: SourceId, name: &str) -> Result<SchemaId>;

    fn add_table(&mut self, schema: SchemaId, name: &str) -> Result<TableId>;

    fn add_column(
        &mut self,
        table: TableId,
        name: &str,
        data_type: &str,
        sort_order: i32,
    ) -> Result<ColumnId>;

    fn add_job(&mut self, source: SourceId, name: &str, context: JobContext) -> Result<JobId>;

    fn add_job_execution(
        &mut self,
        job: JobId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        status: JobStatus,
    ) -> Result<JobExecutionId>;

    /// Idempotent on the natural key `(source_column, target_column, job_execution)`.
    fn add_column_lineage(
        &mut self,
        source_column: ColumnId,
        target_column: ColumnId,
        job_execution: JobExecutionId,
        context: LineageContext,
    ) -> Result<LineageId>;

    fn source_default_schema(&self, source: SourceId) -> Result<Option<SchemaId>>;

    // --- plain read accessors the binder/dispatcher/extractor need; every
    // real store needs equivalents of these regardless. ---

    fn source(&self, source: SourceId) -> Result<Source>;
    fn table(&self, table: TableId) -> Result<Table>;
    fn column(&self, column: ColumnId) -> Result<Column>;

    /// Scoped acquisition of a writable session: all writes for one
    /// query happen between `begin_transaction` and `commit`, with guaranteed
    /// rollback on any exit path that isn't a successful commit.
    fn begin_transaction(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
}

/// Runs `f` inside a catalog transaction, rolling back on error or early
/// return and committing only on success.
pub fn in_transaction<C, T>(catalog: &mut C, f: impl FnOnce(&mut C) -> Result<T>) -> Result<T>
where
    C: Catalog,
{
    catalog.begin_transaction()?;
    match f(catalog) {
        Ok(value) => {
            catalog.commit()?;
            Ok(value)
        }
        Err(err) => {
            catalog.rollback()?;
            Err(err)
        }
    }
}

/// A simple in-process reference implementation of [`Catalog`], suitable for
/// tests and for embedders who don't need the catalog to outlive the process.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    sources: HashMap<SourceId, Source>,
    schemas: HashMap<SchemaId, Schema>,
    tables: HashMap<TableId, Table>,
    columns: HashMap<ColumnId, Column>,
    jobs: HashMap<JobId, Job>,
    job_executions: HashMap<JobExecutionId, JobExecution>,
    lineage: HashMap<(ColumnId, ColumnId, JobExecutionId), LineageId>,
    next_id: u64,
    checkpoint: Option<Box<InMemoryCatalogSnapshot>>,
}

#[derive(Debug, Clone)]
struct InMemoryCatalogSnapshot {
    sources: HashMap<SourceId, Source>,
    schemas: HashMap<SchemaId, Schema>,
    tables: HashMap<TableId, Table>,
    columns: HashMap<ColumnId, Column>,
    jobs: HashMap<JobId, Job>,
    job_executions: HashMap<JobExecutionId, JobExecution>,
    lineage: HashMap<(ColumnId, ColumnId, JobExecutionId), LineageId>,
    next_id: u64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_source(&mut self, name: &str, dialect: Dialect) -> SourceId {
        let id = SourceId(self.fresh_id());
        self.sources.insert(
            id,
            Source {
                id,
                name: name.to_string(),
                dialect,
                default_schema: None,
            },
        );
        id
    }

    pub fn set_default_schema(&mut self, source: SourceId, schema: SchemaId) {
        if let Some(s) = self.sources.get_mut(&source) {
            s.default_schema = Some(schema);
        }
    }

    pub fn add_schema(&mut self, source: SourceId, name: &str) -> SchemaId {
        let id = SchemaId(self.fresh_id());
        self.schemas.insert(
            id,
            Schema {
                id,
                source,
                name: name.to_string(),
            },
        );
        id
    }

    /// Convenience used by tests to seed a table with columns in one call.
    pub fn add_table_with_columns(
        &mut self,
        schema: SchemaId,
        table_name: &str,
        columns: &[&str],
    ) -> TableId {
        let table = self.add_table(schema, table_name).expect("add_table");
        for (idx, col) in columns.iter().enumerate() {
            self.add_column(table, col, "varchar", idx as i32)
                .expect("add_column");
        }
        table
    }

    fn schema_tables(&self, schema: SchemaId) -> impl Iterator<Item = &Table> {
        self.tables.values().filter(move |t| t.schema == schema)
    }

    /// All lineage edges recorded so far, as `(source_column, target_column)`
    /// name pairs, for inspection by tests and embedders.
    pub fn lineage_edges(&self) -> Vec<(String, String)> {
        self.lineage
            .keys()
            .map(|(src, dst, _)| {
                let src = &self.columns[src];
                let dst = &self.columns[dst];
                (
                    format!("{}.{}", self.tables[&src.table].name, src.name),
                    format!("{}.{}", self.tables[&dst.table].name, dst.name),
                )
            })
            .collect()
    }
}

impl Catalog for InMemoryCatalog {
    fn search_table(&self, source: SourceId, schema: Option<&str>, table: &str) -> Result<TableId> {
        let table_lower = table.to_lowercase();
        let mut matches: Vec<&Table> = Vec::new();

        for sch in self.schemas.values().filter(|s| s.source == source) {
            if let Some(schema_name) = schema {
                if !sch.name.eq_ignore_ascii_case(schema_name) {
                    continue;
                }
            }
            for t in self.schema_tables(sch.id) {
                if t.name.to_lowercase() == table_lower {
                    matches.push(t);
                }
            }
        }

        match matches.len() {
            1 => Ok(matches[0].id),
            0 => Err(AnalysisError::table_not_found(table, Vec::new())),
            _ => {
                let candidates = matches.iter().map(|t| t.name.clone()).collect();
                Err(AnalysisError::table_not_found(table, candidates))
            }
        }
    }

    fn get_columns_for_table(&self, table: TableId, names: Option<&[String]>) -> Result<Vec<Column>> {
        let mut cols: Vec<Column> = self
            .columns
            .values()
            .filter(|c| c.table == table)
            .cloned()
            .collect();
        cols.sort_by_key(|c| c.sort_order);

        if let Some(names) = names {
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                let found = cols
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .ok_or_else(|| AnalysisError::column_not_found(name.clone(), Vec::new()))?;
                out.push(found);
            }
            Ok(out)
        } else {
            Ok(cols)
        }
    }

    fn get_schema(&self, source: SourceId, name: &str) -> Result<SchemaId> {
        self.schemas
            .values()
            .find(|s| s.source == source && s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id)
            .ok_or_else(|| AnalysisError::SchemaNotFound {
                source_name: source.0.to_string(),
                name: name.to_string(),
            })
    }

    fn add_table(&mut self, schema: SchemaId, name: &str) -> Result<TableId> {
        let id = TableId(self.fresh_id());
        self.tables.insert(
            id,
            Table {
                id,
                schema,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    fn add_column(
        &mut self,
        table: TableId,
        name: &str,
        data_type: &str,
        sort_order: i32,
    ) -> Result<ColumnId> {
        let id = ColumnId(self.fresh_id());
        self.columns.insert(
            id,
            Column {
                id,
                table,
                name: name.to_string(),
                data_type: data_type.to_string(),
                sort_order,
            },
        );
        Ok(id)
    }

    fn add_job(&mut self, source: SourceId, name: &str, context: JobContext) -> Result<JobId> {
        let id = JobId(self.fresh_id());
        self.jobs.insert(
            id,
            Job {
                id,
                source,
                name: name.to_string(),
                context,
            },
        );
        Ok(id)
    }

    fn add_job_execution(
        &mut self,
        job: JobId,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        status: JobStatus,
    ) -> Result<JobExecutionId> {
        let id = JobExecutionId(self.fresh_id());
        self.job_executions.insert(
            id,
            JobExecution {
                id,
                job,
                started_at,
                ended_at,
                status,
            },
        );
        Ok(id)
    }

    fn add_column_lineage(
        &mut self,
        source_column: ColumnId,
        target_column: ColumnId,
        job_execution: JobExecutionId,
        context: LineageContext,
    ) -> Result<LineageId> {
        let key = (source_column, target_column, job_execution);
        if let Some(existing) = self.lineage.get(&key) {
            return Ok(*existing);
        }
        let id = LineageId(self.fresh_id());
        self.lineage.insert(key, id);
        let _ = context; // natural key already encodes the edge; context is informational
        Ok(id)
    }

    fn source_default_schema(&self, source: SourceId) -> Result<Option<SchemaId>> {
        Ok(self.sources.get(&source).and_then(|s| s.default_schema))
    }

    fn source(&self, source: SourceId) -> Result<Source> {
        self.sources
            .get(&source)
            .cloned()
            .ok_or_else(|| AnalysisError::SourceNotFound {
                name: source.0.to_string(),
            })
    }

    fn table(&self, table: TableId) -> Result<Table> {
        self.tables
            .get(&table)
            .cloned()
            .ok_or_else(|| AnalysisError::table_not_found(table.0.to_string(), Vec::new()))
    }

    fn column(&self, column: ColumnId) -> Result<Column> {
        self.columns
            .get(&column)
            .cloned()
            .ok_or_else(|| AnalysisError::column_not_found(column.0.to_string(), Vec::new()))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.checkpoint = Some(Box::new(InMemoryCatalogSnapshot {
            sources: self.sources.clone(),
            schemas: self.schemas.clone(),
            tables: self.tables.clone(),
            columns: self.columns.clone(),
            jobs: self.jobs.clone(),
            job_executions: self.job_executions.clone(),
            lineage: self.lineage.clone(),
            next_id: self.next_id,
        }));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.checkpoint = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.checkpoint.take() {
            self.sources = snapshot.sources;
            self.schemas = snapshot.schemas;
            self.tables = snapshot.tables;
            self.columns = snapshot.columns;
            self.jobs = snapshot.jobs;
            self.job_executions = snapshot.job_executions;
            self.lineage = snapshot.lineage;
            self.next_id = snapshot.next_id;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (InMemoryCatalog, SourceId, SchemaId) {
        let mut cat = InMemoryCatalog::new();
        let source = cat.add_source("test", Dialect::Generic);
        let schema = cat.add_schema(source, "default");
        cat.set_default_schema(source, schema);
        (cat, source, schema)
    }

    #[test]
    fn search_table_finds_unique_match() {
        let (mut cat, source, schema) = seeded();
        let page = cat.add_table_with_columns(schema, "page", &["page_id", "page_title"]);
        assert_eq!(cat.search_table(source, None, "page").unwrap(), page);
    }

    #[test]
    fn search_table_reports_not_found() {
        let (cat, source, _schema) = seeded();
        let err = cat.search_table(source, None, "missing").unwrap_err();
        assert!(matches!(err, AnalysisError::TableNotFound { .. }));
    }

    #[test]
    fn columns_ordered_by_sort_order() {
        let (mut cat, _source, schema) = seeded();
        let table = cat.add_table_with_columns(schema, "t", &["b", "a", "c"]);
        let cols = cat.get_columns_for_table(table, None).unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn lineage_insert_is_idempotent() {
        let (mut cat, source, schema) = seeded();
        let t = cat.add_table_with_columns(schema, "t", &["a", "b"]);
        let cols = cat.get_columns_for_table(t, None).unwrap();
        let job = cat.add_job(source, "job", JobContext::default()).unwrap();
        let now = Utc::now();
        let exec = cat
            .add_job_execution(job, now, now, JobStatus::Success)
            .unwrap();
        let id1 = cat
            .add_column_lineage(cols[0].id, cols[1].id, exec, LineageContext::default())
            .unwrap();
        let id2 = cat
            .add_column_lineage(cols[0].id, cols[1].id, exec, LineageContext::default())
            .unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn rollback_restores_prior_state() {
        let (mut cat, _source, schema) = seeded();
        cat.begin_transaction().unwrap();
        cat.add_table(schema, "temp").unwrap();
        cat.rollback().unwrap();
        assert!(cat.search_table(_source, None, "temp").is_err());
    }
}
