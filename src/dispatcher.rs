//! The DML Dispatcher: classifies a parsed statement, resolves or
//! creates the insert target, and drives the binder over the statement's
//! query body.

use sqlparser::ast::{Query, SetExpr, Statement, TableObject};

use crate::binder::{self, AliasGen};
use crate::catalog::{Catalog, ColumnId, SourceId, TableId};
use crate::dialect::Dialect;
use crate::error::{AnalysisError, Result};
use crate::model::{AliasEnv, BoundDml};

enum DmlShape<'a> {
    InsertSelect {
        target: String,
        explicit_columns: Option<Vec<String>>,
        query: &'a Query,
    },
    SelectInto { target: String, query: &'a Query },
    Ctas {
        target: String,
        explicit_columns: Option<Vec<String>>,
        query: &'a Query,
    },
}

/// `WITH x AS (...) INSERT INTO ...` parses as a top-level `Query` whose body
/// is `SetExpr::Insert(insert_stmt)`, with the CTEs attached to the *outer*
/// query rather than the insert's own source. Peels that wrapper off so
/// `classify` always sees the real DML statement, and returns the outer
/// query (if any) so its CTEs can be bound ahead of the inner one.
fn unwrap_with(stmt: &Statement) -> (Option<&Query>, &Statement) {
    if let Statement::Query(query) = stmt {
        if let SetExpr::Insert(inner) = query.body.as_ref() {
            return (Some(query), inner);
        }
    }
    (None, stmt)
}

/// Tries the three DML shapes in order.
fn classify(stmt: &Statement) -> Result<DmlShape<'_>> {
    if let Statement::Insert(insert) = stmt {
        if let (Some(query), TableObject::TableName(name)) = (&insert.source, &insert.table) {
            let explicit_columns = if insert.columns.is_empty() {
                None
            } else {
                Some(insert.columns.iter().map(|i| i.value.clone()).collect())
            };
            return Ok(DmlShape::InsertSelect {
                target: name.to_string(),
                explicit_columns,
                query: query.as_ref(),
            });
        }
    }

    if let Statement::Query(query) = stmt {
        if let SetExpr::Select(select) = query.body.as_ref() {
            if let Some(into) = &select.into {
                return Ok(DmlShape::SelectInto {
                    target: into.name.to_string(),
                    query: query.as_ref(),
                });
            }
        }
    }

    if let Statement::CreateTable(ct) = stmt {
        if let Some(query) = &ct.query {
            let explicit_columns = if ct.columns.is_empty() {
                None
            } else {
                Some(ct.columns.iter().map(|c| c.name.value.clone()).collect())
            };
            return Ok(DmlShape::Ctas {
                target: ct.name.to_string(),
                explicit_columns,
                query: query.as_ref(),
            });
        }
    }

    Err(AnalysisError::SemanticError("Query is not a DML Query".to_string()))
}

/// Classifies `stmt`, binds its query body, resolves (or for CTAS, creates)
/// the target, and returns a fully bound DML ready for extraction.
pub fn dispatch<C: Catalog>(
    catalog: &mut C,
    source: SourceId,
    dialect: Dialect,
    stmt: &Statement,
) -> Result<BoundDml> {
    let (outer_query, inner_stmt) = unwrap_with(stmt);
    let shape = classify(inner_stmt)?;
    let (target_name, explicit_columns, query, is_ctas) = match shape {
        DmlShape::InsertSelect {
            target,
            explicit_columns,
            query,
        } => (target, explicit_columns, query, false),
        DmlShape::SelectInto { target, query } => (target, None, query, false),
        DmlShape::Ctas {
            target,
            explicit_columns,
            query,
        } => (target, explicit_columns, query, true),
    };

    let mut alias_gen = AliasGen::new();
    let outer_env = binder::bind_ctes(
        &*catalog,
        source,
        dialect,
        outer_query.and_then(|q| q.with.as_ref()),
        &AliasEnv::new(),
        &mut alias_gen,
    )?;
    let bound = binder::bind_query(&*catalog, source, dialect, query, &outer_env, &mut alias_gen)?;

    let (target_table, target_columns) = if is_ctas {
        resolve_ctas_target(catalog, source, &target_name, explicit_columns)?
    } else {
        resolve_existing_target(catalog, source, &target_name, explicit_columns)?
    };

    if target_columns.len() != bound.bound_columns.len() {
        return Err(AnalysisError::SemanticError(format!(
            "arity mismatch: target has {} column(s) but the query projects {}",
            target_columns.len(),
            bound.bound_columns.len()
        )));
    }

    Ok(BoundDml {
        target_table,
        target_columns,
        bound_source_columns: bound.bound_columns,
        source_tables: bound.source_tables,
    })
}

fn resolve_existing_target<C: Catalog>(
    catalog: &C,
    source: SourceId,
    name: &str,
    explicit_columns: Option<Vec<String>>,
) -> Result<(TableId, Vec<ColumnId>)> {
    let (schema, table_name) = split_target(name);
    let table = catalog.search_table(source, schema.as_deref(), &table_name)?;
    let columns = catalog.get_columns_for_table(table, explicit_columns.as_deref())?;
    Ok((table, columns.into_iter().map(|c| c.id).collect()))
}

/// Resolves an existing CTAS target, or creates it on the fly in the
/// source's default schema when it doesn't exist.
fn resolve_ctas_target<C: Catalog>(
    catalog: &mut C,
    source: SourceId,
    name: &str,
    explicit_columns: Option<Vec<String>>,
) -> Result<(TableId, Vec<ColumnId>)> {
    let (schema, table_name) = split_target(name);

    match catalog.search_table(source, schema.as_deref(), &table_name) {
        Ok(table) => {
            let columns = catalog.get_columns_for_table(table, explicit_columns.as_deref())?;
            Ok((table, columns.into_iter().map(|c| c.id).collect()))
        }
        Err(AnalysisError::TableNotFound { .. }) => {
            let schema_id = match &schema {
                Some(s) => catalog.get_schema(source, s)?,
                None => catalog.source_default_schema(source)?.ok_or_else(|| {
                    AnalysisError::SemanticError(format!(
                        "source has no default schema for unqualified CTAS target {name}"
                    ))
                })?,
            };
            let table = catalog.add_table(schema_id, &table_name)?;
            let mut columns = Vec::new();
            for (idx, col_name) in explicit_columns.unwrap_or_default().iter().enumerate() {
                let col = catalog.add_column(table, col_name, "varchar", idx as i32 + 1)?;
                columns.push(col);
            }
            Ok((table, columns))
        }
        Err(other) => Err(other),
    }
}

fn split_target(name: &str) -> (Option<String>, String) {
    let parts: Vec<&str> = name.split('.').map(|p| p.trim_matches('"')).collect();
    if parts.len() >= 2 {
        (
            Some(parts[parts.len() - 2].to_string()),
            parts.last().unwrap().to_string(),
        )
    } else {
        (None, parts[0].to_string())
    }
}
