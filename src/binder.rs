//! The Name Resolver / Binder: resolves source tables against the
//! catalog, builds an alias environment, then resolves each projected
//! expression's column references against it.

use sqlparser::ast::{Query, With};

use crate::catalog::{Catalog, ColumnId, SourceId, TableId};
use crate::dialect::Dialect;
use crate::error::{AnalysisError, Result};
use crate::model::{AliasEntry, AliasEnv, BoundColumn, ColumnRef, ProjectedColumn, ProjectedExpr};
use crate::projection::{self, TableRef};

/// Produces unique synthetic aliases (`_U0`, `_U1`, ...) for projections with
/// no explicit or inferable name.
#[derive(Debug, Default)]
pub struct AliasGen {
    next: usize,
}

impl AliasGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_alias(&mut self) -> String {
        let alias = format!("_U{}", self.next);
        self.next += 1;
        alias
    }
}

/// The fully bound result of one query (or one CTE body): the projected
/// columns paired with the union of tables discovered while binding them.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    pub bound_columns: Vec<BoundColumn>,
    pub source_tables: Vec<TableId>,
}

/// Binds `with`'s CTEs in textual order, folding each into `inherited` so
/// later CTEs (or the main body) can reference earlier ones.
pub fn bind_ctes<C: Catalog>(
    catalog: &C,
    source: SourceId,
    dialect: Dialect,
    with: Option<&With>,
    inherited: &AliasEnv,
    alias_gen: &mut AliasGen,
) -> Result<AliasEnv> {
    let mut env = AliasEnv::inherit(inherited);

    for (cte_name, cte_query) in projection::collect_ctes(with) {
        let bound_cte = bind_query(catalog, source, dialect, cte_query, &env, alias_gen)?;
        env.insert(
            &cte_name,
            AliasEntry::Scoped {
                tables: bound_cte.source_tables,
                projected: bound_cte
                    .bound_columns
                    .into_iter()
                    .map(|c| ProjectedColumn {
                        exposed_name: c.alias,
                        underlying: c.columns,
                    })
                    .collect(),
            },
        );
    }

    Ok(env)
}

/// Binds a full query: CTEs first in textual order, then the
/// main body's branches, merged.
pub fn bind_query<C: Catalog>(
    catalog: &C,
    source: SourceId,
    dialect: Dialect,
    query: &Query,
    inherited: &AliasEnv,
    alias_gen: &mut AliasGen,
) -> Result<BoundQuery> {
    let env = bind_ctes(catalog, source, dialect, query.with.as_ref(), inherited, alias_gen)?;

    let branches = projection::collect_query_branches(&query.body, dialect);
    if branches.is_empty() {
        return Err(AnalysisError::SemanticError(
            "query has no SELECT body to bind".to_string(),
        ));
    }

    let mut branch_results = Vec::with_capacity(branches.len());
    for branch in &branches {
        let branch_env = bind_tables(catalog, source, dialect, &branch.sources, &env, alias_gen)?;
        let result = bind_columns(catalog, &branch_env, &branch.projections, alias_gen)?;
        branch_results.push(result);
    }

    merge_branches(branch_results)
}

/// Merges the independently-bound branches of a set operation: source tables
/// union, output columns paired positionally with their underlying catalog
/// columns unioned per position.
fn merge_branches(branches: Vec<BoundQuery>) -> Result<BoundQuery> {
    let width = branches[0].bound_columns.len();
    for branch in &branches {
        if branch.bound_columns.len() != width {
            return Err(AnalysisError::SemanticError(format!(
                "set operation branches project differing column counts ({} vs {})",
                width,
                branch.bound_columns.len()
            )));
        }
    }

    let mut source_tables = Vec::new();
    for branch in &branches {
        for t in &branch.source_tables {
            if !source_tables.contains(t) {
                source_tables.push(*t);
            }
        }
    }

    let mut bound_columns = Vec::with_capacity(width);
    for idx in 0..width {
        let alias = branches[0].bound_columns[idx].alias.clone();
        let mut columns = Vec::new();
        for branch in &branches {
            for c in &branch.bound_columns[idx].columns {
                if !columns.contains(c) {
                    columns.push(*c);
                }
            }
        }
        bound_columns.push(BoundColumn { alias, columns });
    }

    Ok(BoundQuery {
        bound_columns,
        source_tables,
    })
}

/// Table binding: resolves each FROM-clause entry to catalog tables or an
/// inherited/subquery scope.
pub fn bind_tables<C: Catalog>(
    catalog: &C,
    source: SourceId,
    dialect: Dialect,
    tables: &[TableRef<'_>],
    inherited: &AliasEnv,
    alias_gen: &mut AliasGen,
) -> Result<AliasEnv> {
    let mut env = AliasEnv::inherit(inherited);

    for t in tables {
        match t {
            TableRef::Base { name, alias } => {
                let parts = split_qualified(name);

                if parts.len() == 1 {
                    if let Some(entry) = inherited.get(&parts[0]).cloned() {
                        // Reuse the inherited (CTE/subquery) binding as-is for
                        // the bare reference. An explicit alias still needs to
                        // resolve, so register a copy under it.
                        if let Some(explicit_alias) = alias {
                            env.insert(explicit_alias, entry);
                        }
                        continue;
                    }
                }

                let schema = if parts.len() >= 2 {
                    Some(parts[parts.len() - 2].as_str())
                } else {
                    None
                };
                let table_name = parts.last().expect("non-empty qualified name");

                let table_id = catalog
                    .search_table(source, schema, table_name)
                    .map_err(|e| rewrap_not_found(e, name))?;

                let alias_key = alias.clone().unwrap_or_else(|| match schema {
                    Some(s) => format!("{s}.{table_name}"),
                    None => table_name.clone(),
                });
                env.insert(&alias_key, AliasEntry::Base(vec![table_id]));
            }
            TableRef::Subquery { query, alias } => {
                let bound = bind_query(catalog, source, dialect, query, &env, alias_gen)?;
                env.insert(
                    alias,
                    AliasEntry::Scoped {
                        tables: bound.source_tables,
                        projected: bound
                            .bound_columns
                            .into_iter()
                            .map(|c| ProjectedColumn {
                                exposed_name: c.alias,
                                underlying: c.columns,
                            })
                            .collect(),
                    },
                );
            }
        }
    }

    Ok(env)
}

fn rewrap_not_found(err: AnalysisError, sought: &str) -> AnalysisError {
    match err {
        AnalysisError::TableNotFound { candidates, .. } => AnalysisError::TableNotFound {
            sought: sought.to_string(),
            candidates,
        },
        other => other,
    }
}

fn split_qualified(name: &str) -> Vec<String> {
    name.split('.')
        .map(|p| p.trim_matches('"').to_string())
        .collect()
}

/// Column binding: resolves each projected expression's column references
/// against the alias environment.
pub fn bind_columns<C: Catalog>(
    catalog: &C,
    env: &AliasEnv,
    projections: &[ProjectedExpr],
    alias_gen: &mut AliasGen,
) -> Result<BoundQuery> {
    let mut bound = Vec::with_capacity(projections.len());
    let mut source_tables: Vec<TableId> = Vec::new();

    for proj in projections {
        if proj.is_star {
            match &proj.columns[0] {
                ColumnRef::Star => {
                    for (_, entry) in env.iter() {
                        for (name, cols) in exposed_columns(catalog, entry)? {
                            record_tables(catalog, &cols, &mut source_tables)?;
                            bound.push(BoundColumn { alias: name, columns: cols });
                        }
                    }
                }
                ColumnRef::QualifiedStar(q) => {
                    let entry = env
                        .get(q)
                        .ok_or_else(|| AnalysisError::table_not_found(q.clone(), Vec::new()))?;
                    for (name, cols) in exposed_columns(catalog, entry)? {
                        record_tables(catalog, &cols, &mut source_tables)?;
                        bound.push(BoundColumn { alias: name, columns: cols });
                    }
                }
                _ => unreachable!("ProjectedExpr::is_star implies a star ColumnRef"),
            }
            continue;
        }

        let mut resolved: Vec<ColumnId> = Vec::new();
        let mut resolved_single_name: Option<String> = None;

        for cref in &proj.columns {
            match cref {
                ColumnRef::Qualified(q, c) => {
                    let entry = env
                        .get(q)
                        .ok_or_else(|| AnalysisError::table_not_found(q.clone(), Vec::new()))?;
                    let exposed = exposed_columns(catalog, entry)?;
                    let matches: Vec<_> = exposed.iter().filter(|(n, _)| n.eq_ignore_ascii_case(c)).collect();
                    match matches.len() {
                        1 => {
                            resolved_single_name = Some(c.clone());
                            resolved.extend(matches[0].1.clone());
                        }
                        0 => return Err(AnalysisError::column_not_found(format!("{q}.{c}"), Vec::new())),
                        _ => {
                            let candidates = exposed.iter().map(|(n, _)| format!("{q}.{n}")).collect();
                            return Err(AnalysisError::column_not_found(format!("{q}.{c}"), candidates));
                        }
                    }
                }
                ColumnRef::Unqualified(c) => {
                    let mut found: Vec<(String, Vec<ColumnId>)> = Vec::new();
                    for (alias_key, entry) in env.iter() {
                        for (n, cols) in exposed_columns(catalog, entry)? {
                            if n.eq_ignore_ascii_case(c) {
                                found.push((alias_key.to_string(), cols));
                            }
                        }
                    }
                    match found.len() {
                        1 => {
                            resolved_single_name = Some(c.clone());
                            resolved.extend(found.into_iter().next().unwrap().1);
                        }
                        0 => {
                            let candidates = env.iter().map(|(k, _)| k.to_string()).collect();
                            return Err(AnalysisError::column_not_found(c.clone(), candidates));
                        }
                        _ => {
                            let candidates = found.into_iter().map(|(q, _)| format!("{q}.{c}")).collect();
                            return Err(AnalysisError::column_not_found(c.clone(), candidates));
                        }
                    }
                }
                ColumnRef::Star | ColumnRef::QualifiedStar(_) => {
                    unreachable!("star refs only appear in star-flagged projections")
                }
            }
        }

        if resolved.is_empty() {
            return Err(AnalysisError::column_not_found(
                "No source columns found".to_string(),
                Vec::new(),
            ));
        }

        let mut dedup = Vec::new();
        for c in resolved {
            if !dedup.contains(&c) {
                dedup.push(c);
            }
        }
        record_tables(catalog, &dedup, &mut source_tables)?;

        let alias = proj
            .alias
            .clone()
            .or_else(|| {
                if proj.columns.len() == 1 {
                    resolved_single_name.clone()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| alias_gen.next_alias());

        bound.push(BoundColumn { alias, columns: dedup });
    }

    Ok(BoundQuery {
        bound_columns: bound,
        source_tables,
    })
}

fn record_tables<C: Catalog>(catalog: &C, cols: &[ColumnId], out: &mut Vec<TableId>) -> Result<()> {
    for col in cols {
        let table = catalog.column(*col)?.table;
        if !out.contains(&table) {
            out.push(table);
        }
    }
    Ok(())
}

fn exposed_columns<C: Catalog>(catalog: &C, entry: &AliasEntry) -> Result<Vec<(String, Vec<ColumnId>)>> {
    match entry {
        AliasEntry::Base(tables) => {
            let mut out = Vec::new();
            for t in tables {
                for col in catalog.get_columns_for_table(*t, None)? {
                    out.push((col.name.clone(), vec![col.id]));
                }
            }
            Ok(out)
        }
        AliasEntry::Scoped { projected, .. } => Ok(projected
            .iter()
            .map(|p| (p.exposed_name.clone(), p.underlying.clone()))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    fn seeded() -> (InMemoryCatalog, SourceId) {
        let mut cat = InMemoryCatalog::new();
        let source = cat.add_source("test", Dialect::Generic);
        let schema = cat.add_schema(source, "default");
        cat.set_default_schema(source, schema);
        cat.add_table_with_columns(schema, "page", &["page_id", "page_title", "page_latest"]);
        (cat, source)
    }

    #[test]
    fn binds_unqualified_table_and_column() {
        let (cat, source) = seeded();
        let mut gen = AliasGen::new();
        let sources = vec![TableRef::Base {
            name: "page".into(),
            alias: None,
        }];
        let env = bind_tables(&cat, source, Dialect::Generic, &sources, &AliasEnv::new(), &mut gen).unwrap();
        assert!(env.get("page").is_some());

        let projections = vec![ProjectedExpr {
            alias: None,
            columns: vec![ColumnRef::Unqualified("page_id".into())],
            is_star: false,
        }];
        let bound = bind_columns(&cat, &env, &projections, &mut gen).unwrap();
        assert_eq!(bound.bound_columns.len(), 1);
        assert_eq!(bound.bound_columns[0].alias, "page_id");
    }

    #[test]
    fn missing_table_reports_table_not_found() {
        let (cat, source) = seeded();
        let mut gen = AliasGen::new();
        let sources = vec![TableRef::Base {
            name: "missing_table".into(),
            alias: None,
        }];
        let err = bind_tables(&cat, source, Dialect::Generic, &sources, &AliasEnv::new(), &mut gen).unwrap_err();
        assert!(matches!(err, AnalysisError::TableNotFound { .. }));
    }

    #[test]
    fn star_expands_to_all_columns_in_order() {
        let (cat, source) = seeded();
        let mut gen = AliasGen::new();
        let sources = vec![TableRef::Base {
            name: "page".into(),
            alias: None,
        }];
        let env = bind_tables(&cat, source, Dialect::Generic, &sources, &AliasEnv::new(), &mut gen).unwrap();
        let projections = vec![ProjectedExpr {
            alias: None,
            columns: vec![ColumnRef::Star],
            is_star: true,
        }];
        let bound = bind_columns(&cat, &env, &projections, &mut gen).unwrap();
        let names: Vec<_> = bound.bound_columns.iter().map(|c| c.alias.clone()).collect();
        assert_eq!(names, vec!["page_id", "page_title", "page_latest"]);
    }

    #[test]
    fn ambiguous_unqualified_column_reports_candidates() {
        let (mut cat, source) = seeded();
        let schema = cat.get_schema(source, "default").unwrap();
        cat.add_table_with_columns(schema, "redirect", &["page_id", "rd_title"]);
        let mut gen = AliasGen::new();
        let sources = vec![
            TableRef::Base {
                name: "page".into(),
                alias: None,
            },
            TableRef::Base {
                name: "redirect".into(),
                alias: None,
            },
        ];
        let env = bind_tables(&cat, source, Dialect::Generic, &sources, &AliasEnv::new(), &mut gen).unwrap();
        let projections = vec![ProjectedExpr {
            alias: None,
            columns: vec![ColumnRef::Unqualified("page_id".into())],
            is_star: false,
        }];
        let err = bind_columns(&cat, &env, &projections, &mut gen).unwrap_err();
        assert!(matches!(err, AnalysisError::ColumnNotFound { .. }));
    }
}
