//! The Table/Projection Visitor: walks a `SelectStmt`, producing
//! its FROM-clause sources and its projected expressions.

use sqlparser::ast::{Query, Select, SelectItem, SetExpr, TableFactor, With};

use crate::dialect::Dialect;
use crate::expr::ExpressionVisitor;
use crate::model::{ColumnRef, ProjectedExpr};

/// A single entry from the FROM/JOIN tree: either a base-table reference or an
/// inline subquery.
#[derive(Debug)]
pub enum TableRef<'a> {
    /// `RangeVar`: a possibly schema-qualified table name with an optional
    /// explicit alias.
    Base {
        name: String,
        alias: Option<String>,
    },
    /// `RangeSubselect`: an inline subquery, which always carries a mandatory
    /// alias.
    Subquery { query: &'a Query, alias: String },
}

/// One independently-bindable projection branch: the sources and projected
/// expressions of a single `Select`. A plain query has exactly one branch; a
/// `UNION`/`INTERSECT`/`EXCEPT` query has one branch per leaf `Select`, each
/// bound independently and merged with the others by position.
#[derive(Debug)]
pub struct QueryBranch<'a> {
    pub sources: Vec<TableRef<'a>>,
    pub projections: Vec<ProjectedExpr>,
}

/// Walks one `Select`'s FROM tree and projection list.
pub fn visit_select<'a>(select: &'a Select, dialect: Dialect) -> QueryBranch<'a> {
    let mut sources = Vec::new();
    for twj in &select.from {
        collect_table_factor(&twj.relation, &mut sources);
        for join in &twj.joins {
            collect_table_factor(&join.relation, &mut sources);
        }
    }

    let visitor = ExpressionVisitor::new(dialect);
    let mut projections = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) => projections.push(visitor.visit(expr, None)),
            SelectItem::ExprWithAlias { expr, alias } => {
                projections.push(visitor.visit(expr, Some(alias.value.clone())))
            }
            SelectItem::QualifiedWildcard(name, _) => projections.push(ProjectedExpr {
                alias: None,
                columns: vec![ColumnRef::QualifiedStar(name.to_string())],
                is_star: true,
            }),
            SelectItem::Wildcard(_) => projections.push(ProjectedExpr {
                alias: None,
                columns: vec![ColumnRef::Star],
                is_star: true,
            }),
        }
    }

    QueryBranch { sources, projections }
}

fn collect_table_factor<'a>(tf: &'a TableFactor, out: &mut Vec<TableRef<'a>>) {
    match tf {
        TableFactor::Table { name, alias, .. } => {
            out.push(TableRef::Base {
                name: name.to_string(),
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            });
        }
        TableFactor::Derived { subquery, alias, .. } => {
            let alias_name = alias
                .as_ref()
                .expect("RangeSubselect requires a mandatory alias")
                .name
                .value
                .clone();
            out.push(TableRef::Subquery {
                query: subquery,
                alias: alias_name,
            });
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_table_factor(&table_with_joins.relation, out);
            for join in &table_with_joins.joins {
                collect_table_factor(&join.relation, out);
            }
        }
        _ => {}
    }
}

/// Recursively extracts the list of independently-bindable branches from a
/// query body.
pub fn collect_query_branches(body: &SetExpr, dialect: Dialect) -> Vec<QueryBranch<'_>> {
    match body {
        SetExpr::Select(select) => vec![visit_select(select, dialect)],
        SetExpr::Query(query) => collect_query_branches(&query.body, dialect),
        SetExpr::SetOperation { left, right, .. } => {
            let mut branches = collect_query_branches(left, dialect);
            branches.extend(collect_query_branches(right, dialect));
            branches
        }
        // VALUES/UPDATE/TABLE/nested-INSERT bodies contribute no table lineage
        // at this level: the statement contributes no lineage.
        _ => Vec::new(),
    }
}

/// CTE name -> its defining query, in textual order.
pub fn collect_ctes(with: Option<&With>) -> Vec<(String, &Query)> {
    with.map(|with| {
        with.cte_tables
            .iter()
            .map(|cte| (cte.alias.name.value.clone(), cte.query.as_ref()))
            .collect()
    })
    .unwrap_or_default()
}
