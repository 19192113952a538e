//! A uniform, tagged façade over whatever `sqlparser` hands back. Downstream
//! visitors touch only `tag`/`children`; the parser itself is an opaque
//! producer they never match on directly.
//!
//! The façade is deliberately thin: rather than mirror every
//! `sqlparser::ast` variant, it exposes only the handful of tags that matter
//! for expression descent, plus a uniform `children` fallback so an
//! unhandled tag still gets visited correctly.

use sqlparser::ast::{Expr, FunctionArg, FunctionArgExpr, FunctionArguments};

/// The closed tag set relevant to expression descent.
/// Anything not explicitly named collapses to `Other` and is visited purely
/// by descending into its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    ColumnRef,
    AStar,
    FuncCall,
    TypeCast,
    AExpr,
    Other,
}

/// Classifies an expression node into its façade tag.
pub fn tag(expr: &Expr) -> Tag {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => Tag::ColumnRef,
        Expr::Wildcard(_) | Expr::QualifiedWildcard(_, _) => Tag::AStar,
        Expr::Function(_) => Tag::FuncCall,
        Expr::Cast { .. } => Tag::TypeCast,
        Expr::BinaryOp { .. } => Tag::AExpr,
        _ => Tag::Other,
    }
}

/// The qualified function name, lowercased, e.g. `"dateadd"` or `"my_schema.f"`.
pub fn func_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Function(f) => Some(f.name.to_string().to_lowercase()),
        _ => None,
    }
}

/// Every argument expression of a `FuncCall`, in declared order. Named and
/// positional arguments are both included; `*` arguments (e.g. `count(*)`)
/// contribute nothing (there is no operand to descend into).
pub fn func_args(expr: &Expr) -> Vec<&Expr> {
    let Expr::Function(f) = expr else { return Vec::new() };
    let FunctionArguments::List(list) = &f.args else {
        return Vec::new();
    };
    list.args
        .iter()
        .filter_map(|arg| match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e))
            | FunctionArg::Named {
                arg: FunctionArgExpr::Expr(e),
                ..
            }
            | FunctionArg::ExprNamed {
                arg: FunctionArgExpr::Expr(e),
                ..
            } => Some(e),
            _ => None,
        })
        .collect()
}

/// The operand of a `TypeCast`.
pub fn cast_operand(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Cast { expr, .. } => Some(expr),
        _ => None,
    }
}

/// Left/right operands of an `AExpr` (binary operator application).
pub fn binary_operands(expr: &Expr) -> Option<(&Expr, &Expr)> {
    match expr {
        Expr::BinaryOp { left, right, .. } => Some((left, right)),
        _ => None,
    }
}

/// Default child-iteration for any expression node not given a bespoke
/// descent rule by a visitor. `Subquery`/`Exists`/`InSubquery` are excluded:
/// their inner `SelectStmt` is a query-level construct walked by the
/// Table/Projection Visitor, not a column reference contributing to this
/// expression's own lineage.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::Collate { expr, .. } => {
            vec![expr.as_ref()]
        }
        Expr::IsNull(e) | Expr::IsNotNull(e) | Expr::IsTrue(e) | Expr::IsFalse(e) => {
            vec![e.as_ref()]
        }
        Expr::Between {
            expr, low, high, ..
        } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
        Expr::InList { expr, list, .. } => {
            let mut out = vec![expr.as_ref()];
            out.extend(list.iter());
            out
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let mut out = Vec::new();
            if let Some(op) = operand {
                out.push(op.as_ref());
            }
            for case_when in conditions {
                out.push(&case_when.condition);
                out.push(&case_when.result);
            }
            if let Some(el) = else_result {
                out.push(el.as_ref());
            }
            out
        }
        Expr::Tuple(items) => items.iter().collect(),
        Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => Vec::new(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn parse_expr(sql: &str) -> Expr {
        let full = format!("SELECT {sql}");
        let stmts = Parser::parse_sql(&GenericDialect {}, &full).unwrap();
        let sqlparser::ast::Statement::Query(q) = &stmts[0] else {
            panic!("expected query")
        };
        let sqlparser::ast::SetExpr::Select(select) = q.body.as_ref() else {
            panic!("expected select")
        };
        match &select.projection[0] {
            sqlparser::ast::SelectItem::UnnamedExpr(e) => e.clone(),
            sqlparser::ast::SelectItem::ExprWithAlias { expr, .. } => expr.clone(),
            _ => panic!("expected expr"),
        }
    }

    #[test]
    fn tags_column_ref() {
        assert_eq!(tag(&parse_expr("a.b")), Tag::ColumnRef);
        assert_eq!(tag(&parse_expr("b")), Tag::ColumnRef);
    }

    #[test]
    fn tags_func_call_and_args() {
        let e = parse_expr("foo(a, b)");
        assert_eq!(tag(&e), Tag::FuncCall);
        assert_eq!(func_name(&e).as_deref(), Some("foo"));
        assert_eq!(func_args(&e).len(), 2);
    }

    #[test]
    fn tags_cast_and_operand() {
        let e = parse_expr("a::date");
        assert_eq!(tag(&e), Tag::TypeCast);
        assert!(cast_operand(&e).is_some());
    }

    #[test]
    fn tags_binary_op() {
        let e = parse_expr("a || b");
        assert_eq!(tag(&e), Tag::AExpr);
        assert!(binary_operands(&e).is_some());
    }
}
