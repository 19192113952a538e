//! The Expression Visitor: walks one projected expression subtree
//! and emits the flat list of column references it reads, plus whether the
//! expression is exactly a star.

use sqlparser::ast::Expr;

use crate::ast::{self, Tag};
use crate::dialect::{self, Dialect};
use crate::model::{ColumnRef, ProjectedExpr};

/// Stateless visitor parameterized only by dialect, the single override
/// point for dialect-specific descent rules.
pub struct ExpressionVisitor {
    dialect: Dialect,
}

impl ExpressionVisitor {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Visits `expr`, the `val` side of a `ResTarget` (or an entire star
    /// reference), with `alias` carried over from the surrounding `ResTarget`.
    pub fn visit(&self, expr: &Expr, alias: Option<String>) -> ProjectedExpr {
        if ast::tag(expr) == Tag::AStar {
            return ProjectedExpr {
                alias,
                columns: vec![star_ref(expr)],
                is_star: true,
            };
        }

        let mut columns = Vec::new();
        self.descend(expr, &mut columns);
        ProjectedExpr {
            alias,
            columns,
            is_star: false,
        }
    }

    fn descend(&self, expr: &Expr, out: &mut Vec<ColumnRef>) {
        match ast::tag(expr) {
            Tag::ColumnRef => out.push(column_ref(expr)),
            Tag::AStar => out.push(star_ref(expr)),
            Tag::FuncCall => {
                let name = ast::func_name(expr).unwrap_or_default();
                let skip = dialect::skip_args_for_function(self.dialect, &name);
                for (idx, arg) in ast::func_args(expr).into_iter().enumerate() {
                    if skip.contains(&idx) {
                        continue;
                    }
                    self.descend(arg, out);
                }
            }
            Tag::TypeCast => {
                if let Some(operand) = ast::cast_operand(expr) {
                    self.descend(operand, out);
                }
            }
            Tag::AExpr => {
                if let Some((left, right)) = ast::binary_operands(expr) {
                    self.descend(left, out);
                    self.descend(right, out);
                }
            }
            Tag::Other => {
                for child in ast::children(expr) {
                    self.descend(child, out);
                }
            }
        }
    }
}

fn column_ref(expr: &Expr) -> ColumnRef {
    match expr {
        Expr::Identifier(ident) => ColumnRef::Unqualified(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => {
            let column = parts.last().expect("non-empty compound identifier").value.clone();
            let qualifier = parts[..parts.len() - 1]
                .iter()
                .map(|p| p.value.as_str())
                .collect::<Vec<_>>()
                .join(".");
            ColumnRef::Qualified(qualifier, column)
        }
        _ => unreachable!("column_ref called on a non-ColumnRef-tagged expression"),
    }
}

fn star_ref(expr: &Expr) -> ColumnRef {
    match expr {
        Expr::QualifiedWildcard(name, _) => ColumnRef::QualifiedStar(name.to_string()),
        Expr::Wildcard(_) => ColumnRef::Star,
        _ => unreachable!("star_ref called on a non-AStar-tagged expression"),
    }
}
