//! The rewrite rule catalog.
//!
//! Each rule pairs a [`Pat`] with an optional constraint over its captures
//! and a pure rewrite function producing the replacement node. Rules are
//! registered once per process in a static catalog, indexed by the kind
//! they match at the root; registration is an explicit build step, fully
//! decoupled from node construction.
//!
//! Catalog entries:
//! - `X + X` (same identity)            -> `2 * X`
//! - `a * (b * c)`, `a`/`b` numeric     -> `(a*b) * c`
//! - `filter(df, cond)[cols]`           -> `df[cols][cond]`
//! - `(L op R)[cols]`                   -> `L[cols] op R[cols]`
//! - `ReadParquet(..)[cols]`            -> narrower read
//! - `filter(read, read[col] cmp lit)`  -> read with `(col, cmp, lit)`
//!   appended to its filter list, both operand orders, operator flipped
//!   when the literal is on the left.

use crate::error::{PlanError, Result};
use crate::expr::{BinOp, CmpOp, Expr, ExprRef, Kind, Operand};
use crate::pattern::{Captures, Pat, match_expr};
use std::collections::HashMap;
use std::sync::OnceLock;

#[cfg(feature = "io-parquet")]
use crate::expr::Predicate;
#[cfg(feature = "io-parquet")]
use crate::scalar::Scalar;
#[cfg(feature = "io-parquet")]
use crate::schema::ColumnSpec;

type Constraint = Box<dyn Fn(&Captures) -> bool + Send + Sync>;
type Rewrite = Box<dyn Fn(&Captures) -> Result<ExprRef> + Send + Sync>;

/// One rewrite rule: pattern, optional constraint, rewrite function.
pub struct Rule {
    pub name: &'static str,
    pub pattern: Pat,
    pub constraint: Option<Constraint>,
    pub rewrite: Rewrite,
}

impl Rule {
    /// Match this rule against `expr` and, if the pattern and constraint
    /// hold, run the rewrite.
    ///
    /// # Errors
    ///
    /// A failing rewrite function surfaces as [`PlanError::RewriteFailure`]
    /// and aborts the optimize call.
    pub fn try_apply(&self, expr: &ExprRef) -> Result<Option<ExprRef>> {
        let Some(captures) = match_expr(expr, &self.pattern) else {
            return Ok(None);
        };
        if let Some(constraint) = &self.constraint {
            if !constraint(&captures) {
                return Ok(None);
            }
        }
        match (self.rewrite)(&captures) {
            Ok(replacement) => Ok(Some(replacement)),
            Err(err) => Err(PlanError::RewriteFailure {
                rule: self.name.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// The process-wide rule catalog, indexed by root kind.
#[derive(Default)]
pub struct RuleCatalog {
    by_kind: HashMap<Kind, Vec<Rule>>,
}

impl RuleCatalog {
    /// The standard catalog with every built-in rule.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = RuleCatalog::default();
        catalog.push(self_add_rule());
        catalog.push(mul_fold_rule());
        catalog.push(filter_projection_reorder_rule());
        for rule in binop_projection_pushdown_rules() {
            catalog.push(rule);
        }
        #[cfg(feature = "io-parquet")]
        {
            catalog.push(parquet_column_pushdown_rule());
            for rule in parquet_predicate_pushdown_rules() {
                catalog.push(rule);
            }
        }
        catalog
    }

    /// Add a rule; its pattern must be kind-constrained at the root.
    pub fn push(&mut self, rule: Rule) {
        if let Some(kind) = rule.pattern.root_kind() {
            self.by_kind.entry(kind).or_default().push(rule);
        }
    }

    #[must_use]
    pub fn rules_for(&self, kind: Kind) -> &[Rule] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The global catalog, built exactly once on first use. Idempotent by
/// construction; concurrent optimize calls share it read-only.
pub fn catalog() -> &'static RuleCatalog {
    static CATALOG: OnceLock<RuleCatalog> = OnceLock::new();
    CATALOG.get_or_init(RuleCatalog::standard)
}

fn capture<'a>(captures: &'a Captures, name: &str) -> Result<&'a Operand> {
    captures
        .get(name)
        .ok_or_else(|| PlanError::Unsupported(format!("capture `{name}` not bound")))
}

/* ---------- algebraic rules ---------- */

/// `X + X` -> `2 * X`, recognized by content identity.
fn self_add_rule() -> Rule {
    Rule {
        name: "self-add-to-scale",
        pattern: Pat::node(
            Kind::Binary(BinOp::Add),
            vec![Pat::Bind("x"), Pat::Bind("x")],
        ),
        constraint: None,
        rewrite: Box::new(|caps| {
            let x = capture(caps, "x")?;
            Expr::binary(BinOp::Mul, 2i64, x.clone())
        }),
    }
}

/// `a * (b * c)` -> `(a*b) * c` when `a` and `b` are plain numbers and the
/// product does not overflow. Folds the constants and normalizes
/// associativity left; an overflowing product declines the fold and leaves
/// the tree alone.
fn mul_fold_rule() -> Rule {
    Rule {
        name: "mul-constant-fold",
        pattern: Pat::node(
            Kind::Binary(BinOp::Mul),
            vec![
                Pat::Bind("a"),
                Pat::node(Kind::Binary(BinOp::Mul), vec![Pat::Bind("b"), Pat::Bind("c")]),
            ],
        ),
        constraint: Some(Box::new(|caps| {
            match (caps.scalar("a"), caps.scalar("b")) {
                (Some(a), Some(b)) => a.mul(b).is_some(),
                _ => false,
            }
        })),
        rewrite: Box::new(|caps| {
            let a = caps
                .scalar("a")
                .ok_or_else(|| PlanError::Unsupported("capture `a` not numeric".to_string()))?;
            let b = caps
                .scalar("b")
                .ok_or_else(|| PlanError::Unsupported("capture `b` not numeric".to_string()))?;
            let folded = a
                .mul(b)
                .ok_or_else(|| PlanError::Unsupported("non-numeric fold".to_string()))?;
            let c = capture(caps, "c")?;
            Expr::binary(BinOp::Mul, folded, c.clone())
        }),
    }
}

/// `filter(df, cond)[cols]` -> `df[cols][cond]`: push column selection
/// below row filtering so the filter only sees needed columns.
fn filter_projection_reorder_rule() -> Rule {
    Rule {
        name: "filter-projection-reorder",
        pattern: Pat::node(
            Kind::Projection,
            vec![
                Pat::node(Kind::Filter, vec![Pat::Bind("df"), Pat::Bind("cond")]),
                Pat::Bind("cols"),
            ],
        ),
        constraint: None,
        rewrite: Box::new(|caps| {
            let df = capture(caps, "df")?;
            let cond = capture(caps, "cond")?;
            let cols = capture(caps, "cols")?;
            let projected = Expr::new(Kind::Projection, vec![df.clone(), cols.clone()])?;
            Expr::new(
                Kind::Filter,
                vec![Operand::Expr(projected), cond.clone()],
            )
        }),
    }
}

/// `(L op R)[cols]` -> `L[cols] op R[cols]` for every binary operator;
/// literal sides pass through untouched.
fn binop_projection_pushdown_rules() -> Vec<Rule> {
    let ops = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Cmp(CmpOp::Lt),
        BinOp::Cmp(CmpOp::Le),
        BinOp::Cmp(CmpOp::Gt),
        BinOp::Cmp(CmpOp::Ge),
        BinOp::Cmp(CmpOp::Eq),
        BinOp::Cmp(CmpOp::Ne),
    ];
    ops.into_iter()
        .map(|op| Rule {
            name: "binop-projection-pushdown",
            pattern: Pat::node(
                Kind::Projection,
                vec![
                    Pat::node(Kind::Binary(op), vec![Pat::Bind("left"), Pat::Bind("right")]),
                    Pat::Bind("cols"),
                ],
            ),
            constraint: None,
            rewrite: Box::new(move |caps| {
                let cols = capture(caps, "cols")?;
                let left = pushed_side(capture(caps, "left")?, cols)?;
                let right = pushed_side(capture(caps, "right")?, cols)?;
                Expr::binary(op, left, right)
            }),
        })
        .collect()
}

fn pushed_side(side: &Operand, cols: &Operand) -> Result<Operand> {
    match side {
        Operand::Expr(_) => Ok(Operand::Expr(Expr::new(
            Kind::Projection,
            vec![side.clone(), cols.clone()],
        )?)),
        other => Ok(other.clone()),
    }
}

/* ---------- columnar-file pushdown ---------- */

/// `ReadParquet(path, columns=C, filters=F)[cols]` -> a narrower read with
/// `columns=cols`; every other planning knob is preserved.
#[cfg(feature = "io-parquet")]
fn parquet_column_pushdown_rule() -> Rule {
    Rule {
        name: "parquet-column-pushdown",
        pattern: Pat::node(
            Kind::Projection,
            vec![
                Pat::NodeBind(Kind::ReadParquet, "read"),
                Pat::Bind("cols"),
            ],
        ),
        constraint: Some(Box::new(|caps| caps.columns("cols").is_some())),
        rewrite: Box::new(|caps| {
            let read = caps
                .expr("read")
                .ok_or_else(|| PlanError::Unsupported("capture `read` not bound".to_string()))?;
            let cols = caps
                .columns("cols")
                .ok_or_else(|| PlanError::Unsupported("capture `cols` not bound".to_string()))?;
            let mut operands = read.operands().to_vec();
            operands[read_param("columns")] =
                Operand::Columns(ColumnSpec::Many(cols.to_list()));
            Expr::new(Kind::ReadParquet, operands)
        }),
    }
}

/// Predicate pushdown into a read: for each comparison operator and both
/// operand orders, a filter over a read whose condition compares a single
/// column of the *same* source against a literal folds into the read's
/// filter list. Two shapes are matched: the column as an explicit
/// single-column projection off the read, and the already-collapsed form
/// where the inner read itself carries a single-column `columns` operand.
#[cfg(feature = "io-parquet")]
fn parquet_predicate_pushdown_rules() -> Vec<Rule> {
    let mut rules = Vec::new();
    for op in CmpOp::all() {
        // filter(read, read[col] op lit)
        rules.push(predicate_rule(
            op,
            Pat::node(
                Kind::Binary(BinOp::Cmp(op)),
                vec![column_projection_pat(), Pat::Bind("lit")],
            ),
            true,
        ));
        // filter(read, lit op read[col]) -- operator flips to keep the
        // column first.
        rules.push(predicate_rule(
            op.flip(),
            Pat::node(
                Kind::Binary(BinOp::Cmp(op)),
                vec![Pat::Bind("lit"), column_projection_pat()],
            ),
            true,
        ));
        // filter(read, read' op lit) where read' already collapsed to a
        // single-column read.
        rules.push(predicate_rule(
            op,
            Pat::node(
                Kind::Binary(BinOp::Cmp(op)),
                vec![Pat::NodeBind(Kind::ReadParquet, "inner"), Pat::Bind("lit")],
            ),
            false,
        ));
        rules.push(predicate_rule(
            op.flip(),
            Pat::node(
                Kind::Binary(BinOp::Cmp(op)),
                vec![Pat::Bind("lit"), Pat::NodeBind(Kind::ReadParquet, "inner")],
            ),
            false,
        ));
    }
    rules
}

#[cfg(feature = "io-parquet")]
fn column_projection_pat() -> Pat {
    Pat::node(
        Kind::Projection,
        vec![Pat::NodeBind(Kind::ReadParquet, "inner"), Pat::Bind("col")],
    )
}

#[cfg(feature = "io-parquet")]
fn predicate_rule(stored: CmpOp, condition: Pat, projected: bool) -> Rule {
    Rule {
        name: "parquet-predicate-pushdown",
        pattern: Pat::node(
            Kind::Filter,
            vec![Pat::NodeBind(Kind::ReadParquet, "read"), condition],
        ),
        constraint: Some(Box::new(move |caps| {
            let (Some(read), Some(inner)) = (caps.expr("read"), caps.expr("inner")) else {
                return false;
            };
            if read.operand("path") != inner.operand("path") {
                return false;
            }
            if caps.scalar("lit").is_none() {
                return false;
            }
            pushdown_column(caps, projected).is_some()
        })),
        rewrite: Box::new(move |caps| {
            let read = caps
                .expr("read")
                .ok_or_else(|| PlanError::Unsupported("capture `read` not bound".to_string()))?;
            let column = pushdown_column(caps, projected)
                .ok_or_else(|| PlanError::Unsupported("no single filter column".to_string()))?;
            let value = caps
                .scalar("lit")
                .ok_or_else(|| PlanError::Unsupported("capture `lit` not bound".to_string()))?
                .clone();
            push_filter(read, column, stored, value)
        }),
    }
}

/// The single column a predicate-pushdown match filters on: either the
/// captured projection spec or the collapsed inner read's `columns`.
#[cfg(feature = "io-parquet")]
fn pushdown_column(caps: &Captures, projected: bool) -> Option<String> {
    let spec = if projected {
        caps.columns("col")?
    } else {
        caps.expr("inner")?.operand("columns")?.as_columns()?
    };
    spec.single().map(ToString::to_string)
}

/// Rebuild a read with one more conjunctive filter clause. Only operands
/// change; dataset metadata is never re-read.
#[cfg(feature = "io-parquet")]
fn push_filter(read: &ExprRef, column: String, op: CmpOp, value: Scalar) -> Result<ExprRef> {
    let mut operands = read.operands().to_vec();
    let mut filters = match read.operand("filters") {
        Some(Operand::Filters(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    filters.push(Predicate { column, op, value });
    operands[read_param("filters")] = Operand::Filters(filters);
    if let Some(Operand::Columns(ColumnSpec::One(name))) = read.operand("columns") {
        operands[read_param("columns")] =
            Operand::Columns(ColumnSpec::Many(vec![name.clone()]));
    }
    Expr::new(Kind::ReadParquet, operands)
}

#[cfg(feature = "io-parquet")]
fn read_param(name: &str) -> usize {
    Kind::ReadParquet
        .parameters()
        .iter()
        .position(|p| *p == name)
        .unwrap_or(0)
}
