//! Declarative pattern matching for rewrite rules.
//!
//! A pattern describes the shape of a subtree: exact nodes with
//! sub-patterns, named wildcard captures, kind-constrained captures, and
//! anonymous wildcards. Matching returns a capture map or no-match; a
//! rule's constraint predicate is evaluated over the captures *before* its
//! rewrite function is allowed to fire.
//!
//! Repeated capture names must bind structurally equal values (expressions
//! compare by content identity), which is how `X + X` recognizes the same
//! sub-expression on both sides.

use crate::expr::{ExprRef, Kind, Operand};
use crate::scalar::Scalar;
use crate::schema::ColumnSpec;
use std::collections::HashMap;
use std::sync::Arc;

/// A pattern over one operand position.
#[derive(Clone, Debug)]
pub enum Pat {
    /// Match anything, capture nothing.
    Any,
    /// Match anything, capture it under a name. A name bound twice must
    /// bind structurally equal values.
    Bind(&'static str),
    /// Match any node of the given kind and capture the whole node.
    NodeBind(Kind, &'static str),
    /// Match a node of the given kind whose operands match the
    /// sub-patterns positionally. Arity must equal the kind's declared
    /// parameter count.
    Node { kind: Kind, operands: Vec<Pat> },
}

impl Pat {
    /// Convenience constructor for [`Pat::Node`].
    #[must_use]
    pub fn node(kind: Kind, operands: Vec<Pat>) -> Pat {
        Pat::Node { kind, operands }
    }

    /// The node kind this pattern matches at its root, if it is
    /// kind-constrained. The catalog indexes rules by this.
    #[must_use]
    pub fn root_kind(&self) -> Option<Kind> {
        match self {
            Pat::Node { kind, .. } | Pat::NodeBind(kind, _) => Some(*kind),
            _ => None,
        }
    }
}

/// Bindings produced by a successful match.
#[derive(Clone, Debug, Default)]
pub struct Captures {
    bindings: HashMap<&'static str, Operand>,
}

impl Captures {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Operand> {
        self.bindings.get(name)
    }

    /// The capture as an expression node, if it is one.
    #[must_use]
    pub fn expr(&self, name: &str) -> Option<&ExprRef> {
        self.get(name).and_then(Operand::as_expr)
    }

    /// The capture as a scalar literal, if it is one.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.get(name).and_then(Operand::as_scalar)
    }

    /// The capture as a column spec, if it is one.
    #[must_use]
    pub fn columns(&self, name: &str) -> Option<&ColumnSpec> {
        self.get(name).and_then(Operand::as_columns)
    }

    /// Bind a name, enforcing structural equality with any earlier binding
    /// of the same name. Returns `false` on conflict.
    fn bind(&mut self, name: &'static str, value: Operand) -> bool {
        match self.bindings.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.bindings.insert(name, value);
                true
            }
        }
    }
}

/// Match a pattern against an expression node. Returns captures on success.
#[must_use]
pub fn match_expr(expr: &ExprRef, pattern: &Pat) -> Option<Captures> {
    let mut captures = Captures::default();
    if match_operand(&Operand::Expr(Arc::clone(expr)), pattern, &mut captures) {
        Some(captures)
    } else {
        None
    }
}

fn match_operand(operand: &Operand, pattern: &Pat, captures: &mut Captures) -> bool {
    match pattern {
        Pat::Any => true,
        Pat::Bind(name) => captures.bind(name, operand.clone()),
        Pat::NodeBind(kind, name) => match operand {
            Operand::Expr(expr) if expr.kind() == *kind => {
                captures.bind(name, operand.clone())
            }
            _ => false,
        },
        Pat::Node { kind, operands } => match operand {
            Operand::Expr(expr) if expr.kind() == *kind => {
                if expr.operands().len() != operands.len() {
                    return false;
                }
                expr.operands()
                    .iter()
                    .zip(operands.iter())
                    .all(|(op, pat)| match_operand(op, pat, captures))
            }
            _ => false,
        },
    }
}
