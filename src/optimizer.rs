//! Fixed-point term rewriting over expression trees.
//!
//! One pass walks the tree innermost-first: children are rewritten before
//! their parent, parents are rebuilt over rewritten children, and at each
//! node the first catalog rule whose pattern and constraint hold fires.
//! Passes repeat until a whole pass changes nothing, judged by content
//! identity of the root. Input trees are never mutated; every pass builds
//! replacement nodes.

use crate::error::{PlanError, Result};
use crate::expr::{Expr, ExprRef, Operand};
use crate::rules::{RuleCatalog, catalog};
use std::sync::Arc;

/// Knobs for the rewrite loop.
#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
    /// Hard cap on full passes before giving up on convergence.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_iterations: 100,
        }
    }
}

/// Rewrite a tree to fixed point with the standard catalog.
pub fn optimize(root: &ExprRef) -> Result<ExprRef> {
    optimize_with(root, &OptimizerConfig::default())
}

/// Rewrite with the standard catalog and explicit config.
pub fn optimize_with(root: &ExprRef, config: &OptimizerConfig) -> Result<ExprRef> {
    optimize_with_rules(root, catalog(), config)
}

/// Rewrite with an arbitrary catalog. Public so callers can run curated or
/// experimental rule sets through the same engine.
pub fn optimize_with_rules(
    root: &ExprRef,
    rules: &RuleCatalog,
    config: &OptimizerConfig,
) -> Result<ExprRef> {
    let mut current = Arc::clone(root);
    for pass in 0..config.max_iterations {
        let next = rewrite_pass(&current, rules)?;
        if next.structurally_equal(&current) {
            log::debug!("optimize converged after {pass} pass(es)");
            return Ok(next);
        }
        current = next;
    }
    Err(PlanError::FixedPointExceeded(config.max_iterations))
}

/// One full innermost-first pass. Rebuilds a parent only when a child
/// actually changed, so untouched subtrees keep their nodes (and their
/// memoized identity and partitioning).
fn rewrite_pass(expr: &ExprRef, rules: &RuleCatalog) -> Result<ExprRef> {
    let mut changed = false;
    let mut operands = Vec::with_capacity(expr.operands().len());
    for operand in expr.operands() {
        match operand {
            Operand::Expr(child) => {
                let rewritten = rewrite_pass(child, rules)?;
                if !rewritten.structurally_equal(child) {
                    changed = true;
                }
                operands.push(Operand::Expr(rewritten));
            }
            other => operands.push(other.clone()),
        }
    }
    let node = if changed {
        Expr::new(expr.kind(), operands)?
    } else {
        Arc::clone(expr)
    };
    apply_first(&node, rules)
}

/// Fire the first rule that matches this node, if any.
fn apply_first(expr: &ExprRef, rules: &RuleCatalog) -> Result<ExprRef> {
    for rule in rules.rules_for(expr.kind()) {
        if let Some(replacement) = rule.try_apply(expr)? {
            log::debug!(
                "rule `{}` rewrote {} -> {}",
                rule.name,
                expr.identity(),
                replacement.identity()
            );
            return Ok(replacement);
        }
    }
    Ok(Arc::clone(expr))
}
