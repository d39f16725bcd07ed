//! # Frameplan
//!
//! A **lazy query planner** for partitioned, columnar dataframes. Frameplan
//! builds an expression tree as you chain operations, rewrites it to an
//! equivalent cheaper plan, and compiles it into a flat task graph that an
//! external execution engine runs. No data moves during planning.
//!
//! ## Key Features
//!
//! - **Lazy expression trees** - projections, filters, arithmetic,
//!   comparisons, and reductions build nodes, never results
//! - **Content-addressed identity** - structurally identical subtrees share
//!   one name, so diamond-shaped plans deduplicate for free
//! - **Term rewriting** - a fixed-point engine runs declarative rules:
//!   algebraic simplification, projection pushdown, predicate pushdown
//! - **Columnar-file planning** - parquet datasets are partitioned from
//!   footer metadata, with column pruning and filters pushed into the scan
//!   (optional via the `io-parquet` feature flag)
//! - **Partition awareness** - sorted-index divisions propagate through
//!   blockwise operations and reject misaligned inputs at build time
//! - **Plain-data task graphs** - compiled tasks are serializable
//!   descriptors, free of closures, ready to hand to any scheduler
//!
//! ## Quick Start
//!
//! ```ignore
//! use frameplan::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! // Open a lazy dataset (no files are read beyond footers).
//! let df = read_parquet("data/events/*.parquet")?;
//!
//! // Chain operations; everything stays symbolic.
//! let plan = df
//!     .filter(&df.col("amount")?.gt(100i64)?)?
//!     .select(&["user", "amount"])?
//!     .sum()?;
//!
//! // Rewrite to a cheaper equivalent plan.
//! let plan = optimize(&plan)?;
//!
//! // Compile into tasks for the execution engine.
//! let (graph, roots) = compile(&plan)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Expressions
//!
//! An [`Expr`] is one immutable node: an operator kind plus a fixed operand
//! list mixing child expressions and literals. Nodes are named by a hash of
//! their contents ([`Expr::identity`]), which makes equality, deduplication,
//! and fixed-point detection cheap. Note that `==` on lazy frames is itself
//! lazy: use [`Expr::eq_expr`] to build a comparison node and
//! [`Expr::structurally_equal`] to compare plans.
//!
//! ### Optimization
//!
//! [`optimize`] repeatedly walks the tree innermost-first and fires the
//! first matching [`Rule`] at each node until a whole pass changes nothing.
//! Rules are plain pattern/constraint/rewrite triples registered in a
//! process-wide [`RuleCatalog`]; [`optimize_with_rules`] accepts a custom
//! catalog.
//!
//! ### Task graphs
//!
//! [`task_graph`] flattens a tree into `(identity, partition)`-keyed
//! [`Task`] descriptors. Blockwise nodes lower to one task per partition
//! wired to the same partition of each input; reads lower to per-partition
//! file slices; reductions fan every input partition into one task.

pub mod blockwise;
pub mod divisions;
pub mod error;
pub mod expr;
pub mod io;
pub mod optimizer;
pub mod pattern;
pub mod rules;
pub mod scalar;
pub mod schema;
pub mod task;

// Re-export the primary API at the crate root.
pub use divisions::Divisions;
pub use error::{PlanError, Result};
pub use expr::{Agg, BinOp, CmpOp, Expr, ExprRef, Kind, Operand, Predicate};
pub use io::memory::{MemTable, from_memory, row_boundaries};
pub use optimizer::{OptimizerConfig, optimize, optimize_with, optimize_with_rules};
pub use pattern::{Captures, Pat, match_expr};
pub use rules::{Rule, RuleCatalog, catalog};
pub use scalar::Scalar;
pub use schema::{ColumnSpec, DType, Field, Schema};
pub use task::{
    FileSlice, Key, ReadSpec, Task, TaskArg, TaskFn, TaskGraph, compile, root_keys, task_graph,
};

#[cfg(feature = "io-parquet")]
pub use io::parquet::{ScanPlan, read_parquet, read_parquet_with};
