//! Task graph types and the tree-to-graph compiler.
//!
//! A compiled graph is plain data: each key `(node identity, partition)`
//! maps to "apply this function to these arguments", where arguments are
//! literals or references to other task keys. The external execution engine
//! resolves references, runs tasks, and concatenates the root's partitions
//! in key order; none of that happens here.

use crate::error::Result;
use crate::expr::{Agg, BinOp, ExprRef, Operand, Predicate};
use crate::scalar::Scalar;
use crate::io::memory::MemTable;
use crate::schema::ColumnSpec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Task key: `(node identity, partition index)`.
pub type Key = (String, usize);

/// One argument to a task function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TaskArg {
    /// Reference to another task's output.
    Ref(Key),
    Scalar(Scalar),
    Columns(ColumnSpec),
    Filters(Vec<Predicate>),
    Table(Arc<MemTable>),
    None,
}

/// Everything a file-backed read task needs, resolved at planning time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadSpec {
    pub files: Vec<FileSlice>,
    /// `None` means all columns of the inferred schema.
    pub columns: Option<Vec<String>>,
    /// Conjunctive filters applied at the storage layer.
    pub filters: Vec<Predicate>,
    pub index: Option<String>,
}

/// A file and the row groups of it this partition covers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileSlice {
    pub path: String,
    pub row_groups: Vec<usize>,
}

/// The function slot of a task descriptor. The execution engine interprets
/// these against its table-value runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TaskFn {
    /// Elementwise binary operation over two partition values / literals.
    Binary(BinOp),
    /// Column selection: frame partition + column spec.
    Select,
    /// Boolean row mask: frame partition + mask partition.
    Mask,
    /// The partition's row index as a single column.
    Index,
    /// Cast every column of the partition: frame + dtype name.
    Cast,
    /// Contiguous row slice of an in-memory table: table + start + stop.
    SliceRows,
    /// Columnar-file read of one partition.
    Read(ReadSpec),
    /// Combine all partitions of the input into one result.
    Aggregate(Agg),
}

/// One unit of work: apply `func` to `args`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub func: TaskFn,
    pub args: Vec<TaskArg>,
}

/// The flattened task mapping handed to the execution engine.
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    pub tasks: HashMap<Key, Task>,
}

impl TaskGraph {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Task> {
        self.tasks.get(key)
    }

    /// All keys belonging to one node, in partition order.
    #[must_use]
    pub fn keys_of(&self, identity: &str) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .tasks
            .keys()
            .filter(|(name, _)| name == identity)
            .cloned()
            .collect();
        keys.sort_by_key(|(_, i)| *i);
        keys
    }
}

/// Output keys of the root node, in partition order. The execution engine
/// concatenates these partitions into the final result.
pub fn root_keys(root: &ExprRef) -> Result<Vec<Key>> {
    let name = root.identity().to_string();
    Ok((0..root.npartitions()?).map(|i| (name.clone(), i)).collect())
}

/// Flatten an expression tree into one task mapping.
///
/// Depth-first traversal; a node visited once contributes its per-partition
/// tasks once no matter how many parents reference it (deduplicated by
/// content identity).
pub fn task_graph(root: &ExprRef) -> Result<TaskGraph> {
    let mut graph = TaskGraph::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack: Vec<ExprRef> = vec![Arc::clone(root)];

    while let Some(expr) = stack.pop() {
        let name = expr.identity().to_string();
        if !seen.insert(name) {
            continue;
        }
        for (key, task) in crate::blockwise::layer(&expr)? {
            graph.tasks.insert(key, task);
        }
        for operand in expr.operands() {
            if let Operand::Expr(child) = operand {
                stack.push(Arc::clone(child));
            }
        }
    }

    Ok(graph)
}

/// Compile helper used by callers that want graph and root keys together.
pub fn compile(root: &ExprRef) -> Result<(TaskGraph, Vec<Key>)> {
    Ok((task_graph(root)?, root_keys(root)?))
}
