//! In-memory tables and the `from_memory` dataset leaf.
//!
//! A [`MemTable`] is a small column-major literal table, the planning-time
//! stand-in for a concrete dataframe handed over by the caller. Partitioning
//! slices it into contiguous row ranges with a ceiling chunk size, so the
//! planned partition count can come out lower than requested but never
//! higher, and no partition is empty unless the table itself is.

use crate::error::{PlanError, Result};
use crate::expr::{Expr, ExprRef, Kind, Operand};
use crate::scalar::Scalar;
use crate::schema::{DType, Field, Schema};
use crate::task::{Key, Task, TaskArg, TaskFn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};

/// A column-major literal table: `(name, values)` per column, all columns
/// the same length.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemTable {
    columns: Vec<(String, Vec<Scalar>)>,
    #[serde(skip)]
    fingerprint: OnceLock<String>,
}

impl MemTable {
    /// Build a table from named columns.
    ///
    /// # Errors
    ///
    /// Column length mismatches are rejected up front.
    pub fn new(columns: Vec<(String, Vec<Scalar>)>) -> Result<Self> {
        if let Some((first_name, first)) = columns.first() {
            for (name, values) in &columns[1..] {
                if values.len() != first.len() {
                    return Err(PlanError::Unsupported(format!(
                        "column `{name}` has {} rows but `{first_name}` has {}",
                        values.len(),
                        first.len()
                    )));
                }
            }
        }
        Ok(MemTable {
            columns,
            fingerprint: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Schema placeholder: each column's dtype is taken from its first
    /// non-null value, defaulting to text for all-null columns.
    pub fn schema(&self) -> Result<Schema> {
        let fields = self
            .columns
            .iter()
            .map(|(name, values)| {
                let dtype = values
                    .iter()
                    .find_map(DType::of)
                    .unwrap_or(DType::Utf8);
                Field::new(name.clone(), dtype)
            })
            .collect();
        Ok(Schema::new(fields))
    }

    /// Content digest of the table, memoized. Feeds the identity of any
    /// node holding this table as an operand. Values digest as variant-tagged
    /// raw bytes, so an int and a float column with the same printed values
    /// still fingerprint apart.
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.get_or_init(|| {
            let mut hasher = Sha256::new();
            for (name, values) in &self.columns {
                hasher.update((name.len() as u64).to_le_bytes());
                hasher.update(name.as_bytes());
                hasher.update((values.len() as u64).to_le_bytes());
                for value in values {
                    value.update_digest(&mut hasher);
                }
            }
            crate::expr::short_hex(&hasher.finalize())
        })
    }
}

/// Tables compare by content digest, matching how they feed node identity.
impl PartialEq for MemTable {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for MemTable {}

/// Wrap an in-memory table as a lazy dataset with at most `npartitions`
/// contiguous row slices.
pub fn from_memory(table: MemTable, npartitions: usize) -> Result<ExprRef> {
    if npartitions == 0 {
        return Err(PlanError::Unsupported(
            "npartitions must be at least 1".to_string(),
        ));
    }
    Expr::new(
        Kind::FromMemory,
        vec![
            Operand::Table(Arc::new(table)),
            Operand::Scalar(Scalar::Int(npartitions as i64)),
        ],
    )
}

/// Row slice boundaries for `nrows` rows in at most `nparts` chunks.
///
/// Chunk size is `ceil(nrows / nparts)`, so 10 rows over 3 partitions give
/// `[0, 4, 8, 10]`. Fewer chunks than requested can come out when the rows
/// do not stretch that far; an empty table yields one empty slice.
#[must_use]
pub fn row_boundaries(nrows: usize, nparts: usize) -> Vec<usize> {
    if nrows == 0 || nparts == 0 {
        return vec![0, 0];
    }
    let chunk = nrows.div_ceil(nparts);
    let mut boundaries: Vec<usize> = (0..nrows).step_by(chunk).collect();
    boundaries.push(nrows);
    boundaries
}

/// Boundaries for a `from_memory` node, read off its operands.
pub(crate) fn slice_boundaries(expr: &Expr) -> Result<Vec<usize>> {
    let table = match expr.operand("frame") {
        Some(Operand::Table(table)) => table,
        _ => {
            return Err(PlanError::MissingOperand {
                kind: "frommemory".to_string(),
                param: "frame".to_string(),
            });
        }
    };
    let nparts = match expr.operand("npartitions").and_then(Operand::as_scalar) {
        Some(Scalar::Int(n)) if *n >= 1 => *n as usize,
        _ => {
            return Err(PlanError::MissingOperand {
                kind: "frommemory".to_string(),
                param: "npartitions".to_string(),
            });
        }
    };
    Ok(row_boundaries(table.nrows(), nparts))
}

/// One slice task per planned partition: table literal plus `[start, stop)`.
pub(crate) fn slice_layer(expr: &Expr) -> Result<Vec<(Key, Task)>> {
    let table = match expr.operand("frame") {
        Some(Operand::Table(table)) => Arc::clone(table),
        _ => {
            return Err(PlanError::MissingOperand {
                kind: "frommemory".to_string(),
                param: "frame".to_string(),
            });
        }
    };
    let boundaries = slice_boundaries(expr)?;
    let name = expr.identity().to_string();
    Ok(boundaries
        .windows(2)
        .enumerate()
        .map(|(i, window)| {
            (
                (name.clone(), i),
                Task {
                    func: TaskFn::SliceRows,
                    args: vec![
                        TaskArg::Table(Arc::clone(&table)),
                        TaskArg::Scalar(Scalar::Int(window[0] as i64)),
                        TaskArg::Scalar(Scalar::Int(window[1] as i64)),
                    ],
                },
            )
        })
        .collect())
}
