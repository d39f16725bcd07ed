//! Lowering expression nodes to per-partition tasks.
//!
//! The generic blockwise contract: the task for partition `i` applies the
//! node's operation to partition `i` of every expression operand, with
//! literal operands passed through unchanged. IO leaves and reductions have
//! their own layer shapes. Everything here is pure graph construction --
//! task descriptors are plain data, no closures.
//!
//! Schema derivation lives here too: blockwise "meta" is the operation
//! applied to operand schema placeholders, never to real partitions.

use crate::error::{PlanError, Result};
use crate::expr::{Agg, BinOp, Expr, Kind, Operand};
use crate::scalar::Scalar;
use crate::schema::{DType, Field, Schema};
use crate::task::{Key, Task, TaskArg, TaskFn};

/// Per-partition tasks for a single node, keyed by
/// `(node identity, partition index)`.
pub fn layer(expr: &Expr) -> Result<Vec<(Key, Task)>> {
    match expr.kind() {
        Kind::FromMemory => crate::io::memory::slice_layer(expr),
        #[cfg(feature = "io-parquet")]
        Kind::ReadParquet => crate::io::parquet::read_layer(expr),
        #[cfg(not(feature = "io-parquet"))]
        Kind::ReadParquet => Err(PlanError::Unsupported(
            "parquet planning requires the `io-parquet` feature".to_string(),
        )),
        Kind::Projection => blockwise_layer(expr, TaskFn::Select),
        Kind::Filter => blockwise_layer(expr, TaskFn::Mask),
        Kind::Index => blockwise_layer(expr, TaskFn::Index),
        Kind::AsType => blockwise_layer(expr, TaskFn::Cast),
        Kind::Binary(op) => blockwise_layer(expr, TaskFn::Binary(op)),
        Kind::Reduction(agg) => reduction_layer(expr, agg),
    }
}

/// The generic blockwise lowering: one task per partition, expression
/// operands become same-index task references, literals are inlined.
fn blockwise_layer(expr: &Expr, func: TaskFn) -> Result<Vec<(Key, Task)>> {
    let name = expr.identity().to_string();
    let npartitions = expr.npartitions()?;
    let mut tasks = Vec::with_capacity(npartitions);
    for i in 0..npartitions {
        let args = expr
            .operands()
            .iter()
            .map(|operand| match operand {
                Operand::Expr(child) => TaskArg::Ref((child.identity().to_string(), i)),
                other => literal_arg(other),
            })
            .collect();
        tasks.push((
            (name.clone(), i),
            Task {
                func: func.clone(),
                args,
            },
        ));
    }
    Ok(tasks)
}

/// A reduction collapses to one partition whose task references every
/// partition of its input.
fn reduction_layer(expr: &Expr, agg: Agg) -> Result<Vec<(Key, Task)>> {
    let frame = expr
        .operands()
        .iter()
        .find_map(Operand::as_expr)
        .ok_or_else(|| PlanError::NotImplementedMeta(expr.kind().name().to_string()))?;
    let child_name = frame.identity().to_string();
    let args = (0..frame.npartitions()?)
        .map(|i| TaskArg::Ref((child_name.clone(), i)))
        .collect();
    Ok(vec![(
        (expr.identity().to_string(), 0),
        Task {
            func: TaskFn::Aggregate(agg),
            args,
        },
    )])
}

fn literal_arg(operand: &Operand) -> TaskArg {
    match operand {
        Operand::None => TaskArg::None,
        Operand::Scalar(s) => TaskArg::Scalar(s.clone()),
        Operand::Columns(c) => TaskArg::Columns(c.clone()),
        Operand::Filters(f) => TaskArg::Filters(f.clone()),
        Operand::Table(t) => TaskArg::Table(t.clone()),
        // Unreachable for blockwise kinds; callers map expressions to refs.
        Operand::Expr(e) => TaskArg::Ref((e.identity().to_string(), 0)),
    }
}

/// Schema placeholder for any node.
pub fn schema_of(expr: &Expr) -> Result<Schema> {
    match expr.kind() {
        Kind::FromMemory => match expr.operand("frame") {
            Some(Operand::Table(table)) => table.schema(),
            _ => Err(PlanError::NotImplementedMeta("frommemory".to_string())),
        },
        #[cfg(feature = "io-parquet")]
        Kind::ReadParquet => Ok(crate::io::parquet::scan_plan(expr)?.schema.clone()),
        #[cfg(not(feature = "io-parquet"))]
        Kind::ReadParquet => Err(PlanError::Unsupported(
            "parquet planning requires the `io-parquet` feature".to_string(),
        )),
        Kind::Projection => {
            let frame = frame_schema(expr)?;
            match expr.operand("columns") {
                Some(Operand::Columns(spec)) => frame.select(spec),
                Some(Operand::None) | None => Ok(frame),
                Some(_) => Err(PlanError::NotImplementedMeta("projection".to_string())),
            }
        }
        Kind::Filter => frame_schema(expr),
        Kind::Index => {
            frame_schema(expr)?;
            // Range-index placeholder; a column-backed index is the
            // execution engine's business.
            Ok(Schema::new(vec![Field::new("index", DType::Int64)]))
        }
        Kind::AsType => {
            let frame = frame_schema(expr)?;
            let dtype = match expr.operand("dtype").and_then(Operand::as_scalar) {
                Some(Scalar::Str(name)) => DType::parse(name).ok_or_else(|| {
                    PlanError::Unsupported(format!("unknown dtype `{name}`"))
                })?,
                _ => {
                    return Err(PlanError::MissingOperand {
                        kind: "astype".to_string(),
                        param: "dtype".to_string(),
                    });
                }
            };
            Ok(frame.with_dtype(dtype))
        }
        Kind::Binary(op) => binary_schema(expr, op),
        Kind::Reduction(agg) => reduction_schema(expr, agg),
    }
}

fn frame_schema(expr: &Expr) -> Result<Schema> {
    let frame = expr
        .operands()
        .iter()
        .find_map(Operand::as_expr)
        .ok_or_else(|| PlanError::NotImplementedMeta(expr.kind().name().to_string()))?;
    frame.schema()
}

/// Apply a binary operation to operand schema placeholders.
///
/// Comparisons yield boolean columns; arithmetic against a literal keeps the
/// frame's shape with promoted dtypes; frame-against-frame requires matching
/// column lists.
fn binary_schema(expr: &Expr, op: BinOp) -> Result<Schema> {
    let left = expr.operands().first();
    let right = expr.operands().get(1);
    let (frame, other) = match (left, right) {
        (Some(Operand::Expr(l)), Some(Operand::Expr(r))) => {
            let ls = l.schema()?;
            let rs = r.schema()?;
            if ls.columns() != rs.columns() {
                return Err(PlanError::Unsupported(format!(
                    "binary `{}` over frames with different columns",
                    op.symbol()
                )));
            }
            if op.is_comparison() {
                return Ok(ls.with_dtype(DType::Bool));
            }
            let fields = ls
                .fields
                .iter()
                .zip(rs.fields.iter())
                .map(|(a, b)| {
                    DType::unify(a.dtype, b.dtype)
                        .map(|dtype| Field::new(a.name.clone(), dtype))
                        .ok_or_else(|| {
                            PlanError::Unsupported(format!(
                                "no common dtype for column `{}`",
                                a.name
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Schema::new(fields));
        }
        (Some(Operand::Expr(l)), Some(other)) => (l, other),
        (Some(other), Some(Operand::Expr(r))) => (r, other),
        _ => return Err(PlanError::NotImplementedMeta(op.name().to_string())),
    };

    let schema = frame.schema()?;
    if op.is_comparison() {
        return Ok(schema.with_dtype(DType::Bool));
    }
    let literal_dtype = other.as_scalar().and_then(DType::of);
    let fields = schema
        .fields
        .iter()
        .map(|f| {
            let dtype = match literal_dtype {
                Some(ld) => DType::unify(f.dtype, ld).ok_or_else(|| {
                    PlanError::Unsupported(format!(
                        "no common dtype for column `{}` and literal",
                        f.name
                    ))
                })?,
                None => f.dtype,
            };
            Ok(Field::new(f.name.clone(), dtype))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

fn reduction_schema(expr: &Expr, agg: Agg) -> Result<Schema> {
    let frame = frame_schema(expr)?;
    Ok(match agg {
        Agg::Sum | Agg::Min | Agg::Max => frame,
        Agg::Count => frame.with_dtype(DType::Int64),
        Agg::Size => Schema::new(vec![Field::new("size", DType::Int64)]),
    })
}
