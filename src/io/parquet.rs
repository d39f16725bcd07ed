//! Columnar-file dataset planning.
//!
//! Everything here happens at plan time against file metadata only: resolve
//! a path, glob, or directory into a naturally ordered file list, read
//! footers once, and derive schema, partitioning, and (optionally) sorted
//! index divisions from row-group statistics. No data pages are touched.
//!
//! Footer metadata is cached process-wide per `(path, index,
//! calculate_divisions, extensions)`, so rewrites that rebuild a read node
//! with narrower columns or more filters never go back to storage.

use crate::divisions::Divisions;
use crate::error::{PlanError, Result};
use crate::expr::{Expr, ExprRef, Kind, Operand, Predicate};
use crate::scalar::Scalar;
use crate::schema::{ColumnSpec, DType, Field, Schema};
use crate::task::{FileSlice, Key, ReadSpec, Task, TaskFn};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Open a lazy dataset over parquet files with default planning knobs.
pub fn read_parquet(path: &str) -> Result<ExprRef> {
    read_parquet_with(path, &[])
}

/// Open a lazy dataset over parquet files, overriding planning knobs by
/// keyword (`columns`, `filters`, `index`, `calculate_divisions`,
/// `blocksize`, `split_row_groups`, `aggregate_files`, `file_extension`).
pub fn read_parquet_with(path: &str, kwargs: &[(&str, Operand)]) -> Result<ExprRef> {
    Expr::with_kwargs(Kind::ReadParquet, vec![Operand::from(path)], kwargs)
}

/* ---------- file resolution ---------- */

/// One comparison unit of a natural sort key. Digit runs compare as
/// numbers and sort before text, so `file2` orders before `file10`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Num(u128),
    Text(String),
}

/// Split a path into alternating numeric and text segments for ordering.
#[must_use]
pub fn natural_sort_key(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut number: Option<u128> = None;
    for ch in path.chars() {
        if let Some(digit) = ch.to_digit(10) {
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            let acc = number.unwrap_or(0);
            number = Some(acc.saturating_mul(10).saturating_add(u128::from(digit)));
        } else {
            if let Some(n) = number.take() {
                segments.push(Segment::Num(n));
            }
            text.push(ch);
        }
    }
    if let Some(n) = number {
        segments.push(Segment::Num(n));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

fn io_err(path: &str, err: impl std::fmt::Display) -> PlanError {
    PlanError::Io {
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Resolve a dataset path into a naturally ordered list of files.
///
/// A path with glob metacharacters expands through the glob; a directory
/// lists its immediate children filtered by the accepted extensions; a
/// plain file stands alone. No files is an error, not an empty dataset.
pub fn resolve_files(path: &str, extensions: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    if path.contains(['*', '?', '[']) {
        for entry in glob::glob(path).map_err(|e| io_err(path, e))? {
            let file = entry.map_err(|e| io_err(path, e))?;
            files.push(file.to_string_lossy().into_owned());
        }
    } else {
        let p = Path::new(path);
        if p.is_dir() {
            for entry in std::fs::read_dir(p).map_err(|e| io_err(path, e))? {
                let entry = entry.map_err(|e| io_err(path, e))?;
                if !entry.path().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if extensions.is_empty() || extensions.iter().any(|ext| name.ends_with(ext)) {
                    files.push(entry.path().to_string_lossy().into_owned());
                }
            }
        } else if p.is_file() {
            files.push(path.to_string());
        }
    }
    if files.is_empty() {
        return Err(PlanError::EmptyDataset(path.to_string()));
    }
    files.sort_by_key(|f| natural_sort_key(f));
    Ok(files)
}

/* ---------- footer metadata ---------- */

/// Row-group summary: row and byte counts plus index column statistics
/// when they were requested and present.
#[derive(Clone, Debug)]
pub struct RowGroupMeta {
    pub rows: u64,
    pub bytes: u64,
    pub index_min: Option<Scalar>,
    pub index_max: Option<Scalar>,
}

#[derive(Clone, Debug)]
pub struct FileMeta {
    pub path: String,
    pub row_groups: Vec<RowGroupMeta>,
}

/// Everything planning needs to know about a dataset's files.
#[derive(Clone, Debug)]
pub struct DatasetInfo {
    pub files: Vec<FileMeta>,
    pub schema: Schema,
}

type CacheKey = (String, Option<String>, bool, Vec<String>);

fn metadata_cache() -> &'static Mutex<HashMap<CacheKey, Arc<DatasetInfo>>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, Arc<DatasetInfo>>>> = OnceLock::new();
    CACHE.get_or_init(Mutex::default)
}

/// Footer metadata for a dataset, from the process-wide cache or storage.
pub fn dataset_info(
    path: &str,
    index: Option<&str>,
    want_stats: bool,
    extensions: &[String],
) -> Result<Arc<DatasetInfo>> {
    let key: CacheKey = (
        path.to_string(),
        index.map(ToString::to_string),
        want_stats,
        extensions.to_vec(),
    );
    {
        let cache = metadata_cache()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = cache.get(&key) {
            return Ok(Arc::clone(info));
        }
    }

    let info = Arc::new(load_dataset_info(
        path,
        index.filter(|_| want_stats),
        extensions,
    )?);
    metadata_cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, Arc::clone(&info));
    Ok(info)
}

fn load_dataset_info(
    path: &str,
    stats_column: Option<&str>,
    extensions: &[String],
) -> Result<DatasetInfo> {
    let files = resolve_files(path, extensions)?;
    let schema = file_schema(&files[0])?;
    log::debug!("planned dataset `{path}`: {} file(s)", files.len());

    let mut metas = Vec::with_capacity(files.len());
    for file in files {
        let handle = File::open(&file).map_err(|e| io_err(&file, e))?;
        let reader = SerializedFileReader::new(handle).map_err(|e| io_err(&file, e))?;
        let metadata = reader.metadata();

        let mut row_groups = Vec::with_capacity(metadata.num_row_groups());
        for i in 0..metadata.num_row_groups() {
            let group = metadata.row_group(i);
            let (index_min, index_max) = match stats_column {
                Some(column) => group_stats(group, column),
                None => (None, None),
            };
            row_groups.push(RowGroupMeta {
                rows: group.num_rows().max(0) as u64,
                bytes: group.total_byte_size().max(0) as u64,
                index_min,
                index_max,
            });
        }
        metas.push(FileMeta {
            path: file,
            row_groups,
        });
    }
    Ok(DatasetInfo {
        files: metas,
        schema,
    })
}

/// Schema of the dataset, inferred from the first file's footer.
fn file_schema(path: &str) -> Result<Schema> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| io_err(path, e))?;
    let fields = builder
        .schema()
        .fields()
        .iter()
        .map(|field| Ok(Field::new(field.name().clone(), planner_dtype(field.data_type())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

fn planner_dtype(dtype: &DataType) -> Result<DType> {
    match dtype {
        DataType::Boolean => Ok(DType::Bool),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Ok(DType::Int64),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Ok(DType::Float64),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok(DType::Utf8),
        other => Err(PlanError::Unsupported(format!(
            "no planner dtype for parquet column type {other}"
        ))),
    }
}

fn group_stats(
    group: &parquet::file::metadata::RowGroupMetaData,
    column: &str,
) -> (Option<Scalar>, Option<Scalar>) {
    group
        .columns()
        .iter()
        .find(|c| c.column_descr().name() == column)
        .and_then(|c| c.statistics())
        .map_or((None, None), stat_scalars)
}

fn stat_scalars(stats: &Statistics) -> (Option<Scalar>, Option<Scalar>) {
    match stats {
        Statistics::Boolean(s) => (
            s.min_opt().map(|v| Scalar::Bool(*v)),
            s.max_opt().map(|v| Scalar::Bool(*v)),
        ),
        Statistics::Int32(s) => (
            s.min_opt().map(|v| Scalar::Int(i64::from(*v))),
            s.max_opt().map(|v| Scalar::Int(i64::from(*v))),
        ),
        Statistics::Int64(s) => (
            s.min_opt().map(|v| Scalar::Int(*v)),
            s.max_opt().map(|v| Scalar::Int(*v)),
        ),
        Statistics::Float(s) => (
            s.min_opt().map(|v| Scalar::from(f64::from(*v))),
            s.max_opt().map(|v| Scalar::from(f64::from(*v))),
        ),
        Statistics::Double(s) => (
            s.min_opt().map(|v| Scalar::from(*v)),
            s.max_opt().map(|v| Scalar::from(*v)),
        ),
        Statistics::ByteArray(s) => (
            s.min_opt()
                .and_then(|v| v.as_utf8().ok())
                .map(|v| Scalar::Str(v.to_string())),
            s.max_opt()
                .and_then(|v| v.as_utf8().ok())
                .map(|v| Scalar::Str(v.to_string())),
        ),
        _ => (None, None),
    }
}

/* ---------- partitioning ---------- */

/// The resolved plan for one read node: output schema, divisions, and the
/// file slices backing each partition.
#[derive(Clone, Debug)]
pub struct ScanPlan {
    pub schema: Schema,
    pub divisions: Divisions,
    pub parts: Vec<Vec<FileSlice>>,
}

struct Part {
    slices: Vec<FileSlice>,
    bytes: u64,
    min: Option<Scalar>,
    max: Option<Scalar>,
}

/// Plan a read node: resolve files and footers (cached) and lay out
/// partitions per its operands.
pub fn scan_plan(expr: &Expr) -> Result<Arc<ScanPlan>> {
    let path = match expr.operand("path") {
        Some(Operand::Scalar(Scalar::Str(p))) => p.clone(),
        _ => {
            return Err(PlanError::MissingOperand {
                kind: "readparquet".to_string(),
                param: "path".to_string(),
            });
        }
    };
    let columns = expr.operand("columns").and_then(Operand::as_columns);
    let index = match expr.operand("index") {
        Some(Operand::Scalar(Scalar::Str(name))) => Some(name.clone()),
        _ => None,
    };
    let calculate_divisions = matches!(
        expr.operand("calculate_divisions"),
        Some(Operand::Scalar(Scalar::Bool(true)))
    );
    let blocksize = match expr.operand("blocksize").and_then(Operand::as_scalar) {
        Some(Scalar::Int(n)) if *n > 0 => *n as u64,
        _ => 134_217_728,
    };
    let split_row_groups = !matches!(
        expr.operand("split_row_groups"),
        Some(Operand::Scalar(Scalar::Bool(false)))
    );
    let aggregate_files = matches!(
        expr.operand("aggregate_files"),
        Some(Operand::Scalar(Scalar::Bool(true)))
    );
    let extensions = expr
        .operand("file_extension")
        .and_then(Operand::as_columns)
        .map(ColumnSpec::to_list)
        .unwrap_or_default();

    let want_stats = calculate_divisions && index.is_some();
    let info = dataset_info(&path, index.as_deref(), want_stats, &extensions)?;

    let schema = match columns {
        Some(spec) => info.schema.select(spec)?,
        None => info.schema.clone(),
    };

    let mut parts = layout_parts(&info, split_row_groups);
    if aggregate_files {
        parts = aggregate_parts(parts, blocksize);
    }
    let divisions = part_divisions(&parts, want_stats);

    Ok(Arc::new(ScanPlan {
        schema,
        divisions,
        parts: parts.into_iter().map(|p| p.slices).collect(),
    }))
}

fn layout_parts(info: &DatasetInfo, split_row_groups: bool) -> Vec<Part> {
    let mut parts = Vec::new();
    for file in &info.files {
        if split_row_groups {
            for (i, group) in file.row_groups.iter().enumerate() {
                parts.push(Part {
                    slices: vec![FileSlice {
                        path: file.path.clone(),
                        row_groups: vec![i],
                    }],
                    bytes: group.bytes,
                    min: group.index_min.clone(),
                    max: group.index_max.clone(),
                });
            }
        } else {
            parts.push(file_part(file));
        }
    }
    // Files with zero row groups vanish under row-group splitting; fall
    // back to one (empty) partition per file so the plan stays non-empty.
    if parts.is_empty() {
        parts = info.files.iter().map(file_part).collect();
    }
    parts
}

fn file_part(file: &FileMeta) -> Part {
    Part {
        slices: vec![FileSlice {
            path: file.path.clone(),
            row_groups: (0..file.row_groups.len()).collect(),
        }],
        bytes: file.row_groups.iter().map(|g| g.bytes).sum(),
        min: file.row_groups.first().and_then(|g| g.index_min.clone()),
        max: file.row_groups.last().and_then(|g| g.index_max.clone()),
    }
}

/// Greedily merge consecutive parts while they fit under the blocksize.
fn aggregate_parts(parts: Vec<Part>, blocksize: u64) -> Vec<Part> {
    let mut merged: Vec<Part> = Vec::new();
    for part in parts {
        match merged.last_mut() {
            Some(last) if last.bytes + part.bytes <= blocksize => {
                last.bytes += part.bytes;
                last.max = part.max;
                for slice in part.slices {
                    match last.slices.iter_mut().find(|s| s.path == slice.path) {
                        Some(existing) => existing.row_groups.extend(slice.row_groups),
                        None => last.slices.push(slice),
                    }
                }
            }
            _ => merged.push(part),
        }
    }
    merged
}

/// Known divisions from per-part statistics when every part carries them
/// and the parts are globally sorted and non-overlapping; unknown otherwise.
fn part_divisions(parts: &[Part], want_stats: bool) -> Divisions {
    if !want_stats || parts.is_empty() {
        return Divisions::unknown(parts.len());
    }
    let mut boundaries = Vec::with_capacity(parts.len() + 1);
    let mut prev_max: Option<&Scalar> = None;
    for part in parts {
        let (Some(min), Some(max)) = (&part.min, &part.max) else {
            return Divisions::unknown(parts.len());
        };
        let in_order = matches!(min.compare(max), Some(Ordering::Less | Ordering::Equal));
        let after_prev = prev_max
            .is_none_or(|p| matches!(p.compare(min), Some(Ordering::Less | Ordering::Equal)));
        if !in_order || !after_prev {
            return Divisions::unknown(parts.len());
        }
        boundaries.push(min.clone());
        prev_max = Some(max);
    }
    if let Some(max) = prev_max {
        boundaries.push(max.clone());
    }
    Divisions::known(boundaries)
}

/* ---------- lowering ---------- */

/// One read task per planned partition. The task is self-contained plain
/// data; the execution engine owns decoding and filter evaluation.
pub(crate) fn read_layer(expr: &Expr) -> Result<Vec<(Key, Task)>> {
    let plan = scan_plan(expr)?;
    let columns = expr
        .operand("columns")
        .and_then(Operand::as_columns)
        .map(ColumnSpec::to_list);
    let filters: Vec<Predicate> = match expr.operand("filters") {
        Some(Operand::Filters(filters)) => filters.clone(),
        _ => Vec::new(),
    };
    let index = match expr.operand("index") {
        Some(Operand::Scalar(Scalar::Str(name))) => Some(name.clone()),
        _ => None,
    };

    let name = expr.identity().to_string();
    Ok(plan
        .parts
        .iter()
        .enumerate()
        .map(|(i, slices)| {
            (
                (name.clone(), i),
                Task {
                    func: TaskFn::Read(ReadSpec {
                        files: slices.clone(),
                        columns: columns.clone(),
                        filters: filters.clone(),
                        index: index.clone(),
                    }),
                    args: Vec::new(),
                },
            )
        })
        .collect())
}
