#![cfg(feature = "io-parquet")]

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType as ArrowType, Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use frameplan::io::parquet::{natural_sort_key, resolve_files};
use frameplan::{
    BinOp, CmpOp, ColumnSpec, DType, Expr, Kind, Operand, PlanError, Predicate, Scalar, TaskFn,
    optimize, read_parquet, read_parquet_with, task_graph,
};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Write a two-column file (`x: i64`, `y: f64`) covering the given range.
fn write_file(
    path: &Path,
    values: std::ops::Range<i64>,
    row_group_size: usize,
) -> anyhow::Result<()> {
    let schema = Arc::new(ArrowSchema::new(vec![
        ArrowField::new("x", ArrowType::Int64, false),
        ArrowField::new("y", ArrowType::Float64, false),
    ]));
    let x: ArrayRef = Arc::new(Int64Array::from_iter_values(values.clone()));
    let y: ArrayRef = Arc::new(Float64Array::from_iter_values(
        values.map(|v| v as f64 * 0.5),
    ));
    let batch = RecordBatch::try_new(Arc::clone(&schema), vec![x, y])?;

    let props = WriterProperties::builder()
        .set_max_row_group_size(row_group_size)
        .build();
    let mut writer = ArrowWriter::try_new(File::create(path)?, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[test]
fn schema_is_inferred_from_footers() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 1024)?;

    let df = read_parquet(path.to_str().expect("utf8 path"))?;
    let schema = df.schema()?;
    assert_eq!(schema.columns(), vec!["x".to_string(), "y".to_string()]);
    assert_eq!(schema.field("x").map(|f| f.dtype), Some(DType::Int64));
    assert_eq!(schema.field("y").map(|f| f.dtype), Some(DType::Float64));
    Ok(())
}

#[test]
fn row_groups_become_partitions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 4)?;
    let path = path.to_str().expect("utf8 path");

    let per_group = read_parquet(path)?;
    assert_eq!(per_group.npartitions()?, 3);

    let per_file = read_parquet_with(path, &[("split_row_groups", Operand::from(false))])?;
    assert_eq!(per_file.npartitions()?, 1);
    Ok(())
}

#[test]
fn files_order_naturally() -> anyhow::Result<()> {
    assert!(natural_sort_key("part2.parquet") < natural_sort_key("part10.parquet"));
    assert!(natural_sort_key("a1b") < natural_sort_key("a1c"));

    let tmp = tempfile::tempdir()?;
    write_file(&tmp.path().join("part2.parquet"), 0..5, 1024)?;
    write_file(&tmp.path().join("part10.parquet"), 5..10, 1024)?;
    write_file(&tmp.path().join("ignored.txt.tmp"), 0..1, 1024)?;

    let dir = tmp.path().to_str().expect("utf8 path");
    let files = resolve_files(dir, &[".parquet".to_string()])?;
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("part2.parquet"));
    assert!(files[1].ends_with("part10.parquet"));
    Ok(())
}

#[test]
fn sorted_statistics_yield_known_divisions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_file(&tmp.path().join("part1.parquet"), 0..10, 1024)?;
    write_file(&tmp.path().join("part2.parquet"), 10..20, 1024)?;

    let df = read_parquet_with(
        tmp.path().to_str().expect("utf8 path"),
        &[
            ("index", Operand::from("x")),
            ("calculate_divisions", Operand::from(true)),
            ("split_row_groups", Operand::from(false)),
        ],
    )?;
    assert!(df.known_divisions()?);
    assert_eq!(
        df.divisions()?.0,
        vec![
            Some(Scalar::Int(0)),
            Some(Scalar::Int(10)),
            Some(Scalar::Int(19)),
        ]
    );
    Ok(())
}

#[test]
fn unsorted_statistics_fall_back_to_unknown() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    // Natural file order puts the high range first.
    write_file(&tmp.path().join("part1.parquet"), 10..20, 1024)?;
    write_file(&tmp.path().join("part2.parquet"), 0..10, 1024)?;

    let df = read_parquet_with(
        tmp.path().to_str().expect("utf8 path"),
        &[
            ("index", Operand::from("x")),
            ("calculate_divisions", Operand::from(true)),
            ("split_row_groups", Operand::from(false)),
        ],
    )?;
    assert!(!df.known_divisions()?);
    assert_eq!(df.npartitions()?, 2);
    Ok(())
}

#[test]
fn same_count_boundary_mismatch_reports_differing_boundaries() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_file(&tmp.path().join("part1.parquet"), 0..10, 1024)?;
    write_file(&tmp.path().join("part2.parquet"), 10..20, 1024)?;
    let dir = tmp.path().to_str().expect("utf8 path");

    // Same file set, same partition count; only one side knows its
    // boundaries.
    let plain = read_parquet_with(dir, &[("split_row_groups", Operand::from(false))])?;
    let with_divisions = read_parquet_with(
        dir,
        &[
            ("index", Operand::from("x")),
            ("calculate_divisions", Operand::from(true)),
            ("split_row_groups", Operand::from(false)),
        ],
    )?;

    let err = plain.add(&with_divisions).unwrap_err();
    match err {
        PlanError::UnalignedPartitions(message) => {
            assert!(message.contains("boundaries differ"), "{message}");
        }
        other => panic!("expected unaligned partitions, got {other:?}"),
    }
    Ok(())
}

#[test]
fn aggregate_files_merges_small_parts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_file(&tmp.path().join("part1.parquet"), 0..10, 1024)?;
    write_file(&tmp.path().join("part2.parquet"), 10..20, 1024)?;

    let df = read_parquet_with(
        tmp.path().to_str().expect("utf8 path"),
        &[
            ("split_row_groups", Operand::from(false)),
            ("aggregate_files", Operand::from(true)),
        ],
    )?;
    assert_eq!(df.npartitions()?, 1);
    Ok(())
}

#[test]
fn missing_dataset_fails_lazily() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nothing-here");

    // Construction never touches storage; planning does.
    let df = read_parquet(path.to_str().expect("utf8 path"))?;
    let err = df.schema().unwrap_err();
    assert!(matches!(err, PlanError::EmptyDataset(_)));
    Ok(())
}

#[test]
fn explicit_columns_narrow_the_schema() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 1024)?;

    let df = read_parquet_with(
        path.to_str().expect("utf8 path"),
        &[("columns", Operand::from(vec!["y".to_string()]))],
    )?;
    assert_eq!(df.schema()?.columns(), vec!["y".to_string()]);

    let bad = read_parquet_with(
        path.to_str().expect("utf8 path"),
        &[("columns", Operand::from(vec!["nope".to_string()]))],
    )?;
    assert!(matches!(
        bad.schema().unwrap_err(),
        PlanError::UnknownAttribute(name) if name == "nope"
    ));
    Ok(())
}

#[test]
fn projection_and_predicate_push_into_the_read() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 1024)?;

    let df = read_parquet(path.to_str().expect("utf8 path"))?;
    let plan = df.filter(&df.col("x")?.gt(5i64)?)?.select(&["y"])?;
    let optimized = optimize(&plan)?;

    assert_eq!(optimized.kind(), Kind::ReadParquet);
    assert_eq!(
        optimized.operand("columns"),
        Some(&Operand::Columns(ColumnSpec::Many(vec!["y".to_string()])))
    );
    assert_eq!(
        optimized.operand("filters"),
        Some(&Operand::Filters(vec![Predicate {
            column: "x".to_string(),
            op: CmpOp::Gt,
            value: Scalar::Int(5),
        }]))
    );

    // The compiled tasks carry the narrowed read spec.
    let graph = task_graph(&optimized)?;
    let task = graph
        .get(&(optimized.identity().to_string(), 0))
        .expect("read task");
    match &task.func {
        TaskFn::Read(spec) => {
            assert_eq!(spec.columns, Some(vec!["y".to_string()]));
            assert_eq!(spec.filters.len(), 1);
        }
        other => panic!("expected a read task, got {other:?}"),
    }
    Ok(())
}

#[test]
fn literal_on_the_left_flips_the_stored_operator() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 1024)?;

    let df = read_parquet(path.to_str().expect("utf8 path"))?;
    // 5 < x is stored column-first as x > 5.
    let cond = Expr::binary(BinOp::Cmp(CmpOp::Lt), Operand::from(5i64), &df.col("x")?)?;
    let optimized = optimize(&df.filter(&cond)?)?;

    assert_eq!(optimized.kind(), Kind::ReadParquet);
    assert_eq!(
        optimized.operand("filters"),
        Some(&Operand::Filters(vec![Predicate {
            column: "x".to_string(),
            op: CmpOp::Gt,
            value: Scalar::Int(5),
        }]))
    );
    Ok(())
}

#[test]
fn stacked_filters_accumulate_conjunctively() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("data.parquet");
    write_file(&path, 0..10, 1024)?;

    let df = read_parquet(path.to_str().expect("utf8 path"))?;
    let plan = df
        .filter(&df.col("x")?.gt(5i64)?)?
        .filter(&df.col("y")?.le(4.0f64)?)?;
    let optimized = optimize(&plan)?;

    assert_eq!(optimized.kind(), Kind::ReadParquet);
    assert_eq!(
        optimized.operand("filters"),
        Some(&Operand::Filters(vec![
            Predicate {
                column: "x".to_string(),
                op: CmpOp::Gt,
                value: Scalar::Int(5),
            },
            Predicate {
                column: "y".to_string(),
                op: CmpOp::Le,
                value: Scalar::from(4.0),
            },
        ]))
    );
    // No projection was pushed, so the read still exposes both columns.
    assert_eq!(
        optimized.schema()?.columns(),
        vec!["x".to_string(), "y".to_string()]
    );
    Ok(())
}
