use frameplan::{
    BinOp, CmpOp, ColumnSpec, DType, Expr, ExprRef, Kind, MemTable, Operand, PlanError, Scalar,
    from_memory, task_graph,
};

fn sample_table() -> anyhow::Result<MemTable> {
    Ok(MemTable::new(vec![
        ("x".to_string(), (0..10).map(Scalar::Int).collect()),
        (
            "y".to_string(),
            (0..10).map(|i| Scalar::from(i as f64 * 0.5)).collect(),
        ),
    ])?)
}

fn sample_frame() -> anyhow::Result<ExprRef> {
    Ok(from_memory(sample_table()?, 3)?)
}

#[test]
fn construction_fills_declared_defaults() -> anyhow::Result<()> {
    let table = sample_table()?;
    let df = Expr::with_kwargs(
        Kind::FromMemory,
        vec![Operand::Table(std::sync::Arc::new(table))],
        &[],
    )?;
    assert_eq!(df.operands().len(), 2);
    assert_eq!(
        df.operand("npartitions"),
        Some(&Operand::Scalar(Scalar::Int(1)))
    );
    Ok(())
}

#[test]
fn unknown_keyword_is_rejected() -> anyhow::Result<()> {
    let table = sample_table()?;
    let err = Expr::with_kwargs(
        Kind::FromMemory,
        vec![Operand::Table(std::sync::Arc::new(table))],
        &[("bogus", Operand::from(1i64))],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PlanError::UnexpectedOperand { keyword, .. } if keyword == "bogus"
    ));
    Ok(())
}

#[test]
fn missing_required_operand_is_rejected() {
    let err = Expr::new(Kind::FromMemory, vec![]).unwrap_err();
    assert!(matches!(
        err,
        PlanError::MissingOperand { param, .. } if param == "frame"
    ));
}

#[test]
fn too_many_positionals_are_rejected() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let err = Expr::new(
        Kind::Reduction(frameplan::Agg::Sum),
        vec![Operand::Expr(df), Operand::from(1i64)],
    )
    .unwrap_err();
    assert!(matches!(err, PlanError::UnexpectedOperand { .. }));
    Ok(())
}

#[test]
fn identity_is_stable_across_equivalent_trees() -> anyhow::Result<()> {
    let a = sample_frame()?.col("x")?.gt(5i64)?;
    let b = sample_frame()?.col("x")?.gt(5i64)?;
    assert_eq!(a.identity(), b.identity());
    assert!(a.structurally_equal(&b));

    let c = sample_frame()?.col("x")?.gt(6i64)?;
    assert_ne!(a.identity(), c.identity());
    Ok(())
}

#[test]
fn identity_distinguishes_series_from_single_column_frame() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let series = df.col("x")?;
    let frame = df.select(&["x"])?;
    assert_ne!(series.identity(), frame.identity());
    Ok(())
}

#[test]
fn literal_type_participates_in_identity() -> anyhow::Result<()> {
    let df = sample_frame()?;
    // 1 and 1.0 print the same; the computations are not the same.
    let by_int = df.mul(1i64)?;
    let by_float = df.mul(1.0f64)?;
    assert_ne!(by_int.identity(), by_float.identity());
    assert_eq!(by_int.schema()?.field("x").map(|f| f.dtype), Some(DType::Int64));
    assert_eq!(by_float.schema()?.field("x").map(|f| f.dtype), Some(DType::Float64));

    // Both multiplies survive lowering as distinct nodes: df, each
    // multiply, and the add contribute three tasks apiece.
    let plan = by_int.add(&by_float)?;
    let graph = task_graph(&plan)?;
    assert_eq!(graph.len(), 12);
    Ok(())
}

#[test]
fn identity_is_kind_prefixed_short_hex() -> anyhow::Result<()> {
    let ident = sample_frame()?.mul(2i64)?.identity().to_string();
    let hex = ident.strip_prefix("mul-").expect("kind prefix");
    assert_eq!(hex.len(), 16);
    assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    Ok(())
}

#[test]
fn col_resolves_against_schema() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let x = df.col("x")?;
    assert_eq!(x.kind(), Kind::Projection);
    assert_eq!(
        x.operand("columns"),
        Some(&Operand::Columns(ColumnSpec::One("x".to_string())))
    );

    let err = df.col("nope").unwrap_err();
    assert!(matches!(err, PlanError::UnknownAttribute(name) if name == "nope"));
    Ok(())
}

#[test]
fn divisions_have_one_more_boundary_than_partitions() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let divisions = df.divisions()?;
    assert_eq!(df.npartitions()?, 3);
    assert_eq!(divisions.0.len(), 4);
    assert!(!df.known_divisions()?);

    // Blockwise nodes inherit their input's divisions.
    let filtered = df.filter(&df.col("x")?.gt(5i64)?)?;
    assert_eq!(filtered.npartitions()?, 3);
    Ok(())
}

#[test]
fn blockwise_over_unaligned_frames_fails_at_construction() -> anyhow::Result<()> {
    let left = from_memory(sample_table()?, 3)?;
    let right = from_memory(sample_table()?, 2)?;
    let err = left.add(&right).unwrap_err();
    assert!(matches!(err, PlanError::UnalignedPartitions(_)));

    // Same partitioning is fine even across distinct leaves.
    let aligned = from_memory(sample_table()?, 3)?;
    assert!(left.add(&aligned).is_ok());
    Ok(())
}

#[test]
fn eq_builds_a_comparison_node_not_a_boolean() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let node = df.col("x")?.eq_expr(3i64)?;
    assert_eq!(node.kind(), Kind::Binary(BinOp::Cmp(CmpOp::Eq)));
    assert_eq!(node.schema()?.fields[0].dtype, DType::Bool);
    Ok(())
}

#[test]
fn schema_propagates_through_operations() -> anyhow::Result<()> {
    let df = sample_frame()?;
    assert_eq!(df.columns()?, vec!["x".to_string(), "y".to_string()]);

    let projected = df.select(&["y"])?;
    assert_eq!(projected.columns()?, vec!["y".to_string()]);

    // Arithmetic against an int literal promotes int columns but keeps
    // float columns float.
    let scaled = df.mul(2i64)?;
    let schema = scaled.schema()?;
    assert_eq!(schema.field("x").map(|f| f.dtype), Some(DType::Int64));
    assert_eq!(schema.field("y").map(|f| f.dtype), Some(DType::Float64));

    let counted = df.count()?;
    assert!(counted.schema()?.fields.iter().all(|f| f.dtype == DType::Int64));

    let sized = df.size()?;
    assert_eq!(sized.schema()?.columns(), vec!["size".to_string()]);
    Ok(())
}

#[test]
fn astype_casts_every_column() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let cast = df.astype(DType::Float64)?;
    let schema = cast.schema()?;
    assert_eq!(schema.columns(), vec!["x".to_string(), "y".to_string()]);
    assert!(schema.fields.iter().all(|f| f.dtype == DType::Float64));
    assert_eq!(cast.npartitions()?, 3);
    assert_eq!(cast.to_string(), "df.astype(\"float64\")");
    Ok(())
}

#[test]
fn index_is_a_single_integer_column() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let idx = df.index()?;
    let schema = idx.schema()?;
    assert_eq!(schema.columns(), vec!["index".to_string()]);
    assert_eq!(schema.field("index").map(|f| f.dtype), Some(DType::Int64));
    assert_eq!(idx.npartitions()?, 3);
    assert_eq!(idx.to_string(), "df.index");
    Ok(())
}

#[test]
fn mean_lowers_to_sum_over_count() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let mean = df.mean()?;
    assert_eq!(mean.kind(), Kind::Binary(BinOp::Div));
    let kinds: Vec<Kind> = mean
        .operands()
        .iter()
        .filter_map(Operand::as_expr)
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            Kind::Reduction(frameplan::Agg::Sum),
            Kind::Reduction(frameplan::Agg::Count)
        ]
    );
    Ok(())
}

#[test]
fn display_renders_pandas_like_plans() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let cmp = df.col("x")?.gt(5i64)?;
    assert_eq!(cmp.to_string(), "df[\"x\"] > 5");

    let filtered = df.filter(&cmp)?;
    assert_eq!(filtered.to_string(), "df[df[\"x\"] > 5]");

    let reduced = df.select(&["y"])?.sum()?;
    assert_eq!(reduced.to_string(), "df[[\"y\"]].sum()");
    Ok(())
}
