use frameplan::{
    BinOp, Expr, ExprRef, Kind, MemTable, Operand, OptimizerConfig, Pat, PlanError, Rule,
    RuleCatalog, Scalar, from_memory, optimize, optimize_with_rules,
};

fn sample_frame() -> anyhow::Result<ExprRef> {
    let table = MemTable::new(vec![
        ("x".to_string(), (0..10).map(Scalar::Int).collect()),
        ("y".to_string(), (0..10).map(Scalar::Int).collect()),
    ])?;
    Ok(from_memory(table, 2)?)
}

#[test]
fn optimize_is_idempotent() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let plan = df.filter(&df.col("x")?.gt(3i64)?)?.select(&["y"])?;
    let once = optimize(&plan)?;
    let twice = optimize(&once)?;
    assert!(once.structurally_equal(&twice));
    Ok(())
}

#[test]
fn adding_a_node_to_itself_becomes_a_scale() -> anyhow::Result<()> {
    let x = sample_frame()?.col("x")?;
    let plan = x.add(&x)?;
    let optimized = optimize(&plan)?;

    assert_eq!(optimized.kind(), Kind::Binary(BinOp::Mul));
    assert_eq!(
        optimized.operands()[0],
        Operand::Scalar(Scalar::Int(2))
    );
    let rhs = optimized.operands()[1].as_expr().expect("expression side");
    assert_eq!(rhs.identity(), x.identity());
    Ok(())
}

#[test]
fn adding_distinct_nodes_is_left_alone() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let plan = df.col("x")?.add(&df.col("y")?)?;
    let optimized = optimize(&plan)?;
    assert!(optimized.structurally_equal(&plan));
    Ok(())
}

#[test]
fn nested_constant_multiplication_folds() -> anyhow::Result<()> {
    let x = sample_frame()?.col("x")?;
    let inner = Expr::binary(BinOp::Mul, 4i64, &x)?;
    let plan = Expr::binary(BinOp::Mul, 3i64, inner)?;
    let optimized = optimize(&plan)?;

    assert_eq!(optimized.kind(), Kind::Binary(BinOp::Mul));
    assert_eq!(
        optimized.operands()[0],
        Operand::Scalar(Scalar::Int(12))
    );
    let rhs = optimized.operands()[1].as_expr().expect("expression side");
    assert_eq!(rhs.identity(), x.identity());
    Ok(())
}

#[test]
fn overflowing_constant_multiplication_does_not_fold() -> anyhow::Result<()> {
    let x = sample_frame()?.col("x")?;
    let inner = Expr::binary(BinOp::Mul, 2i64, &x)?;
    let plan = Expr::binary(BinOp::Mul, i64::MAX, inner)?;
    let optimized = optimize(&plan)?;
    assert!(optimized.structurally_equal(&plan));
    Ok(())
}

#[test]
fn non_numeric_multiplication_does_not_fold() -> anyhow::Result<()> {
    let x = sample_frame()?.col("x")?;
    let inner = Expr::binary(BinOp::Mul, "b", &x)?;
    let plan = Expr::binary(BinOp::Mul, "a", inner)?;
    let optimized = optimize(&plan)?;
    assert!(optimized.structurally_equal(&plan));
    Ok(())
}

#[test]
fn projection_moves_below_filter() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let cond = df.col("x")?.gt(3i64)?;
    let plan = df.filter(&cond)?.select(&["y"])?;
    let optimized = optimize(&plan)?;

    assert_eq!(optimized.kind(), Kind::Filter);
    let frame = optimized.operands()[0].as_expr().expect("frame operand");
    assert_eq!(frame.kind(), Kind::Projection);
    assert_eq!(frame.columns()?, vec!["y".to_string()]);
    Ok(())
}

#[test]
fn projection_distributes_over_binary_operations() -> anyhow::Result<()> {
    let df = sample_frame()?;
    let plan = df.add(&df)?.select(&["x"])?;
    let optimized = optimize(&plan)?;

    // df + df collapses to 2 * df first, then the projection distributes
    // into the scaled side: 2 * df[["x"]].
    assert_eq!(optimized.kind(), Kind::Binary(BinOp::Mul));
    assert_eq!(
        optimized.operands()[0],
        Operand::Scalar(Scalar::Int(2))
    );
    let rhs = optimized.operands()[1].as_expr().expect("expression side");
    assert_eq!(rhs.kind(), Kind::Projection);
    assert_eq!(rhs.columns()?, vec!["x".to_string()]);
    Ok(())
}

#[test]
fn diverging_rules_hit_the_iteration_cap() -> anyhow::Result<()> {
    // A catalog whose only rule swaps the sides of an addition never
    // converges on an asymmetric tree.
    let mut catalog = RuleCatalog::default();
    catalog.push(Rule {
        name: "swap-add",
        pattern: Pat::node(
            Kind::Binary(BinOp::Add),
            vec![Pat::Bind("a"), Pat::Bind("b")],
        ),
        constraint: None,
        rewrite: Box::new(|caps| {
            let a = caps.get("a").expect("bound").clone();
            let b = caps.get("b").expect("bound").clone();
            Expr::new(Kind::Binary(BinOp::Add), vec![b, a])
        }),
    });

    let df = sample_frame()?;
    let plan = df.col("x")?.add(&df.col("y")?)?;
    let config = OptimizerConfig { max_iterations: 8 };
    let err = optimize_with_rules(&plan, &catalog, &config).unwrap_err();
    assert_eq!(err, PlanError::FixedPointExceeded(8));
    Ok(())
}

#[test]
fn failing_rewrite_surfaces_as_rule_failure() -> anyhow::Result<()> {
    let mut catalog = RuleCatalog::default();
    catalog.push(Rule {
        name: "broken",
        pattern: Pat::node(
            Kind::Binary(BinOp::Add),
            vec![Pat::Any, Pat::Any],
        ),
        constraint: None,
        rewrite: Box::new(|_| Err(PlanError::Unsupported("boom".to_string()))),
    });

    let df = sample_frame()?;
    let plan = df.col("x")?.add(&df.col("y")?)?;
    let err = optimize_with_rules(&plan, &catalog, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PlanError::RewriteFailure { rule, .. } if rule == "broken"
    ));
    Ok(())
}
