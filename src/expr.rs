//! The expression node model.
//!
//! User operations never execute anything: they build immutable [`Expr`]
//! nodes, shared through `Arc` so the tree is really a DAG. Each node kind
//! declares an ordered parameter list with optional defaults; construction
//! fills defaults, rejects unknown keywords, and -- for blockwise kinds --
//! verifies that all expression-typed operands share identical divisions.
//!
//! Identity is a content hash over `(kind, operands)`: a pure function of
//! operand values, stable across processes, memoized per node. Two nodes
//! with equal identity are the same computation and are deduplicated when
//! the tree is lowered to a task graph.
//!
//! Equality comes in two deliberately distinct flavors:
//! - [`Expr::eq_expr`] / [`Expr::ne_expr`] construct comparison *nodes*
//!   (the user-facing meaning of `==` on a lazy frame);
//! - [`Expr::structurally_equal`] compares identities and is used only by
//!   the pattern matcher.

use crate::divisions::Divisions;
use crate::error::{PlanError, Result};
use crate::io::memory::MemTable;
use crate::scalar::Scalar;
use crate::schema::{ColumnSpec, DType, Schema};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::{Arc, OnceLock};

/// Comparison operators, kept separate from arithmetic because predicate
/// pushdown needs their symbols and flipped forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    /// The operator symbol as it appears in a pushed-down filter triple.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }

    /// The operator with its operands swapped, so `5 < x` can be stored
    /// column-first as `x > 5`.
    #[must_use]
    pub fn flip(&self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
        }
    }

    #[must_use]
    pub fn all() -> [CmpOp; 6] {
        [CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge, CmpOp::Eq, CmpOp::Ne]
    }
}

/// Binary blockwise operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Cmp(CmpOp),
}

impl BinOp {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Cmp(CmpOp::Lt) => "lt",
            BinOp::Cmp(CmpOp::Le) => "le",
            BinOp::Cmp(CmpOp::Gt) => "gt",
            BinOp::Cmp(CmpOp::Ge) => "ge",
            BinOp::Cmp(CmpOp::Eq) => "eq",
            BinOp::Cmp(CmpOp::Ne) => "ne",
        }
    }

    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Cmp(op) => op.symbol(),
        }
    }

    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinOp::Cmp(_))
    }
}

/// Whole-frame reductions; all collapse to a single unknown-boundary
/// partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Agg {
    Sum,
    Min,
    Max,
    Count,
    Size,
}

impl Agg {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Agg::Sum => "sum",
            Agg::Min => "min",
            Agg::Max => "max",
            Agg::Count => "count",
            Agg::Size => "size",
        }
    }
}

/// One conjunctive filter clause pushed into a columnar read:
/// `(column, operator, literal)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: CmpOp,
    pub value: Scalar,
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f, "({:?}, {:?}, {})", self.column, self.op.symbol(), self.value)
    }
}

/// The operator variant of a node. Each kind declares a fixed parameter
/// list; operand count and order always match it after default-filling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    FromMemory,
    ReadParquet,
    Projection,
    Filter,
    Index,
    AsType,
    Binary(BinOp),
    Reduction(Agg),
}

impl Kind {
    /// Lowercase token used as the identity prefix, mirroring how task keys
    /// read in diagnostics (`mul-ab12...`, `readparquet-9f00...`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Kind::FromMemory => "frommemory",
            Kind::ReadParquet => "readparquet",
            Kind::Projection => "projection",
            Kind::Filter => "filter",
            Kind::Index => "index",
            Kind::AsType => "astype",
            Kind::Binary(op) => op.name(),
            Kind::Reduction(agg) => agg.name(),
        }
    }

    /// Ordered parameter names declared by this kind.
    #[must_use]
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Kind::FromMemory => &["frame", "npartitions"],
            Kind::ReadParquet => &[
                "path",
                "columns",
                "filters",
                "index",
                "categories",
                "calculate_divisions",
                "blocksize",
                "split_row_groups",
                "aggregate_files",
                "file_extension",
            ],
            Kind::Projection => &["frame", "columns"],
            Kind::Filter => &["frame", "predicate"],
            Kind::Index => &["frame"],
            Kind::AsType => &["frame", "dtype"],
            Kind::Binary(_) => &["left", "right"],
            Kind::Reduction(_) => &["frame"],
        }
    }

    /// Default value for a parameter, if it has one.
    #[must_use]
    pub fn default_operand(&self, param: &str) -> Option<Operand> {
        match (self, param) {
            (Kind::FromMemory, "npartitions") => Some(Operand::Scalar(Scalar::Int(1))),
            (Kind::ReadParquet, "columns" | "filters" | "index" | "categories") => {
                Some(Operand::None)
            }
            (Kind::ReadParquet, "calculate_divisions") => {
                Some(Operand::Scalar(Scalar::Bool(false)))
            }
            // 128 MiB, the conventional target chunk size.
            (Kind::ReadParquet, "blocksize") => Some(Operand::Scalar(Scalar::Int(134_217_728))),
            (Kind::ReadParquet, "split_row_groups") => Some(Operand::Scalar(Scalar::Bool(true))),
            (Kind::ReadParquet, "aggregate_files") => Some(Operand::Scalar(Scalar::Bool(false))),
            (Kind::ReadParquet, "file_extension") => Some(Operand::Columns(ColumnSpec::Many(
                vec![".parquet".into(), ".parq".into(), ".pq".into()],
            ))),
            _ => None,
        }
    }

    /// Whether partition `i` of this node depends only on partition `i` of
    /// its inputs.
    #[must_use]
    pub fn is_blockwise(&self) -> bool {
        matches!(
            self,
            Kind::Projection | Kind::Filter | Kind::Index | Kind::AsType | Kind::Binary(_)
        )
    }
}

/// A value bound to a node parameter: a literal/config value or another
/// expression node.
#[derive(Clone, Debug)]
pub enum Operand {
    None,
    Scalar(Scalar),
    Columns(ColumnSpec),
    Filters(Vec<Predicate>),
    Table(Arc<MemTable>),
    Expr(Arc<Expr>),
}

impl Operand {
    #[must_use]
    pub fn as_expr(&self) -> Option<&Arc<Expr>> {
        match self {
            Operand::Expr(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Operand::Scalar(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_columns(&self) -> Option<&ColumnSpec> {
        match self {
            Operand::Columns(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }

    /// Feed this operand's content into an identity hash. Expressions
    /// contribute their own (memoized) identity, so hashing is linear in
    /// DAG size, not tree size.
    fn update_token(&self, hasher: &mut Sha256) {
        match self {
            Operand::None => hasher.update(b"#none"),
            Operand::Scalar(s) => {
                hasher.update(b"#scalar:");
                s.update_digest(hasher);
            }
            Operand::Columns(spec) => {
                hasher.update(b"#columns:");
                hasher.update(spec.to_string().as_bytes());
                if matches!(spec, ColumnSpec::One(_)) {
                    hasher.update(b"#one");
                }
            }
            Operand::Filters(preds) => {
                hasher.update(b"#filters:");
                for p in preds {
                    hasher.update(p.column.as_bytes());
                    hasher.update(p.op.symbol().as_bytes());
                    p.value.update_digest(hasher);
                }
            }
            Operand::Table(t) => {
                hasher.update(b"#table:");
                hasher.update(t.fingerprint().as_bytes());
            }
            Operand::Expr(e) => {
                hasher.update(b"#expr:");
                hasher.update(e.identity().as_bytes());
            }
        }
    }
}

/// Structural (engine-internal) equality: expressions compare by identity,
/// everything else by value. This is what repeated pattern captures and the
/// fixed-point check rely on; it is *not* the user-facing `==`.
impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::None, Operand::None) => true,
            (Operand::Scalar(a), Operand::Scalar(b)) => a == b,
            (Operand::Columns(a), Operand::Columns(b)) => a == b,
            (Operand::Filters(a), Operand::Filters(b)) => a == b,
            (Operand::Table(a), Operand::Table(b)) => a.fingerprint() == b.fingerprint(),
            (Operand::Expr(a), Operand::Expr(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl Eq for Operand {}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Scalar(Scalar::Int(v))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Scalar(Scalar::Int(i64::from(v)))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Scalar(v.into())
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Scalar(Scalar::Bool(v))
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Scalar(Scalar::Str(v.to_string()))
    }
}

impl From<Scalar> for Operand {
    fn from(v: Scalar) -> Self {
        Operand::Scalar(v)
    }
}

impl From<ColumnSpec> for Operand {
    fn from(v: ColumnSpec) -> Self {
        Operand::Columns(v)
    }
}

impl From<Vec<String>> for Operand {
    fn from(v: Vec<String>) -> Self {
        Operand::Columns(ColumnSpec::Many(v))
    }
}

impl From<&[&str]> for Operand {
    fn from(v: &[&str]) -> Self {
        Operand::Columns(ColumnSpec::Many(v.iter().map(|s| (*s).to_string()).collect()))
    }
}

impl From<Vec<Predicate>> for Operand {
    fn from(v: Vec<Predicate>) -> Self {
        Operand::Filters(v)
    }
}

impl From<Arc<Expr>> for Operand {
    fn from(v: Arc<Expr>) -> Self {
        Operand::Expr(v)
    }
}

impl From<&Arc<Expr>> for Operand {
    fn from(v: &Arc<Expr>) -> Self {
        Operand::Expr(Arc::clone(v))
    }
}

/// Shared handle to an immutable expression node.
pub type ExprRef = Arc<Expr>;

/// An immutable expression node: a kind plus the operands bound to its
/// declared parameters. Rewriting always builds new nodes.
#[derive(Clone, Debug)]
pub struct Expr {
    kind: Kind,
    operands: Vec<Operand>,
    ident: OnceLock<String>,
    divisions: OnceLock<Result<Divisions>>,
}

impl Expr {
    /// Construct a node from positional operands only.
    ///
    /// # Errors
    ///
    /// See [`Expr::with_kwargs`].
    pub fn new(kind: Kind, operands: Vec<Operand>) -> Result<ExprRef> {
        Self::with_kwargs(kind, operands, &[])
    }

    /// Construct a node of `kind`: positional operands fill the leading
    /// parameters, keywords fill the rest by name, anything still unbound
    /// takes the kind's declared default.
    ///
    /// # Errors
    ///
    /// - [`PlanError::UnexpectedOperand`] for a keyword that matches no
    ///   declared (or still-unbound) parameter, or for too many positionals.
    /// - [`PlanError::MissingOperand`] for an unbound parameter without a
    ///   default.
    /// - [`PlanError::UnalignedPartitions`] when a blockwise kind is given
    ///   expression operands whose divisions differ.
    pub fn with_kwargs(
        kind: Kind,
        positional: Vec<Operand>,
        kwargs: &[(&str, Operand)],
    ) -> Result<ExprRef> {
        let params = kind.parameters();
        if positional.len() > params.len() {
            return Err(PlanError::UnexpectedOperand {
                kind: kind.name().to_string(),
                keyword: format!("positional #{}", params.len() + 1),
            });
        }

        let mut operands = positional;
        let mut remaining: Vec<(&str, Operand)> = kwargs.to_vec();
        for param in &params[operands.len()..] {
            if let Some(pos) = remaining.iter().position(|(name, _)| name == param) {
                operands.push(remaining.remove(pos).1);
            } else if let Some(default) = kind.default_operand(param) {
                operands.push(default);
            } else {
                return Err(PlanError::MissingOperand {
                    kind: kind.name().to_string(),
                    param: (*param).to_string(),
                });
            }
        }
        if let Some((name, _)) = remaining.first() {
            return Err(PlanError::UnexpectedOperand {
                kind: kind.name().to_string(),
                keyword: (*name).to_string(),
            });
        }

        if kind.is_blockwise() {
            check_alignment(kind, &operands)?;
        }

        Ok(Arc::new(Expr {
            kind,
            operands,
            ident: OnceLock::new(),
            divisions: OnceLock::new(),
        }))
    }

    /// Build a binary node directly from two operands (either side may be a
    /// literal). Used by operator methods and rewrite rules alike.
    pub fn binary(
        op: BinOp,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Result<ExprRef> {
        Expr::new(Kind::Binary(op), vec![left.into(), right.into()])
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The operand bound to a declared parameter name.
    #[must_use]
    pub fn operand(&self, name: &str) -> Option<&Operand> {
        let idx = self.kind.parameters().iter().position(|p| *p == name)?;
        self.operands.get(idx)
    }

    /// Content-addressed identity: `<kind>-<16 hex of sha256(kind, operands)>`.
    /// Lazily computed, memoized, stable across processes.
    pub fn identity(&self) -> &str {
        self.ident
            .get_or_init(|| {
                let mut hasher = Sha256::new();
                hasher.update(self.kind.name().as_bytes());
                for operand in &self.operands {
                    operand.update_token(&mut hasher);
                }
                format!("{}-{}", self.kind.name(), short_hex(&hasher.finalize()))
            })
            .as_str()
    }

    /// Engine-internal structural equality over content identity. Distinct
    /// from [`Expr::eq_expr`], which builds a comparison node.
    #[must_use]
    pub fn structurally_equal(&self, other: &Expr) -> bool {
        self.identity() == other.identity()
    }

    /// Partition boundaries for this node; memoized per node.
    ///
    /// # Errors
    ///
    /// IO leaves propagate planning failures; blockwise kinds propagate
    /// their first expression operand's failure.
    pub fn divisions(&self) -> Result<Divisions> {
        self.divisions
            .get_or_init(|| self.compute_divisions())
            .clone()
    }

    fn compute_divisions(&self) -> Result<Divisions> {
        match self.kind {
            Kind::FromMemory => {
                let bounds = crate::io::memory::slice_boundaries(self)?;
                Ok(Divisions::unknown(bounds.len().saturating_sub(1)))
            }
            #[cfg(feature = "io-parquet")]
            Kind::ReadParquet => Ok(crate::io::parquet::scan_plan(self)?.divisions.clone()),
            #[cfg(not(feature = "io-parquet"))]
            Kind::ReadParquet => Err(PlanError::Unsupported(
                "parquet planning requires the `io-parquet` feature".to_string(),
            )),
            Kind::Reduction(_) => Ok(Divisions::unknown(1)),
            Kind::Projection | Kind::Filter | Kind::Index | Kind::AsType | Kind::Binary(_) => {
                let first = self
                    .operands
                    .iter()
                    .find_map(Operand::as_expr)
                    .ok_or_else(|| PlanError::NotImplementedMeta(self.kind.name().to_string()))?;
                first.divisions()
            }
        }
    }

    /// Number of partitions, always `divisions().len() - 1`.
    pub fn npartitions(&self) -> Result<usize> {
        Ok(self.divisions()?.npartitions())
    }

    /// Whether ordered partition boundaries are known.
    pub fn known_divisions(&self) -> Result<bool> {
        Ok(self.divisions()?.is_known())
    }

    /// Schema placeholder for this node's output; derived without touching
    /// data.
    pub fn schema(&self) -> Result<Schema> {
        crate::blockwise::schema_of(self)
    }

    /// Column names: the declared `columns` operand when present and set,
    /// otherwise the schema's columns.
    pub fn columns(&self) -> Result<Vec<String>> {
        if let Some(Operand::Columns(spec)) = self.operand("columns") {
            return Ok(spec.to_list());
        }
        Ok(self.schema()?.columns())
    }

    fn to_operand(&self) -> Operand {
        Operand::Expr(Arc::new(self.clone()))
    }

    /* ---------- user-facing operator methods ---------- */

    pub fn add(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Add, self.to_operand(), other)
    }

    pub fn sub(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Sub, self.to_operand(), other)
    }

    pub fn mul(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Mul, self.to_operand(), other)
    }

    pub fn div(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Div, self.to_operand(), other)
    }

    pub fn lt(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Lt), self.to_operand(), other)
    }

    pub fn le(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Le), self.to_operand(), other)
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Gt), self.to_operand(), other)
    }

    pub fn ge(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Ge), self.to_operand(), other)
    }

    /// Build an equality *comparison node*. This is the user-facing `==`;
    /// the matcher never calls it.
    pub fn eq_expr(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Eq), self.to_operand(), other)
    }

    /// Build an inequality comparison node.
    pub fn ne_expr(&self, other: impl Into<Operand>) -> Result<ExprRef> {
        Expr::binary(BinOp::Cmp(CmpOp::Ne), self.to_operand(), other)
    }

    /// Select an ordered list of columns (`df[["a", "b"]]`).
    pub fn select(&self, columns: &[&str]) -> Result<ExprRef> {
        Expr::new(
            Kind::Projection,
            vec![
                self.to_operand(),
                Operand::Columns(ColumnSpec::Many(
                    columns.iter().map(|c| (*c).to_string()).collect(),
                )),
            ],
        )
    }

    /// Select a single column by name (`df.x`). Resolves against the schema
    /// first; an unknown name fails with [`PlanError::UnknownAttribute`].
    pub fn col(&self, name: &str) -> Result<ExprRef> {
        if !self.schema()?.has_column(name) {
            return Err(PlanError::UnknownAttribute(name.to_string()));
        }
        Expr::new(
            Kind::Projection,
            vec![
                self.to_operand(),
                Operand::Columns(ColumnSpec::One(name.to_string())),
            ],
        )
    }

    /// Keep rows where `predicate` (a boolean expression over this frame)
    /// holds (`df[df.x > 1]`).
    pub fn filter(&self, predicate: &ExprRef) -> Result<ExprRef> {
        Expr::new(
            Kind::Filter,
            vec![self.to_operand(), Operand::Expr(Arc::clone(predicate))],
        )
    }

    /// The frame's row index as a single-column series (`df.index`).
    pub fn index(&self) -> Result<ExprRef> {
        Expr::new(Kind::Index, vec![self.to_operand()])
    }

    /// Cast every column to `dtype` (`df.astype("float64")`).
    pub fn astype(&self, dtype: DType) -> Result<ExprRef> {
        Expr::new(
            Kind::AsType,
            vec![
                self.to_operand(),
                Operand::Scalar(Scalar::Str(dtype.name().to_string())),
            ],
        )
    }

    pub fn sum(&self) -> Result<ExprRef> {
        Expr::new(Kind::Reduction(Agg::Sum), vec![self.to_operand()])
    }

    pub fn min(&self) -> Result<ExprRef> {
        Expr::new(Kind::Reduction(Agg::Min), vec![self.to_operand()])
    }

    pub fn max(&self) -> Result<ExprRef> {
        Expr::new(Kind::Reduction(Agg::Max), vec![self.to_operand()])
    }

    pub fn count(&self) -> Result<ExprRef> {
        Expr::new(Kind::Reduction(Agg::Count), vec![self.to_operand()])
    }

    pub fn size(&self) -> Result<ExprRef> {
        Expr::new(Kind::Reduction(Agg::Size), vec![self.to_operand()])
    }

    /// `mean = sum / count`, composed from existing kinds.
    pub fn mean(&self) -> Result<ExprRef> {
        let total = self.sum()?;
        let n = self.count()?;
        Expr::binary(BinOp::Div, Operand::Expr(total), Operand::Expr(n))
    }
}

/// First eight digest bytes as lowercase hex; the digest array carries no
/// hex formatter of its own.
pub(crate) fn short_hex(digest: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

/// Verify that every expression-typed operand of a blockwise node shares
/// the same divisions.
fn check_alignment(kind: Kind, operands: &[Operand]) -> Result<()> {
    let mut first: Option<(usize, Divisions)> = None;
    for (idx, operand) in operands.iter().enumerate() {
        let Some(expr) = operand.as_expr() else {
            continue;
        };
        let divisions = expr.divisions()?;
        match &first {
            None => first = Some((idx, divisions)),
            Some((first_idx, expected)) => {
                if *expected != divisions {
                    let params = kind.parameters();
                    let detail = if expected.npartitions() == divisions.npartitions() {
                        format!(
                            "{} and {} both have {} partitions but their boundaries differ",
                            params[*first_idx],
                            params[idx],
                            expected.npartitions(),
                        )
                    } else {
                        format!(
                            "{} has {} partitions but {} has {}",
                            params[*first_idx],
                            expected.npartitions(),
                            params[idx],
                            divisions.npartitions(),
                        )
                    };
                    return Err(PlanError::UnalignedPartitions(detail));
                }
            }
        }
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self.kind {
            Kind::FromMemory => write!(f, "df"),
            Kind::ReadParquet => match self.operand("path") {
                Some(Operand::Scalar(path)) => write!(f, "ReadParquet({path})"),
                _ => write!(f, "ReadParquet(?)"),
            },
            Kind::Projection => {
                let frame = self.operands.first().map(display_operand).unwrap_or_default();
                let frame = parenthesize(frame);
                match self.operand("columns") {
                    Some(Operand::Columns(spec)) => write!(f, "{frame}[{spec}]"),
                    _ => write!(f, "{frame}[?]"),
                }
            }
            Kind::Filter => {
                let frame = self.operands.first().map(display_operand).unwrap_or_default();
                let pred = self.operands.get(1).map(display_operand).unwrap_or_default();
                write!(f, "{}[{pred}]", parenthesize(frame))
            }
            Kind::Index => {
                let frame = self.operands.first().map(display_operand).unwrap_or_default();
                write!(f, "{}.index", parenthesize(frame))
            }
            Kind::AsType => {
                let frame = self.operands.first().map(display_operand).unwrap_or_default();
                let dtype = self.operand("dtype").map(display_operand).unwrap_or_default();
                write!(f, "{}.astype({dtype})", parenthesize(frame))
            }
            Kind::Binary(op) => {
                let left = self.operands.first().map(display_operand).unwrap_or_default();
                let right = self.operands.get(1).map(display_operand).unwrap_or_default();
                write!(f, "{left} {} {right}", op.symbol())
            }
            Kind::Reduction(agg) => {
                let frame = self.operands.first().map(display_operand).unwrap_or_default();
                write!(f, "{}.{}()", parenthesize(frame), agg.name())
            }
        }
    }
}

fn display_operand(operand: &Operand) -> String {
    match operand {
        Operand::None => "null".to_string(),
        Operand::Scalar(s) => s.to_string(),
        Operand::Columns(c) => c.to_string(),
        Operand::Filters(preds) => {
            let items: Vec<String> = preds.iter().map(ToString::to_string).collect();
            format!("[{}]", items.join(", "))
        }
        Operand::Table(_) => "df".to_string(),
        Operand::Expr(e) => e.to_string(),
    }
}

fn parenthesize(rendered: String) -> String {
    if rendered.contains(' ') {
        format!("({rendered})")
    } else {
        rendered
    }
}
