//! Schema placeholders ("meta").
//!
//! Every node can describe the shape of its output -- column names and
//! dtypes -- without materializing any data. Rewrite rules reason about
//! these placeholders when deciding whether a projection or predicate can
//! move below an operation.

use crate::error::{PlanError, Result};
use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// The dtypes the planner understands. Everything coarser than this is the
/// execution engine's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int64,
    Float64,
    Utf8,
}

impl DType {
    /// Dtype of a literal, `None` for nulls.
    #[must_use]
    pub fn of(value: &Scalar) -> Option<DType> {
        match value {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DType::Bool),
            Scalar::Int(_) => Some(DType::Int64),
            Scalar::Float(_) => Some(DType::Float64),
            Scalar::Str(_) => Some(DType::Utf8),
        }
    }

    /// Canonical lowercase name, accepted back by [`DType::parse`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Utf8 => "utf8",
        }
    }

    /// Parse a canonical dtype name.
    #[must_use]
    pub fn parse(name: &str) -> Option<DType> {
        match name {
            "bool" => Some(DType::Bool),
            "int64" => Some(DType::Int64),
            "float64" => Some(DType::Float64),
            "utf8" => Some(DType::Utf8),
            _ => None,
        }
    }

    /// Result dtype of arithmetic between two dtypes, with numeric promotion.
    #[must_use]
    pub fn unify(a: DType, b: DType) -> Option<DType> {
        match (a, b) {
            (x, y) if x == y => Some(x),
            (DType::Int64, DType::Float64) | (DType::Float64, DType::Int64) => {
                Some(DType::Float64)
            }
            _ => None,
        }
    }
}

/// One named, typed column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// A column subset request: either one column (series-like result) or an
/// ordered list of columns (frame-like result).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSpec {
    One(String),
    Many(Vec<String>),
}

impl ColumnSpec {
    /// All requested names, in request order.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            ColumnSpec::One(name) => vec![name.clone()],
            ColumnSpec::Many(names) => names.clone(),
        }
    }

    /// The single requested column, if this spec names exactly one.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self {
            ColumnSpec::One(name) => Some(name),
            ColumnSpec::Many(names) if names.len() == 1 => Some(&names[0]),
            ColumnSpec::Many(_) => None,
        }
    }
}

impl Display for ColumnSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            ColumnSpec::One(name) => write!(f, "{name:?}"),
            ColumnSpec::Many(names) => {
                write!(f, "[")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name:?}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// An ordered set of fields describing a node's output shape.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Column names in schema order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Narrow to the requested columns, preserving request order.
    ///
    /// # Errors
    ///
    /// [`PlanError::UnknownAttribute`] if any requested name is absent.
    pub fn select(&self, spec: &ColumnSpec) -> Result<Schema> {
        let mut fields = Vec::new();
        for name in spec.to_list() {
            let field = self
                .field(&name)
                .ok_or_else(|| PlanError::UnknownAttribute(name.clone()))?;
            fields.push(field.clone());
        }
        Ok(Schema::new(fields))
    }

    /// Same fields with every dtype replaced, e.g. comparison results.
    #[must_use]
    pub fn with_dtype(&self, dtype: DType) -> Schema {
        Schema::new(
            self.fields
                .iter()
                .map(|f| Field::new(f.name.clone(), dtype))
                .collect(),
        )
    }
}
