//! Literal values that can appear inside an expression tree.
//!
//! Planning never touches real column data, but literals show up everywhere:
//! comparison thresholds, multiplication factors, partition boundaries pulled
//! out of file statistics. `Scalar` is the single representation for all of
//! them. Floats are wrapped in [`OrderedFloat`] so scalars are `Eq + Hash`
//! and can participate in content-addressed node identity.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A literal value bound into an expression node or task descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Scalar {
    /// Whether this is a plain numeric literal (int or float).
    ///
    /// Constant-folding rules only fire on numbers; everything else is left
    /// for the execution engine to complain about.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Multiply two numeric scalars, promoting to float when either side is.
    ///
    /// Returns `None` when either side is not a number, or when integer
    /// multiplication would overflow; callers decline the fold and keep
    /// the original tree.
    #[must_use]
    pub fn mul(&self, other: &Scalar) -> Option<Scalar> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.checked_mul(*b).map(Scalar::Int),
            (Scalar::Int(a), Scalar::Float(b)) => Some(Scalar::Float(OrderedFloat(*a as f64 * b.0))),
            (Scalar::Float(a), Scalar::Int(b)) => Some(Scalar::Float(OrderedFloat(a.0 * *b as f64))),
            (Scalar::Float(a), Scalar::Float(b)) => Some(Scalar::Float(OrderedFloat(a.0 * b.0))),
            _ => None,
        }
    }

    /// Order two scalars of compatible type; ints and floats compare
    /// numerically against each other. Incompatible types return `None`.
    #[must_use]
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Float(a), Scalar::Float(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Float(b)) => OrderedFloat(*a as f64).partial_cmp(b),
            (Scalar::Float(a), Scalar::Int(b)) => a.partial_cmp(&OrderedFloat(*b as f64)),
            (Scalar::Str(a), Scalar::Str(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Feed this literal into a content digest: a variant tag plus the raw
    /// value bytes. `Int(1)` and `Float(1.0)` render alike but must digest
    /// differently, so the display form never participates here.
    pub(crate) fn update_digest(&self, hasher: &mut Sha256) {
        match self {
            Scalar::Null => hasher.update(b"n"),
            Scalar::Bool(v) => hasher.update(if *v { b"b1" } else { b"b0" }),
            Scalar::Int(v) => {
                hasher.update(b"i");
                hasher.update(v.to_le_bytes());
            }
            Scalar::Float(v) => {
                hasher.update(b"f");
                hasher.update(v.0.to_le_bytes());
            }
            Scalar::Str(v) => {
                hasher.update(b"s");
                hasher.update((v.len() as u64).to_le_bytes());
                hasher.update(v.as_bytes());
            }
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{}", v.0),
            Scalar::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(OrderedFloat(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}
