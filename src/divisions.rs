//! Partition boundary model shared by every node.
//!
//! A node with `n` partitions carries `n + 1` boundary values along its
//! index. Boundaries are `None` placeholders when no ordering is known,
//! which is the common case; only sources that derive boundaries from file
//! statistics produce known divisions.

use crate::scalar::Scalar;
use serde::{Deserialize, Serialize};

/// Ordered partition boundaries; length is always `npartitions + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divisions(pub Vec<Option<Scalar>>);

impl Divisions {
    /// Boundaries for `npartitions` partitions with no known ordering.
    #[must_use]
    pub fn unknown(npartitions: usize) -> Self {
        Self(vec![None; npartitions + 1])
    }

    /// Boundaries known from source statistics.
    #[must_use]
    pub fn known(boundaries: Vec<Scalar>) -> Self {
        Self(boundaries.into_iter().map(Some).collect())
    }

    #[must_use]
    pub fn npartitions(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Whether boundaries are usable for division-aware rewrites.
    /// Rules that need ordered boundaries must check this and decline
    /// to fire otherwise.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !self.0.is_empty() && self.0[0].is_some()
    }
}
