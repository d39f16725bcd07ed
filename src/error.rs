//! Planning error taxonomy.
//!
//! Every condition here propagates to the caller; the planner never retries.
//! Variants are string-backed so results can be memoized and cloned out of
//! per-node caches.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A keyword passed at construction does not match a declared parameter.
    #[error("unexpected operand `{keyword}` for {kind}")]
    UnexpectedOperand { kind: String, keyword: String },

    /// A parameter without a default was left unbound.
    #[error("missing operand `{param}` for {kind}")]
    MissingOperand { kind: String, param: String },

    /// Attribute access resolved to neither a node property nor a column.
    #[error("unknown attribute or column `{0}`")]
    UnknownAttribute(String),

    /// Blockwise construction over operands whose divisions differ.
    #[error("blockwise operands have unaligned partitions: {0}")]
    UnalignedPartitions(String),

    /// The node kind cannot compute a schema placeholder.
    #[error("meta is not implemented for {0}")]
    NotImplementedMeta(String),

    /// A rewrite function failed while transforming a matched subtree.
    /// Aborts the whole `optimize` call; no partial tree is returned.
    #[error("rewrite rule `{rule}` failed: {message}")]
    RewriteFailure { rule: String, message: String },

    /// The fixed-point loop ran out of passes without converging.
    #[error("optimizer did not reach a fixed point within {0} passes")]
    FixedPointExceeded(usize),

    /// Dataset resolution found no files.
    #[error("no files found for dataset `{0}`")]
    EmptyDataset(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// IO failure while reading planning metadata (file lists, footers).
    #[error("io error while planning `{path}`: {message}")]
    Io { path: String, message: String },
}

pub type Result<T, E = PlanError> = std::result::Result<T, E>;
