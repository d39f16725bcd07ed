//! Dataset leaves: in-memory tables and columnar files.

pub mod memory;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;
