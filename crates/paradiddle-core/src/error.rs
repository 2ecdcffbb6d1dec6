//! Error types for paradiddle

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("unknown instrument id {0}")]
    UnknownInstrument(u16),
    #[error("lane length {got} does not match grid columns {expected}")]
    LaneLength { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, GridError>;
