//! Error types for relift-ir.

use thiserror::Error;

/// IR integrity error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A term id does not refer into the function's term arena.
    #[error("invalid term id: {0:?}")]
    InvalidTermId(crate::TermId),

    /// A statement id does not refer into the function's statement arena.
    #[error("invalid statement id: {0:?}")]
    InvalidStatementId(crate::StatementId),

    /// A basic block id does not refer to a block of the function.
    #[error("invalid basic block id: {0:?}")]
    InvalidBlockId(crate::BasicBlockId),
}
