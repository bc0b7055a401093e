//! Basic block representation.

use crate::StatementId;

/// Unique identifier for a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlockId(pub u32);

/// A basic block: a straight-line sequence of statements.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    /// Unique identifier for this block.
    pub id: BasicBlockId,
    /// Statements in source order.
    pub statements: Vec<StatementId>,
}

impl BasicBlock {
    /// Creates a new empty basic block.
    pub fn new(id: BasicBlockId) -> Self {
        Self {
            id,
            statements: Vec::new(),
        }
    }
}
