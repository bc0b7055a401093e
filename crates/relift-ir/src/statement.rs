//! IR statements - the top-level actions of lifted code.

use crate::TermId;

/// Unique identifier for a statement within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatementId(pub u32);

/// A statement in a basic block.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Statement {
    /// A free-form annotation carried through from lifting.
    Comment(String),

    /// Inline assembly that could not be lifted.
    InlineAssembly(String),

    /// `left := right`.
    Assignment { left: TermId, right: TermId },

    /// Invalidates a memory location; its value becomes undefined.
    Kill { term: TermId },

    /// A (possibly conditional, possibly computed) transfer of control.
    Jump {
        /// Branch condition, if conditional.
        condition: Option<TermId>,
        /// Computed target address term, if not a direct jump.
        target: Option<TermId>,
    },

    /// A call through a target address term.
    Call { target: TermId },

    /// Return to the caller.
    Return,

    /// Marks an access to a term for dataflow bookkeeping only.
    Touch { term: TermId },
}

impl Statement {
    /// Creates an assignment statement.
    pub fn assignment(left: TermId, right: TermId) -> Self {
        Self::Assignment { left, right }
    }

    /// Creates an unconditional direct jump.
    pub fn jump() -> Self {
        Self::Jump {
            condition: None,
            target: None,
        }
    }

    /// Creates a conditional jump.
    pub fn jump_if(condition: TermId) -> Self {
        Self::Jump {
            condition: Some(condition),
            target: None,
        }
    }

    /// Returns true if this is a return statement.
    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return)
    }
}
