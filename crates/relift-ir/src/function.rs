//! Function representation: arenas of terms and statements plus basic blocks.

use crate::{
    BasicBlock, BasicBlockId, Error, Statement, StatementId, Term, TermId,
};
use crate::term::{Access, TermKind};

/// A lifted function.
///
/// The function owns three arenas - terms, statements, and basic blocks -
/// and hands out copyable ids into them. Blocks list their statements in
/// source order; statements refer to terms; compound terms refer to their
/// operand terms. Analyses walk the arenas through the id accessors and
/// never take ownership.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    name: String,
    terms: Vec<Term>,
    statements: Vec<Statement>,
    blocks: Vec<BasicBlock>,
}

impl Function {
    /// Creates a new empty function.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: Vec::new(),
            statements: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Returns the function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a term to the arena and returns its id.
    pub fn add_term(&mut self, term: Term) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term);
        id
    }

    /// Adds a new empty basic block and returns its id.
    pub fn add_block(&mut self) -> BasicBlockId {
        let id = BasicBlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Appends a statement to a block and returns its id.
    ///
    /// The destination of an assignment and the operand of a kill are marked
    /// [`Access::Write`]; every other term occurrence keeps its own flag.
    ///
    /// # Panics
    ///
    /// Panics if `block` does not refer to a block of this function.
    pub fn push_statement(&mut self, block: BasicBlockId, statement: Statement) -> StatementId {
        match &statement {
            Statement::Assignment { left, .. } => {
                self.terms[left.0 as usize].access = Access::Write;
            }
            Statement::Kill { term } => {
                self.terms[term.0 as usize].access = Access::Write;
            }
            _ => {}
        }
        let id = StatementId(self.statements.len() as u32);
        self.statements.push(statement);
        self.blocks[block.0 as usize].statements.push(id);
        id
    }

    /// Returns a term by id.
    ///
    /// # Panics
    ///
    /// Panics if the id is not from this function; ids are only ever minted
    /// by [`Self::add_term`], so an out-of-range id is a caller bug.
    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.0 as usize]
    }

    /// Returns a term by id, or an error for a foreign id.
    pub fn try_term(&self, id: TermId) -> Result<&Term, Error> {
        self.terms
            .get(id.0 as usize)
            .ok_or(Error::InvalidTermId(id))
    }

    /// Returns a statement by id.
    ///
    /// # Panics
    ///
    /// Panics if the id is not from this function.
    pub fn statement(&self, id: StatementId) -> &Statement {
        &self.statements[id.0 as usize]
    }

    /// Returns a statement by id, or an error for a foreign id.
    pub fn try_statement(&self, id: StatementId) -> Result<&Statement, Error> {
        self.statements
            .get(id.0 as usize)
            .ok_or(Error::InvalidStatementId(id))
    }

    /// Returns the basic blocks in insertion order.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns a block by id, or an error for a foreign id.
    pub fn try_block(&self, id: BasicBlockId) -> Result<&BasicBlock, Error> {
        self.blocks
            .get(id.0 as usize)
            .ok_or(Error::InvalidBlockId(id))
    }

    /// Returns every term id in arena order.
    pub fn term_ids(&self) -> impl Iterator<Item = TermId> + '_ {
        (0..self.terms.len() as u32).map(TermId)
    }

    /// Returns all return statements in block order.
    pub fn returns(&self) -> Vec<StatementId> {
        self.blocks
            .iter()
            .flat_map(|block| block.statements.iter().copied())
            .filter(|&id| self.statements[id.0 as usize].is_return())
            .collect()
    }

    /// Checks IR integrity: every id referenced by a statement or a compound
    /// term must refer into this function's arenas.
    pub fn validate(&self) -> Result<(), Error> {
        let check = |id: TermId| -> Result<(), Error> {
            self.try_term(id).map(|_| ())
        };
        for term in &self.terms {
            match &term.kind {
                TermKind::Dereference { address } => check(*address)?,
                TermKind::UnaryOp { operand, .. } => check(*operand)?,
                TermKind::BinaryOp { left, right, .. } => {
                    check(*left)?;
                    check(*right)?;
                }
                TermKind::Choice {
                    preferred,
                    fallback,
                } => {
                    check(*preferred)?;
                    check(*fallback)?;
                }
                TermKind::IntConst { .. }
                | TermKind::Intrinsic
                | TermKind::Undefined
                | TermKind::MemoryLocationAccess { .. } => {}
            }
        }
        for statement in &self.statements {
            match statement {
                Statement::Assignment { left, right } => {
                    check(*left)?;
                    check(*right)?;
                }
                Statement::Kill { term } | Statement::Touch { term } => check(*term)?,
                Statement::Jump { condition, target } => {
                    if let Some(condition) = condition {
                        check(*condition)?;
                    }
                    if let Some(target) = target {
                        check(*target)?;
                    }
                }
                Statement::Call { target } => check(*target)?,
                Statement::Comment(_) | Statement::InlineAssembly(_) | Statement::Return => {}
            }
        }
        for block in &self.blocks {
            for &id in &block.statements {
                self.try_statement(id)?;
            }
        }
        Ok(())
    }
}
