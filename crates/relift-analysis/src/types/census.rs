//! Census of a function's statements and terms.

use crate::cconv::CallsData;
use indexmap::IndexSet;
use relift_ir::{Function, Statement, StatementId, TermId, TermKind};

/// The ordered statements and terms of one function.
///
/// Statements appear in source order across blocks; terms appear in
/// first-encounter preorder, deduplicated. Keeping the natural code order
/// matters downstream: the fixed-point driver sweeps the sequences forward
/// and backward, and program order makes most facts propagate within a
/// single round.
///
/// Call statements contribute not only their target term but also the
/// synthetic argument/return hook terms recorded in [`CallsData`].
#[derive(Debug, Clone, Default)]
pub struct Census {
    statements: Vec<StatementId>,
    terms: IndexSet<TermId>,
}

impl Census {
    /// Collects the census of `function`. Pure; mutates nothing.
    pub fn of(function: &Function, calls_data: Option<&CallsData>) -> Self {
        let mut census = Self::default();
        for block in function.blocks() {
            for &statement in &block.statements {
                census.visit_statement(function, calls_data, statement);
            }
        }
        census
    }

    fn visit_statement(
        &mut self,
        function: &Function,
        calls_data: Option<&CallsData>,
        id: StatementId,
    ) {
        self.statements.push(id);
        match function.statement(id) {
            Statement::Comment(_) | Statement::InlineAssembly(_) | Statement::Return => {}
            Statement::Assignment { left, right } => {
                self.visit_term(function, *left);
                self.visit_term(function, *right);
            }
            Statement::Kill { term } | Statement::Touch { term } => {
                self.visit_term(function, *term);
            }
            Statement::Jump { condition, target } => {
                if let Some(condition) = condition {
                    self.visit_term(function, *condition);
                }
                if let Some(target) = target {
                    self.visit_term(function, *target);
                }
            }
            Statement::Call { target } => {
                self.visit_term(function, *target);
                if let Some(calls_data) = calls_data {
                    for &hook in calls_data.call_hook_terms(function, id) {
                        self.visit_term(function, hook);
                    }
                }
            }
        }
    }

    fn visit_term(&mut self, function: &Function, id: TermId) {
        if !self.terms.insert(id) {
            return;
        }
        match &function.term(id).kind {
            TermKind::IntConst { .. }
            | TermKind::Intrinsic
            | TermKind::Undefined
            | TermKind::MemoryLocationAccess { .. } => {}
            TermKind::Dereference { address } => self.visit_term(function, *address),
            TermKind::UnaryOp { operand, .. } => self.visit_term(function, *operand),
            TermKind::BinaryOp { left, right, .. } => {
                self.visit_term(function, *left);
                self.visit_term(function, *right);
            }
            TermKind::Choice {
                preferred,
                fallback,
            } => {
                self.visit_term(function, *preferred);
                self.visit_term(function, *fallback);
            }
        }
    }

    /// The statements in source order.
    pub fn statements(&self) -> &[StatementId] {
        &self.statements
    }

    /// The distinct terms in first-encounter order.
    pub fn terms(&self) -> &IndexSet<TermId> {
        &self.terms
    }
}
