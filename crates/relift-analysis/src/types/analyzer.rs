//! Fixed-point type reconstruction.
//!
//! [`TypeAnalyzer`] walks one function's census and repeatedly applies local
//! constraint rules - per term kind and per statement kind - to the type
//! store until nothing changes. Every rule only adds monotone facts, so the
//! iteration order influences speed, never the result.

use crate::cconv::CallsData;
use crate::dataflow::Dataflow;
use crate::types::{Census, TypeStore};
use crate::usage::Usage;
use relift_ir::{
    BinaryOp, CancellationToken, Function, Statement, StatementId, TermId, TermKind, UnaryOp,
};
use tracing::{debug, warn};

/// Concrete addends below this are treated as offsets from a base rather
/// than as base addresses themselves.
const SMALL_IMMEDIATE_LIMIT: u64 = 4096;

/// Reconstructs high-level types for the terms of a function.
pub struct TypeAnalyzer<'a> {
    types: TypeStore,
    dataflow: &'a Dataflow,
    calls_data: Option<&'a CallsData>,
    usage: &'a Usage,
}

impl<'a> TypeAnalyzer<'a> {
    /// Creates an analyzer over the given oracles with an empty type store.
    pub fn new(dataflow: &'a Dataflow, calls_data: Option<&'a CallsData>, usage: &'a Usage) -> Self {
        Self {
            types: TypeStore::new(),
            dataflow,
            calls_data,
            usage,
        }
    }

    /// The reconstructed types.
    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    /// Consumes the analyzer, returning the type store.
    pub fn into_types(self) -> TypeStore {
        self.types
    }

    /// Runs type reconstruction for `function` until a fixed point is
    /// reached or `canceled` fires. Cancellation is polled between rounds;
    /// a canceled run leaves a consistent partial result in the store.
    pub fn analyze(&mut self, function: &Function, canceled: &CancellationToken) {
        let census = Census::of(function, self.calls_data);

        // Join each read term with its definitions, but only when the
        // definitions form a single chunk covering exactly the term's own
        // memory location. Partial or multi-chunk definitions still get
        // related through the statement rules.
        for &term in census.terms() {
            if !function.term(term).is_read() {
                continue;
            }
            let Some(definitions) = self.dataflow.definitions(term) else {
                continue;
            };
            let [chunk] = definitions.chunks() else {
                continue;
            };
            if Some(chunk.location()) != self.dataflow.memory_location(term) {
                continue;
            }
            for &definition in chunk.definitions() {
                let term_type = self.types.type_of(term);
                let definition_type = self.types.type_of(definition);
                self.types.union_set(term_type, definition_type);
            }
        }

        // The value returned through every return site is one value; join
        // the carrier terms across all of them.
        if let Some(calls_data) = self.calls_data {
            if let Some(return_value) = calls_data
                .signature(function)
                .and_then(|signature| signature.return_value)
            {
                let mut first: Option<TermId> = None;
                for ret in function.returns() {
                    let Some(analyzer) = calls_data.return_analyzer(function, ret) else {
                        continue;
                    };
                    let Some(term) = analyzer.return_value_term(return_value) else {
                        continue;
                    };
                    match first {
                        None => first = Some(term),
                        Some(first_term) => {
                            let a = self.types.type_of(first_term);
                            let b = self.types.type_of(term);
                            self.types.union_set(a, b);
                        }
                    }
                }
            }
        }

        // Keep the census order but drop unused terms. The natural ordering
        // of the code makes the iteration converge much faster than walking
        // the used set in arbitrary order would.
        let terms: Vec<TermId> = census
            .terms()
            .iter()
            .copied()
            .filter(|&term| self.usage.is_used(term))
            .collect();

        let mut rounds = 0usize;
        loop {
            for &term in &terms {
                self.analyze_term(function, term);
            }
            for &term in terms.iter().rev() {
                self.analyze_term(function, term);
            }
            for &statement in census.statements() {
                self.analyze_statement(function, statement);
            }
            for &statement in census.statements().iter().rev() {
                self.analyze_statement(function, statement);
            }

            rounds += 1;
            if !self.types.take_changed() || canceled.is_cancelled() {
                break;
            }
        }
        debug!(
            function = function.name(),
            rounds,
            terms = terms.len(),
            "type reconstruction finished"
        );
    }

    fn analyze_term(&mut self, function: &Function, term: TermId) {
        match &function.term(term).kind {
            TermKind::IntConst { .. }
            | TermKind::Intrinsic
            | TermKind::Undefined
            | TermKind::MemoryLocationAccess { .. }
            | TermKind::Choice { .. } => {}
            TermKind::Dereference { address } => {
                let address_type = self.types.type_of(*address);
                let term_type = self.types.type_of(term);
                self.types.make_pointer_to(address_type, term_type);
            }
            TermKind::UnaryOp { op, operand } => self.analyze_unary(term, *op, *operand),
            TermKind::BinaryOp { op, left, right } => {
                self.analyze_binary(term, *op, *left, *right)
            }
        }
    }

    fn analyze_unary(&mut self, term: TermId, op: UnaryOp, operand: TermId) {
        let term_type = self.types.type_of(term);
        let operand_type = self.types.type_of(operand);

        match op {
            UnaryOp::Not => {
                self.types.make_integer(operand_type);
                self.types.make_integer(term_type);
            }
            UnaryOp::Negation => {
                self.types.make_integer(operand_type);
                self.types.make_integer(term_type);
                self.types.make_signed(operand_type);
                self.types.make_signed(term_type);
            }
            UnaryOp::SignExtend => {
                self.types.make_signed(operand_type);
            }
            UnaryOp::ZeroExtend => {
                if self.types.is_signed(operand_type) {
                    self.types.make_unsigned(term_type);
                }
            }
            UnaryOp::Truncate => {}
        }
    }

    fn analyze_binary(&mut self, term: TermId, op: BinaryOp, left: TermId, right: TermId) {
        let term_type = self.types.type_of(term);
        let left_type = self.types.type_of(left);
        let right_type = self.types.type_of(right);

        let left_value = self.dataflow.value(left);
        let right_value = self.dataflow.value(right);

        match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);
                self.types.make_integer(term_type);

                self.types.make_unsigned(left_type);
                self.types.make_unsigned(right_type);
                self.types.make_unsigned(term_type);
            }

            BinaryOp::Shl => {
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);
                self.types.make_integer(term_type);

                self.types.make_unsigned(right_type);
                if self.types.is_signed(left_type) {
                    self.types.make_signed(term_type);
                }
                if self.types.is_unsigned(left_type) {
                    self.types.make_unsigned(term_type);
                }
                if self.types.is_signed(term_type) {
                    self.types.make_signed(left_type);
                }
                if self.types.is_unsigned(term_type) {
                    self.types.make_unsigned(left_type);
                }

                if let Some(shift) = right_value.as_concrete() {
                    let stride = u32::try_from(shift.value())
                        .ok()
                        .and_then(|bits| 1u64.checked_shl(bits))
                        .unwrap_or(0);
                    let factor = self.types.factor(left_type).saturating_mul(stride);
                    self.types.update_factor(term_type, factor);
                }
            }

            BinaryOp::Shr => {
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);
                self.types.make_integer(term_type);

                self.types.make_unsigned(left_type);
                self.types.make_unsigned(term_type);
            }

            BinaryOp::Sar => {
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);
                self.types.make_integer(term_type);

                self.types.make_signed(left_type);
                self.types.make_signed(term_type);
            }

            BinaryOp::Add => {
                if self.types.is_integer(left_type) && self.types.is_integer(right_type) {
                    self.types.make_integer(term_type);
                }
                if (self.types.is_integer(left_type) && self.types.is_pointer(right_type))
                    || (self.types.is_pointer(left_type) && self.types.is_integer(right_type))
                {
                    self.types.make_pointer(term_type);
                }
                if self.types.is_integer(term_type) {
                    self.types.make_integer(left_type);
                    self.types.make_integer(right_type);
                }
                if self.types.is_pointer(term_type) {
                    if self.types.is_integer(left_type) {
                        self.types.make_pointer(right_type);
                    }
                    if self.types.is_integer(right_type) {
                        self.types.make_pointer(left_type);
                    }
                    if self.types.is_pointer(left_type) {
                        self.types.make_integer(right_type);
                    }
                    if self.types.is_pointer(right_type) {
                        self.types.make_integer(left_type);
                    }
                    if !self.types.is_pointer(left_type) && !self.types.is_pointer(right_type) {
                        // A known multiple is the scaled index; the other
                        // side must be the base. Otherwise a concrete addend
                        // decides: small immediates are offsets, large ones
                        // look like base addresses.
                        if left_value.is_product() {
                            self.types.make_pointer(right_type);
                        } else if right_value.is_product() {
                            self.types.make_pointer(left_type);
                        } else if let Some(value) = left_value.as_concrete() {
                            if value.value() < SMALL_IMMEDIATE_LIMIT {
                                self.types.make_integer(left_type);
                            } else {
                                self.types.make_pointer(left_type);
                            }
                        } else if let Some(value) = right_value.as_concrete() {
                            if value.value() < SMALL_IMMEDIATE_LIMIT {
                                self.types.make_integer(right_type);
                            } else {
                                self.types.make_pointer(right_type);
                            }
                        }
                    }
                }

                self.propagate_signedness(term, left, right);

                if let Some(value) = right_value.as_concrete() {
                    if self.types.find(term_type) == self.types.find(left_type) {
                        self.types.update_factor(term_type, value.absolute_value());
                    } else {
                        #[cfg(feature = "struct-recovery")]
                        if !left_value.is_stack_offset() {
                            self.types
                                .add_offset(left_type, value.signed_value(), term_type);
                        }
                    }
                }
                if let Some(value) = left_value.as_concrete() {
                    if self.types.find(term_type) == self.types.find(right_type) {
                        self.types.update_factor(term_type, value.absolute_value());
                    } else {
                        #[cfg(feature = "struct-recovery")]
                        if !left_value.is_stack_offset() {
                            self.types
                                .add_offset(right_type, value.signed_value(), term_type);
                        }
                    }
                }

                if self.types.is_pointer(left_type) && right_value.is_product() {
                    match self.types.pointee(left_type) {
                        Some(pointee) => self.types.make_pointer_to(term_type, pointee),
                        None => self.types.make_pointer(term_type),
                    }
                }
                if self.types.is_pointer(right_type) && left_value.is_product() {
                    match self.types.pointee(right_type) {
                        Some(pointee) => self.types.make_pointer_to(term_type, pointee),
                        None => self.types.make_pointer(term_type),
                    }
                }
            }

            BinaryOp::Sub => {
                if self.types.is_integer(left_type) && self.types.is_integer(right_type) {
                    self.types.make_integer(term_type);
                }
                if self.types.is_pointer(left_type) && self.types.is_integer(right_type) {
                    self.types.make_pointer(term_type);
                }
                if self.types.is_pointer(term_type) {
                    self.types.make_pointer(left_type);
                    self.types.make_integer(right_type);
                }

                self.propagate_signedness(term, left, right);

                if let Some(value) = right_value.as_concrete() {
                    if self.types.find(term_type) == self.types.find(left_type) {
                        self.types.update_factor(term_type, value.absolute_value());
                    } else {
                        #[cfg(feature = "struct-recovery")]
                        if !left_value.is_stack_offset() {
                            self.types.add_offset(
                                left_type,
                                value.signed_value().wrapping_neg(),
                                term_type,
                            );
                        }
                    }
                }

                if self.types.is_pointer(left_type) && right_value.is_product() {
                    match self.types.pointee(left_type) {
                        Some(pointee) => self.types.make_pointer_to(term_type, pointee),
                        None => self.types.make_pointer(term_type),
                    }
                }
            }

            BinaryOp::Mul => {
                self.types.make_integer(term_type);
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);

                self.propagate_signedness(term, left, right);

                if let Some(value) = right_value.as_concrete() {
                    let factor = self.types.factor(left_type).saturating_mul(value.value());
                    self.types.update_factor(term_type, factor);
                }
                if let Some(value) = left_value.as_concrete() {
                    let factor = self.types.factor(right_type).saturating_mul(value.value());
                    self.types.update_factor(term_type, factor);
                }
            }

            BinaryOp::SignedDiv | BinaryOp::SignedRem => {
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);
                self.types.make_integer(term_type);

                self.types.make_signed(left_type);
                self.types.make_signed(right_type);
                self.types.make_signed(term_type);
            }

            BinaryOp::UnsignedDiv | BinaryOp::UnsignedRem => {
                self.types.make_integer(term_type);
                self.types.make_integer(left_type);
                self.types.make_integer(right_type);

                if self.types.is_signed(left_type) {
                    self.types.make_unsigned(right_type);
                }
                if self.types.is_signed(right_type) {
                    self.types.make_unsigned(left_type);
                }
                self.types.make_unsigned(term_type);
            }

            BinaryOp::Equal => {
                self.types.union_set(left_type, right_type);
            }

            BinaryOp::SignedLess | BinaryOp::SignedLessOrEqual => {
                self.types.make_signed(left_type);
                self.types.make_signed(right_type);
                self.types.union_set(left_type, right_type);
            }

            BinaryOp::UnsignedLess | BinaryOp::UnsignedLessOrEqual => {
                if self.types.is_signed(right_type) {
                    self.types.make_unsigned(left_type);
                } else if self.types.is_signed(left_type) {
                    self.types.make_unsigned(right_type);
                } else {
                    self.types.make_unsigned(left_type);
                    self.types.make_unsigned(right_type);
                }
                self.types.union_set(left_type, right_type);
            }
        }
    }

    /// Shared signedness propagation of the additive and multiplicative
    /// rules: unsigned evidence on either operand dominates the result,
    /// agreement on signed transfers to the result, and the result's
    /// signedness flows back into the operands. The unsigned-result
    /// back-propagation resolves mixes by re-forcing the right operand.
    fn propagate_signedness(&mut self, term: TermId, left: TermId, right: TermId) {
        let term_type = self.types.type_of(term);
        let left_type = self.types.type_of(left);
        let right_type = self.types.type_of(right);

        if self.types.is_unsigned(left_type) || self.types.is_unsigned(right_type) {
            self.types.make_unsigned(term_type);
        }
        if self.types.is_signed(left_type) && self.types.is_signed(right_type) {
            self.types.make_signed(term_type);
        }
        if self.types.is_signed(term_type) {
            self.types.make_signed(left_type);
            self.types.make_signed(right_type);
        }
        if self.types.is_unsigned(term_type) {
            if self.types.is_signed(left_type) {
                self.types.make_unsigned(right_type);
            }
            if self.types.is_signed(right_type) {
                self.types.make_unsigned(right_type);
            }
        }
    }

    fn analyze_statement(&mut self, function: &Function, id: StatementId) {
        match function.statement(id) {
            Statement::Assignment { left, right } => {
                let left_type = self.types.type_of(*left);
                let right_type = self.types.type_of(*right);
                self.types.union_set(left_type, right_type);
            }
            Statement::Comment(_)
            | Statement::InlineAssembly(_)
            | Statement::Kill { .. }
            | Statement::Jump { .. }
            | Statement::Call { .. }
            | Statement::Return => {}
            other => {
                warn!(
                    statement = ?other,
                    "type reconstruction skipped an unsupported statement kind"
                );
            }
        }
    }
}
