//! # relift-ir
//!
//! Intermediate representation for the relift decompiler. This crate defines
//! the lifted IR consumed by the analysis passes: terms (sub-expressions),
//! statements, basic blocks, functions, memory locations, and the
//! cooperative cancellation token.
//!
//! The IR is arena-based: a [`Function`] owns its terms and statements, and
//! everything else refers to them by copyable ids ([`TermId`],
//! [`StatementId`]). Analyses treat ids as opaque identities.

pub mod basic_block;
pub mod cancellation;
pub mod error;
pub mod function;
pub mod location;
pub mod statement;
pub mod term;

pub use basic_block::{BasicBlock, BasicBlockId};
pub use cancellation::CancellationToken;
pub use error::Error;
pub use function::Function;
pub use location::Location;
pub use statement::{Statement, StatementId};
pub use term::{Access, BinaryOp, Term, TermId, TermKind, UnaryOp};
