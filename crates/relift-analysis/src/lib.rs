//! # relift-analysis
//!
//! Type reconstruction for the relift decompiler.
//!
//! This crate provides:
//! - Containers for precomputed dataflow facts (definitions, memory
//!   locations, abstract values)
//! - Calling-convention data (function signatures, return analyzers, call
//!   hooks)
//! - Term usage facts
//! - The type lattice, union-find type store, IR census, and the
//!   fixed-point type analyzer itself
//!
//! The analyses here consume IR and oracles; they never build IR and never
//! perform I/O.

pub mod cconv;
pub mod dataflow;
pub mod types;
pub mod usage;

pub use cconv::{CallsData, FunctionSignature, ReturnAnalyzer};
pub use dataflow::{ConcreteValue, Dataflow, DefinitionChunk, Definitions, Value};
pub use types::{Census, TypeAnalyzer, TypeId, TypeStore};
pub use usage::Usage;
