//! Type reconstruction.
//!
//! This module assigns every IR term a reconstructed high-level type:
//! whether it is an integer or a pointer, its signedness, the greatest
//! common stride of the constants it is combined with, and - with the
//! `struct-recovery` feature - the structural offsets observed on it.
//!
//! The pieces:
//! - [`TypeStore`]: a union-find of monotone lattice elements, keyed by term
//! - [`Census`]: the ordered statements and terms of one function
//! - [`TypeAnalyzer`]: the constraint rules and the fixed-point driver
//!
//! Types of terms related by assignments, comparisons, and matching
//! definitions end up in one equivalence class, so every use site of a
//! recovered variable reports the same reconstructed type.

mod analyzer;
mod census;
mod lattice;

pub use analyzer::TypeAnalyzer;
pub use census::Census;
pub use lattice::{TypeId, TypeStore};
