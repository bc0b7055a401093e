//! Precomputed dataflow facts consumed by type reconstruction.
//!
//! The type analyzer does not run dataflow itself; the host fills a
//! [`Dataflow`] with the results of its reaching-definitions and value
//! analyses, and the analyzer only reads from it.

use relift_ir::{Location, TermId};
use std::collections::HashMap;

/// Read-only dataflow facts for one or more functions.
#[derive(Debug, Clone, Default)]
pub struct Dataflow {
    memory_locations: HashMap<TermId, Location>,
    definitions: HashMap<TermId, Definitions>,
    values: HashMap<TermId, Value>,
}

impl Dataflow {
    /// Creates an empty fact container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the memory location a term accesses.
    pub fn set_memory_location(&mut self, term: TermId, location: Location) {
        self.memory_locations.insert(term, location);
    }

    /// Returns the memory location a term accesses, if known.
    pub fn memory_location(&self, term: TermId) -> Option<Location> {
        self.memory_locations.get(&term).copied()
    }

    /// Records the definitions reaching a read term.
    pub fn set_definitions(&mut self, term: TermId, definitions: Definitions) {
        self.definitions.insert(term, definitions);
    }

    /// Returns the definitions reaching a read term, if known.
    pub fn definitions(&self, term: TermId) -> Option<&Definitions> {
        self.definitions.get(&term)
    }

    /// Records the abstract value of a term.
    pub fn set_value(&mut self, term: TermId, value: Value) {
        self.values.insert(term, value);
    }

    /// Returns the abstract value of a term, unknown if never recorded.
    pub fn value(&self, term: TermId) -> Value {
        self.values.get(&term).copied().unwrap_or_default()
    }
}

/// The definitions reaching one read, grouped into per-location chunks.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    chunks: Vec<DefinitionChunk>,
}

impl Definitions {
    /// Creates an empty definition set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk.
    pub fn push_chunk(&mut self, chunk: DefinitionChunk) {
        self.chunks.push(chunk);
    }

    /// Returns the chunks.
    pub fn chunks(&self) -> &[DefinitionChunk] {
        &self.chunks
    }
}

/// Definitions of a single memory location.
#[derive(Debug, Clone)]
pub struct DefinitionChunk {
    location: Location,
    definitions: Vec<TermId>,
}

impl DefinitionChunk {
    /// Creates a chunk for a location with its defining terms.
    pub fn new(location: Location, definitions: Vec<TermId>) -> Self {
        Self {
            location,
            definitions,
        }
    }

    /// The location being defined.
    pub fn location(&self) -> Location {
        self.location
    }

    /// The terms that define it.
    pub fn definitions(&self) -> &[TermId] {
        &self.definitions
    }
}

/// The value analysis result for one term.
#[derive(Debug, Clone, Copy, Default)]
pub struct Value {
    concrete: Option<ConcreteValue>,
    product: bool,
    stack_offset: bool,
}

impl Value {
    /// A fully unknown value.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A value known to be exactly `value`, interpreted at `size` bits.
    pub fn concrete(value: u64, size: u16) -> Self {
        Self {
            concrete: Some(ConcreteValue::new(value, size)),
            product: false,
            stack_offset: false,
        }
    }

    /// Marks the value as a known multiple of a non-trivial stride.
    pub fn with_product(mut self) -> Self {
        self.product = true;
        self
    }

    /// Marks the value as a stack frame offset.
    pub fn with_stack_offset(mut self) -> Self {
        self.stack_offset = true;
        self
    }

    /// Returns the concrete value, if fully known.
    pub fn as_concrete(&self) -> Option<ConcreteValue> {
        self.concrete
    }

    /// Returns true if the value is fully known.
    pub fn is_concrete(&self) -> bool {
        self.concrete.is_some()
    }

    /// Returns true if the value is a known multiple of a non-trivial stride.
    pub fn is_product(&self) -> bool {
        self.product
    }

    /// Returns true if the value is an offset into the stack frame.
    pub fn is_stack_offset(&self) -> bool {
        self.stack_offset
    }
}

/// A concrete machine word with a bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcreteValue {
    value: u64,
    size: u16,
}

impl ConcreteValue {
    /// Creates a concrete value of `size` bits; high bits are masked off.
    pub fn new(value: u64, size: u16) -> Self {
        let masked = if size >= 64 {
            value
        } else {
            value & ((1u64 << size) - 1)
        };
        Self {
            value: masked,
            size,
        }
    }

    /// The unsigned interpretation.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// The two's-complement interpretation at this value's width.
    pub fn signed_value(&self) -> i64 {
        if self.size == 0 || self.size >= 64 {
            self.value as i64
        } else {
            let shift = 64 - self.size as u32;
            ((self.value << shift) as i64) >> shift
        }
    }

    /// The magnitude of the signed interpretation.
    pub fn absolute_value(&self) -> u64 {
        self.signed_value().unsigned_abs()
    }
}
