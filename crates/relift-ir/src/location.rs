//! Memory locations referenced by the IR and dataflow facts.

/// A location (register, stack slot, global, or flags) a value can live in.
///
/// Locations are the comparable identities dataflow analyses use to relate
/// accesses; two accesses name the same storage iff their locations are
/// equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Location {
    /// A register, by architecture-assigned id.
    Register(u16),
    /// A stack slot at an offset from the frame base.
    Stack(i64),
    /// A global memory address.
    Memory(u64),
    /// CPU flags.
    Flags,
}
