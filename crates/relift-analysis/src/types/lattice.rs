//! The reconstructed-type lattice and its union-find store.
//!
//! Every term gets a lattice element describing what is known about its
//! high-level type: integer/pointer nature, signedness, the greatest common
//! stride of the constants combined with it, and (optionally) structural
//! offsets. All knowledge is positive and monotone - bits only flip on, the
//! factor only divides, offset maps only grow - so constraint rules can be
//! applied in any order and still converge.
//!
//! Elements are addressed by [`TypeId`], an index into the store. Pointee
//! and offset links hold ids rather than references, so a pointer type may
//! (transitively) point to its own equivalence class without any ownership
//! knots; every read resolves the union-find representative first.

use relift_ir::TermId;
use std::collections::HashMap;

#[cfg(feature = "struct-recovery")]
use std::collections::BTreeMap;

/// Identifier of a type lattice element inside a [`TypeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One lattice element. Attribute fields are only meaningful on
/// representatives; after a union the child's fields are drained into the
/// survivor.
#[derive(Debug, Clone, Default)]
struct TypeElement {
    parent: Option<TypeId>,
    rank: u32,

    is_integer: bool,
    is_pointer: bool,
    is_signed: bool,
    is_unsigned: bool,

    /// Greatest common stride; 0 until the first update.
    factor: u64,

    /// The pointed-to element, if this type is a pointer to a known type.
    pointee: Option<TypeId>,

    /// Structural offsets: constant displacement -> element of the value
    /// found there.
    #[cfg(feature = "struct-recovery")]
    offsets: BTreeMap<i64, TypeId>,

    /// Set by every observable transition, cleared by the store's probe.
    changed: bool,
}

/// Union-find store of type lattice elements, keyed by term.
#[derive(Debug, Clone, Default)]
pub struct TypeStore {
    elements: Vec<TypeElement>,
    term_types: HashMap<TermId, TypeId>,
}

impl TypeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the element for a term, allocating a bottom element on first
    /// access.
    pub fn type_of(&mut self, term: TermId) -> TypeId {
        if let Some(&id) = self.term_types.get(&term) {
            return id;
        }
        let id = self.alloc();
        self.term_types.insert(term, id);
        id
    }

    /// Returns the element for a term without allocating.
    pub fn get(&self, term: TermId) -> Option<TypeId> {
        self.term_types.get(&term).map(|&id| self.find(id))
    }

    /// Iterates over all (term, representative) pairs.
    pub fn terms(&self) -> impl Iterator<Item = (TermId, TypeId)> + '_ {
        self.term_types.iter().map(|(&term, &id)| (term, self.find(id)))
    }

    /// Number of terms with an element.
    pub fn len(&self) -> usize {
        self.term_types.len()
    }

    /// Returns true if no term has an element yet.
    pub fn is_empty(&self) -> bool {
        self.term_types.is_empty()
    }

    fn alloc(&mut self) -> TypeId {
        let id = TypeId(self.elements.len() as u32);
        self.elements.push(TypeElement::default());
        id
    }

    /// Resolves the representative of an element without mutating parent
    /// links. Union by rank keeps the chain short.
    pub fn find(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(parent) = self.elements[current.index()].parent {
            current = parent;
        }
        current
    }

    /// Resolves the representative and compresses the path to it.
    fn find_compress(&mut self, id: TypeId) -> TypeId {
        let root = self.find(id);
        let mut current = id;
        while let Some(parent) = self.elements[current.index()].parent {
            self.elements[current.index()].parent = Some(root);
            current = parent;
        }
        root
    }

    /// Returns true if the element is known to be an integer.
    pub fn is_integer(&self, id: TypeId) -> bool {
        self.elements[self.find(id).index()].is_integer
    }

    /// Returns true if the element is known to be a pointer.
    pub fn is_pointer(&self, id: TypeId) -> bool {
        self.elements[self.find(id).index()].is_pointer
    }

    /// Returns true if signed evidence has been seen.
    pub fn is_signed(&self, id: TypeId) -> bool {
        self.elements[self.find(id).index()].is_signed
    }

    /// Returns true if unsigned evidence has been seen.
    pub fn is_unsigned(&self, id: TypeId) -> bool {
        self.elements[self.find(id).index()].is_unsigned
    }

    /// Marks the element as an integer.
    pub fn make_integer(&mut self, id: TypeId) {
        let root = self.find_compress(id);
        let element = &mut self.elements[root.index()];
        if !element.is_integer {
            element.is_integer = true;
            element.changed = true;
        }
    }

    /// Marks the element as a pointer.
    pub fn make_pointer(&mut self, id: TypeId) {
        let root = self.find_compress(id);
        let element = &mut self.elements[root.index()];
        if !element.is_pointer {
            element.is_pointer = true;
            element.changed = true;
        }
    }

    /// Marks the element as a pointer to `pointee`, unifying with any
    /// previously known pointee.
    pub fn make_pointer_to(&mut self, id: TypeId, pointee: TypeId) {
        let root = self.find_compress(id);
        let pointee = self.find_compress(pointee);
        let element = &mut self.elements[root.index()];
        if !element.is_pointer {
            element.is_pointer = true;
            element.changed = true;
        }
        match element.pointee {
            Some(existing) => {
                self.union_set(existing, pointee);
            }
            None => {
                element.pointee = Some(pointee);
                element.changed = true;
            }
        }
    }

    /// Marks the element as signed.
    pub fn make_signed(&mut self, id: TypeId) {
        let root = self.find_compress(id);
        let element = &mut self.elements[root.index()];
        if !element.is_signed {
            element.is_signed = true;
            element.changed = true;
        }
    }

    /// Marks the element as unsigned.
    pub fn make_unsigned(&mut self, id: TypeId) {
        let root = self.find_compress(id);
        let element = &mut self.elements[root.index()];
        if !element.is_unsigned {
            element.is_unsigned = true;
            element.changed = true;
        }
    }

    /// The greatest common stride observed so far; 1 until known.
    pub fn factor(&self, id: TypeId) -> u64 {
        match self.elements[self.find(id).index()].factor {
            0 => 1,
            factor => factor,
        }
    }

    /// Folds `value` into the stride with a gcd; 0 is the no-op identity.
    pub fn update_factor(&mut self, id: TypeId, value: u64) {
        let root = self.find_compress(id);
        let element = &mut self.elements[root.index()];
        let folded = gcd(element.factor, value);
        if folded != element.factor {
            element.factor = folded;
            element.changed = true;
        }
    }

    /// The pointed-to element's representative, if known.
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        self.elements[self.find(id).index()]
            .pointee
            .map(|pointee| self.find(pointee))
    }

    /// Records that the value at `self + offset` has type `child`. A second
    /// child at the same offset is unified with the first.
    #[cfg(feature = "struct-recovery")]
    pub fn add_offset(&mut self, id: TypeId, offset: i64, child: TypeId) {
        let root = self.find_compress(id);
        let child = self.find_compress(child);
        match self.elements[root.index()].offsets.get(&offset).copied() {
            Some(existing) => {
                self.union_set(existing, child);
            }
            None => {
                let element = &mut self.elements[root.index()];
                element.offsets.insert(offset, child);
                element.changed = true;
            }
        }
    }

    /// The recorded structural offsets, in ascending offset order.
    #[cfg(feature = "struct-recovery")]
    pub fn offsets(&self, id: TypeId) -> impl Iterator<Item = (i64, TypeId)> + '_ {
        self.elements[self.find(id).index()]
            .offsets
            .iter()
            .map(|(&offset, &child)| (offset, self.find(child)))
    }

    /// Merges the equivalence classes of `a` and `b` and joins their
    /// attributes on the survivor. Returns the surviving representative.
    ///
    /// The parent link is established before any attribute join, so the
    /// recursive pointee/offset unifications hit the `a == b` early return
    /// on cyclic structures instead of recursing forever.
    pub fn union_set(&mut self, a: TypeId, b: TypeId) -> TypeId {
        let a = self.find_compress(a);
        let b = self.find_compress(b);
        if a == b {
            return a;
        }

        let (root, child) = if self.elements[a.index()].rank >= self.elements[b.index()].rank {
            (a, b)
        } else {
            (b, a)
        };
        if self.elements[root.index()].rank == self.elements[child.index()].rank {
            self.elements[root.index()].rank += 1;
        }
        self.elements[child.index()].parent = Some(root);

        // Drain the child's attributes; it is no longer a representative.
        let child_element = &mut self.elements[child.index()];
        let is_integer = child_element.is_integer;
        let is_pointer = child_element.is_pointer;
        let is_signed = child_element.is_signed;
        let is_unsigned = child_element.is_unsigned;
        let factor = child_element.factor;
        let pointee = child_element.pointee.take();
        #[cfg(feature = "struct-recovery")]
        let offsets = std::mem::take(&mut child_element.offsets);

        let element = &mut self.elements[root.index()];
        element.is_integer |= is_integer;
        element.is_pointer |= is_pointer;
        element.is_signed |= is_signed;
        element.is_unsigned |= is_unsigned;
        element.factor = gcd(element.factor, factor);
        // Uniting two classes can enable further rule firings even when no
        // attribute differs, so the merge itself counts as a change.
        element.changed = true;

        let pending_pointee = match (element.pointee, pointee) {
            (Some(ours), Some(theirs)) => Some((ours, theirs)),
            (None, Some(theirs)) => {
                element.pointee = Some(theirs);
                None
            }
            _ => None,
        };
        if let Some((ours, theirs)) = pending_pointee {
            self.union_set(ours, theirs);
        }

        #[cfg(feature = "struct-recovery")]
        for (offset, child_type) in offsets {
            self.add_offset(root, offset, child_type);
        }

        root
    }

    /// Returns true if any element changed since the last probe.
    pub fn any_changed(&self) -> bool {
        self.elements.iter().any(|element| element.changed)
    }

    /// Probes the global changed signal and clears every element's flag.
    pub fn take_changed(&mut self) -> bool {
        let mut changed = false;
        for element in &mut self.elements {
            if element.changed {
                changed = true;
                element.changed = false;
            }
        }
        changed
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
