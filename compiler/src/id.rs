// id.rs — Stable identifiers for program entities and graph vertices
//
// Program entities (operations, values, blocks) are addressed by dense
// indices into the `Program` arena. Graph vertices are addressed by a
// (kind, sequence) key allocated in traversal order, so two runs over the
// same program assign the same keys.

use std::fmt;

use serde::Serialize;

use crate::graph::VertexKind;

/// Index of an operation in the program arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

/// Index of an SSA value in the program arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Index of a block in the program arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl OpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a vertex: unique within its kind for one analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub kind: VertexKind,
    pub seq: u32,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.as_str(), self.seq)
    }
}

/// Per-kind sequence counters. Produces dense, monotonically increasing
/// sequence numbers in allocation (traversal) order.
#[derive(Debug, Default)]
pub struct SeqAllocator {
    next: [u32; VertexKind::COUNT],
}

impl SeqAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: VertexKind) -> NodeKey {
        let slot = &mut self.next[kind.ordinal()];
        let key = NodeKey { kind, seq: *slot };
        *slot += 1;
        key
    }

    /// Number of keys handed out so far for `kind`.
    pub fn count(&self, kind: VertexKind) -> u32 {
        self.next[kind.ordinal()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_dense_per_kind() {
        let mut ids = SeqAllocator::new();
        let a = ids.alloc(VertexKind::Transfer);
        let b = ids.alloc(VertexKind::Compute);
        let c = ids.alloc(VertexKind::Transfer);
        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 0);
        assert_eq!(c.seq, 1);
        assert_eq!(ids.count(VertexKind::Transfer), 2);
        assert_eq!(ids.count(VertexKind::Barrier), 0);
    }

    #[test]
    fn key_display() {
        let key = NodeKey {
            kind: VertexKind::Barrier,
            seq: 3,
        };
        assert_eq!(key.to_string(), "barrier#3");
    }
}
