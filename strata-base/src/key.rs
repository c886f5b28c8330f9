use serde::{Deserialize, Serialize};

// A node is one process holding chunks. Only its identity matters here;
// discovering and talking to other nodes is somebody else's business.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Identifies a vector. Keys issued together by a vector group share
/// `group` and differ in `index`; named keys hash the name into `group`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct VecKey {
    pub group: u64,
    pub index: u32,
}

impl VecKey {
    pub fn new(group: u64, index: u32) -> Self {
        VecKey { group, index }
    }

    /// Content-addressed key: the same name always yields the same key.
    pub fn named(name: &str) -> Self {
        VecKey {
            group: rapidhash::rapidhash(name.as_bytes()),
            index: 0,
        }
    }

    /// Stable hash of (key, chunk index), used to spread chunks over nodes.
    pub fn chunk_hash(&self, cidx: usize) -> u64 {
        let mut buf = [0_u8; 20];
        buf[..8].copy_from_slice(&self.group.to_le_bytes());
        buf[8..12].copy_from_slice(&self.index.to_le_bytes());
        buf[12..].copy_from_slice(&(cidx as u64).to_le_bytes());
        rapidhash::rapidhash(&buf)
    }
}

impl std::fmt::Display for VecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vec:{:016x}:{}", self.group, self.index)
    }
}
