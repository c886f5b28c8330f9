// Engine-wide policy knobs. Everything here has a default that works for a
// single local node; a host that wants something else builds a Config in
// code or ships one around as msgpack next to its other settings.

use serde::{Deserialize, Serialize};
use strata_base::{err, ErrorKind, NodeId, Result};

#[cfg(test)]
mod test;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target rows per chunk when a column writer splits its input.
    pub chunk_rows: usize,
    /// A chunk is considered for sparse encoding when the fraction of rows
    /// holding the default value (zero or NA) is strictly above this.
    pub sparse_ratio: f64,
    /// Sparse chunks at least this long get a rank index for O(1) access.
    pub sparse_index_min_rows: usize,
    /// Decimals needing more than this many fractional digits are stored
    /// as floats instead of scaled integers.
    pub max_decimal_digits: i32,
    /// Worker threads for task execution; 0 means one per core.
    pub workers: usize,
    /// Nodes chunks are placed on. Must not be empty.
    pub nodes: Vec<NodeId>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_rows: 1 << 16,
            sparse_ratio: 0.5,
            sparse_index_min_rows: 1024,
            max_decimal_digits: 18,
            workers: 0,
            nodes: vec![NodeId(0)],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_rows == 0 || self.chunk_rows > u32::MAX as usize {
            return Err(err(ErrorKind::Config, "chunk_rows must be in 1..=u32::MAX"));
        }
        if !(0.0..1.0).contains(&self.sparse_ratio) {
            return Err(err(ErrorKind::Config, "sparse_ratio must be in [0, 1)"));
        }
        if !(0..=18).contains(&self.max_decimal_digits) {
            return Err(err(ErrorKind::Config, "max_decimal_digits must be in 0..=18"));
        }
        if self.nodes.is_empty() {
            return Err(err(ErrorKind::Config, "node list is empty"));
        }
        Ok(())
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let cfg: Config = rmp_serde::from_slice(bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeId>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_sparse_ratio(mut self, ratio: f64) -> Self {
        self.sparse_ratio = ratio;
        self
    }
}
