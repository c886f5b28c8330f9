use crate::{
    buffer::EncodePolicy,
    builder::VectorBuilder,
    chunk::{Chunk, ChunkImage},
    domain::Domain,
    group::VectorGroup,
    value::{ColumnType, DataType, Value},
    vector::{ChunkHandle, Vector},
};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use strata_admin::Config;
use strata_base::{err, ErrorKind, NodeId, Result, VecKey};
use tracing::debug;

/// Maps vector keys to published vectors.
///
/// Registration happens once, when a builder finalizes; a live key can
/// not be published again. The map is sharded so lookups of different
/// keys do not contend. There is no global instance: the engine owns one
/// and hands it to whoever needs it.
pub struct Directory {
    vectors: DashMap<VecKey, Vector>,
    nodes: Vec<NodeId>,
    policy: EncodePolicy,
    chunk_rows: usize,
    next_group: AtomicU64,
}

// Wire form of a published vector.
#[derive(Serialize, Deserialize)]
pub(crate) struct VectorImage {
    pub(crate) key: VecKey,
    pub(crate) ctype: ColumnType,
    pub(crate) espc: Vec<u64>,
    pub(crate) domain: Option<Vec<String>>,
    pub(crate) chunks: Vec<ChunkImage>,
}

impl Directory {
    pub fn new(cfg: &Config) -> Result<Self> {
        cfg.validate()?;
        Ok(Directory {
            vectors: DashMap::new(),
            nodes: cfg.nodes.clone(),
            policy: EncodePolicy::from(cfg),
            chunk_rows: cfg.chunk_rows,
            next_group: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> EncodePolicy {
        self.policy
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn builder(&self, key: VecKey, declared: Option<ColumnType>) -> VectorBuilder {
        VectorBuilder::new(key, declared, self.policy)
    }

    pub fn categorical_builder(&self, key: VecKey, domain: Arc<Domain>) -> VectorBuilder {
        VectorBuilder::categorical(key, domain, self.policy)
    }

    /// A fresh key group, prefixed with the local node so groups issued by
    /// different nodes never collide.
    pub fn new_group(&self) -> VectorGroup {
        let local = self.nodes.first().map_or(0, |n| n.0 as u64);
        let n = self.next_group.fetch_add(1, Ordering::Relaxed);
        VectorGroup::new((local << 48) | (n & ((1 << 48) - 1)))
    }

    pub fn publish(&self, vector: Vector) -> Result<()> {
        let key = vector.key();
        match self.vectors.entry(key) {
            Entry::Occupied(_) => Err(err(
                ErrorKind::AlreadyPublished,
                format!("{} is already published", key),
            )),
            Entry::Vacant(slot) => {
                debug!(target: "strata", %key, rows = vector.num_rows(), "published");
                slot.insert(vector);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: VecKey) -> Result<Vector> {
        match self.vectors.get(&key) {
            Some(v) => Ok(v.clone()),
            None => Err(err(ErrorKind::NotFound, format!("{} is not published", key))),
        }
    }

    pub fn contains(&self, key: VecKey) -> bool {
        self.vectors.contains_key(&key)
    }

    /// Unregisters a vector. Fails while a task has it pinned.
    pub fn remove(&self, key: VecKey) -> Result<Vector> {
        match self.vectors.remove_if(&key, |_, v| v.pins() == 0) {
            Some((_, v)) => {
                debug!(target: "strata", %key, "removed");
                Ok(v)
            }
            None if self.vectors.contains_key(&key) => {
                Err(err(ErrorKind::InUse, format!("{} is pinned by a running task", key)))
            }
            None => Err(err(ErrorKind::NotFound, format!("{} is not published", key))),
        }
    }

    pub fn locate(&self, key: VecKey, row: u64) -> Result<ChunkHandle> {
        self.get(key)?.chunk_for(row)
    }

    /// Every chunk of a vector with its row range and home node.
    pub fn layout(&self, key: VecKey) -> Result<Vec<ChunkHandle>> {
        let v = self.get(key)?;
        Ok((0..v.nchunks()).map(|c| v.handle(c)).collect())
    }

    pub fn keys(&self) -> Vec<VecKey> {
        let mut keys = self.vectors.iter().map(|e| *e.key()).collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Serializes a published vector so another directory can hold a
    /// replica of it.
    pub fn export(&self, key: VecKey) -> Result<Vec<u8>> {
        let v = self.get(key)?;
        let img = VectorImage {
            key,
            ctype: v.column_type(),
            espc: v.espc().to_vec(),
            domain: v.domain().map(|d| d.labels()),
            chunks: v.chunks().iter().map(Chunk::to_image).collect(),
        };
        Ok(rmp_serde::to_vec_named(&img)?)
    }

    /// Publishes a vector received from `export`, placing its chunks over
    /// this directory's nodes.
    pub fn import(&self, bytes: &[u8]) -> Result<Vector> {
        let img: VectorImage = rmp_serde::from_slice(bytes)?;
        let corrupt = |msg: String| err(ErrorKind::Corrupt, msg);
        if img.espc.first() != Some(&0) || img.espc.len() != img.chunks.len() + 1 {
            return Err(corrupt(format!(
                "{}: {} chunk boundaries for {} chunks",
                img.key,
                img.espc.len(),
                img.chunks.len()
            )));
        }
        let domain = match img.domain {
            Some(labels) => Some(Arc::new(Domain::frozen(labels)?)),
            None => None,
        };
        let want = img.ctype.data_type();
        let mut chunks = Vec::with_capacity(img.chunks.len());
        for (cidx, ci) in img.chunks.into_iter().enumerate() {
            let (start, end) = (img.espc[cidx], img.espc[cidx + 1]);
            if ci.rows == 0 || end.checked_sub(start) != Some(ci.rows as u64) {
                return Err(corrupt(format!(
                    "{}: chunk {} has {} rows, boundaries say {}..{}",
                    img.key, cidx, ci.rows, start, end
                )));
            }
            let chunk = Chunk::from_image(start, ci, self.policy.sparse_index_min_rows)?;
            if chunk.data_type().is_some_and(|dt| dt != want) {
                return Err(corrupt(format!("{}: chunk {} type disagrees with column", img.key, cidx)));
            }
            if want == DataType::Cat {
                let known = domain.as_ref().map_or(0, |d| d.len());
                if chunk.values().any(|v| matches!(v, Value::Cat(c) if c as usize >= known)) {
                    return Err(corrupt(format!("{}: chunk {} code outside domain", img.key, cidx)));
                }
            }
            chunks.push(chunk);
        }
        let vector = Vector::assemble(img.key, img.ctype, chunks, domain, &self.nodes);
        self.publish(vector.clone())?;
        Ok(vector)
    }
}
