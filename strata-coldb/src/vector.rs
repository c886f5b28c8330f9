use crate::{
    chunk::Chunk,
    directory::Directory,
    domain::Domain,
    encoding::Encoding,
    value::{ColumnType, Value},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use strata_base::{err, ErrorKind, NodeId, Result, VecKey};

/// A published, immutable column: an ordered sequence of chunks plus the
/// `espc` table of chunk start rows.
///
/// `espc` has one more entry than there are chunks: `espc[0] == 0`,
/// `espc[i]` is the first row of chunk `i` and the last entry is the row
/// count. Cloning a `Vector` clones a reference.
#[derive(Clone, Debug)]
pub struct Vector {
    data: Arc<VectorData>,
}

#[derive(Debug)]
struct VectorData {
    key: VecKey,
    ctype: ColumnType,
    espc: Vec<u64>,
    chunks: Vec<Chunk>,
    homes: Vec<NodeId>,
    domain: Option<Arc<Domain>>,
    pins: AtomicUsize,
}

/// Where a row lives, without decoding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHandle {
    pub key: VecKey,
    pub cidx: usize,
    /// First global row of the chunk.
    pub start: u64,
    pub rows: usize,
    pub node: NodeId,
}

/// Holds a vector against removal from its directory until dropped.
#[derive(Debug)]
pub struct VectorPin {
    vector: Vector,
}

impl VectorPin {
    pub fn vector(&self) -> &Vector {
        &self.vector
    }
}

impl Drop for VectorPin {
    fn drop(&mut self) {
        self.vector.data.pins.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) fn home_of(key: &VecKey, cidx: usize, nodes: &[NodeId]) -> NodeId {
    match nodes.len() {
        0 => NodeId(0),
        n => nodes[(key.chunk_hash(cidx) % n as u64) as usize],
    }
}

impl Vector {
    // Chunks must be non-empty and already carry their final start rows.
    pub(crate) fn assemble(
        key: VecKey,
        ctype: ColumnType,
        chunks: Vec<Chunk>,
        domain: Option<Arc<Domain>>,
        nodes: &[NodeId],
    ) -> Vector {
        let mut espc = Vec::with_capacity(chunks.len() + 1);
        espc.push(0);
        let mut total = 0_u64;
        for c in chunks.iter() {
            debug_assert_eq!(c.start(), total);
            total += c.len() as u64;
            espc.push(total);
        }
        let homes = (0..chunks.len()).map(|i| home_of(&key, i, nodes)).collect();
        Vector {
            data: Arc::new(VectorData {
                key,
                ctype,
                espc,
                chunks,
                homes,
                domain,
                pins: AtomicUsize::new(0),
            }),
        }
    }

    pub fn key(&self) -> VecKey {
        self.data.key
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.ctype
    }

    pub fn num_rows(&self) -> u64 {
        self.data.espc.last().copied().unwrap_or(0)
    }

    pub fn nchunks(&self) -> usize {
        self.data.chunks.len()
    }

    pub fn espc(&self) -> &[u64] {
        &self.data.espc
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.data.chunks
    }

    pub fn chunk(&self, cidx: usize) -> Result<&Chunk> {
        self.data.chunks.get(cidx).ok_or_else(|| {
            err(
                ErrorKind::OutOfRange,
                format!("chunk {} of {} with {} chunks", cidx, self.key(), self.nchunks()),
            )
        })
    }

    pub fn home(&self, cidx: usize) -> Result<NodeId> {
        self.chunk(cidx)?;
        Ok(self.data.homes[cidx])
    }

    pub fn domain(&self) -> Option<&Arc<Domain>> {
        self.data.domain.as_ref()
    }

    /// True when both vectors have identical chunk boundaries.
    pub fn is_aligned_with(&self, other: &Vector) -> bool {
        self.data.espc == other.data.espc
    }

    fn locate(&self, row: u64) -> Result<(usize, usize)> {
        if row >= self.num_rows() {
            return Err(err(
                ErrorKind::OutOfRange,
                format!("row {} of {} with {} rows", row, self.key(), self.num_rows()),
            ));
        }
        let cidx = self.data.espc.partition_point(|s| *s <= row) - 1;
        Ok((cidx, (row - self.data.espc[cidx]) as usize))
    }

    pub fn at(&self, row: u64) -> Result<Value> {
        let (cidx, local) = self.locate(row)?;
        Ok(self.data.chunks[cidx].get(local))
    }

    /// NA reads as NaN.
    pub fn at_f64(&self, row: u64) -> Result<f64> {
        let (cidx, local) = self.locate(row)?;
        Ok(self.data.chunks[cidx].at_f64(local))
    }

    pub fn is_na(&self, row: u64) -> Result<bool> {
        let (cidx, local) = self.locate(row)?;
        Ok(self.data.chunks[cidx].is_na(local))
    }

    /// Text of a string row, or the label of a categorical one.
    pub fn at_str(&self, row: u64) -> Result<Option<String>> {
        let (cidx, local) = self.locate(row)?;
        let chunk = &self.data.chunks[cidx];
        match (chunk.at_code(local), &self.data.domain) {
            (Some(code), Some(domain)) => Ok(domain.label(code)),
            _ => Ok(chunk.at_str(local).map(str::to_string)),
        }
    }

    pub fn chunk_for(&self, row: u64) -> Result<ChunkHandle> {
        let (cidx, _) = self.locate(row)?;
        Ok(self.handle(cidx))
    }

    pub(crate) fn handle(&self, cidx: usize) -> ChunkHandle {
        ChunkHandle {
            key: self.key(),
            cidx,
            start: self.data.espc[cidx],
            rows: self.data.chunks[cidx].len(),
            node: self.data.homes[cidx],
        }
    }

    pub fn pin(&self) -> VectorPin {
        self.data.pins.fetch_add(1, Ordering::AcqRel);
        VectorPin {
            vector: self.clone(),
        }
    }

    pub fn pins(&self) -> usize {
        self.data.pins.load(Ordering::Acquire)
    }

    pub fn make_f64(dir: &Directory, key: VecKey, vals: &[f64]) -> Result<Vector> {
        let vals = vals.iter().map(|v| Value::Flo(*v)).collect::<Vec<_>>();
        Self::make_values(dir, key, Some(ColumnType::Num), &vals)
    }

    /// Builds and publishes a small in-memory vector, split into chunks of
    /// the directory's `chunk_rows`.
    pub fn make_values(
        dir: &Directory,
        key: VecKey,
        declared: Option<ColumnType>,
        vals: &[Value],
    ) -> Result<Vector> {
        let step = dir.chunk_rows();
        let mut split = Vec::with_capacity(vals.len() / step + 1);
        let mut left = vals.len();
        while left > 0 {
            split.push(left.min(step));
            left -= left.min(step);
        }
        Self::build(dir, key, declared, vals, &split)
    }

    /// Like `make_values` but with explicit chunk lengths, which must sum
    /// to `vals.len()`.
    pub fn make_split(
        dir: &Directory,
        key: VecKey,
        declared: Option<ColumnType>,
        vals: &[Value],
        split: &[usize],
    ) -> Result<Vector> {
        if split.iter().sum::<usize>() != vals.len() {
            return Err(err(
                ErrorKind::OutOfRange,
                format!("chunk split covers {} of {} rows", split.iter().sum::<usize>(), vals.len()),
            ));
        }
        Self::build(dir, key, declared, vals, split)
    }

    fn build(
        dir: &Directory,
        key: VecKey,
        declared: Option<ColumnType>,
        vals: &[Value],
        split: &[usize],
    ) -> Result<Vector> {
        let builder = dir.builder(key, declared);
        let mut pos = 0;
        for (cidx, n) in split.iter().enumerate() {
            let mut buf = builder.open_chunk(cidx)?;
            for v in &vals[pos..pos + n] {
                buf.append_value(v)?;
            }
            builder.commit(buf)?;
            pos += n;
        }
        builder.finalize(dir)
    }

    /// A vector of `rows` copies of one value, stored as constant chunks.
    pub fn make_con(dir: &Directory, key: VecKey, value: Value, rows: u64) -> Result<Vector> {
        let ctype = match &value {
            Value::Na | Value::Dec { .. } | Value::Flo(_) => ColumnType::Num,
            Value::Str(_) => ColumnType::Str,
            Value::Cat(_) => {
                return Err(err(
                    ErrorKind::SchemaMismatch,
                    "constant categorical vectors need a domain; use a builder",
                ))
            }
        };
        let step = dir.chunk_rows() as u64;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < rows {
            let n = (rows - start).min(step);
            let enc = Encoding::Const(value.clone());
            chunks.push(Chunk::from_parts(start, n as usize, enc, Arc::from(Vec::new()), 0));
            start += n;
        }
        let vector = Vector::assemble(key, ctype, chunks, None, dir.nodes());
        dir.publish(vector.clone())?;
        Ok(vector)
    }
}
