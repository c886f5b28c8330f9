use strata_base::{err, ErrorKind, NodeId, Result};
use strata_coldb::{Chunk, Vector};

/// One chunk from each input vector, all covering the same row range.
#[derive(Clone, Debug)]
pub struct ChunkGroup {
    cidx: usize,
    start: u64,
    rows: usize,
    node: NodeId,
    chunks: Vec<Chunk>,
}

/// Fails unless every input has the same chunk boundaries as the first.
pub(crate) fn check_aligned(inputs: &[Vector]) -> Result<()> {
    let Some(first) = inputs.first() else {
        return Ok(());
    };
    for v in &inputs[1..] {
        if !first.is_aligned_with(v) {
            return Err(err(
                ErrorKind::Alignment,
                format!(
                    "{} ({} rows, {} chunks) is not aligned with {} ({} rows, {} chunks)",
                    v.key(),
                    v.num_rows(),
                    v.nchunks(),
                    first.key(),
                    first.num_rows(),
                    first.nchunks()
                ),
            ));
        }
    }
    Ok(())
}

impl ChunkGroup {
    pub(crate) fn gather(inputs: &[Vector], cidx: usize) -> Result<ChunkGroup> {
        let first = inputs
            .first()
            .ok_or_else(|| err(ErrorKind::EmptyInput, "task has no input vectors"))?;
        let chunks = inputs
            .iter()
            .map(|v| v.chunk(cidx).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(ChunkGroup {
            cidx,
            start: first.espc()[cidx],
            rows: chunks[0].len(),
            node: first.home(cidx)?,
            chunks,
        })
    }

    /// Chunk index shared by every member of the group.
    pub fn cidx(&self) -> usize {
        self.cidx
    }

    /// First global row covered by the group.
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Number of input vectors.
    pub fn width(&self) -> usize {
        self.chunks.len()
    }

    /// The chunk of input `i`. Panics if `i >= width()`.
    pub fn chunk(&self, i: usize) -> &Chunk {
        &self.chunks[i]
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}
