// An engine collects together everything one process needs to hold
// vectors and compute over them: the configuration, the directory of
// published vectors, and the worker pool tasks run on.
//
// Decoders write through `sink()`; clients read vectors back through the
// directory and submit map-reduce tasks with `run_blocking` or `fork`.

pub mod rollup;

#[cfg(test)]
mod test;

use std::sync::Arc;
use tracing::info;

pub use strata_adapt::{preview, ColumnWriter, Datum, ParseSink, Preview};
pub use strata_admin::Config;
pub use strata_base::{err, Error, ErrorKind, NodeId, Result, VecKey};
pub use strata_coldb::{
    AppendBuffer, Chunk, ChunkHandle, ColumnType, Directory, Domain, EncodingKind, Value, Vector,
    VectorBuilder, VectorGroup,
};
pub use strata_task::{task, ChunkGroup, MapReduce, ReductionTree, TaskHandle, TaskPool, TaskState};

pub struct Engine {
    config: Config,
    directory: Arc<Directory>,
    pool: TaskPool,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let directory = Arc::new(Directory::new(&config)?);
        let pool = TaskPool::from_config(&config)?;
        info!(
            target: "strata",
            workers = pool.workers(),
            nodes = config.nodes.len(),
            chunk_rows = config.chunk_rows,
            "engine started"
        );
        Ok(Engine {
            config,
            directory,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// A fresh sink whose columns land in this engine's directory.
    pub fn sink(&self) -> ParseSink {
        ParseSink::new(self.directory.clone())
    }

    pub fn vector(&self, key: VecKey) -> Result<Vector> {
        self.directory.get(key)
    }

    pub fn remove(&self, key: VecKey) -> Result<()> {
        self.directory.remove(key).map(|_| ())
    }

    pub fn run_blocking<T: MapReduce>(&self, task: T, inputs: &[Vector]) -> Result<T::Output> {
        self.pool.run_blocking(task, inputs)
    }

    pub fn fork<T: MapReduce>(&self, task: T, inputs: &[Vector]) -> Result<TaskHandle<T::Output>> {
        self.pool.fork(task, inputs)
    }
}
