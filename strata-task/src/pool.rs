use crate::{
    group::{check_aligned, ChunkGroup},
    handle::{TaskCore, TaskHandle},
    MapReduce,
};
use std::sync::Arc;
use strata_admin::Config;
use strata_base::{err, ErrorKind, Result};
use strata_coldb::Vector;
use tracing::debug;

/// Worker threads that run map invocations. Cloning shares the pool.
#[derive(Clone)]
pub struct TaskPool {
    pool: Arc<rayon::ThreadPool>,
}

impl TaskPool {
    /// `workers == 0` means one thread per core.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strata-worker-{}", i))
            .build()?;
        Ok(TaskPool {
            pool: Arc::new(pool),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.workers)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Starts `task` over `inputs` and returns without waiting. Inputs must
    /// be aligned and have at least one chunk.
    pub fn fork<T: MapReduce>(&self, task: T, inputs: &[Vector]) -> Result<TaskHandle<T::Output>> {
        check_aligned(inputs)?;
        let nchunks = inputs.first().map_or(0, Vector::nchunks);
        if nchunks == 0 {
            return Err(err(
                ErrorKind::EmptyInput,
                format!("task over {} inputs with no chunks", inputs.len()),
            ));
        }
        let groups = (0..nchunks)
            .map(|cidx| ChunkGroup::gather(inputs, cidx))
            .collect::<Result<Vec<_>>>()?;
        let pins = inputs.iter().map(Vector::pin).collect();
        let core = TaskCore::new(nchunks, pins);
        core.forked();
        debug!(target: "strata", inputs = inputs.len(), chunks = nchunks, "task forked");
        let task = Arc::new(task);
        for group in groups {
            let core = core.clone();
            let task = task.clone();
            self.pool.spawn(move || core.run_map(&*task, group));
        }
        Ok(TaskHandle::new(core))
    }

    /// Runs `task` to completion. Must not be called from a pool thread.
    pub fn run_blocking<T: MapReduce>(&self, task: T, inputs: &[Vector]) -> Result<T::Output> {
        self.fork(task, inputs)?.get()
    }
}
