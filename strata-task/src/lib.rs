// A task runs a user `map` once per aligned chunk group of its input
// vectors, in parallel on a worker pool, then folds the per-chunk results
// with a user `reduce` that must be associative and commutative:
//
//   Created -> Forked -> Running -> Reducing -> Done
//                  \--------\-----------\----> Failed | Cancelled
//
// Partials are folded through an explicit reduction tree: pairwise among
// the chunks of one home node first, then pairwise across nodes. With a
// single node that is just a balanced fold over chunk order.
//
// Inputs are pinned while the task runs, so the directory refuses to
// remove them out from under it.

mod group;
mod handle;
mod pool;
mod tree;

#[cfg(test)]
mod test;

pub use group::ChunkGroup;
pub use handle::{TaskHandle, TaskState};
pub use pool::TaskPool;
pub use tree::ReductionTree;

use strata_base::Result;

pub trait MapReduce: Send + Sync + 'static {
    type Output: Send + 'static;

    fn map(&self, group: &ChunkGroup) -> Result<Self::Output>;

    fn reduce(&self, a: Self::Output, b: Self::Output) -> Result<Self::Output>;
}

/// A task made of two closures.
pub struct FnTask<M, R> {
    map: M,
    reduce: R,
}

pub fn task<O, M, R>(map: M, reduce: R) -> FnTask<M, R>
where
    O: Send + 'static,
    M: Fn(&ChunkGroup) -> Result<O> + Send + Sync + 'static,
    R: Fn(O, O) -> Result<O> + Send + Sync + 'static,
{
    FnTask { map, reduce }
}

impl<O, M, R> MapReduce for FnTask<M, R>
where
    O: Send + 'static,
    M: Fn(&ChunkGroup) -> Result<O> + Send + Sync + 'static,
    R: Fn(O, O) -> Result<O> + Send + Sync + 'static,
{
    type Output = O;

    fn map(&self, group: &ChunkGroup) -> Result<O> {
        (self.map)(group)
    }

    fn reduce(&self, a: O, b: O) -> Result<O> {
        (self.reduce)(a, b)
    }
}
