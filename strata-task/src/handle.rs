use crate::{group::ChunkGroup, tree::ReductionTree, MapReduce};
use parking_lot::{Condvar, Mutex};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use strata_base::{err, Error, ErrorKind, NodeId, Result};
use strata_coldb::VectorPin;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Forked,
    Running,
    Reducing,
    Done,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed | TaskState::Cancelled)
    }
}

struct Progress<O> {
    state: TaskState,
    remaining: usize,
    tree: ReductionTree<O>,
    failure: Option<Error>,
    outcome: Option<Result<O>>,
    pins: Vec<VectorPin>,
}

pub(crate) struct TaskCore<O> {
    progress: Mutex<Progress<O>>,
    settled: Condvar,
    // Set on cancel or on the first failure: remaining maps are skipped.
    abort: AtomicBool,
    cancelled: AtomicBool,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<O: Send + 'static> TaskCore<O> {
    pub(crate) fn new(groups: usize, pins: Vec<VectorPin>) -> Arc<Self> {
        Arc::new(TaskCore {
            progress: Mutex::new(Progress {
                state: TaskState::Created,
                remaining: groups,
                tree: ReductionTree::new(),
                failure: None,
                outcome: None,
                pins,
            }),
            settled: Condvar::new(),
            abort: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        })
    }

    pub(crate) fn forked(&self) {
        self.progress.lock().state = TaskState::Forked;
    }

    pub(crate) fn run_map<T: MapReduce<Output = O>>(&self, task: &T, group: ChunkGroup) {
        let (node, cidx) = (group.node(), group.cidx());
        if self.abort.load(Ordering::Acquire) {
            return self.record(task, node, cidx, None);
        }
        {
            let mut p = self.progress.lock();
            if p.state == TaskState::Forked {
                p.state = TaskState::Running;
            }
        }
        trace!(target: "strata", cidx, rows = group.len(), "map");
        let res = match catch_unwind(AssertUnwindSafe(|| task.map(&group))) {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                debug!(target: "strata", cidx, error = %e, "map failed");
                Err(e.with_kind(ErrorKind::TaskFailed))
            }
            Err(payload) => Err(err(
                ErrorKind::TaskFailed,
                format!("map over chunk {} panicked: {}", cidx, panic_message(&*payload)),
            )),
        };
        self.record(task, node, cidx, Some(res));
    }

    // `None` marks a map that was skipped because the task is aborting.
    fn record<T: MapReduce<Output = O>>(
        &self,
        task: &T,
        node: NodeId,
        cidx: usize,
        res: Option<Result<O>>,
    ) {
        let mut p = self.progress.lock();
        match res {
            Some(Ok(v)) => p.tree.add(node, cidx, v),
            Some(Err(e)) => {
                self.abort.store(true, Ordering::Release);
                if p.failure.is_none() {
                    p.failure = Some(e);
                }
            }
            None => {}
        }
        p.remaining -= 1;
        if p.remaining > 0 {
            return;
        }

        // Last group in: this thread does the reduction.
        let tree = std::mem::take(&mut p.tree);
        let failure = p.failure.take();
        let outcome = if let Some(e) = failure {
            Err(e)
        } else if self.cancelled.load(Ordering::Acquire) {
            Err(err(ErrorKind::Cancelled, "task cancelled"))
        } else {
            p.state = TaskState::Reducing;
            drop(p);
            let folded = catch_unwind(AssertUnwindSafe(|| {
                tree.fold(|a, b| {
                    if self.cancelled.load(Ordering::Acquire) {
                        return Err(err(ErrorKind::Cancelled, "task cancelled"));
                    }
                    task.reduce(a, b)
                        .map_err(|e| e.with_kind(ErrorKind::TaskFailed))
                })
            }));
            p = self.progress.lock();
            match folded {
                Ok(Ok(Some(v))) => Ok(v),
                Ok(Ok(None)) => Err(err(ErrorKind::EmptyInput, "no partial results to reduce")),
                Ok(Err(e)) => Err(e),
                Err(payload) => Err(err(
                    ErrorKind::TaskFailed,
                    format!("reduce panicked: {}", panic_message(&*payload)),
                )),
            }
        };
        p.state = match &outcome {
            Ok(_) => TaskState::Done,
            Err(e) if e.kind() == ErrorKind::Cancelled => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        };
        p.pins.clear();
        debug!(target: "strata", state = ?p.state, "task finished");
        p.outcome = Some(outcome);
        self.settled.notify_all();
    }
}

/// Handle on a forked task.
pub struct TaskHandle<O> {
    core: Arc<TaskCore<O>>,
}

impl<O: Send + 'static> TaskHandle<O> {
    pub(crate) fn new(core: Arc<TaskCore<O>>) -> Self {
        TaskHandle { core }
    }

    /// Blocks until the task reaches a terminal state.
    pub fn get(self) -> Result<O> {
        let mut p = self.core.progress.lock();
        loop {
            if let Some(outcome) = p.outcome.take() {
                return outcome;
            }
            self.core.settled.wait(&mut p);
        }
    }

    pub fn is_done(&self) -> bool {
        self.core.progress.lock().state.is_terminal()
    }

    pub fn state(&self) -> TaskState {
        self.core.progress.lock().state
    }

    /// Requests cancellation. Maps that have not started are skipped and
    /// completed partials are discarded; a task that already finished is
    /// unaffected.
    pub fn cancel(&self) {
        if self.is_done() {
            return;
        }
        debug!(target: "strata", "task cancel requested");
        self.core.cancelled.store(true, Ordering::Release);
        self.core.abort.store(true, Ordering::Release);
    }
}
