use crate::{task, ChunkGroup, MapReduce, ReductionTree, TaskPool, TaskState};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use strata_admin::Config;
use strata_base::{err, ErrorKind, NodeId, Result, VecKey};
use strata_coldb::{Directory, Value, Vector};
use test_log::test;

struct SumOfProducts;

impl MapReduce for SumOfProducts {
    type Output = f64;

    fn map(&self, g: &ChunkGroup) -> Result<f64> {
        let (a, b) = (g.chunk(0), g.chunk(1));
        Ok((0..g.len()).map(|r| a.at_f64(r) * b.at_f64(r)).sum())
    }

    fn reduce(&self, x: f64, y: f64) -> Result<f64> {
        Ok(x + y)
    }
}

fn aligned_pair(dir: &Directory) -> Result<(Vector, Vector)> {
    let a = (1..=10).map(Value::int).collect::<Vec<_>>();
    let b = (1..=10)
        .map(|i| Value::Dec { mantissa: i * 5, exp: -1 })
        .collect::<Vec<_>>();
    let va = Vector::make_split(dir, VecKey::named("a"), None, &a, &[3, 3, 4])?;
    let vb = Vector::make_split(dir, VecKey::named("b"), None, &b, &[3, 3, 4])?;
    Ok((va, vb))
}

fn wait_on(gate: &AtomicBool) {
    while !gate.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_sum_of_products_blocking_and_forked() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(4)?;
    let (a, b) = aligned_pair(&dir)?;
    let inputs = [a, b];
    let blocking = pool.run_blocking(SumOfProducts, &inputs)?;
    let handle = pool.fork(SumOfProducts, &inputs)?;
    while !handle.is_done() {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(handle.state(), TaskState::Done);
    let forked = handle.get()?;
    assert_eq!(blocking, 192.5);
    assert_eq!(forked, blocking);
    Ok(())
}

#[test]
fn test_misaligned_inputs() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(2)?;
    let vals = (0..10).map(Value::int).collect::<Vec<_>>();
    let a = Vector::make_split(&dir, VecKey::named("a"), None, &vals, &[5, 5])?;
    let b = Vector::make_split(&dir, VecKey::named("b"), None, &vals, &[3, 3, 4])?;
    let res = pool.run_blocking(SumOfProducts, &[a, b]);
    assert_eq!(res.unwrap_err().kind(), ErrorKind::Alignment);
    Ok(())
}

#[test]
fn test_empty_inputs() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(1)?;
    let empty = Vector::make_values(&dir, VecKey::named("empty"), None, &[])?;
    let count = || task(|g: &ChunkGroup| Ok(g.len()), |a: usize, b: usize| Ok(a + b));
    let res = pool.run_blocking(count(), &[empty]);
    assert_eq!(res.unwrap_err().kind(), ErrorKind::EmptyInput);
    let res = pool.run_blocking(count(), &[]);
    assert_eq!(res.unwrap_err().kind(), ErrorKind::EmptyInput);
    Ok(())
}

#[test]
fn test_map_error_fails_task() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(2)?;
    let (a, _) = aligned_pair(&dir)?;
    let failing = task(
        |g: &ChunkGroup| {
            if g.cidx() == 1 {
                Err(err(ErrorKind::OutOfRange, "bad chunk"))
            } else {
                Ok(1_u64)
            }
        },
        |x: u64, y: u64| Ok(x + y),
    );
    let e = pool.run_blocking(failing, &[a]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::TaskFailed);
    // The map's own error comes back relabelled, message intact.
    assert_eq!(e.message(), "bad chunk");
    Ok(())
}

#[test]
fn test_map_panic_fails_task() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(2)?;
    let (a, _) = aligned_pair(&dir)?;
    let panicking = task(
        |g: &ChunkGroup| -> Result<u64> {
            if g.cidx() == 2 {
                panic!("boom");
            }
            Ok(1)
        },
        |x: u64, y: u64| Ok(x + y),
    );
    let handle = pool.fork(panicking, &[a])?;
    let e = handle.get().unwrap_err();
    assert_eq!(e.kind(), ErrorKind::TaskFailed);
    assert!(e.message().contains("boom"));
    Ok(())
}

#[test]
fn test_reduce_error_fails_task() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(2)?;
    let (a, _) = aligned_pair(&dir)?;
    let failing = task(
        |g: &ChunkGroup| Ok(g.len()),
        |_: usize, _: usize| Err(err(ErrorKind::OutOfRange, "cannot combine")),
    );
    let e = pool.run_blocking(failing, &[a]).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::TaskFailed);
    assert_eq!(e.message(), "cannot combine");
    Ok(())
}

#[test]
fn test_running_task_pins_inputs() -> Result<()> {
    let dir = Directory::new(&Config::default())?;
    let pool = TaskPool::new(2)?;
    let key = VecKey::named("pinned");
    let v = Vector::make_values(&dir, key, None, &[Value::int(1), Value::int(2)])?;
    let gate = Arc::new(AtomicBool::new(false));
    let held = gate.clone();
    let blocked = task(
        move |g: &ChunkGroup| {
            wait_on(&held);
            Ok(g.len())
        },
        |a: usize, b: usize| Ok(a + b),
    );
    let handle = pool.fork(blocked, &[v])?;
    assert_eq!(dir.remove(key).unwrap_err().kind(), ErrorKind::InUse);
    gate.store(true, Ordering::Release);
    assert_eq!(handle.get()?, 2);
    dir.remove(key)?;
    Ok(())
}

#[test]
fn test_cancel_discards_partials() -> Result<()> {
    let dir = Directory::new(&Config::default().with_chunk_rows(1))?;
    let pool = TaskPool::new(1)?;
    let vals = (0..8).map(Value::int).collect::<Vec<_>>();
    let v = Vector::make_values(&dir, VecKey::named("many"), None, &vals)?;
    let gate = Arc::new(AtomicBool::new(false));
    let held = gate.clone();
    let blocked = task(
        move |g: &ChunkGroup| {
            wait_on(&held);
            Ok(g.len())
        },
        |a: usize, b: usize| Ok(a + b),
    );
    let handle = pool.fork(blocked, &[v])?;
    handle.cancel();
    gate.store(true, Ordering::Release);
    while !handle.is_done() {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(handle.state(), TaskState::Cancelled);
    assert_eq!(handle.get().unwrap_err().kind(), ErrorKind::Cancelled);
    Ok(())
}

#[test]
fn test_groups_spread_over_nodes() -> Result<()> {
    let cfg = Config::default()
        .with_chunk_rows(2)
        .with_nodes(vec![NodeId(1), NodeId(2), NodeId(3)]);
    let dir = Directory::new(&cfg)?;
    let pool = TaskPool::from_config(&cfg.clone().with_workers(3))?;
    assert_eq!(pool.workers(), 3);
    let vals = (0..20).map(Value::int).collect::<Vec<_>>();
    let a = Vector::make_values(&dir, VecKey::named("x"), None, &vals)?;
    let b = Vector::make_values(&dir, VecKey::named("y"), None, &vals)?;
    let sum = task(
        |g: &ChunkGroup| {
            assert_eq!(g.width(), 2);
            assert_eq!(g.start(), g.chunk(1).start());
            assert!(g.node().0 >= 1 && g.node().0 <= 3);
            Ok((0..g.len()).map(|r| g.chunk(0).at_f64(r)).sum::<f64>())
        },
        |x: f64, y: f64| Ok(x + y),
    );
    assert_eq!(pool.run_blocking(sum, &[a, b])?, 190.0);
    Ok(())
}

#[test]
fn test_reduction_order_does_not_matter() -> Result<()> {
    let leaves = (0..20_usize).map(|c| (NodeId((c % 3) as u32), c, c as u64 * 7));
    let mut forward = ReductionTree::new();
    for (n, c, v) in leaves.clone() {
        forward.add(n, c, v);
    }
    let mut backward = ReductionTree::new();
    for (n, c, v) in leaves.rev() {
        backward.add(n, c, v);
    }
    assert_eq!(forward.len(), 20);
    assert_eq!(forward.nodes().count(), 3);
    let add = |a: u64, b: u64| -> Result<u64> { Ok(a + b) };
    let total = (0..20_u64).map(|v| v * 7).sum::<u64>();
    assert_eq!(forward.fold(add)?, Some(total));
    assert_eq!(backward.fold(add)?, Some(total));
    assert_eq!(ReductionTree::<u64>::new().fold(add)?, None);
    Ok(())
}

#[test]
fn test_reduction_tree_shape() -> Result<()> {
    // Concatenation exposes the grouping: chunk order within a node, then
    // node order, regardless of arrival order.
    let mut tree = ReductionTree::new();
    tree.add(NodeId(1), 4, "e".to_string());
    tree.add(NodeId(0), 2, "c".to_string());
    tree.add(NodeId(0), 0, "a".to_string());
    tree.add(NodeId(1), 3, "d".to_string());
    tree.add(NodeId(0), 1, "b".to_string());
    let folded = tree.fold(|a, b| Ok(format!("({}{})", a, b)))?;
    assert_eq!(folded.as_deref(), Some("(((ab)c)(de))"));
    Ok(())
}
