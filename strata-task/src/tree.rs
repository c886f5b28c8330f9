use std::collections::BTreeMap;
use strata_base::{NodeId, Result};

/// Partial results waiting to be reduced, grouped by the home node of the
/// chunk that produced them.
#[derive(Debug)]
pub struct ReductionTree<T> {
    leaves: BTreeMap<NodeId, Vec<(usize, T)>>,
    len: usize,
}

impl<T> Default for ReductionTree<T> {
    fn default() -> Self {
        ReductionTree {
            leaves: BTreeMap::new(),
            len: 0,
        }
    }
}

// Folds neighbours pairwise, level by level, until one value is left.
fn pairwise<T>(mut level: Vec<T>, f: &mut impl FnMut(T, T) -> Result<T>) -> Result<Option<T>> {
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut it = level.into_iter();
        while let Some(a) = it.next() {
            match it.next() {
                Some(b) => next.push(f(a, b)?),
                None => next.push(a),
            }
        }
        level = next;
    }
    Ok(level.pop())
}

impl<T> ReductionTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: NodeId, cidx: usize, partial: T) {
        self.leaves.entry(node).or_default().push((cidx, partial));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.leaves.keys().copied()
    }

    /// Reduces every leaf to one value: within each node in chunk order,
    /// then across nodes in node order. None when the tree is empty.
    pub fn fold(self, mut f: impl FnMut(T, T) -> Result<T>) -> Result<Option<T>> {
        let mut per_node = Vec::with_capacity(self.leaves.len());
        for (_, mut leaves) in self.leaves {
            leaves.sort_by_key(|(cidx, _)| *cidx);
            let vals = leaves.into_iter().map(|(_, v)| v).collect();
            if let Some(v) = pairwise(vals, &mut f)? {
                per_node.push(v);
            }
        }
        pairwise(per_node, &mut f)
    }
}
