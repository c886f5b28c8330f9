use std::sync::atomic::{AtomicU32, Ordering};
use strata_base::VecKey;

/// Issues keys that share one group prefix, so that vectors written
/// together (the columns of one frame) are recognizably related.
#[derive(Debug)]
pub struct VectorGroup {
    group: u64,
    next: AtomicU32,
}

impl VectorGroup {
    pub fn new(group: u64) -> Self {
        VectorGroup {
            group,
            next: AtomicU32::new(0),
        }
    }

    pub fn group(&self) -> u64 {
        self.group
    }

    pub fn add_vec(&self) -> VecKey {
        VecKey::new(self.group, self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_vecs(&self, n: usize) -> Vec<VecKey> {
        let first = self.next.fetch_add(n as u32, Ordering::Relaxed);
        (0..n as u32).map(|i| VecKey::new(self.group, first + i)).collect()
    }
}
