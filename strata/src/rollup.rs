// Summary statistics of a numeric vector, computed in one pass. Each chunk
// runs Welford's update; partials merge with Chan's formula, which is
// associative and commutative, so the reduction tree may combine them in
// any order.

use crate::{ChunkGroup, ColumnType, Engine, MapReduce, Vector};
use ordered_float::OrderedFloat;
use strata_base::{err, ErrorKind, Result};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rollups {
    pub rows: u64,
    /// NA and NaN rows.
    pub na_count: u64,
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation.
    pub sigma: f64,
}

#[derive(Clone, Copy, Debug)]
struct Partial {
    rows: u64,
    nas: u64,
    n: u64,
    mean: f64,
    m2: f64,
    min: OrderedFloat<f64>,
    max: OrderedFloat<f64>,
}

impl Default for Partial {
    fn default() -> Self {
        Partial {
            rows: 0,
            nas: 0,
            n: 0,
            mean: 0.0,
            m2: 0.0,
            min: OrderedFloat(f64::INFINITY),
            max: OrderedFloat(f64::NEG_INFINITY),
        }
    }
}

impl Partial {
    fn push(&mut self, v: f64) {
        self.rows += 1;
        if v.is_nan() {
            self.nas += 1;
            return;
        }
        self.n += 1;
        let delta = v - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (v - self.mean);
        self.min = self.min.min(OrderedFloat(v));
        self.max = self.max.max(OrderedFloat(v));
    }

    fn merge(self, other: Partial) -> Partial {
        let n = self.n + other.n;
        let (mean, m2) = if n == 0 {
            (0.0, 0.0)
        } else {
            let (na, nb) = (self.n as f64, other.n as f64);
            let delta = other.mean - self.mean;
            (
                self.mean + delta * nb / n as f64,
                self.m2 + other.m2 + delta * delta * na * nb / n as f64,
            )
        };
        Partial {
            rows: self.rows + other.rows,
            nas: self.nas + other.nas,
            n,
            mean,
            m2,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    fn finish(self) -> Rollups {
        let any = self.n > 0;
        Rollups {
            rows: self.rows,
            na_count: self.nas,
            count: self.n,
            min: if any { self.min.0 } else { f64::NAN },
            max: if any { self.max.0 } else { f64::NAN },
            mean: if any { self.mean } else { f64::NAN },
            sigma: if self.n > 1 {
                (self.m2 / (self.n - 1) as f64).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

struct RollupTask;

impl MapReduce for RollupTask {
    type Output = Partial;

    fn map(&self, group: &ChunkGroup) -> Result<Partial> {
        let mut p = Partial::default();
        for v in group.chunk(0).iter_f64() {
            p.push(v);
        }
        Ok(p)
    }

    fn reduce(&self, a: Partial, b: Partial) -> Result<Partial> {
        Ok(a.merge(b))
    }
}

impl Rollups {
    /// Computes rollups of a numeric, time or categorical vector (the
    /// latter over its codes).
    pub fn compute(engine: &Engine, v: &Vector) -> Result<Rollups> {
        if v.column_type() == ColumnType::Str {
            return Err(err(
                ErrorKind::SchemaMismatch,
                format!("no rollups for string vector {}", v.key()),
            ));
        }
        let partial = if v.nchunks() == 0 {
            Partial::default()
        } else {
            engine.run_blocking(RollupTask, std::slice::from_ref(v))?
        };
        let r = partial.finish();
        debug!(target: "strata", key = %v.key(), rows = r.rows, nas = r.na_count, "rollups");
        Ok(r)
    }
}
