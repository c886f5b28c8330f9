use crate::{
    buffer::{AppendBuffer, EncodePolicy},
    chunk::Chunk,
    directory::Directory,
    domain::Domain,
    value::{ColumnType, DataType},
    vector::Vector,
};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use strata_base::{err, Error, ErrorKind, Result, VecKey};
use tracing::debug;

/// Writer for one in-progress vector.
///
/// Buffers are issued per chunk index and may be filled and closed on any
/// thread; each one reports back to the builder's ledger when it is
/// closed, or when it is dropped without being closed. `finalize` waits
/// for every issued buffer to report before publishing anything.
#[derive(Clone)]
pub struct VectorBuilder {
    shared: Arc<BuilderShared>,
}

pub(crate) struct BuilderShared {
    key: VecKey,
    declared: Option<ColumnType>,
    domain: Option<Arc<Domain>>,
    policy: EncodePolicy,
    ledger: Mutex<Ledger>,
    settled: Condvar,
}

#[derive(Default)]
struct Ledger {
    opened: BTreeSet<usize>,
    pending: usize,
    chunks: BTreeMap<usize, Chunk>,
    rows: u64,
    bytes: u64,
    failures: Vec<(usize, ErrorKind, String)>,
    abandoned: Vec<usize>,
}

enum Outcome<'a> {
    Sealed(&'a Chunk),
    Failed(&'a Error),
    Abandoned,
}

impl BuilderShared {
    fn settle(&self, cidx: usize, outcome: Outcome) {
        let mut ledger = self.ledger.lock();
        ledger.pending -= 1;
        match outcome {
            Outcome::Sealed(chunk) => {
                ledger.rows += chunk.len() as u64;
                ledger.bytes += chunk.body_bytes() as u64;
                ledger.chunks.insert(cidx, chunk.clone());
            }
            Outcome::Failed(e) => {
                ledger
                    .failures
                    .push((cidx, e.kind(), e.message().to_string()));
            }
            Outcome::Abandoned => ledger.abandoned.push(cidx),
        }
        self.settled.notify_all();
    }
}

/// Carried by an issued buffer; settles its ledger entry exactly once.
pub(crate) struct LedgerTicket {
    shared: Arc<BuilderShared>,
    cidx: usize,
    armed: bool,
}

impl LedgerTicket {
    pub(crate) fn record(mut self, chunk: &Chunk) {
        self.armed = false;
        self.shared.settle(self.cidx, Outcome::Sealed(chunk));
    }

    pub(crate) fn fail(mut self, e: &Error) {
        self.armed = false;
        self.shared.settle(self.cidx, Outcome::Failed(e));
    }
}

impl Drop for LedgerTicket {
    fn drop(&mut self) {
        if self.armed {
            self.shared.settle(self.cidx, Outcome::Abandoned);
        }
    }
}

/// What the ledger has recorded so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub pending: usize,
    pub chunks: usize,
    pub rows: u64,
    pub bytes: u64,
}

impl VectorBuilder {
    pub fn new(key: VecKey, declared: Option<ColumnType>, policy: EncodePolicy) -> Self {
        let domain = match declared {
            Some(ColumnType::Cat) => Some(Arc::new(Domain::new())),
            _ => None,
        };
        Self::with_parts(key, declared, domain, policy)
    }

    /// A categorical builder whose buffers all code through `domain`.
    pub fn categorical(key: VecKey, domain: Arc<Domain>, policy: EncodePolicy) -> Self {
        Self::with_parts(key, Some(ColumnType::Cat), Some(domain), policy)
    }

    fn with_parts(
        key: VecKey,
        declared: Option<ColumnType>,
        domain: Option<Arc<Domain>>,
        policy: EncodePolicy,
    ) -> Self {
        VectorBuilder {
            shared: Arc::new(BuilderShared {
                key,
                declared,
                domain,
                policy,
                ledger: Mutex::new(Ledger::default()),
                settled: Condvar::new(),
            }),
        }
    }

    pub fn key(&self) -> VecKey {
        self.shared.key
    }

    pub fn domain(&self) -> Option<&Arc<Domain>> {
        self.shared.domain.as_ref()
    }

    /// Issues the buffer for chunk `cidx`. Each index is issued once.
    pub fn open_chunk(&self, cidx: usize) -> Result<AppendBuffer> {
        {
            let mut ledger = self.shared.ledger.lock();
            if !ledger.opened.insert(cidx) {
                return Err(err(
                    ErrorKind::OutOfRange,
                    format!("chunk {} of {} already issued", cidx, self.shared.key),
                ));
            }
            ledger.pending += 1;
        }
        let mut buf = match &self.shared.domain {
            Some(domain) if self.shared.declared == Some(ColumnType::Cat) => {
                AppendBuffer::categorical(domain.clone(), self.shared.policy)
            }
            _ => AppendBuffer::new(self.shared.declared, self.shared.policy),
        };
        buf.set_ticket(LedgerTicket {
            shared: self.shared.clone(),
            cidx,
            armed: true,
        });
        Ok(buf)
    }

    /// Closes a buffer issued by this builder. Chunk start rows are fixed
    /// up at finalize, once every chunk's length is known.
    pub fn commit(&self, buf: AppendBuffer) -> Result<()> {
        buf.close(0).map(|_| ())
    }

    pub fn summary(&self) -> LedgerSummary {
        let ledger = self.shared.ledger.lock();
        LedgerSummary {
            pending: ledger.pending,
            chunks: ledger.chunks.len(),
            rows: ledger.rows,
            bytes: ledger.bytes,
        }
    }

    /// Waits for every issued buffer to settle, then checks the chunks
    /// agree on a type, lays them out and publishes the vector.
    pub fn finalize(self, dir: &Directory) -> Result<Vector> {
        let key = self.shared.key;
        let chunks = {
            let mut ledger = self.shared.ledger.lock();
            while ledger.pending > 0 {
                self.shared.settled.wait(&mut ledger);
            }
            if let Some((cidx, kind, msg)) = ledger.failures.first() {
                return Err(err(
                    *kind,
                    format!("chunk {} of {} failed: {}", cidx, key, msg),
                ));
            }
            if let Some(cidx) = ledger.abandoned.first() {
                return Err(err(
                    ErrorKind::Corrupt,
                    format!("chunk {} of {} was dropped without being closed", cidx, key),
                ));
            }
            std::mem::take(&mut ledger.chunks)
        };

        let mut found: Option<DataType> = None;
        for (cidx, chunk) in chunks.iter() {
            let Some(dt) = chunk.data_type() else {
                continue;
            };
            match (found, self.shared.declared) {
                (_, Some(ct)) if ct.data_type() != dt => {
                    return Err(err(
                        ErrorKind::SchemaMismatch,
                        format!("chunk {} of {} holds {:?}, column is {:?}", cidx, key, dt, ct),
                    ))
                }
                (Some(prev), _) if prev != dt => {
                    return Err(err(
                        ErrorKind::SchemaMismatch,
                        format!("chunk {} of {} holds {:?}, earlier chunks {:?}", cidx, key, dt, prev),
                    ))
                }
                _ => found = Some(dt),
            }
        }
        let ctype = match (self.shared.declared, found) {
            (Some(ct), _) => ct,
            (None, Some(DataType::Str)) => ColumnType::Str,
            (None, Some(DataType::Cat)) => ColumnType::Cat,
            (None, _) => ColumnType::Num,
        };
        if let Some(domain) = &self.shared.domain {
            domain.freeze();
        }

        let mut laid = Vec::with_capacity(chunks.len());
        let mut start = 0_u64;
        for chunk in chunks.into_values().filter(|c| !c.is_empty()) {
            let n = chunk.len() as u64;
            laid.push(chunk.with_start(start));
            start += n;
        }
        let vector = Vector::assemble(key, ctype, laid, self.shared.domain.clone(), dir.nodes());
        dir.publish(vector.clone())?;
        debug!(target: "strata", %key, rows = vector.num_rows(), chunks = vector.nchunks(), "finalized vector");
        Ok(vector)
    }
}
