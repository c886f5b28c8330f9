use crate::{
    builder::LedgerTicket,
    chunk::Chunk,
    domain::Domain,
    encoding::{Encoding, IdxTy, SparseDefault, SparseVal},
    heap::Heap,
    ioutil::MemWriter,
    value::{dec_to_f64, exact_int, normalize_dec, ColumnType, DataType, Value},
    wordty::{FloTy, WordTy, NA_F32_BITS, NA_F64_BITS},
};
use std::sync::Arc;
use strata_admin::Config;
use strata_base::{err, Error, ErrorKind, Result};
use tracing::trace;

/// The part of the engine config that steers encoding selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncodePolicy {
    pub sparse_ratio: f64,
    pub sparse_index_min_rows: usize,
    pub max_decimal_digits: i32,
}

impl From<&Config> for EncodePolicy {
    fn from(cfg: &Config) -> Self {
        EncodePolicy {
            sparse_ratio: cfg.sparse_ratio,
            sparse_index_min_rows: cfg.sparse_index_min_rows,
            max_decimal_digits: cfg.max_decimal_digits,
        }
    }
}

impl Default for EncodePolicy {
    fn default() -> Self {
        EncodePolicy::from(&Config::default())
    }
}

#[derive(Clone, Copy, Debug)]
enum NumCell {
    Na,
    Dec(i64, i32),
    Flo(f64),
}

// Until the first non-NA value arrives a buffer only counts NAs.
#[derive(Debug)]
enum Cells {
    Untyped(usize),
    Num(Vec<NumCell>),
    Str(Vec<Option<String>>),
    Cat(Vec<Option<u32>>),
}

/// Running statistics kept while appending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferStats {
    pub nas: usize,
    /// Smallest decimal exponent among fixed-point values seen so far: the
    /// scale the chunk will be stored at.
    pub min_exp: Option<i32>,
    /// Whether any float without an exact integer form was appended.
    pub fractional_floats: bool,
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

impl BufferStats {
    fn note(&mut self, v: f64) {
        if v.is_nan() {
            return;
        }
        self.lo = Some(self.lo.map_or(v, |lo| lo.min(v)));
        self.hi = Some(self.hi.map_or(v, |hi| hi.max(v)));
    }
}

/// Write-side accumulator for exactly one chunk.
///
/// The column type is either declared up front or fixed by the first
/// non-NA append. `close` consumes the buffer, so nothing can be appended
/// after the chunk has been sealed.
pub struct AppendBuffer {
    declared: Option<ColumnType>,
    domain: Option<Arc<Domain>>,
    policy: EncodePolicy,
    cells: Cells,
    stats: BufferStats,
    poisoned: Option<(ErrorKind, String)>,
    ticket: Option<LedgerTicket>,
}

impl AppendBuffer {
    pub fn new(declared: Option<ColumnType>, policy: EncodePolicy) -> Self {
        let domain = match declared {
            Some(ColumnType::Cat) => Some(Arc::new(Domain::new())),
            _ => None,
        };
        Self::with_domain(declared, domain, policy)
    }

    /// A categorical buffer coding labels through a shared domain.
    pub fn categorical(domain: Arc<Domain>, policy: EncodePolicy) -> Self {
        Self::with_domain(Some(ColumnType::Cat), Some(domain), policy)
    }

    fn with_domain(
        declared: Option<ColumnType>,
        domain: Option<Arc<Domain>>,
        policy: EncodePolicy,
    ) -> Self {
        AppendBuffer {
            declared,
            domain,
            policy,
            cells: Cells::Untyped(0),
            stats: BufferStats::default(),
            poisoned: None,
            ticket: None,
        }
    }

    pub(crate) fn set_ticket(&mut self, ticket: LedgerTicket) {
        self.ticket = Some(ticket);
    }

    pub fn len(&self) -> usize {
        match &self.cells {
            Cells::Untyped(n) => *n,
            Cells::Num(v) => v.len(),
            Cells::Str(v) => v.len(),
            Cells::Cat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    pub fn domain(&self) -> Option<&Arc<Domain>> {
        self.domain.as_ref()
    }

    /// The data type values appended so far have fixed, if any.
    pub fn data_type(&self) -> Option<DataType> {
        match &self.cells {
            Cells::Untyped(_) => self.declared.map(|t| t.data_type()),
            Cells::Num(_) => Some(DataType::Num),
            Cells::Str(_) => Some(DataType::Str),
            Cells::Cat(_) => Some(DataType::Cat),
        }
    }

    fn fail(&mut self, kind: ErrorKind, msg: String) -> Error {
        if self.poisoned.is_none() {
            self.poisoned = Some((kind, msg.clone()));
        }
        err(kind, msg)
    }

    fn check_room(&mut self) -> Result<()> {
        if self.len() >= u32::MAX as usize {
            return Err(self.fail(ErrorKind::OutOfRange, "chunk row limit reached".into()));
        }
        Ok(())
    }

    // Switches an untyped buffer to `ty`, back-filling its NAs, or fails if
    // the buffer already holds another type.
    fn typed(&mut self, ty: DataType) -> Result<()> {
        if let Some(declared) = self.declared {
            if declared.data_type() != ty {
                return Err(self.fail(
                    ErrorKind::SchemaMismatch,
                    format!("{:?} value appended to a {:?} column", ty, declared),
                ));
            }
        }
        let current = match &self.cells {
            Cells::Untyped(nas) => {
                let nas = *nas;
                self.cells = match ty {
                    DataType::Num => Cells::Num(vec![NumCell::Na; nas]),
                    DataType::Str => Cells::Str(vec![None; nas]),
                    DataType::Cat => Cells::Cat(vec![None; nas]),
                };
                return Ok(());
            }
            Cells::Num(_) => DataType::Num,
            Cells::Str(_) => DataType::Str,
            Cells::Cat(_) => DataType::Cat,
        };
        if current != ty {
            return Err(self.fail(
                ErrorKind::SchemaMismatch,
                format!("{:?} value appended to a buffer holding {:?}", ty, current),
            ));
        }
        Ok(())
    }

    pub fn append_na(&mut self) -> Result<()> {
        self.check_room()?;
        self.stats.nas += 1;
        match &mut self.cells {
            Cells::Untyped(n) => *n += 1,
            Cells::Num(v) => v.push(NumCell::Na),
            Cells::Str(v) => v.push(None),
            Cells::Cat(v) => v.push(None),
        }
        Ok(())
    }

    /// Appends `mantissa * 10^exp` exactly: "1.23" is `(123, -2)`.
    pub fn append_number(&mut self, mantissa: i64, exp: i32) -> Result<()> {
        self.check_room()?;
        self.typed(DataType::Num)?;
        let (m, e) = normalize_dec(mantissa, exp);
        self.stats.min_exp = Some(self.stats.min_exp.map_or(e, |x| x.min(e)));
        self.stats.note(dec_to_f64(m, e));
        if let Cells::Num(v) = &mut self.cells {
            v.push(NumCell::Dec(m, e));
        }
        Ok(())
    }

    pub fn append_i64(&mut self, v: i64) -> Result<()> {
        self.append_number(v, 0)
    }

    /// Appends a binary float. A source NaN that happens to carry the NA
    /// bit pattern is stored as the default NaN, so it stays a value.
    pub fn append_f64(&mut self, v: f64) -> Result<()> {
        self.check_room()?;
        self.typed(DataType::Num)?;
        let v = if v.to_bits() == NA_F64_BITS { f64::NAN } else { v };
        if let Some(i) = exact_int(v) {
            let (_, e) = normalize_dec(i, 0);
            self.stats.min_exp = Some(self.stats.min_exp.map_or(e, |x| x.min(e)));
        } else {
            self.stats.fractional_floats = true;
        }
        self.stats.note(v);
        if let Cells::Num(cells) = &mut self.cells {
            cells.push(NumCell::Flo(v));
        }
        Ok(())
    }

    /// Appends text. Categorical buffers code it through their domain.
    pub fn append_str(&mut self, text: &str) -> Result<()> {
        self.check_room()?;
        if self.declared == Some(ColumnType::Cat) {
            let code = match &self.domain {
                Some(domain) => domain.code_for(text),
                None => Err(err(ErrorKind::Domain, "categorical buffer has no domain")),
            };
            let code = match code {
                Ok(code) => code,
                Err(e) => return Err(self.fail(e.kind(), e.message().to_string())),
            };
            return self.push_code(code);
        }
        self.typed(DataType::Str)?;
        if let Cells::Str(v) = &mut self.cells {
            v.push(Some(text.to_string()));
        }
        Ok(())
    }

    /// Appends an already-coded categorical value.
    pub fn append_code(&mut self, code: u32) -> Result<()> {
        self.check_room()?;
        let known = self.domain.as_ref().map_or(0, |d| d.len());
        if code as usize >= known {
            return Err(self.fail(
                ErrorKind::Domain,
                format!("code {} outside domain of {} labels", code, known),
            ));
        }
        self.push_code(code)
    }

    fn push_code(&mut self, code: u32) -> Result<()> {
        self.typed(DataType::Cat)?;
        if let Cells::Cat(v) = &mut self.cells {
            v.push(Some(code));
        }
        Ok(())
    }

    pub fn append_value(&mut self, v: &Value) -> Result<()> {
        match v {
            Value::Na => self.append_na(),
            Value::Dec { mantissa, exp } => self.append_number(*mantissa, *exp),
            Value::Flo(f) => self.append_f64(*f),
            Value::Str(s) => self.append_str(s),
            Value::Cat(c) => self.append_code(*c),
        }
    }

    /// Seals the buffer into a chunk whose first global row is `start`,
    /// choosing the smallest encoding that reproduces every value exactly.
    pub fn close(mut self, start: u64) -> Result<Chunk> {
        let ticket = self.ticket.take();
        let sealed = self.seal(start);
        if let Some(ticket) = ticket {
            match &sealed {
                Ok(chunk) => ticket.record(chunk),
                Err(e) => ticket.fail(e),
            }
        }
        sealed
    }

    fn seal(self, start: u64) -> Result<Chunk> {
        if let Some((kind, msg)) = self.poisoned {
            return Err(err(kind, msg));
        }
        let rows = self.len();
        let policy = self.policy;
        let (enc, bytes) = match self.cells {
            Cells::Untyped(_) => (Encoding::Const(Value::Na), MemWriter::default().into_bytes()),
            Cells::Num(cells) => encode_num(&cells, &self.stats, &policy),
            Cells::Str(cells) => encode_str(&cells)?,
            Cells::Cat(codes) => encode_cat(&codes),
        };
        let chunk = Chunk::from_parts(start, rows, enc, bytes, policy.sparse_index_min_rows);
        trace!(target: "strata", start, rows, kind = ?chunk.kind(), bytes = chunk.body_bytes(), "sealed chunk");
        Ok(chunk)
    }
}

fn is_constant<T: PartialEq>(vals: &[T]) -> bool {
    match vals.first() {
        Some(first) => vals.iter().all(|v| v == first),
        None => true,
    }
}

fn encode_num(cells: &[NumCell], stats: &BufferStats, policy: &EncodePolicy) -> (Encoding, Arc<[u8]>) {
    match to_scaled_ints(cells, stats, policy) {
        Some((ints, exp)) => encode_ints(&ints, exp, policy),
        None => {
            let flos = cells
                .iter()
                .map(|c| match *c {
                    NumCell::Na => None,
                    NumCell::Dec(m, e) => Some(dec_to_f64(m, e)),
                    NumCell::Flo(f) => Some(f),
                })
                .collect::<Vec<_>>();
            encode_flos(&flos, policy)
        }
    }
}

// Brings every value to the buffer's smallest exponent. Fails (returning
// None, meaning "store as floats") on fractional floats, on exponents finer
// than the policy allows, or on mantissas that overflow when rescaled.
fn to_scaled_ints(
    cells: &[NumCell],
    stats: &BufferStats,
    policy: &EncodePolicy,
) -> Option<(Vec<Option<i64>>, i32)> {
    if stats.fractional_floats {
        return None;
    }
    let exp = stats.min_exp.unwrap_or(0);
    if exp < -policy.max_decimal_digits {
        return None;
    }
    let mut out = Vec::with_capacity(cells.len());
    for cell in cells {
        let (m, e) = match *cell {
            NumCell::Na => {
                out.push(None);
                continue;
            }
            NumCell::Dec(m, e) => (m, e),
            NumCell::Flo(f) => normalize_dec(f as i64, 0),
        };
        let shift = e as i64 - exp as i64;
        if shift > 18 {
            return None;
        }
        out.push(Some(m.checked_mul(10_i64.pow(shift as u32))?));
    }
    Some((out, exp))
}

// Picks the default for a sparse body and the number of rows it would have
// to list, if the default covers more than `sparse_ratio` of the rows.
fn sparse_plan(rows: usize, zeros: usize, nas: usize, policy: &EncodePolicy) -> Option<(SparseDefault, usize)> {
    if rows == 0 {
        return None;
    }
    let (default, count) = if zeros >= nas {
        (SparseDefault::Zero, zeros)
    } else {
        (SparseDefault::Na, nas)
    };
    if count as f64 / rows as f64 > policy.sparse_ratio {
        Some((default, rows - count))
    } else {
        None
    }
}

fn write_sparse_rows(wr: &mut MemWriter, idx: IdxTy, rows: &[usize]) {
    for &r in rows {
        match idx {
            IdxTy::Short => wr.write_u16(r as u16),
            IdxTy::Long => wr.write_u32(r as u32),
        }
    }
}

fn encode_ints(ints: &[Option<i64>], exp: i32, policy: &EncodePolicy) -> (Encoding, Arc<[u8]>) {
    let rows = ints.len();
    if is_constant(ints) {
        let v = match ints.first().copied().flatten() {
            Some(m) => {
                let (mantissa, exp) = normalize_dec(m, exp);
                Value::Dec { mantissa, exp }
            }
            None => Value::Na,
        };
        return (Encoding::Const(v), MemWriter::default().into_bytes());
    }
    let present = ints.iter().flatten();
    let lo = present.clone().copied().min().unwrap_or(0);
    let hi = present.copied().max().unwrap_or(0);
    let dense = WordTy::select_bias_and_ty(lo, hi);

    let zeros = ints.iter().filter(|v| **v == Some(0)).count();
    let nas = ints.iter().filter(|v| v.is_none()).count();
    if let Some((default, nnz)) = sparse_plan(rows, zeros, nas, policy) {
        let is_default = |v: &Option<i64>| match default {
            SparseDefault::Zero => *v == Some(0),
            SparseDefault::Na => v.is_none(),
        };
        let listed = (0..rows).filter(|r| !is_default(&ints[*r])).collect::<Vec<_>>();
        let entries = listed.iter().map(|r| ints[*r]).collect::<Vec<_>>();
        let elo = entries.iter().flatten().copied().min().unwrap_or(0);
        let ehi = entries.iter().flatten().copied().max().unwrap_or(0);
        if let Some((bias, ty)) = WordTy::select_bias_and_ty(elo, ehi) {
            let idx = IdxTy::for_rows(rows);
            let sparse_size = nnz * (idx.len() + ty.len());
            let dense_size = dense.map_or(rows * 8, |(_, t)| rows * t.len());
            if sparse_size < dense_size {
                let mut wr = MemWriter::with_capacity(sparse_size);
                write_sparse_rows(&mut wr, idx, &listed);
                for v in entries.iter() {
                    wr.write_word(ty, v.map_or(ty.na(), |m| m - bias));
                }
                let val = SparseVal::Int { ty, bias, exp };
                let enc = Encoding::Sparse {
                    idx,
                    val,
                    default,
                    nnz: nnz as u32,
                };
                return (enc, wr.into_bytes());
            }
        }
    }

    match dense {
        Some((bias, ty)) => {
            let mut wr = MemWriter::with_capacity(rows * ty.len());
            for v in ints.iter() {
                wr.write_word(ty, v.map_or(ty.na(), |m| m - bias));
            }
            (Encoding::Int { ty, bias, exp }, wr.into_bytes())
        }
        None => {
            // Only reachable when i64::MIN itself was appended.
            let flos = ints
                .iter()
                .map(|v| v.map(|m| dec_to_f64(m, exp)))
                .collect::<Vec<_>>();
            encode_flos(&flos, policy)
        }
    }
}

fn flo_bits_eq(a: &Option<f64>, b: &Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
        _ => false,
    }
}

fn encode_flos(flos: &[Option<f64>], policy: &EncodePolicy) -> (Encoding, Arc<[u8]>) {
    let rows = flos.len();
    if flos.iter().all(|v| flo_bits_eq(v, &flos[0])) && rows > 0 {
        let v = flos[0].map_or(Value::Na, Value::Flo);
        return (Encoding::Const(v), MemWriter::default().into_bytes());
    }
    let ty = if flos.iter().flatten().all(|v| FloTy::fits_f32(*v)) {
        FloTy::Flo4
    } else {
        FloTy::Flo8
    };

    let zeros = flos.iter().filter(|v| v.map(f64::to_bits) == Some(0)).count();
    let nas = flos.iter().filter(|v| v.is_none()).count();
    if let Some((default, nnz)) = sparse_plan(rows, zeros, nas, policy) {
        let idx = IdxTy::for_rows(rows);
        let sparse_size = nnz * (idx.len() + 8);
        if sparse_size < rows * ty.len() {
            let is_default = |v: &Option<f64>| match default {
                SparseDefault::Zero => v.map(f64::to_bits) == Some(0),
                SparseDefault::Na => v.is_none(),
            };
            let listed = (0..rows).filter(|r| !is_default(&flos[*r])).collect::<Vec<_>>();
            let mut wr = MemWriter::with_capacity(sparse_size);
            write_sparse_rows(&mut wr, idx, &listed);
            for r in listed.iter() {
                wr.write_flo(FloTy::Flo8, flos[*r].map_or(NA_F64_BITS, f64::to_bits));
            }
            let enc = Encoding::Sparse {
                idx,
                val: SparseVal::Flo8,
                default,
                nnz: nnz as u32,
            };
            return (enc, wr.into_bytes());
        }
    }

    let mut wr = MemWriter::with_capacity(rows * ty.len());
    for v in flos.iter() {
        let bits = match (ty, v) {
            (FloTy::Flo4, None) => NA_F32_BITS as u64,
            (FloTy::Flo4, Some(f)) => (*f as f32).to_bits() as u64,
            (FloTy::Flo8, None) => NA_F64_BITS,
            (FloTy::Flo8, Some(f)) => f.to_bits(),
        };
        wr.write_flo(ty, bits);
    }
    (Encoding::Flo { ty }, wr.into_bytes())
}

fn encode_str(cells: &[Option<String>]) -> Result<(Encoding, Arc<[u8]>)> {
    if is_constant(cells) && !cells.is_empty() {
        let v = cells[0].as_ref().map_or(Value::Na, |s| Value::Str(s.clone()));
        return Ok((Encoding::Const(v), MemWriter::default().into_bytes()));
    }
    let mut heap = Heap::default();
    let mut offsets = Vec::with_capacity(cells.len());
    for cell in cells {
        match cell {
            None => offsets.push(u32::MAX),
            Some(s) => {
                if heap.data.len() + s.len() + 4 >= u32::MAX as usize {
                    return Err(err(ErrorKind::OutOfRange, "string chunk heap exceeds 4GiB"));
                }
                offsets.push(heap.add(s));
            }
        }
    }
    let mut wr = MemWriter::with_capacity(offsets.len() * 4 + heap.data.len());
    for off in offsets {
        wr.write_u32(off);
    }
    debug_assert_eq!(wr.pos(), cells.len() * 4);
    wr.write_bytes(&heap.data);
    Ok((Encoding::Str, wr.into_bytes()))
}

fn encode_cat(codes: &[Option<u32>]) -> (Encoding, Arc<[u8]>) {
    if is_constant(codes) && !codes.is_empty() {
        let v = codes[0].map_or(Value::Na, Value::Cat);
        return (Encoding::Const(v), MemWriter::default().into_bytes());
    }
    let max = codes.iter().flatten().copied().max().unwrap_or(0);
    // Codes never exceed i32::MAX, so a 4-byte word always fits.
    let ty = WordTy::select_unbiased(0, max as i64).unwrap_or(WordTy::Word4);
    let mut wr = MemWriter::with_capacity(codes.len() * ty.len());
    for c in codes {
        wr.write_word(ty, c.map_or(ty.na(), |c| c as i64));
    }
    (Encoding::Cat { ty }, wr.into_bytes())
}
