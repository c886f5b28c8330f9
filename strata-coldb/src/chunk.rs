use crate::{
    encoding::{Encoding, EncodingKind, IdxTy, SparseDefault, SparseVal},
    ioutil::{read_flo_bits, read_u16, read_u32, read_word},
    value::{dec_to_f64, DataType, Value},
    wordty::{FloTy, WordTy, NA_F32_BITS, NA_F64_BITS},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_base::{err, Bitmap256, ErrorKind, Result};

/// An immutable, compressed, contiguous row range of one vector.
///
/// Cloning is cheap: the header and body are shared by reference, and no
/// reader ever needs a lock. Row arguments to the accessors are local to
/// the chunk (`0..len()`); passing a row outside that range panics, the
/// same as indexing a slice.
#[derive(Clone, Debug)]
pub struct Chunk {
    start: u64,
    rows: u32,
    enc: Arc<Encoding>,
    bytes: Arc<[u8]>,
    index: Option<Arc<SparseIndex>>,
}

// Rank index over a sparse chunk: one bitmap per 256 rows marking listed
// rows, plus the count of listed rows before each bitmap. Turns the
// binary search over row offsets into a constant-time lookup.
#[derive(Debug)]
struct SparseIndex {
    blocks: Vec<Bitmap256>,
    prefix: Vec<u32>,
}

impl SparseIndex {
    fn build(rows: usize, listed: impl Iterator<Item = usize>) -> Self {
        let nblocks = rows.div_ceil(256);
        let mut blocks = vec![Bitmap256::new(); nblocks];
        for r in listed {
            blocks[r / 256].set(r % 256, true);
        }
        let mut prefix = Vec::with_capacity(nblocks);
        let mut total = 0_u32;
        for b in blocks.iter() {
            prefix.push(total);
            total += b.count();
        }
        SparseIndex { blocks, prefix }
    }

    fn slot(&self, row: usize) -> Option<usize> {
        let (b, bit) = (row / 256, row % 256);
        let block = &self.blocks[b];
        if block.get(bit) {
            Some(self.prefix[b] as usize + block.rank(bit) - 1)
        } else {
            None
        }
    }
}

/// Serializable form of a chunk, used when shipping a vector between
/// directories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ChunkImage {
    pub(crate) rows: u32,
    pub(crate) enc: Encoding,
    pub(crate) bytes: Vec<u8>,
}

fn decode_int(word: i64, ty: WordTy, bias: i64, exp: i32) -> Value {
    if word == ty.na() {
        Value::Na
    } else {
        Value::Dec {
            mantissa: word.wrapping_add(bias),
            exp,
        }
    }
}

fn decode_flo(bits: u64, ty: FloTy) -> Value {
    match ty {
        FloTy::Flo4 if bits as u32 == NA_F32_BITS => Value::Na,
        FloTy::Flo4 => Value::Flo(f32::from_bits(bits as u32) as f64),
        FloTy::Flo8 if bits == NA_F64_BITS => Value::Na,
        FloTy::Flo8 => Value::Flo(f64::from_bits(bits)),
    }
}

impl Chunk {
    /// Wraps a body the append buffer just produced; no validation.
    pub(crate) fn from_parts(
        start: u64,
        rows: usize,
        enc: Encoding,
        bytes: Arc<[u8]>,
        index_min_rows: usize,
    ) -> Chunk {
        let mut chunk = Chunk {
            start,
            rows: rows as u32,
            enc: Arc::new(enc),
            bytes,
            index: None,
        };
        if let Encoding::Sparse { idx, nnz, .. } = *chunk.enc {
            if rows >= index_min_rows {
                let listed = (0..nnz as usize).map(|k| chunk.sparse_row(idx, k));
                chunk.index = Some(Arc::new(SparseIndex::build(rows, listed)));
            }
        }
        chunk
    }

    pub(crate) fn from_image(start: u64, img: ChunkImage, index_min_rows: usize) -> Result<Chunk> {
        validate_body(&img.enc, img.rows as usize, &img.bytes)?;
        Ok(Chunk::from_parts(
            start,
            img.rows as usize,
            img.enc,
            Arc::from(img.bytes),
            index_min_rows,
        ))
    }

    pub(crate) fn to_image(&self) -> ChunkImage {
        ChunkImage {
            rows: self.rows,
            enc: (*self.enc).clone(),
            bytes: self.bytes.to_vec(),
        }
    }

    pub(crate) fn with_start(&self, start: u64) -> Chunk {
        Chunk {
            start,
            ..self.clone()
        }
    }

    /// First global row of this chunk.
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn encoding(&self) -> &Encoding {
        &self.enc
    }

    pub fn kind(&self) -> EncodingKind {
        self.enc.kind()
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.enc.data_type()
    }

    /// Size of the compressed body in bytes.
    pub fn body_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// True when the sparse rank index was built for this chunk.
    pub fn has_sparse_index(&self) -> bool {
        self.index.is_some()
    }

    fn check(&self, row: usize) {
        if row >= self.rows as usize {
            panic!("row {} out of range for chunk of {} rows", row, self.rows);
        }
    }

    fn sparse_row(&self, idx: IdxTy, k: usize) -> usize {
        match idx {
            IdxTy::Short => read_u16(&self.bytes, k * 2) as usize,
            IdxTy::Long => read_u32(&self.bytes, k * 4) as usize,
        }
    }

    fn sparse_slot(&self, row: usize, idx: IdxTy, nnz: usize) -> Option<usize> {
        if let Some(index) = &self.index {
            return index.slot(row);
        }
        let (mut lo, mut hi) = (0, nnz);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let r = self.sparse_row(idx, mid);
            if r < row {
                lo = mid + 1;
            } else if r > row {
                hi = mid;
            } else {
                return Some(mid);
            }
        }
        None
    }

    fn sparse_value(&self, idx: IdxTy, val: SparseVal, nnz: usize, k: usize) -> Value {
        let vals = &self.bytes[nnz * idx.len()..];
        match val {
            SparseVal::Int { ty, bias, exp } => decode_int(read_word(vals, ty, k), ty, bias, exp),
            SparseVal::Flo8 => decode_flo(read_flo_bits(vals, FloTy::Flo8, k), FloTy::Flo8),
        }
    }

    fn sparse_default(val: SparseVal, default: SparseDefault) -> Value {
        match (default, val) {
            (SparseDefault::Na, _) => Value::Na,
            (SparseDefault::Zero, SparseVal::Int { .. }) => Value::int(0),
            (SparseDefault::Zero, SparseVal::Flo8) => Value::Flo(0.0),
        }
    }

    /// Decodes one row.
    pub fn get(&self, row: usize) -> Value {
        self.check(row);
        match &*self.enc {
            Encoding::Const(v) => v.clone(),
            Encoding::Int { ty, bias, exp } => {
                decode_int(read_word(&self.bytes, *ty, row), *ty, *bias, *exp)
            }
            Encoding::Flo { ty } => decode_flo(read_flo_bits(&self.bytes, *ty, row), *ty),
            Encoding::Sparse {
                idx,
                val,
                default,
                nnz,
            } => match self.sparse_slot(row, *idx, *nnz as usize) {
                Some(k) => self.sparse_value(*idx, *val, *nnz as usize, k),
                None => Self::sparse_default(*val, *default),
            },
            Encoding::Str => match self.at_str(row) {
                Some(s) => Value::Str(s.to_string()),
                None => Value::Na,
            },
            Encoding::Cat { ty } => match read_word(&self.bytes, *ty, row) {
                w if w == ty.na() => Value::Na,
                w => Value::Cat(w as u32),
            },
        }
    }

    /// Numeric view of one row: NA (and strings) read as NaN, categorical
    /// rows as their code.
    pub fn at_f64(&self, row: usize) -> f64 {
        self.check(row);
        match &*self.enc {
            Encoding::Int { ty, bias, exp } => match read_word(&self.bytes, *ty, row) {
                w if w == ty.na() => f64::NAN,
                w => dec_to_f64(w.wrapping_add(*bias), *exp),
            },
            Encoding::Flo { ty } => decode_flo(read_flo_bits(&self.bytes, *ty, row), *ty).as_f64(),
            Encoding::Str => f64::NAN,
            _ => self.get(row).as_f64(),
        }
    }

    pub fn is_na(&self, row: usize) -> bool {
        self.check(row);
        match &*self.enc {
            Encoding::Int { ty, .. } | Encoding::Cat { ty } => {
                read_word(&self.bytes, *ty, row) == ty.na()
            }
            Encoding::Str => self.at_str(row).is_none(),
            _ => self.get(row).is_na(),
        }
    }

    /// String view of one row of a string chunk; None for NA and for
    /// chunks that do not hold strings.
    pub fn at_str(&self, row: usize) -> Option<&str> {
        self.check(row);
        match &*self.enc {
            Encoding::Const(Value::Str(s)) => Some(s),
            Encoding::Str => {
                let off = read_u32(&self.bytes, row * 4);
                if off == u32::MAX {
                    return None;
                }
                let pos = self.rows as usize * 4 + off as usize;
                let len = read_u32(&self.bytes, pos) as usize;
                std::str::from_utf8(&self.bytes[pos + 4..pos + 4 + len]).ok()
            }
            _ => None,
        }
    }

    /// Domain code of one row of a categorical chunk.
    pub fn at_code(&self, row: usize) -> Option<u32> {
        match self.get(row) {
            Value::Cat(c) => Some(c),
            _ => None,
        }
    }

    pub fn iter_f64(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |r| self.at_f64(r))
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |r| self.get(r))
    }
}

fn corrupt(msg: impl Into<std::borrow::Cow<'static, str>>) -> strata_base::Error {
    err(ErrorKind::Corrupt, msg)
}

// Checks that a body received from elsewhere can be decoded without
// reading out of bounds.
fn validate_body(enc: &Encoding, rows: usize, bytes: &[u8]) -> Result<()> {
    let need = enc.body_len(rows);
    match enc {
        Encoding::Str => {
            if bytes.len() < need {
                return Err(corrupt("string body shorter than its offset table"));
            }
            for r in 0..rows {
                let off = read_u32(bytes, r * 4);
                if off == u32::MAX {
                    continue;
                }
                let pos = need + off as usize;
                if pos + 4 > bytes.len() {
                    return Err(corrupt("string offset past end of heap"));
                }
                let end = pos + 4 + read_u32(bytes, pos) as usize;
                if end > bytes.len() {
                    return Err(corrupt("string run past end of heap"));
                }
                if std::str::from_utf8(&bytes[pos + 4..end]).is_err() {
                    return Err(corrupt("string run is not UTF-8"));
                }
            }
        }
        Encoding::Sparse { idx, nnz, .. } => {
            if bytes.len() != need {
                return Err(corrupt("sparse body length mismatch"));
            }
            let mut prev: Option<usize> = None;
            for k in 0..*nnz as usize {
                let r = match idx {
                    IdxTy::Short => read_u16(bytes, k * 2) as usize,
                    IdxTy::Long => read_u32(bytes, k * 4) as usize,
                };
                if r >= rows || prev.is_some_and(|p| p >= r) {
                    return Err(corrupt("sparse row offsets not ascending within chunk"));
                }
                prev = Some(r);
            }
        }
        _ => {
            if bytes.len() != need {
                return Err(corrupt(format!(
                    "{:?} body is {} bytes, expected {}",
                    enc.kind(),
                    bytes.len(),
                    need
                )));
            }
        }
    }
    Ok(())
}
