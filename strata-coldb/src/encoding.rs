// The closed set of chunk encodings. An `Encoding` is the small fixed
// header of a chunk: everything needed to interpret its body bytes.
//
//   - Const:  no body. The single value lives in the header.
//   - Int:    rows words of `ty`; value = (word + bias) * 10^exp,
//             word == ty.na() is NA.
//   - Flo:    rows IEEE floats of `ty`; the NA bit pattern is NA.
//   - Sparse: nnz row offsets (u16 or u32, ascending), then nnz values
//             (Int words with bias/exp, or f64 bits). Unlisted rows read
//             as the default.
//   - Str:    rows u32 offsets into a heap that follows them; each heap run
//             is a u32 byte length then UTF-8 bytes. u32::MAX is NA.
//   - Cat:    rows words of `ty` holding domain codes; ty.na() is NA.

use crate::value::{DataType, Value};
use crate::wordty::{FloTy, WordTy};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Encoding {
    Const(Value),
    Int {
        ty: WordTy,
        bias: i64,
        exp: i32,
    },
    Flo {
        ty: FloTy,
    },
    Sparse {
        idx: IdxTy,
        val: SparseVal,
        default: SparseDefault,
        nnz: u32,
    },
    Str,
    Cat {
        ty: WordTy,
    },
}

/// Width of the row offsets in a sparse body.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdxTy {
    Short,
    Long,
}

impl IdxTy {
    pub fn len(&self) -> usize {
        match self {
            IdxTy::Short => 2,
            IdxTy::Long => 4,
        }
    }

    pub(crate) fn for_rows(rows: usize) -> IdxTy {
        if rows <= (u16::MAX as usize) + 1 {
            IdxTy::Short
        } else {
            IdxTy::Long
        }
    }
}

/// How the stored entries of a sparse body are encoded.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum SparseVal {
    Int { ty: WordTy, bias: i64, exp: i32 },
    Flo8,
}

impl SparseVal {
    pub fn len(&self) -> usize {
        match self {
            SparseVal::Int { ty, .. } => ty.len(),
            SparseVal::Flo8 => 8,
        }
    }
}

/// The value of every row a sparse body does not list.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum SparseDefault {
    Zero,
    Na,
}

/// Flat tag for each encoding and width, for reporting and tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub enum EncodingKind {
    Const,
    Int1,
    Int2,
    Int4,
    Int8,
    Flo4,
    Flo8,
    SparseShort,
    SparseLong,
    Str,
    Cat,
}

impl Encoding {
    pub fn kind(&self) -> EncodingKind {
        match self {
            Encoding::Const(_) => EncodingKind::Const,
            Encoding::Int { ty, .. } => match ty {
                WordTy::Word1 => EncodingKind::Int1,
                WordTy::Word2 => EncodingKind::Int2,
                WordTy::Word4 => EncodingKind::Int4,
                WordTy::Word8 => EncodingKind::Int8,
            },
            Encoding::Flo { ty: FloTy::Flo4 } => EncodingKind::Flo4,
            Encoding::Flo { ty: FloTy::Flo8 } => EncodingKind::Flo8,
            Encoding::Sparse { idx: IdxTy::Short, .. } => EncodingKind::SparseShort,
            Encoding::Sparse { idx: IdxTy::Long, .. } => EncodingKind::SparseLong,
            Encoding::Str => EncodingKind::Str,
            Encoding::Cat { .. } => EncodingKind::Cat,
        }
    }

    /// None for an all-NA constant, which fits any column.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Encoding::Const(v) => v.data_type(),
            Encoding::Int { .. } | Encoding::Flo { .. } | Encoding::Sparse { .. } => {
                Some(DataType::Num)
            }
            Encoding::Str => Some(DataType::Str),
            Encoding::Cat { .. } => Some(DataType::Cat),
        }
    }

    /// Exact body length for fixed-layout encodings, or the minimum length
    /// for strings (whose heap follows the offset table).
    pub fn body_len(&self, rows: usize) -> usize {
        match self {
            Encoding::Const(_) => 0,
            Encoding::Int { ty, .. } | Encoding::Cat { ty } => rows * ty.len(),
            Encoding::Flo { ty } => rows * ty.len(),
            Encoding::Sparse { idx, val, nnz, .. } => (*nnz as usize) * (idx.len() + val.len()),
            Encoding::Str => rows * 4,
        }
    }
}
