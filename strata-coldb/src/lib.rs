// A vector is a column of rows split into chunks. Chunks are written once
// through an append buffer, compressed at close into one of a small set of
// encodings, and never change afterwards:
//
// - Const  (no body, one value for every row, including all-NA)
// - Int    (1,2,4,8 byte words, optionally biased by the chunk min, scaled
//           by a power of ten so exact decimals survive)
// - Flo    (4 or 8 byte IEEE floats; 4 only when every value is exact in f32)
// - Sparse (row offsets + values for the rows that are not zero / not NA)
// - Str    (offset table + heap of length-prefixed UTF-8 runs)
// - Cat    (1,2,4 byte codes into the vector's domain)
//
// Every width reserves one bit pattern as NA, so NA never costs a bitmap.
//
// The buffer picks the smallest encoding that reproduces every appended
// value exactly. A builder collects the chunks of one vector, possibly
// from many threads, waits for all of them, lays them out back to back
// (the `espc` table of chunk start rows) and publishes the vector into a
// directory, after which any number of readers share it without locking.

mod buffer;
mod builder;
mod chunk;
mod directory;
mod domain;
mod encoding;
mod group;
mod heap;
mod ioutil;
mod value;
mod vector;
mod wordty;


pub use buffer::{AppendBuffer, BufferStats, EncodePolicy};
pub use builder::{LedgerSummary, VectorBuilder};
pub use chunk::Chunk;
pub use directory::Directory;
pub use domain::Domain;
pub use encoding::{Encoding, EncodingKind, IdxTy, SparseDefault, SparseVal};
pub use group::VectorGroup;
pub use value::{dec_to_f64, normalize_dec, ColumnType, DataType, Value};
pub use vector::{ChunkHandle, Vector, VectorPin};
pub use wordty::{FloTy, WordTy, NA_F32_BITS, NA_F64_BITS};
