use crate::wordty::{FloTy, WordTy};
use std::sync::Arc;

// Chunk bodies are built once into a Vec and then frozen into an Arc<[u8]>
// that every reader shares. All multi-byte values are little-endian.

#[derive(Default)]
pub(crate) struct MemWriter {
    mem: Vec<u8>,
}

impl MemWriter {
    pub(crate) fn with_capacity(n: usize) -> Self {
        MemWriter {
            mem: Vec::with_capacity(n),
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.mem.len()
    }

    pub(crate) fn write_word(&mut self, ty: WordTy, v: i64) {
        match ty {
            WordTy::Word1 => self.mem.push(v as i8 as u8),
            WordTy::Word2 => self.mem.extend_from_slice(&(v as i16).to_le_bytes()),
            WordTy::Word4 => self.mem.extend_from_slice(&(v as i32).to_le_bytes()),
            WordTy::Word8 => self.mem.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub(crate) fn write_flo(&mut self, ty: FloTy, bits: u64) {
        match ty {
            FloTy::Flo4 => self.mem.extend_from_slice(&(bits as u32).to_le_bytes()),
            FloTy::Flo8 => self.mem.extend_from_slice(&bits.to_le_bytes()),
        }
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.mem.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.mem.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_bytes(&mut self, v: &[u8]) {
        self.mem.extend_from_slice(v);
    }

    pub(crate) fn into_bytes(self) -> Arc<[u8]> {
        Arc::from(self.mem)
    }
}

fn take<const N: usize>(bytes: &[u8], off: usize) -> [u8; N] {
    let mut buf = [0_u8; N];
    buf.copy_from_slice(&bytes[off..off + N]);
    buf
}

/// Reads the `i`th word of a dense slice of words of type `ty`.
pub(crate) fn read_word(bytes: &[u8], ty: WordTy, i: usize) -> i64 {
    let off = i * ty.len();
    match ty {
        WordTy::Word1 => bytes[off] as i8 as i64,
        WordTy::Word2 => i16::from_le_bytes(take(bytes, off)) as i64,
        WordTy::Word4 => i32::from_le_bytes(take(bytes, off)) as i64,
        WordTy::Word8 => i64::from_le_bytes(take(bytes, off)),
    }
}

/// Reads the raw bits of the `i`th float, widened to u64 for `Flo4`.
pub(crate) fn read_flo_bits(bytes: &[u8], ty: FloTy, i: usize) -> u64 {
    let off = i * ty.len();
    match ty {
        FloTy::Flo4 => u32::from_le_bytes(take(bytes, off)) as u64,
        FloTy::Flo8 => u64::from_le_bytes(take(bytes, off)),
    }
}

pub(crate) fn read_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(take(bytes, off))
}

pub(crate) fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(take(bytes, off))
}
