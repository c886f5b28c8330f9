use funty::Signed;
use serde::{Deserialize, Serialize};

// Fixed-width signed words. The most negative value of each width is never
// a stored value; it is the NA sentinel for that width.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WordTy {
    Word1,
    Word2,
    Word4,
    Word8,
}

fn signed_bounds<T: Signed + Into<i64>>() -> (i64, i64) {
    (T::MIN.into(), T::MAX.into())
}

impl WordTy {
    pub(crate) const ALL: [WordTy; 4] = [WordTy::Word1, WordTy::Word2, WordTy::Word4, WordTy::Word8];

    pub fn len(&self) -> usize {
        match self {
            WordTy::Word1 => 1,
            WordTy::Word2 => 2,
            WordTy::Word4 => 4,
            WordTy::Word8 => 8,
        }
    }

    fn bounds(&self) -> (i64, i64) {
        match self {
            WordTy::Word1 => signed_bounds::<i8>(),
            WordTy::Word2 => signed_bounds::<i16>(),
            WordTy::Word4 => signed_bounds::<i32>(),
            WordTy::Word8 => signed_bounds::<i64>(),
        }
    }

    pub fn na(&self) -> i64 {
        self.bounds().0
    }

    pub fn max(&self) -> i64 {
        self.bounds().1
    }

    /// True when every value in `lo..=hi` is storable without touching the
    /// NA sentinel.
    pub fn fits(&self, lo: i64, hi: i64) -> bool {
        let (na, max) = self.bounds();
        lo > na && hi <= max
    }

    /// Narrowest width holding `lo..=hi` as-is.
    pub fn select_unbiased(lo: i64, hi: i64) -> Option<WordTy> {
        Self::ALL.into_iter().find(|ty| ty.fits(lo, hi))
    }

    /// Picks a bias and width for storing `lo..=hi` as `raw - bias`. The
    /// bias is either zero or the minimum (frame-of-reference, so stored
    /// values land in `0..=hi-lo`); zero wins when both are equally narrow.
    pub fn select_bias_and_ty(lo: i64, hi: i64) -> Option<(i64, WordTy)> {
        let unbiased = Self::select_unbiased(lo, hi).map(|ty| (0, ty));
        let span = hi as i128 - lo as i128;
        let biased = Self::ALL
            .into_iter()
            .find(|ty| span <= ty.max() as i128)
            .map(|ty| (lo, ty));
        match (unbiased, biased) {
            (Some(u), Some(b)) if b.1 < u.1 => Some(b),
            (Some(u), _) => Some(u),
            (None, b) => b,
        }
    }
}

// Floating point widths. NA is a signalling NaN with a fixed payload, which
// ordinary arithmetic never produces.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FloTy {
    Flo4,
    Flo8,
}

pub const NA_F64_BITS: u64 = 0x7FF0_0000_0000_07A1;
pub const NA_F32_BITS: u32 = 0x7F80_07A1;

impl FloTy {
    pub fn len(&self) -> usize {
        match self {
            FloTy::Flo4 => 4,
            FloTy::Flo8 => 8,
        }
    }

    /// True when `v` survives a trip through f32 bit-for-bit and does not
    /// land on the f32 NA pattern.
    pub(crate) fn fits_f32(v: f64) -> bool {
        let narrow = v as f32;
        (narrow as f64).to_bits() == v.to_bits() && narrow.to_bits() != NA_F32_BITS
    }
}
