/// A simple 32-byte / 256-bit bitmap that counts bits in order from
/// least-to-most significant bits and ascending words.
#[derive(Clone, Default, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Bitmap256 {
    pub bits: [u64; 4],
}
impl Bitmap256 {
    pub fn new() -> Self {
        Bitmap256 { bits: [0; 4] }
    }
    pub fn set(&mut self, i: usize, val: bool) {
        if val {
            self.bits[i / 64] |= 1 << (i % 64);
        } else {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }
    pub fn get(&self, i: usize) -> bool {
        (self.bits[i / 64] & (1 << (i % 64))) != 0
    }
    pub fn count(&self) -> u32 {
        self.bits.iter().map(|x| x.count_ones()).sum()
    }
    /// Number of set bits at positions `0..=i`.
    pub fn rank(&self, i: usize) -> usize {
        let word = i / 64;
        let below: u32 = self.bits[..word].iter().map(|x| x.count_ones()).sum();
        let bit = i % 64;
        let mask = if bit == 63 {
            u64::MAX
        } else {
            (1_u64 << (bit + 1)) - 1
        };
        (below + (self.bits[word] & mask).count_ones()) as usize
    }
}
