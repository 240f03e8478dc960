/// Deterministic per-match random source (Mulberry32).
///
/// Every participant seeds it with the value the host sent in the starting
/// conditions, so draws line up across peers. Never seed from the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Randoms {
    state: u32,
}

impl Randoms {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next 32-bit draw.
    pub fn urand(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform draw in `[0, bound)`; zero when `bound` is zero.
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.urand() % bound
    }
}
