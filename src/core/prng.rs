// Small deterministic PRNG (no external crates).
//
// Not cryptographically secure. Used for wiring, initial weights and
// prediction noise so a seeded network is fully reproducible.

const ZERO_STATE_REPLACEMENT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        Self::from_state(seed)
    }

    /// Restore a generator from a persisted state word.
    pub(crate) fn from_state(state: u64) -> Self {
        // xorshift never leaves zero.
        let state = if state == 0 {
            ZERO_STATE_REPLACEMENT
        } else {
            state
        };
        Self { state }
    }

    pub(crate) fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        let x = self.next_u32();
        (x as f32) / (u32::MAX as f32 + 1.0)
    }

    #[inline]
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32_01()
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u32;
        let v = self.next_u32() % span;
        low + v as usize
    }

    /// Bernoulli draw. `p <= 0` never fires, `p >= 1` always fires.
    #[inline]
    pub fn gen_bool(&mut self, p: f32) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_f32_01() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut p = Prng::new(0);
        assert_ne!(p.state(), 0);
        let x = p.next_f32_01();
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn ranges_are_respected() {
        let mut p = Prng::new(99);
        for _ in 0..500 {
            let f = p.gen_range_f32(-0.5, 0.25);
            assert!((-0.5..0.25).contains(&f));
            let u = p.gen_range_usize(3, 9);
            assert!((3..9).contains(&u));
        }
        assert_eq!(p.gen_range_usize(4, 4), 4);
        assert!(!p.gen_bool(0.0));
        assert!(p.gen_bool(1.0));
    }

    #[test]
    fn state_roundtrip_continues_stream() {
        let mut a = Prng::new(1234);
        a.next_u32();
        let mut b = Prng::from_state(a.state());
        assert_eq!(a.next_u32(), b.next_u32());
    }
}
