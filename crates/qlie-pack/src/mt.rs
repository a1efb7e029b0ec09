//! Mersenne Twister used by the keyed payload cipher.
//!
//! This is the classic MT19937 generator plus the PACK-specific state
//! perturbation step that folds caller-supplied key bytes into the state
//! array before any output is drawn. It is part of the wire format and must
//! match bit-for-bit; it is not a general-purpose RNG.

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_B0DF;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7FFF_FFFF;

pub struct Mt19937 {
    state: [u32; N],
    index: usize,
}

impl Mt19937 {
    /// Seed the generator (`init_genrand` semantics).
    pub fn new(seed: u32) -> Self {
        let mut state = [0u32; N];
        state[0] = seed;
        for i in 1..N {
            state[i] = 1_812_433_253u32
                .wrapping_mul(state[i - 1] ^ (state[i - 1] >> 30))
                .wrapping_add(i as u32);
        }
        Self { state, index: N }
    }

    /// XOR key bytes into the state as little-endian u32 words.
    ///
    /// Only whole words are consumed; at most `N` words are applied. Must be
    /// called before the first draw to match the reference key schedule.
    pub fn xor_state(&mut self, key: &[u8]) {
        let words = (key.len() / 4).min(N);
        for (i, chunk) in key.chunks_exact(4).take(words).enumerate() {
            self.state[i] ^= u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }

    /// Draw the next 32-bit value (`genrand_int32` semantics).
    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.generate();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^= y >> 18;
        y
    }

    /// Draw a 64-bit value from two consecutive 32-bit draws (low first).
    pub fn next_u64(&mut self) -> u64 {
        let low = self.next_u32() as u64;
        let high = self.next_u32() as u64;
        low | (high << 32)
    }

    fn generate(&mut self) {
        for i in 0..N {
            let y = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % N] & LOWER_MASK);
            let mut next = y >> 1;
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.state[i] = self.state[(i + M) % N] ^ next;
        }
        self.index = 0;
    }
}
