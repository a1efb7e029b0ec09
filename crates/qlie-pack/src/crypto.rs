//! PACK payload and name ciphers.
//!
//! The format uses two symmetric stream ciphers over 8-byte words:
//!
//! - **Basic**: a self-feeding XOR cipher whose keystream folds in the
//!   previous *decrypted* word (output feedback), parameterized only by the
//!   entry seed and payload length.
//! - **Keyed**: a 16-entry rotating substitution table filled from a
//!   Mersenne Twister whose seed mixes the entry name, seed and length, and
//!   whose state is perturbed by external key material.
//!
//! Both are strictly sequential per word. All arithmetic uses lane-confined
//! adds where no carry may cross an 8/16/32-bit lane boundary.

use crate::mt::Mt19937;

/// Which decryption strategy an archive uses, and which key buffers it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Seed-only cipher, no external key material.
    #[default]
    Basic,
    /// Keyed cipher using a key file (`key1`).
    WithFileKey,
    /// Keyed cipher using a key file plus an executable-embedded key (`key2`).
    WithExecutableKey,
}

/// Add as eight independent 8-bit lanes; carries never cross a lane.
#[inline]
pub(crate) fn lane_add8(a: u64, b: u64) -> u64 {
    ((a & 0x7F7F_7F7F_7F7F_7F7F) + (b & 0x7F7F_7F7F_7F7F_7F7F))
        ^ ((a ^ b) & 0x8080_8080_8080_8080)
}

/// Add as four independent 16-bit lanes; carries never cross a lane.
#[inline]
pub(crate) fn lane_add16(a: u64, b: u64) -> u64 {
    ((a & 0x7FFF_7FFF_7FFF_7FFF) + (b & 0x7FFF_7FFF_7FFF_7FFF))
        ^ ((a ^ b) & 0x8000_8000_8000_8000)
}

/// Add as two independent 32-bit lanes; carries never cross a lane.
#[inline]
pub(crate) fn lane_add32(a: u64, b: u64) -> u64 {
    ((a & 0x7FFF_FFFF_7FFF_FFFF) + (b & 0x7FFF_FFFF_7FFF_FFFF))
        ^ ((a ^ b) & 0x8000_0000_8000_0000)
}

/// Derive the shared table seed from a 256-byte window of the raw table.
///
/// The window is consumed as 32 little-endian u64 words; only whole words
/// are used. The caller masks the result to 28 bits.
pub fn derive_table_seed(window: &[u8]) -> u32 {
    let mut key: u64 = 0;
    let mut result: u64 = 0;
    for chunk in window.chunks_exact(8) {
        let word = u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        key = lane_add16(key, 0x0307_0307_0307_0307);
        result = lane_add16(result, word ^ key);
    }
    result ^= result >> 32;
    result as u32
}

/// Apply the entry-name cipher in place.
///
/// The keystream depends only on the seed, the name length and the byte
/// position, so the same call encrypts and decrypts.
pub fn crypt_name(name: &mut [u8], seed: u32) {
    let len = name.len();
    let mask = ((seed ^ 0x3E) as usize + len) & 0xFF;
    for i in 1..=len {
        name[i - 1] ^= ((((i ^ mask) & 0xFF) + i) & 0xFF) as u8;
    }
}

const BASIC_KEY_INIT: u64 = 0xA73C_5F9D_A73C_5F9D;
const BASIC_KEY_STEP: u64 = 0xCE24_F523_CE24_F523;

/// Decrypt a payload in place with the basic cipher.
///
/// Only whole 8-byte words are processed; a trailing partial word is left
/// untouched, matching the on-disk format.
pub fn decrypt_basic(data: &mut [u8], seed: u32) {
    let half = seed.wrapping_add(data.len() as u32) ^ 0xFEC9_753E;
    let mut mutator = ((half as u64) << 32) | half as u64;
    let mut key = BASIC_KEY_INIT;

    for chunk in data.chunks_exact_mut(8) {
        key = lane_add32(key, BASIC_KEY_STEP);
        key ^= mutator;

        let word = u64::from_le_bytes(chunk.try_into().unwrap()) ^ key;
        chunk.copy_from_slice(&word.to_le_bytes());
        mutator = word;
    }
}

/// Build the keyed cipher's PRNG seed from the entry's raw name, seed and
/// payload length.
fn keyed_prng_seed(raw_name: &[u8], seed: u32, len: u64, mode: EncryptionMode) -> u32 {
    let mut mutator: u64 = 0x85F532;
    let mut acc: u64 = 0x33F641;
    for (i, &b) in raw_name.iter().enumerate() {
        mutator = mutator.wrapping_add(b as u64 * (i as u8) as u64);
        acc ^= mutator;
    }

    acc = acc.wrapping_add(
        seed as u64
            ^ (7u64
                .wrapping_mul(len & 0xFF_FFFF)
                .wrapping_add(len)
                .wrapping_add(mutator)
                .wrapping_add(mutator ^ len ^ 0x8F32DC)),
    );
    let mut prng_seed = (9 * (acc & 0xFF_FFFF)) as u32;

    if mode == EncryptionMode::WithExecutableKey {
        prng_seed ^= 0x453A;
    }
    prng_seed
}

/// Set up the keyed cipher state: the 16-entry substitution table, the
/// initial mutator and the initial table index.
fn keyed_cipher_state(
    raw_name: &[u8],
    seed: u32,
    len: u64,
    mode: EncryptionMode,
    key1: &[u8],
    key2: &[u8],
) -> ([u64; 16], u64, usize) {
    let mut mt = Mt19937::new(keyed_prng_seed(raw_name, seed, len, mode));
    mt.xor_state(key1);
    mt.xor_state(key2);
    let _ = mt.next_u32();

    let mut table = [0u64; 16];
    for slot in &mut table {
        *slot = mt.next_u64();
    }
    for _ in 0..9 {
        let _ = mt.next_u32();
    }

    let mutator = mt.next_u64();
    let index = (mt.next_u32() & 0xF) as usize;
    (table, mutator, index)
}

/// Decrypt a payload in place with the keyed cipher.
///
/// `raw_name` is the entry's name *before* codepage conversion. The caller
/// is responsible for validating that the required key buffers are present;
/// empty slices are accepted here because the state perturbation is a no-op
/// for them.
pub fn decrypt_keyed(
    data: &mut [u8],
    seed: u32,
    mode: EncryptionMode,
    raw_name: &[u8],
    key1: &[u8],
    key2: &[u8],
) {
    let (table, mut mutator, mut index) =
        keyed_cipher_state(raw_name, seed, data.len() as u64, mode, key1, key2);

    for chunk in data.chunks_exact_mut(8) {
        mutator ^= table[index];
        mutator = lane_add32(mutator, table[index]);

        let word = u64::from_le_bytes(chunk.try_into().unwrap()) ^ mutator;
        chunk.copy_from_slice(&word.to_le_bytes());

        mutator = lane_add8(mutator, word);
        mutator ^= word;
        mutator = (mutator << 1) & 0xFFFF_FFFE_FFFF_FFFE;
        mutator = lane_add16(mutator, word);

        index = (index + 1) & 0xF;
    }
}

/// Inverse of [`decrypt_basic`]; the feedback word is the plaintext.
///
/// Only used to build fixtures for round-trip tests.
#[cfg(test)]
pub(crate) fn encrypt_basic(data: &mut [u8], seed: u32) {
    let half = seed.wrapping_add(data.len() as u32) ^ 0xFEC9_753E;
    let mut mutator = ((half as u64) << 32) | half as u64;
    let mut key = BASIC_KEY_INIT;

    for chunk in data.chunks_exact_mut(8) {
        key = lane_add32(key, BASIC_KEY_STEP);
        key ^= mutator;

        let plain = u64::from_le_bytes(chunk.try_into().unwrap());
        chunk.copy_from_slice(&(plain ^ key).to_le_bytes());
        mutator = plain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of [`decrypt_keyed`]: feedback uses the plaintext word.
    fn encrypt_keyed(
        data: &mut [u8],
        seed: u32,
        mode: EncryptionMode,
        raw_name: &[u8],
        key1: &[u8],
        key2: &[u8],
    ) {
        let (table, mut mutator, mut index) =
            keyed_cipher_state(raw_name, seed, data.len() as u64, mode, key1, key2);

        for chunk in data.chunks_exact_mut(8) {
            mutator ^= table[index];
            mutator = lane_add32(mutator, table[index]);

            let plain = u64::from_le_bytes(chunk.try_into().unwrap());
            chunk.copy_from_slice(&(plain ^ mutator).to_le_bytes());

            mutator = lane_add8(mutator, plain);
            mutator ^= plain;
            mutator = (mutator << 1) & 0xFFFF_FFFE_FFFF_FFFE;
            mutator = lane_add16(mutator, plain);

            index = (index + 1) & 0xF;
        }
    }

    fn pseudo_random_buffer(len: usize, mut state: u32) -> Vec<u8> {
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn test_lane_add_carries_stay_in_lane() {
        // Every lane at its positive maximum, plus one in every lane: each
        // lane must flip to 0x..80/0x..8000 without touching its neighbour.
        assert_eq!(
            lane_add8(0x7F7F_7F7F_7F7F_7F7F, 0x0101_0101_0101_0101),
            0x8080_8080_8080_8080
        );
        assert_eq!(
            lane_add16(0x7FFF_7FFF_7FFF_7FFF, 0x0001_0001_0001_0001),
            0x8000_8000_8000_8000
        );
        assert_eq!(
            lane_add32(0x7FFF_FFFF_7FFF_FFFF, 0x0000_0001_0000_0001),
            0x8000_0000_8000_0000
        );
        // Lane overflow wraps within the lane.
        assert_eq!(
            lane_add16(0xFFFF_FFFF_FFFF_FFFF, 0x0001_0001_0001_0001),
            0
        );
    }

    #[test]
    fn test_lane_add_matches_scalar_when_no_overflow() {
        assert_eq!(lane_add32(0x1111_2222, 0x3333_4444), 0x4444_6666);
        assert_eq!(lane_add16(0x0102_0304, 0x0506_0708), 0x0608_0A0C);
    }

    #[test]
    fn test_name_cipher_round_trip() {
        let original = b"event\\op_001.b".to_vec();
        let mut buf = original.clone();
        crypt_name(&mut buf, 0x0ABC_1234);
        assert_ne!(buf, original);
        crypt_name(&mut buf, 0x0ABC_1234);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_name_cipher_depends_on_seed() {
        let mut a = b"data.png".to_vec();
        let mut b = a.clone();
        crypt_name(&mut a, 1);
        crypt_name(&mut b, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_table_seed() {
        // 256 zero bytes: result depends only on the accumulated key lanes.
        let zeroes = [0u8; 256];
        let seed_a = derive_table_seed(&zeroes);

        let mut window = [0u8; 256];
        window[0] = 1;
        let seed_b = derive_table_seed(&window);
        assert_ne!(seed_a, seed_b);

        // Deterministic.
        assert_eq!(seed_a, derive_table_seed(&zeroes));
    }

    #[test]
    fn test_basic_round_trip_word_aligned() {
        let original = pseudo_random_buffer(64, 7);
        let mut buf = original.clone();
        encrypt_basic(&mut buf, 0x00C0FFEE);
        assert_ne!(buf, original);
        decrypt_basic(&mut buf, 0x00C0FFEE);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_basic_round_trip_with_tail() {
        // 61 bytes: the 5-byte tail must pass through untouched.
        let original = pseudo_random_buffer(61, 99);
        let mut buf = original.clone();
        encrypt_basic(&mut buf, 42);
        assert_eq!(&buf[56..], &original[56..]);
        decrypt_basic(&mut buf, 42);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_basic_wrong_seed_fails() {
        let original = pseudo_random_buffer(32, 3);
        let mut buf = original.clone();
        encrypt_basic(&mut buf, 1000);
        decrypt_basic(&mut buf, 1001);
        assert_ne!(buf, original);
    }

    #[test]
    fn test_keyed_round_trip() {
        let key1 = pseudo_random_buffer(128, 11);
        let key2 = pseudo_random_buffer(256, 13);
        let original = pseudo_random_buffer(80, 17);

        let mut buf = original.clone();
        encrypt_keyed(
            &mut buf,
            0x0012_3456,
            EncryptionMode::WithExecutableKey,
            b"voice\\a01.ogg",
            &key1,
            &key2,
        );
        assert_ne!(buf, original);
        decrypt_keyed(
            &mut buf,
            0x0012_3456,
            EncryptionMode::WithExecutableKey,
            b"voice\\a01.ogg",
            &key1,
            &key2,
        );
        assert_eq!(buf, original);
    }

    #[test]
    fn test_keyed_modes_differ() {
        let key1 = pseudo_random_buffer(64, 21);
        let original = pseudo_random_buffer(32, 23);

        let mut file_key = original.clone();
        let mut exe_key = original.clone();
        decrypt_keyed(
            &mut file_key,
            77,
            EncryptionMode::WithFileKey,
            b"x",
            &key1,
            &[],
        );
        decrypt_keyed(
            &mut exe_key,
            77,
            EncryptionMode::WithExecutableKey,
            b"x",
            &key1,
            &[],
        );
        assert_ne!(file_key, exe_key);
    }
}
