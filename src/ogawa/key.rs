//! Sample content keys (MurmurHash3 x64_128, seed 0).
//!
//! Every stored sample is prefixed by the key of its payload. The writer
//! uses the key to store identical payloads once.

use byteorder::{ByteOrder, LittleEndian};

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// 16-byte content digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct SampleKey(pub [u8; 16]);

impl SampleKey {
    /// Key of `data`.
    pub fn of(data: &[u8]) -> Self {
        let (h1, h2) = hash128(data);
        let mut out = [0u8; 16];
        LittleEndian::write_u64(&mut out[..8], h1);
        LittleEndian::write_u64(&mut out[8..], h2);
        Self(out)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

#[inline]
fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

/// MurmurHash3 x64_128 of `data` with seed 0, as `(h1, h2)`.
pub fn hash128(data: &[u8]) -> (u64, u64) {
    let mut h1: u64 = 0;
    let mut h2: u64 = 0;

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        h1 ^= mix_k1(LittleEndian::read_u64(&block[..8]));
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        h2 ^= mix_k2(LittleEndian::read_u64(&block[8..]));
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    // Tail bytes assemble little-endian into k1 (0..8) and k2 (8..16).
    let tail = blocks.remainder();
    let mut k1: u64 = 0;
    let mut k2: u64 = 0;
    for (i, &b) in tail.iter().enumerate() {
        if i < 8 {
            k1 |= (b as u64) << (8 * i);
        } else {
            k2 |= (b as u64) << (8 * (i - 8));
        }
    }
    if tail.len() > 8 {
        h2 ^= mix_k2(k2);
    }
    if !tail.is_empty() {
        h1 ^= mix_k1(k1);
    }

    let len = data.len() as u64;
    h1 ^= len;
    h2 ^= len;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    (h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(hash128(&[]), (0, 0));
    }

    #[test]
    fn test_tail_lengths_differ() {
        let data: Vec<u8> = (0..40).collect();
        let keys: Vec<SampleKey> = (0..data.len()).map(|n| SampleKey::of(&data[..n])).collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_key_is_stable() {
        assert_eq!(SampleKey::of(b"hello"), SampleKey::of(b"hello"));
        assert_ne!(SampleKey::of(b"hello"), SampleKey::of(b"hellp"));
    }
}
