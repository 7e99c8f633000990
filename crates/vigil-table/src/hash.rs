// SPDX-License-Identifier: MIT OR Apache-2.0
//! 32-bit FNV-1a hashing with optional seed mixing.

use std::time::{SystemTime, UNIX_EPOCH};

const FNV1A_OFFSET: u32 = 0x811c_9dc5;
const FNV1A_PRIME: u32 = 0x0100_0193;

/// Incremental 32-bit FNV-1a hasher.
///
/// [`Fnv1a::with_seed`] mixes the four seed bytes into the state before any
/// data, so two registries seeded differently hash the same bytes to
/// different values.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u32,
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1a {
    /// Hasher with the standard offset basis.
    pub fn new() -> Self {
        Self {
            state: FNV1A_OFFSET,
        }
    }

    /// Hasher with `seed` folded into the initial state.
    pub fn with_seed(seed: u32) -> Self {
        let mut h = Self::new();
        let mut seed = seed;
        for _ in 0..4 {
            h.state = (h.state ^ (seed & 0xff)).wrapping_mul(FNV1A_PRIME);
            seed >>= 8;
        }
        h
    }

    /// Fold `data` into the state.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        for &b in data {
            self.state = (self.state ^ u32::from(b)).wrapping_mul(FNV1A_PRIME);
        }
        self
    }

    /// Current hash value.
    pub fn finish(&self) -> u32 {
        self.state
    }
}

/// Hash `data` with `seed` in one call.
pub fn fnv1a_seeded(seed: u32, data: &[u8]) -> u32 {
    let mut h = Fnv1a::with_seed(seed);
    h.update(data);
    h.finish()
}

/// Derive a per-process table seed from the clock and pid.
///
/// Good enough for hash-flood resistance between runs; within one run the
/// seed stays fixed so iteration order is stable until the destructive sort.
pub fn seed_from_time() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
        .unwrap_or(0);
    (nanos as u32) ^ (std::process::id().rotate_left(16))
}

#[cfg(test)]
mod tests {
    use super::{fnv1a_seeded, Fnv1a};

    #[test]
    fn known_vectors() {
        // Standard FNV-1a test values.
        assert_eq!(Fnv1a::new().update(b"").finish(), 0x811c_9dc5);
        assert_eq!(Fnv1a::new().update(b"a").finish(), 0xe40c_292c);
        assert_eq!(Fnv1a::new().update(b"foobar").finish(), 0xbf9c_f968);
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(fnv1a_seeded(1, b"data"), fnv1a_seeded(2, b"data"));
    }

    #[test]
    fn incremental_equals_oneshot() {
        let mut h = Fnv1a::with_seed(42);
        h.update(b"foo").update(b"bar");
        assert_eq!(h.finish(), fnv1a_seeded(42, b"foobar"));
    }
}
