// SPDX-License-Identifier: MIT OR Apache-2.0
//! Store identifier generation and validation.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a store id in hex characters.
pub const STORE_ID_LEN: usize = 20;

/// `true` iff `id` is exactly twenty lowercase hex digits.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == STORE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Seeded generator of store ids.
///
/// The ids name directories and files, so seeding from the clock and pid
/// is sufficient; collisions are handled by the exclusive-create retry
/// loop in the store.
#[derive(Debug)]
pub struct IdGen {
    rng: SmallRng,
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen {
    /// Generator seeded from the current time and process id.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::with_seed(now ^ u64::from(std::process::id()))
    }

    /// Generator with an explicit seed, for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Produce a fresh 20-character lowercase hex id.
    pub fn generate(&mut self) -> String {
        let bytes: [u8; STORE_ID_LEN / 2] = self.rng.gen();
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_id, IdGen, STORE_ID_LEN};

    #[test]
    fn generated_ids_are_valid() {
        let mut gen = IdGen::with_seed(1);
        for _ in 0..100 {
            let id = gen.generate();
            assert_eq!(id.len(), STORE_ID_LEN);
            assert!(is_valid_id(&id), "{id}");
        }
    }

    #[test]
    fn validation_rejects_near_misses() {
        assert!(is_valid_id("0123456789abcdef0123"));
        assert!(!is_valid_id("0123456789abcdef012")); // short
        assert!(!is_valid_id("0123456789abcdef01234")); // long
        assert!(!is_valid_id("0123456789ABCDEF0123")); // uppercase
        assert!(!is_valid_id("0123456789abcdefg123")); // non-hex
        assert!(!is_valid_id(""));
    }

    #[test]
    fn seeds_produce_distinct_streams() {
        let a = IdGen::with_seed(1).generate();
        let b = IdGen::with_seed(2).generate();
        assert_ne!(a, b);
    }
}
