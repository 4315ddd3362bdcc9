//! Random image tags.
//!
//! Each session owns its own generator, seeded once when the session is
//! opened, so concurrent sessions sharing one container runtime do not
//! collide on tag names.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Produces lowercase alphabetic tags of a fixed length.
#[derive(Debug)]
pub struct TagGenerator {
    rng: StdRng,
    length: usize,
}

impl TagGenerator {
    /// Creates a generator seeded from operating-system entropy.
    #[must_use]
    pub fn from_entropy(length: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            length,
        }
    }

    /// Creates a deterministic generator.
    #[must_use]
    pub fn with_seed(seed: u64, length: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            length,
        }
    }

    /// Returns the next tag.
    pub fn next_tag(&mut self) -> String {
        (0..self.length)
            .map(|_| char::from(ALPHABET[self.rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}
