// src/internal/rng.rs

use std::sync::atomic::{AtomicU64, Ordering};

const WEYL_CONSTANT: u64 = 0x9E3779B97F4A7C15;

/// A fast, `async`-safe, and non-cryptographically secure pseudo-random number
/// generator using a Weyl sequence on an atomic integer.
///
/// `Select` uses it to pick the clause it scans first, so simultaneously
/// ready channels are not served in declaration order.
#[derive(Debug)]
pub(crate) struct FastRng {
  state: AtomicU64,
}

impl FastRng {
  /// Creates a new RNG with a given seed.
  pub(crate) const fn new(seed: u64) -> Self {
    Self {
      state: AtomicU64::new(if seed == 0 { 1 } else { seed }),
    }
  }

  #[inline(always)]
  fn next_weyl(&self) -> u64 {
    self.state.fetch_add(WEYL_CONSTANT, Ordering::Relaxed)
  }

  /// Returns a value in `0..bound`. `bound` must be non-zero.
  #[inline]
  pub(crate) fn below(&self, bound: usize) -> usize {
    // Mix the raw Weyl step so consecutive draws do not stride evenly.
    let mut x = self.next_weyl();
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    (x % bound as u64) as usize
  }
}

pub(crate) static SELECT_RNG: FastRng = FastRng::new(0x2545F4914F6CDD1D);
