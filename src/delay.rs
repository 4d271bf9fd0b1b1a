//! Sources of the simulated arrival offset.
//!
//! The static schedule carries no observed arrivals, so the pipeline asks a
//! [`DelaySource`] for one whole-second offset per joined stop visit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DelayRange;

/// Produces one offset, in whole seconds, per call.
pub trait DelaySource {
    fn next_offset(&mut self) -> i64;
}

impl<D: DelaySource + ?Sized> DelaySource for &mut D {
    fn next_offset(&mut self) -> i64 {
        (**self).next_offset()
    }
}

/// Uniform draw over `[min_seconds, max_seconds)`.
pub struct UniformDelay {
    rng: StdRng,
    range: DelayRange,
}

impl UniformDelay {
    /// Seeds from OS entropy; results differ on every run.
    pub fn from_entropy(range: DelayRange) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            range,
        }
    }

    pub fn seeded(range: DelayRange, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            range,
        }
    }
}

impl DelaySource for UniformDelay {
    fn next_offset(&mut self) -> i64 {
        self.rng
            .gen_range(self.range.min_seconds..self.range.max_seconds)
    }
}

/// Always returns the same offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub i64);

impl DelaySource for FixedDelay {
    fn next_offset(&mut self) -> i64 {
        self.0
    }
}

/// Replays a list of offsets in order, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct ScriptedDelay {
    offsets: Vec<i64>,
    next: usize,
}

impl ScriptedDelay {
    pub fn new(offsets: Vec<i64>) -> Self {
        Self { offsets, next: 0 }
    }
}

impl DelaySource for ScriptedDelay {
    fn next_offset(&mut self) -> i64 {
        if self.offsets.is_empty() {
            return 0;
        }
        let offset = self.offsets[self.next % self.offsets.len()];
        self.next += 1;
        offset
    }
}
