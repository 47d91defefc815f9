//! Simulated stress level.
//!
//! There is no stress sensor behind this: the level is a bounded random walk
//! in [0, 100], sampled on an interval by the caller.

use crate::catalog::STRESS_EPISODE_LEVEL;
use crate::config::StressConfig;
use crate::{StressLabel, StressReading};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

#[derive(Debug)]
pub struct StressMonitor {
    config: StressConfig,
    level: f64,
    rng: StdRng,
}

impl StressMonitor {
    pub fn new(config: StressConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: StressConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: StressConfig, rng: StdRng) -> Self {
        let level = config.initial_level.clamp(0.0, 100.0);
        Self { config, level, rng }
    }

    /// Advance the walk by one step and return the new level
    pub fn sample(&mut self) -> f64 {
        let step = self.config.max_step.abs();
        let change = if step > 0.0 && step.is_finite() {
            self.rng.gen_range(-step..step)
        } else {
            0.0
        };
        self.level = (self.level + change).clamp(0.0, 100.0);
        tracing::debug!("Stress level {:.1} ({:+.1})", self.level, change);
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn label(&self) -> StressLabel {
        StressLabel::from_level(self.level)
    }

    /// High enough to suggest a calming exercise
    pub fn needs_calming(&self) -> bool {
        self.level >= STRESS_EPISODE_LEVEL
    }

    pub fn reading(&self, heart_rate: Option<u32>) -> StressReading {
        StressReading {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            level: self.level,
            label: self.label(),
            heart_rate_at_reading: heart_rate,
            is_episode: self.needs_calming(),
        }
    }
}
