//! Device-motion fall screening.
//!
//! A deliberately simple rule on the magnitude of the latest accelerometer
//! sample (gravity included): a spike above the impact threshold or a drop
//! below the free-fall threshold flags a possible fall.

use crate::config::MotionConfig;
use crate::{FallEvent, FallSignal};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One 3-axis accelerometer sample in m/s²
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Stateless apart from the latest sample
#[derive(Debug)]
pub struct FallDetector {
    config: MotionConfig,
    active: bool,
    latest: Option<Acceleration>,
}

impl FallDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            active: false,
            latest: None,
        }
    }

    pub fn start(&mut self) {
        self.active = true;
        self.latest = None;
        tracing::info!("Fall detection enabled");
    }

    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            tracing::info!("Fall detection disabled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn latest(&self) -> Option<Acceleration> {
        self.latest
    }

    /// Which rule, if any, this sample trips
    pub fn classify(&self, sample: &Acceleration) -> Option<FallSignal> {
        let magnitude = sample.magnitude();
        if magnitude > self.config.impact_threshold {
            Some(FallSignal::Impact)
        } else if magnitude < self.config.free_fall_threshold {
            Some(FallSignal::FreeFall)
        } else {
            None
        }
    }

    /// Process one sample; samples while inactive are ignored
    pub fn on_sample(&mut self, sample: Acceleration) -> Option<FallEvent> {
        if !self.active {
            return None;
        }
        self.latest = Some(sample);

        let signal = self.classify(&sample)?;
        let magnitude = sample.magnitude();
        tracing::warn!(
            "Possible fall detected ({:?}, magnitude {:.1})",
            signal,
            magnitude
        );
        Some(FallEvent {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            magnitude,
            signal,
        })
    }
}
