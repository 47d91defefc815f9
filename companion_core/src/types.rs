//! Core domain types for the companion.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise definitions (steps, phases, triggers)
//! - Companion mood and vitals classifications
//! - Records handed to the backend data store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Exercise Types
// ============================================================================

/// Display phase of a single exercise step
///
/// Only used for styling the instruction; the engine never branches on it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Inhale,
    Hold,
    Exhale,
    Tense,
    Relax,
    Observe,
}

/// Situation an exercise is authored for
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    StressRelief,
    Arrhythmia,
    StressEpisode,
}

/// One timed instruction within an exercise
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub instruction: String,
    pub duration_seconds: u32,
    pub phase: Phase,
}

impl Step {
    pub fn new(instruction: &str, duration_seconds: u32, phase: Phase) -> Self {
        Self {
            instruction: instruction.into(),
            duration_seconds,
            phase,
        }
    }
}

/// A complete guided exercise definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger: Trigger,
    pub steps: Vec<Step>,
    pub rounds: u32,
    pub companion_messages: Vec<String>,
}

impl ExerciseDefinition {
    /// Seconds in one pass over all steps
    pub fn round_seconds(&self) -> u32 {
        self.steps.iter().map(|s| s.duration_seconds).sum()
    }

    /// Total seconds for the whole exercise (all rounds)
    pub fn total_seconds(&self) -> u32 {
        self.round_seconds() * self.rounds
    }

    /// Number of steps performed across all rounds
    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32 * self.rounds
    }

    /// Companion message at `index`, clamped to the last one
    ///
    /// Returns an empty string when the definition carries no messages.
    pub fn message_at(&self, index: usize) -> &str {
        match self.companion_messages.len() {
            0 => "",
            len => &self.companion_messages[index.min(len - 1)],
        }
    }

    /// Structural problems that make this definition unusable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.steps.is_empty() {
            problems.push(format!("Exercise '{}' has no steps", self.id));
        }
        if self.rounds == 0 {
            problems.push(format!("Exercise '{}' has zero rounds", self.id));
        }
        if !self.steps.is_empty() && self.round_seconds() == 0 {
            problems.push(format!(
                "Exercise '{}' has only zero-duration steps",
                self.id
            ));
        }
        problems
    }
}

// ============================================================================
// Companion and Vitals Types
// ============================================================================

/// Expression the companion shows alongside its narration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    #[default]
    Calm,
    Encouraging,
    Celebrating,
    Concerned,
}

/// Coarse heart rhythm bucket derived from an estimated BPM
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rhythm {
    #[default]
    Ready,
    Measuring,
    Normal,
    Bradycardia,
    Tachycardia,
    ArrhythmiaDetected,
}

impl Rhythm {
    /// Classify a BPM value (below 60 slow, above 100 fast)
    pub fn classify(bpm: u32) -> Self {
        if bpm < 60 {
            Rhythm::Bradycardia
        } else if bpm > 100 {
            Rhythm::Tachycardia
        } else {
            Rhythm::Normal
        }
    }

    /// Whether this rhythm should prompt a calming exercise
    pub fn is_elevated(&self) -> bool {
        matches!(self, Rhythm::Tachycardia | Rhythm::ArrhythmiaDetected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rhythm::Ready => "Ready to measure",
            Rhythm::Measuring => "Measuring...",
            Rhythm::Normal => "Normal sinus rhythm",
            Rhythm::Bradycardia => "Bradycardia detected (low heart rate)",
            Rhythm::Tachycardia => "Tachycardia detected (elevated heart rate)",
            Rhythm::ArrhythmiaDetected => "Irregular rhythm detected",
        }
    }
}

impl fmt::Display for Rhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stress level bucket
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StressLabel {
    Low,
    Moderate,
    High,
    Critical,
}

impl StressLabel {
    pub fn from_level(level: f64) -> Self {
        if level < 30.0 {
            StressLabel::Low
        } else if level < 60.0 {
            StressLabel::Moderate
        } else if level < 80.0 {
            StressLabel::High
        } else {
            StressLabel::Critical
        }
    }
}

/// Which side of the magnitude rule flagged a possible fall
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallSignal {
    /// Sudden high acceleration
    Impact,
    /// Near-zero acceleration
    FreeFall,
}

// ============================================================================
// Records
// ============================================================================

/// Summary of a finished (or abandoned) exercise session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub id: Uuid,
    pub exercise_id: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub completed: bool,
    pub heart_rate_before: Option<u32>,
    pub heart_rate_after: Option<u32>,
    pub stress_before: Option<f64>,
    pub stress_after: Option<f64>,
}

/// A single heart rate estimate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartReading {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub bpm: u32,
    pub confidence: f64,
    pub rhythm: Rhythm,
    pub duration_seconds: Option<u32>,
}

/// A single stress level sample
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StressReading {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub level: f64,
    pub label: StressLabel,
    pub heart_rate_at_reading: Option<u32>,
    pub is_episode: bool,
}

/// A possible fall flagged by the motion detector
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FallEvent {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub magnitude: f64,
    pub signal: FallSignal,
}

/// Anything the companion hands to the backend data store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    ExerciseSummary(ExerciseSummary),
    HeartReading(HeartReading),
    StressReading(StressReading),
    FallEvent(FallEvent),
}

impl Record {
    pub fn id(&self) -> Uuid {
        match self {
            Record::ExerciseSummary(r) => r.id,
            Record::HeartReading(r) => r.id,
            Record::StressReading(r) => r.id,
            Record::FallEvent(r) => r.id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Record::ExerciseSummary(r) => r.finished_at,
            Record::HeartReading(r) => r.recorded_at,
            Record::StressReading(r) => r.recorded_at,
            Record::FallEvent(r) => r.detected_at,
        }
    }
}

// ============================================================================
// Catalog Type
// ============================================================================

/// The complete catalog of guided exercises
#[derive(Clone, Debug)]
pub struct Catalog {
    pub exercises: HashMap<String, ExerciseDefinition>,
}
