//! Guided exercise session engine.
//!
//! A session walks a definition's steps in order, repeating them for the
//! configured number of rounds, one `tick()` per elapsed second. Companion
//! narration follows progress: on a round rollover the message is picked by
//! round index, within a round by step index, both clamped to the last
//! authored message.
//!
//! States: Idle → Running ⇄ Paused, Running → Complete, any → Idle on reset.

use crate::{Error, ExerciseDefinition, ExerciseSummary, Mood, Result, Step};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Greeting shown before any exercise has been picked
pub const GREETING: &str =
    "Hi! I'm Hana. I'm here to guide you through wellness exercises. Pick one and let's start together! 🌸";

/// Message shown after a reset
pub const READY_AGAIN: &str = "Ready for another round? Pick an exercise! 🌸";

/// Coarse lifecycle state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Complete,
}

/// What a single tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do: no session, paused, or already complete
    Idle,
    /// Same step, one second less
    Counting { seconds_remaining: u32 },
    /// Moved to another step within the round
    StepAdvanced { step: usize },
    /// Wrapped around to the first step of the next round
    RoundAdvanced { round: u32 },
    /// Final step of the final round elapsed
    Completed,
}

/// Vitals captured around a session, for the summary record
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vitals {
    pub heart_rate: Option<u32>,
    pub stress: Option<f64>,
}

/// Single live guided exercise
#[derive(Clone, Debug)]
pub struct ExerciseSession {
    definition: Option<ExerciseDefinition>,
    current_step: usize,
    current_round: u32,
    seconds_remaining: u32,
    running: bool,
    complete: bool,
    message: String,
    mood: Mood,
    elapsed_seconds: u32,
    steps_completed: u32,
}

impl Default for ExerciseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseSession {
    pub fn new() -> Self {
        Self {
            definition: None,
            current_step: 0,
            current_round: 0,
            seconds_remaining: 0,
            running: false,
            complete: false,
            message: GREETING.into(),
            mood: Mood::Calm,
            elapsed_seconds: 0,
            steps_completed: 0,
        }
    }

    /// Start (or restart) a session for `definition`
    ///
    /// Rejects definitions with no steps, zero rounds, or only zero-duration
    /// steps. On error the current state is left untouched.
    pub fn start(&mut self, definition: ExerciseDefinition) -> Result<()> {
        let problems = definition.problems();
        if !problems.is_empty() {
            tracing::warn!("Refusing to start '{}': {:?}", definition.id, problems);
            return Err(Error::InvalidDefinition(problems.join("; ")));
        }

        tracing::info!(
            "Starting exercise '{}' ({} steps x {} rounds, {}s)",
            definition.id,
            definition.steps.len(),
            definition.rounds,
            definition.total_seconds()
        );

        self.current_step = 0;
        self.current_round = 0;
        self.seconds_remaining = definition.steps[0].duration_seconds;
        self.running = true;
        self.complete = false;
        self.message = definition.message_at(0).to_string();
        self.mood = Mood::Encouraging;
        self.elapsed_seconds = 0;
        self.steps_completed = 0;
        self.definition = Some(definition);

        // Leading zero-length steps take no time
        if self.seconds_remaining == 0 {
            self.advance();
        }
        Ok(())
    }

    /// Account for one elapsed second
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.definition.is_none() {
            return TickOutcome::Idle;
        }

        self.elapsed_seconds += 1;

        if self.seconds_remaining > 1 {
            self.seconds_remaining -= 1;
            return TickOutcome::Counting {
                seconds_remaining: self.seconds_remaining,
            };
        }

        self.advance()
    }

    /// Move past the current step, skipping any zero-duration steps
    fn advance(&mut self) -> TickOutcome {
        let def = match &self.definition {
            Some(def) => def,
            None => return TickOutcome::Idle,
        };

        loop {
            self.steps_completed += 1;
            self.current_step += 1;

            let outcome = if self.current_step >= def.steps.len() {
                self.current_step = 0;
                self.current_round += 1;

                if self.current_round >= def.rounds {
                    // Hold the last valid position so observers stay in range
                    self.current_round = def.rounds - 1;
                    self.current_step = def.steps.len() - 1;
                    self.seconds_remaining = 0;
                    self.running = false;
                    self.complete = true;
                    self.mood = Mood::Celebrating;
                    self.message = def.message_at(usize::MAX).to_string();
                    tracing::info!(
                        "Exercise '{}' complete after {}s",
                        def.id,
                        self.elapsed_seconds
                    );
                    return TickOutcome::Completed;
                }

                self.message = def.message_at(self.current_round as usize).to_string();
                tracing::debug!("'{}': round {} begins", def.id, self.current_round + 1);
                TickOutcome::RoundAdvanced {
                    round: self.current_round,
                }
            } else {
                self.message = def.message_at(self.current_step).to_string();
                tracing::debug!("'{}': step {} begins", def.id, self.current_step + 1);
                TickOutcome::StepAdvanced {
                    step: self.current_step,
                }
            };

            self.seconds_remaining = def.steps[self.current_step].duration_seconds;
            if self.seconds_remaining > 0 {
                return outcome;
            }
        }
    }

    /// Stop counting without losing progress
    pub fn pause(&mut self) {
        if self.status() == SessionStatus::Running {
            self.running = false;
            tracing::debug!("Session paused with {}s remaining", self.seconds_remaining);
        }
    }

    /// Continue a paused session
    pub fn resume(&mut self) {
        if self.status() == SessionStatus::Paused {
            self.running = true;
            tracing::debug!("Session resumed");
        }
    }

    /// Drop the current session and return to Idle
    pub fn reset(&mut self) {
        if let Some(def) = &self.definition {
            tracing::info!("Resetting exercise '{}'", def.id);
        }
        *self = Self::new();
        self.message = READY_AGAIN.into();
    }

    /// Switch the companion to a worried expression, e.g. on abnormal vitals
    pub fn set_concerned(&mut self) {
        if !self.complete {
            self.mood = Mood::Concerned;
        }
    }

    pub fn status(&self) -> SessionStatus {
        match (&self.definition, self.running, self.complete) {
            (None, _, _) => SessionStatus::Idle,
            (Some(_), _, true) => SessionStatus::Complete,
            (Some(_), true, false) => SessionStatus::Running,
            (Some(_), false, false) => SessionStatus::Paused,
        }
    }

    pub fn definition(&self) -> Option<&ExerciseDefinition> {
        self.definition.as_ref()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.definition
            .as_ref()
            .and_then(|def| def.steps.get(self.current_step))
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn steps_completed(&self) -> u32 {
        self.steps_completed
    }

    /// Fraction of the whole exercise already elapsed, in [0, 1]
    pub fn progress(&self) -> f64 {
        match &self.definition {
            Some(def) if def.total_seconds() > 0 => {
                (self.elapsed_seconds as f64 / def.total_seconds() as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Build the record handed to the data store for this session
    ///
    /// Returns `None` when no exercise was started.
    pub fn summarize(
        &self,
        started_at: DateTime<Utc>,
        before: Vitals,
        after: Vitals,
    ) -> Option<ExerciseSummary> {
        let def = self.definition.as_ref()?;
        Some(ExerciseSummary {
            id: Uuid::new_v4(),
            exercise_id: def.id.clone(),
            trigger: def.trigger,
            started_at,
            finished_at: Utc::now(),
            duration_seconds: self.elapsed_seconds,
            completed_steps: self.steps_completed,
            total_steps: def.total_steps(),
            completed: self.complete,
            heart_rate_before: before.heart_rate,
            heart_rate_after: after.heart_rate,
            stress_before: before.stress,
            stress_after: after.stress,
        })
    }
}
