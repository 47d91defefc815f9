//! Default catalog of guided exercises.
//!
//! This module provides the built-in breathing, grounding and relaxation
//! exercises the companion can lead.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Stress level at or above which a grounding exercise is recommended
pub const STRESS_EPISODE_LEVEL: f64 = 60.0;

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with the built-in exercises
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference. This function is retained for testing and custom catalog creation.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

fn messages(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

fn build_default_catalog_internal() -> Catalog {
    let mut exercises = HashMap::new();

    exercises.insert(
        "box-breathing".into(),
        ExerciseDefinition {
            id: "box-breathing".into(),
            name: "Box Breathing".into(),
            description: "A calming technique used by Navy SEALs. Breathe in a square pattern."
                .into(),
            trigger: Trigger::StressRelief,
            steps: vec![
                Step::new("Breathe in slowly", 4, Phase::Inhale),
                Step::new("Hold your breath", 4, Phase::Hold),
                Step::new("Breathe out slowly", 4, Phase::Exhale),
                Step::new("Hold empty", 4, Phase::Hold),
            ],
            rounds: 4,
            companion_messages: messages(&[
                "Let's breathe together. I'm right here with you. 🌸",
                "You're doing great. Feel the calm washing over you.",
                "Almost there. Your body is relaxing with each breath.",
                "Wonderful! You completed a full cycle. How do you feel?",
            ]),
        },
    );

    exercises.insert(
        "cardiac-recovery".into(),
        ExerciseDefinition {
            id: "cardiac-recovery".into(),
            name: "Cardiac Recovery".into(),
            description: "Gentle breathing to slow your heart rate when it's elevated.".into(),
            trigger: Trigger::Arrhythmia,
            steps: vec![
                Step::new("Breathe in through your nose", 6, Phase::Inhale),
                Step::new("Hold gently", 2, Phase::Hold),
                Step::new("Breathe out through your mouth", 8, Phase::Exhale),
                Step::new("Rest", 2, Phase::Hold),
            ],
            rounds: 6,
            companion_messages: messages(&[
                "I noticed your heart rate is elevated. Let's slow it down together. 💗",
                "Slow, deep breaths. I'm monitoring your heart rate.",
                "Good. Your heart is starting to calm down.",
                "Keep going. You're doing beautifully.",
                "Almost done. Your rhythm is improving.",
                "You did it! Your heart rate is stabilizing. I'm so proud of you! ✨",
            ]),
        },
    );

    exercises.insert(
        "grounding-54321".into(),
        ExerciseDefinition {
            id: "grounding-54321".into(),
            name: "5-4-3-2-1 Grounding".into(),
            description: "A sensory grounding technique to bring you back to the present moment."
                .into(),
            trigger: Trigger::StressEpisode,
            steps: vec![
                Step::new("Name 5 things you can SEE", 15, Phase::Observe),
                Step::new("Name 4 things you can TOUCH", 12, Phase::Observe),
                Step::new("Name 3 things you can HEAR", 10, Phase::Observe),
                Step::new("Name 2 things you can SMELL", 8, Phase::Observe),
                Step::new("Name 1 thing you can TASTE", 6, Phase::Observe),
            ],
            rounds: 1,
            companion_messages: messages(&[
                "Let's ground ourselves together. Focus on your senses. 🍃",
                "Good. You're connecting with the present moment.",
                "You're doing wonderfully. Keep focusing.",
                "Almost there. You're safe and present.",
                "Beautiful. You're grounded and centered now. 🌸",
            ]),
        },
    );

    exercises.insert(
        "progressive-relaxation".into(),
        ExerciseDefinition {
            id: "progressive-relaxation".into(),
            name: "Progressive Muscle Relaxation".into(),
            description: "Tense and release muscle groups to release physical tension.".into(),
            trigger: Trigger::StressRelief,
            steps: vec![
                Step::new("Tense your hands - make fists", 5, Phase::Tense),
                Step::new("Release and relax your hands", 5, Phase::Relax),
                Step::new("Tense your shoulders - lift them up", 5, Phase::Tense),
                Step::new("Release and drop your shoulders", 5, Phase::Relax),
                Step::new("Tense your face - scrunch it up", 5, Phase::Tense),
                Step::new("Release and relax your face", 5, Phase::Relax),
                Step::new("Tense your whole body", 5, Phase::Tense),
                Step::new("Release everything completely", 10, Phase::Relax),
            ],
            rounds: 1,
            companion_messages: messages(&[
                "Let's release all that tension. I'll guide you through each muscle group. 💪",
                "Tense... and release. Feel the difference.",
                "You're carrying less tension already.",
                "Keep going. Your body is thanking you.",
                "Almost done. One more area to release.",
                "Feel how light your body is now.",
                "Last one. Give it everything.",
                "You did it! Your whole body is relaxed. You're amazing! ✨",
            ]),
        },
    );

    Catalog { exercises }
}

impl Catalog {
    /// Look up an exercise by id
    pub fn get(&self, id: &str) -> Option<&ExerciseDefinition> {
        self.exercises.get(id)
    }

    /// All exercises, sorted by id for stable listing
    pub fn sorted(&self) -> Vec<&ExerciseDefinition> {
        let mut all: Vec<_> = self.exercises.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Pick an exercise suited to the latest vitals
    ///
    /// Elevated rhythm wins over stress; with neither, a general stress relief
    /// exercise is suggested.
    pub fn recommend(&self, rhythm: Rhythm, stress: Option<f64>) -> Option<&ExerciseDefinition> {
        let trigger = if rhythm.is_elevated() {
            Trigger::Arrhythmia
        } else if stress.is_some_and(|s| s >= STRESS_EPISODE_LEVEL) {
            Trigger::StressEpisode
        } else {
            Trigger::StressRelief
        };

        let chosen = self
            .sorted()
            .into_iter()
            .find(|ex| ex.trigger == trigger);

        tracing::debug!(
            "Recommended {:?} for trigger {:?}",
            chosen.map(|ex| ex.id.as_str()),
            trigger
        );
        chosen
    }

    /// Validate catalog integrity
    ///
    /// Returns a list of validation errors (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, ex) in &self.exercises {
            if id.is_empty() || ex.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if id != &ex.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match definition.id '{}'",
                    id, ex.id
                ));
            }
            if ex.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
            if ex.companion_messages.is_empty() {
                errors.push(format!("Exercise '{}' has no companion messages", id));
            }
            errors.extend(ex.problems());
        }

        errors
    }
}
