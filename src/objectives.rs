//! Learning objectives and their completion check.
//!
//! Each scenario goal has a trigger phrase at the same index. An objective
//! completes once its trigger appears anywhere in the conversation (either
//! speaker, case-insensitive). Completion is monotonic.

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationHistory;

/// A scenario goal the learner works toward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl Objective {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            progress: Some(0),
        }
    }

    /// Build fresh objectives from a scenario's goal list, with ids `obj-{i}`.
    pub fn from_goals<S: AsRef<str>>(goals: &[S]) -> Vec<Self> {
        goals
            .iter()
            .enumerate()
            .map(|(i, goal)| Self::new(format!("obj-{i}"), goal.as_ref()))
            .collect()
    }
}

/// Whether the list is non-empty and every objective is completed.
pub fn all_complete(objectives: &[Objective]) -> bool {
    !objectives.is_empty() && objectives.iter().all(|o| o.completed)
}

/// Keyword-trigger evaluator.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveEvaluator {
    /// Lower-cased trigger phrases, index-aligned with objectives.
    triggers: Vec<String>,
}

impl ObjectiveEvaluator {
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            triggers: triggers
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Re-evaluate `objectives` against the conversation. Returns `true` if
    /// any objective changed.
    ///
    /// Objectives without a matching trigger are left untouched.
    pub fn evaluate(&self, objectives: &mut [Objective], history: &ConversationHistory) -> bool {
        let haystack = history.concatenated_text().to_lowercase();

        let mut changed = false;
        for (objective, trigger) in objectives.iter_mut().zip(&self.triggers) {
            if objective.completed {
                continue;
            }
            let hit = !trigger.is_empty() && haystack.contains(trigger.as_str());
            let progress = if hit { 100 } else { 0 };
            if hit {
                objective.completed = true;
                tracing::info!(objective = %objective.id, trigger = %trigger, "Objective completed");
            }
            if objective.progress != Some(progress) || hit {
                objective.progress = Some(progress);
                changed = true;
            }
        }
        changed
    }
}
