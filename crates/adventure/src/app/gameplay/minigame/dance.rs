use serde::Deserialize;
use tracing::info;

use super::super::quest::QuestTemplate;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DanceConfig {
    pub(crate) npc: String,
    pub(crate) radius: f32,
    pub(crate) required_seconds: f32,
    pub(crate) quest: QuestTemplate,
    #[serde(default)]
    pub(crate) completion_dialogue: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DancePhase {
    Inactive,
    Dancing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DanceEvent {
    Started,
    Paused,
    Completed,
}

/// Hold-to-dance timer. Leaving the zone pauses the accumulator instead of
/// resetting it; completion is terminal.
#[derive(Debug, Clone)]
pub(crate) struct DanceMinigame {
    phase: DancePhase,
    accumulated_seconds: f32,
    required_seconds: f32,
}

impl DanceMinigame {
    pub(crate) fn new(required_seconds: f32) -> Self {
        Self {
            phase: DancePhase::Inactive,
            accumulated_seconds: 0.0,
            required_seconds: required_seconds.max(0.0),
        }
    }

    pub(crate) fn phase(&self) -> DancePhase {
        self.phase
    }

    pub(crate) fn accumulated_seconds(&self) -> f32 {
        self.accumulated_seconds
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.phase == DancePhase::Complete
    }

    pub(crate) fn update(&mut self, condition: bool, dt_seconds: f32) -> Option<DanceEvent> {
        let mut event = None;
        match self.phase {
            DancePhase::Complete => return None,
            DancePhase::Inactive if condition => {
                self.phase = DancePhase::Dancing;
                event = Some(DanceEvent::Started);
            }
            DancePhase::Inactive => return None,
            DancePhase::Dancing if !condition => {
                self.phase = DancePhase::Inactive;
                info!(accumulated = self.accumulated_seconds, "dance_paused");
                return Some(DanceEvent::Paused);
            }
            DancePhase::Dancing => {}
        }

        self.accumulated_seconds += dt_seconds.max(0.0);
        if self.accumulated_seconds >= self.required_seconds {
            self.phase = DancePhase::Complete;
            info!(accumulated = self.accumulated_seconds, "dance_completed");
            return Some(DanceEvent::Completed);
        }
        event
    }
}
