use engine::{InputAction, InputSnapshot, SceneWorld};
use serde::Deserialize;
use tracing::{debug, info};

pub(super) const DIALOGUE_OVERLAY: &str = "dialogue";

/// One line or many; a single string is a one-line conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum DialogueLines {
    One(String),
    Many(Vec<String>),
}

impl DialogueLines {
    pub(super) fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(line) => vec![line],
            Self::Many(lines) => lines,
        }
    }
}

impl From<&str> for DialogueLines {
    fn from(line: &str) -> Self {
        Self::One(line.to_string())
    }
}

impl From<Vec<String>> for DialogueLines {
    fn from(lines: Vec<String>) -> Self {
        Self::Many(lines)
    }
}

impl From<&[String]> for DialogueLines {
    fn from(lines: &[String]) -> Self {
        Self::Many(lines.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DialogueSession {
    speaker: String,
    lines: Vec<String>,
    cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DialogueAdvance {
    Showing(usize),
    Finished,
    Inactive,
}

/// The single conversation a scene may run at a time.
///
/// While a session exists the scene treats the world as frozen and the
/// confirm edge belongs to this controller alone.
#[derive(Debug, Default)]
pub(super) struct DialogueController {
    session: Option<DialogueSession>,
}

impl DialogueController {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub(super) fn speaker(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.speaker.as_str())
    }

    pub(super) fn current_line(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.lines.get(session.cursor))
            .map(String::as_str)
    }

    pub(super) fn start(
        &mut self,
        world: &mut SceneWorld,
        speaker: &str,
        lines: impl Into<DialogueLines>,
    ) -> bool {
        if self.session.is_some() {
            debug!(speaker, "dialogue_start_ignored");
            return false;
        }
        let lines = lines.into().into_vec();
        if lines.is_empty() {
            debug!(speaker, "dialogue_empty");
            return false;
        }
        info!(speaker, line_count = lines.len(), "dialogue_started");
        self.session = Some(DialogueSession {
            speaker: speaker.to_string(),
            lines,
            cursor: 0,
        });
        self.render(world);
        true
    }

    pub(super) fn advance(&mut self, world: &mut SceneWorld) -> DialogueAdvance {
        let Some(session) = self.session.as_mut() else {
            return DialogueAdvance::Inactive;
        };
        session.cursor += 1;
        if session.cursor >= session.lines.len() {
            info!(speaker = %session.speaker, "dialogue_finished");
            self.close(world);
            return DialogueAdvance::Finished;
        }
        let cursor = session.cursor;
        self.render(world);
        DialogueAdvance::Showing(cursor)
    }

    /// Advances on the confirm edge only; holding confirm never skips lines.
    pub(super) fn handle_input(
        &mut self,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> DialogueAdvance {
        if !self.is_active() {
            return DialogueAdvance::Inactive;
        }
        if !input.just_pressed(InputAction::Confirm) {
            let cursor = self
                .session
                .as_ref()
                .map(|session| session.cursor)
                .unwrap_or_default();
            return DialogueAdvance::Showing(cursor);
        }
        self.advance(world)
    }

    pub(super) fn close(&mut self, world: &mut SceneWorld) {
        self.session = None;
        world.hide_overlay(DIALOGUE_OVERLAY);
    }

    fn render(&self, world: &mut SceneWorld) {
        if let (Some(speaker), Some(line)) = (self.speaker(), self.current_line()) {
            world.show_overlay(DIALOGUE_OVERLAY, &format!("{speaker}: {line}"));
        }
    }
}
