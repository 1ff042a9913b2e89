use engine::{InputAction, InputSnapshot};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::super::quest::QuestTemplate;
use super::terminal::{TerminalOutcome, TerminalStage, TerminalState, DEFAULT_COMMIT_PATTERN};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Offsets {
    pub(crate) top: f32,
    pub(crate) right: f32,
    pub(crate) bottom: f32,
    pub(crate) left: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CenteringConfig {
    pub(crate) npc: String,
    pub(crate) initial: Offsets,
    pub(crate) target: Offsets,
    #[serde(default = "default_tolerance_px")]
    pub(crate) tolerance_px: f32,
    #[serde(default = "default_max_px")]
    pub(crate) max_px: f32,
    #[serde(default = "default_step_px")]
    pub(crate) step_px: f32,
    #[serde(default = "default_commit_pattern")]
    pub(crate) commit_pattern: String,
    pub(crate) quest: QuestTemplate,
    #[serde(default)]
    pub(crate) completion_dialogue: Vec<String>,
}

fn default_tolerance_px() -> f32 {
    2.0
}

fn default_max_px() -> f32 {
    100.0
}

fn default_step_px() -> f32 {
    5.0
}

fn default_commit_pattern() -> String {
    DEFAULT_COMMIT_PATTERN.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Top,
    Right,
    Bottom,
    Left,
}

const FIELD_ORDER: [Field; 4] = [Field::Top, Field::Right, Field::Bottom, Field::Left];

impl Field {
    fn label(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
        }
    }
}

impl Offsets {
    fn get(&self, field: Field) -> f32 {
        match field {
            Field::Top => self.top,
            Field::Right => self.right,
            Field::Bottom => self.bottom,
            Field::Left => self.left,
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut f32 {
        match field {
            Field::Top => &mut self.top,
            Field::Right => &mut self.right,
            Field::Bottom => &mut self.bottom,
            Field::Left => &mut self.left,
        }
    }

    fn within(&self, target: &Offsets, tolerance: f32) -> bool {
        FIELD_ORDER
            .iter()
            .all(|field| (self.get(*field) - target.get(*field)).abs() <= tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CenteringPhase {
    Adjusting,
    Centered,
    TerminalAdd,
    TerminalCommit,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CenteringEvent {
    Closed,
    FieldSelected(Field),
    OffsetChanged { field: Field, value: f32 },
    Centered,
    TerminalOpened,
    Terminal(TerminalOutcome),
    Done,
}

/// Offset panel followed by the terminal. While the panel is open it owns
/// every input of the scene.
#[derive(Debug, Clone)]
pub(crate) struct CenteringMinigame {
    phase: CenteringPhase,
    offsets: Offsets,
    target: Offsets,
    tolerance_px: f32,
    max_px: f32,
    step_px: f32,
    selected: usize,
    was_within: bool,
    centered_achieved: bool,
    open: bool,
    done_fired: bool,
    terminal: TerminalState,
}

impl CenteringMinigame {
    pub(crate) fn new(config: &CenteringConfig, commit_pattern: Regex) -> Self {
        let offsets = config.initial;
        let tolerance_px = config.tolerance_px.max(0.0);
        Self {
            phase: CenteringPhase::Adjusting,
            offsets,
            target: config.target,
            tolerance_px,
            max_px: config.max_px.max(0.0),
            step_px: config.step_px,
            selected: 0,
            was_within: false,
            centered_achieved: false,
            open: false,
            done_fired: false,
            terminal: TerminalState::new(commit_pattern),
        }
    }

    pub(crate) fn phase(&self) -> CenteringPhase {
        self.phase
    }

    pub(crate) fn offsets(&self) -> Offsets {
        self.offsets
    }

    pub(crate) fn selected_field(&self) -> Field {
        FIELD_ORDER[self.selected % FIELD_ORDER.len()]
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn terminal(&self) -> &TerminalState {
        &self.terminal
    }

    pub(crate) fn open(&mut self) -> bool {
        if self.phase == CenteringPhase::Done || self.open {
            return false;
        }
        self.open = true;
        info!(phase = ?self.phase, "centering_opened");
        true
    }

    pub(crate) fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!(phase = ?self.phase, "centering_closed");
        }
    }

    pub(crate) fn update(&mut self, input: &InputSnapshot) -> Vec<CenteringEvent> {
        let mut events = Vec::new();
        if !self.open {
            return events;
        }
        match self.phase {
            _ if input.just_pressed(InputAction::Cancel) => {
                self.close();
                events.push(CenteringEvent::Closed);
            }
            CenteringPhase::Adjusting => {
                self.adjust(input, &mut events);
                if self.evaluate() {
                    events.push(CenteringEvent::Centered);
                }
            }
            CenteringPhase::Centered => {
                self.phase = CenteringPhase::TerminalAdd;
                events.push(CenteringEvent::TerminalOpened);
            }
            CenteringPhase::TerminalAdd | CenteringPhase::TerminalCommit => {
                self.feed_terminal(input, &mut events);
            }
            CenteringPhase::Done => {}
        }
        events
    }

    fn adjust(&mut self, input: &InputSnapshot, events: &mut Vec<CenteringEvent>) {
        if input.just_pressed(InputAction::CycleField) {
            self.selected = (self.selected + 1) % FIELD_ORDER.len();
            events.push(CenteringEvent::FieldSelected(self.selected_field()));
        }

        let field = self.selected_field();
        let current = self.offsets.get(field);
        let mut next = current;
        if let Some(digit) = input.pressed_digit() {
            next = f32::from(digit) * 10.0;
        }
        if input.just_pressed(InputAction::NudgeUp) {
            next += self.step_px;
        }
        if input.just_pressed(InputAction::NudgeDown) {
            next -= self.step_px;
        }
        let next = next.clamp(0.0, self.max_px);
        if next != current {
            *self.offsets.get_mut(field) = next;
            events.push(CenteringEvent::OffsetChanged { field, value: next });
        }
    }

    /// Fires on the first evaluation where every offset is inside tolerance,
    /// never again afterwards.
    pub(crate) fn evaluate(&mut self) -> bool {
        let within = self.offsets.within(&self.target, self.tolerance_px);
        let rising = within && !self.was_within;
        self.was_within = within;
        if !rising || self.centered_achieved {
            return false;
        }
        self.centered_achieved = true;
        if self.phase == CenteringPhase::Adjusting {
            self.phase = CenteringPhase::Centered;
        }
        info!(offsets = ?self.offsets, "centering_achieved");
        true
    }

    fn feed_terminal(&mut self, input: &InputSnapshot, events: &mut Vec<CenteringEvent>) {
        if input.just_pressed(InputAction::Backspace) {
            self.terminal.backspace();
        }
        self.terminal.type_text(input.typed_text());
        if !input.just_pressed(InputAction::Submit) {
            return;
        }

        let outcome = self.terminal.submit();
        self.phase = match self.terminal.stage() {
            TerminalStage::Add => CenteringPhase::TerminalAdd,
            TerminalStage::Commit => CenteringPhase::TerminalCommit,
            TerminalStage::Finished => CenteringPhase::Done,
        };
        events.push(CenteringEvent::Terminal(outcome));
        if self.phase == CenteringPhase::Done && !self.done_fired {
            self.done_fired = true;
            self.open = false;
            info!("centering_done");
            events.push(CenteringEvent::Done);
        }
    }

    pub(crate) fn render_panel(&self) -> String {
        let selected = self.selected_field();
        FIELD_ORDER
            .iter()
            .map(|field| {
                let marker = if *field == selected { ">" } else { " " };
                format!("{marker} {}: {}px", field.label(), self.offsets.get(*field))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> CenteringConfig {
        serde_json::from_value(json!({
            "npc": "desk",
            "initial": { "top": 0.0, "right": 0.0, "bottom": 0.0, "left": 0.0 },
            "target": { "top": 40.0, "right": 40.0, "bottom": 40.0, "left": 40.0 },
            "quest": {
                "id": "center_div",
                "title": "Center the div",
                "objectives": { "centered": false },
                "rewards": { "gold": 30 }
            }
        }))
        .expect("config")
    }

    fn minigame() -> CenteringMinigame {
        let config = config();
        let pattern = Regex::new(&config.commit_pattern).expect("pattern");
        let mut minigame = CenteringMinigame::new(&config, pattern);
        assert!(minigame.open());
        minigame
    }

    fn press(action: InputAction) -> InputSnapshot {
        InputSnapshot::empty().with_action_pressed(action)
    }

    fn set_all_fields(minigame: &mut CenteringMinigame, digit: u8) -> Vec<CenteringEvent> {
        let mut events = Vec::new();
        let digit_action = InputAction::digit(digit).expect("digit");
        for index in 0..4 {
            if index > 0 {
                events.extend(minigame.update(&press(InputAction::CycleField)));
            }
            events.extend(minigame.update(&press(digit_action)));
        }
        events
    }

    fn type_command(minigame: &mut CenteringMinigame, command: &str) -> Vec<CenteringEvent> {
        let input = InputSnapshot::empty()
            .with_typed_text(command)
            .with_action_pressed(InputAction::Submit);
        minigame.update(&input)
    }

    #[test]
    fn defaults_come_from_config() {
        let config = config();
        assert_eq!(config.tolerance_px, 2.0);
        assert_eq!(config.max_px, 100.0);
        assert_eq!(config.step_px, 5.0);
    }

    #[test]
    fn tab_cycles_fields_in_order() {
        let mut minigame = minigame();
        assert_eq!(minigame.selected_field(), Field::Top);
        let mut seen = Vec::new();
        for _ in 0..4 {
            minigame.update(&press(InputAction::CycleField));
            seen.push(minigame.selected_field());
        }
        assert_eq!(seen, vec![Field::Right, Field::Bottom, Field::Left, Field::Top]);
    }

    #[test]
    fn digits_map_to_tens_and_nudges_clamp() {
        let mut minigame = minigame();
        minigame.update(&press(InputAction::Digit7));
        assert_eq!(minigame.offsets().top, 70.0);
        minigame.update(&press(InputAction::Digit0));
        assert_eq!(minigame.offsets().top, 0.0);
        minigame.update(&press(InputAction::NudgeDown));
        assert_eq!(minigame.offsets().top, 0.0);
        minigame.update(&press(InputAction::Digit9));
        for _ in 0..5 {
            minigame.update(&press(InputAction::NudgeUp));
        }
        assert_eq!(minigame.offsets().top, 100.0);
    }

    #[test]
    fn centered_fires_once_across_consecutive_ticks() {
        let mut minigame = minigame();
        let events = set_all_fields(&mut minigame, 4);
        assert_eq!(
            events
                .iter()
                .filter(|event| **event == CenteringEvent::Centered)
                .count(),
            1
        );
        let fired = (0..10).filter(|_| minigame.evaluate()).count();
        assert_eq!(fired, 0);
        assert_eq!(minigame.phase(), CenteringPhase::Centered);
    }

    #[test]
    fn evaluate_is_edge_triggered() {
        let config = CenteringConfig {
            initial: Offsets {
                top: 40.0,
                right: 41.0,
                bottom: 39.0,
                left: 40.0,
            },
            ..config()
        };
        let pattern = Regex::new(DEFAULT_COMMIT_PATTERN).expect("pattern");
        let mut minigame = CenteringMinigame::new(&config, pattern);
        let fired: Vec<bool> = (0..10).map(|_| minigame.evaluate()).collect();
        assert_eq!(fired.iter().filter(|fired| **fired).count(), 1);
        assert!(fired[0]);

        let config = CenteringConfig {
            initial: Offsets::default(),
            ..self::config()
        };
        let pattern = Regex::new(DEFAULT_COMMIT_PATTERN).expect("pattern");
        let mut minigame = CenteringMinigame::new(&config, pattern);
        minigame.offsets = config.target;
        let fired: Vec<bool> = (0..10).map(|_| minigame.evaluate()).collect();
        assert_eq!(fired.iter().filter(|fired| **fired).count(), 1);
        assert!(fired[0]);
    }

    #[test]
    fn cancel_closes_without_losing_progress() {
        let mut minigame = minigame();
        minigame.update(&press(InputAction::Digit3));
        let events = minigame.update(&press(InputAction::Cancel));
        assert_eq!(events, vec![CenteringEvent::Closed]);
        assert!(!minigame.is_open());
        assert!(minigame.update(&press(InputAction::Digit5)).is_empty());

        assert!(minigame.open());
        assert_eq!(minigame.offsets().top, 30.0);
    }

    #[test]
    fn initial_offsets_already_centered_fire_on_the_first_tick() {
        let config = CenteringConfig {
            initial: config().target,
            ..config()
        };
        let pattern = Regex::new(&config.commit_pattern).expect("pattern");
        let mut minigame = CenteringMinigame::new(&config, pattern);
        assert!(minigame.open());

        let first = minigame.update(&InputSnapshot::empty());
        assert_eq!(first, vec![CenteringEvent::Centered]);
        let later = (0..9)
            .flat_map(|_| minigame.update(&InputSnapshot::empty()))
            .filter(|event| *event == CenteringEvent::Centered)
            .count();
        assert_eq!(later, 0);
        assert_eq!(minigame.phase(), CenteringPhase::TerminalAdd);
    }

    #[test]
    fn cancel_leaves_the_terminal_and_keeps_its_stage() {
        let mut minigame = minigame();
        set_all_fields(&mut minigame, 4);
        minigame.update(&InputSnapshot::empty());
        type_command(&mut minigame, "git add .");
        assert_eq!(minigame.phase(), CenteringPhase::TerminalCommit);

        let events = minigame.update(&press(InputAction::Cancel));
        assert_eq!(events, vec![CenteringEvent::Closed]);
        assert!(!minigame.is_open());
        assert!(type_command(&mut minigame, "git commit -m \"x\"").is_empty());
        assert_eq!(minigame.phase(), CenteringPhase::TerminalCommit);

        assert!(minigame.open());
        let done = type_command(&mut minigame, "git commit -m \"center it\"");
        assert_eq!(done.last(), Some(&CenteringEvent::Done));
    }

    #[test]
    fn full_run_reaches_done_once() {
        let mut minigame = minigame();
        set_all_fields(&mut minigame, 4);
        assert_eq!(
            minigame.update(&InputSnapshot::empty()),
            vec![CenteringEvent::TerminalOpened]
        );
        assert_eq!(minigame.phase(), CenteringPhase::TerminalAdd);

        let rejected = type_command(&mut minigame, "git push");
        assert!(matches!(
            rejected.as_slice(),
            [CenteringEvent::Terminal(TerminalOutcome::Rejected { .. })]
        ));
        assert_eq!(minigame.phase(), CenteringPhase::TerminalAdd);

        type_command(&mut minigame, "git add --all");
        assert_eq!(minigame.phase(), CenteringPhase::TerminalCommit);

        let done = type_command(&mut minigame, "git commit -m \"center it\"");
        assert_eq!(done.last(), Some(&CenteringEvent::Done));
        assert_eq!(minigame.phase(), CenteringPhase::Done);
        assert!(!minigame.is_open());
        assert!(!minigame.open());
        assert!(minigame.update(&press(InputAction::Submit)).is_empty());
    }

    #[test]
    fn panel_marks_the_selected_field() {
        let mut minigame = minigame();
        minigame.update(&press(InputAction::CycleField));
        let panel = minigame.render_panel();
        assert!(panel.contains("> right: 0px"));
        assert!(panel.contains("  top: 0px"));
    }
}
