use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Jump,
    Interact,
    Confirm,
    Dance,
    CycleField,
    NudgeUp,
    NudgeDown,
    Submit,
    Backspace,
    Cancel,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Quit,
}

const ACTION_COUNT: usize = 25;

const DIGIT_ACTIONS: [InputAction; 10] = [
    InputAction::Digit0,
    InputAction::Digit1,
    InputAction::Digit2,
    InputAction::Digit3,
    InputAction::Digit4,
    InputAction::Digit5,
    InputAction::Digit6,
    InputAction::Digit7,
    InputAction::Digit8,
    InputAction::Digit9,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set_down(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn set_pressed(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn is_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_pressed(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveLeft => 0,
            InputAction::MoveRight => 1,
            InputAction::MoveUp => 2,
            InputAction::MoveDown => 3,
            InputAction::Jump => 4,
            InputAction::Interact => 5,
            InputAction::Confirm => 6,
            InputAction::Dance => 7,
            InputAction::CycleField => 8,
            InputAction::NudgeUp => 9,
            InputAction::NudgeDown => 10,
            InputAction::Submit => 11,
            InputAction::Backspace => 12,
            InputAction::Cancel => 13,
            InputAction::Digit0 => 14,
            InputAction::Digit1 => 15,
            InputAction::Digit2 => 16,
            InputAction::Digit3 => 17,
            InputAction::Digit4 => 18,
            InputAction::Digit5 => 19,
            InputAction::Digit6 => 20,
            InputAction::Digit7 => 21,
            InputAction::Digit8 => 22,
            InputAction::Digit9 => 23,
            InputAction::Quit => 24,
        }
    }

    pub fn digit(value: u8) -> Option<Self> {
        DIGIT_ACTIONS.get(value as usize).copied()
    }
}

/// Per-tick view of the keyboard.
///
/// `is_down` is level-triggered, `just_pressed` is true only on the tick the
/// key went from up to down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    actions: ActionStates,
    typed_text: String,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(actions: ActionStates, typed_text: String) -> Self {
        Self {
            actions,
            typed_text,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.actions.is_pressed(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.just_pressed(InputAction::Quit)
    }

    /// Lowest digit whose key went down this tick.
    pub fn pressed_digit(&self) -> Option<u8> {
        DIGIT_ACTIONS
            .iter()
            .position(|action| self.just_pressed(*action))
            .map(|index| index as u8)
    }

    pub fn typed_text(&self) -> &str {
        &self.typed_text
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set_down(action, is_down);
        self
    }

    /// Marks a fresh key-down edge; the key also counts as held.
    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set_down(action, true);
        self.actions.set_pressed(action, true);
        self
    }

    pub fn with_typed_text(mut self, text: impl Into<String>) -> Self {
        self.typed_text = text.into();
        self
    }
}

/// Folds key transitions into per-tick snapshots.
#[derive(Debug, Default)]
pub struct InputCollector {
    actions: ActionStates,
    typed_text: String,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, action: InputAction) {
        if !self.actions.is_down(action) {
            self.actions.set_pressed(action, true);
        }
        self.actions.set_down(action, true);
    }

    pub fn key_up(&mut self, action: InputAction) {
        self.actions.set_down(action, false);
    }

    pub fn release_all(&mut self) {
        self.actions.down = [false; ACTION_COUNT];
    }

    pub fn push_text(&mut self, text: &str) {
        self.typed_text.push_str(text);
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(self.actions, std::mem::take(&mut self.typed_text));
        self.actions.clear_pressed();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_produces_single_edge_while_held() {
        let mut collector = InputCollector::new();
        collector.key_down(InputAction::Confirm);

        let first = collector.snapshot_for_tick();
        assert!(first.just_pressed(InputAction::Confirm));
        assert!(first.is_down(InputAction::Confirm));

        collector.key_down(InputAction::Confirm);
        let second = collector.snapshot_for_tick();
        assert!(!second.just_pressed(InputAction::Confirm));
        assert!(second.is_down(InputAction::Confirm));
    }

    #[test]
    fn release_then_press_fires_a_new_edge() {
        let mut collector = InputCollector::new();
        collector.key_down(InputAction::Interact);
        let _ = collector.snapshot_for_tick();
        collector.key_up(InputAction::Interact);
        let released = collector.snapshot_for_tick();
        assert!(!released.is_down(InputAction::Interact));

        collector.key_down(InputAction::Interact);
        assert!(collector
            .snapshot_for_tick()
            .just_pressed(InputAction::Interact));
    }

    #[test]
    fn tap_within_one_tick_still_reports_the_edge() {
        let mut collector = InputCollector::new();
        collector.key_down(InputAction::Confirm);
        collector.key_up(InputAction::Confirm);
        let snapshot = collector.snapshot_for_tick();
        assert!(snapshot.just_pressed(InputAction::Confirm));
        assert!(!snapshot.is_down(InputAction::Confirm));
    }

    #[test]
    fn typed_text_is_consumed_per_tick() {
        let mut collector = InputCollector::new();
        collector.push_text("git ");
        collector.push_text("add");
        assert_eq!(collector.snapshot_for_tick().typed_text(), "git add");
        assert_eq!(collector.snapshot_for_tick().typed_text(), "");
    }

    #[test]
    fn pressed_digit_reports_lowest_digit_edge() {
        let snapshot = InputSnapshot::empty()
            .with_action_pressed(InputAction::Digit7)
            .with_action_pressed(InputAction::Digit3);
        assert_eq!(snapshot.pressed_digit(), Some(3));
        assert_eq!(InputSnapshot::empty().pressed_digit(), None);
        assert_eq!(InputAction::digit(4), Some(InputAction::Digit4));
        assert_eq!(InputAction::digit(10), None);
    }
}
