use engine::{FadeDirection, MusicHandoff, SceneKey, SceneSwitch, SceneWorld, SwitchMode};
use tracing::{debug, info, warn};

pub(crate) const DEFAULT_FADE_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TransitionPhase {
    Idle,
    FadingOut,
    Switching,
    FadingIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TransitionRequest {
    pub(super) target: SceneKey,
    pub(super) mode: SwitchMode,
    pub(super) fade_out_ms: u32,
    pub(super) fade_in_ms: u32,
    pub(super) music: MusicHandoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TransitionRequestOutcome {
    Started,
    Ignored,
    Aborted,
}

/// Sequences fade-out, the lifecycle switch and the fade-in request for one
/// originating scene.
#[derive(Debug, Clone)]
pub(super) struct SceneTransitionCoordinator {
    origin: SceneKey,
    phase: TransitionPhase,
    pending: Option<TransitionRequest>,
}

impl SceneTransitionCoordinator {
    pub(super) fn new(origin: SceneKey) -> Self {
        Self {
            origin,
            phase: TransitionPhase::Idle,
            pending: None,
        }
    }

    pub(super) fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub(super) fn is_busy(&self) -> bool {
        self.phase != TransitionPhase::Idle
    }

    pub(super) fn request_transition(
        &mut self,
        world: &mut SceneWorld,
        request: TransitionRequest,
    ) -> TransitionRequestOutcome {
        if self.phase != TransitionPhase::Idle {
            debug!(
                origin = ?self.origin,
                target_scene = ?request.target,
                phase = ?self.phase,
                "transition_request_ignored"
            );
            return TransitionRequestOutcome::Ignored;
        }
        if !world.registry().contains(request.target) {
            warn!(
                origin = ?self.origin,
                target_scene = ?request.target,
                "transition_aborted"
            );
            world.camera_mut().reset_fade();
            return TransitionRequestOutcome::Aborted;
        }

        info!(
            origin = ?self.origin,
            target_scene = ?request.target,
            mode = ?request.mode,
            fade_out_ms = request.fade_out_ms,
            "transition_requested"
        );
        world.camera_mut().fade_out(request.fade_out_ms);
        self.phase = TransitionPhase::FadingOut;
        self.pending = Some(request);
        TransitionRequestOutcome::Started
    }

    /// Feeds a camera fade completion. A finished fade-out yields the switch
    /// the scene must hand to the machine on this very update.
    pub(super) fn on_fade_complete(&mut self, direction: FadeDirection) -> Option<SceneSwitch> {
        if direction != FadeDirection::Out || self.phase != TransitionPhase::FadingOut {
            return None;
        }
        let Some(request) = self.pending.take() else {
            self.phase = TransitionPhase::Idle;
            return None;
        };
        self.phase = TransitionPhase::Switching;
        Some(SceneSwitch {
            from: self.origin,
            to: request.target,
            mode: request.mode,
            fade_in_ms: request.fade_in_ms,
            music: request.music,
        })
    }

    pub(super) fn mark_dispatched(&mut self) {
        if self.phase == TransitionPhase::Switching {
            self.phase = TransitionPhase::FadingIn;
        }
    }

    pub(super) fn settle(&mut self) {
        if self.phase == TransitionPhase::FadingIn {
            self.phase = TransitionPhase::Idle;
        }
    }

    pub(super) fn reset(&mut self) {
        self.phase = TransitionPhase::Idle;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn town_machine() -> engine::SceneMachine {
        let mut machine = engine::SceneMachine::new();
        machine.register(SceneKey::Town, Box::new(NullScene));
        machine.register(SceneKey::Club, Box::new(NullScene));
        assert!(machine.start(SceneKey::Town));
        machine
    }

    struct NullScene;

    impl engine::Scene for NullScene {
        fn load(&mut self, _world: &mut SceneWorld) {}

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            _input: &engine::InputSnapshot,
            _world: &mut SceneWorld,
        ) -> engine::SceneCommand {
            engine::SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    fn to_club() -> TransitionRequest {
        TransitionRequest {
            target: SceneKey::Club,
            mode: SwitchMode::PauseAndLaunch,
            fade_out_ms: 300,
            fade_in_ms: 200,
            music: MusicHandoff::Play {
                track: "club_theme".to_string(),
            },
        }
    }

    #[test]
    fn request_starts_fade_out_and_ignores_duplicates() {
        let mut machine = town_machine();
        let world = machine.world_mut(SceneKey::Town).expect("town world");
        let mut coordinator = SceneTransitionCoordinator::new(SceneKey::Town);
        assert_eq!(
            coordinator.request_transition(world, to_club()),
            TransitionRequestOutcome::Started
        );
        assert!(world.camera().is_fading());
        assert_eq!(
            coordinator.request_transition(world, to_club()),
            TransitionRequestOutcome::Ignored
        );
        assert_eq!(coordinator.phase(), TransitionPhase::FadingOut);
    }

    #[test]
    fn fade_out_completion_yields_exactly_one_switch() {
        let mut machine = town_machine();
        let world = machine.world_mut(SceneKey::Town).expect("town world");
        let mut coordinator = SceneTransitionCoordinator::new(SceneKey::Town);
        coordinator.request_transition(world, to_club());
        coordinator.request_transition(world, to_club());

        assert_eq!(coordinator.on_fade_complete(FadeDirection::In), None);
        let switch = coordinator
            .on_fade_complete(FadeDirection::Out)
            .expect("switch");
        assert_eq!(switch.from, SceneKey::Town);
        assert_eq!(switch.to, SceneKey::Club);
        assert_eq!(switch.fade_in_ms, 200);
        assert_eq!(coordinator.on_fade_complete(FadeDirection::Out), None);

        coordinator.mark_dispatched();
        assert_eq!(coordinator.phase(), TransitionPhase::FadingIn);
        coordinator.settle();
        assert_eq!(coordinator.phase(), TransitionPhase::Idle);
    }

    #[test]
    fn unknown_target_aborts_and_leaves_scene_visible() {
        let mut machine = town_machine();
        let world = machine.world_mut(SceneKey::Town).expect("town world");
        let mut coordinator = SceneTransitionCoordinator::new(SceneKey::Town);
        let request = TransitionRequest {
            target: SceneKey::Camp,
            ..to_club()
        };
        assert_eq!(
            coordinator.request_transition(world, request),
            TransitionRequestOutcome::Aborted
        );
        assert!(!coordinator.is_busy());
        assert!(!world.camera().is_fading());
        assert_eq!(world.camera().fade_opacity(), 0.0);
    }
}
