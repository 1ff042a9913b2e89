use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::StartupError;

use super::input_script::{InputScriptError, InputSource};
use super::scene::SceneKey;
use super::scene_machine::SceneMachine;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub realtime: bool,
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            realtime: false,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    InputScript(#[from] InputScriptError),
    #[error("first scene {0:?} is not registered")]
    UnknownFirstScene(SceneKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    InputExhausted,
    QuitRequested,
    TickLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub switches_applied: u32,
    pub stop_reason: StopReason,
    pub running_at_exit: Vec<SceneKey>,
}

/// Drives the scene machine with fixed ticks until the input runs out, a quit
/// is requested, or the tick limit is hit. Every scene is stopped on exit.
pub fn run_app(
    config: LoopConfig,
    scenes: &mut SceneMachine,
    first_scene: SceneKey,
    input: &mut dyn InputSource,
) -> Result<RunSummary, AppError> {
    let target_tps = config.target_tps.max(1);
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    if !scenes.start(first_scene) {
        return Err(AppError::UnknownFirstScene(first_scene));
    }
    info!(
        target_tps,
        max_ticks_per_frame,
        realtime = config.realtime,
        first_scene = ?first_scene,
        "loop_config"
    );

    let mut ticks = 0u64;
    let mut switches_applied = 0u32;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();

    let stop_reason = 'frames: loop {
        let ticks_this_frame = if config.realtime {
            let now = Instant::now();
            let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            accumulator =
                accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
            let plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
            accumulator = plan.remaining_accumulator;
            if plan.dropped_backlog > Duration::ZERO {
                warn!(
                    dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                    max_ticks_per_frame, "sim_clamp_triggered"
                );
            }
            plan.ticks_to_run
        } else {
            1
        };

        for _ in 0..ticks_this_frame {
            if config.max_ticks.is_some_and(|limit| ticks >= limit) {
                break 'frames StopReason::TickLimit;
            }
            let Some(snapshot) = input.next_snapshot() else {
                break 'frames StopReason::InputExhausted;
            };
            let outcome = scenes.tick(fixed_dt_seconds, &snapshot);
            ticks += 1;
            switches_applied += outcome.switches_applied;
            if snapshot.quit_requested() || outcome.quit_requested {
                break 'frames StopReason::QuitRequested;
            }
            if ticks % u64::from(target_tps) == 0 {
                debug!(ticks, running = ?scenes.running_scenes(), "loop_heartbeat");
            }
        }

        if config.realtime {
            let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
            let sleep = fixed_dt.saturating_sub(elapsed);
            if sleep > Duration::ZERO {
                thread::sleep(sleep);
            }
        }
    };

    let running_at_exit = scenes.running_scenes();
    scenes.shutdown_all();
    info!(ticks, switches_applied, reason = ?stop_reason, "shutdown");

    Ok(RunSummary {
        ticks,
        switches_applied,
        stop_reason,
        running_at_exit,
    })
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::{InputAction, InputSnapshot};
    use crate::app::input_script::{ScriptStep, ScriptedInput};
    use crate::app::scene::{Scene, SceneCommand, SceneStatus, SceneWorld};

    struct IdleScene;

    impl Scene for IdleScene {
        fn load(&mut self, _world: &mut SceneWorld) {}

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            _input: &InputSnapshot,
            _world: &mut SceneWorld,
        ) -> SceneCommand {
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    fn idle_machine() -> SceneMachine {
        let mut machine = SceneMachine::new();
        machine.register(SceneKey::Town, Box::new(IdleScene));
        machine
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(48), Duration::from_millis(16), 5);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn run_stops_when_script_is_exhausted_and_tears_down() {
        let mut machine = idle_machine();
        let mut input = ScriptedInput::new(vec![ScriptStep {
            ticks: 30,
            ..ScriptStep::default()
        }]);
        let summary =
            run_app(LoopConfig::default(), &mut machine, SceneKey::Town, &mut input).expect("run");
        assert_eq!(summary.ticks, 30);
        assert_eq!(summary.stop_reason, StopReason::InputExhausted);
        assert_eq!(summary.running_at_exit, vec![SceneKey::Town]);
        assert_eq!(machine.status(SceneKey::Town), Some(SceneStatus::Stopped));
    }

    #[test]
    fn quit_press_stops_the_loop() {
        let mut machine = idle_machine();
        let mut input = ScriptedInput::new(vec![
            ScriptStep {
                ticks: 5,
                ..ScriptStep::default()
            },
            ScriptStep {
                press: vec![InputAction::Quit],
                ..ScriptStep::default()
            },
            ScriptStep {
                ticks: 100,
                ..ScriptStep::default()
            },
        ]);
        let summary =
            run_app(LoopConfig::default(), &mut machine, SceneKey::Town, &mut input).expect("run");
        assert_eq!(summary.ticks, 6);
        assert_eq!(summary.stop_reason, StopReason::QuitRequested);
    }

    #[test]
    fn tick_limit_caps_the_run() {
        let mut machine = idle_machine();
        let mut input = ScriptedInput::new(vec![ScriptStep {
            ticks: 500,
            ..ScriptStep::default()
        }]);
        let config = LoopConfig {
            max_ticks: Some(12),
            ..LoopConfig::default()
        };
        let summary = run_app(config, &mut machine, SceneKey::Town, &mut input).expect("run");
        assert_eq!(summary.ticks, 12);
        assert_eq!(summary.stop_reason, StopReason::TickLimit);
    }

    #[test]
    fn unknown_first_scene_is_an_error() {
        let mut machine = idle_machine();
        let mut input = ScriptedInput::new(Vec::new());
        let error = run_app(LoopConfig::default(), &mut machine, SceneKey::Camp, &mut input)
            .expect_err("unknown scene");
        assert!(matches!(error, AppError::UnknownFirstScene(SceneKey::Camp)));
    }
}
