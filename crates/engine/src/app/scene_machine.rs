use thiserror::Error;
use tracing::{debug, info, warn};

use super::audio::AudioBus;
use super::input::InputSnapshot;
use super::scene::{
    Scene, SceneCommand, SceneKey, SceneRegistryView, SceneStatus, SceneSwitch, SceneWorld,
    SwitchMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SwitchError {
    #[error("target scene {0:?} is not registered")]
    UnknownTarget(SceneKey),
    #[error("source scene {0:?} is not running")]
    SourceNotRunning(SceneKey),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub quit_requested: bool,
    pub switches_applied: u32,
}

struct SceneRuntime {
    key: SceneKey,
    scene: Box<dyn Scene>,
    world: SceneWorld,
    status: SceneStatus,
}

/// Registry of scenes and their lifecycle.
///
/// Every running scene is updated once per tick in registration order. A
/// switch returned by a scene is applied right after that scene's update, so
/// the originating scene never runs again between its fade-out and the
/// target's fade-in request.
#[derive(Default)]
pub struct SceneMachine {
    runtimes: Vec<SceneRuntime>,
    audio: AudioBus,
}

impl SceneMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: SceneKey, scene: Box<dyn Scene>) -> bool {
        if self.index_of(key).is_some() {
            warn!(scene = ?key, "scene_already_registered");
            return false;
        }
        self.runtimes.push(SceneRuntime {
            key,
            scene,
            world: SceneWorld::default(),
            status: SceneStatus::Stopped,
        });
        true
    }

    pub fn registry_view(&self) -> SceneRegistryView {
        SceneRegistryView::new(
            self.runtimes
                .iter()
                .map(|runtime| (runtime.key, runtime.status))
                .collect(),
        )
    }

    pub fn registered_keys(&self) -> Vec<SceneKey> {
        self.runtimes.iter().map(|runtime| runtime.key).collect()
    }

    pub fn status(&self, key: SceneKey) -> Option<SceneStatus> {
        self.runtime_ref(key).map(|runtime| runtime.status)
    }

    pub fn running_scenes(&self) -> Vec<SceneKey> {
        self.runtimes
            .iter()
            .filter(|runtime| runtime.status == SceneStatus::Running)
            .map(|runtime| runtime.key)
            .collect()
    }

    pub fn world(&self, key: SceneKey) -> Option<&SceneWorld> {
        self.runtime_ref(key).map(|runtime| &runtime.world)
    }

    pub fn world_mut(&mut self, key: SceneKey) -> Option<&mut SceneWorld> {
        self.runtime_mut(key).map(|runtime| &mut runtime.world)
    }

    pub fn audio(&self) -> &AudioBus {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioBus {
        &mut self.audio
    }

    /// (Re)starts a scene from a clean world.
    pub fn start(&mut self, key: SceneKey) -> bool {
        let registry = self.registry_view();
        let Some(runtime) = self.runtime_mut(key) else {
            warn!(scene = ?key, "scene_start_unknown");
            return false;
        };
        if runtime.status != SceneStatus::Stopped {
            runtime.scene.unload(&mut runtime.world);
            runtime.world.clear();
        }
        runtime.world.set_registry(registry);
        runtime.scene.load(&mut runtime.world);
        runtime.world.apply_pending();
        runtime.status = SceneStatus::Running;
        info!(
            scene = ?key,
            body_count = runtime.world.body_count(),
            "scene_started"
        );
        true
    }

    pub fn stop(&mut self, key: SceneKey) -> bool {
        let Some(runtime) = self.runtime_mut(key) else {
            warn!(scene = ?key, "scene_stop_unknown");
            return false;
        };
        if runtime.status == SceneStatus::Stopped {
            return false;
        }
        runtime.scene.unload(&mut runtime.world);
        runtime.world.clear();
        runtime.status = SceneStatus::Stopped;
        info!(scene = ?key, "scene_stopped");
        true
    }

    pub fn pause(&mut self, key: SceneKey) -> bool {
        let Some(runtime) = self.runtime_mut(key) else {
            return false;
        };
        if runtime.status != SceneStatus::Running {
            return false;
        }
        runtime.scene.pause(&mut runtime.world);
        runtime.status = SceneStatus::Paused;
        info!(scene = ?key, "scene_paused");
        true
    }

    pub fn resume(&mut self, key: SceneKey) -> bool {
        let Some(runtime) = self.runtime_mut(key) else {
            return false;
        };
        if runtime.status != SceneStatus::Paused {
            return false;
        }
        runtime.scene.resume(&mut runtime.world);
        runtime.status = SceneStatus::Running;
        info!(scene = ?key, "scene_resumed");
        true
    }

    /// Starts a scene alongside whatever is already running.
    pub fn launch(&mut self, key: SceneKey) -> bool {
        match self.status(key) {
            Some(SceneStatus::Stopped) => self.start(key),
            Some(SceneStatus::Paused) => self.resume(key),
            Some(SceneStatus::Running) => false,
            None => {
                warn!(scene = ?key, "scene_launch_unknown");
                false
            }
        }
    }

    pub fn apply_switch(&mut self, switch: &SceneSwitch) -> Result<(), SwitchError> {
        if self.index_of(switch.to).is_none() {
            if let Some(world) = self.world_mut(switch.from) {
                world.camera_mut().reset_fade();
            }
            return Err(SwitchError::UnknownTarget(switch.to));
        }
        if self.status(switch.from) != Some(SceneStatus::Running) {
            return Err(SwitchError::SourceNotRunning(switch.from));
        }

        match switch.mode {
            SwitchMode::StopAndResume => {
                self.stop(switch.from);
                if !self.resume(switch.to) && self.status(switch.to) != Some(SceneStatus::Running)
                {
                    self.start(switch.to);
                }
            }
            SwitchMode::PauseAndLaunch => {
                self.pause(switch.from);
                self.launch(switch.to);
            }
        }

        self.audio.apply_handoff(&switch.music);
        if let Some(world) = self.world_mut(switch.to) {
            world.camera_mut().fade_in(switch.fade_in_ms);
        }
        info!(
            from = ?switch.from,
            to = ?switch.to,
            mode = ?switch.mode,
            "scene_switched"
        );
        Ok(())
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        for key in self.running_scenes() {
            if self.status(key) != Some(SceneStatus::Running) {
                continue;
            }
            let registry = self.registry_view();
            let Some(runtime) = self.runtime_mut(key) else {
                continue;
            };
            runtime.world.set_registry(registry);
            let command = runtime
                .scene
                .update(fixed_dt_seconds, input, &mut runtime.world);
            runtime.world.apply_pending();
            runtime.world.step_bodies(fixed_dt_seconds);
            runtime.world.tick_camera(fixed_dt_seconds);

            match command {
                SceneCommand::None => {}
                SceneCommand::Quit => outcome.quit_requested = true,
                SceneCommand::Switch(switch) => match self.apply_switch(&switch) {
                    Ok(()) => outcome.switches_applied += 1,
                    Err(error) => warn!(error = %error, "scene_switch_aborted"),
                },
            }
        }
        self.audio.tick(fixed_dt_seconds);
        outcome
    }

    pub fn shutdown_all(&mut self) {
        for key in self.registered_keys() {
            if self.stop(key) {
                debug!(scene = ?key, "scene_shutdown");
            }
        }
        self.audio.stop();
    }

    fn index_of(&self, key: SceneKey) -> Option<usize> {
        self.runtimes.iter().position(|runtime| runtime.key == key)
    }

    fn runtime_ref(&self, key: SceneKey) -> Option<&SceneRuntime> {
        self.index_of(key).map(|index| &self.runtimes[index])
    }

    fn runtime_mut(&mut self, key: SceneKey) -> Option<&mut SceneRuntime> {
        self.index_of(key).map(move |index| &mut self.runtimes[index])
    }
}
