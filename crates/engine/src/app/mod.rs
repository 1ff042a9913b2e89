mod audio;
mod camera;
mod input;
mod input_script;
mod loop_runner;
mod scene;
mod scene_machine;
mod timers;

pub use audio::{AudioBus, MusicHandoff, MusicTrack, DEFAULT_MUSIC_VOLUME};
pub use camera::{Camera2D, CameraBounds, FadeDirection};
pub use input::{InputAction, InputCollector, InputSnapshot};
pub use input_script::{InputScriptError, InputSource, ScriptStep, ScriptedInput};
pub use loop_runner::{run_app, AppError, LoopConfig, RunSummary, StopReason};
pub use scene::{
    Body, EntityId, PhysicsConfig, Scene, SceneCommand, SceneKey, SceneRegistryView, SceneStatus,
    SceneSwitch, SceneWorld, SwitchMode, Vec2,
};
pub use scene_machine::{SceneMachine, SwitchError, TickOutcome};
pub use timers::{TimerHandle, TimerQueue};
