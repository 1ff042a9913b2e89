use std::env;
use std::path::PathBuf;
use std::rc::Rc;

use engine::{
    resolve_app_paths, AppPaths, InputScriptError, LoopConfig, SceneKey, SceneMachine,
    ScriptedInput, StartupError, DEFAULT_MUSIC_VOLUME,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::content::{ContentDatabase, ContentError};
use super::gameplay::{self, SharedProgress};

const INPUT_SCRIPT_ENV_VAR: &str = "ADVENTURE_INPUT_SCRIPT";
const REALTIME_ENV_VAR: &str = "ADVENTURE_REALTIME";
const DEFAULT_INPUT_SCRIPT: &str = "demo.json";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    InputScript(#[from] InputScriptError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) machine: SceneMachine,
    pub(crate) first_scene: SceneKey,
    pub(crate) input: ScriptedInput,
    pub(crate) progress: SharedProgress,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Adventure Startup ===");

    let paths = resolve_app_paths()?;
    let content = Rc::new(ContentDatabase::load(&paths.content_dir)?);
    let progress = SharedProgress::default();
    let machine = build_machine(&content, &progress);
    let first_scene = content.start_scene();

    let script_path = input_script_path(&paths);
    let input = ScriptedInput::from_path(&script_path)?;
    info!(
        path = %script_path.display(),
        ticks = input.total_ticks(),
        "input_script_loaded"
    );

    let config = LoopConfig {
        realtime: parse_realtime_from_env(),
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        machine,
        first_scene,
        input,
        progress,
    })
}

/// Registers every scene and starts the first scene's music.
pub(crate) fn build_machine(
    content: &Rc<ContentDatabase>,
    progress: &SharedProgress,
) -> SceneMachine {
    let mut machine = SceneMachine::new();
    for (key, scene) in gameplay::build_scenes(content, progress) {
        if !machine.register(key, scene) {
            warn!(scene = ?key, "scene_registered_twice");
        }
    }
    let first_track = content
        .scene(content.start_scene())
        .and_then(|layout| layout.music.as_deref());
    if let Some(track) = first_track {
        machine.audio_mut().play(track, DEFAULT_MUSIC_VOLUME);
    }
    machine
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn input_script_path(paths: &AppPaths) -> PathBuf {
    match env::var(INPUT_SCRIPT_ENV_VAR).ok().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => {
            let path = PathBuf::from(raw.trim());
            if path.is_absolute() {
                path
            } else {
                paths.root.join(path)
            }
        }
        None => paths.scripts_dir.join(DEFAULT_INPUT_SCRIPT),
    }
}

fn parse_realtime_from_env() -> bool {
    env::var(REALTIME_ENV_VAR)
        .ok()
        .is_some_and(|raw| parse_flag(&raw))
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_flag_accepts_common_truthy_values() {
        for raw in ["1", "true", " TRUE ", "yes", "on"] {
            assert!(parse_flag(raw), "{raw}");
        }
        for raw in ["", "0", "false", "off", "maybe"] {
            assert!(!parse_flag(raw), "{raw}");
        }
    }
}
