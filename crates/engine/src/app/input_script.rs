use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::input::{InputAction, InputCollector, InputSnapshot};

pub trait InputSource {
    /// Input for the next tick, or `None` once the source is exhausted.
    fn next_snapshot(&mut self) -> Option<InputSnapshot>;
}

#[derive(Debug, Error)]
pub enum InputScriptError {
    #[error("failed to read input script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input script at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One step of a scripted run.
///
/// `press` actions are tapped on the first tick of the step, `hold` actions
/// stay down for every tick of the step, `text` is typed on the first tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptStep {
    #[serde(default = "default_step_ticks")]
    pub ticks: u32,
    #[serde(default)]
    pub hold: Vec<InputAction>,
    #[serde(default)]
    pub press: Vec<InputAction>,
    #[serde(default)]
    pub text: String,
}

fn default_step_ticks() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputScriptFile {
    steps: Vec<ScriptStep>,
}

#[derive(Debug, Default)]
pub struct ScriptedInput {
    steps: Vec<ScriptStep>,
    step_index: usize,
    tick_in_step: u32,
    collector: InputCollector,
}

impl ScriptedInput {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, InputScriptError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let file: InputScriptFile =
            serde_path_to_error::deserialize(deserializer).map_err(|error| {
                InputScriptError::Parse {
                    path: error.path().to_string(),
                    source: error.into_inner(),
                }
            })?;
        Ok(Self::new(file.steps))
    }

    pub fn from_path(path: &Path) -> Result<Self, InputScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| InputScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn total_ticks(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| u64::from(step.ticks.max(1)))
            .sum()
    }
}

impl InputSource for ScriptedInput {
    fn next_snapshot(&mut self) -> Option<InputSnapshot> {
        let step = self.steps.get(self.step_index)?;

        if self.tick_in_step == 0 {
            for action in step.hold.iter().chain(step.press.iter()) {
                self.collector.key_down(*action);
            }
            self.collector.push_text(&step.text);
        }

        let snapshot = self.collector.snapshot_for_tick();

        if self.tick_in_step == 0 {
            for action in step.press.iter().filter(|action| !step.hold.contains(action)) {
                self.collector.key_up(*action);
            }
        }

        self.tick_in_step += 1;
        if self.tick_in_step >= step.ticks.max(1) {
            for action in &step.hold {
                self.collector.key_up(*action);
            }
            self.step_index += 1;
            self.tick_in_step = 0;
        }
        Some(snapshot)
    }
}
