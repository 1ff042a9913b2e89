use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{SceneKey, SwitchMode, Vec2};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::gameplay::{
    BehaviorConfig, CenteringConfig, DanceConfig, DialogueLines, ObjectiveSpec, QuestTemplate,
    DEFAULT_FADE_MS,
};

pub(crate) const WORLD_FILE_NAME: &str = "world.json";

#[derive(Debug, Error)]
pub(crate) enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid content at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("scene {0:?} is defined more than once")]
    DuplicateScene(SceneKey),
    #[error("start scene {0:?} has no layout")]
    MissingStartScene(SceneKey),
    #[error("exit {exit} in scene {scene:?} points at unknown scene {target:?}")]
    UnknownExitTarget {
        scene: SceneKey,
        exit: String,
        target: SceneKey,
    },
    #[error("npc {npc} in scene {scene:?} uses unknown template {template}")]
    UnknownTemplate {
        scene: SceneKey,
        npc: String,
        template: String,
    },
    #[error("minigame in scene {scene:?} names unknown npc {npc}")]
    UnknownMinigameNpc { scene: SceneKey, npc: String },
    #[error("objective {objective} of quest {quest} has a zero target")]
    ZeroObjectiveTarget { quest: String, objective: String },
    #[error("invalid commit pattern in scene {scene:?}: {source}")]
    CommitPattern {
        scene: SceneKey,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NpcTemplate {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) dialogues: Vec<String>,
    #[serde(default)]
    pub(crate) quest: Option<QuestTemplate>,
    #[serde(default)]
    pub(crate) completion_dialogues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntryDialogue {
    pub(crate) speaker: String,
    pub(crate) lines: DialogueLines,
    #[serde(default)]
    pub(crate) delay_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlayerTuning {
    #[serde(default = "default_walk_speed")]
    pub(crate) walk_speed: f32,
    #[serde(default = "default_jump_speed")]
    pub(crate) jump_speed: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            walk_speed: default_walk_speed(),
            jump_speed: default_jump_speed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NpcPlacement {
    pub(crate) id: String,
    pub(crate) template: String,
    pub(crate) position: Vec2,
    #[serde(default = "default_talk_radius")]
    pub(crate) talk_radius: f32,
    #[serde(default)]
    pub(crate) behavior: Option<BehaviorConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ItemPlacement {
    pub(crate) id: String,
    pub(crate) objective: String,
    pub(crate) position: Vec2,
    #[serde(default = "default_pickup_radius")]
    pub(crate) radius: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExitPlacement {
    pub(crate) id: String,
    pub(crate) position: Vec2,
    #[serde(default = "default_exit_radius")]
    pub(crate) radius: f32,
    pub(crate) prompt: String,
    pub(crate) target: SceneKey,
    pub(crate) mode: SwitchMode,
    #[serde(default = "default_fade_ms")]
    pub(crate) fade_out_ms: u32,
    #[serde(default = "default_fade_ms")]
    pub(crate) fade_in_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum MinigameConfig {
    Dance(DanceConfig),
    Centering(CenteringConfig),
}

impl MinigameConfig {
    fn npc(&self) -> &str {
        match self {
            Self::Dance(config) => &config.npc,
            Self::Centering(config) => &config.npc,
        }
    }

    fn quest(&self) -> &QuestTemplate {
        match self {
            Self::Dance(config) => &config.quest,
            Self::Centering(config) => &config.quest,
        }
    }
}

/// Layout constants of one scene. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SceneLayout {
    pub(crate) key: SceneKey,
    #[serde(default)]
    pub(crate) music: Option<String>,
    pub(crate) ground_y: f32,
    pub(crate) world_width: f32,
    pub(crate) player_spawn: Vec2,
    #[serde(default)]
    pub(crate) player: PlayerTuning,
    #[serde(default)]
    pub(crate) entry_dialogue: Option<EntryDialogue>,
    #[serde(default)]
    pub(crate) npcs: Vec<NpcPlacement>,
    #[serde(default)]
    pub(crate) items: Vec<ItemPlacement>,
    #[serde(default)]
    pub(crate) exits: Vec<ExitPlacement>,
    #[serde(default)]
    pub(crate) minigame: Option<MinigameConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorldFile {
    start_scene: SceneKey,
    npcs: BTreeMap<String, NpcTemplate>,
    scenes: Vec<SceneLayout>,
}

fn default_walk_speed() -> f32 {
    160.0
}

fn default_jump_speed() -> f32 {
    420.0
}

fn default_talk_radius() -> f32 {
    60.0
}

fn default_pickup_radius() -> f32 {
    40.0
}

fn default_exit_radius() -> f32 {
    50.0
}

fn default_fade_ms() -> u32 {
    DEFAULT_FADE_MS
}

/// Validated static content: NPC templates and scene layouts.
#[derive(Debug, Clone)]
pub(crate) struct ContentDatabase {
    start_scene: SceneKey,
    npcs: BTreeMap<String, NpcTemplate>,
    scenes: Vec<SceneLayout>,
    commit_patterns: BTreeMap<SceneKey, Regex>,
}

impl ContentDatabase {
    pub(crate) fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let path = content_dir.join(WORLD_FILE_NAME);
        let raw = fs::read_to_string(&path).map_err(|source| ContentError::Read {
            path: path.clone(),
            source,
        })?;
        let database = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            scenes = database.scenes.len(),
            npc_templates = database.npcs.len(),
            "content_loaded"
        );
        Ok(database)
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, ContentError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let file: WorldFile = serde_path_to_error::deserialize(deserializer).map_err(|error| {
            ContentError::Parse {
                path: error.path().to_string(),
                source: error.into_inner(),
            }
        })?;
        Self::validate(file)
    }

    fn validate(file: WorldFile) -> Result<Self, ContentError> {
        let mut seen = Vec::new();
        for layout in &file.scenes {
            if seen.contains(&layout.key) {
                return Err(ContentError::DuplicateScene(layout.key));
            }
            seen.push(layout.key);
        }
        if !seen.contains(&file.start_scene) {
            return Err(ContentError::MissingStartScene(file.start_scene));
        }

        for template in file.npcs.values() {
            if let Some(quest) = &template.quest {
                check_objectives(quest)?;
            }
        }

        let mut commit_patterns = BTreeMap::new();
        for layout in &file.scenes {
            for exit in &layout.exits {
                if !seen.contains(&exit.target) {
                    return Err(ContentError::UnknownExitTarget {
                        scene: layout.key,
                        exit: exit.id.clone(),
                        target: exit.target,
                    });
                }
            }
            for npc in &layout.npcs {
                if !file.npcs.contains_key(&npc.template) {
                    return Err(ContentError::UnknownTemplate {
                        scene: layout.key,
                        npc: npc.id.clone(),
                        template: npc.template.clone(),
                    });
                }
            }
            if let Some(minigame) = &layout.minigame {
                if !layout.npcs.iter().any(|npc| npc.id == minigame.npc()) {
                    return Err(ContentError::UnknownMinigameNpc {
                        scene: layout.key,
                        npc: minigame.npc().to_string(),
                    });
                }
                check_objectives(minigame.quest())?;
                if let MinigameConfig::Centering(config) = minigame {
                    let pattern = Regex::new(&config.commit_pattern).map_err(|source| {
                        ContentError::CommitPattern {
                            scene: layout.key,
                            source,
                        }
                    })?;
                    commit_patterns.insert(layout.key, pattern);
                }
            }
        }

        Ok(Self {
            start_scene: file.start_scene,
            npcs: file.npcs,
            scenes: file.scenes,
            commit_patterns,
        })
    }

    pub(crate) fn start_scene(&self) -> SceneKey {
        self.start_scene
    }

    pub(crate) fn npc(&self, template: &str) -> Option<&NpcTemplate> {
        self.npcs.get(template)
    }

    pub(crate) fn scene(&self, key: SceneKey) -> Option<&SceneLayout> {
        self.scenes.iter().find(|layout| layout.key == key)
    }

    /// Scene layouts in file order.
    pub(crate) fn scenes(&self) -> &[SceneLayout] {
        &self.scenes
    }

    pub(crate) fn commit_pattern(&self, key: SceneKey) -> Option<&Regex> {
        self.commit_patterns.get(&key)
    }
}

fn check_objectives(quest: &QuestTemplate) -> Result<(), ContentError> {
    for (key, spec) in &quest.objectives {
        if matches!(spec, ObjectiveSpec::Counter { target: 0, .. }) {
            return Err(ContentError::ZeroObjectiveTarget {
                quest: quest.id.clone(),
                objective: key.clone(),
            });
        }
    }
    Ok(())
}
