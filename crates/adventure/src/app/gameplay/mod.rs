mod actor;
mod dialogue;
mod minigame;
mod npc;
mod proximity;
mod quest;
mod scene;
mod systems;
mod transition;

use std::rc::Rc;

use engine::{Scene, SceneKey};

use super::content::ContentDatabase;

pub(crate) use dialogue::DialogueLines;
pub(crate) use minigame::{CenteringConfig, DanceConfig};
pub(crate) use npc::BehaviorConfig;
pub(crate) use quest::{ObjectiveSpec, QuestTemplate, SharedProgress};
pub(crate) use scene::AdventureScene;
pub(crate) use transition::DEFAULT_FADE_MS;

pub(crate) fn build_scenes(
    content: &Rc<ContentDatabase>,
    progress: &SharedProgress,
) -> Vec<(SceneKey, Box<dyn Scene>)> {
    content
        .scenes()
        .iter()
        .map(|layout| {
            let scene: Box<dyn Scene> = Box::new(AdventureScene::new(
                layout.key,
                Rc::clone(content),
                Rc::clone(progress),
            ));
            (layout.key, scene)
        })
        .collect()
}
