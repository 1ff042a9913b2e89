use std::rc::Rc;

use engine::{
    CameraBounds, EntityId, InputSnapshot, PhysicsConfig, Scene, SceneCommand, SceneKey,
    SceneWorld, TimerHandle, TimerQueue,
};
use tracing::{debug, info, warn};

use crate::app::content::{
    ContentDatabase, ItemPlacement, MinigameConfig, NpcPlacement, SceneLayout,
};

use super::actor::{ActorState, AnimationKey, Facing};
use super::dialogue::DialogueController;
use super::minigame::{CenteringConfig, CenteringMinigame, DanceConfig, DanceMinigame};
use super::npc::NpcBehavior;
use super::quest::{Progress, SharedProgress};
use super::transition::SceneTransitionCoordinator;

pub(super) const PROMPT_OVERLAY: &str = "prompt";
pub(super) const REWARD_OVERLAY: &str = "reward";
pub(super) const CENTERING_OVERLAY: &str = "centering";
pub(super) const TERMINAL_OVERLAY: &str = "terminal";
pub(super) const REWARD_NOTICE_SECONDS: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SceneTimer {
    EntryDialogue,
    HideReward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PromptTarget {
    Npc(usize),
    Item(usize),
    Exit(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum AfterDialogue {
    GrantQuest { template: String },
}

#[derive(Debug)]
pub(super) struct NpcRuntime {
    pub(super) placement: NpcPlacement,
    pub(super) name: String,
    pub(super) actor: ActorState,
    pub(super) behavior: Option<NpcBehavior>,
    pub(super) present: bool,
}

#[derive(Debug)]
pub(super) struct ItemRuntime {
    pub(super) placement: ItemPlacement,
    pub(super) body: EntityId,
    pub(super) collected: bool,
}

#[derive(Debug)]
pub(super) enum MinigameRuntime {
    Dance {
        config: DanceConfig,
        game: DanceMinigame,
        partner: usize,
    },
    Centering {
        config: CenteringConfig,
        game: CenteringMinigame,
        desk: usize,
    },
}

#[derive(Debug)]
pub(super) struct SceneRuntime {
    pub(super) key: SceneKey,
    pub(super) layout: SceneLayout,
    pub(super) player: ActorState,
    pub(super) npcs: Vec<NpcRuntime>,
    pub(super) items: Vec<ItemRuntime>,
    pub(super) dialogue: DialogueController,
    pub(super) after_dialogue: Option<AfterDialogue>,
    pub(super) coordinator: SceneTransitionCoordinator,
    pub(super) timers: TimerQueue<SceneTimer>,
    pub(super) entry_timer: Option<TimerHandle>,
    pub(super) entry_deferred: bool,
    pub(super) reward_timer: Option<TimerHandle>,
    pub(super) minigame: Option<MinigameRuntime>,
    pub(super) prompt: Option<PromptTarget>,
}

impl SceneRuntime {
    pub(super) fn build(
        layout: &SceneLayout,
        content: &ContentDatabase,
        progress: &Progress,
        world: &mut SceneWorld,
    ) -> Self {
        let key = layout.key;
        world.set_physics(PhysicsConfig {
            ground_y: Some(layout.ground_y),
            world_width: Some(layout.world_width),
            ..PhysicsConfig::default()
        });
        for animation in AnimationKey::catalog() {
            world.register_animation(&animation.engine_id());
        }

        let player = ActorState::spawn(world, "player", layout.player_spawn, Facing::Right);
        let camera = world.camera_mut();
        camera.set_bounds(CameraBounds {
            min_x: 0.0,
            max_x: layout.world_width,
        });
        camera.center_on(layout.player_spawn);
        camera.follow(Some(player.body));

        let mut npcs = Vec::with_capacity(layout.npcs.len());
        for placement in &layout.npcs {
            let name = match content.npc(&placement.template) {
                Some(template) => template.name.clone(),
                None => {
                    warn!(scene = ?key, npc = %placement.id, "npc_template_missing");
                    placement.id.clone()
                }
            };
            let actor = ActorState::spawn(world, &placement.id, placement.position, Facing::Left);
            npcs.push(NpcRuntime {
                placement: placement.clone(),
                name,
                actor,
                behavior: placement.behavior.map(NpcBehavior::from_config),
                present: true,
            });
        }

        let items = layout
            .items
            .iter()
            .filter(|placement| !progress.collected_items.contains(&placement.id))
            .map(|placement| ItemRuntime {
                placement: placement.clone(),
                body: world.spawn_body(&placement.id, placement.position, false),
                collected: false,
            })
            .collect::<Vec<_>>();

        let minigame = build_minigame(layout, content, progress, &npcs);

        let mut timers = TimerQueue::new();
        let entry_timer = layout.entry_dialogue.as_ref().map(|entry| {
            timers.schedule_once(entry.delay_ms as f32 / 1000.0, SceneTimer::EntryDialogue)
        });

        info!(
            scene = ?key,
            npcs = npcs.len(),
            items = items.len(),
            exits = layout.exits.len(),
            minigame = minigame.is_some(),
            "scene_loaded"
        );

        Self {
            key,
            layout: layout.clone(),
            player,
            npcs,
            items,
            dialogue: DialogueController::new(),
            after_dialogue: None,
            coordinator: SceneTransitionCoordinator::new(key),
            timers,
            entry_timer,
            entry_deferred: false,
            reward_timer: None,
            minigame,
            prompt: None,
        }
    }

    pub(super) fn pending_timers(&self) -> usize {
        self.timers.pending_count()
            + self
                .npcs
                .iter()
                .filter_map(|npc| npc.behavior.as_ref())
                .map(NpcBehavior::pending_timers)
                .sum::<usize>()
    }

    /// Cancels every timer and removes every transient overlay. Safe to call
    /// more than once.
    pub(super) fn teardown(&mut self, world: &mut SceneWorld) -> usize {
        self.entry_timer = None;
        self.entry_deferred = false;
        self.reward_timer = None;
        let mut cancelled = self.timers.cancel_all();
        for npc in &mut self.npcs {
            if let Some(behavior) = npc.behavior.as_mut() {
                cancelled += behavior.pending_timers();
                behavior.teardown();
            }
        }
        if let Some(MinigameRuntime::Centering { game, .. }) = self.minigame.as_mut() {
            game.close();
        }
        self.dialogue.close(world);
        self.after_dialogue = None;
        for overlay in [
            PROMPT_OVERLAY,
            REWARD_OVERLAY,
            CENTERING_OVERLAY,
            TERMINAL_OVERLAY,
        ] {
            world.hide_overlay(overlay);
        }
        self.prompt = None;
        self.coordinator.reset();
        info!(scene = ?self.key, cancelled, "scene_teardown");
        cancelled
    }
}

fn build_minigame(
    layout: &SceneLayout,
    content: &ContentDatabase,
    progress: &Progress,
    npcs: &[NpcRuntime],
) -> Option<MinigameRuntime> {
    let config = layout.minigame.as_ref()?;
    let (npc_id, quest_id) = match config {
        MinigameConfig::Dance(config) => (&config.npc, &config.quest.id),
        MinigameConfig::Centering(config) => (&config.npc, &config.quest.id),
    };
    if progress
        .quests
        .get(quest_id)
        .is_some_and(|quest| quest.is_completed())
    {
        debug!(scene = ?layout.key, quest = %quest_id, "minigame_already_completed");
        return None;
    }
    let Some(index) = npcs.iter().position(|npc| &npc.placement.id == npc_id) else {
        warn!(scene = ?layout.key, npc = %npc_id, "minigame_npc_missing");
        return None;
    };

    match config {
        MinigameConfig::Dance(config) => Some(MinigameRuntime::Dance {
            config: config.clone(),
            game: DanceMinigame::new(config.required_seconds),
            partner: index,
        }),
        MinigameConfig::Centering(config) => {
            let Some(pattern) = content.commit_pattern(layout.key) else {
                warn!(scene = ?layout.key, "commit_pattern_missing");
                return None;
            };
            Some(MinigameRuntime::Centering {
                config: config.clone(),
                game: CenteringMinigame::new(config, pattern.clone()),
                desk: index,
            })
        }
    }
}

pub(crate) struct AdventureScene {
    key: SceneKey,
    content: Rc<ContentDatabase>,
    progress: SharedProgress,
    runtime: Option<SceneRuntime>,
}

impl AdventureScene {
    pub(super) fn new(
        key: SceneKey,
        content: Rc<ContentDatabase>,
        progress: SharedProgress,
    ) -> Self {
        Self {
            key,
            content,
            progress,
            runtime: None,
        }
    }
}

impl Scene for AdventureScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let Some(layout) = self.content.scene(self.key) else {
            warn!(scene = ?self.key, "scene_layout_missing");
            self.runtime = None;
            return;
        };
        let progress = self.progress.borrow();
        self.runtime = Some(SceneRuntime::build(layout, &self.content, &progress, world));
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let Some(runtime) = self.runtime.as_mut() else {
            return SceneCommand::None;
        };
        runtime.tick(fixed_dt_seconds, input, world, &self.content, &self.progress)
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if let Some(mut runtime) = self.runtime.take() {
            runtime.teardown(world);
        }
    }

    fn pause(&mut self, world: &mut SceneWorld) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.coordinator.settle();
            runtime.hide_prompt(world);
        }
    }

    fn resume(&mut self, _world: &mut SceneWorld) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.coordinator.settle();
        }
    }
}
