use engine::{
    InputAction, InputSnapshot, MusicHandoff, SceneCommand, SceneSwitch, SceneWorld, Vec2,
};
use tracing::{debug, info, warn};

use crate::app::content::{ContentDatabase, MinigameConfig, NpcTemplate};

use super::actor::{locomotion_animation, AnimationKey, Facing};
use super::dialogue::DialogueAdvance;
use super::minigame::{CenteringEvent, CenteringPhase, DanceEvent};
use super::npc::NpcEvent;
use super::proximity::{nearest_within, within_range};
use super::quest::{CompletionOutcome, Progress, QuestTemplate, Rewards, SharedProgress};
use super::scene::{
    AfterDialogue, MinigameRuntime, PromptTarget, SceneRuntime, SceneTimer, CENTERING_OVERLAY,
    PROMPT_OVERLAY, REWARD_NOTICE_SECONDS, REWARD_OVERLAY, TERMINAL_OVERLAY,
};
use super::transition::{TransitionRequest, TransitionRequestOutcome};

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Conversation {
    pub(super) lines: Vec<String>,
    pub(super) after: Option<AfterDialogue>,
    pub(super) rewards: Option<Rewards>,
}

struct MinigameFinish {
    quest: QuestTemplate,
    speaker: String,
    lines: Vec<String>,
}

impl SceneRuntime {
    /// One fixed tick. Order: pending switch, timers, actor sync, then the
    /// first of transition / dialogue / centering panel that owns the frame,
    /// otherwise movement, NPC AI, dance and interaction.
    pub(super) fn tick(
        &mut self,
        dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        content: &ContentDatabase,
        progress: &SharedProgress,
    ) -> SceneCommand {
        if let Some(switch) = self.poll_transition(world) {
            return SceneCommand::Switch(switch);
        }
        self.run_timers(dt_seconds, world);
        self.sync_actors(world);

        if self.coordinator.is_busy() {
            self.freeze(world);
            return SceneCommand::None;
        }
        if self.entry_deferred && !self.centering_open() && !self.dialogue.is_active() {
            self.start_entry_dialogue(world);
        }
        if self.dialogue.is_active() {
            self.freeze(world);
            if self.dialogue.handle_input(input, world) == DialogueAdvance::Finished {
                self.finish_dialogue(content, progress);
            }
            return SceneCommand::None;
        }
        if self.centering_open() {
            self.freeze(world);
            self.run_centering(input, world, progress);
            return SceneCommand::None;
        }

        self.player.set_lock(world, false);
        self.move_player(input, world);
        self.run_behaviors(dt_seconds, world, content);
        self.run_dance(dt_seconds, input, world, progress);
        self.run_interaction(input, world, content, progress);
        SceneCommand::None
    }

    fn poll_transition(&mut self, world: &mut SceneWorld) -> Option<SceneSwitch> {
        let mut switch = None;
        for direction in world.drain_fade_events() {
            if let Some(next) = self.coordinator.on_fade_complete(direction) {
                switch = Some(next);
            }
        }
        let switch = switch?;
        self.coordinator.mark_dispatched();
        Some(switch)
    }

    fn run_timers(&mut self, dt_seconds: f32, world: &mut SceneWorld) {
        for timer in self.timers.tick(dt_seconds) {
            match timer {
                SceneTimer::EntryDialogue => {
                    self.entry_timer = None;
                    if self.centering_open() || self.coordinator.is_busy() {
                        debug!(scene = ?self.key, "entry_dialogue_deferred");
                        self.entry_deferred = true;
                        continue;
                    }
                    self.start_entry_dialogue(world);
                }
                SceneTimer::HideReward => {
                    self.reward_timer = None;
                    world.hide_overlay(REWARD_OVERLAY);
                }
            }
        }
    }

    fn start_entry_dialogue(&mut self, world: &mut SceneWorld) {
        self.entry_deferred = false;
        let Some(entry) = self.layout.entry_dialogue.clone() else {
            return;
        };
        if !self.dialogue.start(world, &entry.speaker, entry.lines) {
            debug!(scene = ?self.key, "entry_dialogue_skipped");
        }
    }

    fn sync_actors(&mut self, world: &SceneWorld) {
        if !self.player.sync_from(world) {
            warn!(scene = ?self.key, "player_body_missing");
        }
        for npc in &mut self.npcs {
            let present = npc.actor.sync_from(world);
            if npc.present && !present {
                warn!(scene = ?self.key, npc = %npc.placement.id, "npc_body_missing");
            }
            npc.present = present;
        }
    }

    fn freeze(&mut self, world: &mut SceneWorld) {
        self.player.set_lock(world, true);
        for npc in self.npcs.iter_mut().filter(|npc| npc.present) {
            npc.actor.halt(world);
        }
        self.hide_prompt(world);
    }

    pub(super) fn hide_prompt(&mut self, world: &mut SceneWorld) {
        self.prompt = None;
        world.hide_overlay(PROMPT_OVERLAY);
    }

    fn finish_dialogue(&mut self, content: &ContentDatabase, progress: &SharedProgress) {
        let Some(after) = self.after_dialogue.take() else {
            return;
        };
        match after {
            AfterDialogue::GrantQuest { template } => {
                let Some(quest) = content.npc(&template).and_then(|npc| npc.quest.as_ref()) else {
                    warn!(scene = ?self.key, template = %template, "quest_template_missing");
                    return;
                };
                progress.borrow_mut().quests.grant(quest);
            }
        }
    }

    fn move_player(&mut self, input: &InputSnapshot, world: &mut SceneWorld) {
        let tuning = self.layout.player;
        let dancing = matches!(self.layout.minigame, Some(MinigameConfig::Dance(_)))
            && input.is_down(InputAction::Dance)
            && self.player.on_ground;
        if dancing {
            self.player.halt(world);
            self.player.play(world, AnimationKey::Dance);
            return;
        }

        let mut velocity = Vec2::new(0.0, self.player.velocity.y);
        if input.is_down(InputAction::MoveLeft) {
            velocity.x -= tuning.walk_speed;
        }
        if input.is_down(InputAction::MoveRight) {
            velocity.x += tuning.walk_speed;
        }
        let jumped = input.just_pressed(InputAction::Jump) && self.player.on_ground;
        if jumped {
            velocity.y = -tuning.jump_speed;
        }
        let facing = Facing::from_horizontal(velocity.x, self.player.facing);
        self.player.facing = facing;
        self.player.drive(world, velocity);
        let on_ground = self.player.on_ground && !jumped;
        self.player
            .play(world, locomotion_animation(velocity, on_ground, facing, false));
    }

    fn run_behaviors(
        &mut self,
        dt_seconds: f32,
        world: &mut SceneWorld,
        content: &ContentDatabase,
    ) {
        let player = self.player.position;
        let mut confronted = None;
        for (index, npc) in self.npcs.iter_mut().enumerate() {
            if !npc.present {
                continue;
            }
            let Some(behavior) = npc.behavior.as_mut() else {
                if npc.actor.animation.is_none() {
                    let facing = npc.actor.facing;
                    npc.actor.play(world, AnimationKey::Idle(facing));
                }
                continue;
            };
            let output = behavior.update(&npc.actor, player, dt_seconds);
            npc.actor.drive(world, output.velocity);
            npc.actor.play(world, output.animation);
            if output.event == Some(NpcEvent::Confront) {
                confronted = Some(index);
            }
        }

        if let Some(index) = confronted {
            let npc = &self.npcs[index];
            let lines = content
                .npc(&npc.placement.template)
                .map(|template| template.dialogues.clone())
                .unwrap_or_default();
            let speaker = npc.name.clone();
            self.dialogue.start(world, &speaker, lines);
        }
    }

    fn run_dance(
        &mut self,
        dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        progress: &SharedProgress,
    ) {
        let Some(MinigameRuntime::Dance {
            config,
            game,
            partner,
        }) = self.minigame.as_mut()
        else {
            return;
        };
        if game.is_complete() {
            return;
        }
        let Some(partner) = self.npcs.get_mut(*partner) else {
            return;
        };
        let condition = input.is_down(InputAction::Dance)
            && within_range(self.player.position, partner.actor.position, config.radius);

        let finish = match game.update(condition, dt_seconds) {
            Some(DanceEvent::Started) => {
                partner.actor.play(world, AnimationKey::Dance);
                None
            }
            Some(DanceEvent::Paused) => {
                let facing = partner.actor.facing;
                partner.actor.play(world, AnimationKey::Idle(facing));
                None
            }
            Some(DanceEvent::Completed) => Some(MinigameFinish {
                quest: config.quest.clone(),
                speaker: partner.name.clone(),
                lines: config.completion_dialogue.clone(),
            }),
            None => None,
        };
        if let Some(finish) = finish {
            self.finish_minigame(world, progress, finish);
        }
    }

    fn centering_open(&self) -> bool {
        matches!(
            &self.minigame,
            Some(MinigameRuntime::Centering { game, .. }) if game.is_open()
        )
    }

    fn run_centering(
        &mut self,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        progress: &SharedProgress,
    ) {
        let Some(MinigameRuntime::Centering { config, game, desk }) = self.minigame.as_mut() else {
            return;
        };

        let mut finish = None;
        for event in game.update(input) {
            match event {
                CenteringEvent::Terminal(outcome) => {
                    debug!(outcome = ?outcome, "terminal_outcome");
                }
                CenteringEvent::Done => {
                    finish = Some(MinigameFinish {
                        quest: config.quest.clone(),
                        speaker: self
                            .npcs
                            .get(*desk)
                            .map(|npc| npc.name.clone())
                            .unwrap_or_default(),
                        lines: config.completion_dialogue.clone(),
                    });
                }
                _ => {}
            }
        }

        if game.is_open() {
            world.show_overlay(CENTERING_OVERLAY, &game.render_panel());
            if matches!(
                game.phase(),
                CenteringPhase::TerminalAdd | CenteringPhase::TerminalCommit
            ) {
                world.show_overlay(TERMINAL_OVERLAY, &game.terminal().render());
            }
        } else {
            world.hide_overlay(CENTERING_OVERLAY);
            world.hide_overlay(TERMINAL_OVERLAY);
        }

        if let Some(finish) = finish {
            self.finish_minigame(world, progress, finish);
        }
    }

    fn finish_minigame(
        &mut self,
        world: &mut SceneWorld,
        progress: &SharedProgress,
        finish: MinigameFinish,
    ) {
        let outcome = progress.borrow_mut().settle(&finish.quest);
        match outcome {
            CompletionOutcome::Rewarded(rewards) => self.show_reward(world, &rewards),
            other => debug!(quest = %finish.quest.id, outcome = ?other, "minigame_reward_skipped"),
        }
        self.dialogue.start(world, &finish.speaker, finish.lines);
    }

    fn show_reward(&mut self, world: &mut SceneWorld, rewards: &Rewards) {
        world.show_overlay(REWARD_OVERLAY, &rewards.summary());
        self.timers.cancel_slot(&mut self.reward_timer);
        self.reward_timer = Some(
            self.timers
                .schedule_once(REWARD_NOTICE_SECONDS, SceneTimer::HideReward),
        );
    }

    fn prompt_target(&self, progress: &Progress) -> Option<PromptTarget> {
        let origin = self.player.position;
        let npcs = self
            .npcs
            .iter()
            .enumerate()
            .filter(|(_, npc)| npc.present)
            .map(|(index, npc)| {
                (
                    PromptTarget::Npc(index),
                    npc.actor.position,
                    npc.placement.talk_radius,
                )
            });
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                !item.collected && progress.quests.is_needed(&item.placement.objective)
            })
            .map(|(index, item)| {
                (
                    PromptTarget::Item(index),
                    item.placement.position,
                    item.placement.radius,
                )
            });
        let exits = self
            .layout
            .exits
            .iter()
            .enumerate()
            .map(|(index, exit)| (PromptTarget::Exit(index), exit.position, exit.radius));
        nearest_within(origin, npcs.chain(items).chain(exits))
    }

    fn prompt_text(&self, target: PromptTarget) -> Option<String> {
        match target {
            PromptTarget::Npc(index) => self
                .npcs
                .get(index)
                .map(|npc| format!("[E] Talk to {}", npc.name)),
            PromptTarget::Item(index) => self
                .items
                .get(index)
                .map(|item| format!("[E] Pick up {}", item.placement.id)),
            PromptTarget::Exit(index) => self
                .layout
                .exits
                .get(index)
                .map(|exit| exit.prompt.clone()),
        }
    }

    fn run_interaction(
        &mut self,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        content: &ContentDatabase,
        progress: &SharedProgress,
    ) {
        let target = self.prompt_target(&progress.borrow());
        if target != self.prompt {
            match target.and_then(|target| self.prompt_text(target)) {
                Some(text) => world.show_overlay(PROMPT_OVERLAY, &text),
                None => {
                    world.hide_overlay(PROMPT_OVERLAY);
                }
            }
            self.prompt = target;
        }
        if !input.just_pressed(InputAction::Interact) {
            return;
        }
        match target {
            Some(PromptTarget::Npc(index)) => self.talk_to(index, world, content, progress),
            Some(PromptTarget::Item(index)) => self.pick_up(index, world, progress),
            Some(PromptTarget::Exit(index)) => self.use_exit(index, world, content),
            None => {}
        }
    }

    fn talk_to(
        &mut self,
        index: usize,
        world: &mut SceneWorld,
        content: &ContentDatabase,
        progress: &SharedProgress,
    ) {
        if let Some(MinigameRuntime::Centering { game, desk, .. }) = self.minigame.as_mut() {
            if *desk == index && game.open() {
                world.show_overlay(CENTERING_OVERLAY, &game.render_panel());
                self.hide_prompt(world);
                self.player.set_lock(world, true);
                return;
            }
        }

        let player = self.player.position;
        let Some(npc) = self.npcs.get_mut(index) else {
            return;
        };
        let Some(template) = content.npc(&npc.placement.template) else {
            warn!(scene = ?self.key, npc = %npc.placement.id, "npc_template_missing");
            return;
        };
        let facing = Facing::toward(npc.actor.position, player, npc.actor.facing);
        npc.actor.face(world, facing);
        let speaker = npc.name.clone();
        let template_id = npc.placement.template.clone();

        let conversation = plan_conversation(&template_id, template, &mut progress.borrow_mut());
        if let Some(rewards) = &conversation.rewards {
            self.show_reward(world, rewards);
        }
        self.hide_prompt(world);
        let started = self.dialogue.start(world, &speaker, conversation.lines);
        if started {
            self.after_dialogue = conversation.after;
        } else if let Some(after) = conversation.after {
            self.after_dialogue = Some(after);
            self.finish_dialogue(content, progress);
        }
    }

    fn pick_up(&mut self, index: usize, world: &mut SceneWorld, progress: &SharedProgress) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        if item.collected {
            return;
        }
        let mut progress = progress.borrow_mut();
        let advanced = progress
            .quests
            .record_everywhere(&item.placement.objective, 1);
        if advanced == 0 {
            debug!(item = %item.placement.id, "item_not_needed");
            return;
        }
        progress.collected_items.insert(item.placement.id.clone());
        item.collected = true;
        world.despawn(item.body);
        info!(
            item = %item.placement.id,
            objective = %item.placement.objective,
            quests = advanced,
            "item_collected"
        );
        self.hide_prompt(world);
    }

    fn use_exit(&mut self, index: usize, world: &mut SceneWorld, content: &ContentDatabase) {
        let Some(exit) = self.layout.exits.get(index) else {
            return;
        };
        let music = content
            .scene(exit.target)
            .and_then(|layout| layout.music.clone())
            .map_or(MusicHandoff::Keep, |track| MusicHandoff::Play { track });
        let request = TransitionRequest {
            target: exit.target,
            mode: exit.mode,
            fade_out_ms: exit.fade_out_ms,
            fade_in_ms: exit.fade_in_ms,
            music,
        };
        if self.coordinator.request_transition(world, request) == TransitionRequestOutcome::Started
        {
            self.freeze(world);
        }
    }
}

/// Decides what an NPC says and what happens to its quest, applying a due
/// reward on the spot.
pub(super) fn plan_conversation(
    template_id: &str,
    template: &NpcTemplate,
    progress: &mut Progress,
) -> Conversation {
    let plain = |lines: Vec<String>| Conversation {
        lines,
        after: None,
        rewards: None,
    };
    let Some(quest_template) = &template.quest else {
        return plain(template.dialogues.clone());
    };
    let Progress { stats, quests, .. } = progress;
    let Some(quest) = quests.get_mut(&quest_template.id) else {
        return Conversation {
            lines: template.dialogues.clone(),
            after: Some(AfterDialogue::GrantQuest {
                template: template_id.to_string(),
            }),
            rewards: None,
        };
    };
    if quest.is_completed() {
        let lines = if template.completion_dialogues.is_empty() {
            &template.dialogues
        } else {
            &template.completion_dialogues
        };
        return plain(last_line(lines));
    }
    match quest.complete_and_reward(stats) {
        CompletionOutcome::Rewarded(rewards) => Conversation {
            lines: template.completion_dialogues.clone(),
            after: None,
            rewards: Some(rewards),
        },
        CompletionOutcome::ObjectivesOutstanding | CompletionOutcome::AlreadyCompleted => {
            plain(last_line(&template.dialogues))
        }
    }
}

fn last_line(lines: &[String]) -> Vec<String> {
    lines.last().cloned().into_iter().collect()
}
