use engine::{TimerHandle, TimerQueue, Vec2};
use serde::Deserialize;
use tracing::{debug, info};

use super::actor::{locomotion_animation, ActorState, AnimationKey, Facing};
use super::proximity::within_range;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct FollowConfig {
    pub(crate) follow_distance: f32,
    pub(crate) run_distance: f32,
    pub(crate) walk_speed: f32,
    pub(crate) run_speed: f32,
    /// Jump when the player is this much higher than the follower.
    #[serde(default)]
    pub(crate) jump_trigger_height: Option<f32>,
    #[serde(default = "default_jump_speed")]
    pub(crate) jump_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct FleeConfig {
    pub(crate) trigger_x: f32,
    pub(crate) flee_speed: f32,
    pub(crate) safety_distance: f32,
    pub(crate) confront_distance: f32,
    pub(crate) confront_delay_ms: u32,
    pub(crate) emote_interval_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct PatrolConfig {
    pub(crate) face_radius: f32,
    #[serde(default = "default_rest_facing")]
    pub(crate) rest_facing: Facing,
}

fn default_jump_speed() -> f32 {
    380.0
}

fn default_rest_facing() -> Facing {
    Facing::Left
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum BehaviorConfig {
    Follow(FollowConfig),
    FleeThenConfront(FleeConfig),
    PatrolIdle(PatrolConfig),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct BehaviorOutput {
    pub(super) velocity: Vec2,
    pub(super) animation: AnimationKey,
    pub(super) event: Option<NpcEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NpcEvent {
    Confront,
}

#[derive(Debug, Clone)]
pub(super) struct FollowBehavior {
    config: FollowConfig,
}

impl FollowBehavior {
    fn update(&self, actor: &ActorState, player: Vec2) -> BehaviorOutput {
        let config = self.config;
        let distance = actor.position.distance(player);
        let mut velocity = Vec2::new(0.0, actor.velocity.y);
        let mut running = false;

        if distance > config.follow_distance {
            running = distance > config.run_distance;
            let speed = if running {
                config.run_speed
            } else {
                config.walk_speed
            };
            let dx = player.x - actor.position.x;
            if dx != 0.0 {
                velocity.x = dx.signum() * speed;
            }

            let player_above = actor.position.y - player.y;
            if let Some(trigger) = config.jump_trigger_height {
                if actor.on_ground && player_above > trigger {
                    velocity.y = -config.jump_speed;
                }
            }
        }

        let on_ground = actor.on_ground && velocity.y >= 0.0;
        BehaviorOutput {
            velocity,
            animation: locomotion_animation(velocity, on_ground, actor.facing, running),
            event: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FleeState {
    Waiting,
    Running,
    Dialogue,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FleeTimer {
    Settle,
    ToggleEmote,
}

/// Runs from the player, then turns around and talks once caught.
///
/// Owns its timers so that tearing the NPC down cancels them.
#[derive(Debug, Clone)]
pub(super) struct FleeThenConfront {
    config: FleeConfig,
    state: FleeState,
    timers: TimerQueue<FleeTimer>,
    settle_timer: Option<TimerHandle>,
    emote_timer: Option<TimerHandle>,
    emoting: bool,
}

impl FleeThenConfront {
    fn new(config: FleeConfig) -> Self {
        Self {
            config,
            state: FleeState::Waiting,
            timers: TimerQueue::new(),
            settle_timer: None,
            emote_timer: None,
            emoting: false,
        }
    }

    pub(super) fn state(&self) -> FleeState {
        self.state
    }

    fn update(&mut self, actor: &ActorState, player: Vec2, dt_seconds: f32) -> BehaviorOutput {
        for timer in self.timers.tick(dt_seconds) {
            match timer {
                FleeTimer::Settle => {
                    self.settle_timer = None;
                    self.state = FleeState::Idle;
                    let interval = self.config.emote_interval_ms as f32 / 1000.0;
                    self.emote_timer = Some(
                        self.timers
                            .schedule_repeating(interval, FleeTimer::ToggleEmote),
                    );
                    info!("runner_settled");
                }
                FleeTimer::ToggleEmote => self.emoting = !self.emoting,
            }
        }

        let config = self.config;
        let standing = Vec2::new(0.0, actor.velocity.y);
        let facing_player = Facing::toward(actor.position, player, actor.facing);
        let mut output = BehaviorOutput {
            velocity: standing,
            animation: AnimationKey::Idle(actor.facing),
            event: None,
        };

        match self.state {
            FleeState::Waiting => {
                if player.x >= config.trigger_x {
                    self.state = FleeState::Running;
                    info!(trigger_x = config.trigger_x, "runner_fleeing");
                }
            }
            FleeState::Running => {
                if within_range(actor.position, player, config.confront_distance) {
                    self.state = FleeState::Dialogue;
                    let delay = config.confront_delay_ms as f32 / 1000.0;
                    self.settle_timer = Some(self.timers.schedule_once(delay, FleeTimer::Settle));
                    output.animation = AnimationKey::Idle(facing_player);
                    output.event = Some(NpcEvent::Confront);
                    info!("runner_confronts_player");
                } else if !within_range(actor.position, player, config.safety_distance) {
                    output.animation = AnimationKey::Idle(actor.facing);
                } else {
                    let away = actor.position.x - player.x;
                    let direction = if away < 0.0 { -1.0 } else { 1.0 };
                    output.velocity.x = direction * config.flee_speed;
                    output.animation =
                        locomotion_animation(output.velocity, actor.on_ground, actor.facing, true);
                }
            }
            FleeState::Dialogue => {
                output.animation = AnimationKey::Idle(facing_player);
            }
            FleeState::Idle => {
                output.animation = if self.emoting {
                    AnimationKey::Emote
                } else {
                    AnimationKey::Idle(facing_player)
                };
            }
        }
        output
    }

    fn teardown(&mut self) {
        self.timers.cancel_slot(&mut self.settle_timer);
        self.timers.cancel_slot(&mut self.emote_timer);
        let dropped = self.timers.cancel_all();
        if dropped > 0 {
            debug!(dropped, "runner_timers_dropped");
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct PatrolIdle {
    config: PatrolConfig,
}

impl PatrolIdle {
    fn update(&self, actor: &ActorState, player: Vec2) -> BehaviorOutput {
        let facing = if within_range(actor.position, player, self.config.face_radius) {
            Facing::toward(actor.position, player, self.config.rest_facing)
        } else {
            self.config.rest_facing
        };
        BehaviorOutput {
            velocity: Vec2::new(0.0, actor.velocity.y),
            animation: AnimationKey::Idle(facing),
            event: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) enum NpcBehavior {
    Follow(FollowBehavior),
    FleeThenConfront(FleeThenConfront),
    PatrolIdle(PatrolIdle),
}

impl NpcBehavior {
    pub(super) fn from_config(config: BehaviorConfig) -> Self {
        match config {
            BehaviorConfig::Follow(config) => Self::Follow(FollowBehavior { config }),
            BehaviorConfig::FleeThenConfront(config) => {
                Self::FleeThenConfront(FleeThenConfront::new(config))
            }
            BehaviorConfig::PatrolIdle(config) => Self::PatrolIdle(PatrolIdle { config }),
        }
    }

    pub(super) fn update(
        &mut self,
        actor: &ActorState,
        player: Vec2,
        dt_seconds: f32,
    ) -> BehaviorOutput {
        match self {
            Self::Follow(behavior) => behavior.update(actor, player),
            Self::FleeThenConfront(behavior) => behavior.update(actor, player, dt_seconds),
            Self::PatrolIdle(behavior) => behavior.update(actor, player),
        }
    }

    pub(super) fn teardown(&mut self) {
        if let Self::FleeThenConfront(behavior) = self {
            behavior.teardown();
        }
    }

    pub(super) fn pending_timers(&self) -> usize {
        match self {
            Self::FleeThenConfront(behavior) => behavior.timers.pending_count(),
            Self::Follow(_) | Self::PatrolIdle(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::EntityId;

    const DT: f32 = 1.0 / 60.0;

    fn actor_at(x: f32) -> ActorState {
        ActorState {
            body: EntityId(1),
            position: Vec2::new(x, 400.0),
            velocity: Vec2::ZERO,
            on_ground: true,
            facing: Facing::Left,
            animation: None,
            movement_lock: false,
        }
    }

    fn follow() -> NpcBehavior {
        NpcBehavior::from_config(BehaviorConfig::Follow(FollowConfig {
            follow_distance: 60.0,
            run_distance: 200.0,
            walk_speed: 90.0,
            run_speed: 180.0,
            jump_trigger_height: Some(40.0),
            jump_speed: 380.0,
        }))
    }

    fn flee_config() -> FleeConfig {
        FleeConfig {
            trigger_x: 300.0,
            flee_speed: 120.0,
            safety_distance: 250.0,
            confront_distance: 40.0,
            confront_delay_ms: 1000,
            emote_interval_ms: 500,
        }
    }

    #[test]
    fn follower_idles_inside_follow_distance() {
        let mut behavior = follow();
        let output = behavior.update(&actor_at(100.0), Vec2::new(140.0, 400.0), DT);
        assert_eq!(output.velocity.x, 0.0);
        assert_eq!(output.animation, AnimationKey::Idle(Facing::Left));
    }

    #[test]
    fn follower_walks_then_runs_with_distance() {
        let mut behavior = follow();
        let walk = behavior.update(&actor_at(100.0), Vec2::new(250.0, 400.0), DT);
        assert_eq!(walk.velocity.x, 90.0);
        assert_eq!(walk.animation, AnimationKey::Walk(Facing::Right));

        let run = behavior.update(&actor_at(100.0), Vec2::new(-200.0, 400.0), DT);
        assert_eq!(run.velocity.x, -180.0);
        assert_eq!(run.animation, AnimationKey::Run(Facing::Left));
    }

    #[test]
    fn follower_jumps_when_player_is_above() {
        let mut behavior = follow();
        let output = behavior.update(&actor_at(100.0), Vec2::new(200.0, 300.0), DT);
        assert_eq!(output.velocity.y, -380.0);
        assert_eq!(output.animation, AnimationKey::Jump(Facing::Right));

        let mut airborne = actor_at(100.0);
        airborne.on_ground = false;
        let output = behavior.update(&airborne, Vec2::new(200.0, 300.0), DT);
        assert_eq!(output.velocity.y, 0.0);
    }

    #[test]
    fn patrol_faces_player_only_inside_face_radius() {
        let mut behavior = NpcBehavior::from_config(BehaviorConfig::PatrolIdle(PatrolConfig {
            face_radius: 150.0,
            rest_facing: Facing::Left,
        }));
        let near = behavior.update(&actor_at(500.0), Vec2::new(600.0, 400.0), DT);
        assert_eq!(near.animation, AnimationKey::Idle(Facing::Right));
        let far = behavior.update(&actor_at(500.0), Vec2::new(900.0, 400.0), DT);
        assert_eq!(far.animation, AnimationKey::Idle(Facing::Left));
        assert_eq!(far.velocity.x, 0.0);
    }

    #[test]
    fn runner_waits_for_the_trigger_line() {
        let mut runner = FleeThenConfront::new(flee_config());
        runner.update(&actor_at(400.0), Vec2::new(100.0, 400.0), DT);
        assert_eq!(runner.state(), FleeState::Waiting);
        runner.update(&actor_at(400.0), Vec2::new(300.0, 400.0), DT);
        assert_eq!(runner.state(), FleeState::Running);
    }

    #[test]
    fn runner_flees_inside_safety_and_rests_outside() {
        let mut runner = FleeThenConfront::new(flee_config());
        runner.update(&actor_at(400.0), Vec2::new(300.0, 400.0), DT);

        let fleeing = runner.update(&actor_at(400.0), Vec2::new(300.0, 400.0), DT);
        assert_eq!(fleeing.velocity.x, 120.0);
        assert_eq!(fleeing.animation, AnimationKey::Run(Facing::Right));

        let resting = runner.update(&actor_at(700.0), Vec2::new(300.0, 400.0), DT);
        assert_eq!(resting.velocity.x, 0.0);
        assert_eq!(runner.state(), FleeState::Running);
    }

    #[test]
    fn runner_confronts_once_then_settles_into_emote_cycle() {
        let mut runner = FleeThenConfront::new(flee_config());
        runner.update(&actor_at(400.0), Vec2::new(300.0, 400.0), DT);

        let caught = runner.update(&actor_at(400.0), Vec2::new(370.0, 400.0), DT);
        assert_eq!(caught.event, Some(NpcEvent::Confront));
        assert_eq!(caught.animation, AnimationKey::Idle(Facing::Left));
        assert_eq!(runner.state(), FleeState::Dialogue);

        let again = runner.update(&actor_at(400.0), Vec2::new(370.0, 400.0), DT);
        assert_eq!(again.event, None);

        runner.update(&actor_at(400.0), Vec2::new(370.0, 400.0), 1.0);
        assert_eq!(runner.state(), FleeState::Idle);

        let emote = runner.update(&actor_at(400.0), Vec2::new(370.0, 400.0), 0.5);
        assert_eq!(emote.animation, AnimationKey::Emote);
        let idle = runner.update(&actor_at(400.0), Vec2::new(370.0, 400.0), 0.5);
        assert_eq!(idle.animation, AnimationKey::Idle(Facing::Left));
    }

    #[test]
    fn teardown_cancels_runner_timers() {
        let mut behavior = NpcBehavior::FleeThenConfront(FleeThenConfront::new(flee_config()));
        behavior.update(&actor_at(400.0), Vec2::new(300.0, 400.0), DT);
        behavior.update(&actor_at(400.0), Vec2::new(380.0, 400.0), DT);
        assert_eq!(behavior.pending_timers(), 1);
        behavior.teardown();
        assert_eq!(behavior.pending_timers(), 0);
    }
}
