use engine::{EntityId, SceneWorld, Vec2};
use serde::Deserialize;

/// Horizontal speed at or below which a grounded actor counts as standing still.
pub(super) const IDLE_SPEED_EPSILON: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub(super) fn from_horizontal(dx: f32, fallback: Facing) -> Facing {
        if dx < 0.0 {
            Self::Left
        } else if dx > 0.0 {
            Self::Right
        } else {
            fallback
        }
    }

    pub(super) fn toward(from: Vec2, to: Vec2, fallback: Facing) -> Facing {
        Self::from_horizontal(to.x - from.x, fallback)
    }
}

/// Direction x locomotion state, mapped to engine animation ids only in
/// [`AnimationKey::engine_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AnimationKey {
    Idle(Facing),
    Walk(Facing),
    Run(Facing),
    Jump(Facing),
    Emote,
    Dance,
}

const SIDE_FACINGS: [Facing; 2] = [Facing::Left, Facing::Right];

impl AnimationKey {
    pub(super) fn engine_id(self) -> String {
        match self {
            Self::Idle(facing) => format!("idle_{}", facing.as_str()),
            Self::Walk(facing) => format!("walk_{}", facing.as_str()),
            Self::Run(facing) => format!("run_{}", facing.as_str()),
            Self::Jump(facing) => format!("jump_{}", facing.as_str()),
            Self::Emote => "emote".to_string(),
            Self::Dance => "dance".to_string(),
        }
    }

    pub(super) fn catalog() -> Vec<AnimationKey> {
        let mut keys = Vec::new();
        for facing in SIDE_FACINGS {
            keys.push(Self::Idle(facing));
            keys.push(Self::Walk(facing));
            keys.push(Self::Run(facing));
            keys.push(Self::Jump(facing));
        }
        keys.push(Self::Emote);
        keys.push(Self::Dance);
        keys
    }
}

/// Picks the locomotion animation for a horizontal velocity.
///
/// Airborne actors always get the jump variant; grounded actors whose speed is
/// within [`IDLE_SPEED_EPSILON`] fall back to idle so that a body settling at
/// rest does not flicker between idle and walk.
pub(super) fn locomotion_animation(
    velocity: Vec2,
    on_ground: bool,
    facing: Facing,
    running: bool,
) -> AnimationKey {
    let facing = if velocity.x.abs() > IDLE_SPEED_EPSILON {
        Facing::from_horizontal(velocity.x, facing)
    } else {
        facing
    };
    if !on_ground {
        return AnimationKey::Jump(facing);
    }
    if velocity.x.abs() <= IDLE_SPEED_EPSILON {
        AnimationKey::Idle(facing)
    } else if running {
        AnimationKey::Run(facing)
    } else {
        AnimationKey::Walk(facing)
    }
}

#[derive(Debug, Clone)]
pub(super) struct ActorState {
    pub(super) body: EntityId,
    pub(super) position: Vec2,
    pub(super) velocity: Vec2,
    pub(super) on_ground: bool,
    pub(super) facing: Facing,
    pub(super) animation: Option<AnimationKey>,
    pub(super) movement_lock: bool,
}

impl ActorState {
    pub(super) fn spawn(
        world: &mut SceneWorld,
        debug_name: &str,
        position: Vec2,
        facing: Facing,
    ) -> Self {
        let body = world.spawn_body(debug_name, position, true);
        Self {
            body,
            position,
            velocity: Vec2::ZERO,
            on_ground: false,
            facing,
            animation: None,
            movement_lock: false,
        }
    }

    pub(super) fn sync_from(&mut self, world: &SceneWorld) -> bool {
        let Some(body) = world.find_body(self.body) else {
            return false;
        };
        self.position = body.position;
        self.velocity = body.velocity;
        self.on_ground = body.on_ground;
        true
    }

    /// Pushes a velocity intent to the engine. A locked actor keeps only its
    /// vertical component.
    pub(super) fn drive(&mut self, world: &mut SceneWorld, velocity: Vec2) {
        let velocity = if self.movement_lock {
            Vec2::new(0.0, velocity.y)
        } else {
            velocity
        };
        self.velocity = velocity;
        world.set_velocity(self.body, velocity);
    }

    pub(super) fn halt(&mut self, world: &mut SceneWorld) {
        let velocity = Vec2::new(0.0, self.velocity.y);
        self.drive(world, velocity);
    }

    pub(super) fn play(&mut self, world: &mut SceneWorld, key: AnimationKey) -> bool {
        if self.animation == Some(key) {
            return false;
        }
        self.animation = Some(key);
        if let AnimationKey::Idle(facing)
        | AnimationKey::Walk(facing)
        | AnimationKey::Run(facing)
        | AnimationKey::Jump(facing) = key
        {
            self.facing = facing;
        }
        world.play_animation(self.body, &key.engine_id(), true)
    }

    pub(super) fn face(&mut self, world: &mut SceneWorld, facing: Facing) {
        self.facing = facing;
        self.play(world, AnimationKey::Idle(facing));
    }

    pub(super) fn set_lock(&mut self, world: &mut SceneWorld, locked: bool) {
        self.movement_lock = locked;
        if locked {
            self.halt(world);
            let facing = self.facing;
            self.play(world, AnimationKey::Idle(facing));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_animations() -> SceneWorld {
        let mut world = SceneWorld::default();
        for key in AnimationKey::catalog() {
            world.register_animation(&key.engine_id());
        }
        world
    }

    #[test]
    fn engine_ids_follow_locomotion_and_direction() {
        assert_eq!(AnimationKey::Walk(Facing::Left).engine_id(), "walk_left");
        assert_eq!(AnimationKey::Jump(Facing::Right).engine_id(), "jump_right");
        assert_eq!(AnimationKey::Emote.engine_id(), "emote");
        assert_eq!(AnimationKey::catalog().len(), 10);
    }

    #[test]
    fn near_zero_velocity_falls_back_to_idle() {
        let key = locomotion_animation(Vec2::new(4.9, 0.0), true, Facing::Right, false);
        assert_eq!(key, AnimationKey::Idle(Facing::Right));
        let key = locomotion_animation(Vec2::new(-5.0, 0.0), true, Facing::Right, true);
        assert_eq!(key, AnimationKey::Idle(Facing::Right));
    }

    #[test]
    fn velocity_sign_and_ground_pick_the_variant() {
        assert_eq!(
            locomotion_animation(Vec2::new(-80.0, 0.0), true, Facing::Right, false),
            AnimationKey::Walk(Facing::Left)
        );
        assert_eq!(
            locomotion_animation(Vec2::new(200.0, 0.0), true, Facing::Left, true),
            AnimationKey::Run(Facing::Right)
        );
        assert_eq!(
            locomotion_animation(Vec2::new(90.0, -300.0), false, Facing::Left, false),
            AnimationKey::Jump(Facing::Right)
        );
    }

    #[test]
    fn play_does_not_restart_the_current_animation() {
        let mut world = world_with_animations();
        let mut actor = ActorState::spawn(&mut world, "npc", Vec2::ZERO, Facing::Left);
        world.apply_pending();

        assert!(actor.play(&mut world, AnimationKey::Walk(Facing::Left)));
        assert!(!actor.play(&mut world, AnimationKey::Walk(Facing::Left)));
        let body = world.find_body(actor.body).expect("body");
        assert_eq!(body.animation(), Some("walk_left"));
        assert_eq!(body.animation_starts(), 1);
    }

    #[test]
    fn locked_actor_keeps_only_vertical_velocity() {
        let mut world = world_with_animations();
        let mut actor = ActorState::spawn(&mut world, "player", Vec2::ZERO, Facing::Right);
        world.apply_pending();

        actor.set_lock(&mut world, true);
        actor.drive(&mut world, Vec2::new(160.0, -20.0));
        assert_eq!(
            world.find_body(actor.body).expect("body").velocity,
            Vec2::new(0.0, -20.0)
        );

        actor.set_lock(&mut world, false);
        actor.drive(&mut world, Vec2::new(160.0, 0.0));
        assert_eq!(world.find_body(actor.body).expect("body").velocity.x, 160.0);
    }

    #[test]
    fn sync_reports_missing_body() {
        let mut world = world_with_animations();
        let mut actor = ActorState::spawn(&mut world, "npc", Vec2::new(3.0, 4.0), Facing::Left);
        world.apply_pending();
        assert!(actor.sync_from(&world));
        world.despawn(actor.body);
        world.apply_pending();
        assert!(!actor.sync_from(&world));
    }
}
