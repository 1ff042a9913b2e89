use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use super::audio::MusicHandoff;
use super::camera::{Camera2D, FadeDirection};
use super::input::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKey {
    Town,
    Club,
    Office,
    Camp,
}

impl SceneKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Town => "town",
            Self::Club => "club",
            Self::Office => "office",
            Self::Camp => "camp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMode {
    /// Stop the current scene, then resume the target if it is paused or start it.
    StopAndResume,
    /// Pause the current scene (keeping its state and music), then launch the target.
    PauseAndLaunch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSwitch {
    pub from: SceneKey,
    pub to: SceneKey,
    pub mode: SwitchMode,
    pub fade_in_ms: u32,
    pub music: MusicHandoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Switch(SceneSwitch),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Stopped,
    Running,
    Paused,
}

/// Read-only copy of the scene registry, refreshed before every update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneRegistryView {
    entries: Vec<(SceneKey, SceneStatus)>,
}

impl SceneRegistryView {
    pub(crate) fn new(entries: Vec<(SceneKey, SceneStatus)>) -> Self {
        Self { entries }
    }

    pub fn contains(&self, key: SceneKey) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == key)
    }

    pub fn status(&self, key: SceneKey) -> Option<SceneStatus> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == key)
            .map(|(_, status)| *status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

/// Engine-managed physics/render object. Game code reaches it through an `EntityId`.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: EntityId,
    pub debug_name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub gravity: bool,
    pub on_ground: bool,
    animation: Option<String>,
    animation_starts: u32,
    applied_spawn_order: u64,
}

impl Body {
    pub fn animation(&self) -> Option<&str> {
        self.animation.as_deref()
    }

    /// Number of times an animation was (re)started on this body.
    pub fn animation_starts(&self) -> u32 {
        self.animation_starts
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    pub gravity_px_per_s2: f32,
    pub ground_y: Option<f32>,
    pub world_width: Option<f32>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_px_per_s2: 900.0,
            ground_y: None,
            world_width: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    bodies: Vec<Body>,
    pending_spawns: Vec<Body>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    physics: PhysicsConfig,
    camera: Camera2D,
    animations: HashSet<String>,
    overlays: BTreeMap<String, String>,
    fade_events: Vec<FadeDirection>,
    registry: SceneRegistryView,
}

impl SceneWorld {
    pub fn spawn_body(&mut self, debug_name: &str, position: Vec2, gravity: bool) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Body {
            id,
            debug_name: debug_name.to_string(),
            position,
            velocity: Vec2::ZERO,
            gravity,
            on_ground: !gravity,
            animation: None,
            animation_starts: 0,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.bodies.iter().any(|body| body.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|body| body.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.bodies
                .retain(|body| pending.binary_search_by_key(&body.id.0, |id| id.0).is_err());
            self.pending_spawns
                .retain(|body| pending.binary_search_by_key(&body.id.0, |id| id.0).is_err());
            self.pending_despawns.clear();
        }

        if !self.pending_spawns.is_empty() {
            for mut body in self.pending_spawns.drain(..) {
                body.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.bodies.push(body);
            }
        }
    }

    /// Tears down everything the scene created. Registered animations survive.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.camera = Camera2D::default();
        self.overlays.clear();
        self.fade_events.clear();
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn find_body(&self, id: EntityId) -> Option<&Body> {
        self.bodies.iter().find(|body| body.id == id)
    }

    pub fn find_body_mut(&mut self, id: EntityId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|body| body.id == id)
    }

    pub fn set_velocity(&mut self, id: EntityId, velocity: Vec2) -> bool {
        match self.find_body_mut(id) {
            Some(body) => {
                body.velocity = velocity;
                true
            }
            None => false,
        }
    }

    pub fn physics(&self) -> PhysicsConfig {
        self.physics
    }

    pub fn set_physics(&mut self, physics: PhysicsConfig) {
        self.physics = physics;
    }

    pub fn register_animation(&mut self, key: &str) {
        self.animations.insert(key.to_string());
    }

    pub fn has_animation(&self, key: &str) -> bool {
        self.animations.contains(key)
    }

    /// Plays `key` on a body. Unknown keys and missing bodies are a no-op.
    /// With `ignore_if_playing` an already-running animation is not restarted.
    pub fn play_animation(&mut self, id: EntityId, key: &str, ignore_if_playing: bool) -> bool {
        if !self.animations.contains(key) {
            debug!(animation = key, "animation_unknown");
            return false;
        }
        let Some(body) = self.bodies.iter_mut().find(|body| body.id == id) else {
            return false;
        };
        if ignore_if_playing && body.animation.as_deref() == Some(key) {
            return false;
        }
        body.animation = Some(key.to_string());
        body.animation_starts = body.animation_starts.saturating_add(1);
        true
    }

    pub fn show_overlay(&mut self, id: &str, text: &str) {
        self.overlays.insert(id.to_string(), text.to_string());
    }

    /// Destroy-if-exists: hiding an absent overlay is fine.
    pub fn hide_overlay(&mut self, id: &str) -> bool {
        self.overlays.remove(id).is_some()
    }

    pub fn overlay(&self, id: &str) -> Option<&str> {
        self.overlays.get(id).map(String::as_str)
    }

    pub fn overlays(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overlays
            .iter()
            .map(|(id, text)| (id.as_str(), text.as_str()))
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn drain_fade_events(&mut self) -> Vec<FadeDirection> {
        std::mem::take(&mut self.fade_events)
    }

    pub fn registry(&self) -> &SceneRegistryView {
        &self.registry
    }

    pub(crate) fn set_registry(&mut self, registry: SceneRegistryView) {
        self.registry = registry;
    }

    /// Integrates velocities, applies gravity and resolves the ground line.
    pub fn step_bodies(&mut self, dt_seconds: f32) {
        let physics = self.physics;
        for body in &mut self.bodies {
            if body.gravity {
                body.velocity.y += physics.gravity_px_per_s2 * dt_seconds;
            }
            body.position.x += body.velocity.x * dt_seconds;
            body.position.y += body.velocity.y * dt_seconds;

            if let Some(width) = physics.world_width {
                body.position.x = body.position.x.clamp(0.0, width.max(0.0));
            }
            if !body.gravity {
                continue;
            }
            match physics.ground_y {
                Some(ground_y) if body.position.y >= ground_y => {
                    body.position.y = ground_y;
                    if body.velocity.y > 0.0 {
                        body.velocity.y = 0.0;
                    }
                    body.on_ground = true;
                }
                _ => body.on_ground = false,
            }
        }
    }

    pub(crate) fn tick_camera(&mut self, dt_seconds: f32) {
        if let Some(target) = self.camera.follow_target() {
            if let Some(position) = self.find_body(target).map(|body| body.position) {
                self.camera.center_on(position);
            }
        }
        if let Some(direction) = self.camera.tick_fade(dt_seconds) {
            self.fade_events.push(direction);
        }
    }

    /// Pick the body spawned last among those matching `filter`.
    pub fn topmost_body(&self, filter: impl Fn(&Body) -> bool) -> Option<EntityId> {
        self.bodies
            .iter()
            .filter(|body| filter(body))
            .max_by_key(|body| body.applied_spawn_order)
            .map(|body| body.id)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn pause(&mut self, _world: &mut SceneWorld) {}
    fn resume(&mut self, _world: &mut SceneWorld) {}
}
