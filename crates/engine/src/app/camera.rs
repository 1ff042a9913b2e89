use super::scene::{EntityId, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    Out,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScreenFade {
    direction: FadeDirection,
    duration_seconds: f32,
    elapsed_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub min_x: f32,
    pub max_x: f32,
}

/// Side-scrolling camera: horizontal follow, clamp to bounds, full-screen fade.
///
/// `fade_opacity` is 0.0 when the scene is fully visible and 1.0 when black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    follow: Option<EntityId>,
    bounds: Option<CameraBounds>,
    fade: Option<ScreenFade>,
    fade_opacity: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            follow: None,
            bounds: None,
            fade: None,
            fade_opacity: 0.0,
        }
    }
}

impl Camera2D {
    pub fn follow(&mut self, target: Option<EntityId>) {
        self.follow = target;
    }

    pub fn follow_target(&self) -> Option<EntityId> {
        self.follow
    }

    pub fn set_bounds(&mut self, bounds: CameraBounds) {
        self.bounds = Some(bounds);
    }

    pub fn center_on(&mut self, target: Vec2) {
        let mut x = target.x;
        if let Some(bounds) = self.bounds {
            x = x.clamp(bounds.min_x, bounds.max_x.max(bounds.min_x));
        }
        self.position = Vec2 { x, y: target.y };
    }

    /// Starts fading to black. Ignored while a fade-out is already running.
    pub fn fade_out(&mut self, duration_ms: u32) -> bool {
        if matches!(self.fade, Some(fade) if fade.direction == FadeDirection::Out) {
            return false;
        }
        self.fade = Some(ScreenFade {
            direction: FadeDirection::Out,
            duration_seconds: duration_ms as f32 / 1000.0,
            elapsed_seconds: 0.0,
        });
        true
    }

    pub fn fade_in(&mut self, duration_ms: u32) -> bool {
        self.fade_opacity = 1.0;
        self.fade = Some(ScreenFade {
            direction: FadeDirection::In,
            duration_seconds: duration_ms as f32 / 1000.0,
            elapsed_seconds: 0.0,
        });
        true
    }

    /// Drops any running fade and makes the scene fully visible.
    pub fn reset_fade(&mut self) {
        self.fade = None;
        self.fade_opacity = 0.0;
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn fade_opacity(&self) -> f32 {
        self.fade_opacity
    }

    /// Advances the fade; returns the direction of a fade that completed on this tick.
    pub(crate) fn tick_fade(&mut self, dt_seconds: f32) -> Option<FadeDirection> {
        let fade = self.fade.as_mut()?;
        fade.elapsed_seconds += dt_seconds;
        let progress = if fade.duration_seconds <= 0.0 {
            1.0
        } else {
            (fade.elapsed_seconds / fade.duration_seconds).min(1.0)
        };
        self.fade_opacity = match fade.direction {
            FadeDirection::Out => progress,
            FadeDirection::In => 1.0 - progress,
        };
        if progress < 1.0 {
            return None;
        }
        let direction = fade.direction;
        self.fade = None;
        Some(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_out_completes_after_duration() {
        let mut camera = Camera2D::default();
        assert!(camera.fade_out(100));
        assert_eq!(camera.tick_fade(0.05), None);
        assert!((camera.fade_opacity() - 0.5).abs() < 0.001);
        assert_eq!(camera.tick_fade(0.06), Some(FadeDirection::Out));
        assert!(!camera.is_fading());
        assert!((camera.fade_opacity() - 1.0).abs() < 0.0001);
    }

    #[test]
    fn duplicate_fade_out_is_ignored() {
        let mut camera = Camera2D::default();
        assert!(camera.fade_out(500));
        assert!(!camera.fade_out(500));
    }

    #[test]
    fn zero_length_fade_completes_on_next_tick() {
        let mut camera = Camera2D::default();
        camera.fade_in(0);
        assert_eq!(camera.tick_fade(1.0 / 60.0), Some(FadeDirection::In));
        assert_eq!(camera.fade_opacity(), 0.0);
    }

    #[test]
    fn center_on_respects_bounds() {
        let mut camera = Camera2D::default();
        camera.set_bounds(CameraBounds {
            min_x: 400.0,
            max_x: 1200.0,
        });
        camera.center_on(Vec2 { x: 50.0, y: 10.0 });
        assert_eq!(camera.position.x, 400.0);
        camera.center_on(Vec2 { x: 5000.0, y: 10.0 });
        assert_eq!(camera.position.x, 1200.0);
    }
}
