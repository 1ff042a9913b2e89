use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct MusicTrack {
    pub track: String,
    pub volume: f32,
    pub target_volume: f32,
    pub tween_remaining_seconds: f32,
}

/// What a scene switch does with the shared music handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MusicHandoff {
    #[default]
    Keep,
    Play {
        track: String,
    },
    Stop,
}

/// The single "currently playing" music handle shared by every scene.
///
/// Only the scene machine mutates it, while applying a switch.
#[derive(Debug, Default)]
pub struct AudioBus {
    current: Option<MusicTrack>,
    play_count: u32,
}

pub const DEFAULT_MUSIC_VOLUME: f32 = 0.6;

impl AudioBus {
    pub fn current(&self) -> Option<&MusicTrack> {
        self.current.as_ref()
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_ref().map(|music| music.track.as_str())
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }

    /// Starts `track` unless it is already the current track.
    pub fn play(&mut self, track: &str, volume: f32) -> bool {
        if self.current_track() == Some(track) {
            debug!(track, "music_already_playing");
            return false;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.current = Some(MusicTrack {
            track: track.to_string(),
            volume,
            target_volume: volume,
            tween_remaining_seconds: 0.0,
        });
        self.play_count = self.play_count.saturating_add(1);
        info!(track, volume, "music_started");
        true
    }

    pub fn stop(&mut self) -> bool {
        match self.current.take() {
            Some(music) => {
                info!(track = %music.track, "music_stopped");
                true
            }
            None => false,
        }
    }

    pub fn tween_volume(&mut self, target_volume: f32, duration_ms: u32) {
        let Some(music) = self.current.as_mut() else {
            return;
        };
        music.target_volume = target_volume.clamp(0.0, 1.0);
        music.tween_remaining_seconds = duration_ms as f32 / 1000.0;
        if music.tween_remaining_seconds <= 0.0 {
            music.volume = music.target_volume;
        }
    }

    pub fn apply_handoff(&mut self, handoff: &MusicHandoff) {
        match handoff {
            MusicHandoff::Keep => {}
            MusicHandoff::Play { track } => {
                self.play(track, DEFAULT_MUSIC_VOLUME);
            }
            MusicHandoff::Stop => {
                self.stop();
            }
        }
    }

    pub fn tick(&mut self, dt_seconds: f32) {
        let Some(music) = self.current.as_mut() else {
            return;
        };
        if music.tween_remaining_seconds <= 0.0 {
            return;
        }
        let step = (dt_seconds / music.tween_remaining_seconds).min(1.0);
        music.volume += (music.target_volume - music.volume) * step;
        music.tween_remaining_seconds -= dt_seconds;
        if music.tween_remaining_seconds <= 0.0 {
            music.volume = music.target_volume;
            music.tween_remaining_seconds = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaying_current_track_does_not_restart_it() {
        let mut bus = AudioBus::default();
        assert!(bus.play("town_theme", 0.5));
        assert!(!bus.play("town_theme", 0.5));
        assert_eq!(bus.play_count(), 1);
        assert!(bus.play("club_theme", 0.5));
        assert_eq!(bus.current_track(), Some("club_theme"));
    }

    #[test]
    fn volume_tween_reaches_target() {
        let mut bus = AudioBus::default();
        bus.play("camp_theme", 1.0);
        bus.tween_volume(0.0, 500);
        for _ in 0..40 {
            bus.tick(1.0 / 60.0);
        }
        let music = bus.current().expect("music");
        assert!(music.volume.abs() < 0.0001, "volume {}", music.volume);
    }

    #[test]
    fn handoff_keep_leaves_track_untouched() {
        let mut bus = AudioBus::default();
        bus.play("town_theme", 0.5);
        bus.apply_handoff(&MusicHandoff::Keep);
        assert_eq!(bus.current_track(), Some("town_theme"));
        bus.apply_handoff(&MusicHandoff::Stop);
        assert!(bus.current().is_none());
        assert!(!bus.stop());
    }
}
