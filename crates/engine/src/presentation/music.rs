use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::error::PresentationError;
use super::fade::FadeInterpolator;

pub const DEFAULT_MUSIC_FADE_SECONDS: f32 = 1.0;

/// Playback device for background music. Loading tracks is its business.
pub trait MusicPlayer {
    fn current_track(&self) -> Option<&str>;
    fn has_track(&self, name: &str) -> bool;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self, track: &str);
    fn stop(&mut self);
}

/// In-memory player over a fixed set of track names.
#[derive(Debug, Clone)]
pub struct TrackLibrary {
    tracks: BTreeSet<String>,
    current: Option<String>,
    volume: f32,
}

impl TrackLibrary {
    pub fn new<I, S>(tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracks: tracks.into_iter().map(Into::into).collect(),
            current: None,
            volume: 1.0,
        }
    }
}

impl Default for TrackLibrary {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl MusicPlayer for TrackLibrary {
    fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn has_track(&self, name: &str) -> bool {
        self.tracks.contains(name)
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = super::clamp01(volume);
    }

    fn play(&mut self, track: &str) {
        self.current = Some(track.to_string());
    }

    fn stop(&mut self) {
        self.current = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicChange {
    /// Empty request: whatever plays keeps playing.
    KeptCurrent,
    AlreadyPlaying,
    UnknownTrack,
    Crossfading,
}

#[derive(Debug)]
enum Stage {
    Out(FadeInterpolator),
    In(FadeInterpolator),
}

#[derive(Debug)]
struct Crossfade {
    track: String,
    restore_volume: f32,
    stage: Stage,
}

/// Session-wide background music: fades the current track out, swaps, and
/// fades the new one back in to the volume it had before.
pub struct MusicDirector {
    player: Box<dyn MusicPlayer>,
    fade_seconds: f32,
    crossfade: Option<Crossfade>,
}

impl MusicDirector {
    pub fn new(player: Box<dyn MusicPlayer>) -> Self {
        Self {
            player,
            fade_seconds: DEFAULT_MUSIC_FADE_SECONDS,
            crossfade: None,
        }
    }

    pub fn with_fade_seconds(mut self, fade_seconds: f32) -> Self {
        self.fade_seconds = fade_seconds;
        self
    }

    pub fn player(&self) -> &dyn MusicPlayer {
        self.player.as_ref()
    }

    pub fn is_crossfading(&self) -> bool {
        self.crossfade.is_some()
    }

    /// The track playing once any crossfade in flight has finished.
    pub fn target_track(&self) -> Option<&str> {
        match &self.crossfade {
            Some(crossfade) => Some(crossfade.track.as_str()),
            None => self.player.current_track(),
        }
    }

    pub fn change_track(&mut self, name: &str) -> MusicChange {
        if name.is_empty() {
            return MusicChange::KeptCurrent;
        }
        if !self.player.has_track(name) {
            warn!(
                error = %PresentationError::missing("music track", name),
                "music_track_missing"
            );
            return MusicChange::UnknownTrack;
        }
        if self.target_track() == Some(name) {
            return MusicChange::AlreadyPlaying;
        }

        let restore_volume = match self.crossfade.take() {
            Some(previous) => {
                debug!(track = previous.track.as_str(), "music_crossfade_replaced");
                previous.restore_volume
            }
            None => self.player.volume(),
        };
        let current = self.player.volume();
        self.crossfade = Some(Crossfade {
            track: name.to_string(),
            restore_volume,
            stage: Stage::Out(FadeInterpolator::new(current, 0.0, self.fade_seconds)),
        });
        info!(track = name, "music_change_started");
        MusicChange::Crossfading
    }

    pub fn tick(&mut self, dt_seconds: f32) {
        let Some(crossfade) = self.crossfade.as_mut() else {
            return;
        };

        match &mut crossfade.stage {
            Stage::Out(fade) => {
                if let Some(volume) = fade.advance(dt_seconds) {
                    self.player.set_volume(volume);
                }
                if fade.is_finished() {
                    self.player.stop();
                    self.player.play(&crossfade.track);
                    crossfade.stage = Stage::In(FadeInterpolator::new(
                        0.0,
                        crossfade.restore_volume,
                        self.fade_seconds,
                    ));
                }
            }
            Stage::In(fade) => {
                if let Some(volume) = fade.advance(dt_seconds) {
                    self.player.set_volume(volume);
                }
                if fade.is_finished() {
                    info!(track = crossfade.track.as_str(), "music_change_finished");
                    self.crossfade = None;
                }
            }
        }
    }
}
