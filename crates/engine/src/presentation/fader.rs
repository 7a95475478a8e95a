use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::PresentationError;
use super::phase::{FadePhase, PhaseContext};
use super::sequencer::{PhaseSequencer, PhaseSlot, SequenceState};
use super::{OPACITY_OPAQUE, OPACITY_TRANSPARENT};
use crate::app::SceneWorld;

pub const DEFAULT_SCENE_FADE_SURFACE: &str = "FadeImage";
pub const DEFAULT_SCENE_FADE_SECONDS: f32 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFaderConfig {
    pub surface: String,
    pub duration_seconds: f32,
    pub fade_from_black_on_start: bool,
}

impl Default for SceneFaderConfig {
    fn default() -> Self {
        Self {
            surface: DEFAULT_SCENE_FADE_SURFACE.to_string(),
            duration_seconds: DEFAULT_SCENE_FADE_SECONDS,
            fade_from_black_on_start: true,
        }
    }
}

/// Owns one full-screen fade surface. Each fade replaces the one in progress
/// and continues from the surface's current opacity.
pub struct SceneFader {
    config: SceneFaderConfig,
    sequencer: PhaseSequencer,
    surface_bound: bool,
}

impl SceneFader {
    pub fn new(config: SceneFaderConfig) -> Self {
        Self {
            sequencer: PhaseSequencer::new(format!("fader:{}", config.surface)),
            config,
            surface_bound: false,
        }
    }

    pub fn config(&self) -> &SceneFaderConfig {
        &self.config
    }

    /// Binds the surface in a freshly loaded world and applies the start state.
    pub fn on_start(&mut self, world: &mut SceneWorld) {
        let Some(surface) = world.find_by_name(&self.config.surface) else {
            self.surface_bound = false;
            warn!(
                error = %PresentationError::missing("fade surface", self.config.surface.as_str()),
                "scene_fader_unbound"
            );
            return;
        };
        self.surface_bound = true;

        if self.config.fade_from_black_on_start {
            world.set_opacity(surface, OPACITY_OPAQUE);
            self.fade_from_black();
        } else {
            world.set_opacity(surface, OPACITY_TRANSPARENT);
        }
    }

    pub fn fade_to_black(&mut self) -> bool {
        self.fade("fade_to_black", OPACITY_OPAQUE)
    }

    pub fn fade_from_black(&mut self) -> bool {
        self.fade("fade_from_black", OPACITY_TRANSPARENT)
    }

    pub fn is_fading(&self) -> bool {
        self.sequencer.is_running()
    }

    pub fn tick(&mut self, cx: &mut PhaseContext<'_>) -> SequenceState {
        self.sequencer.tick(cx)
    }

    pub fn abort(&mut self, cx: &mut PhaseContext<'_>) {
        self.sequencer.abort(cx);
    }

    fn fade(&mut self, label: &str, target: f32) -> bool {
        if !self.surface_bound {
            debug!(surface = self.config.surface.as_str(), "scene_fade_ignored");
            return false;
        }
        let phase = FadePhase::new(label, &self.config.surface, target, self.config.duration_seconds);
        self.sequencer.start(vec![PhaseSlot::new(phase)], Vec::new());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SceneLoadQueue;
    use crate::presentation::RecordingAudio;

    fn tick(fader: &mut SceneFader, world: &mut SceneWorld) -> SequenceState {
        let mut audio = RecordingAudio::default();
        let mut loads = SceneLoadQueue::new(0);
        let mut cx = PhaseContext {
            dt_seconds: 0.5,
            world,
            audio: &mut audio,
            loads: &mut loads,
        };
        fader.tick(&mut cx)
    }

    fn config() -> SceneFaderConfig {
        SceneFaderConfig {
            duration_seconds: 1.0,
            ..SceneFaderConfig::default()
        }
    }

    #[test]
    fn start_snaps_to_black_then_fades_in() {
        let mut world = SceneWorld::default();
        let surface = world.spawn_fade_surface(DEFAULT_SCENE_FADE_SURFACE, 0.0);
        let mut fader = SceneFader::new(config());

        fader.on_start(&mut world);
        assert_eq!(world.opacity(surface), Some(OPACITY_OPAQUE));
        assert!(fader.is_fading());

        tick(&mut fader, &mut world);
        assert_eq!(world.opacity(surface), Some(0.5));
        assert_eq!(tick(&mut fader, &mut world), SequenceState::Completed);
        assert_eq!(world.opacity(surface), Some(OPACITY_TRANSPARENT));
    }

    #[test]
    fn new_fade_continues_from_current_opacity() {
        let mut world = SceneWorld::default();
        let surface = world.spawn_fade_surface(DEFAULT_SCENE_FADE_SURFACE, 0.0);
        let mut fader = SceneFader::new(config());
        fader.on_start(&mut world);
        tick(&mut fader, &mut world);

        assert!(fader.fade_to_black());
        tick(&mut fader, &mut world);
        assert_eq!(world.opacity(surface), Some(0.75));
        tick(&mut fader, &mut world);
        assert_eq!(world.opacity(surface), Some(OPACITY_OPAQUE));
    }

    #[test]
    fn missing_surface_makes_fades_no_ops() {
        let mut world = SceneWorld::default();
        let mut fader = SceneFader::new(config());
        fader.on_start(&mut world);

        assert!(!fader.fade_to_black());
        assert!(!fader.is_fading());
    }

    #[test]
    fn start_without_fade_leaves_surface_clear() {
        let mut world = SceneWorld::default();
        let surface = world.spawn_fade_surface(DEFAULT_SCENE_FADE_SURFACE, 1.0);
        let mut fader = SceneFader::new(SceneFaderConfig {
            fade_from_black_on_start: false,
            ..config()
        });
        fader.on_start(&mut world);

        assert_eq!(world.opacity(surface), Some(OPACITY_TRANSPARENT));
        assert!(!fader.is_fading());
    }
}
