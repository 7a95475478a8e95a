use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::PresentationError;
use super::phase::{FadePhase, HoldPhase, LoadPhase, PhaseContext, PhaseKind, SkipSignal};
use super::sequencer::{PhaseSequencer, PhaseSlot, SequenceState};
use super::{OPACITY_OPAQUE, OPACITY_TRANSPARENT};

pub const DEFAULT_SPRITE_OVERLAY: &str = "FadeOverlay";
pub const DEFAULT_SPRITE_FADE_SPEED: f32 = 1.5;
pub const DEFAULT_SPRITE_HOLD_SECONDS: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteIntroConfig {
    pub sprites: Vec<String>,
    pub overlay: String,
    /// Crossfades take `1 / fade_speed` seconds.
    pub fade_speed: f32,
    pub hold_seconds: f32,
    pub skippable: bool,
    pub destination: String,
}

impl Default for SpriteIntroConfig {
    fn default() -> Self {
        Self {
            sprites: Vec::new(),
            overlay: DEFAULT_SPRITE_OVERLAY.to_string(),
            fade_speed: DEFAULT_SPRITE_FADE_SPEED,
            hold_seconds: DEFAULT_SPRITE_HOLD_SECONDS,
            skippable: true,
            destination: String::new(),
        }
    }
}

impl SpriteIntroConfig {
    pub fn fade_duration_seconds(&self) -> f32 {
        if self.fade_speed > 0.0 && self.fade_speed.is_finite() {
            1.0 / self.fade_speed
        } else {
            warn!(
                error = %PresentationError::InvalidConfiguration {
                    field: "fade_speed",
                    message: format!("{} must be positive", self.fade_speed),
                },
                "sprite_intro_fades_immediate"
            );
            0.0
        }
    }
}

/// Crossfades each sprite in over a black overlay, holds it, crossfades it
/// out, then fades fully to black. The skip input shortens the current hold only.
pub struct SpriteIntroPipeline {
    config: SpriteIntroConfig,
    sequencer: PhaseSequencer,
    skip: SkipSignal,
}

impl SpriteIntroPipeline {
    pub fn new(owner: impl Into<String>, config: SpriteIntroConfig) -> Self {
        Self {
            config,
            sequencer: PhaseSequencer::new(owner),
            skip: SkipSignal::default(),
        }
    }

    pub fn sequencer(&self) -> &PhaseSequencer {
        &self.sequencer
    }

    pub fn state(&self) -> SequenceState {
        self.sequencer.state()
    }

    pub fn start(&mut self) {
        info!(
            owner = self.sequencer.owner(),
            sprites = self.config.sprites.len(),
            "sprite_intro_started"
        );
        let phases = self.phases();
        self.sequencer.start(phases, Vec::new());
    }

    /// Ends the hold in progress. Returns `false` outside a hold or when skipping is off.
    pub fn request_skip(&mut self) -> bool {
        if !self.config.skippable || self.sequencer.current_kind() != Some(PhaseKind::Wait) {
            return false;
        }
        self.skip.raise();
        true
    }

    pub fn tick(&mut self, cx: &mut PhaseContext<'_>) -> SequenceState {
        self.sequencer.tick(cx)
    }

    pub fn abort(&mut self, cx: &mut PhaseContext<'_>) {
        self.sequencer.abort(cx);
    }

    fn phases(&self) -> Vec<PhaseSlot> {
        let config = &self.config;
        let duration = config.fade_duration_seconds();
        let overlay = config.overlay.as_str();

        let setup = config.sprites.iter().fold(
            FadePhase::new("setup", overlay, OPACITY_OPAQUE, 0.0),
            |phase, sprite| phase.with_track(sprite, None, OPACITY_TRANSPARENT),
        );
        let mut phases = vec![PhaseSlot::new(setup)];

        for sprite in &config.sprites {
            phases.push(PhaseSlot::new(
                FadePhase::new(format!("crossfade_in:{sprite}"), sprite, OPACITY_OPAQUE, duration)
                    .starting_at(OPACITY_TRANSPARENT)
                    .with_track(overlay, Some(OPACITY_OPAQUE), OPACITY_TRANSPARENT),
            ));
            phases.push(PhaseSlot::new(HoldPhase::new(
                format!("hold:{sprite}"),
                config.hold_seconds,
                self.skip.clone(),
            )));
            phases.push(PhaseSlot::new(
                FadePhase::new(format!("crossfade_out:{sprite}"), sprite, OPACITY_TRANSPARENT, duration)
                    .starting_at(OPACITY_OPAQUE)
                    .with_track(overlay, Some(OPACITY_TRANSPARENT), OPACITY_OPAQUE),
            ));
        }

        phases.push(PhaseSlot::new(
            FadePhase::new("fade_to_black", overlay, OPACITY_OPAQUE, duration),
        ));
        if !config.destination.is_empty() {
            phases.push(PhaseSlot::new(LoadPhase::new(
                format!("load:{}", config.destination),
                &config.destination,
            )));
        }
        phases
    }
}
