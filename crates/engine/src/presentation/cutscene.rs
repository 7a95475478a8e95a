use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::PresentationError;
use super::phase::{
    FadePhase, LoadPhase, PhaseContext, RevealPhase, VisibilityPhase, WaitPhase,
};
use super::sequencer::{PhaseSequencer, PhaseSlot, SequenceState};
use super::{OPACITY_OPAQUE, OPACITY_TRANSPARENT};

pub const DEFAULT_CUTSCENE_FADE_SURFACE: &str = "BlackFade";
pub const DEFAULT_FADE_DURATION_SECONDS: f32 = 1.0;
pub const DEFAULT_UNIT_DELAY_SECONDS: f32 = 1.0;
pub const DEFAULT_FINAL_HOLD_SECONDS: f32 = 1.0;
pub const DEFAULT_SKIP_SETTLE_SECONDS: f32 = 0.25;

/// One shot of a cutscene: an object to show and the text typed over it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutsceneUnit {
    pub object: Option<String>,
    pub text_box: Option<String>,
    pub text: String,
}

impl CutsceneUnit {
    fn name(&self, index: usize) -> String {
        self.object
            .clone()
            .or_else(|| self.text_box.clone())
            .unwrap_or_else(|| format!("unit{index}"))
    }

    fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.object.iter().chain(self.text_box.iter()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutsceneConfig {
    pub units: Vec<CutsceneUnit>,
    pub fade_surface: String,
    pub fade_duration_seconds: f32,
    pub delay_between_units_seconds: f32,
    pub final_hold_seconds: f32,
    pub skip_settle_seconds: f32,
    /// Scene loaded when the cutscene ends or is skipped. Empty stays on the last screen.
    pub destination: String,
}

impl Default for CutsceneConfig {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            fade_surface: DEFAULT_CUTSCENE_FADE_SURFACE.to_string(),
            fade_duration_seconds: DEFAULT_FADE_DURATION_SECONDS,
            delay_between_units_seconds: DEFAULT_UNIT_DELAY_SECONDS,
            final_hold_seconds: DEFAULT_FINAL_HOLD_SECONDS,
            skip_settle_seconds: DEFAULT_SKIP_SETTLE_SECONDS,
            destination: String::new(),
        }
    }
}

impl CutsceneConfig {
    /// Replaces invalid timings with immediate completion and logs each one.
    pub fn sanitized(mut self) -> Self {
        for (field, value) in [
            ("fade_duration_seconds", &mut self.fade_duration_seconds),
            ("delay_between_units_seconds", &mut self.delay_between_units_seconds),
            ("final_hold_seconds", &mut self.final_hold_seconds),
            ("skip_settle_seconds", &mut self.skip_settle_seconds),
        ] {
            if !value.is_finite() || *value < 0.0 {
                warn!(
                    error = %PresentationError::InvalidConfiguration {
                        field,
                        message: format!("{value} is not a usable duration"),
                    },
                    "cutscene_timing_reset"
                );
                *value = 0.0;
            }
        }
        self
    }
}

/// Show each unit, type its text, hold, fade to black, then load the destination.
pub struct CutscenePipeline {
    config: CutsceneConfig,
    sequencer: PhaseSequencer,
}

impl CutscenePipeline {
    pub fn new(owner: impl Into<String>, config: CutsceneConfig) -> Self {
        Self {
            config: config.sanitized(),
            sequencer: PhaseSequencer::new(owner),
        }
    }

    pub fn config(&self) -> &CutsceneConfig {
        &self.config
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
            units = self.config.units.len(),
            destination = self.config.destination.as_str(),
            "cutscene_started"
        );
        let phases = self.main_phases();
        let finalizer = self.skip_phases();
        self.sequencer.start(phases, finalizer);
    }

    /// Skips the rest of the cutscene. Only the first request counts.
    pub fn request_skip(&mut self) -> bool {
        self.sequencer.request_cancel()
    }

    pub fn tick(&mut self, cx: &mut PhaseContext<'_>) -> SequenceState {
        self.sequencer.tick(cx)
    }

    pub fn abort(&mut self, cx: &mut PhaseContext<'_>) {
        self.sequencer.abort(cx);
    }

    fn hide_all(&self, label: &str) -> VisibilityPhase {
        self.config
            .units
            .iter()
            .flat_map(CutsceneUnit::entity_names)
            .fold(VisibilityPhase::new(label), VisibilityPhase::hide)
            .clearing_hidden_text()
    }

    fn fade_to(&self, label: String, opacity: f32) -> FadePhase {
        FadePhase::new(
            label,
            &self.config.fade_surface,
            opacity,
            self.config.fade_duration_seconds,
        )
    }

    fn main_phases(&self) -> Vec<PhaseSlot> {
        let config = &self.config;
        let mut phases = vec![
            PhaseSlot::new(self.hide_all("hide_all")),
            PhaseSlot::new(self.fade_to("fade_in".to_string(), OPACITY_TRANSPARENT)),
        ];

        let last = config.units.len().saturating_sub(1);
        for (index, unit) in config.units.iter().enumerate() {
            let name = unit.name(index);
            let reveal = unit
                .entity_names()
                .fold(VisibilityPhase::new(format!("reveal_unit:{name}")), VisibilityPhase::show);
            phases.push(PhaseSlot::new(reveal));

            if let Some(text_box) = unit.text_box.as_deref() {
                phases.push(PhaseSlot::new(RevealPhase::new(
                    format!("type_text:{name}"),
                    text_box,
                    &unit.text,
                )));
            }
            phases.push(PhaseSlot::new(WaitPhase::new(
                format!("hold:{name}"),
                config.delay_between_units_seconds,
            )));
            phases.push(PhaseSlot::new(
                self.fade_to(format!("fade_out:{name}"), OPACITY_OPAQUE),
            ));

            let conceal = unit
                .entity_names()
                .fold(VisibilityPhase::new(format!("conceal_unit:{name}")), VisibilityPhase::hide)
                .clearing_hidden_text();
            phases.push(PhaseSlot::new(conceal));

            if index < last {
                phases.push(PhaseSlot::new(
                    self.fade_to(format!("fade_in:{name}"), OPACITY_TRANSPARENT),
                ));
            }
        }

        phases.push(PhaseSlot::new(WaitPhase::new(
            "final_hold",
            config.final_hold_seconds,
        )));
        phases.push(PhaseSlot::new(LoadPhase::new(
            format!("load:{}", config.destination),
            &config.destination,
        )));
        phases
    }

    fn skip_phases(&self) -> Vec<PhaseSlot> {
        vec![
            PhaseSlot::new(self.hide_all("skip_reset")),
            PhaseSlot::new(self.fade_to("skip_fade_out".to_string(), OPACITY_OPAQUE)),
            PhaseSlot::new(WaitPhase::new(
                "skip_settle",
                self.config.skip_settle_seconds,
            )),
            PhaseSlot::new(LoadPhase::new(
                format!("skip_load:{}", self.config.destination),
                &self.config.destination,
            )),
        ]
    }
}
