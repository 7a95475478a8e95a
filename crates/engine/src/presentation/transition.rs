use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::entry::apply_entry_points;
use super::error::PresentationError;
use super::fade::FadeInterpolator;
use super::session::{MovementLock, SessionContext, TransitionLease};
use super::{OPACITY_OPAQUE, OPACITY_TRANSPARENT};
use crate::app::{EntityRole, LoadSubscription, SceneLoadQueue, SceneWorld};

pub const DEFAULT_TRANSITION_MARKER: &str = "MarkA";
pub const DEFAULT_TRANSITION_FADE_SURFACE: &str = "FadeImage";
pub const DEFAULT_TRANSITION_FADE_SECONDS: f32 = 1.0;
pub const DEFAULT_POST_LOAD_DELAY_SECONDS: f32 = 0.1;
pub const DEFAULT_TRANSITION_COOLDOWN_SECONDS: f32 = 0.5;
pub const DEFAULT_LOAD_TIMEOUT_SECONDS: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionGateConfig {
    pub name: String,
    pub destination_scene: String,
    /// Entry point the player appears at in the destination.
    pub marker_id: String,
    pub fade_surface: String,
    pub fade_duration_seconds: f32,
    pub post_load_delay_seconds: f32,
    pub cooldown_seconds: f32,
    /// `None` waits for the load forever.
    pub load_timeout_seconds: Option<f32>,
}

impl Default for TransitionGateConfig {
    fn default() -> Self {
        Self {
            name: "gate".to_string(),
            destination_scene: String::new(),
            marker_id: DEFAULT_TRANSITION_MARKER.to_string(),
            fade_surface: DEFAULT_TRANSITION_FADE_SURFACE.to_string(),
            fade_duration_seconds: DEFAULT_TRANSITION_FADE_SECONDS,
            post_load_delay_seconds: DEFAULT_POST_LOAD_DELAY_SECONDS,
            cooldown_seconds: DEFAULT_TRANSITION_COOLDOWN_SECONDS,
            load_timeout_seconds: Some(DEFAULT_LOAD_TIMEOUT_SECONDS),
        }
    }
}

/// A trigger zone that moves the player to another scene.
#[derive(Debug, Clone)]
pub struct TransitionGate {
    config: TransitionGateConfig,
}

impl TransitionGate {
    /// Trims the destination so it compares equal to the name the load
    /// queue announces.
    pub fn new(mut config: TransitionGateConfig) -> Self {
        let trimmed = config.destination_scene.trim();
        if trimmed.len() != config.destination_scene.len() {
            config.destination_scene = trimmed.to_string();
        }
        Self { config }
    }

    pub fn config(&self) -> &TransitionGateConfig {
        &self.config
    }

    /// Handles a contact with this gate. Only the player triggers it, and only
    /// while no other transition holds the session guard. The returned task
    /// owns the guard until it finishes or is dropped.
    pub fn on_contact(&self, role: EntityRole, session: &SessionContext) -> Option<TransitionTask> {
        if role != EntityRole::Player {
            return None;
        }
        if self.config.destination_scene.trim().is_empty() {
            warn!(
                gate = self.config.name.as_str(),
                error = %PresentationError::InvalidConfiguration {
                    field: "destination_scene",
                    message: "empty".to_string(),
                },
                "transition_gate_inert"
            );
            return None;
        }

        let Some(lease) = session.guard().try_acquire(&self.config.name) else {
            debug!(
                error = %PresentationError::ConcurrencyViolation {
                    gate: self.config.name.clone(),
                },
                "transition_ignored"
            );
            return None;
        };

        info!(
            gate = self.config.name.as_str(),
            destination = self.config.destination_scene.as_str(),
            marker = self.config.marker_id.as_str(),
            "transition_begun"
        );
        Some(TransitionTask::new(
            self.config.clone(),
            lease,
            session.movement().lock("transition"),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStage {
    FadingOut,
    Loading,
    Relocating,
    FadingIn,
    Cooldown,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Completed,
    TimedOut,
}

pub struct TransitionContext<'a> {
    pub dt_seconds: f32,
    pub world: &'a mut SceneWorld,
    pub loads: &'a mut SceneLoadQueue,
    pub session: &'a SessionContext,
}

/// The continuation of a triggered gate. It is owned by the session, not by
/// the scene the gate lived in, and runs against whichever world is active.
pub struct TransitionTask {
    config: TransitionGateConfig,
    stage: TransitionStage,
    fade: Option<FadeInterpolator>,
    subscription: Option<LoadSubscription>,
    waited_seconds: f32,
    timer_seconds: f32,
    relocated_to: Option<String>,
    outcome: Option<TransitionOutcome>,
    lease: Option<TransitionLease>,
    movement: Option<MovementLock>,
}

impl TransitionTask {
    fn new(config: TransitionGateConfig, lease: TransitionLease, movement: MovementLock) -> Self {
        Self {
            config,
            stage: TransitionStage::FadingOut,
            fade: None,
            subscription: None,
            waited_seconds: 0.0,
            timer_seconds: 0.0,
            relocated_to: None,
            outcome: None,
            lease: Some(lease),
            movement: Some(movement),
        }
    }

    pub fn gate(&self) -> &str {
        &self.config.name
    }

    pub fn destination(&self) -> &str {
        &self.config.destination_scene
    }

    pub fn stage(&self) -> TransitionStage {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.stage == TransitionStage::Finished
    }

    pub fn outcome(&self) -> Option<TransitionOutcome> {
        self.outcome
    }

    pub fn relocated_to(&self) -> Option<&str> {
        self.relocated_to.as_deref()
    }

    pub fn holds_guard(&self) -> bool {
        self.lease.is_some()
    }

    pub fn tick(&mut self, cx: &mut TransitionContext<'_>) -> TransitionStage {
        match self.stage {
            TransitionStage::FadingOut => self.fade_out(cx),
            TransitionStage::Loading => self.wait_for_load(cx),
            TransitionStage::Relocating => self.relocate(cx),
            TransitionStage::FadingIn => self.fade_in(cx),
            TransitionStage::Cooldown => self.cool_down(cx),
            TransitionStage::Finished => {}
        }
        self.stage
    }

    fn fade_out(&mut self, cx: &mut TransitionContext<'_>) {
        if self.step_fade(cx, OPACITY_OPAQUE) {
            return;
        }

        cx.session.handoff().write(&self.config.marker_id);
        self.subscription = Some(cx.loads.subscribe());
        cx.loads.request_load(&self.config.destination_scene);
        self.stage = TransitionStage::Loading;
    }

    fn wait_for_load(&mut self, cx: &mut TransitionContext<'_>) {
        let completed = self.subscription.as_ref().and_then(|subscription| {
            std::iter::from_fn(|| subscription.try_next())
                .find(|complete| complete.scene == self.config.destination_scene)
        });
        if completed.is_some() {
            self.subscription = None;
            self.stage = TransitionStage::Relocating;
            self.relocate(cx);
            return;
        }

        self.waited_seconds += cx.dt_seconds.max(0.0);
        let Some(limit) = self.config.load_timeout_seconds else {
            return;
        };
        if self.waited_seconds >= limit {
            warn!(
                gate = self.config.name.as_str(),
                error = %PresentationError::LoadTimedOut {
                    destination: self.config.destination_scene.clone(),
                    waited_seconds: self.waited_seconds,
                },
                "transition_abandoned"
            );
            cx.session.handoff().consume_if_matches(&self.config.marker_id);
            self.clear_fade_surface(cx);
            self.finish(TransitionOutcome::TimedOut);
        }
    }

    fn relocate(&mut self, cx: &mut TransitionContext<'_>) {
        self.relocated_to = apply_entry_points(cx.world, cx.session.handoff());
        if self.relocated_to.is_none() {
            debug!(
                marker = self.config.marker_id.as_str(),
                "transition_marker_not_found"
            );
        }
        self.fade = None;
        self.timer_seconds = self.config.post_load_delay_seconds.max(0.0);
        self.stage = TransitionStage::FadingIn;
    }

    fn fade_in(&mut self, cx: &mut TransitionContext<'_>) {
        if self.timer_seconds > 0.0 {
            self.timer_seconds -= cx.dt_seconds.max(0.0);
            return;
        }
        if self.step_fade(cx, OPACITY_TRANSPARENT) {
            return;
        }

        self.movement = None;
        self.timer_seconds = self.config.cooldown_seconds.max(0.0);
        self.stage = TransitionStage::Cooldown;
    }

    fn cool_down(&mut self, cx: &mut TransitionContext<'_>) {
        self.timer_seconds -= cx.dt_seconds.max(0.0);
        if self.timer_seconds <= 0.0 {
            self.finish(TransitionOutcome::Completed);
        }
    }

    /// Advances the fade toward `target` on the active world's surface.
    /// Returns `true` while the fade is still running.
    fn step_fade(&mut self, cx: &mut TransitionContext<'_>, target: f32) -> bool {
        let Some(surface) = cx.world.find_by_name(&self.config.fade_surface) else {
            if self.fade.take().is_none() {
                warn!(
                    gate = self.config.name.as_str(),
                    error = %PresentationError::missing("fade surface", self.config.fade_surface.as_str()),
                    "transition_fade_skipped"
                );
            }
            return false;
        };

        let duration = self.config.fade_duration_seconds;
        let fade = self.fade.get_or_insert_with(|| {
            let from = cx.world.opacity(surface).unwrap_or(target);
            FadeInterpolator::new(from, target, duration)
        });
        if let Some(opacity) = fade.advance(cx.dt_seconds) {
            cx.world.set_opacity(surface, opacity);
        }
        if fade.is_finished() {
            self.fade = None;
            false
        } else {
            true
        }
    }

    /// Leaves the active world visible when the transition gives up mid-way.
    fn clear_fade_surface(&mut self, cx: &mut TransitionContext<'_>) {
        self.fade = None;
        if let Some(surface) = cx.world.find_by_name(&self.config.fade_surface) {
            cx.world.set_opacity(surface, OPACITY_TRANSPARENT);
        }
    }

    fn finish(&mut self, outcome: TransitionOutcome) {
        self.subscription = None;
        self.movement = None;
        self.lease = None;
        self.outcome = Some(outcome);
        self.stage = TransitionStage::Finished;
        info!(
            gate = self.config.name.as_str(),
            outcome = ?outcome,
            relocated_to = self.relocated_to.as_deref().unwrap_or("none"),
            "transition_finished"
        );
    }
}
