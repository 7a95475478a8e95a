use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::audio::AudioCue;
use super::error::PresentationError;
use super::fade::FadeInterpolator;
use crate::app::{EntityId, SceneLoadQueue, SceneWorld};

/// Everything a phase may touch during one tick.
pub struct PhaseContext<'a> {
    pub dt_seconds: f32,
    pub world: &'a mut SceneWorld,
    pub audio: &'a mut dyn AudioCue,
    pub loads: &'a mut SceneLoadQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Fade,
    Wait,
    TypedReveal,
    Visibility,
    ExternalLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Suspended until the next tick.
    Running,
    /// Finished; this tick was spent, the next phase starts next tick.
    Done,
    /// Finished without suspending; the next phase starts this tick.
    Instant,
}

/// One resumable, interruptible step function of a sequence.
pub trait Phase {
    fn label(&self) -> &str;
    fn kind(&self) -> PhaseKind;
    fn cancellable(&self) -> bool {
        true
    }
    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus;
    /// Puts whatever this phase owns into its logical end state. Called
    /// instead of further steps when the phase is interrupted.
    fn settle(&mut self, _cx: &mut PhaseContext<'_>) {}
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Latched one-shot request, cleared by whoever takes it.
#[derive(Debug, Clone, Default)]
pub struct SkipSignal {
    raised: Arc<AtomicBool>,
}

impl SkipSignal {
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone)]
struct FadeTrack {
    surface: String,
    from: Option<f32>,
    to: f32,
    active: Option<(EntityId, FadeInterpolator)>,
}

/// Fades one or more named surfaces together over the same duration.
///
/// Surfaces are resolved by name on the first step, so a phase built before a
/// load binds to whatever surface the active scene has when it runs. Unless an
/// explicit start is given, each track starts from the surface's current opacity.
#[derive(Debug, Clone)]
pub struct FadePhase {
    label: String,
    duration_seconds: f32,
    tracks: Vec<FadeTrack>,
    started: bool,
}

impl FadePhase {
    pub fn new(label: impl Into<String>, surface: &str, to: f32, duration_seconds: f32) -> Self {
        Self {
            label: label.into(),
            duration_seconds,
            tracks: vec![FadeTrack {
                surface: surface.to_string(),
                from: None,
                to,
                active: None,
            }],
            started: false,
        }
    }

    pub fn starting_at(mut self, from: f32) -> Self {
        if let Some(track) = self.tracks.first_mut() {
            track.from = Some(from);
        }
        self
    }

    pub fn with_track(mut self, surface: &str, from: Option<f32>, to: f32) -> Self {
        self.tracks.push(FadeTrack {
            surface: surface.to_string(),
            from,
            to,
            active: None,
        });
        self
    }

    fn bind(&mut self, world: &SceneWorld) {
        self.started = true;
        for track in &mut self.tracks {
            let Some(id) = world.find_by_name(&track.surface) else {
                warn!(
                    phase = self.label.as_str(),
                    error = %PresentationError::missing("fade surface", track.surface.as_str()),
                    "fade_track_skipped"
                );
                continue;
            };
            let from = track
                .from
                .or_else(|| world.opacity(id))
                .unwrap_or(track.to);
            track.active = Some((
                id,
                FadeInterpolator::new(from, track.to, self.duration_seconds),
            ));
        }
    }
}

impl Phase for FadePhase {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::Fade
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        if !self.started {
            self.bind(cx.world);
        }

        let mut any_running = false;
        let mut any_sampled = false;
        for track in &mut self.tracks {
            let Some((id, fade)) = track.active.as_mut() else {
                continue;
            };
            if let Some(opacity) = fade.advance(cx.dt_seconds) {
                cx.world.set_opacity(*id, opacity);
                any_sampled = true;
            }
            any_running |= !fade.is_finished();
        }

        if any_running {
            PhaseStatus::Running
        } else if any_sampled && self.duration_seconds > 0.0 {
            PhaseStatus::Done
        } else {
            PhaseStatus::Instant
        }
    }

    fn settle(&mut self, cx: &mut PhaseContext<'_>) {
        for track in &mut self.tracks {
            if let Some((id, fade)) = track.active.as_mut() {
                let target = fade.finish();
                cx.world.set_opacity(*id, target);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaitPhase {
    label: String,
    duration_seconds: f32,
    elapsed_seconds: f32,
}

impl WaitPhase {
    pub fn new(label: impl Into<String>, duration_seconds: f32) -> Self {
        Self {
            label: label.into(),
            duration_seconds,
            elapsed_seconds: 0.0,
        }
    }
}

impl Phase for WaitPhase {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::Wait
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        if self.duration_seconds <= 0.0 || !self.duration_seconds.is_finite() {
            return PhaseStatus::Instant;
        }
        self.elapsed_seconds += cx.dt_seconds.max(0.0);
        if self.elapsed_seconds >= self.duration_seconds {
            PhaseStatus::Done
        } else {
            PhaseStatus::Running
        }
    }
}

/// A wait that a [`SkipSignal`] can end early. Skipping only ends this hold.
#[derive(Debug, Clone)]
pub struct HoldPhase {
    wait: WaitPhase,
    skip: SkipSignal,
}

impl HoldPhase {
    pub fn new(label: impl Into<String>, duration_seconds: f32, skip: SkipSignal) -> Self {
        Self {
            wait: WaitPhase::new(label, duration_seconds),
            skip,
        }
    }
}

impl Phase for HoldPhase {
    fn label(&self) -> &str {
        self.wait.label()
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::Wait
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        if self.skip.take() {
            debug!(phase = self.wait.label(), "hold_skipped");
            return PhaseStatus::Done;
        }
        self.wait.step(cx)
    }
}

/// Types a text into a named text box and runs until the reveal stops.
#[derive(Debug, Clone)]
pub struct RevealPhase {
    label: String,
    text_box: String,
    text: String,
    bound: Option<EntityId>,
    started: bool,
}

impl RevealPhase {
    pub fn new(label: impl Into<String>, text_box: &str, text: &str) -> Self {
        Self {
            label: label.into(),
            text_box: text_box.to_string(),
            text: text.to_string(),
            bound: None,
            started: false,
        }
    }
}

impl Phase for RevealPhase {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::TypedReveal
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        if !self.started {
            self.started = true;
            let started = cx
                .world
                .find_by_name(&self.text_box)
                .ok_or_else(|| PresentationError::missing("text box", self.text_box.as_str()))
                .and_then(|id| cx.world.start_text(id, &self.text).map(|()| id));
            match started {
                Ok(id) => self.bound = Some(id),
                Err(error) => {
                    warn!(phase = self.label.as_str(), error = %error, "reveal_skipped");
                    return PhaseStatus::Instant;
                }
            }
        }

        let Some(id) = self.bound else {
            return PhaseStatus::Instant;
        };
        cx.world.advance_text(id, cx.dt_seconds, &mut *cx.audio);
        if cx.world.text(id).is_some_and(|reveal| reveal.is_running()) {
            PhaseStatus::Running
        } else {
            PhaseStatus::Done
        }
    }

    fn settle(&mut self, cx: &mut PhaseContext<'_>) {
        if let Some(id) = self.bound {
            if let Some(reveal) = cx.world.text_mut(id) {
                reveal.stop_and_clear(&mut *cx.audio);
            }
        }
    }
}

/// Shows or hides named entities in one step.
#[derive(Debug, Clone)]
pub struct VisibilityPhase {
    label: String,
    targets: Vec<(String, bool)>,
    clear_hidden_text: bool,
}

impl VisibilityPhase {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            targets: Vec::new(),
            clear_hidden_text: false,
        }
    }

    pub fn show(mut self, name: &str) -> Self {
        self.targets.push((name.to_string(), true));
        self
    }

    pub fn hide(mut self, name: &str) -> Self {
        self.targets.push((name.to_string(), false));
        self
    }

    /// Also stop and clear any text box this phase hides.
    pub fn clearing_hidden_text(mut self) -> Self {
        self.clear_hidden_text = true;
        self
    }

    fn apply(&self, cx: &mut PhaseContext<'_>) {
        for (name, visible) in &self.targets {
            let Some(id) = cx.world.find_by_name(name) else {
                warn!(
                    phase = self.label.as_str(),
                    error = %PresentationError::missing("entity", name.as_str()),
                    "visibility_target_skipped"
                );
                continue;
            };
            cx.world.set_visible(id, *visible);
            if !*visible && self.clear_hidden_text {
                if let Some(reveal) = cx.world.text_mut(id) {
                    reveal.stop_and_clear(&mut *cx.audio);
                }
            }
        }
    }
}

impl Phase for VisibilityPhase {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::Visibility
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        self.apply(cx);
        PhaseStatus::Instant
    }
}

/// Requests a scene load. An empty destination leaves the scene idle.
#[derive(Debug, Clone)]
pub struct LoadPhase {
    label: String,
    destination: String,
}

impl LoadPhase {
    pub fn new(label: impl Into<String>, destination: &str) -> Self {
        Self {
            label: label.into(),
            destination: destination.to_string(),
        }
    }
}

impl Phase for LoadPhase {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> PhaseKind {
        PhaseKind::ExternalLoad
    }

    fn cancellable(&self) -> bool {
        false
    }

    fn step(&mut self, cx: &mut PhaseContext<'_>) -> PhaseStatus {
        if !cx.loads.request_load(&self.destination) {
            debug!(phase = self.label.as_str(), "no_destination_staying_idle");
        }
        PhaseStatus::Instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::{RecordingAudio, TypedRevealOptions};

    const DT: f32 = 0.25;

    struct Harness {
        world: SceneWorld,
        audio: RecordingAudio,
        loads: SceneLoadQueue,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                world: SceneWorld::default(),
                audio: RecordingAudio::default(),
                loads: SceneLoadQueue::new(0),
            }
        }

        fn step(&mut self, phase: &mut dyn Phase) -> PhaseStatus {
            let mut cx = PhaseContext {
                dt_seconds: DT,
                world: &mut self.world,
                audio: &mut self.audio,
                loads: &mut self.loads,
            };
            phase.step(&mut cx)
        }

        fn settle(&mut self, phase: &mut dyn Phase) {
            let mut cx = PhaseContext {
                dt_seconds: DT,
                world: &mut self.world,
                audio: &mut self.audio,
                loads: &mut self.loads,
            };
            phase.settle(&mut cx);
        }
    }

    #[test]
    fn fade_phase_starts_from_current_opacity_and_ends_exactly() {
        let mut harness = Harness::new();
        let fade = harness.world.spawn_fade_surface("Black", 0.5);
        let mut phase = FadePhase::new("fade_out", "Black", 1.0, 1.0);

        assert_eq!(harness.step(&mut phase), PhaseStatus::Running);
        assert_eq!(harness.world.opacity(fade), Some(0.625));
        let mut status = PhaseStatus::Running;
        while status == PhaseStatus::Running {
            status = harness.step(&mut phase);
        }
        assert_eq!(status, PhaseStatus::Done);
        assert_eq!(harness.world.opacity(fade), Some(1.0));
    }

    #[test]
    fn fade_phase_with_missing_surface_is_a_noop() {
        let mut harness = Harness::new();
        let mut phase = FadePhase::new("fade_out", "Nowhere", 1.0, 1.0);
        assert_eq!(harness.step(&mut phase), PhaseStatus::Instant);
    }

    #[test]
    fn settling_a_fade_jumps_to_target() {
        let mut harness = Harness::new();
        let fade = harness.world.spawn_fade_surface("Black", 1.0);
        let mut phase = FadePhase::new("fade_in", "Black", 0.0, 2.0);
        harness.step(&mut phase);
        assert!(harness.world.opacity(fade).is_some_and(|value| value > 0.0));

        harness.settle(&mut phase);
        assert_eq!(harness.world.opacity(fade), Some(0.0));
    }

    #[test]
    fn crossfade_moves_tracks_in_opposite_directions() {
        let mut harness = Harness::new();
        let sprite = harness.world.spawn_fade_surface("Sprite", 0.3);
        let overlay = harness.world.spawn_fade_surface("Overlay", 0.3);
        let mut phase = FadePhase::new("crossfade", "Sprite", 1.0, 0.5)
            .starting_at(0.0)
            .with_track("Overlay", Some(1.0), 0.0);

        assert_eq!(harness.step(&mut phase), PhaseStatus::Running);
        assert_eq!(harness.world.opacity(sprite), Some(0.5));
        assert_eq!(harness.world.opacity(overlay), Some(0.5));
        assert_eq!(harness.step(&mut phase), PhaseStatus::Done);
        assert_eq!(harness.world.opacity(sprite), Some(1.0));
        assert_eq!(harness.world.opacity(overlay), Some(0.0));
    }

    #[test]
    fn zero_duration_fade_is_instant() {
        let mut harness = Harness::new();
        let fade = harness.world.spawn_fade_surface("Black", 0.0);
        let mut phase = FadePhase::new("snap", "Black", 1.0, 0.0);
        assert_eq!(harness.step(&mut phase), PhaseStatus::Instant);
        assert_eq!(harness.world.opacity(fade), Some(1.0));
    }

    #[test]
    fn wait_phase_completes_after_duration() {
        let mut harness = Harness::new();
        let mut phase = WaitPhase::new("hold", 0.5);
        assert_eq!(harness.step(&mut phase), PhaseStatus::Running);
        assert_eq!(harness.step(&mut phase), PhaseStatus::Done);

        let mut empty = WaitPhase::new("none", 0.0);
        assert_eq!(harness.step(&mut empty), PhaseStatus::Instant);
    }

    #[test]
    fn hold_phase_ends_when_skip_is_raised() {
        let mut harness = Harness::new();
        let skip = SkipSignal::default();
        let mut phase = HoldPhase::new("hold", 10.0, skip.clone());
        assert_eq!(harness.step(&mut phase), PhaseStatus::Running);
        skip.raise();
        assert_eq!(harness.step(&mut phase), PhaseStatus::Done);
        assert!(!skip.take());
    }

    #[test]
    fn reveal_phase_runs_until_text_is_typed() {
        let mut harness = Harness::new();
        let options = TypedRevealOptions {
            character_interval_seconds: DT,
            skip_silent_characters: true,
        };
        let text = harness.world.spawn_text_box("Caption", options);
        let mut phase = RevealPhase::new("type_text", "Caption", "Hi");

        let mut ticks = 0;
        while harness.step(&mut phase) == PhaseStatus::Running {
            ticks += 1;
        }
        assert_eq!(ticks, 2);
        let reveal = harness.world.text(text).expect("text box");
        assert_eq!(reveal.buffer().plain_text(), "Hi");
        assert_eq!(harness.audio.one_shots.len(), 2);
    }

    #[test]
    fn settling_reveal_clears_text() {
        let mut harness = Harness::new();
        let text = harness
            .world
            .spawn_text_box("Caption", TypedRevealOptions::default());
        let mut phase = RevealPhase::new("type_text", "Caption", "Hello");
        harness.step(&mut phase);

        harness.settle(&mut phase);

        let reveal = harness.world.text(text).expect("text box");
        assert!(!reveal.is_running());
        assert!(reveal.buffer().is_empty());
    }

    #[test]
    fn visibility_phase_can_clear_hidden_text() {
        let mut harness = Harness::new();
        let text = harness
            .world
            .spawn_text_box("Caption", TypedRevealOptions::default());
        harness.world.start_text(text, "Hello").expect("text box");
        harness.world.advance_text(text, DT, &mut harness.audio);
        let mut phase = VisibilityPhase::new("reset")
            .hide("Caption")
            .hide("Missing")
            .clearing_hidden_text();

        assert_eq!(harness.step(&mut phase), PhaseStatus::Instant);
        assert!(!harness.world.is_visible(text));
        assert!(harness.world.text(text).is_some_and(|r| r.buffer().is_empty()));
    }

    #[test]
    fn load_phase_requests_destination_or_stays_idle() {
        let mut harness = Harness::new();
        let mut idle = LoadPhase::new("load", "");
        assert_eq!(harness.step(&mut idle), PhaseStatus::Instant);
        assert_eq!(harness.loads.pending_destination(), None);

        let mut load = LoadPhase::new("load", "Room1");
        assert_eq!(harness.step(&mut load), PhaseStatus::Instant);
        assert_eq!(harness.loads.pending_destination(), Some("Room1"));
        assert!(!load.cancellable());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::default();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
