//! Timed, interruptible presentation: fades, typed text, phase sequences and
//! the scene transitions built from them.

mod audio;
mod cutscene;
mod entry;
mod error;
mod fade;
mod fader;
mod music;
mod phase;
mod reveal;
mod sequencer;
mod session;
mod sprite_intro;
mod transition;

pub use audio::{AudioCue, RecordingAudio, SilentAudio};
pub use cutscene::{
    CutsceneConfig, CutscenePipeline, CutsceneUnit, DEFAULT_CUTSCENE_FADE_SURFACE,
    DEFAULT_FADE_DURATION_SECONDS, DEFAULT_FINAL_HOLD_SECONDS, DEFAULT_SKIP_SETTLE_SECONDS,
    DEFAULT_UNIT_DELAY_SECONDS,
};
pub use entry::{apply_entry_points, place_player, spawn_at, Placement};
pub use error::PresentationError;
pub use fade::{clamp01, fade, lerp, FadeInterpolator, FadeSamples, OPACITY_OPAQUE, OPACITY_TRANSPARENT};
pub use fader::{SceneFader, SceneFaderConfig, DEFAULT_SCENE_FADE_SECONDS, DEFAULT_SCENE_FADE_SURFACE};
pub use music::{MusicChange, MusicDirector, MusicPlayer, TrackLibrary, DEFAULT_MUSIC_FADE_SECONDS};
pub use phase::{
    CancelToken, FadePhase, HoldPhase, LoadPhase, Phase, PhaseContext, PhaseKind, PhaseStatus,
    RevealPhase, SkipSignal, VisibilityPhase, WaitPhase,
};
pub use reveal::{
    FormatDirective, PitchJitter, RevealBuffer, RevealUnit, Rgb, TypedReveal, TypedRevealOptions,
    DEFAULT_CHARACTER_INTERVAL_SECONDS, PITCH_JITTER_MAX, PITCH_JITTER_MIN,
};
pub use sequencer::{PhaseOutcome, PhaseRecord, PhaseSequencer, PhaseSlot, SequenceState};
pub(crate) use session::lock_recovering;
pub use session::{
    MovementGate, MovementLock, SessionContext, SpawnHandoff, TransitionGuard, TransitionLease,
};
pub use sprite_intro::{
    SpriteIntroConfig, SpriteIntroPipeline, DEFAULT_SPRITE_FADE_SPEED, DEFAULT_SPRITE_HOLD_SECONDS,
    DEFAULT_SPRITE_OVERLAY,
};
pub use transition::{
    TransitionContext, TransitionGate, TransitionGateConfig, TransitionOutcome, TransitionStage,
    TransitionTask, DEFAULT_LOAD_TIMEOUT_SECONDS, DEFAULT_POST_LOAD_DELAY_SECONDS,
    DEFAULT_TRANSITION_COOLDOWN_SECONDS, DEFAULT_TRANSITION_FADE_SECONDS,
    DEFAULT_TRANSITION_FADE_SURFACE, DEFAULT_TRANSITION_MARKER,
};
