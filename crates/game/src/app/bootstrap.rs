use std::path::PathBuf;

use engine::presentation::TrackLibrary;
use engine::{
    resolve_app_paths, AudioCue, DirectorConfig, LoopConfig, MusicDirector, SceneDirector,
    ScriptedInput, StartupError,
};
use thiserror::Error;
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

use super::scenes;
use super::story::{self, StoryError, StoryFile};

const STORY_ENV_VAR: &str = "CUTSCENE_STORY";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Paths(#[from] StartupError),
    #[error(transparent)]
    Story(#[from] StoryError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) director: SceneDirector,
    pub(crate) initial_scene: String,
    pub(crate) input: ScriptedInput,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Cutscene Director Startup ===");

    let paths = resolve_app_paths()?;
    let story_path = story::story_path(&paths.assets_dir, story_override_from_env());
    info!(
        root = %paths.root.display(),
        story = %story_path.display(),
        "paths_resolved"
    );
    let story = story::load_story(&story_path)?;
    Ok(wire_story(story))
}

/// Builds everything a run needs from a validated story.
pub(crate) fn wire_story(story: StoryFile) -> AppWiring {
    let config = story.loop_settings.to_loop_config();
    let director = build_director(&story, &config);
    info!(
        scenes = story.scenes.len(),
        tracks = story.music_tracks.len(),
        scripted_inputs = story.script.len(),
        initial_scene = story.initial_scene.as_str(),
        "story_wired"
    );
    AppWiring {
        input: ScriptedInput::new(story.scripted_actions()),
        initial_scene: story.initial_scene,
        director,
        config,
    }
}

pub(crate) fn build_director(story: &StoryFile, config: &LoopConfig) -> SceneDirector {
    let music = MusicDirector::new(Box::new(TrackLibrary::new(story.music_tracks.iter())));
    let mut director = SceneDirector::new(
        DirectorConfig {
            load_latency_ticks: config.load_latency_ticks,
            pitch_seed: config.pitch_seed,
        },
        Box::new(TracingAudio),
        music,
    );
    scenes::register_story_scenes(&mut director, story);
    director
}

/// Headless stand-in for a sound device.
struct TracingAudio;

impl AudioCue for TracingAudio {
    fn play_one_shot(&mut self, pitch: f32) {
        trace!(pitch, "audio_one_shot");
    }

    fn stop(&mut self) {
        trace!("audio_stop");
    }
}

fn story_override_from_env() -> Option<PathBuf> {
    std::env::var_os(STORY_ENV_VAR)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
