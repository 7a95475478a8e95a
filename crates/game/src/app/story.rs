use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::presentation::{SceneFaderConfig, TypedRevealOptions};
use engine::{
    CutsceneConfig, InputAction, LoopConfig, ScriptedAction, SpriteIntroConfig,
    TransitionGateConfig, Vec2,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub(crate) const STORY_FILE_NAME: &str = "story.json";

#[derive(Debug, Error)]
pub(crate) enum StoryError {
    #[error("failed to read story file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse story json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("story validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub(crate) struct StoryPoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl From<StoryPoint> for Vec2 {
    fn from(point: StoryPoint) -> Self {
        Vec2::new(point.x, point.y)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct StoryLoop {
    pub(crate) target_tps: u32,
    pub(crate) max_run_seconds: Option<f32>,
    pub(crate) realtime: bool,
    pub(crate) load_latency_ticks: u32,
    pub(crate) pitch_seed: u64,
}

impl Default for StoryLoop {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            target_tps: defaults.target_tps,
            max_run_seconds: Some(60.0),
            realtime: false,
            load_latency_ticks: defaults.load_latency_ticks,
            pitch_seed: defaults.pitch_seed,
        }
    }
}

impl StoryLoop {
    pub(crate) fn to_loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.target_tps,
            load_latency_ticks: self.load_latency_ticks,
            pitch_seed: self.pitch_seed,
            max_run_duration: self
                .max_run_seconds
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .map(Duration::from_secs_f32),
            realtime: self.realtime,
            ..LoopConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct StoryEntryPoint {
    pub(crate) id: String,
    pub(crate) position: StoryPoint,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct StoryGate {
    pub(crate) position: StoryPoint,
    #[serde(default = "default_gate_radius")]
    pub(crate) radius: f32,
    pub(crate) config: TransitionGateConfig,
}

fn default_gate_radius() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct StorySign {
    #[serde(default = "default_sign_box")]
    pub(crate) text_box: String,
    pub(crate) text: String,
}

fn default_sign_box() -> String {
    "SignText".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct StoryText {
    pub(crate) character_interval_seconds: f32,
    pub(crate) skip_silent_characters: bool,
}

impl Default for StoryText {
    fn default() -> Self {
        let defaults = TypedRevealOptions::default();
        Self {
            character_interval_seconds: defaults.character_interval_seconds,
            skip_silent_characters: defaults.skip_silent_characters,
        }
    }
}

impl From<&StoryText> for TypedRevealOptions {
    fn from(text: &StoryText) -> Self {
        TypedRevealOptions {
            character_interval_seconds: text.character_interval_seconds,
            skip_silent_characters: text.skip_silent_characters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct RoomSpec {
    #[serde(default)]
    pub(crate) player_start: StoryPoint,
    #[serde(default = "default_player_speed")]
    pub(crate) player_speed: f32,
    #[serde(default)]
    pub(crate) entry_points: Vec<StoryEntryPoint>,
    #[serde(default)]
    pub(crate) default_entry: Option<String>,
    #[serde(default)]
    pub(crate) gates: Vec<StoryGate>,
    #[serde(default)]
    pub(crate) sign: Option<StorySign>,
    #[serde(default)]
    pub(crate) fader: SceneFaderConfig,
    #[serde(default)]
    pub(crate) text: StoryText,
}

fn default_player_speed() -> f32 {
    4.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SceneSpec {
    Cutscene {
        name: String,
        #[serde(default)]
        music: String,
        #[serde(default)]
        text: StoryText,
        cutscene: CutsceneConfig,
    },
    SpriteIntro {
        name: String,
        #[serde(default)]
        music: String,
        intro: SpriteIntroConfig,
    },
    Room {
        name: String,
        #[serde(default)]
        music: String,
        room: RoomSpec,
    },
}

impl SceneSpec {
    pub(crate) fn name(&self) -> &str {
        match self {
            SceneSpec::Cutscene { name, .. }
            | SceneSpec::SpriteIntro { name, .. }
            | SceneSpec::Room { name, .. } => name,
        }
    }

    fn destinations(&self) -> Vec<(String, &str)> {
        match self {
            SceneSpec::Cutscene { cutscene, .. } => {
                vec![("cutscene.destination".to_string(), cutscene.destination.as_str())]
            }
            SceneSpec::SpriteIntro { intro, .. } => {
                vec![("intro.destination".to_string(), intro.destination.as_str())]
            }
            SceneSpec::Room { room, .. } => room
                .gates
                .iter()
                .enumerate()
                .map(|(index, gate)| {
                    (
                        format!("room.gates[{index}].config.destination_scene"),
                        gate.config.destination_scene.as_str(),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ScriptInput {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Skip,
    Confirm,
    Quit,
}

impl From<ScriptInput> for InputAction {
    fn from(input: ScriptInput) -> Self {
        match input {
            ScriptInput::MoveUp => InputAction::MoveUp,
            ScriptInput::MoveDown => InputAction::MoveDown,
            ScriptInput::MoveLeft => InputAction::MoveLeft,
            ScriptInput::MoveRight => InputAction::MoveRight,
            ScriptInput::Skip => InputAction::Skip,
            ScriptInput::Confirm => InputAction::Confirm,
            ScriptInput::Quit => InputAction::Quit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ScriptStep {
    pub(crate) at_seconds: f32,
    pub(crate) action: ScriptInput,
    #[serde(default)]
    pub(crate) hold_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct StoryFile {
    pub(crate) initial_scene: String,
    #[serde(default, rename = "loop")]
    pub(crate) loop_settings: StoryLoop,
    #[serde(default)]
    pub(crate) music_tracks: Vec<String>,
    pub(crate) scenes: Vec<SceneSpec>,
    #[serde(default)]
    pub(crate) script: Vec<ScriptStep>,
}

impl StoryFile {
    pub(crate) fn scripted_actions(&self) -> Vec<ScriptedAction> {
        self.script
            .iter()
            .map(|step| ScriptedAction {
                at_seconds: step.at_seconds,
                action: step.action.into(),
                hold_seconds: step.hold_seconds,
            })
            .collect()
    }
}

pub(crate) fn story_path(assets_dir: &Path, override_path: Option<PathBuf>) -> PathBuf {
    override_path.unwrap_or_else(|| assets_dir.join(STORY_FILE_NAME))
}

pub(crate) fn load_story(path: &Path) -> Result<StoryFile, StoryError> {
    let raw = fs::read_to_string(path).map_err(|source| StoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let story = parse_story(&raw)?;
    validate_story(&story)?;
    Ok(story)
}

pub(crate) fn parse_story(raw: &str) -> Result<StoryFile, StoryError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, StoryFile>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        StoryError::Parse {
            path: if path.is_empty() { ".".to_string() } else { path },
            message: source.to_string(),
        }
    })
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> StoryError {
    StoryError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

/// Rejects stories that cannot start. Dangling destinations are only warned
/// about: at runtime they leave a cutscene idle or time a transition out.
pub(crate) fn validate_story(story: &StoryFile) -> Result<(), StoryError> {
    if story.scenes.is_empty() {
        return Err(invalid("scenes", "at least one scene is required"));
    }

    let mut names = HashSet::new();
    for (index, scene) in story.scenes.iter().enumerate() {
        let name = scene.name().trim();
        if name.is_empty() {
            return Err(invalid(format!("scenes[{index}].name"), "must not be empty"));
        }
        if !names.insert(name) {
            return Err(invalid(
                format!("scenes[{index}].name"),
                format!("duplicate scene name {name:?}"),
            ));
        }
    }

    if !names.contains(story.initial_scene.as_str()) {
        return Err(invalid(
            "initial_scene",
            format!("no scene named {:?}", story.initial_scene),
        ));
    }

    for (index, scene) in story.scenes.iter().enumerate() {
        for (field, destination) in scene.destinations() {
            let destination = destination.trim();
            if !destination.is_empty() && !names.contains(destination) {
                warn!(
                    path = %format!("scenes[{index}].{field}"),
                    destination,
                    "story_destination_unknown"
                );
            }
        }
    }

    for (index, step) in story.script.iter().enumerate() {
        if !step.at_seconds.is_finite() || step.at_seconds < 0.0 {
            return Err(invalid(
                format!("script[{index}].at_seconds"),
                format!("expected a non-negative time, got {}", step.at_seconds),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "initial_scene": "Intro",
        "scenes": [
            {
                "kind": "cutscene",
                "name": "Intro",
                "cutscene": {
                    "units": [{ "object": "Cut1", "text_box": "Caption1", "text": "Long ago" }],
                    "destination": "RoomA"
                }
            },
            {
                "kind": "room",
                "name": "RoomA",
                "room": {
                    "entry_points": [{ "id": "MarkA", "position": { "x": 1.0, "y": 2.0 } }],
                    "gates": [{
                        "position": { "x": 3.0, "y": 0.0 },
                        "config": { "name": "east", "destination_scene": "RoomA" }
                    }]
                }
            }
        ],
        "script": [{ "at_seconds": 1.5, "action": "skip" }]
    }"#;

    #[test]
    fn minimal_story_parses_with_defaults() {
        let story = parse_story(MINIMAL).expect("story parses");
        validate_story(&story).expect("story is valid");

        assert_eq!(story.scenes.len(), 2);
        assert_eq!(story.loop_settings, StoryLoop::default());
        let SceneSpec::Room { room, .. } = &story.scenes[1] else {
            panic!("second scene is a room");
        };
        assert_eq!(room.gates[0].radius, 0.5);
        assert_eq!(room.gates[0].config.marker_id, "MarkA");
        assert_eq!(room.gates[0].config.load_timeout_seconds, Some(10.0));
        assert_eq!(room.player_speed, 4.0);

        let actions = story.scripted_actions();
        assert_eq!(actions[0].action, InputAction::Skip);
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let raw = MINIMAL.replace(r#""action": "skip""#, r#""action": "jump""#);
        match parse_story(&raw) {
            Err(StoryError::Parse { path, .. }) => assert_eq!(path, "script[0].action"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_initial_scene_is_rejected() {
        let raw = MINIMAL.replace(r#""initial_scene": "Intro""#, r#""initial_scene": "Attic""#);
        let story = parse_story(&raw).expect("story parses");
        assert!(matches!(
            validate_story(&story),
            Err(StoryError::Invalid { path, .. }) if path == "initial_scene"
        ));
    }

    #[test]
    fn duplicate_scene_names_are_rejected() {
        let raw = MINIMAL.replace(r#""name": "RoomA""#, r#""name": "Intro""#);
        let story = parse_story(&raw).expect("story parses");
        assert!(matches!(
            validate_story(&story),
            Err(StoryError::Invalid { path, .. }) if path == "scenes[1].name"
        ));
    }

    #[test]
    fn story_is_loaded_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = story_path(dir.path(), None);
        fs::write(&path, MINIMAL).expect("write story");

        let story = load_story(&path).expect("story loads");
        assert_eq!(story.initial_scene, "Intro");

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_story(&missing),
            Err(StoryError::Read { .. })
        ));
    }

    #[test]
    fn loop_settings_convert_to_loop_config() {
        let settings = StoryLoop {
            max_run_seconds: Some(2.5),
            target_tps: 30,
            ..StoryLoop::default()
        };
        let config = settings.to_loop_config();
        assert_eq!(config.target_tps, 30);
        assert_eq!(config.max_run_duration, Some(Duration::from_millis(2500)));
    }
}
