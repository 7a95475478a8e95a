mod cutscene;
mod room;
mod sprite_intro;

use engine::SceneDirector;
use tracing::debug;

use super::story::{SceneSpec, StoryFile};

pub(crate) use cutscene::CutsceneScene;
pub(crate) use room::RoomScene;
pub(crate) use sprite_intro::SpriteIntroScene;

/// Registers one factory per story scene. Each load builds the scene afresh
/// from its spec.
pub(crate) fn register_story_scenes(director: &mut SceneDirector, story: &StoryFile) {
    for spec in &story.scenes {
        let name = spec.name().to_string();
        match spec.clone() {
            SceneSpec::Cutscene {
                music,
                text,
                cutscene,
                ..
            } => {
                let scene_name = name.clone();
                director.register(&name, move || {
                    Box::new(CutsceneScene::new(
                        &scene_name,
                        &music,
                        (&text).into(),
                        cutscene.clone(),
                    ))
                });
                debug!(scene = name.as_str(), kind = "cutscene", "scene_registered");
            }
            SceneSpec::SpriteIntro { music, intro, .. } => {
                let scene_name = name.clone();
                director.register(&name, move || {
                    Box::new(SpriteIntroScene::new(&scene_name, &music, intro.clone()))
                });
                debug!(scene = name.as_str(), kind = "sprite_intro", "scene_registered");
            }
            SceneSpec::Room { music, room, .. } => {
                let scene_name = name.clone();
                director.register(&name, move || {
                    Box::new(RoomScene::new(&scene_name, &music, room.clone()))
                });
                debug!(scene = name.as_str(), kind = "room", "scene_registered");
            }
        }
    }
}

/// Asks for the scene's music unless the story leaves it blank.
fn request_music(music: &mut engine::MusicDirector, scene: &str, track: &str) {
    if track.is_empty() {
        return;
    }
    let change = music.change_track(track);
    debug!(scene, track, ?change, "scene_music_requested");
}
