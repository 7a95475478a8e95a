use engine::{
    InputAction, InputSnapshot, Scene, SceneCommand, SceneServices, SceneWorld, SequenceState,
    SpriteIntroConfig, SpriteIntroPipeline,
};
use tracing::{debug, info};

use super::request_music;

pub(crate) struct SpriteIntroScene {
    name: String,
    music: String,
    overlay: String,
    sprites: Vec<String>,
    pipeline: SpriteIntroPipeline,
    reported_finish: bool,
}

impl SpriteIntroScene {
    pub(crate) fn new(name: &str, music: &str, config: SpriteIntroConfig) -> Self {
        Self {
            name: name.to_string(),
            music: music.to_string(),
            overlay: config.overlay.clone(),
            sprites: config.sprites.clone(),
            pipeline: SpriteIntroPipeline::new(name, config),
            reported_finish: false,
        }
    }
}

impl Scene for SpriteIntroScene {
    fn load(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        world.spawn_fade_surface(&self.overlay, 1.0);
        for sprite in &self.sprites {
            world.spawn_fade_surface(sprite, 0.0);
        }
        request_music(services.music, &self.name, &self.music);
        self.pipeline.start();
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        services: &mut SceneServices<'_>,
    ) -> SceneCommand {
        if input.was_pressed(InputAction::Skip) && !self.pipeline.request_skip() {
            debug!(scene = self.name.as_str(), "sprite_intro_skip_ignored");
        }
        let state = {
            let mut cx = services.phase_context(fixed_dt_seconds, world);
            self.pipeline.tick(&mut cx)
        };
        if state == SequenceState::Completed && !self.reported_finish {
            self.reported_finish = true;
            info!(scene = self.name.as_str(), "sprite_intro_finished");
        }
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        if self.pipeline.state().is_active() {
            let mut cx = services.phase_context(0.0, world);
            self.pipeline.abort(&mut cx);
        }
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let phase = self
            .pipeline
            .sequencer()
            .current_label()
            .unwrap_or("idle");
        Some(format!("{} | {phase}", self.name))
    }
}
