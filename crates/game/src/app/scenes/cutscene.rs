use engine::{
    CutsceneConfig, CutscenePipeline, EntityRole, InputAction, InputSnapshot, Scene,
    SceneCommand, SceneServices, SceneWorld, SequenceState, Transform, TypedRevealOptions,
};
use tracing::info;

use super::request_music;

pub(crate) struct CutsceneScene {
    name: String,
    music: String,
    text: TypedRevealOptions,
    pipeline: CutscenePipeline,
    reported_finish: bool,
}

impl CutsceneScene {
    pub(crate) fn new(
        name: &str,
        music: &str,
        text: TypedRevealOptions,
        config: CutsceneConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            music: music.to_string(),
            text,
            pipeline: CutscenePipeline::new(name, config),
            reported_finish: false,
        }
    }

    /// Builds the fade surface plus every prop and text box the units name.
    fn populate(&self, world: &mut SceneWorld) {
        let config = self.pipeline.config();
        world.spawn_fade_surface(&config.fade_surface, 1.0);
        for unit in &config.units {
            if let Some(object) = unit.object.as_deref() {
                if world.find_by_name(object).is_none() {
                    world.spawn(object, EntityRole::Prop, Transform::default());
                }
            }
            if let Some(text_box) = unit.text_box.as_deref() {
                if world.find_by_name(text_box).is_none() {
                    world.spawn_text_box(text_box, self.text);
                }
            }
        }
    }
}

impl Scene for CutsceneScene {
    fn load(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        self.populate(world);
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
        if input.was_pressed(InputAction::Skip) {
            self.pipeline.request_skip();
        }
        let state = {
            let mut cx = services.phase_context(fixed_dt_seconds, world);
            self.pipeline.tick(&mut cx)
        };
        if !state.is_active() && !self.reported_finish {
            self.reported_finish = true;
            info!(
                scene = self.name.as_str(),
                ?state,
                phases = self.pipeline.sequencer().history().len(),
                "cutscene_finished"
            );
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
        let phase = match self.pipeline.state() {
            SequenceState::Running | SequenceState::Finalizing => self
                .pipeline
                .sequencer()
                .current_label()
                .unwrap_or("between phases"),
            _ => "idle",
        };
        Some(format!("{} | {phase}", self.name))
    }
}
