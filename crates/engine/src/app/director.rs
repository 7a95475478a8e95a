use std::collections::HashMap;

use tracing::{info, warn};

use super::input::InputSnapshot;
use super::loading::{SceneLoadQueue, DEFAULT_LOAD_LATENCY_TICKS};
use super::loop_runner::AppError;
use super::scene::{Scene, SceneCommand, SceneServices, SceneWorld};
use crate::presentation::{
    AudioCue, MusicDirector, SessionContext, TransitionContext, TransitionTask,
};

pub type SceneFactory = Box<dyn Fn() -> Box<dyn Scene>>;

#[derive(Debug, Clone, Copy)]
pub struct DirectorConfig {
    pub load_latency_ticks: u32,
    /// Base seed for the pitch jitter of every world this director builds.
    pub pitch_seed: u64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            load_latency_ticks: DEFAULT_LOAD_LATENCY_TICKS,
            pitch_seed: 0,
        }
    }
}

struct ActiveScene {
    name: String,
    scene: Box<dyn Scene>,
    world: SceneWorld,
}

/// Owns the session: the loaded scene and its world, pending loads, the
/// session context, in-flight transitions and music. A load destroys the
/// current scene and world and builds fresh ones from the registered factory.
pub struct SceneDirector {
    factories: HashMap<String, SceneFactory>,
    active: Option<ActiveScene>,
    loads: SceneLoadQueue,
    session: SessionContext,
    transitions: Vec<TransitionTask>,
    audio: Box<dyn AudioCue>,
    music: MusicDirector,
    pitch_seed: u64,
    scenes_loaded: u64,
}

impl SceneDirector {
    pub fn new(config: DirectorConfig, audio: Box<dyn AudioCue>, music: MusicDirector) -> Self {
        Self {
            factories: HashMap::new(),
            active: None,
            loads: SceneLoadQueue::new(config.load_latency_ticks),
            session: SessionContext::new(),
            transitions: Vec::new(),
            audio,
            music,
            pitch_seed: config.pitch_seed,
            scenes_loaded: 0,
        }
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Scene> + 'static,
    {
        if self
            .factories
            .insert(name.to_string(), Box::new(factory))
            .is_some()
        {
            warn!(scene = name, "scene_factory_replaced");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Loads the first scene synchronously.
    pub fn start(&mut self, initial: &str) -> Result<(), AppError> {
        if !self.load_scene(initial) {
            return Err(AppError::UnknownScene {
                name: initial.to_string(),
            });
        }
        Ok(())
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let Some(active) = self.active.as_mut() else {
            return SceneCommand::None;
        };

        let command = {
            let mut services = SceneServices::new(
                &self.session,
                &mut self.loads,
                self.audio.as_mut(),
                &mut self.music,
                &mut self.transitions,
            );
            active
                .scene
                .update(fixed_dt_seconds, input, &mut active.world, &mut services)
        };

        for task in &mut self.transitions {
            let mut cx = TransitionContext {
                dt_seconds: fixed_dt_seconds,
                world: &mut active.world,
                loads: &mut self.loads,
                session: &self.session,
            };
            task.tick(&mut cx);
        }
        self.transitions.retain(|task| !task.is_finished());

        self.music.tick(fixed_dt_seconds);

        if let Some(destination) = self.loads.poll_due() {
            self.load_scene(&destination);
        }
        command
    }

    pub fn active_scene_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn active_world(&self) -> Option<&SceneWorld> {
        self.active.as_ref().map(|active| &active.world)
    }

    pub fn debug_title(&self) -> Option<String> {
        self.active
            .as_ref()
            .and_then(|active| active.scene.debug_title(&active.world))
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn loads(&self) -> &SceneLoadQueue {
        &self.loads
    }

    pub fn music(&self) -> &MusicDirector {
        &self.music
    }

    pub fn transitions_in_flight(&self) -> usize {
        self.transitions.len()
    }

    pub fn scenes_loaded(&self) -> u64 {
        self.scenes_loaded
    }

    /// Unloads the active scene and drops in-flight transitions, releasing
    /// whatever session state they held.
    pub fn shutdown(&mut self) {
        self.unload_active();
        self.transitions.clear();
        info!(scenes_loaded = self.scenes_loaded, "director_shutdown");
    }

    fn load_scene(&mut self, name: &str) -> bool {
        let Some(factory) = self.factories.get(name) else {
            warn!(scene = name, "scene_unknown; load never completes");
            return false;
        };
        let scene = factory();

        self.unload_active();

        let seed = self.pitch_seed.wrapping_add(self.scenes_loaded);
        let mut active = ActiveScene {
            name: name.to_string(),
            scene,
            world: SceneWorld::new(seed),
        };
        {
            let mut services = SceneServices::new(
                &self.session,
                &mut self.loads,
                self.audio.as_mut(),
                &mut self.music,
                &mut self.transitions,
            );
            active.scene.load(&mut active.world, &mut services);
        }
        info!(
            scene = name,
            entity_count = active.world.entity_count(),
            "scene_loaded"
        );
        self.active = Some(active);
        self.scenes_loaded = self.scenes_loaded.saturating_add(1);
        self.loads.announce_complete(name);
        true
    }

    fn unload_active(&mut self) {
        let Some(mut previous) = self.active.take() else {
            return;
        };
        let mut services = SceneServices::new(
            &self.session,
            &mut self.loads,
            self.audio.as_mut(),
            &mut self.music,
            &mut self.transitions,
        );
        previous.scene.unload(&mut previous.world, &mut services);
        info!(scene = previous.name.as_str(), "scene_unloaded");
    }
}
