use tracing::warn;

use super::input::InputSnapshot;
use super::loading::SceneLoadQueue;
use crate::presentation::{
    AudioCue, MusicDirector, PhaseContext, PitchJitter, PresentationError, SessionContext,
    TransitionTask, TypedReveal, TypedRevealOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRole {
    Player,
    Prop,
    FadeSurface,
    Text,
}

impl EntityRole {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Prop => "prop",
            Self::FadeSurface => "fade_surface",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub role: EntityRole,
    pub transform: Transform,
    pub visible: bool,
    opacity: f32,
    text: Option<TypedReveal>,
}

impl Entity {
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn text(&self) -> Option<&TypedReveal> {
        self.text.as_ref()
    }
}

/// A named position a relocated player can be placed at.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub id: String,
    pub position: Vec2,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Per-scene state the presentation core reads and writes: visual surfaces,
/// text boxes, the player and its entry points. Rendering it is someone else's job.
#[derive(Debug)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    entry_points: Vec<EntryPoint>,
    pitch_seed: u64,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SceneWorld {
    pub fn new(pitch_seed: u64) -> Self {
        Self {
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
            entry_points: Vec::new(),
            pitch_seed,
        }
    }

    pub fn spawn(&mut self, name: &str, role: EntityRole, transform: Transform) -> EntityId {
        if self.find_by_name(name).is_some() {
            warn!(name, role = role.as_token(), "duplicate_entity_name; lookups resolve to the first");
        }
        let id = self.allocator.allocate();
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            role,
            transform,
            visible: true,
            opacity: 1.0,
            text: None,
        });
        id
    }

    pub fn spawn_fade_surface(&mut self, name: &str, opacity: f32) -> EntityId {
        let id = self.spawn(name, EntityRole::FadeSurface, Transform::default());
        self.set_opacity(id, opacity);
        id
    }

    pub fn spawn_text_box(&mut self, name: &str, options: TypedRevealOptions) -> EntityId {
        let id = self.spawn(name, EntityRole::Text, Transform::default());
        let seed = self.pitch_seed.wrapping_add(id.0);
        if let Some(entity) = self.entity_mut(id) {
            entity.text = Some(TypedReveal::new(options, PitchJitter::seeded(seed)));
        }
        id
    }

    pub fn add_entry_point(&mut self, id: &str, position: Vec2) {
        self.entry_points.push(EntryPoint {
            id: id.to_string(),
            position,
        });
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    pub fn find_entry_point(&self, id: &str) -> Option<Vec2> {
        self.entry_points
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.position)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|entity| entity.name == name)
            .map(|entity| entity.id)
    }

    pub fn find_entity_by_role(&self, role: EntityRole) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|entity| entity.role == role)
            .map(|entity| entity.id)
    }

    pub fn opacity(&self, id: EntityId) -> Option<f32> {
        self.entity(id).map(Entity::opacity)
    }

    pub fn set_opacity(&mut self, id: EntityId, opacity: f32) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.opacity = crate::presentation::clamp01(opacity);
                true
            }
            None => false,
        }
    }

    pub fn is_visible(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|entity| entity.visible)
    }

    pub fn set_visible(&mut self, id: EntityId, visible: bool) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.entity(id).map(|entity| entity.transform.position)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.entity_mut(id) {
            Some(entity) => {
                entity.transform.position = position;
                true
            }
            None => false,
        }
    }

    pub fn text(&self, id: EntityId) -> Option<&TypedReveal> {
        self.entity(id).and_then(Entity::text)
    }

    pub fn text_mut(&mut self, id: EntityId) -> Option<&mut TypedReveal> {
        self.entity_mut(id).and_then(|entity| entity.text.as_mut())
    }

    /// Starts typing into a text box. Returns an error if `id` is not a text box.
    pub fn start_text(&mut self, id: EntityId, text: &str) -> Result<(), PresentationError> {
        let name = self.entity(id).map(|entity| entity.name.clone());
        match self.text_mut(id) {
            Some(reveal) => {
                reveal.start(text);
                Ok(())
            }
            None => Err(PresentationError::missing(
                "text box",
                name.unwrap_or_else(|| format!("#{}", id.0)),
            )),
        }
    }

    pub fn advance_text(&mut self, id: EntityId, dt_seconds: f32, audio: &mut dyn AudioCue) -> bool {
        self.text_mut(id)
            .is_some_and(|reveal| reveal.advance(dt_seconds, audio))
    }

    /// Stops and clears every text box in the scene.
    pub fn stop_all_text(&mut self, audio: &mut dyn AudioCue) {
        for entity in &mut self.entities {
            if let Some(reveal) = entity.text.as_mut() {
                reveal.stop_and_clear(audio);
            }
        }
    }
}

/// Session-scoped services a scene may use while it is loaded.
pub struct SceneServices<'a> {
    pub session: &'a SessionContext,
    pub loads: &'a mut SceneLoadQueue,
    pub audio: &'a mut dyn AudioCue,
    pub music: &'a mut MusicDirector,
    transitions: &'a mut Vec<TransitionTask>,
}

impl<'a> SceneServices<'a> {
    pub fn new(
        session: &'a SessionContext,
        loads: &'a mut SceneLoadQueue,
        audio: &'a mut dyn AudioCue,
        music: &'a mut MusicDirector,
        transitions: &'a mut Vec<TransitionTask>,
    ) -> Self {
        Self {
            session,
            loads,
            audio,
            music,
            transitions,
        }
    }

    pub fn phase_context<'b>(
        &'b mut self,
        dt_seconds: f32,
        world: &'b mut SceneWorld,
    ) -> PhaseContext<'b> {
        PhaseContext {
            dt_seconds,
            world,
            audio: &mut *self.audio,
            loads: &mut *self.loads,
        }
    }

    /// Hands a transition to the director, which keeps running it after this
    /// scene is unloaded.
    pub fn begin_transition(&mut self, task: TransitionTask) {
        self.transitions.push(task);
    }

    pub fn transitions_in_flight(&self) -> usize {
        self.transitions.len()
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        services: &mut SceneServices<'_>,
    ) -> SceneCommand;
    /// Called right before the scene and its world are destroyed.
    fn unload(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::RecordingAudio;

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        assert_ne!(first, second);
    }

    #[test]
    fn lookups_by_name_and_role() {
        let mut world = SceneWorld::default();
        let player = world.spawn("Frisk", EntityRole::Player, Transform::default());
        let fade = world.spawn_fade_surface("FadeImage", 0.0);

        assert_eq!(world.find_by_name("FadeImage"), Some(fade));
        assert_eq!(world.find_entity_by_role(EntityRole::Player), Some(player));
        assert_eq!(world.find_by_name("Missing"), None);
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut world = SceneWorld::default();
        let fade = world.spawn_fade_surface("Fade", 3.0);
        assert_eq!(world.opacity(fade), Some(1.0));
        assert!(world.set_opacity(fade, -1.0));
        assert_eq!(world.opacity(fade), Some(0.0));
        assert!(!world.set_opacity(EntityId(99), 0.5));
    }

    #[test]
    fn entry_points_resolve_by_id() {
        let mut world = SceneWorld::default();
        world.add_entry_point("MarkA", Vec2::new(3.0, -2.0));
        assert_eq!(world.find_entry_point("MarkA"), Some(Vec2::new(3.0, -2.0)));
        assert_eq!(world.find_entry_point("MarkB"), None);
    }

    #[test]
    fn start_text_requires_a_text_box() {
        let mut world = SceneWorld::default();
        let prop = world.spawn("Sign", EntityRole::Prop, Transform::default());
        let text = world.spawn_text_box("SignText", TypedRevealOptions::default());

        assert!(matches!(
            world.start_text(prop, "hello"),
            Err(PresentationError::MissingCollaborator { .. })
        ));
        assert!(world.start_text(text, "hello").is_ok());
        assert!(world.text(text).is_some_and(TypedReveal::is_running));
    }

    #[test]
    fn stop_all_text_clears_every_box() {
        let mut world = SceneWorld::default();
        let mut audio = RecordingAudio::default();
        let first = world.spawn_text_box("A", TypedRevealOptions::default());
        let second = world.spawn_text_box("B", TypedRevealOptions::default());
        world.start_text(first, "one").expect("text box");
        world.start_text(second, "two").expect("text box");
        world.advance_text(first, 0.05, &mut audio);
        world.advance_text(second, 0.05, &mut audio);

        world.stop_all_text(&mut audio);

        for id in [first, second] {
            let reveal = world.text(id).expect("text box");
            assert!(!reveal.is_running());
            assert!(reveal.buffer().is_empty());
        }
    }
}
