use engine::presentation::{place_player, OPACITY_OPAQUE, OPACITY_TRANSPARENT};
use engine::{
    EntityId, EntityRole, InputAction, InputSnapshot, Scene, SceneCommand, SceneFader,
    SceneServices, SceneWorld, Transform, TransitionGate, Vec2,
};
use tracing::{debug, info, warn};

use super::request_music;
use crate::app::story::RoomSpec;

const PLAYER_NAME: &str = "Player";

struct GateZone {
    gate: TransitionGate,
    position: Vec2,
    radius: f32,
    occupied: bool,
}

/// A walkable room: the player moves while the session allows it, and
/// stepping into a gate zone hands a transition to the director.
pub(crate) struct RoomScene {
    name: String,
    music: String,
    spec: RoomSpec,
    player: Option<EntityId>,
    sign: Option<EntityId>,
    gates: Vec<GateZone>,
    fader: SceneFader,
}

impl RoomScene {
    pub(crate) fn new(name: &str, music: &str, spec: RoomSpec) -> Self {
        let gates = spec
            .gates
            .iter()
            .map(|zone| GateZone {
                gate: TransitionGate::new(zone.config.clone()),
                position: zone.position.into(),
                radius: zone.radius.max(0.0),
                occupied: false,
            })
            .collect();
        Self {
            name: name.to_string(),
            music: music.to_string(),
            fader: SceneFader::new(spec.fader.clone()),
            spec,
            player: None,
            sign: None,
            gates,
        }
    }

    fn move_player(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot, world: &mut SceneWorld) {
        let Some(player) = self.player else {
            return;
        };
        let (x, y) = input.move_axis();
        if x == 0.0 && y == 0.0 {
            return;
        }
        let Some(position) = world.position(player) else {
            return;
        };
        let step = self.spec.player_speed * fixed_dt_seconds;
        world.set_position(player, Vec2::new(position.x + x * step, position.y + y * step));
    }

    fn check_gates(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        let Some(position) = self.player.and_then(|player| world.position(player)) else {
            return;
        };
        let movement_enabled = services.session.movement().is_enabled();
        for zone in &mut self.gates {
            let inside = position.distance(zone.position) <= zone.radius;
            let entered = inside && !zone.occupied;
            zone.occupied = inside;
            if !entered || !movement_enabled {
                continue;
            }
            if let Some(task) = zone.gate.on_contact(EntityRole::Player, services.session) {
                if self.fader.is_fading() {
                    let mut cx = services.phase_context(0.0, world);
                    self.fader.abort(&mut cx);
                }
                info!(
                    scene = self.name.as_str(),
                    gate = task.gate(),
                    destination = task.destination(),
                    "gate_entered"
                );
                services.begin_transition(task);
            }
        }
    }

    /// Confirm dismisses the sign text, typed or not.
    fn update_sign(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        services: &mut SceneServices<'_>,
    ) {
        let Some(sign) = self.sign else {
            return;
        };
        world.advance_text(sign, fixed_dt_seconds, &mut *services.audio);
        if !input.was_pressed(InputAction::Confirm) {
            return;
        }
        if let Some(reveal) = world.text_mut(sign) {
            if reveal.is_running() || !reveal.buffer().is_empty() {
                reveal.stop_and_clear(&mut *services.audio);
                debug!(scene = self.name.as_str(), "sign_dismissed");
            }
        }
    }
}

impl Scene for RoomScene {
    fn load(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        let player = world.spawn(
            PLAYER_NAME,
            EntityRole::Player,
            Transform {
                position: self.spec.player_start.into(),
            },
        );
        self.player = Some(player);
        for entry in &self.spec.entry_points {
            world.add_entry_point(&entry.id, entry.position.into());
        }

        // An arriving transition fades in on its own and places the player.
        let arriving = services.transitions_in_flight() > 0;
        let surface = self.fader.config().surface.clone();
        if arriving {
            world.spawn_fade_surface(&surface, OPACITY_OPAQUE);
        } else {
            world.spawn_fade_surface(&surface, OPACITY_TRANSPARENT);
            self.fader.on_start(world);
            let placement = place_player(
                world,
                services.session.handoff(),
                self.spec.default_entry.as_deref(),
            );
            debug!(scene = self.name.as_str(), ?placement, "player_placed");
        }
        for zone in &self.spec.gates {
            let gate_surface = zone.config.fade_surface.as_str();
            if world.find_by_name(gate_surface).is_none() {
                world.spawn_fade_surface(gate_surface, OPACITY_TRANSPARENT);
            }
        }

        if let Some(position) = world.position(player) {
            for zone in &mut self.gates {
                zone.occupied = position.distance(zone.position) <= zone.radius;
            }
        }

        if let Some(sign) = &self.spec.sign {
            let id = world.spawn_text_box(&sign.text_box, (&self.spec.text).into());
            match world.start_text(id, &sign.text) {
                Ok(()) => self.sign = Some(id),
                Err(err) => warn!(error = %err, "sign_text_skipped"),
            }
        }

        request_music(services.music, &self.name, &self.music);
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        services: &mut SceneServices<'_>,
    ) -> SceneCommand {
        if services.session.movement().is_enabled() {
            self.move_player(fixed_dt_seconds, input, world);
        }
        self.check_gates(world, services);
        self.update_sign(fixed_dt_seconds, input, world, services);

        let mut cx = services.phase_context(fixed_dt_seconds, world);
        self.fader.tick(&mut cx);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld, services: &mut SceneServices<'_>) {
        world.stop_all_text(&mut *services.audio);
        let mut cx = services.phase_context(0.0, world);
        self.fader.abort(&mut cx);
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        let position = self.player.and_then(|player| world.position(player))?;
        Some(format!(
            "{} | player ({:.1}, {:.1})",
            self.name, position.x, position.y
        ))
    }
}
