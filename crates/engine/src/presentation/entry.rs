use tracing::{debug, info, warn};

use super::error::PresentationError;
use super::session::SpawnHandoff;
use crate::app::{EntityRole, SceneWorld};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The entry point matching the handoff fired.
    Handoff(String),
    Default(String),
    Unchanged,
}

/// Lets each entry point of a freshly loaded world check the pending handoff.
/// At most one matches; it clears the handoff and moves the player onto itself.
/// A missing player still clears the handoff.
pub fn apply_entry_points(world: &mut SceneWorld, handoff: &SpawnHandoff) -> Option<String> {
    let entry = world
        .entry_points()
        .iter()
        .find(|entry| handoff.consume_if_matches(&entry.id))
        .cloned()?;

    match world.find_entity_by_role(EntityRole::Player) {
        Some(player) => {
            world.set_position(player, entry.position);
            info!(
                entry = entry.id.as_str(),
                x = entry.position.x,
                y = entry.position.y,
                "player_relocated"
            );
        }
        None => debug!(entry = entry.id.as_str(), "relocation_skipped_no_player"),
    }
    Some(entry.id)
}

/// Moves the player to a named entry point, keeping its position if either is missing.
pub fn spawn_at(world: &mut SceneWorld, marker: &str) -> bool {
    let Some(position) = world.find_entry_point(marker) else {
        warn!(
            error = %PresentationError::missing("entry point", marker),
            "default_spawn_missing; using current position"
        );
        return false;
    };
    let Some(player) = world.find_entity_by_role(EntityRole::Player) else {
        debug!(marker, "default_spawn_skipped_no_player");
        return false;
    };
    world.set_position(player, position)
}

/// Handoff first, then the scene's default entry point.
pub fn place_player(
    world: &mut SceneWorld,
    handoff: &SpawnHandoff,
    default_entry: Option<&str>,
) -> Placement {
    if let Some(id) = apply_entry_points(world, handoff) {
        return Placement::Handoff(id);
    }
    match default_entry {
        Some(marker) if spawn_at(world, marker) => Placement::Default(marker.to_string()),
        _ => Placement::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Transform, Vec2};

    fn room() -> SceneWorld {
        let mut world = SceneWorld::default();
        world.spawn("Player", EntityRole::Player, Transform::default());
        world.add_entry_point("MarkA", Vec2::new(4.0, 2.0));
        world.add_entry_point("MarkB", Vec2::new(-3.0, 1.0));
        world
    }

    fn player_position(world: &SceneWorld) -> Option<Vec2> {
        world
            .find_entity_by_role(EntityRole::Player)
            .and_then(|player| world.position(player))
    }

    #[test]
    fn only_the_matching_entry_point_fires_once() {
        let mut world = room();
        let handoff = SpawnHandoff::default();
        handoff.write("MarkA");

        assert_eq!(apply_entry_points(&mut world, &handoff).as_deref(), Some("MarkA"));
        assert_eq!(player_position(&world), Some(Vec2::new(4.0, 2.0)));
        assert_eq!(handoff.pending(), None);

        world.set_position(
            world.find_entity_by_role(EntityRole::Player).expect("player"),
            Vec2::default(),
        );
        assert_eq!(apply_entry_points(&mut world, &handoff), None);
        assert_eq!(player_position(&world), Some(Vec2::default()));
    }

    #[test]
    fn unmatched_handoff_stays_pending() {
        let mut world = room();
        let handoff = SpawnHandoff::default();
        handoff.write("MarkZ");

        assert_eq!(apply_entry_points(&mut world, &handoff), None);
        assert_eq!(handoff.pending().as_deref(), Some("MarkZ"));
    }

    #[test]
    fn missing_player_still_consumes_handoff() {
        let mut world = SceneWorld::default();
        world.add_entry_point("MarkA", Vec2::new(1.0, 1.0));
        let handoff = SpawnHandoff::default();
        handoff.write("MarkA");

        assert_eq!(apply_entry_points(&mut world, &handoff).as_deref(), Some("MarkA"));
        assert_eq!(handoff.pending(), None);
    }

    #[test]
    fn default_entry_is_used_without_handoff() {
        let mut world = room();
        let handoff = SpawnHandoff::default();

        assert_eq!(
            place_player(&mut world, &handoff, Some("MarkB")),
            Placement::Default("MarkB".to_string())
        );
        assert_eq!(player_position(&world), Some(Vec2::new(-3.0, 1.0)));
        assert_eq!(
            place_player(&mut world, &handoff, Some("Nowhere")),
            Placement::Unchanged
        );
    }
}
