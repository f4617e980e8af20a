use glam::Vec3;

/// Entity-level accessors the tactical layer needs from the hosting game.
pub trait Entity {
    fn position(&self) -> Vec3;
    fn is_alive(&self) -> bool;
    fn hit_points(&self) -> f32;
    /// Faction check against a reference entity, usually the mover a path is
    /// computed for.
    fn is_hostile_to(&self, other: &dyn Entity) -> bool;
}

/// World callback for threat-aware pathfinding. Without one, the path
/// search falls back to a geometric exposure heuristic.
pub trait World {
    fn entities_in_radius(&self, center: Vec3, radius: f32) -> Vec<&dyn Entity>;
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}
