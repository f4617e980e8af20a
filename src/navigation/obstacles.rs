use glam::{Vec2, Vec3};
use log::trace;

use crate::navigation::mesh::NavigationMesh;

/// Deltas below this are noise, not a change.
pub const CHANGE_THRESHOLD: f32 = 0.1;

/// Affected-face searches expand the obstacle bounds by this multiple of
/// the influence radius.
pub const AFFECTED_BOUNDS_SCALE: f32 = 1.5;

/// A runtime-introduced bounded region affecting walkability, line of
/// sight and path costs. Keyed by a caller-chosen id.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObstacle {
    pub id: i32,
    pub position: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub height: f32,
    pub influence_radius: f32,
    pub active: bool,
    pub walkable: bool,
    pub has_top_surface: bool,
}

impl DynamicObstacle {
    pub fn contains_2d(&self, point: Vec2) -> bool {
        point.x >= self.bounds_min.x
            && point.x <= self.bounds_max.x
            && point.y >= self.bounds_min.y
            && point.y <= self.bounds_max.y
    }

    /// Half diagonal of the 2D footprint.
    pub fn extent_2d(&self) -> f32 {
        Vec2::new(
            self.bounds_max.x - self.bounds_min.x,
            self.bounds_max.y - self.bounds_min.y,
        )
        .length()
            * 0.5
    }

    pub(crate) fn snapshot(&self) -> ObstacleSnapshot {
        ObstacleSnapshot {
            position: self.position,
            bounds_min: self.bounds_min,
            bounds_max: self.bounds_max,
            influence_radius: self.influence_radius,
            active: self.active,
            walkable: self.walkable,
        }
    }
}

/// The fields change detection compares between updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSnapshot {
    pub position: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub influence_radius: f32,
    pub active: bool,
    pub walkable: bool,
}

impl ObstacleSnapshot {
    fn changed_from(&self, other: &ObstacleSnapshot) -> bool {
        self.position.distance(other.position) > CHANGE_THRESHOLD
            || self.bounds_min.distance(other.bounds_min) > CHANGE_THRESHOLD
            || self.bounds_max.distance(other.bounds_max) > CHANGE_THRESHOLD
            || (self.influence_radius - other.influence_radius).abs() > CHANGE_THRESHOLD
            || self.active != other.active
            || self.walkable != other.walkable
    }
}

/// Per-face destructible state. A destroyed face stays in the arrays; it
/// only leaves walkability and line-of-sight blocking.
#[derive(Debug, Clone, PartialEq)]
pub struct DestructibleModification {
    pub face_id: usize,
    pub is_destroyed: bool,
    pub modified_vertices: Option<[Vec3; 3]>,
    pub modification_time: f32,
}

impl NavigationMesh {
    pub fn obstacle(&self, id: i32) -> Option<&DynamicObstacle> {
        self.obstacles.get(&id)
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    pub fn register_obstacle(&mut self, obstacle: DynamicObstacle) {
        trace!("Registering obstacle {}", obstacle.id);
        self.invalidate_around(&obstacle.snapshot());
        self.previous_obstacles.insert(obstacle.id, obstacle.snapshot());
        self.obstacles.insert(obstacle.id, obstacle);
        self.mesh_dirty = true;
        self.cover_dirty = true;
    }

    /// Replaces the obstacle with the same id; returns false when unknown.
    pub fn update_obstacle(&mut self, obstacle: DynamicObstacle) -> bool {
        if !self.obstacles.contains_key(&obstacle.id) {
            return false;
        }
        if let Some(previous) = self.previous_obstacles.get(&obstacle.id).copied() {
            self.invalidate_around(&previous);
        }
        self.invalidate_around(&obstacle.snapshot());
        self.previous_obstacles.insert(obstacle.id, obstacle.snapshot());
        self.obstacles.insert(obstacle.id, obstacle);
        self.mesh_dirty = true;
        self.cover_dirty = true;
        true
    }

    pub fn remove_obstacle(&mut self, id: i32) -> bool {
        let Some(removed) = self.obstacles.remove(&id) else {
            return false;
        };
        trace!("Removing obstacle {}", id);
        self.invalidate_around(&removed.snapshot());
        self.previous_obstacles.remove(&id);
        self.mesh_dirty = true;
        self.cover_dirty = true;
        true
    }

    /// Upserts the given obstacles in order, invalidating faces around
    /// every one that actually changed (per [`CHANGE_THRESHOLD`]).
    pub fn update_all(&mut self, obstacles: &[DynamicObstacle]) {
        let mut any_changed = false;
        for obstacle in obstacles {
            let snapshot = obstacle.snapshot();
            let previous = self.previous_obstacles.get(&obstacle.id).copied();
            let changed = match previous {
                Some(previous) => snapshot.changed_from(&previous),
                None => true,
            };
            if changed {
                if let Some(previous) = previous {
                    self.invalidate_around(&previous);
                }
                self.invalidate_around(&snapshot);
                any_changed = true;
            }
            self.previous_obstacles.insert(obstacle.id, snapshot);
            self.obstacles.insert(obstacle.id, obstacle.clone());
        }
        if any_changed {
            self.mesh_dirty = true;
            self.cover_dirty = true;
        }
    }

    /// Faces whose centroid or any vertex lies inside the obstacle bounds
    /// expanded by [`AFFECTED_BOUNDS_SCALE`] times the influence radius.
    pub(crate) fn affected_faces(&self, state: &ObstacleSnapshot) -> Vec<usize> {
        let expansion = Vec3::splat(state.influence_radius * AFFECTED_BOUNDS_SCALE);
        let min = state.bounds_min - expansion;
        let max = state.bounds_max + expansion;
        let inside = |p: Vec3| {
            p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y && p.z >= min.z && p.z <= max.z
        };
        (0..self.face_count())
            .filter(|&face| {
                inside(self.face_center(face)) || self.face_vertices(face).into_iter().any(inside)
            })
            .collect()
    }

    fn invalidate_around(&mut self, state: &ObstacleSnapshot) {
        let affected = self.affected_faces(state);
        self.invalidated.extend(affected);
    }

    pub fn modification(&self, face: usize) -> Option<&DestructibleModification> {
        self.modifications.get(&face)
    }

    /// Installs or replaces a destructible modification for one face.
    pub fn modify_face(&mut self, modification: DestructibleModification) {
        self.invalidated.insert(modification.face_id);
        self.modifications.insert(modification.face_id, modification);
        self.mesh_dirty = true;
        self.cover_dirty = true;
    }

    /// Marks every face whose centroid lies within `radius` of the centre
    /// as destroyed. Uses the uncapped radius query: a hole destroys the
    /// whole area, however many faces it covers.
    pub fn create_hole(&mut self, center: Vec3, radius: f32) {
        self.modification_tick += 1;
        let time = self.modification_tick as f32;
        let faces = self.faces_within_radius(center.truncate(), radius);
        trace!("Hole at {:?} destroys {} faces", center, faces.len());
        for face in faces {
            let modified_vertices = self.modifications.get(&face).and_then(|m| m.modified_vertices);
            self.modifications.insert(
                face,
                DestructibleModification {
                    face_id: face,
                    is_destroyed: true,
                    modified_vertices,
                    modification_time: time,
                },
            );
            self.invalidated.insert(face);
        }
        self.mesh_dirty = true;
        self.cover_dirty = true;
    }
}
