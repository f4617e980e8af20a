use std::collections::{HashMap, HashSet};

use glam::{Vec2, Vec3};
use log::{trace, warn};

use aurora_files::bwm::types::{SurfaceMaterial, Walkmesh, WalkmeshType};
use aurora_files::common::types::C3Vector;

use crate::navigation::aabb::{AabbTree, MAX_NEARBY_FACES, ray_box_intersection, ray_triangle};
use crate::navigation::cover::CoverPoint;
use crate::navigation::obstacles::{DestructibleModification, DynamicObstacle, ObstacleSnapshot};

/// Vertex dedup keys use six decimal digits; coincident world positions
/// from different rooms collapse onto one vertex.
const VERTEX_QUANTIZATION: f32 = 1e6;

/// Cross-mesh edge stitching matches endpoints at millimetre resolution.
const EDGE_QUANTIZATION: f32 = 1e3;

/// A query is walkable only within this vertical distance of its support.
pub const MAX_WALKABLE_VERTICAL_DISTANCE: f32 = 2.0;

/// ... and within this 2D distance of the supporting face's centre.
pub const MAX_WALKABLE_CENTER_DISTANCE: f32 = 5.0;

/// Radius for the nearby-face pass of point projection.
pub const PROJECTION_SEARCH_RADIUS: f32 = 5.0;

/// A ray reaching this close to its target does not count as blocked.
pub const LOS_TOLERANCE: f32 = 0.1;

/// Vertical priority classes for projection candidates; lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SurfaceType {
    Ground,
    Platform,
    Elevated,
    Obstacle,
}

/// One storey of a multi-level area.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationLevel {
    pub id: u32,
    pub base_height: f32,
    pub height_range: f32,
    pub surface_type: SurfaceType,
    pub walkable: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProjectionCandidate {
    pub position: Vec3,
    pub surface: SurfaceType,
    pub distance_2d: f32,
    pub walkable: bool,
    pub face: Option<usize>,
}

/// A spatially indexed, mutation-aware navigation mesh built from walkmesh
/// faces. Owns every derived array; single-owner, no internal locking.
#[derive(Debug, Clone, Default)]
pub struct NavigationMesh {
    pub(crate) vertices: Vec<Vec3>,
    /// 3 entries per face.
    pub(crate) face_indices: Vec<u32>,
    pub(crate) materials: Vec<SurfaceMaterial>,
    /// 3 entries per face: `neighbour_face * 3 + neighbour_edge`, or -1.
    pub(crate) adjacency: Vec<i32>,
    pub(crate) aabb: Option<AabbTree>,
    pub(crate) obstacles: HashMap<i32, DynamicObstacle>,
    pub(crate) modifications: HashMap<usize, DestructibleModification>,
    pub(crate) levels: Vec<NavigationLevel>,
    pub(crate) cover_points: Vec<CoverPoint>,
    pub(crate) invalidated: HashSet<usize>,
    pub(crate) mesh_dirty: bool,
    pub(crate) cover_dirty: bool,
    pub(crate) previous_obstacles: HashMap<i32, ObstacleSnapshot>,
    pub(crate) modification_tick: u32,
}

fn to_vec3(v: C3Vector) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn quantize(position: Vec3, scale: f32) -> (i64, i64, i64) {
    (
        (position.x * scale).round() as i64,
        (position.y * scale).round() as i64,
        (position.z * scale).round() as i64,
    )
}

impl NavigationMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a parsed walkmesh, offset by its world position. Vertices
    /// are deduplicated, materials copied verbatim, adjacency kept for
    /// walkable faces, and an AABB tree built for area meshes.
    pub fn from_walkmesh(walkmesh: &Walkmesh) -> Self {
        let offset = to_vec3(walkmesh.position);
        let mut mesh = NavigationMesh::new();
        let mut dedup: HashMap<(i64, i64, i64), u32> = HashMap::new();

        for face in &walkmesh.faces {
            for &index in &face.indices {
                let position = to_vec3(walkmesh.vertices[index as usize]) + offset;
                let key = quantize(position, VERTEX_QUANTIZATION);
                let next = mesh.vertices.len() as u32;
                let vertex = *dedup.entry(key).or_insert_with(|| {
                    mesh.vertices.push(position);
                    next
                });
                mesh.face_indices.push(vertex);
            }
            mesh.materials.push(face.material);
            if face.material.walkable() {
                mesh.adjacency.extend_from_slice(&face.adjacency);
            } else {
                mesh.adjacency.extend_from_slice(&[-1, -1, -1]);
            }
        }

        if walkmesh.walkmesh_type == WalkmeshType::AreaModel {
            mesh.aabb = AabbTree::build(&mesh);
        }
        mesh.cover_dirty = true;
        trace!(
            "Ingested walkmesh: {} faces, {} deduplicated vertices",
            mesh.face_count(),
            mesh.vertices.len()
        );
        mesh
    }

    /// Combines meshes in input order, re-indexing faces and adjacency,
    /// stitching walkable edges that coincide across inputs, and rebuilding
    /// the spatial index.
    pub fn merge(meshes: &[NavigationMesh]) -> NavigationMesh {
        let mut merged = NavigationMesh::new();
        if meshes.is_empty() {
            warn!("Merging 0 navigation meshes");
            return merged;
        }

        for mesh in meshes {
            let vertex_offset = merged.vertices.len() as u32;
            let face_offset = merged.face_count() as i32;
            merged.vertices.extend_from_slice(&mesh.vertices);
            merged
                .face_indices
                .extend(mesh.face_indices.iter().map(|&i| i + vertex_offset));
            merged.materials.extend_from_slice(&mesh.materials);
            merged.adjacency.extend(mesh.adjacency.iter().map(|&a| {
                if a < 0 {
                    -1
                } else {
                    (a / 3 + face_offset) * 3 + a % 3
                }
            }));
            merged.levels.extend(mesh.levels.iter().cloned());
        }

        merged.stitch_edges();
        merged.aabb = AabbTree::build(&merged);
        merged.cover_dirty = true;
        merged
    }

    /// Connects coincident walkable open edges across the merged face set.
    /// The first walkable pair per edge key wins, in input order.
    fn stitch_edges(&mut self) {
        type EdgeKey = ((i64, i64, i64), (i64, i64, i64));
        let mut edges: HashMap<EdgeKey, Vec<(usize, usize)>> = HashMap::new();

        for face in 0..self.face_count() {
            for edge in 0..3 {
                let a = self.vertices[self.face_indices[face * 3 + edge] as usize];
                let b = self.vertices[self.face_indices[face * 3 + (edge + 1) % 3] as usize];
                let mut key = (quantize(a, EDGE_QUANTIZATION), quantize(b, EDGE_QUANTIZATION));
                if key.1 < key.0 {
                    key = (key.1, key.0);
                }
                edges.entry(key).or_default().push((face, edge));
            }
        }

        let mut stitched = 0usize;
        for users in edges.values() {
            let open_walkable: Vec<(usize, usize)> = users
                .iter()
                .copied()
                .filter(|&(face, edge)| {
                    self.materials[face].walkable() && self.adjacency[face * 3 + edge] < 0
                })
                .collect();
            if let [(f1, e1), (f2, e2), ..] = open_walkable[..] {
                self.adjacency[f1 * 3 + e1] = (f2 * 3 + e2) as i32;
                self.adjacency[f2 * 3 + e2] = (f1 * 3 + e1) as i32;
                stitched += 1;
            }
        }
        if stitched > 0 {
            trace!("Stitched {} cross-mesh edges", stitched);
        }
    }

    pub fn face_count(&self) -> usize {
        self.face_indices.len() / 3
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn face_indices(&self) -> &[u32] {
        &self.face_indices
    }

    pub fn adjacency(&self) -> &[i32] {
        &self.adjacency
    }

    pub fn face_material(&self, face: usize) -> SurfaceMaterial {
        self.materials[face]
    }

    /// The face's corners, with destructible vertex substitutions applied.
    pub fn face_vertices(&self, face: usize) -> [Vec3; 3] {
        if let Some(modification) = self.modifications.get(&face) {
            if let Some(replaced) = modification.modified_vertices {
                return replaced;
            }
        }
        [
            self.vertices[self.face_indices[face * 3] as usize],
            self.vertices[self.face_indices[face * 3 + 1] as usize],
            self.vertices[self.face_indices[face * 3 + 2] as usize],
        ]
    }

    pub fn face_center(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.face_vertices(face);
        (a + b + c) / 3.0
    }

    pub fn face_center_2d(&self, face: usize) -> Vec2 {
        self.face_center(face).truncate()
    }

    pub fn face_normal(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.face_vertices(face);
        (b - a).cross(c - a).normalize_or_zero()
    }

    pub fn face_destroyed(&self, face: usize) -> bool {
        self.modifications
            .get(&face)
            .map(|m| m.is_destroyed)
            .unwrap_or(false)
    }

    /// Walkable means a walkable material and not destroyed.
    pub fn is_face_walkable(&self, face: usize) -> bool {
        self.materials[face].walkable() && !self.face_destroyed(face)
    }

    /// Same-side containment test on the 2D footprint.
    pub fn face_contains_2d(&self, face: usize, point: Vec2) -> bool {
        let [a, b, c] = self.face_vertices(face);
        let sign = |p: Vec2, a: Vec2, b: Vec2| (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y);
        let d1 = sign(point, a.truncate(), b.truncate());
        let d2 = sign(point, b.truncate(), c.truncate());
        let d3 = sign(point, c.truncate(), a.truncate());
        let has_negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_negative && has_positive)
    }

    /// Height of the face's plane at a 2D position. Degenerate triangles
    /// fall back to the vertex-Z mean.
    pub fn height_on_face(&self, face: usize, point: Vec2) -> f32 {
        let [a, b, c] = self.face_vertices(face);
        let normal = (b - a).cross(c - a);
        if normal.z.abs() < 1e-6 {
            return (a.z + b.z + c.z) / 3.0;
        }
        a.z - (normal.x * (point.x - a.x) + normal.y * (point.y - a.y)) / normal.z
    }

    /// First static face containing the 2D point, through the spatial index
    /// when one exists.
    pub fn face_at(&self, point: Vec2) -> Option<usize> {
        match &self.aabb {
            Some(tree) => tree.face_at(self, point),
            None => (0..self.face_count()).find(|&face| self.face_contains_2d(face, point)),
        }
    }

    /// Faces with centroid within `radius` of the point, capped at
    /// [`MAX_NEARBY_FACES`].
    pub fn faces_near(&self, point: Vec2, radius: f32) -> Vec<usize> {
        match &self.aabb {
            Some(tree) => tree.faces_near(self, point, radius),
            None => (0..self.face_count())
                .filter(|&face| self.face_center_2d(face).distance(point) <= radius)
                .take(MAX_NEARBY_FACES)
                .collect(),
        }
    }

    /// Every face with centroid within `radius` of the point, uncapped.
    /// Mutations that promise to reach the whole area use this instead of
    /// [`faces_near`](Self::faces_near).
    pub fn faces_within_radius(&self, point: Vec2, radius: f32) -> Vec<usize> {
        match &self.aabb {
            Some(tree) => tree.faces_within(self, point, radius),
            None => (0..self.face_count())
                .filter(|&face| self.face_center_2d(face).distance(point) <= radius)
                .collect(),
        }
    }

    pub(crate) fn project_candidates(&self, point: Vec3) -> Vec<ProjectionCandidate> {
        let point_2d = point.truncate();
        let mut candidates = vec![];

        // the containing static face, unless destroyed
        let containing = self.face_at(point_2d).filter(|&face| !self.face_destroyed(face));
        if let Some(face) = containing {
            candidates.push(ProjectionCandidate {
                position: point_2d.extend(self.height_on_face(face, point_2d)),
                surface: SurfaceType::Ground,
                distance_2d: 0.0,
                walkable: self.materials[face].walkable(),
                face: Some(face),
            });
        }

        // nearby static faces
        for face in self.faces_near(point_2d, PROJECTION_SEARCH_RADIUS) {
            if Some(face) == containing || self.face_destroyed(face) {
                continue;
            }
            let center = self.face_center(face);
            candidates.push(ProjectionCandidate {
                position: center,
                surface: SurfaceType::Ground,
                distance_2d: center.truncate().distance(point_2d),
                walkable: self.materials[face].walkable(),
                face: Some(face),
            });
        }

        // dynamic obstacles within influence
        for obstacle in self.obstacles.values().filter(|o| o.active) {
            let distance = obstacle.position.truncate().distance(point_2d);
            if distance > obstacle.influence_radius + obstacle.extent_2d() {
                continue;
            }
            let position = if obstacle.has_top_surface && obstacle.contains_2d(point_2d) {
                point_2d.extend(obstacle.bounds_max.z)
            } else {
                // clamp to the influence-expanded box, on its top surface
                let expanded_min = obstacle.bounds_min - Vec3::splat(obstacle.influence_radius);
                let expanded_max = obstacle.bounds_max + Vec3::splat(obstacle.influence_radius);
                Vec3::new(
                    point.x.clamp(expanded_min.x, expanded_max.x),
                    point.y.clamp(expanded_min.y, expanded_max.y),
                    obstacle.bounds_max.z,
                )
            };
            candidates.push(ProjectionCandidate {
                position,
                surface: SurfaceType::Obstacle,
                distance_2d: distance,
                walkable: obstacle.walkable,
                face: None,
            });
        }

        // multi-level surfaces whose height range contains the query
        for level in &self.levels {
            if point.z >= level.base_height && point.z <= level.base_height + level.height_range {
                candidates.push(ProjectionCandidate {
                    position: point_2d.extend(level.base_height),
                    surface: level.surface_type,
                    distance_2d: 0.0,
                    walkable: level.walkable,
                    face: None,
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.surface
                .cmp(&b.surface)
                .then(a.distance_2d.partial_cmp(&b.distance_2d).unwrap_or(std::cmp::Ordering::Equal))
        });
        candidates
    }

    /// Projects a point onto the best supporting surface, returning the
    /// projected position and its height.
    pub fn project(&self, point: Vec3) -> Option<(Vec3, f32)> {
        self.project_candidates(point)
            .first()
            .map(|candidate| (candidate.position, candidate.position.z))
    }

    /// Face index the point projects onto, when the best support is a face.
    pub fn project_to_face(&self, point: Vec3) -> Option<usize> {
        self.project_candidates(point)
            .iter()
            .find_map(|candidate| candidate.face)
    }

    /// A point is walkable when its best walkable support is close enough
    /// vertically and laterally.
    pub fn is_walkable(&self, point: Vec3) -> bool {
        let candidates = self.project_candidates(point);
        let Some(best) = candidates.iter().find(|c| c.walkable) else {
            return false;
        };
        if (point.z - best.position.z).abs() > MAX_WALKABLE_VERTICAL_DISTANCE {
            return false;
        }
        if let Some(face) = best.face {
            if self.face_center_2d(face).distance(point.truncate()) > MAX_WALKABLE_CENTER_DISTANCE {
                return false;
            }
        }
        true
    }

    /// Nearest static-face hit within `t_max` along the ray.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, t_max: f32) -> Option<(Vec3, usize)> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        let hit = match &self.aabb {
            Some(tree) => tree.raycast(self, origin, direction, t_max),
            None => {
                let mut best: Option<(usize, f32)> = None;
                for face in 0..self.face_count() {
                    let [a, b, c] = self.face_vertices(face);
                    if let Some(t) = ray_triangle(origin, direction, a, b, c) {
                        if t <= t_max && best.map(|(_, bt)| t < bt).unwrap_or(true) {
                            best = Some((face, t));
                        }
                    }
                }
                best
            }
        };
        hit.map(|(face, t)| (origin + direction * t, face))
    }

    /// Line of sight with pass-through terrain, destruction awareness, and
    /// obstacle occlusion.
    pub fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let distance = delta.length();
        if distance < 1e-6 {
            return true;
        }
        let direction = delta / distance;

        if let Some((hit, face)) = self.raycast(from, direction, distance) {
            let pass_through = self.materials[face].walkable() || self.face_destroyed(face);
            if !pass_through && from.distance(hit) < distance - LOS_TOLERANCE {
                return false;
            }
        }

        for obstacle in self.obstacles.values() {
            if !obstacle.active || obstacle.walkable {
                continue;
            }
            if let Some(t) =
                ray_box_intersection(obstacle.bounds_min, obstacle.bounds_max, from, direction, distance)
            {
                if t < distance - LOS_TOLERANCE {
                    return false;
                }
            }
        }
        true
    }

    pub fn levels(&self) -> &[NavigationLevel] {
        &self.levels
    }

    pub fn add_level(&mut self, level: NavigationLevel) {
        self.levels.push(level);
    }

    /// Faces whose support changed since the last [`clear_invalidated`];
    /// a signal for higher-layer caches, never consumed internally.
    pub fn invalidated_faces(&self) -> &HashSet<usize> {
        &self.invalidated
    }

    pub fn clear_invalidated(&mut self) {
        self.invalidated.clear();
    }

    pub fn needs_rebuild(&self) -> bool {
        self.mesh_dirty
    }

    pub fn mark_rebuilt(&mut self) {
        self.mesh_dirty = false;
    }
}
