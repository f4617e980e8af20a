use glam::{Vec2, Vec3};

use crate::navigation::mesh::NavigationMesh;

/// Hard cap on recursion; a well-formed split halves the face set long
/// before this.
pub const MAX_TREE_DEPTH: u32 = 32;

/// Upper bound on radius-query results.
pub const MAX_NEARBY_FACES: usize = 10;

#[derive(Debug, Clone)]
pub struct AabbNode {
    pub min: Vec3,
    pub max: Vec3,
    /// Face index at leaves.
    pub face: Option<usize>,
    pub left: Option<Box<AabbNode>>,
    pub right: Option<Box<AabbNode>>,
}

#[derive(Debug, Clone)]
pub struct AabbTree {
    pub root: AabbNode,
}

impl AabbTree {
    /// Top-down build over all faces of the mesh: longest-axis midpoint
    /// split of the face centroids, median fallback when the midpoint
    /// leaves everything on one side.
    pub fn build(mesh: &NavigationMesh) -> Option<AabbTree> {
        let face_count = mesh.face_count();
        if face_count == 0 {
            return None;
        }
        let faces: Vec<usize> = (0..face_count).collect();
        Some(AabbTree {
            root: Self::build_node(mesh, faces, 0),
        })
    }

    fn build_node(mesh: &NavigationMesh, faces: Vec<usize>, depth: u32) -> AabbNode {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for &face in &faces {
            for vertex in mesh.face_vertices(face) {
                min = min.min(vertex);
                max = max.max(vertex);
            }
        }

        if faces.len() == 1 || depth >= MAX_TREE_DEPTH {
            // degenerate subdivisions collapse into a first-face leaf
            return AabbNode {
                min,
                max,
                face: Some(faces[0]),
                left: None,
                right: None,
            };
        }

        let extent = max - min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };
        let split = (min[axis] + max[axis]) * 0.5;

        let mut left_faces = vec![];
        let mut right_faces = vec![];
        for &face in &faces {
            if mesh.face_center(face)[axis] < split {
                left_faces.push(face);
            } else {
                right_faces.push(face);
            }
        }

        // midpoint failed to separate; split at the centroid median instead
        if left_faces.is_empty() || right_faces.is_empty() {
            let mut sorted = faces;
            sorted.sort_by(|&a, &b| {
                mesh.face_center(a)[axis]
                    .partial_cmp(&mesh.face_center(b)[axis])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let mid = (sorted.len() / 2).max(1);
            right_faces = sorted.split_off(mid);
            left_faces = sorted;
        }

        AabbNode {
            min,
            max,
            face: None,
            left: Some(Box::new(Self::build_node(mesh, left_faces, depth + 1))),
            right: Some(Box::new(Self::build_node(mesh, right_faces, depth + 1))),
        }
    }

    /// First face whose 2D footprint contains the point.
    pub fn face_at(&self, mesh: &NavigationMesh, point: Vec2) -> Option<usize> {
        Self::face_at_node(&self.root, mesh, point)
    }

    fn face_at_node(node: &AabbNode, mesh: &NavigationMesh, point: Vec2) -> Option<usize> {
        if point.x < node.min.x || point.x > node.max.x || point.y < node.min.y || point.y > node.max.y
        {
            return None;
        }
        if let Some(face) = node.face {
            return mesh.face_contains_2d(face, point).then_some(face);
        }
        node.left
            .as_deref()
            .and_then(|left| Self::face_at_node(left, mesh, point))
            .or_else(|| {
                node.right
                    .as_deref()
                    .and_then(|right| Self::face_at_node(right, mesh, point))
            })
    }

    /// Faces whose centroid lies within `radius` (2D) of the point, at most
    /// [`MAX_NEARBY_FACES`] of them.
    pub fn faces_near(&self, mesh: &NavigationMesh, point: Vec2, radius: f32) -> Vec<usize> {
        let mut found = vec![];
        Self::faces_near_node(&self.root, mesh, point, radius, Some(MAX_NEARBY_FACES), &mut found);
        found
    }

    /// The same query without the result cap, for mutations that must reach
    /// every face in range.
    pub fn faces_within(&self, mesh: &NavigationMesh, point: Vec2, radius: f32) -> Vec<usize> {
        let mut found = vec![];
        Self::faces_near_node(&self.root, mesh, point, radius, None, &mut found);
        found
    }

    fn faces_near_node(
        node: &AabbNode,
        mesh: &NavigationMesh,
        point: Vec2,
        radius: f32,
        limit: Option<usize>,
        found: &mut Vec<usize>,
    ) {
        if limit.is_some_and(|limit| found.len() >= limit) {
            return;
        }
        let center = Vec2::new((node.min.x + node.max.x) * 0.5, (node.min.y + node.max.y) * 0.5);
        let half_diagonal = Vec2::new(node.max.x - node.min.x, node.max.y - node.min.y).length() * 0.5;
        if center.distance(point) > radius * std::f32::consts::SQRT_2 + half_diagonal {
            return;
        }
        if let Some(face) = node.face {
            if mesh.face_center_2d(face).distance(point) <= radius {
                found.push(face);
            }
            return;
        }
        if let Some(left) = node.left.as_deref() {
            Self::faces_near_node(left, mesh, point, radius, limit, found);
        }
        if let Some(right) = node.right.as_deref() {
            Self::faces_near_node(right, mesh, point, radius, limit, found);
        }
    }

    /// Nearest ray hit within `t_max`, as (face, distance).
    pub fn raycast(
        &self,
        mesh: &NavigationMesh,
        origin: Vec3,
        direction: Vec3,
        t_max: f32,
    ) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        Self::raycast_node(&self.root, mesh, origin, direction, t_max, &mut best);
        best
    }

    fn raycast_node(
        node: &AabbNode,
        mesh: &NavigationMesh,
        origin: Vec3,
        direction: Vec3,
        t_max: f32,
        best: &mut Option<(usize, f32)>,
    ) {
        let limit = best.map(|(_, t)| t).unwrap_or(t_max);
        if !slab_test(node.min, node.max, origin, direction, limit) {
            return;
        }
        if let Some(face) = node.face {
            let [a, b, c] = mesh.face_vertices(face);
            if let Some(t) = ray_triangle(origin, direction, a, b, c) {
                if t <= limit && best.map(|(_, bt)| t < bt).unwrap_or(true) {
                    *best = Some((face, t));
                }
            }
            return;
        }
        if let Some(left) = node.left.as_deref() {
            Self::raycast_node(left, mesh, origin, direction, t_max, best);
        }
        if let Some(right) = node.right.as_deref() {
            Self::raycast_node(right, mesh, origin, direction, t_max, best);
        }
    }
}

/// Standard slab test against an axis-aligned box.
pub fn slab_test(min: Vec3, max: Vec3, origin: Vec3, direction: Vec3, t_max: f32) -> bool {
    ray_box_intersection(min, max, origin, direction, t_max).is_some()
}

/// Entry distance of a ray into an axis-aligned box, if it intersects
/// within `t_max`. A ray starting inside reports distance 0.
pub fn ray_box_intersection(
    min: Vec3,
    max: Vec3,
    origin: Vec3,
    direction: Vec3,
    t_max: f32,
) -> Option<f32> {
    let mut t_enter = 0.0f32;
    let mut t_exit = t_max;
    for axis in 0..3 {
        if direction[axis].abs() < 1e-9 {
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction[axis];
        let mut t0 = (min[axis] - origin[axis]) * inv;
        let mut t1 = (max[axis] - origin[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }
    Some(t_enter.max(0.0))
}

/// Möller–Trumbore ray/triangle intersection; returns the hit distance.
pub fn ray_triangle(origin: Vec3, direction: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPSILON: f32 = 1e-7;
    let ab = b - a;
    let ac = c - a;
    let pvec = direction.cross(ac);
    let det = ab.dot(pvec);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(ab);
    let v = direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = ac.dot(qvec) * inv_det;
    (t >= 0.0).then_some(t)
}
