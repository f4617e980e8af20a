use glam::{Vec2, Vec3};
use itertools::Itertools;
use log::trace;

use crate::navigation::mesh::NavigationMesh;

/// A face is wall-like when its normal is this horizontal (|z| below
/// cos 45°).
pub const WALL_NORMAL_THRESHOLD: f32 = 0.707;

/// Walls shorter than this give no usable cover.
pub const MIN_WALL_HEIGHT: f32 = 0.5;

/// Spacing of samples along a wall edge; suppression radius is half this.
pub const COVER_SAMPLE_SPACING: f32 = 1.0;

/// Generated points below this quality are discarded.
pub const MIN_COVER_QUALITY: f32 = 0.3;

/// Cover height normalization: a 2-unit wall counts as full-height cover.
pub const COVER_HEIGHT_NORM: f32 = 2.0;

/// Obstacles shorter than this are stepped over, not hidden behind.
pub const OBSTACLE_COVER_MIN_HEIGHT: f32 = 1.0;

/// Radius for the supporting-cover count and for cover protection lookups.
pub const COVER_SUPPORT_RADIUS: f32 = 3.0;

/// How close a unit must stand to a cover point to benefit from it.
pub const COVER_PROXIMITY: f32 = 2.0;

/// A discrete position adjacent to a wall-like surface or standing
/// obstacle, rated 0..1.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverPoint {
    pub position: Vec3,
    /// Horizontal direction from the wall into the space a unit occupies.
    pub normal: Vec3,
    pub quality: f32,
    pub height: f32,
    pub source_face: Option<usize>,
    pub source_obstacle: Option<i32>,
}

impl NavigationMesh {
    /// Regenerates cover points when the cover-dirty flag is set.
    pub(crate) fn ensure_cover_points(&mut self) {
        if !self.cover_dirty {
            return;
        }
        self.generate_cover_points();
        self.cover_dirty = false;
    }

    pub fn cover_points(&mut self) -> &[CoverPoint] {
        self.ensure_cover_points();
        &self.cover_points
    }

    fn generate_cover_points(&mut self) {
        let mut points: Vec<CoverPoint> = vec![];

        // wall-like static faces
        for face in 0..self.face_count() {
            if self.face_destroyed(face) {
                continue;
            }
            let normal = self.face_normal(face);
            if normal.z.abs() >= WALL_NORMAL_THRESHOLD {
                continue;
            }
            let corners = self.face_vertices(face);
            let z_extent = corners.iter().map(|v| v.z).fold(f32::MIN, f32::max)
                - corners.iter().map(|v| v.z).fold(f32::MAX, f32::min);
            if z_extent <= MIN_WALL_HEIGHT {
                continue;
            }
            let cover_normal = Vec3::new(normal.x, normal.y, 0.0).normalize_or_zero();
            if cover_normal == Vec3::ZERO {
                continue;
            }

            for edge in 0..3 {
                let a = corners[edge];
                let b = corners[(edge + 1) % 3];
                let length = a.distance(b);
                let samples = (length / COVER_SAMPLE_SPACING).floor() as usize + 1;
                for step in 0..=samples {
                    let t = (step as f32 * COVER_SAMPLE_SPACING / length.max(1e-6)).min(1.0);
                    let sample = a.lerp(b, t) + cover_normal * COVER_SAMPLE_SPACING * 0.5;
                    let Some((position, _)) = self.project(sample) else {
                        continue;
                    };
                    let walkable = self.is_walkable(position);
                    let quality =
                        base_cover_quality(z_extent, normal.z.abs(), walkable);
                    if quality >= MIN_COVER_QUALITY {
                        points.push(CoverPoint {
                            position,
                            normal: cover_normal,
                            quality,
                            height: z_extent,
                            source_face: Some(face),
                            source_obstacle: None,
                        });
                    }
                }
            }
        }

        // standing obstacles
        let obstacle_sources: Vec<_> = self
            .obstacles
            .values()
            .filter(|o| o.active && !o.walkable && o.height >= OBSTACLE_COVER_MIN_HEIGHT)
            .cloned()
            .collect();
        for obstacle in obstacle_sources {
            let radius = obstacle.extent_2d() + COVER_SAMPLE_SPACING * 0.5;
            for step in 0..8 {
                let angle = step as f32 * std::f32::consts::FRAC_PI_4;
                let direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
                let sample = obstacle.position + direction * radius;
                let position = self
                    .project(sample)
                    .map(|(projected, _)| projected)
                    .unwrap_or(sample);
                let walkable = self.is_walkable(position);
                let quality = base_cover_quality(obstacle.height, 0.0, walkable);
                if quality >= MIN_COVER_QUALITY {
                    points.push(CoverPoint {
                        position,
                        normal: direction,
                        quality,
                        height: obstacle.height,
                        source_face: None,
                        source_obstacle: Some(obstacle.id),
                    });
                }
            }
        }

        // suppress near-duplicates in favour of the better point
        points.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        let mut kept: Vec<CoverPoint> = vec![];
        for point in points {
            let crowded = kept.iter().any(|existing| {
                existing.position.truncate().distance(point.position.truncate())
                    < COVER_SAMPLE_SPACING * 0.5
            });
            if !crowded {
                kept.push(point);
            }
        }

        // second pass: fold the supporting-cover count into the quality
        let positions: Vec<Vec2> = kept.iter().map(|p| p.position.truncate()).collect();
        for (i, point) in kept.iter_mut().enumerate() {
            let support = positions
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && other.distance(positions[i]) <= COVER_SUPPORT_RADIUS)
                .count();
            let support_factor = (support as f32 / 5.0).min(1.0);
            point.quality = (point.quality + 0.2 * support_factor).min(1.0);
        }

        trace!("Generated {} cover points", kept.len());
        self.cover_points = kept;
    }

    /// Cover points within `radius` of the centre, best quality first, then
    /// nearest.
    pub fn find_cover_points(&mut self, center: Vec3, radius: f32) -> Vec<CoverPoint> {
        self.ensure_cover_points();
        let center_2d = center.truncate();
        self.cover_points
            .iter()
            .filter(|point| point.position.truncate().distance(center_2d) <= radius)
            .cloned()
            .sorted_by(|a, b| {
                b.quality.total_cmp(&a.quality).then(
                    a.position
                        .truncate()
                        .distance(center_2d)
                        .total_cmp(&b.position.truncate().distance(center_2d)),
                )
            })
            .collect()
    }

    /// Whether a unit at `position` is covered against a threat. Positions
    /// off the walkmesh are taken as-is.
    pub fn provides_cover(&mut self, position: Vec3, threat: Vec3) -> bool {
        self.ensure_cover_points();
        let position = self
            .project(position)
            .map(|(projected, _)| projected)
            .unwrap_or(position);
        self.cover_points.iter().any(|point| {
            point.position.truncate().distance(position.truncate()) <= COVER_PROXIMITY
                && covers_against(point, position, threat)
        })
    }

    /// 0..1 protection a position enjoys against a threat, from the best
    /// nearby opposing cover point. Requires cover points to be current.
    pub(crate) fn cover_protection(&self, position: Vec3, threat: Vec3) -> f32 {
        self.cover_points
            .iter()
            .filter(|point| {
                let distance = point.position.truncate().distance(position.truncate());
                distance <= COVER_SUPPORT_RADIUS && covers_against(point, position, threat)
            })
            .map(|point| {
                let distance = point.position.truncate().distance(position.truncate());
                point.quality * (1.0 - distance / COVER_SUPPORT_RADIUS)
            })
            .fold(0.0, f32::max)
            .clamp(0.0, 1.0)
    }
}

/// The wall stands between the unit and the threat when the cover normal
/// (wall → standing space) opposes the direction to the threat.
fn covers_against(point: &CoverPoint, _position: Vec3, threat: Vec3) -> bool {
    let to_threat = (threat - point.position).truncate().normalize_or_zero();
    let normal_2d = point.normal.truncate().normalize_or_zero();
    normal_2d.dot(to_threat) < -0.3
}

fn base_cover_quality(height: f32, normal_z_abs: f32, walkable: bool) -> f32 {
    let height_factor = (height / COVER_HEIGHT_NORM).clamp(0.0, 1.0);
    let wall_factor = 1.0 - normal_z_abs;
    0.4 * height_factor + 0.3 * wall_factor + if walkable { 0.1 } else { 0.0 }
}
