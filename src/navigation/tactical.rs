use glam::Vec3;
use itertools::Itertools;

use crate::navigation::mesh::NavigationMesh;

/// Grid spacing when no static faces provide sample sites.
pub const TACTICAL_GRID_SPACING: f32 = 3.0;

/// At most this many positions are returned, best first.
pub const MAX_TACTICAL_POSITIONS: usize = 50;

/// Height advantage that makes a spot high ground.
pub const HIGH_GROUND_THRESHOLD: f32 = 1.5;

/// Cover distance that classifies a spot as a cover position.
pub const COVER_PROXIMITY_THRESHOLD: f32 = 2.0;

/// 16-direction narrowness above this marks a chokepoint.
pub const CHOKEPOINT_NARROWNESS_THRESHOLD: f32 = 0.5;

/// Flanking factor above this classifies the spot as flanking.
pub const FLANKING_ANGLE_THRESHOLD: f32 = 0.6;

/// Probe distance for the walkability ring samples.
const PROBE_RADIUS: f32 = 2.0;

/// Probe distance for the visibility ring.
const VISIBILITY_RANGE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacticalType {
    HighGround,
    Cover,
    Chokepoint,
    Flanking,
    Standard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TacticalPosition {
    pub position: Vec3,
    /// Composite 0..1 tactical value.
    pub value: f32,
    pub tactical_type: TacticalType,
}

impl NavigationMesh {
    /// Samples and scores tactical positions around a centre. `focus` is
    /// the position being fought over (an enemy or objective); without one
    /// the flanking term is zero.
    pub fn find_tactical_positions(
        &mut self,
        center: Vec3,
        radius: f32,
        focus: Option<Vec3>,
    ) -> Vec<TacticalPosition> {
        self.ensure_cover_points();

        let candidates = self.sample_candidates(center, radius);
        let mut positions: Vec<TacticalPosition> = candidates
            .into_iter()
            .filter_map(|candidate| self.score_candidate(candidate, center, focus))
            .collect();

        positions.sort_by(|a, b| b.value.total_cmp(&a.value));
        positions.truncate(MAX_TACTICAL_POSITIONS);
        positions
    }

    /// Face centres and edge midpoints when static geometry exists, a flat
    /// grid otherwise.
    fn sample_candidates(&self, center: Vec3, radius: f32) -> Vec<Vec3> {
        let center_2d = center.truncate();
        if self.face_count() > 0 {
            let mut candidates = vec![];
            for face in 0..self.face_count() {
                if self.face_destroyed(face) {
                    continue;
                }
                let face_center = self.face_center(face);
                if face_center.truncate().distance(center_2d) <= radius {
                    candidates.push(face_center);
                }
                let corners = self.face_vertices(face);
                for edge in 0..3 {
                    let midpoint = (corners[edge] + corners[(edge + 1) % 3]) * 0.5;
                    if midpoint.truncate().distance(center_2d) <= radius {
                        candidates.push(midpoint);
                    }
                }
            }
            candidates
        } else {
            let steps = (radius / TACTICAL_GRID_SPACING).floor() as i32;
            (-steps..=steps)
                .cartesian_product(-steps..=steps)
                .map(|(x, y)| {
                    center
                        + Vec3::new(
                            x as f32 * TACTICAL_GRID_SPACING,
                            y as f32 * TACTICAL_GRID_SPACING,
                            0.0,
                        )
                })
                .filter(|candidate| candidate.truncate().distance(center_2d) <= radius)
                .collect()
        }
    }

    fn score_candidate(
        &self,
        candidate: Vec3,
        center: Vec3,
        focus: Option<Vec3>,
    ) -> Option<TacticalPosition> {
        let position = self.project(candidate).map(|(p, _)| p).unwrap_or(candidate);
        if !self.is_walkable(position) {
            return None;
        }

        // height advantage over the centre and over the local neighbourhood
        let height_delta = position.z - center.z;
        let neighbourhood = self.ring_heights(position, PROBE_RADIUS, 8);
        let neighbourhood_delta = if neighbourhood.is_empty() {
            0.0
        } else {
            position.z - neighbourhood.iter().sum::<f32>() / neighbourhood.len() as f32
        };
        let high_ground =
            (((height_delta + neighbourhood_delta) * 0.5) / 3.0).clamp(0.0, 1.0);

        let cover_distance = self
            .cover_points
            .iter()
            .map(|point| point.position.truncate().distance(position.truncate()))
            .fold(f32::MAX, f32::min);
        let cover_score = if cover_distance == f32::MAX {
            0.0
        } else {
            (1.0 - cover_distance / COVER_PROXIMITY_THRESHOLD).clamp(0.0, 1.0)
        };

        let flanking = match focus {
            Some(focus) if focus.truncate().distance(position.truncate()) > 1e-3 => {
                let to_candidate = (position - focus).truncate().normalize_or_zero();
                let to_center = (center - focus).truncate().normalize_or_zero();
                // side and rear approaches score high, frontal ones zero
                (1.0 - to_candidate.dot(to_center)) * 0.5
            }
            _ => 0.0,
        };

        let blocked_8 = self.ring_blocked(position, PROBE_RADIUS, 8);
        let blocked_16 = self.ring_blocked(position, PROBE_RADIUS, 16);
        let narrowness = blocked_16 as f32 / 16.0;
        let is_chokepoint = blocked_8 >= 4;

        let visible = (0..16)
            .filter(|&step| {
                let angle = step as f32 * std::f32::consts::TAU / 16.0;
                let target = position
                    + Vec3::new(angle.cos() * VISIBILITY_RANGE, angle.sin() * VISIBILITY_RANGE, 0.0);
                self.line_of_sight(position + Vec3::Z, target + Vec3::Z)
            })
            .count();
        let visibility = visible as f32 / 16.0;

        let value = (0.3 * high_ground
            + 0.25 * cover_score
            + 0.2 * narrowness
            + 0.15 * flanking
            + 0.1 * visibility)
            .clamp(0.0, 1.0);

        let tactical_type = if height_delta >= HIGH_GROUND_THRESHOLD {
            TacticalType::HighGround
        } else if cover_distance < COVER_PROXIMITY_THRESHOLD {
            TacticalType::Cover
        } else if narrowness > CHOKEPOINT_NARROWNESS_THRESHOLD && is_chokepoint {
            TacticalType::Chokepoint
        } else if flanking > FLANKING_ANGLE_THRESHOLD {
            TacticalType::Flanking
        } else {
            TacticalType::Standard
        };

        Some(TacticalPosition {
            position,
            value,
            tactical_type,
        })
    }

    /// Projected heights of the walkable ring samples around a position.
    fn ring_heights(&self, position: Vec3, radius: f32, directions: usize) -> Vec<f32> {
        (0..directions)
            .filter_map(|step| {
                let angle = step as f32 * std::f32::consts::TAU / directions as f32;
                let sample = position + Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
                self.project(sample).map(|(projected, _)| projected.z)
            })
            .collect()
    }

    /// How many ring samples around a position are not walkable.
    fn ring_blocked(&self, position: Vec3, radius: f32, directions: usize) -> usize {
        (0..directions)
            .filter(|&step| {
                let angle = step as f32 * std::f32::consts::TAU / directions as f32;
                let sample = position + Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
                !self.is_walkable(sample)
            })
            .count()
    }
}
