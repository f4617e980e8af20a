use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec3;
use log::{trace, warn};

use crate::navigation::mesh::NavigationMesh;
use crate::navigation::obstacles::DynamicObstacle;
use crate::navigation::world::{Entity, World};

/// Bounded search budget; exhaustion degrades to a direct segment.
pub const MAX_ASTAR_ITERATIONS: usize = 10_000;

/// Edge costs never drop below this, whatever the cover bonus.
pub const MIN_EDGE_COST: f32 = 0.1;

/// Obstacle avoidance: penalty radius and the penalty at the centre.
pub const OBSTACLE_INFLUENCE: f32 = 2.0;
pub const OBSTACLE_CENTER_PENALTY: f32 = 5.0;

/// Cover bonus: cap and the radius a cover point reaches.
pub const COVER_BONUS_MAX: f32 = 2.0;
pub const COVER_BONUS_RADIUS: f32 = 3.0;

/// Threat scanning radius and the per-threat penalty ceiling.
pub const THREAT_RADIUS: f32 = 50.0;
pub const THREAT_PENALTY_MAX: f32 = 3.0;

/// Temporary obstacles of `find_path_around_obstacles` count down from -1.
pub const TEMP_OBSTACLE_BASE_ID: i32 = -1;

/// Waypoints plus whether the search actually reached the goal; a
/// best-effort result is a direct segment with `complete == false`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub points: Vec<Vec3>,
    pub complete: bool,
}

impl PathResult {
    fn direct(start: Vec3, goal: Vec3, complete: bool) -> PathResult {
        PathResult {
            points: vec![start, goal],
            complete,
        }
    }
}

struct OpenEntry {
    f: f32,
    face: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // reversed: BinaryHeap is a max-heap, we want the lowest f on top
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f)
    }
}

impl NavigationMesh {
    /// A* over the face-adjacency graph with the tactical cost function,
    /// without threat awareness.
    pub fn find_path(&mut self, start: Vec3, goal: Vec3) -> PathResult {
        self.find_path_tactical(start, goal, None, None)
    }

    /// Threat-aware variant; `world` supplies entity queries and `mover` is
    /// the entity hostility is judged against.
    pub fn find_path_tactical(
        &mut self,
        start: Vec3,
        goal: Vec3,
        world: Option<&dyn World>,
        mover: Option<&dyn Entity>,
    ) -> PathResult {
        self.ensure_cover_points();

        let Some(start_face) = self.project_to_face(start) else {
            return PathResult::direct(start, goal, false);
        };
        let Some(goal_face) = self.project_to_face(goal) else {
            return PathResult::direct(start, goal, false);
        };
        if start_face == goal_face {
            return PathResult::direct(start, goal, true);
        }

        let goal_center = self.face_center(goal_face);
        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<usize, f32> = HashMap::new();
        let mut came_from: HashMap<usize, usize> = HashMap::new();

        g_score.insert(start_face, 0.0);
        open.push(OpenEntry {
            f: self.face_center(start_face).distance(goal_center),
            face: start_face,
        });

        let mut iterations = 0usize;
        while let Some(OpenEntry { face, .. }) = open.pop() {
            iterations += 1;
            if iterations > MAX_ASTAR_ITERATIONS {
                warn!("Path search exhausted its {} iteration budget", MAX_ASTAR_ITERATIONS);
                return PathResult::direct(start, goal, false);
            }
            if face == goal_face {
                let mut faces = vec![face];
                let mut current = face;
                while let Some(&previous) = came_from.get(&current) {
                    faces.push(previous);
                    current = previous;
                }
                faces.reverse();

                let mut points = vec![start];
                points.extend(
                    faces[1..faces.len() - 1]
                        .iter()
                        .map(|&face| self.face_center(face)),
                );
                points.push(goal);
                let points = self.smooth_path(points);
                trace!("Path found across {} faces in {} iterations", faces.len(), iterations);
                return PathResult {
                    points,
                    complete: true,
                };
            }

            let current_g = g_score[&face];
            for edge in 0..3 {
                let slot = self.adjacency[face * 3 + edge];
                if slot < 0 {
                    continue;
                }
                let neighbour = slot as usize / 3;
                if !self.is_face_walkable(neighbour) {
                    continue;
                }
                let cost = self.edge_cost(face, neighbour, start, goal, world, mover);
                let tentative = current_g + cost;
                if tentative < *g_score.get(&neighbour).unwrap_or(&f32::MAX) {
                    g_score.insert(neighbour, tentative);
                    came_from.insert(neighbour, face);
                    open.push(OpenEntry {
                        f: tentative + self.face_center(neighbour).distance(goal_center),
                        face: neighbour,
                    });
                }
            }
        }

        // no connection between the faces
        PathResult::direct(start, goal, false)
    }

    /// Cost of stepping from face `from` onto face `to`: distance scaled by
    /// the destination surface, plus obstacle and threat penalties, minus
    /// the cover bonus, floored at [`MIN_EDGE_COST`].
    fn edge_cost(
        &self,
        from: usize,
        to: usize,
        start: Vec3,
        goal: Vec3,
        world: Option<&dyn World>,
        mover: Option<&dyn Entity>,
    ) -> f32 {
        let destination = self.face_center(to);
        let base = self.face_center(from).distance(destination);
        let cost = base * self.face_material(to).cost_modifier()
            + self.obstacle_penalty(destination)
            + self.threat_exposure(destination, start, goal, world, mover)
            - self.cover_bonus(destination);
        cost.max(MIN_EDGE_COST)
    }

    /// Linear-falloff penalty summed over active blocking obstacles.
    pub(crate) fn obstacle_penalty(&self, position: Vec3) -> f32 {
        self.obstacles
            .values()
            .filter(|o| o.active && !o.walkable)
            .map(|o| {
                let radius = o.influence_radius.max(OBSTACLE_INFLUENCE);
                let distance = o.position.truncate().distance(position.truncate());
                if distance >= radius {
                    0.0
                } else {
                    (1.0 - distance / radius) * OBSTACLE_CENTER_PENALTY
                }
            })
            .sum()
    }

    /// Bonus for hugging cover, up to [`COVER_BONUS_MAX`].
    fn cover_bonus(&self, position: Vec3) -> f32 {
        self.cover_points
            .iter()
            .map(|point| {
                let distance = point.position.truncate().distance(position.truncate());
                if distance >= COVER_BONUS_RADIUS {
                    0.0
                } else {
                    point.quality * (1.0 - distance / COVER_BONUS_RADIUS) * COVER_BONUS_MAX
                }
            })
            .fold(0.0, f32::max)
    }

    /// Exposure of a position to known threats; without a world callback, a
    /// geometric heuristic penalizes the exposed middle of the route.
    fn threat_exposure(
        &self,
        position: Vec3,
        start: Vec3,
        goal: Vec3,
        world: Option<&dyn World>,
        mover: Option<&dyn Entity>,
    ) -> f32 {
        if let Some(world) = world {
            let mut exposure = 0.0;
            for entity in world.entities_in_radius(position, THREAT_RADIUS) {
                if !entity.is_alive() {
                    continue;
                }
                if let Some(mover) = mover {
                    if !entity.is_hostile_to(mover) {
                        continue;
                    }
                }
                if !world.line_of_sight(entity.position(), position) {
                    continue;
                }
                let distance = entity.position().distance(position);
                let threat = (1.0 - distance / THREAT_RADIUS).clamp(0.0, 1.0) * THREAT_PENALTY_MAX;
                let protection = self.cover_protection(position, entity.position());
                exposure += threat * (1.0 - protection);
            }
            return exposure;
        }

        // geometric fallback: mid-route positions are the exposed ones
        let length = start.distance(goal);
        if length < 1e-6 {
            return 0.0;
        }
        let midpoint = (start + goal) * 0.5;
        let distance = position.truncate().distance(midpoint.truncate());
        let base = (length * 0.1).min(THREAT_PENALTY_MAX);
        let exposure = base * (1.0 - (distance / (length * 0.5)).clamp(0.0, 1.0));
        exposure * (1.0 - self.cover_protection(position, midpoint))
    }

    /// Drops every intermediate waypoint whose neighbours see each other.
    fn smooth_path(&self, points: Vec<Vec3>) -> Vec<Vec3> {
        if points.len() <= 2 {
            return points;
        }
        let mut smoothed = vec![points[0]];
        let mut anchor = points[0];
        for window in points.windows(2).skip(1) {
            let (candidate, next) = (window[0], window[1]);
            if !self.line_of_sight(anchor, next) {
                smoothed.push(candidate);
                anchor = candidate;
            }
        }
        smoothed.push(*points.last().unwrap_or(&points[0]));
        smoothed
    }

    /// Path search around transient spherical blockers (position, radius).
    /// Each becomes a box obstacle in the reserved negative id range for
    /// the duration of the search.
    pub fn find_path_around_obstacles(
        &mut self,
        start: Vec3,
        goal: Vec3,
        obstacles: &[(Vec3, f32)],
    ) -> PathResult {
        let temporaries: Vec<DynamicObstacle> = obstacles
            .iter()
            .enumerate()
            .map(|(i, &(center, radius))| DynamicObstacle {
                id: TEMP_OBSTACLE_BASE_ID - i as i32,
                position: center,
                bounds_min: center - Vec3::splat(radius),
                bounds_max: center + Vec3::splat(radius),
                height: radius * 2.0,
                influence_radius: radius,
                active: true,
                walkable: false,
                has_top_surface: false,
            })
            .collect();

        for temporary in &temporaries {
            self.register_obstacle(temporary.clone());
        }
        self.update_all(&temporaries);

        let result = self.find_path(start, goal);

        for temporary in &temporaries {
            self.remove_obstacle(temporary.id);
        }
        result
    }
}
