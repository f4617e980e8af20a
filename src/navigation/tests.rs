use glam::{Vec2, Vec3};

use aurora_files::bwm::types::{SurfaceMaterial, Walkmesh, WalkmeshFace, WalkmeshType};
use aurora_files::common::types::C3Vector;

use crate::navigation::mesh::{NavigationLevel, NavigationMesh, SurfaceType};
use crate::navigation::obstacles::DynamicObstacle;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn walkmesh(
    walkmesh_type: WalkmeshType,
    vertices: &[(f32, f32, f32)],
    faces: &[([u32; 3], SurfaceMaterial, [i32; 3])],
) -> Walkmesh {
    let mut built = Walkmesh::new(walkmesh_type);
    built.vertices = vertices
        .iter()
        .map(|&(x, y, z)| C3Vector::new(x, y, z))
        .collect();
    built.faces = faces
        .iter()
        .map(|&(indices, material, adjacency)| WalkmeshFace {
            indices,
            material,
            adjacency,
        })
        .collect();
    built
}

fn single_triangle() -> NavigationMesh {
    NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ))
}

/// Two abutting triangles as separate meshes, joined by merge stitching.
fn stitched_quad() -> NavigationMesh {
    let left = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ));
    let right = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ));
    NavigationMesh::merge(&[left, right])
}

fn blocking_obstacle(id: i32, center: Vec3, half: f32, height: f32) -> DynamicObstacle {
    DynamicObstacle {
        id,
        position: center,
        bounds_min: center - Vec3::new(half, half, 0.0),
        bounds_max: center + Vec3::new(half, half, height),
        height,
        influence_radius: half,
        active: true,
        walkable: false,
        has_top_surface: false,
    }
}

#[test]
fn single_triangle_supports_walkability_and_raycast() {
    init_logs();
    let mesh = single_triangle();
    assert!(mesh.is_walkable(Vec3::new(0.25, 0.25, 0.0)));

    let (hit, face) = mesh
        .raycast(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0), 2.0)
        .expect("downward ray hits the floor");
    assert!(hit.distance(Vec3::new(0.25, 0.25, 0.0)) < 1e-5);
    assert_eq!(face, 0);
}

#[test]
fn raycast_without_a_tree_scans_faces() {
    let mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::PlaceableOrDoor,
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ));
    let (hit, _) = mesh
        .raycast(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0), 2.0)
        .expect("linear scan finds the face");
    assert!(hit.distance(Vec3::new(0.25, 0.25, 0.0)) < 1e-5);
}

#[test]
fn ingest_deduplicates_vertices_and_preserves_materials() {
    let mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            // same positions again, different slots
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
        ],
        &[
            ([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([3, 4, 5], SurfaceMaterial::Stone, [-1, -1, -1]),
        ],
    ));
    assert_eq!(mesh.vertices().len(), 4);
    assert_eq!(mesh.face_material(0), SurfaceMaterial::Grass);
    assert_eq!(mesh.face_material(1), SurfaceMaterial::Stone);
}

#[test]
fn world_position_offsets_vertices_before_dedup() {
    let mut source = walkmesh(
        WalkmeshType::AreaModel,
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    );
    source.position = C3Vector::new(10.0, 0.0, 0.0);
    let mesh = NavigationMesh::from_walkmesh(&source);
    assert!(mesh.is_walkable(Vec3::new(10.25, 0.25, 0.0)));
    assert!(!mesh.is_walkable(Vec3::new(0.25, 0.25, 0.0)));
}

#[test]
fn non_walkable_faces_lose_their_adjacency() {
    let mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (1.0, 1.0, 0.0),
        ],
        &[
            ([0, 1, 2], SurfaceMaterial::NonWalk, [-1, 5, -1]),
            ([1, 3, 2], SurfaceMaterial::Grass, [1, -1, -1]),
        ],
    ));
    assert_eq!(&mesh.adjacency()[0..3], &[-1, -1, -1]);
    assert_eq!(&mesh.adjacency()[3..6], &[1, -1, -1]);
}

#[test]
fn merge_stitches_the_shared_edge_bidirectionally() {
    init_logs();
    let merged = stitched_quad();
    assert_eq!(merged.face_count(), 2);

    // the shared diagonal is face 0 edge 1 against face 1 edge 2
    assert_eq!(merged.adjacency()[0 * 3 + 1], (1 * 3 + 2) as i32);
    assert_eq!(merged.adjacency()[1 * 3 + 2], (0 * 3 + 1) as i32);
}

#[test]
fn merge_of_one_mesh_is_identity_up_to_the_tree() {
    let mesh = single_triangle();
    let merged = NavigationMesh::merge(std::slice::from_ref(&mesh));
    assert_eq!(merged.vertices(), mesh.vertices());
    assert_eq!(merged.face_indices(), mesh.face_indices());
    assert_eq!(merged.adjacency(), mesh.adjacency());
    assert_eq!(merged.face_material(0), mesh.face_material(0));
}

#[test]
fn merge_of_nothing_is_an_empty_mesh() {
    let merged = NavigationMesh::merge(&[]);
    assert_eq!(merged.face_count(), 0);
    assert!(merged.project(Vec3::ZERO).is_none());
}

#[test]
fn adjacency_entries_reference_coincident_edges() {
    let mesh = stitched_quad();
    let quantize = |v: Vec3| {
        (
            (v.x * 1e3).round() as i64,
            (v.y * 1e3).round() as i64,
            (v.z * 1e3).round() as i64,
        )
    };
    for face in 0..mesh.face_count() {
        for edge in 0..3 {
            let slot = mesh.adjacency()[face * 3 + edge];
            if slot < 0 {
                continue;
            }
            assert!((slot as usize) < mesh.face_count() * 3);
            let (other_face, other_edge) = (slot as usize / 3, slot as usize % 3);

            let mine = [
                mesh.face_vertices(face)[edge],
                mesh.face_vertices(face)[(edge + 1) % 3],
            ];
            let theirs = [
                mesh.face_vertices(other_face)[other_edge],
                mesh.face_vertices(other_face)[(other_edge + 1) % 3],
            ];
            let mut mine_keys = [quantize(mine[0]), quantize(mine[1])];
            let mut their_keys = [quantize(theirs[0]), quantize(theirs[1])];
            mine_keys.sort();
            their_keys.sort();
            assert_eq!(mine_keys, their_keys);
        }
    }
}

#[test]
fn projection_is_idempotent_on_the_face() {
    let mesh = single_triangle();
    let query = Vec3::new(0.3, 0.3, 0.7);
    let first_face = mesh.project_to_face(query).expect("query projects");
    let (projected, _) = mesh.project(query).expect("query projects");
    let second_face = mesh.project_to_face(projected).expect("projection projects");
    assert_eq!(first_face, second_face);
}

#[test]
fn walkability_rejects_distant_supports() {
    let mesh = single_triangle();
    // too far above the face
    assert!(!mesh.is_walkable(Vec3::new(0.25, 0.25, 3.0)));
    // off the mesh entirely
    assert!(!mesh.is_walkable(Vec3::new(50.0, 50.0, 0.0)));
}

#[test]
fn empty_mesh_degrades_to_sentinels() {
    let mut mesh = NavigationMesh::new();
    assert!(mesh.project(Vec3::ZERO).is_none());
    assert!(!mesh.is_walkable(Vec3::ZERO));
    assert!(mesh.raycast(Vec3::Z, Vec3::NEG_Z, 10.0).is_none());
    assert!(mesh.line_of_sight(Vec3::ZERO, Vec3::X));
    assert!(mesh.find_cover_points(Vec3::ZERO, 10.0).is_empty());

    let path = mesh.find_path(Vec3::ZERO, Vec3::X);
    assert_eq!(path.points, vec![Vec3::ZERO, Vec3::X]);
    assert!(!path.complete);
}

#[test]
fn degenerate_triangle_projects_to_the_vertex_mean() {
    let mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(0.0, 0.0, 1.0), (1.0, 0.0, 2.0), (2.0, 0.0, 3.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ));
    // collinear corners leave no usable plane normal
    assert!((mesh.height_on_face(0, Vec2::new(1.0, 0.0)) - 2.0).abs() < 1e-5);
}

#[test]
fn obstacle_register_remove_restores_prior_state() {
    let mut mesh = stitched_quad();
    let obstacle = blocking_obstacle(7, Vec3::new(0.5, 0.5, 0.0), 0.2, 1.0);

    assert_eq!(mesh.obstacle_count(), 0);
    mesh.register_obstacle(obstacle.clone());
    assert_eq!(mesh.obstacle_count(), 1);
    assert!(!mesh.invalidated_faces().is_empty());
    assert!(mesh.needs_rebuild());

    assert!(mesh.remove_obstacle(7));
    assert_eq!(mesh.obstacle_count(), 0);
    assert!(mesh.obstacle(7).is_none());
    // the invalidation signal survives as a superset for cache owners
    assert!(!mesh.invalidated_faces().is_empty());

    mesh.clear_invalidated();
    assert!(mesh.invalidated_faces().is_empty());
    mesh.mark_rebuilt();
    assert!(!mesh.needs_rebuild());
}

#[test]
fn update_all_detects_only_real_changes() {
    let mut mesh = stitched_quad();
    let obstacle = blocking_obstacle(1, Vec3::new(0.5, 0.5, 0.0), 0.2, 1.0);
    mesh.update_all(std::slice::from_ref(&obstacle));
    assert!(!mesh.invalidated_faces().is_empty());
    mesh.clear_invalidated();

    // a sub-threshold wiggle is not a change
    let mut wiggled = obstacle.clone();
    wiggled.position += Vec3::splat(0.01);
    wiggled.bounds_min += Vec3::splat(0.01);
    wiggled.bounds_max += Vec3::splat(0.01);
    mesh.update_all(std::slice::from_ref(&wiggled));
    assert!(mesh.invalidated_faces().is_empty());

    // a real move is
    let mut moved = obstacle.clone();
    moved.position += Vec3::new(0.5, 0.0, 0.0);
    moved.bounds_min += Vec3::new(0.5, 0.0, 0.0);
    moved.bounds_max += Vec3::new(0.5, 0.0, 0.0);
    mesh.update_all(std::slice::from_ref(&moved));
    assert!(!mesh.invalidated_faces().is_empty());

    // flipping a flag is too
    mesh.clear_invalidated();
    let mut inactive = moved.clone();
    inactive.active = false;
    mesh.update_all(std::slice::from_ref(&inactive));
    assert!(!mesh.invalidated_faces().is_empty());
}

#[test]
fn create_hole_destroys_and_invalidates_faces_in_radius() {
    let mut mesh = stitched_quad();
    mesh.create_hole(Vec3::new(0.5, 0.5, 0.0), 2.0);

    for face in 0..mesh.face_count() {
        assert!(mesh.face_destroyed(face));
        assert!(mesh.invalidated_faces().contains(&face));
        assert!(!mesh.is_face_walkable(face));
    }
    assert!(mesh.needs_rebuild());
    assert!(!mesh.is_walkable(Vec3::new(0.25, 0.25, 0.0)));
}

#[test]
fn create_hole_reaches_every_face_beyond_the_query_cap() {
    // a 16-triangle fan, all centroids well inside the hole radius, on
    // both the tree-indexed and linear-scan paths
    for walkmesh_type in [WalkmeshType::AreaModel, WalkmeshType::PlaceableOrDoor] {
        let mut vertices = vec![(0.0, 0.0, 0.0)];
        for i in 0..16u32 {
            let angle = i as f32 * std::f32::consts::TAU / 16.0;
            vertices.push((angle.cos(), angle.sin(), 0.0));
        }
        let faces: Vec<([u32; 3], SurfaceMaterial, [i32; 3])> = (0..16u32)
            .map(|i| {
                (
                    [0, i + 1, (i + 1) % 16 + 1],
                    SurfaceMaterial::Grass,
                    [-1, -1, -1],
                )
            })
            .collect();
        let mut mesh = NavigationMesh::from_walkmesh(&walkmesh(walkmesh_type, &vertices, &faces));
        assert_eq!(mesh.face_count(), 16);

        mesh.create_hole(Vec3::ZERO, 2.0);
        for face in 0..mesh.face_count() {
            assert!(mesh.face_destroyed(face), "face {} survived the hole", face);
            assert!(
                mesh.invalidated_faces().contains(&face),
                "face {} was not invalidated",
                face
            );
            assert!(!mesh.is_face_walkable(face));
        }
    }
}

#[test]
fn line_of_sight_respects_obstacles_and_their_walkability() {
    let mut mesh = NavigationMesh::new();
    let mut wall = DynamicObstacle {
        id: 1,
        position: Vec3::new(1.0, 0.0, 0.0),
        bounds_min: Vec3::new(0.9, -1.0, 0.0),
        bounds_max: Vec3::new(1.1, 1.0, 2.0),
        height: 2.0,
        influence_radius: 0.5,
        active: true,
        walkable: false,
        has_top_surface: false,
    };
    mesh.register_obstacle(wall.clone());
    assert!(!mesh.line_of_sight(Vec3::new(0.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 1.0)));

    wall.walkable = true;
    mesh.update_obstacle(wall);
    assert!(mesh.line_of_sight(Vec3::new(0.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 1.0)));
}

#[test]
fn line_of_sight_through_a_destroyed_wall_face() {
    // floor plus a wall triangle across the ray
    let mut mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[
            (0.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (2.0, 1.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (1.0, 0.5, 1.5),
        ],
        &[
            ([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([1, 3, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([4, 5, 6], SurfaceMaterial::NonWalk, [-1, -1, -1]),
        ],
    ));

    let from = Vec3::new(0.0, 0.5, 0.5);
    let to = Vec3::new(2.0, 0.5, 0.5);
    assert!(!mesh.line_of_sight(from, to));

    mesh.create_hole(Vec3::new(1.0, 0.5, 0.5), 0.4);
    assert!(mesh.face_destroyed(2));
    assert!(mesh.line_of_sight(from, to));
}

#[test]
fn path_on_one_face_is_the_direct_segment() {
    let mut mesh = single_triangle();
    let path = mesh.find_path(Vec3::new(0.1, 0.1, 0.0), Vec3::new(0.2, 0.3, 0.0));
    assert!(path.complete);
    assert_eq!(path.points.len(), 2);
}

#[test]
fn path_crosses_the_stitched_edge() {
    let mut mesh = stitched_quad();
    let path = mesh.find_path(Vec3::new(0.1, 0.1, 0.0), Vec3::new(0.9, 0.9, 0.0));
    assert!(path.complete);
    assert_eq!(path.points.first().copied(), Some(Vec3::new(0.1, 0.1, 0.0)));
    assert_eq!(path.points.last().copied(), Some(Vec3::new(0.9, 0.9, 0.0)));
}

#[test]
fn obstacles_penalize_edges_and_paths_avoid_their_footprint() {
    let mut mesh = stitched_quad();
    let obstacle = DynamicObstacle {
        id: 3,
        position: Vec3::new(0.5, 0.5, 0.0),
        bounds_min: Vec3::new(0.4, 0.4, 0.0),
        bounds_max: Vec3::new(0.6, 0.6, 1.0),
        height: 1.0,
        influence_radius: 0.5,
        active: true,
        walkable: false,
        has_top_surface: false,
    };
    mesh.register_obstacle(obstacle.clone());

    assert!(mesh.obstacle_penalty(Vec3::new(0.5, 0.5, 0.0)) > 0.0);
    assert!(
        mesh.obstacle_penalty(Vec3::new(0.5, 0.5, 0.0))
            > mesh.obstacle_penalty(Vec3::new(0.0, 1.5, 0.0))
    );

    let path = mesh.find_path(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0));
    assert!(path.complete);
    for point in &path.points {
        let inside = point.x > 0.4 && point.x < 0.6 && point.y > 0.4 && point.y < 0.6;
        assert!(!inside, "waypoint {:?} enters the obstacle footprint", point);
    }
}

#[test]
fn temporary_obstacles_are_always_unregistered() {
    let mut mesh = stitched_quad();
    let blockers = [(Vec3::new(0.5, 0.5, 0.0), 0.3)];
    let path = mesh.find_path_around_obstacles(
        Vec3::new(0.1, 0.1, 0.0),
        Vec3::new(0.9, 0.9, 0.0),
        &blockers,
    );
    assert!(path.complete);
    assert_eq!(mesh.obstacle_count(), 0);
    assert!(mesh.obstacle(-1).is_none());
}

#[test]
fn projection_prefers_ground_then_obstacle_top() {
    let mut mesh = NavigationMesh::new();
    mesh.register_obstacle(DynamicObstacle {
        id: 2,
        position: Vec3::new(0.5, 0.5, 0.0),
        bounds_min: Vec3::new(0.4, 0.4, 0.0),
        bounds_max: Vec3::new(0.6, 0.6, 1.0),
        height: 1.0,
        influence_radius: 0.5,
        active: true,
        walkable: true,
        has_top_surface: true,
    });

    let (projected, height) = mesh.project(Vec3::new(0.5, 0.5, 1.4)).expect("top surface");
    assert!((height - 1.0).abs() < 1e-5);
    assert!(projected.truncate().distance(Vec2::new(0.5, 0.5)) < 1e-5);
    assert!(mesh.is_walkable(Vec3::new(0.5, 0.5, 1.0)));
}

#[test]
fn navigation_levels_support_projection_and_walkability() {
    let mut mesh = single_triangle();
    mesh.add_level(NavigationLevel {
        id: 1,
        base_height: 5.0,
        height_range: 2.0,
        surface_type: SurfaceType::Elevated,
        walkable: true,
    });

    // away from the static faces only the level can support the query
    let (projected, height) = mesh.project(Vec3::new(30.0, 30.0, 6.0)).expect("level support");
    assert!((height - 5.0).abs() < 1e-5);
    assert_eq!(projected, Vec3::new(30.0, 30.0, 5.0));
    assert!(mesh.is_walkable(Vec3::new(30.0, 30.0, 5.5)));
    // outside the level's height range nothing supports it
    assert!(mesh.project(Vec3::new(30.0, 30.0, 20.0)).is_none());
}

#[test]
fn surface_priority_orders_ground_first() {
    assert!(SurfaceType::Ground < SurfaceType::Platform);
    assert!(SurfaceType::Platform < SurfaceType::Elevated);
    assert!(SurfaceType::Elevated < SurfaceType::Obstacle);
}

#[test]
fn cover_points_grow_along_walls_and_rank_by_quality() {
    // a 2x1 floor with a 1.5 tall wall fin at x = 1
    let mut mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[
            (0.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (2.0, 1.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (1.0, 0.5, 1.5),
        ],
        &[
            ([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([1, 3, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([4, 5, 6], SurfaceMaterial::NonWalk, [-1, -1, -1]),
        ],
    ));

    let points = mesh.find_cover_points(Vec3::new(1.0, 0.5, 0.0), 5.0);
    assert!(!points.is_empty());
    assert!(points.iter().all(|p| p.quality >= 0.3 && p.quality <= 1.0));
    for pair in points.windows(2) {
        assert!(pair[0].quality >= pair[1].quality);
    }
    assert!(points.iter().any(|p| p.source_face == Some(2)));
}

#[test]
fn standing_obstacles_offer_perimeter_cover() {
    let mut mesh = stitched_quad();
    mesh.register_obstacle(blocking_obstacle(9, Vec3::new(0.5, 0.5, 0.0), 0.2, 1.5));
    let points = mesh.find_cover_points(Vec3::new(0.5, 0.5, 0.0), 3.0);
    assert!(points.iter().any(|p| p.source_obstacle == Some(9)));
}

#[test]
fn provides_cover_depends_on_the_threat_side() {
    let mut mesh = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[
            (0.0, 0.0, 0.0),
            (3.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (3.0, 1.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (1.0, 0.5, 1.5),
        ],
        &[
            ([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            ([1, 3, 2], SurfaceMaterial::Grass, [-1, -1, -1]),
            // wall normal points toward +x
            ([4, 5, 6], SurfaceMaterial::NonWalk, [-1, -1, -1]),
        ],
    ));

    let position = Vec3::new(1.5, 0.5, 0.0);
    assert!(mesh.provides_cover(position, Vec3::new(-2.0, 0.5, 0.0)));
    assert!(!mesh.provides_cover(position, Vec3::new(5.0, 0.5, 0.0)));
}

#[test]
fn tactical_positions_are_ranked_and_bounded() {
    let mut mesh = stitched_quad();
    let positions = mesh.find_tactical_positions(Vec3::new(0.5, 0.5, 0.0), 5.0, None);
    assert!(positions.len() <= 50);
    assert!(!positions.is_empty());
    for position in &positions {
        assert!((0.0..=1.0).contains(&position.value));
    }
    for pair in positions.windows(2) {
        assert!(pair[0].value >= pair[1].value);
    }
}

#[test]
fn stitching_ignores_non_walkable_faces() {
    let left = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::NonWalk, [-1, -1, -1])],
    ));
    let right = NavigationMesh::from_walkmesh(&walkmesh(
        WalkmeshType::AreaModel,
        &[(1.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)],
        &[([0, 1, 2], SurfaceMaterial::Grass, [-1, -1, -1])],
    ));
    let merged = NavigationMesh::merge(&[left, right]);
    assert!(merged.adjacency().iter().all(|&slot| slot == -1));
}
