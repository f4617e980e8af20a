use crate::ParserError;
use crate::common::types::{C2Vector, C3Vector, C4Quaternion, CAaBox};
use crate::mdl::reader::MdlReader;
use crate::mdl::types::{
    Animation, AnimationEvent, Classification, Controller, ControllerRow, Dangly, Face,
    FaceAdjacency, Game, Light, Mesh, Model, Node, NodeFlags, Skin, controller, pack_face_material,
    unpack_face_material,
};
use crate::mdl::writer::MdlWriter;

fn triangle_mesh() -> Mesh {
    Mesh {
        positions: vec![
            C3Vector::new(0.0, 0.0, 0.0),
            C3Vector::new(1.0, 0.0, 0.0),
            C3Vector::new(0.0, 1.0, 0.0),
        ],
        normals: vec![C3Vector::new(0.0, 0.0, 1.0); 3],
        uv0: vec![
            C2Vector::new(0.0, 0.0),
            C2Vector::new(1.0, 0.0),
            C2Vector::new(0.0, 1.0),
        ],
        faces: vec![Face {
            normal: C3Vector::new(0.0, 0.0, 1.0),
            plane_coefficient: 0.0,
            material: pack_face_material(3, 0),
            adjacency: [FaceAdjacency::OPEN; 3],
            indices: [0, 1, 2],
        }],
        // asymmetric channels, so a missed BGR reversal shows up
        diffuse: C3Vector::new(0.1, 0.5, 0.9),
        ambient: C3Vector::new(0.2, 0.3, 0.4),
        bounding_box: CAaBox {
            min: C3Vector::ZERO,
            max: C3Vector::new(1.0, 1.0, 0.0),
        },
        radius: 1.0,
        average: C3Vector::new(0.33, 0.33, 0.0),
        total_area: 0.5,
        ..Mesh::default()
    }
}

fn single_trimesh_model() -> Model {
    let mut model = Model::new("test");
    let mut child = Node::new("test_mesh");
    child.node_id = 1;
    child.name_id = 1;
    child.position = C3Vector::new(0.0, 0.0, 0.5);
    child.mesh = Some(Box::new(triangle_mesh()));
    model.root.children.push(child);
    model
}

#[test]
fn trimesh_round_trip_is_structural_identity() -> Result<(), anyhow::Error> {
    let model = single_trimesh_model();
    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn write_read_write_is_bit_stable() -> Result<(), anyhow::Error> {
    let model = single_trimesh_model();
    let (mdl1, mdx1) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl1, &mdx1)?;
    let (mdl2, mdx2) = MdlWriter::write(&parsed, Game::Kotor1)?;
    assert_eq!(mdl1, mdl2);
    assert_eq!(mdx1, mdx2);
    Ok(())
}

#[test]
fn kotor2_variant_round_trips_extra_dwords() -> Result<(), anyhow::Error> {
    let mut model = single_trimesh_model();
    model.root.children[0].mesh.as_mut().unwrap().k2_unknowns = [7, 11];
    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor2)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn node_type_word_matches_the_attachment_table() {
    let dummy = Node::new("dummy");
    assert_eq!(NodeFlags::for_node(&dummy).bits(), 1);

    let mut trimesh = Node::new("trimesh");
    trimesh.mesh = Some(Box::new(Mesh::default()));
    assert_eq!(NodeFlags::for_node(&trimesh).bits(), 33);

    let mut skin = Node::new("skin");
    let mut mesh = Mesh::default();
    mesh.skin = Some(Skin::default());
    skin.mesh = Some(Box::new(mesh));
    assert_eq!(NodeFlags::for_node(&skin).bits(), 97);

    let mut dangly = Node::new("dangly");
    let mut mesh = Mesh::default();
    mesh.dangly = Some(Dangly::default());
    dangly.mesh = Some(Box::new(mesh));
    assert_eq!(NodeFlags::for_node(&dangly).bits(), 289);

    let mut light = Node::new("light");
    light.light = Some(test_light());
    assert_eq!(NodeFlags::for_node(&light).bits(), 3);
}

fn test_light() -> Light {
    Light {
        flare_radius: 2.5,
        flare_sizes: vec![1.0, 0.5],
        flare_positions: vec![0.1, 0.9],
        flare_color_shifts: vec![C3Vector::new(0.1, 0.2, 0.3)],
        flare_texture_names: vec!["flare01".to_string()],
        priority: 4,
        ambient_only: false,
        dynamic_type: 1,
        affect_dynamic: true,
        shadow: true,
        flare: true,
        fading: false,
    }
}

#[test]
fn light_node_round_trips() -> Result<(), anyhow::Error> {
    let mut model = Model::new("lamp");
    let mut light_node = Node::new("lamp_light");
    light_node.node_id = 1;
    light_node.name_id = 1;
    light_node.light = Some(test_light());
    model.root.children.push(light_node);

    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn skinned_mesh_round_trips_weights_through_the_mdx() -> Result<(), anyhow::Error> {
    let mut model = Model::new("creature");
    let mut mesh = triangle_mesh();
    mesh.skin = Some(Skin {
        bone_map: vec![0, 2],
        qbones: vec![C4Quaternion::IDENTITY, C4Quaternion::new(0.0, 1.0, 0.0, 0.0)],
        tbones: vec![C3Vector::ZERO, C3Vector::new(0.0, 0.0, 1.0)],
        weights: vec![[1.0, 0.0, 0.0, 0.0]; 3],
        bone_indices: vec![[0.0, -1.0, -1.0, -1.0]; 3],
        bone_serial: [0; 16],
    });
    let mut child = Node::new("creature_body");
    child.node_id = 1;
    child.name_id = 1;
    child.mesh = Some(Box::new(mesh));
    model.root.children.push(child);

    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn controllers_are_repacked_and_recovered() -> Result<(), anyhow::Error> {
    let mut model = single_trimesh_model();
    model.root.children[0].controllers = vec![
        Controller {
            controller_type: controller::POSITION,
            columns: 3,
            rows: vec![
                ControllerRow {
                    time: 0.0,
                    values: vec![0.0, 0.0, 0.5],
                },
                ControllerRow {
                    time: 1.0,
                    values: vec![1.0, 2.0, 3.0],
                },
            ],
        },
        Controller {
            controller_type: controller::ORIENTATION,
            columns: 4 | controller::BEZIER_FLAG,
            rows: vec![ControllerRow {
                time: 0.5,
                values: (0..12).map(|i| i as f32).collect(),
            }],
        },
        // an undocumented selector passes through verbatim
        Controller {
            controller_type: 424242,
            columns: 2,
            rows: vec![ControllerRow {
                time: 0.25,
                values: vec![9.0, 8.0],
            }],
        },
    ];

    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn mismatched_controller_rows_are_unrepresentable() {
    let mut model = single_trimesh_model();
    model.root.children[0].controllers = vec![Controller {
        controller_type: controller::POSITION,
        columns: 3,
        rows: vec![ControllerRow {
            time: 0.0,
            values: vec![1.0],
        }],
    }];
    let result = MdlWriter::write(&model, Game::Kotor1);
    assert!(matches!(result, Err(ParserError::Unrepresentable { .. })));
}

#[test]
fn animations_round_trip_with_events() -> Result<(), anyhow::Error> {
    let mut model = single_trimesh_model();
    let mut anim_node = Node::new("test_mesh");
    anim_node.name_id = 1;
    anim_node.controllers = vec![Controller {
        controller_type: controller::POSITION,
        columns: 3,
        rows: vec![ControllerRow {
            time: 0.0,
            values: vec![0.0, 0.0, 0.0],
        }],
    }];
    let mut anim_root = Node::new("test");
    anim_root.children.push(anim_node);
    model.animations.push(Animation {
        name: "walk".to_string(),
        root_model: "test".to_string(),
        length: 1.5,
        transition: 0.25,
        events: vec![AnimationEvent {
            activation_time: 0.5,
            name: "footstep".to_string(),
        }],
        root: anim_root,
    });
    // animation node ids are assigned per tree
    model.animations[0].root.children[0].node_id = 1;

    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed, model);
    Ok(())
}

#[test]
fn classification_survives_round_trip() -> Result<(), anyhow::Error> {
    let mut model = single_trimesh_model();
    model.classification = Classification::Door;
    model.subclassification = 3;
    let (mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let parsed = MdlReader::read(&mdl, &mdx)?;
    assert_eq!(parsed.classification, Classification::Door);
    assert_eq!(parsed.subclassification, 3);
    Ok(())
}

#[test]
fn oversized_name_is_unrepresentable() {
    let model = Model::new("a".repeat(33));
    let result = MdlWriter::write(&model, Game::Kotor1);
    assert!(matches!(result, Err(ParserError::Unrepresentable { .. })));
}

#[test]
fn attribute_array_disagreeing_with_vertex_count_is_unrepresentable() {
    let mut model = single_trimesh_model();
    model.root.children[0].mesh.as_mut().unwrap().normals.pop();
    let result = MdlWriter::write(&model, Game::Kotor1);
    assert!(matches!(result, Err(ParserError::Unrepresentable { .. })));
}

#[test]
fn short_buffer_is_truncated() {
    let result = MdlReader::read(&[0u8; 8], &[]);
    assert!(matches!(result, Err(ParserError::Truncated)));
}

#[test]
fn unknown_engine_word_is_unsupported() -> Result<(), anyhow::Error> {
    let model = single_trimesh_model();
    let (mut mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    // corrupt the engine identifier word
    mdl[12..16].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    let result = MdlReader::read(&mdl, &mdx);
    assert!(matches!(result, Err(ParserError::Unsupported { .. })));
    Ok(())
}

#[test]
fn declared_size_beyond_buffer_is_malformed() -> Result<(), anyhow::Error> {
    let model = single_trimesh_model();
    let (mut mdl, mdx) = MdlWriter::write(&model, Game::Kotor1)?;
    let oversized = (mdl.len() as u32) * 2;
    mdl[4..8].copy_from_slice(&oversized.to_le_bytes());
    let result = MdlReader::read(&mdl, &mdx);
    assert!(matches!(result, Err(ParserError::MalformedFormat { .. })));
    Ok(())
}

#[test]
fn face_material_packing_is_the_identity() {
    assert_eq!(pack_face_material(5, 7), 229);
    assert_eq!(unpack_face_material(229), (5, 7));

    for packed in (0..=u16::MAX as u32).step_by(37).chain([u32::MAX - 3, u32::MAX]) {
        let (surface, smoothing) = unpack_face_material(packed);
        assert_eq!(pack_face_material(surface, smoothing), packed);
    }
}

#[test]
fn parent_lookup_is_a_tree_search() {
    let model = single_trimesh_model();
    let child = &model.root.children[0];
    let parent = model.root.parent_of(child).expect("child has a parent");
    assert_eq!(parent.name, "test");
    assert!(model.root.parent_of(&model.root).is_none());
}
