use crate::ParserError;
use crate::bwm::reader::BwmReader;
use crate::bwm::types::{BwmAabbNode, SurfaceMaterial, Walkmesh, WalkmeshFace, WalkmeshType};
use crate::bwm::writer::BwmWriter;
use crate::common::types::{C3Vector, CAaBox};

fn two_triangle_walkmesh() -> Walkmesh {
    let mut walkmesh = Walkmesh::new(WalkmeshType::AreaModel);
    walkmesh.vertices = vec![
        C3Vector::new(0.0, 0.0, 0.0),
        C3Vector::new(1.0, 0.0, 0.0),
        C3Vector::new(0.0, 1.0, 0.0),
        C3Vector::new(1.0, 1.0, 0.0),
    ];
    walkmesh.faces = vec![
        WalkmeshFace {
            indices: [0, 1, 2],
            material: SurfaceMaterial::Grass,
            // edge 1 (v1-v2) borders face 1's edge 0
            adjacency: [-1, 1 * 3 + 0, -1],
        },
        WalkmeshFace {
            indices: [1, 3, 2],
            material: SurfaceMaterial::Stone,
            adjacency: [0 * 3 + 1, -1, -1],
        },
    ];
    walkmesh.aabbs = vec![
        BwmAabbNode {
            bounding_box: CAaBox {
                min: C3Vector::ZERO,
                max: C3Vector::new(1.0, 1.0, 0.0),
            },
            leaf_face: -1,
            unknown: 0,
            most_significant_plane: 0,
            left: 1,
            right: 2,
        },
        BwmAabbNode {
            bounding_box: CAaBox {
                min: C3Vector::ZERO,
                max: C3Vector::new(1.0, 1.0, 0.0),
            },
            leaf_face: 0,
            unknown: 0,
            most_significant_plane: 0,
            left: -1,
            right: -1,
        },
        BwmAabbNode {
            bounding_box: CAaBox {
                min: C3Vector::ZERO,
                max: C3Vector::new(1.0, 1.0, 0.0),
            },
            leaf_face: 1,
            unknown: 0,
            most_significant_plane: 0,
            left: -1,
            right: -1,
        },
    ];
    walkmesh
}

#[test]
fn walkmesh_round_trips() -> Result<(), anyhow::Error> {
    let walkmesh = two_triangle_walkmesh();
    let bytes = BwmWriter::write(&walkmesh)?;
    let parsed = BwmReader::read(&bytes)?;
    assert_eq!(parsed, walkmesh);
    Ok(())
}

#[test]
fn write_read_write_is_bit_stable() -> Result<(), anyhow::Error> {
    let walkmesh = two_triangle_walkmesh();
    let bytes1 = BwmWriter::write(&walkmesh)?;
    let bytes2 = BwmWriter::write(&BwmReader::read(&bytes1)?)?;
    assert_eq!(bytes1, bytes2);
    Ok(())
}

#[test]
fn bad_signature_is_rejected() {
    let mut bytes = BwmWriter::write(&two_triangle_walkmesh()).unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        BwmReader::read(&bytes),
        Err(ParserError::InvalidMagicValue { .. })
    ));
}

#[test]
fn truncated_buffer_is_truncated() {
    let bytes = BwmWriter::write(&two_triangle_walkmesh()).unwrap();
    assert!(matches!(
        BwmReader::read(&bytes[..10]),
        Err(ParserError::Truncated)
    ));
}

#[test]
fn out_of_range_face_index_is_malformed() {
    let mut walkmesh = two_triangle_walkmesh();
    walkmesh.aabbs.clear();
    let mut bytes = BwmWriter::write(&walkmesh).unwrap();
    // first face index lives right behind the 4 vertices
    let face_offset = 56 + 4 * 12;
    bytes[face_offset..face_offset + 4].copy_from_slice(&99u32.to_le_bytes());
    assert!(matches!(
        BwmReader::read(&bytes),
        Err(ParserError::MalformedFormat { .. })
    ));
}

#[test]
fn unknown_material_is_unsupported() {
    let mut walkmesh = two_triangle_walkmesh();
    walkmesh.aabbs.clear();
    let mut bytes = BwmWriter::write(&walkmesh).unwrap();
    let material_offset = 56 + 4 * 12 + 2 * 12;
    bytes[material_offset..material_offset + 4].copy_from_slice(&23u32.to_le_bytes());
    assert!(matches!(
        BwmReader::read(&bytes),
        Err(ParserError::Unsupported { .. })
    ));
}

#[test]
fn walkability_follows_the_material_table() {
    for material in [
        SurfaceMaterial::Dirt,
        SurfaceMaterial::Grass,
        SurfaceMaterial::Water,
        SurfaceMaterial::BottomlessPit,
        SurfaceMaterial::Door,
        SurfaceMaterial::Trigger,
    ] {
        assert!(material.walkable(), "{:?} is walkable", material);
    }
    for material in [
        SurfaceMaterial::Undefined,
        SurfaceMaterial::Obscuring,
        SurfaceMaterial::NonWalk,
        SurfaceMaterial::Transparent,
        SurfaceMaterial::Lava,
        SurfaceMaterial::DeepWater,
        SurfaceMaterial::NonWalkGrass,
    ] {
        assert!(!material.walkable(), "{:?} is not walkable", material);
    }
}

#[test]
fn cost_modifiers_match_the_surface_table() {
    assert_eq!(SurfaceMaterial::Water.cost_modifier(), 1.5);
    assert_eq!(SurfaceMaterial::Puddles.cost_modifier(), 1.5);
    assert_eq!(SurfaceMaterial::Swamp.cost_modifier(), 1.5);
    assert_eq!(SurfaceMaterial::Mud.cost_modifier(), 1.5);
    assert_eq!(SurfaceMaterial::BottomlessPit.cost_modifier(), 10.0);
    assert_eq!(SurfaceMaterial::Grass.cost_modifier(), 1.0);
}

#[test]
fn walkable_faces_skip_non_walkable_materials() {
    let mut walkmesh = two_triangle_walkmesh();
    walkmesh.faces[1].material = SurfaceMaterial::NonWalk;
    let walkable: Vec<usize> = walkmesh.walkable_faces().collect();
    assert_eq!(walkable, vec![0]);
}
