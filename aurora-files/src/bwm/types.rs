use aurora_files_derive_parseable::{Emit, Parse};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::types::{C3Vector, CAaBox};

pub const BWM_SIGNATURE: &[u8; 8] = b"BWM V1.0";

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum WalkmeshType {
    /// Door and placeable walkmeshes: small, no spatial index.
    PlaceableOrDoor = 0,
    /// Room walkmeshes: large enough to warrant the AABB tree.
    AreaModel = 1,
}

/// Surface materials as the walkmesh stores them. Walkability and the
/// pathfinding cost modifiers are derived from this value alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum SurfaceMaterial {
    Undefined = 0,
    Dirt = 1,
    Obscuring = 2,
    Grass = 3,
    Stone = 4,
    Wood = 5,
    Water = 6,
    NonWalk = 7,
    Transparent = 8,
    Carpet = 9,
    Metal = 10,
    Puddles = 11,
    Swamp = 12,
    Mud = 13,
    Leaves = 14,
    Lava = 15,
    BottomlessPit = 16,
    DeepWater = 17,
    Door = 18,
    NonWalkGrass = 19,
    Sand = 20,
    BareBones = 21,
    StoneBridge = 22,
    Trigger = 30,
}

impl SurfaceMaterial {
    pub fn walkable(self) -> bool {
        matches!(
            self,
            SurfaceMaterial::Dirt
                | SurfaceMaterial::Grass
                | SurfaceMaterial::Stone
                | SurfaceMaterial::Wood
                | SurfaceMaterial::Water
                | SurfaceMaterial::Carpet
                | SurfaceMaterial::Metal
                | SurfaceMaterial::Puddles
                | SurfaceMaterial::Swamp
                | SurfaceMaterial::Mud
                | SurfaceMaterial::Leaves
                | SurfaceMaterial::BottomlessPit
                | SurfaceMaterial::Door
                | SurfaceMaterial::Sand
                | SurfaceMaterial::BareBones
                | SurfaceMaterial::StoneBridge
                | SurfaceMaterial::Trigger
        )
    }

    /// Pathfinding cost multiplier for crossing this surface.
    pub fn cost_modifier(self) -> f32 {
        match self {
            SurfaceMaterial::Water
            | SurfaceMaterial::Puddles
            | SurfaceMaterial::Swamp
            | SurfaceMaterial::Mud => 1.5,
            SurfaceMaterial::BottomlessPit => 10.0,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkmeshFace {
    pub indices: [u32; 3],
    pub material: SurfaceMaterial,
    /// Per edge: `neighbour_face * 3 + neighbour_edge`, or -1 for an open
    /// edge. Only walkable faces carry adjacency.
    pub adjacency: [i32; 3],
}

/// Flat AABB tree node; children index into the walkmesh's node array, -1
/// for none. Leaves reference their face 1:1. The field order is the
/// 44-byte disk order.
#[derive(Debug, Clone, PartialEq, Parse, Emit)]
pub struct BwmAabbNode {
    pub bounding_box: CAaBox,
    pub leaf_face: i32,
    pub unknown: u32,
    pub most_significant_plane: u32,
    pub left: i32,
    pub right: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Walkmesh {
    pub walkmesh_type: WalkmeshType,
    /// World placement; consumers add it to every vertex.
    pub position: C3Vector,
    pub vertices: Vec<C3Vector>,
    pub faces: Vec<WalkmeshFace>,
    pub aabbs: Vec<BwmAabbNode>,
}

impl Walkmesh {
    pub fn new(walkmesh_type: WalkmeshType) -> Self {
        Walkmesh {
            walkmesh_type,
            position: C3Vector::ZERO,
            vertices: vec![],
            faces: vec![],
            aabbs: vec![],
        }
    }

    /// Indices of the faces whose material is walkable.
    pub fn walkable_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.material.walkable())
            .map(|(i, _)| i)
    }
}
