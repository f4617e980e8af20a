use aurora_files_derive_parseable::{Emit, Parse};
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::types::{C2Vector, C3Vector, C4Quaternion, CAaBox};

/// Game variant a model is serialized for. Selects the trimesh header shape
/// (332 vs 340 bytes) and the engine function-pointer table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Game {
    Kotor1,
    Kotor2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Classification {
    #[default]
    Other = 0x00,
    Effect = 0x01,
    Tile = 0x02,
    Character = 0x04,
    Door = 0x08,
    Lightsaber = 0x10,
    Placeable = 0x20,
    Flyer = 0x40,
}

bitflags! {
    /// The node header's type word. Derived from the attachments a node
    /// carries, never stored independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u16 {
        const HEADER = 0x0001;
        const LIGHT = 0x0002;
        const EMITTER = 0x0004;
        const REFERENCE = 0x0010;
        const MESH = 0x0020;
        const SKIN = 0x0040;
        const ANIM = 0x0080;
        const DANGLY = 0x0100;
        const AABB = 0x0200;
        const SABER = 0x0800;
    }
}

impl NodeFlags {
    /// Derives the type word from the attachments. SKIN/DANGLY/AABB/SABER
    /// and ANIM only ever occur on mesh-bearing nodes, so MESH is implied.
    pub fn for_node(node: &Node) -> NodeFlags {
        let mut flags = NodeFlags::HEADER;
        if node.light.is_some() {
            flags |= NodeFlags::LIGHT;
        }
        if node.emitter.is_some() {
            flags |= NodeFlags::EMITTER;
        }
        if node.reference.is_some() {
            flags |= NodeFlags::REFERENCE;
        }
        if let Some(mesh) = &node.mesh {
            flags |= NodeFlags::MESH;
            if mesh.skin.is_some() {
                flags |= NodeFlags::SKIN;
            }
            if mesh.animmesh.is_some() {
                flags |= NodeFlags::ANIM;
            }
            if mesh.dangly.is_some() {
                flags |= NodeFlags::DANGLY;
            }
            if mesh.aabb.is_some() {
                flags |= NodeFlags::AABB;
            }
            if mesh.saber.is_some() {
                flags |= NodeFlags::SABER;
            }
        }
        flags
    }
}

bitflags! {
    /// Which per-vertex attributes are present in a node's MDX records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MdxFlags: u32 {
        const VERTICES = 0x01;
        const UV0 = 0x02;
        const UV1 = 0x04;
        const NORMALS = 0x20;
        const COLORS = 0x40;
        const TANGENTS = 0x80;
    }
}

/// Known controller selectors with their column counts. Selectors outside
/// this catalogue round-trip verbatim; the set only informs tooling.
pub mod controller {
    pub const POSITION: u32 = 8; // 3 columns
    pub const ORIENTATION: u32 = 20; // 4 columns
    pub const SCALE: u32 = 36; // 1 column

    pub const LIGHT_COLOR: u32 = 76;
    pub const LIGHT_RADIUS: u32 = 88;
    pub const LIGHT_SHADOW_RADIUS: u32 = 96;
    pub const LIGHT_VERTICAL_DISPLACEMENT: u32 = 100;
    pub const LIGHT_MULTIPLIER: u32 = 140;

    pub const EMITTER_ALPHA_END: u32 = 80;
    pub const EMITTER_ALPHA_START: u32 = 84;
    pub const EMITTER_BIRTH_RATE: u32 = 88;
    pub const EMITTER_BOUNCE_CO: u32 = 92;
    pub const EMITTER_COLOR_END: u32 = 380;
    pub const EMITTER_COLOR_START: u32 = 392;
    pub const EMITTER_COLOR_MID: u32 = 284;
    pub const EMITTER_FPS: u32 = 124;
    pub const EMITTER_GRAVITY: u32 = 144;
    pub const EMITTER_LIFE_EXPECTANCY: u32 = 120;
    pub const EMITTER_SIZE_START: u32 = 144;
    pub const EMITTER_SPREAD: u32 = 160;
    pub const EMITTER_VELOCITY: u32 = 168;

    pub const MESH_SELF_ILLUM_COLOR: u32 = 100;
    pub const MESH_ALPHA: u32 = 128;

    /// Bezier-encoded rows carry three floats per column (value, in-tangent,
    /// out-tangent) and flag it in the descriptor's column byte.
    pub const BEZIER_FLAG: u8 = 0x10;

    /// Column count for the common node selectors; `None` for selectors the
    /// catalogue does not describe (they still round-trip).
    pub fn known_columns(selector: u32) -> Option<u8> {
        match selector {
            POSITION => Some(3),
            ORIENTATION => Some(4),
            SCALE | MESH_ALPHA => Some(1),
            MESH_SELF_ILLUM_COLOR => Some(3),
            _ => None,
        }
    }
}

/// A time-indexed track animating one property of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    /// Property selector. Known values live in [`controller`], unknown ones
    /// are carried through untouched.
    pub controller_type: u32,
    /// Raw column byte from the descriptor, including the Bezier bit.
    pub columns: u8,
    pub rows: Vec<ControllerRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerRow {
    pub time: f32,
    pub values: Vec<f32>,
}

impl Controller {
    pub fn is_bezier(&self) -> bool {
        self.columns & controller::BEZIER_FLAG != 0
    }

    /// Columns without the Bezier bit.
    pub fn base_columns(&self) -> usize {
        (self.columns & !controller::BEZIER_FLAG) as usize
    }

    /// Floats per row payload: Bezier rows store value plus both tangents.
    pub fn floats_per_row(&self) -> usize {
        if self.is_bezier() {
            self.base_columns() * 3
        } else {
            self.base_columns()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Parse, Emit)]
pub struct FaceAdjacency {
    /// Index of the neighbouring face, -1 for an open edge.
    pub face: i32,
    /// Edge index (0..3) on the neighbouring face, -1 for an open edge.
    pub edge: i32,
}

impl FaceAdjacency {
    pub const OPEN: FaceAdjacency = FaceAdjacency { face: -1, edge: -1 };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub normal: C3Vector,
    pub plane_coefficient: f32,
    /// Packed surface material: lower 5 bits material, upper bits smoothing
    /// group. See [`pack_face_material`] / [`unpack_face_material`].
    pub material: u32,
    pub adjacency: [FaceAdjacency; 3],
    pub indices: [u32; 3],
}

pub fn pack_face_material(surface: u32, smoothing: u32) -> u32 {
    (smoothing << 5) | (surface & 0x1F)
}

pub fn unpack_face_material(packed: u32) -> (u32, u32) {
    (packed & 0x1F, packed >> 5)
}

/// Per-vertex skinning data. Weights and bone indices are serialized into
/// the MDX stream; the bind pose and the serial table live in the MDL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skin {
    pub bone_map: Vec<u32>,
    pub qbones: Vec<C4Quaternion>,
    pub tbones: Vec<C3Vector>,
    /// Four weights per vertex, padded with zeros.
    pub weights: Vec<[f32; 4]>,
    /// Four bone indices per vertex, stored as floats on disk, -1 unused.
    pub bone_indices: Vec<[f32; 4]>,
    pub bone_serial: [u16; 16],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dangly {
    /// One constraint value per vertex.
    pub constraints: Vec<f32>,
    pub displacement: f32,
    pub tightness: f32,
    pub period: f32,
}

/// Lightsaber blade geometry kept in MDL-side arrays instead of the MDX.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaberData {
    pub vertices: Vec<C3Vector>,
    pub uvs: Vec<C2Vector>,
    pub normals: Vec<C3Vector>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimMesh {
    pub sample_period: f32,
    pub animated_vertices: Vec<C3Vector>,
    pub animated_uvs: Vec<C2Vector>,
}

/// A walkmesh-style AABB tree serialized with AABB nodes. Leaves reference a
/// face; interior nodes carry two children.
#[derive(Debug, Clone, PartialEq)]
pub struct MdlAabbNode {
    pub bounding_box: CAaBox,
    pub children: Option<Box<(MdlAabbNode, MdlAabbNode)>>,
    /// Face index at leaves, -1 for interior nodes.
    pub leaf_face: i32,
    pub most_significant_plane: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub flare_radius: f32,
    pub flare_sizes: Vec<f32>,
    pub flare_positions: Vec<f32>,
    pub flare_color_shifts: Vec<C3Vector>,
    pub flare_texture_names: Vec<String>,
    pub priority: u32,
    pub ambient_only: bool,
    pub dynamic_type: u32,
    pub affect_dynamic: bool,
    pub shadow: bool,
    pub flare: bool,
    pub fading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub dead_space: f32,
    pub blast_radius: f32,
    pub blast_length: f32,
    pub branch_count: u32,
    pub control_point_smoothing: u32,
    pub x_grid: f32,
    pub y_grid: f32,
    pub spawn_type: u32,
    pub update: String,
    pub render: String,
    pub blend: String,
    pub texture: String,
    pub chunk_name: String,
    pub two_sided_texture: bool,
    pub looping: bool,
    pub render_order: u16,
    pub frame_blending: u8,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub model: String,
    pub reattachable: bool,
}

/// A triangle mesh attachment plus its optional specializations.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub positions: Vec<C3Vector>,
    pub normals: Vec<C3Vector>,
    pub uv0: Vec<C2Vector>,
    pub uv1: Vec<C2Vector>,
    pub faces: Vec<Face>,

    /// First texture slot; empty serializes as "NULL".
    pub texture: String,
    /// Lightmap slot; empty serializes as "NULL" and drops the second
    /// texture from the count.
    pub lightmap: String,
    /// In-memory (r, g, b); the header stores them reversed.
    pub diffuse: C3Vector,
    pub ambient: C3Vector,
    pub transparency_hint: u32,

    pub bounding_box: CAaBox,
    pub radius: f32,
    pub average: C3Vector,
    pub total_area: f32,

    pub render: bool,
    pub shadow: bool,
    pub beaming: bool,
    pub rotate_texture: bool,
    pub background_geometry: bool,

    pub animate_uv: bool,
    pub uv_direction_x: f32,
    pub uv_direction_y: f32,
    pub uv_jitter: f32,
    pub uv_jitter_speed: f32,

    /// Preserved byte-for-byte; semantics unknown.
    pub saber_unknowns: [u8; 8],
    pub unknown_ints: [i32; 3],
    pub unknown_word: u16,
    pub unknown_dword: u32,
    /// Serialized only for [`Game::Kotor2`].
    pub k2_unknowns: [u32; 2],

    pub skin: Option<Skin>,
    pub dangly: Option<Dangly>,
    pub saber: Option<SaberData>,
    pub animmesh: Option<AnimMesh>,
    pub aabb: Option<MdlAabbNode>,
}

pub const DEFAULT_SABER_UNKNOWNS: [u8; 8] = [3, 0, 0, 0, 0, 0, 0, 0];

impl Default for Mesh {
    fn default() -> Self {
        Mesh {
            positions: vec![],
            normals: vec![],
            uv0: vec![],
            uv1: vec![],
            faces: vec![],
            texture: String::new(),
            lightmap: String::new(),
            diffuse: C3Vector::new(0.8, 0.8, 0.8),
            ambient: C3Vector::new(0.2, 0.2, 0.2),
            transparency_hint: 0,
            bounding_box: CAaBox::default(),
            radius: 0.0,
            average: C3Vector::ZERO,
            total_area: 0.0,
            render: true,
            shadow: false,
            beaming: false,
            rotate_texture: false,
            background_geometry: false,
            animate_uv: false,
            uv_direction_x: 0.0,
            uv_direction_y: 0.0,
            uv_jitter: 0.0,
            uv_jitter_speed: 0.0,
            saber_unknowns: DEFAULT_SABER_UNKNOWNS,
            unknown_ints: [-1, -1, 0],
            unknown_word: 0,
            unknown_dword: 0,
            k2_unknowns: [0, 0],
            skin: None,
            dangly: None,
            saber: None,
            animmesh: None,
            aabb: None,
        }
    }
}

/// A named entry in the model hierarchy. Parents are not stored; they are
/// recovered by tree search when needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Sequential node id, assigned in preorder on write.
    pub node_id: u16,
    /// Index into the model-level name table.
    pub name_id: u16,
    pub position: C3Vector,
    pub orientation: C4Quaternion,
    pub children: Vec<Node>,
    pub controllers: Vec<Controller>,

    pub mesh: Option<Box<Mesh>>,
    pub light: Option<Light>,
    pub emitter: Option<Emitter>,
    pub reference: Option<Reference>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            node_id: 0,
            name_id: 0,
            position: C3Vector::ZERO,
            orientation: C4Quaternion::IDENTITY,
            children: vec![],
            controllers: vec![],
            mesh: None,
            light: None,
            emitter: None,
            reference: None,
        }
    }

    /// Preorder traversal over this node and all descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            // push in reverse so children come out in declaration order
            for child in node.children.iter().rev() {
                stack.push(child);
            }
            Some(node)
        })
    }

    /// Tree search for the parent of `target`; `None` when `target` is this
    /// node or not in the tree.
    pub fn parent_of<'a>(&'a self, target: &Node) -> Option<&'a Node> {
        for child in &self.children {
            if std::ptr::eq(child, target) {
                return Some(self);
            }
            if let Some(parent) = child.parent_of(target) {
                return Some(parent);
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationEvent {
    pub activation_time: f32,
    pub name: String,
}

/// An animation owns a node tree parallel to the model's, referencing model
/// nodes by name. Its nodes carry the controller keyframes.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub root_model: String,
    pub length: f32,
    pub transition: f32,
    pub events: Vec<AnimationEvent>,
    pub root: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub classification: Classification,
    pub subclassification: u8,
    pub fog: bool,
    pub compress_quaternions: bool,
    pub supermodel: String,
    pub animation_scale: f32,
    pub bounding_box: CAaBox,
    pub radius: f32,
    pub animations: Vec<Animation>,
    pub root: Node,
}

pub const DEFAULT_ANIMATION_SCALE: f32 = 0.971;

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Model {
            root: Node::new(name.clone()),
            name,
            classification: Classification::Other,
            subclassification: 0,
            fog: true,
            compress_quaternions: false,
            supermodel: "NULL".to_string(),
            animation_scale: DEFAULT_ANIMATION_SCALE,
            bounding_box: CAaBox::default(),
            radius: 0.0,
            animations: vec![],
        }
    }

    /// Preorder traversal over the main node tree.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.root.iter()
    }

    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.all_nodes().find(|node| node.name == name)
    }
}

/// Engine function-pointer words baked into geometry and mesh headers,
/// selected by game variant and node kind.
pub mod function_pointers {
    use super::Game;

    pub const K1_MODEL: (u32, u32) = (4273776, 4216096);
    pub const K1_ANIMATION: (u32, u32) = (4273392, 4451552);
    pub const K2_MODEL: (u32, u32) = (4285200, 4216320);
    pub const K2_ANIMATION: (u32, u32) = (4284816, 4522928);

    pub const K1_TRIMESH: (u32, u32) = (4216656, 4216672);
    pub const K1_SKIN: (u32, u32) = (4216592, 4216608);
    pub const K1_DANGLY: (u32, u32) = (4216640, 4216624);
    pub const K2_TRIMESH: (u32, u32) = (4216880, 4216896);
    pub const K2_SKIN: (u32, u32) = (4216816, 4216832);
    pub const K2_DANGLY: (u32, u32) = (4216864, 4216848);

    pub fn geometry(game: Game, animation: bool) -> (u32, u32) {
        match (game, animation) {
            (Game::Kotor1, false) => K1_MODEL,
            (Game::Kotor1, true) => K1_ANIMATION,
            (Game::Kotor2, false) => K2_MODEL,
            (Game::Kotor2, true) => K2_ANIMATION,
        }
    }

    pub fn mesh(game: Game, skin: bool, dangly: bool) -> (u32, u32) {
        match game {
            Game::Kotor1 if skin => K1_SKIN,
            Game::Kotor1 if dangly => K1_DANGLY,
            Game::Kotor1 => K1_TRIMESH,
            Game::Kotor2 if skin => K2_SKIN,
            Game::Kotor2 if dangly => K2_DANGLY,
            Game::Kotor2 => K2_TRIMESH,
        }
    }
}

/// Geometry-type byte in the geometry header.
pub const GEOMETRY_TYPE_ROOT: u8 = 1;
pub const GEOMETRY_TYPE_MODEL: u8 = 2;
pub const GEOMETRY_TYPE_ANIMATION: u8 = 5;
