use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::reader::{Parseable, map_eof, read_cstring, read_fixed_string};
use crate::common::types::{C2Vector, C3Vector, C4Quaternion, CAaBox};
use crate::mdl::types::{
    AnimMesh, Animation, AnimationEvent, Classification, Controller, ControllerRow, Dangly, Emitter,
    Face, FaceAdjacency, GEOMETRY_TYPE_ANIMATION, GEOMETRY_TYPE_MODEL, GEOMETRY_TYPE_ROOT, Game,
    Light, MdlAabbNode, MdxFlags, Mesh, Model, Node, NodeFlags, Reference, SaberData, Skin,
    controller, function_pointers,
};

/// Offsets in the model are relative to this byte: everything after the
/// 12-byte file header.
pub const MDL_DATA_START: u64 = 12;

/// A (offset, count, count) triple, the format's array descriptor. The
/// second count duplicates the first and must agree.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct ArrayDef {
    pub offset: u32,
    pub count: u32,
}

impl ArrayDef {
    fn parse_checked<R: Read>(rdr: &mut R, at: u64) -> Result<ArrayDef, ParserError> {
        let offset = rdr.read_u32::<LittleEndian>()?;
        let count = rdr.read_u32::<LittleEndian>()?;
        let count2 = rdr.read_u32::<LittleEndian>()?;
        if count != count2 {
            return Err(ParserError::MalformedFormat {
                offset: at,
                reason: "array descriptor's duplicate count disagrees with its primary",
            });
        }
        Ok(ArrayDef { offset, count })
    }
}

pub struct MdlReader<'a> {
    mdl: &'a [u8],
    mdx: &'a [u8],
    game: Game,
    names: Vec<String>,
}

impl<'a> MdlReader<'a> {
    /// Parses an MDL buffer and its companion MDX into the in-memory model.
    /// The game variant is recovered from the engine identifier word in the
    /// geometry header.
    pub fn read(mdl: &'a [u8], mdx: &'a [u8]) -> Result<Model, ParserError> {
        let mut reader = MdlReader {
            mdl,
            mdx,
            game: Game::Kotor1,
            names: vec![],
        };
        reader.read_model().map_err(map_eof)
    }

    /// A cursor over the model data, positioned at `offset` (relative to the
    /// MDL data start). Fails when `offset + len` leaves the buffer.
    fn cursor_at(&self, offset: u32, len: u64, what: &'static str) -> Result<Cursor<&'a [u8]>, ParserError> {
        let data = &self.mdl[MDL_DATA_START.min(self.mdl.len() as u64) as usize..];
        let end = offset as u64 + len;
        if end > data.len() as u64 {
            return Err(ParserError::MalformedFormat {
                offset: offset as u64,
                reason: what,
            });
        }
        let mut cursor = Cursor::new(data);
        cursor.seek(SeekFrom::Start(offset as u64))?;
        Ok(cursor)
    }

    fn resolve_array<T: Parseable<T>>(
        &self,
        def: ArrayDef,
        element_size: u64,
        what: &'static str,
    ) -> Result<Vec<T>, ParserError> {
        let mut rdr = self.cursor_at(def.offset, def.count as u64 * element_size, what)?;
        let mut list = Vec::with_capacity(def.count as usize);
        for _ in 0..def.count {
            list.push(T::parse(&mut rdr)?);
        }
        Ok(list)
    }

    fn read_model(&mut self) -> Result<Model, ParserError> {
        if self.mdl.len() < MDL_DATA_START as usize {
            return Err(ParserError::Truncated);
        }
        let mut rdr = Cursor::new(self.mdl);
        let _reserved = rdr.read_u32::<LittleEndian>()?;
        let mdl_size = rdr.read_u32::<LittleEndian>()?;
        let mdx_size = rdr.read_u32::<LittleEndian>()?;
        if mdl_size as u64 > self.mdl.len() as u64 - MDL_DATA_START {
            return Err(ParserError::MalformedFormat {
                offset: 4,
                reason: "declared MDL size exceeds the buffer",
            });
        }
        if mdx_size as usize > self.mdx.len() {
            return Err(ParserError::MalformedFormat {
                offset: 8,
                reason: "declared MDX size exceeds the companion buffer",
            });
        }

        // geometry header
        let mut rdr = self.cursor_at(0, 196, "model header exceeds the buffer")?;
        let fp0 = rdr.read_u32::<LittleEndian>()?;
        let _fp1 = rdr.read_u32::<LittleEndian>()?;
        self.game = match fp0 {
            _ if fp0 == function_pointers::K1_MODEL.0 => Game::Kotor1,
            _ if fp0 == function_pointers::K2_MODEL.0 => Game::Kotor2,
            _ => {
                return Err(ParserError::Unsupported {
                    what: "engine identifier word",
                    value: fp0,
                });
            }
        };
        let name = read_fixed_string(&mut rdr, 32)?;
        let root_node_offset = rdr.read_u32::<LittleEndian>()?;
        let _node_count = rdr.read_u32::<LittleEndian>()?;
        let mut runtime = [0u8; 24];
        rdr.read_exact(&mut runtime)?;
        let _ref_count = rdr.read_u32::<LittleEndian>()?;
        let geometry_type = rdr.read_u8()?;
        if geometry_type != GEOMETRY_TYPE_MODEL && geometry_type != GEOMETRY_TYPE_ROOT {
            return Err(ParserError::Unsupported {
                what: "geometry type",
                value: geometry_type as u32,
            });
        }
        let mut pad = [0u8; 3];
        rdr.read_exact(&mut pad)?;

        // model sub-header
        let classification_byte = rdr.read_u8()?;
        let classification =
            Classification::try_from(classification_byte).map_err(|_| ParserError::Unsupported {
                what: "model classification",
                value: classification_byte as u32,
            })?;
        let subclassification = rdr.read_u8()?;
        let compress_quaternions = rdr.read_u8()?;
        if compress_quaternions != 0 {
            // The writer only emits full quaternions; decoding compressed
            // controller tracks is out of the documented set.
            return Err(ParserError::Unsupported {
                what: "quaternion compression",
                value: compress_quaternions as u32,
            });
        }
        let fog = rdr.read_u8()? != 0;
        let _child_model_count = rdr.read_u32::<LittleEndian>()?;
        let animations_def = ArrayDef::parse_checked(&mut rdr, 92)?;
        let _parent_model = rdr.read_u32::<LittleEndian>()?;
        let bounding_box = CAaBox::parse(&mut rdr)?;
        let radius = rdr.read_f32::<LittleEndian>()?;
        let animation_scale = rdr.read_f32::<LittleEndian>()?;
        let supermodel = read_fixed_string(&mut rdr, 32)?;

        // names header
        let _root_node_pointer = rdr.read_u32::<LittleEndian>()?;
        let _unused = rdr.read_u32::<LittleEndian>()?;
        let _mdx_size_dup = rdr.read_u32::<LittleEndian>()?;
        let _mdx_offset = rdr.read_u32::<LittleEndian>()?;
        let names_offset = rdr.read_u32::<LittleEndian>()?;
        let names_count = rdr.read_u32::<LittleEndian>()?;
        let names_count2 = rdr.read_u32::<LittleEndian>()?;
        if names_count != names_count2 {
            return Err(ParserError::MalformedFormat {
                offset: 188,
                reason: "name count duplicate disagrees with its primary",
            });
        }

        self.names = self.read_name_table(names_offset, names_count)?;

        let animation_offsets: Vec<u32> = self.resolve_array(
            animations_def,
            4,
            "animation offset array exceeds the buffer",
        )?;
        let mut animations = Vec::with_capacity(animation_offsets.len());
        for offset in animation_offsets {
            animations.push(self.read_animation(offset)?);
        }

        let root = self.read_node(root_node_offset, 0)?;

        Ok(Model {
            name,
            classification,
            subclassification,
            fog,
            compress_quaternions: false,
            supermodel,
            animation_scale,
            bounding_box,
            radius,
            animations,
            root,
        })
    }

    fn read_name_table(&self, offset: u32, count: u32) -> Result<Vec<String>, ParserError> {
        let name_offsets: Vec<u32> = self.resolve_array(
            ArrayDef { offset, count },
            4,
            "name offset array exceeds the buffer",
        )?;
        let mut names = Vec::with_capacity(name_offsets.len());
        for name_offset in name_offsets {
            let mut rdr = self.cursor_at(name_offset, 1, "name offset exceeds the buffer")?;
            names.push(read_cstring(&mut rdr)?.into_string()?);
        }
        Ok(names)
    }

    fn read_animation(&self, offset: u32) -> Result<Animation, ParserError> {
        let mut rdr = self.cursor_at(offset, 136, "animation header exceeds the buffer")?;
        let _fp = (rdr.read_u32::<LittleEndian>()?, rdr.read_u32::<LittleEndian>()?);
        let name = read_fixed_string(&mut rdr, 32)?;
        let root_node_offset = rdr.read_u32::<LittleEndian>()?;
        let _node_count = rdr.read_u32::<LittleEndian>()?;
        let mut runtime = [0u8; 24];
        rdr.read_exact(&mut runtime)?;
        let _ref_count = rdr.read_u32::<LittleEndian>()?;
        let geometry_type = rdr.read_u8()?;
        if geometry_type != GEOMETRY_TYPE_ANIMATION {
            return Err(ParserError::Unsupported {
                what: "animation geometry type",
                value: geometry_type as u32,
            });
        }
        let mut pad = [0u8; 3];
        rdr.read_exact(&mut pad)?;

        let length = rdr.read_f32::<LittleEndian>()?;
        let transition = rdr.read_f32::<LittleEndian>()?;
        let root_model = read_fixed_string(&mut rdr, 32)?;
        let events_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 120)?;
        let _unknown = rdr.read_u32::<LittleEndian>()?;

        let mut events = Vec::with_capacity(events_def.count as usize);
        let mut events_rdr = self.cursor_at(
            events_def.offset,
            events_def.count as u64 * 36,
            "event array exceeds the buffer",
        )?;
        for _ in 0..events_def.count {
            events.push(AnimationEvent {
                activation_time: events_rdr.read_f32::<LittleEndian>()?,
                name: read_fixed_string(&mut events_rdr, 32)?,
            });
        }

        Ok(Animation {
            name,
            root_model,
            length,
            transition,
            events,
            root: self.read_node(root_node_offset, 0)?,
        })
    }

    fn read_node(&self, offset: u32, depth: u32) -> Result<Node, ParserError> {
        if depth > 128 {
            return Err(ParserError::MalformedFormat {
                offset: offset as u64,
                reason: "node tree deeper than any well-formed model",
            });
        }
        let mut rdr = self.cursor_at(offset, 80, "node header exceeds the buffer")?;
        let type_word = rdr.read_u16::<LittleEndian>()?;
        let flags = NodeFlags::from_bits(type_word).ok_or(ParserError::Unsupported {
            what: "node type word",
            value: type_word as u32,
        })?;
        let node_id = rdr.read_u16::<LittleEndian>()?;
        let name_id = rdr.read_u16::<LittleEndian>()?;
        let _pad = rdr.read_u16::<LittleEndian>()?;
        let _root_offset = rdr.read_u32::<LittleEndian>()?;
        let _parent_offset = rdr.read_u32::<LittleEndian>()?;
        let position = C3Vector::parse(&mut rdr)?;
        let orientation = C4Quaternion::parse(&mut rdr)?;
        let children_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 44)?;
        let controllers_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 56)?;
        let controller_data_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 68)?;

        let name = self
            .names
            .get(name_id as usize)
            .cloned()
            .ok_or(ParserError::MalformedFormat {
                offset: offset as u64 + 4,
                reason: "node name index outside the name table",
            })?;

        // the sub-header slot right behind the node header holds one
        // attachment; the concrete type words are mutually exclusive
        let mut mesh = None;
        let mut light = None;
        let mut emitter = None;
        let mut reference = None;
        if flags.contains(NodeFlags::MESH) {
            mesh = Some(Box::new(self.read_mesh(offset + 80, flags)?));
        } else if flags.contains(NodeFlags::LIGHT) {
            light = Some(self.read_light(offset + 80)?);
        } else if flags.contains(NodeFlags::EMITTER) {
            emitter = Some(self.read_emitter(offset + 80)?);
        } else if flags.contains(NodeFlags::REFERENCE) {
            reference = Some(self.read_reference(offset + 80)?);
        }

        let controllers = self.read_controllers(controllers_def, controller_data_def)?;

        let child_offsets: Vec<u32> =
            self.resolve_array(children_def, 4, "children offset array exceeds the buffer")?;
        let mut children = Vec::with_capacity(child_offsets.len());
        for child_offset in child_offsets {
            children.push(self.read_node(child_offset, depth + 1)?);
        }

        Ok(Node {
            name,
            node_id,
            name_id,
            position,
            orientation,
            children,
            controllers,
            mesh,
            light,
            emitter,
            reference,
        })
    }

    fn read_controllers(
        &self,
        controllers_def: ArrayDef,
        data_def: ArrayDef,
    ) -> Result<Vec<Controller>, ParserError> {
        let data: Vec<f32> =
            self.resolve_array(data_def, 4, "controller data exceeds the buffer")?;
        let mut rdr = self.cursor_at(
            controllers_def.offset,
            controllers_def.count as u64 * 16,
            "controller array exceeds the buffer",
        )?;

        let mut controllers = Vec::with_capacity(controllers_def.count as usize);
        for i in 0..controllers_def.count {
            let controller_type = rdr.read_u32::<LittleEndian>()?;
            let _unknown = rdr.read_u16::<LittleEndian>()?;
            let row_count = rdr.read_u16::<LittleEndian>()?;
            let time_index = rdr.read_u16::<LittleEndian>()?;
            let data_index = rdr.read_u16::<LittleEndian>()?;
            let columns = rdr.read_u8()?;
            let mut pad = [0u8; 3];
            rdr.read_exact(&mut pad)?;

            let base = (columns & !controller::BEZIER_FLAG) as usize;
            let per_row = if columns & controller::BEZIER_FLAG != 0 {
                base * 3
            } else {
                base
            };

            let rows_end = time_index as usize + row_count as usize;
            let values_end = data_index as usize + row_count as usize * per_row;
            if rows_end > data.len() || values_end > data.len() {
                return Err(ParserError::MalformedFormat {
                    offset: controllers_def.offset as u64 + i as u64 * 16,
                    reason: "controller rows point outside the node's data floats",
                });
            }

            let rows = (0..row_count as usize)
                .map(|r| ControllerRow {
                    time: data[time_index as usize + r],
                    values: data[data_index as usize + r * per_row..][..per_row].to_vec(),
                })
                .collect();

            controllers.push(Controller {
                controller_type,
                columns,
                rows,
            });
        }
        Ok(controllers)
    }

    fn read_light(&self, offset: u32) -> Result<Light, ParserError> {
        let mut rdr = self.cursor_at(offset, 92, "light header exceeds the buffer")?;
        let flare_radius = rdr.read_f32::<LittleEndian>()?;
        let _unknown = ArrayDef::parse_checked(&mut rdr, offset as u64 + 4)?;
        let sizes_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 16)?;
        let positions_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 28)?;
        let shifts_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 40)?;
        let textures_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 52)?;
        let priority = rdr.read_u32::<LittleEndian>()?;
        let ambient_only = rdr.read_u32::<LittleEndian>()? != 0;
        let dynamic_type = rdr.read_u32::<LittleEndian>()?;
        let affect_dynamic = rdr.read_u32::<LittleEndian>()? != 0;
        let shadow = rdr.read_u32::<LittleEndian>()? != 0;
        let flare = rdr.read_u32::<LittleEndian>()? != 0;
        let fading = rdr.read_u32::<LittleEndian>()? != 0;

        let texture_offsets: Vec<u32> =
            self.resolve_array(textures_def, 4, "flare texture array exceeds the buffer")?;
        let mut flare_texture_names = Vec::with_capacity(texture_offsets.len());
        for texture_offset in texture_offsets {
            let mut name_rdr =
                self.cursor_at(texture_offset, 1, "flare texture name exceeds the buffer")?;
            flare_texture_names.push(read_cstring(&mut name_rdr)?.into_string()?);
        }

        Ok(Light {
            flare_radius,
            flare_sizes: self.resolve_array(sizes_def, 4, "flare sizes exceed the buffer")?,
            flare_positions: self
                .resolve_array(positions_def, 4, "flare positions exceed the buffer")?,
            flare_color_shifts: self
                .resolve_array(shifts_def, 12, "flare color shifts exceed the buffer")?,
            flare_texture_names,
            priority,
            ambient_only,
            dynamic_type,
            affect_dynamic,
            shadow,
            flare,
            fading,
        })
    }

    fn read_emitter(&self, offset: u32) -> Result<Emitter, ParserError> {
        let mut rdr = self.cursor_at(offset, 192, "emitter header exceeds the buffer")?;
        Ok(Emitter {
            dead_space: rdr.read_f32::<LittleEndian>()?,
            blast_radius: rdr.read_f32::<LittleEndian>()?,
            blast_length: rdr.read_f32::<LittleEndian>()?,
            branch_count: rdr.read_u32::<LittleEndian>()?,
            control_point_smoothing: rdr.read_u32::<LittleEndian>()?,
            x_grid: rdr.read_f32::<LittleEndian>()?,
            y_grid: rdr.read_f32::<LittleEndian>()?,
            spawn_type: rdr.read_u32::<LittleEndian>()?,
            update: read_fixed_string(&mut rdr, 32)?,
            render: read_fixed_string(&mut rdr, 32)?,
            blend: read_fixed_string(&mut rdr, 32)?,
            texture: read_fixed_string(&mut rdr, 32)?,
            chunk_name: read_fixed_string(&mut rdr, 16)?,
            two_sided_texture: rdr.read_u32::<LittleEndian>()? != 0,
            looping: rdr.read_u32::<LittleEndian>()? != 0,
            render_order: rdr.read_u16::<LittleEndian>()?,
            frame_blending: {
                let value = rdr.read_u8()?;
                let _pad = rdr.read_u8()?;
                value
            },
            flags: rdr.read_u32::<LittleEndian>()?,
        })
    }

    fn read_reference(&self, offset: u32) -> Result<Reference, ParserError> {
        let mut rdr = self.cursor_at(offset, 36, "reference header exceeds the buffer")?;
        Ok(Reference {
            model: read_fixed_string(&mut rdr, 32)?,
            reattachable: rdr.read_u32::<LittleEndian>()? != 0,
        })
    }

    fn read_mesh(&self, offset: u32, flags: NodeFlags) -> Result<Mesh, ParserError> {
        let header_len = if self.game == Game::Kotor2 { 340 } else { 332 };
        let mut rdr = self.cursor_at(offset, header_len, "trimesh header exceeds the buffer")?;
        let _fp = (rdr.read_u32::<LittleEndian>()?, rdr.read_u32::<LittleEndian>()?);
        let faces_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 8)?;
        let bounding_box = CAaBox::parse(&mut rdr)?;
        let radius = rdr.read_f32::<LittleEndian>()?;
        let average = C3Vector::parse(&mut rdr)?;
        // colors are stored reversed (b, g, r)
        let diffuse_bgr = C3Vector::parse(&mut rdr)?;
        let ambient_bgr = C3Vector::parse(&mut rdr)?;
        let transparency_hint = rdr.read_u32::<LittleEndian>()?;
        // "NULL" marks an empty slot
        let texture = match read_fixed_string(&mut rdr, 32)? {
            s if s == "NULL" => String::new(),
            s => s,
        };
        let lightmap = match read_fixed_string(&mut rdr, 32)? {
            s if s == "NULL" => String::new(),
            s => s,
        };
        let _texture3 = read_fixed_string(&mut rdr, 12)?;
        let _texture4 = read_fixed_string(&mut rdr, 12)?;
        let _indices_count_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 176)?;
        let _indices_offset_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 188)?;
        let _inverted_counter_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 200)?;
        let unknown_ints = <[i32; 3]>::parse(&mut rdr)?;
        let saber_unknowns = <[u8; 8]>::parse(&mut rdr)?;
        let animate_uv = rdr.read_u32::<LittleEndian>()? != 0;
        let uv_direction_x = rdr.read_f32::<LittleEndian>()?;
        let uv_direction_y = rdr.read_f32::<LittleEndian>()?;
        let uv_jitter = rdr.read_f32::<LittleEndian>()?;
        let uv_jitter_speed = rdr.read_f32::<LittleEndian>()?;
        let mdx_record_size = rdr.read_u32::<LittleEndian>()?;
        let mdx_bitmap_raw = rdr.read_u32::<LittleEndian>()?;
        let mdx_bitmap = MdxFlags::from_bits(mdx_bitmap_raw).ok_or(ParserError::Unsupported {
            what: "MDX attribute bitmap",
            value: mdx_bitmap_raw,
        })?;
        let mdx_vertices_off = rdr.read_i32::<LittleEndian>()?;
        let mdx_normals_off = rdr.read_i32::<LittleEndian>()?;
        let _mdx_colors_off = rdr.read_i32::<LittleEndian>()?;
        let mdx_uv0_off = rdr.read_i32::<LittleEndian>()?;
        let mdx_uv1_off = rdr.read_i32::<LittleEndian>()?;
        let _mdx_uv2_off = rdr.read_i32::<LittleEndian>()?;
        let _mdx_uv3_off = rdr.read_i32::<LittleEndian>()?;
        let _mdx_tangents = <[i32; 4]>::parse(&mut rdr)?;
        let vertex_count = rdr.read_u16::<LittleEndian>()?;
        let _texture_count = rdr.read_u16::<LittleEndian>()?;
        let _has_lightmap = rdr.read_u8()?;
        let rotate_texture = rdr.read_u8()? != 0;
        let background_geometry = rdr.read_u8()? != 0;
        let shadow = rdr.read_u8()? != 0;
        let beaming = rdr.read_u8()? != 0;
        let render = rdr.read_u8()? != 0;
        let unknown_word = rdr.read_u16::<LittleEndian>()?;
        let total_area = rdr.read_f32::<LittleEndian>()?;
        let unknown_dword = rdr.read_u32::<LittleEndian>()?;
        // K2 carries two extra dwords before the trailing offsets
        let mut k2_unknowns = [0u32; 2];
        let mut after = offset + 332;
        if self.game == Game::Kotor2 {
            k2_unknowns = [rdr.read_u32::<LittleEndian>()?, rdr.read_u32::<LittleEndian>()?];
            after += 8;
        }
        let mdx_data_offset = rdr.read_u32::<LittleEndian>()?;
        let vertices_offset = rdr.read_u32::<LittleEndian>()?;

        let faces: Vec<Face> = {
            let mut face_rdr = self.cursor_at(
                faces_def.offset,
                faces_def.count as u64 * 56,
                "face array exceeds the buffer",
            )?;
            let mut faces = Vec::with_capacity(faces_def.count as usize);
            for _ in 0..faces_def.count {
                let normal = C3Vector::parse(&mut face_rdr)?;
                let plane_coefficient = face_rdr.read_f32::<LittleEndian>()?;
                let material = face_rdr.read_u32::<LittleEndian>()?;
                let adjacency = <[FaceAdjacency; 3]>::parse(&mut face_rdr)?;
                let indices = <[u32; 3]>::parse(&mut face_rdr)?;
                faces.push(Face {
                    normal,
                    plane_coefficient,
                    material,
                    adjacency,
                    indices,
                });
            }
            faces
        };

        let mdl_positions: Vec<C3Vector> = self.resolve_array(
            ArrayDef {
                offset: vertices_offset,
                count: vertex_count as u32,
            },
            12,
            "vertex array exceeds the buffer",
        )?;

        let mut mesh = Mesh {
            faces,
            positions: mdl_positions,
            texture,
            lightmap,
            diffuse: C3Vector::new(diffuse_bgr.z, diffuse_bgr.y, diffuse_bgr.x),
            ambient: C3Vector::new(ambient_bgr.z, ambient_bgr.y, ambient_bgr.x),
            transparency_hint,
            bounding_box,
            radius,
            average,
            total_area,
            render,
            shadow,
            beaming,
            rotate_texture,
            background_geometry,
            animate_uv,
            uv_direction_x,
            uv_direction_y,
            uv_jitter,
            uv_jitter_speed,
            saber_unknowns,
            unknown_ints,
            unknown_word,
            unknown_dword,
            k2_unknowns,
            ..Mesh::default()
        };

        // MDX streams
        let stride = mdx_record_size as u64;
        let mdx_end = mdx_data_offset as u64 + stride * vertex_count as u64;
        if stride > 0 && mdx_end > self.mdx.len() as u64 {
            return Err(ParserError::MalformedFormat {
                offset: offset as u64,
                reason: "MDX vertex records exceed the companion buffer",
            });
        }
        let read_mdx_vec3 = |rel: i32| -> Result<Vec<C3Vector>, ParserError> {
            self.read_mdx_attribute(mdx_data_offset, stride, vertex_count, rel, C3Vector::parse)
        };
        let read_mdx_vec2 = |rel: i32| -> Result<Vec<C2Vector>, ParserError> {
            self.read_mdx_attribute(mdx_data_offset, stride, vertex_count, rel, C2Vector::parse)
        };

        if mdx_bitmap.contains(MdxFlags::VERTICES) && mdx_vertices_off >= 0 {
            mesh.positions = read_mdx_vec3(mdx_vertices_off)?;
        }
        if mdx_bitmap.contains(MdxFlags::NORMALS) && mdx_normals_off >= 0 {
            mesh.normals = read_mdx_vec3(mdx_normals_off)?;
        }
        if mdx_bitmap.contains(MdxFlags::UV0) && mdx_uv0_off >= 0 {
            mesh.uv0 = read_mdx_vec2(mdx_uv0_off)?;
        }
        if mdx_bitmap.contains(MdxFlags::UV1) && mdx_uv1_off >= 0 {
            mesh.uv1 = read_mdx_vec2(mdx_uv1_off)?;
        }

        // extensions, in their fixed serialization order
        if flags.contains(NodeFlags::SKIN) {
            let (skin, consumed) = self.read_skin(after, mdx_data_offset, stride, vertex_count)?;
            mesh.skin = Some(skin);
            after += consumed;
        }
        if flags.contains(NodeFlags::DANGLY) {
            let (dangly, consumed) = self.read_dangly(after)?;
            mesh.dangly = Some(dangly);
            after += consumed;
        }
        if flags.contains(NodeFlags::SABER) {
            let (saber, consumed) = self.read_saber(after, vertex_count)?;
            mesh.saber = Some(saber);
            after += consumed;
        }
        if flags.contains(NodeFlags::ANIM) {
            let (animmesh, consumed) = self.read_animmesh(after)?;
            mesh.animmesh = Some(animmesh);
            after += consumed;
        }
        if flags.contains(NodeFlags::AABB) {
            let mut aabb_rdr = self.cursor_at(after, 4, "aabb extension exceeds the buffer")?;
            let root_offset = aabb_rdr.read_u32::<LittleEndian>()?;
            mesh.aabb = Some(self.read_aabb_node(root_offset, 0)?);
        }

        Ok(mesh)
    }

    fn read_mdx_attribute<T>(
        &self,
        base: u32,
        stride: u64,
        vertex_count: u16,
        rel: i32,
        parse: impl Fn(&mut Cursor<&'a [u8]>) -> Result<T, ParserError>,
    ) -> Result<Vec<T>, ParserError> {
        let mut list = Vec::with_capacity(vertex_count as usize);
        for v in 0..vertex_count as u64 {
            let at = base as u64 + v * stride + rel as u64;
            if at >= self.mdx.len() as u64 {
                return Err(ParserError::MalformedFormat {
                    offset: at,
                    reason: "MDX attribute outside the companion buffer",
                });
            }
            let mut rdr = Cursor::new(self.mdx);
            rdr.seek(SeekFrom::Start(at))?;
            list.push(parse(&mut rdr)?);
        }
        Ok(list)
    }

    fn read_skin(
        &self,
        offset: u32,
        mdx_base: u32,
        stride: u64,
        vertex_count: u16,
    ) -> Result<(Skin, u32), ParserError> {
        let mut rdr = self.cursor_at(offset, 100, "skin extension exceeds the buffer")?;
        let _unused = ArrayDef::parse_checked(&mut rdr, offset as u64)?;
        let bone_map_offset = rdr.read_u32::<LittleEndian>()?;
        let bone_map_count = rdr.read_u32::<LittleEndian>()?;
        let qbones_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 20)?;
        let tbones_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 32)?;
        let _unknown = ArrayDef::parse_checked(&mut rdr, offset as u64 + 44)?;
        let bone_serial = <[u16; 16]>::parse(&mut rdr)?;
        let mdx_weights_off = rdr.read_i32::<LittleEndian>()?;
        let mdx_indices_off = rdr.read_i32::<LittleEndian>()?;
        let _pad = rdr.read_u32::<LittleEndian>()?;

        let read_vec4 = |rel: i32| -> Result<Vec<[f32; 4]>, ParserError> {
            self.read_mdx_attribute(mdx_base, stride, vertex_count, rel, <[f32; 4]>::parse)
        };

        Ok((
            Skin {
                bone_map: self.resolve_array(
                    ArrayDef {
                        offset: bone_map_offset,
                        count: bone_map_count,
                    },
                    4,
                    "bone map exceeds the buffer",
                )?,
                qbones: self.resolve_array(qbones_def, 16, "bind quaternions exceed the buffer")?,
                tbones: self.resolve_array(tbones_def, 12, "bind translations exceed the buffer")?,
                weights: if mdx_weights_off >= 0 {
                    read_vec4(mdx_weights_off)?
                } else {
                    vec![]
                },
                bone_indices: if mdx_indices_off >= 0 {
                    read_vec4(mdx_indices_off)?
                } else {
                    vec![]
                },
                bone_serial,
            },
            100,
        ))
    }

    fn read_dangly(&self, offset: u32) -> Result<(Dangly, u32), ParserError> {
        let mut rdr = self.cursor_at(offset, 28, "dangly extension exceeds the buffer")?;
        let constraints_def = ArrayDef::parse_checked(&mut rdr, offset as u64)?;
        let displacement = rdr.read_f32::<LittleEndian>()?;
        let tightness = rdr.read_f32::<LittleEndian>()?;
        let period = rdr.read_f32::<LittleEndian>()?;
        let _data_pointer = rdr.read_u32::<LittleEndian>()?;
        Ok((
            Dangly {
                constraints: self
                    .resolve_array(constraints_def, 4, "dangly constraints exceed the buffer")?,
                displacement,
                tightness,
                period,
            },
            28,
        ))
    }

    fn read_saber(&self, offset: u32, vertex_count: u16) -> Result<(SaberData, u32), ParserError> {
        let mut rdr = self.cursor_at(offset, 20, "saber extension exceeds the buffer")?;
        let vertices_offset = rdr.read_u32::<LittleEndian>()?;
        let uvs_offset = rdr.read_u32::<LittleEndian>()?;
        let normals_offset = rdr.read_u32::<LittleEndian>()?;
        let _inverted = (rdr.read_u32::<LittleEndian>()?, rdr.read_u32::<LittleEndian>()?);
        let count = vertex_count as u32;
        Ok((
            SaberData {
                vertices: self.resolve_array(
                    ArrayDef {
                        offset: vertices_offset,
                        count,
                    },
                    12,
                    "saber vertices exceed the buffer",
                )?,
                uvs: self.resolve_array(
                    ArrayDef {
                        offset: uvs_offset,
                        count,
                    },
                    8,
                    "saber uvs exceed the buffer",
                )?,
                normals: self.resolve_array(
                    ArrayDef {
                        offset: normals_offset,
                        count,
                    },
                    12,
                    "saber normals exceed the buffer",
                )?,
            },
            20,
        ))
    }

    fn read_animmesh(&self, offset: u32) -> Result<(AnimMesh, u32), ParserError> {
        let mut rdr = self.cursor_at(offset, 28, "animmesh extension exceeds the buffer")?;
        let sample_period = rdr.read_f32::<LittleEndian>()?;
        let vertices_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 4)?;
        let uvs_def = ArrayDef::parse_checked(&mut rdr, offset as u64 + 16)?;
        Ok((
            AnimMesh {
                sample_period,
                animated_vertices: self.resolve_array(
                    vertices_def,
                    12,
                    "animated vertices exceed the buffer",
                )?,
                animated_uvs: self.resolve_array(uvs_def, 8, "animated uvs exceed the buffer")?,
            },
            28,
        ))
    }

    fn read_aabb_node(&self, offset: u32, depth: u32) -> Result<MdlAabbNode, ParserError> {
        if depth > 64 {
            return Err(ParserError::MalformedFormat {
                offset: offset as u64,
                reason: "aabb tree deeper than any well-formed walkmesh",
            });
        }
        let mut rdr = self.cursor_at(offset, 40, "aabb node exceeds the buffer")?;
        let bounding_box = CAaBox::parse(&mut rdr)?;
        let left = rdr.read_u32::<LittleEndian>()?;
        let right = rdr.read_u32::<LittleEndian>()?;
        let leaf_face = rdr.read_i32::<LittleEndian>()?;
        let most_significant_plane = rdr.read_u32::<LittleEndian>()?;

        let children = if leaf_face < 0 {
            Some(Box::new((
                self.read_aabb_node(left, depth + 1)?,
                self.read_aabb_node(right, depth + 1)?,
            )))
        } else {
            None
        };

        Ok(MdlAabbNode {
            bounding_box,
            children,
            leaf_face,
            most_significant_plane,
        })
    }
}
