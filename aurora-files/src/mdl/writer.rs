use std::io::Write;

use crate::ParserError;
use crate::common::types::{C2Vector, C3Vector};
use crate::mdl::reader::MDL_DATA_START;
use crate::mdl::types::{
    Animation, GEOMETRY_TYPE_ANIMATION, GEOMETRY_TYPE_MODEL, Game, Light, MdlAabbNode, MdxFlags,
    Mesh, Model, Node, NodeFlags, function_pointers,
};

/// A growable little-endian byte sink with position-addressed patching, for
/// the layout-then-patch serialization the format demands.
#[derive(Default)]
struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    fn pos(&self) -> u32 {
        self.buf.len() as u32
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn vec3(&mut self, value: C3Vector) {
        self.f32(value.x);
        self.f32(value.y);
        self.f32(value.z);
    }

    fn vec2(&mut self, value: C2Vector) {
        self.f32(value.x);
        self.f32(value.y);
    }

    fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// Reserves a u32 slot and returns its position for later patching.
    fn u32_slot(&mut self) -> u32 {
        let at = self.pos();
        self.u32(0);
        at
    }

    fn patch_u32(&mut self, at: u32, value: u32) {
        self.buf[at as usize..at as usize + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn fixed_string(&mut self, s: &str, width: usize) -> Result<(), ParserError> {
        let bytes = s.as_bytes();
        if bytes.len() > width {
            return Err(ParserError::Unrepresentable {
                reason: format!("string '{}' exceeds its {}-byte field", s, width),
            });
        }
        self.bytes(bytes);
        for _ in bytes.len()..width {
            self.u8(0);
        }
        Ok(())
    }

    fn cstring(&mut self, s: &str) {
        self.bytes(s.as_bytes());
        self.u8(0);
    }

    fn pad_to(&mut self, alignment: u32) {
        while self.pos() % alignment != 0 {
            self.u8(0);
        }
    }
}

/// An (offset, count, count) array descriptor with the offset left open.
fn array_def(sink: &mut Sink, count: u32) -> u32 {
    let patch = sink.u32_slot();
    sink.u32(count);
    sink.u32(count);
    patch
}

/// Repacked controller block for one node: descriptors plus the flat float
/// buffer holding all times first, then all row payloads.
struct PackedControllers {
    descriptors: Vec<PackedDescriptor>,
    floats: Vec<f32>,
}

struct PackedDescriptor {
    controller_type: u32,
    row_count: u16,
    time_index: u16,
    data_index: u16,
    columns: u8,
}

fn pack_controllers(node: &Node) -> Result<PackedControllers, ParserError> {
    let total_rows: usize = node.controllers.iter().map(|c| c.rows.len()).sum();
    let mut times = Vec::with_capacity(total_rows);
    let mut payload = vec![];
    let mut descriptors = Vec::with_capacity(node.controllers.len());

    for ctrl in &node.controllers {
        let per_row = ctrl.floats_per_row();
        for row in &ctrl.rows {
            if row.values.len() != per_row {
                return Err(ParserError::Unrepresentable {
                    reason: format!(
                        "controller {} declares {} columns but a row carries {} floats",
                        ctrl.controller_type,
                        per_row,
                        row.values.len()
                    ),
                });
            }
        }
        descriptors.push(PackedDescriptor {
            controller_type: ctrl.controller_type,
            row_count: ctrl.rows.len() as u16,
            time_index: times.len() as u16,
            data_index: payload.len() as u16,
            columns: ctrl.columns,
        });
        times.extend(ctrl.rows.iter().map(|row| row.time));
        for row in &ctrl.rows {
            payload.extend_from_slice(&row.values);
        }
    }

    if times.len() + payload.len() > u16::MAX as usize {
        return Err(ParserError::Unrepresentable {
            reason: format!(
                "{} controller floats exceed the 16-bit row indices",
                times.len() + payload.len()
            ),
        });
    }

    // payload indices are relative to the end of the time region
    let time_region = times.len() as u16;
    for descriptor in &mut descriptors {
        descriptor.data_index += time_region;
    }

    let mut floats = times;
    floats.append(&mut payload);
    Ok(PackedControllers { descriptors, floats })
}

pub struct MdlWriter<'m> {
    model: &'m Model,
    game: Game,
    mdl: Sink,
    mdx: Sink,
    names: Vec<String>,
    node_counter: u16,
}

impl<'m> MdlWriter<'m> {
    /// Serializes the model into fresh MDL and MDX buffers.
    pub fn write(model: &'m Model, game: Game) -> Result<(Vec<u8>, Vec<u8>), ParserError> {
        let mut writer = MdlWriter {
            model,
            game,
            mdl: Sink::default(),
            mdx: Sink::default(),
            names: vec![],
            node_counter: 0,
        };
        writer.emit()?;
        Ok((writer.mdl.buf, writer.mdx.buf))
    }

    /// Serializes the model into the given streams, releasing them on every
    /// exit path.
    pub fn write_to<W1: Write, W2: Write>(
        model: &'m Model,
        game: Game,
        mdl_out: &mut W1,
        mdx_out: &mut W2,
    ) -> Result<(), ParserError> {
        let (mdl, mdx) = Self::write(model, game)?;
        mdl_out.write_all(&mdl)?;
        mdx_out.write_all(&mdx)?;
        Ok(())
    }

    /// Offset of the current MDL write position, relative to the data start.
    fn data_pos(&self) -> u32 {
        self.mdl.pos() - MDL_DATA_START as u32
    }

    fn emit(&mut self) -> Result<(), ParserError> {
        let model = self.model;
        self.collect_names();

        // file header, sizes patched at the end
        self.mdl.u32(0);
        let mdl_size_patch = self.mdl.u32_slot();
        let mdx_size_patch = self.mdl.u32_slot();

        // geometry header
        let fps = function_pointers::geometry(self.game, false);
        self.mdl.u32(fps.0);
        self.mdl.u32(fps.1);
        self.mdl.fixed_string(&model.name, 32)?;
        let root_node_patch = self.mdl.u32_slot();
        self.mdl.u32(model.all_nodes().count() as u32);
        self.mdl.bytes(&[0u8; 24]);
        self.mdl.u32(0);
        self.mdl.u8(GEOMETRY_TYPE_MODEL);
        self.mdl.bytes(&[0u8; 3]);

        // model sub-header
        self.mdl.u8(model.classification.into());
        self.mdl.u8(model.subclassification);
        // full quaternions are the only encoding this writer produces
        self.mdl.u8(0);
        self.mdl.u8(model.fog as u8);
        self.mdl.u32(0);
        let animations_patch = array_def(&mut self.mdl, model.animations.len() as u32);
        self.mdl.u32(0);
        self.mdl.vec3(model.bounding_box.min);
        self.mdl.vec3(model.bounding_box.max);
        self.mdl.f32(model.radius);
        self.mdl.f32(model.animation_scale);
        self.mdl.fixed_string(&model.supermodel, 32)?;

        // names header
        let root_node_dup_patch = self.mdl.u32_slot();
        self.mdl.u32(0);
        let mdx_size_dup_patch = self.mdl.u32_slot();
        self.mdl.u32(0);
        let names_offset_patch = self.mdl.u32_slot();
        self.mdl.u32(self.names.len() as u32);
        self.mdl.u32(self.names.len() as u32);

        // name table: the offsets array, then the contiguous blob
        let names_offset = self.data_pos();
        self.mdl.patch_u32(names_offset_patch, names_offset);
        let name_slot_patches: Vec<u32> = (0..self.names.len())
            .map(|_| self.mdl.u32_slot())
            .collect();
        let names = self.names.clone();
        for (name, patch) in names.iter().zip(name_slot_patches) {
            let at = self.data_pos();
            self.mdl.patch_u32(patch, at);
            self.mdl.cstring(name);
        }
        self.mdl.pad_to(4);

        // animations
        let animations_offset = self.data_pos();
        self.mdl.patch_u32(animations_patch, animations_offset);
        let animation_slot_patches: Vec<u32> = (0..model.animations.len())
            .map(|_| self.mdl.u32_slot())
            .collect();
        for (animation, patch) in model.animations.iter().zip(animation_slot_patches) {
            let at = self.data_pos();
            self.mdl.patch_u32(patch, at);
            self.emit_animation(animation)?;
        }

        // main node tree
        self.node_counter = 0;
        let root_offset = self.emit_node(&model.root, 0, None)?;
        self.mdl.patch_u32(root_node_patch, root_offset);
        self.mdl.patch_u32(root_node_dup_patch, root_offset);

        let mdl_size = self.mdl.pos() - MDL_DATA_START as u32;
        self.mdl.patch_u32(mdl_size_patch, mdl_size);
        self.mdl.patch_u32(mdx_size_patch, self.mdx.pos());
        self.mdl.patch_u32(mdx_size_dup_patch, self.mdx.pos());
        Ok(())
    }

    /// The model-level name table: main-tree names in preorder, followed by
    /// any animation-only node names.
    fn collect_names(&mut self) {
        let mut names: Vec<String> = self.model.all_nodes().map(|n| n.name.clone()).collect();
        for animation in &self.model.animations {
            for node in animation.root.iter() {
                if !names.contains(&node.name) {
                    names.push(node.name.clone());
                }
            }
        }
        self.names = names;
    }

    fn name_id(&self, name: &str) -> Result<u16, ParserError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| i as u16)
            .ok_or_else(|| ParserError::Unrepresentable {
                reason: format!("node name '{}' missing from the name table", name),
            })
    }

    fn emit_animation(&mut self, animation: &Animation) -> Result<(), ParserError> {
        let fps = function_pointers::geometry(self.game, true);
        self.mdl.u32(fps.0);
        self.mdl.u32(fps.1);
        self.mdl.fixed_string(&animation.name, 32)?;
        let root_node_patch = self.mdl.u32_slot();
        self.mdl.u32(animation.root.iter().count() as u32);
        self.mdl.bytes(&[0u8; 24]);
        self.mdl.u32(0);
        self.mdl.u8(GEOMETRY_TYPE_ANIMATION);
        self.mdl.bytes(&[0u8; 3]);

        self.mdl.f32(animation.length);
        self.mdl.f32(animation.transition);
        self.mdl.fixed_string(&animation.root_model, 32)?;
        let events_patch = array_def(&mut self.mdl, animation.events.len() as u32);
        self.mdl.u32(0);

        let events_offset = self.data_pos();
        self.mdl.patch_u32(events_patch, events_offset);
        for event in &animation.events {
            self.mdl.f32(event.activation_time);
            self.mdl.fixed_string(&event.name, 32)?;
        }

        self.node_counter = 0;
        let root_offset = self.emit_node(&animation.root, 0, None)?;
        self.mdl.patch_u32(root_node_patch, root_offset);
        Ok(())
    }

    /// Emits one node block and, recursively, its children. Returns the
    /// node's offset.
    fn emit_node(
        &mut self,
        node: &Node,
        parent_offset: u32,
        root_offset: Option<u32>,
    ) -> Result<u32, ParserError> {
        let offset = self.data_pos();
        let tree_root = root_offset.unwrap_or(offset);
        let flags = NodeFlags::for_node(node);
        let attachments = node.mesh.is_some() as u8
            + node.light.is_some() as u8
            + node.emitter.is_some() as u8
            + node.reference.is_some() as u8;
        if attachments > 1 {
            // the sub-header slot right behind the node header fits one
            return Err(ParserError::Unrepresentable {
                reason: format!("node '{}' carries {} attachments", node.name, attachments),
            });
        }
        let packed = pack_controllers(node)?;
        let name_id = self.name_id(&node.name)?;
        let node_id = self.node_counter;
        self.node_counter += 1;

        // node header
        self.mdl.u16(flags.bits());
        self.mdl.u16(node_id);
        self.mdl.u16(name_id);
        self.mdl.u16(0);
        self.mdl.u32(tree_root);
        self.mdl.u32(parent_offset);
        self.mdl.vec3(node.position);
        self.mdl.f32(node.orientation.w);
        self.mdl.f32(node.orientation.x);
        self.mdl.f32(node.orientation.y);
        self.mdl.f32(node.orientation.z);
        let children_patch = array_def(&mut self.mdl, node.children.len() as u32);
        let controllers_patch = array_def(&mut self.mdl, packed.descriptors.len() as u32);
        let data_patch = array_def(&mut self.mdl, packed.floats.len() as u32);

        let mesh_patches = if let Some(mesh) = &node.mesh {
            Some(self.emit_mesh_header(mesh)?)
        } else {
            None
        };
        let light_patches = if let Some(light) = &node.light {
            Some(self.emit_light_header(light))
        } else {
            None
        };
        if let Some(emitter) = &node.emitter {
            self.emit_emitter_header(emitter)?;
        }
        if let Some(reference) = &node.reference {
            self.mdl.fixed_string(&reference.model, 32)?;
            self.mdl.u32(reference.reattachable as u32);
        }

        // children-offset array
        let children_offset = self.data_pos();
        self.mdl.patch_u32(children_patch, children_offset);
        let child_slot_patches: Vec<u32> = (0..node.children.len())
            .map(|_| self.mdl.u32_slot())
            .collect();

        // controller descriptors
        let controllers_offset = self.data_pos();
        self.mdl.patch_u32(controllers_patch, controllers_offset);
        for descriptor in &packed.descriptors {
            self.mdl.u32(descriptor.controller_type);
            self.mdl.u16(0xFFFF);
            self.mdl.u16(descriptor.row_count);
            self.mdl.u16(descriptor.time_index);
            self.mdl.u16(descriptor.data_index);
            self.mdl.u8(descriptor.columns);
            self.mdl.bytes(&[0u8; 3]);
        }

        // controller data floats
        let data_offset = self.data_pos();
        self.mdl.patch_u32(data_patch, data_offset);
        for value in &packed.floats {
            self.mdl.f32(*value);
        }

        if let (Some(mesh), Some(patches)) = (&node.mesh, mesh_patches) {
            self.emit_mesh_data(mesh, patches)?;
        }
        if let (Some(light), Some(patches)) = (&node.light, light_patches) {
            self.emit_light_data(light, patches)?;
        }

        // children last, so a node block is contiguous
        for (child, patch) in node.children.iter().zip(child_slot_patches) {
            let child_offset = self.emit_node(child, offset, Some(tree_root))?;
            self.mdl.patch_u32(patch, child_offset);
        }

        Ok(offset)
    }

    fn emit_emitter_header(&mut self, emitter: &crate::mdl::types::Emitter) -> Result<(), ParserError> {
        self.mdl.f32(emitter.dead_space);
        self.mdl.f32(emitter.blast_radius);
        self.mdl.f32(emitter.blast_length);
        self.mdl.u32(emitter.branch_count);
        self.mdl.u32(emitter.control_point_smoothing);
        self.mdl.f32(emitter.x_grid);
        self.mdl.f32(emitter.y_grid);
        self.mdl.u32(emitter.spawn_type);
        self.mdl.fixed_string(&emitter.update, 32)?;
        self.mdl.fixed_string(&emitter.render, 32)?;
        self.mdl.fixed_string(&emitter.blend, 32)?;
        self.mdl.fixed_string(&emitter.texture, 32)?;
        self.mdl.fixed_string(&emitter.chunk_name, 16)?;
        self.mdl.u32(emitter.two_sided_texture as u32);
        self.mdl.u32(emitter.looping as u32);
        self.mdl.u16(emitter.render_order);
        self.mdl.u8(emitter.frame_blending);
        self.mdl.u8(0);
        self.mdl.u32(emitter.flags);
        Ok(())
    }

    fn emit_light_header(&mut self, light: &Light) -> LightPatches {
        self.mdl.f32(light.flare_radius);
        let unknown = array_def(&mut self.mdl, 0);
        let sizes = array_def(&mut self.mdl, light.flare_sizes.len() as u32);
        let positions = array_def(&mut self.mdl, light.flare_positions.len() as u32);
        let shifts = array_def(&mut self.mdl, light.flare_color_shifts.len() as u32);
        let textures = array_def(&mut self.mdl, light.flare_texture_names.len() as u32);
        self.mdl.u32(light.priority);
        self.mdl.u32(light.ambient_only as u32);
        self.mdl.u32(light.dynamic_type);
        self.mdl.u32(light.affect_dynamic as u32);
        self.mdl.u32(light.shadow as u32);
        self.mdl.u32(light.flare as u32);
        self.mdl.u32(light.fading as u32);
        LightPatches {
            unknown,
            sizes,
            positions,
            shifts,
            textures,
        }
    }

    fn emit_light_data(&mut self, light: &Light, patches: LightPatches) -> Result<(), ParserError> {
        let at = self.data_pos();
        self.mdl.patch_u32(patches.unknown, at);

        let at = self.data_pos();
        self.mdl.patch_u32(patches.sizes, at);
        for value in &light.flare_sizes {
            self.mdl.f32(*value);
        }

        let at = self.data_pos();
        self.mdl.patch_u32(patches.positions, at);
        for value in &light.flare_positions {
            self.mdl.f32(*value);
        }

        let at = self.data_pos();
        self.mdl.patch_u32(patches.shifts, at);
        for value in &light.flare_color_shifts {
            self.mdl.vec3(*value);
        }

        let at = self.data_pos();
        self.mdl.patch_u32(patches.textures, at);
        let name_patches: Vec<u32> = (0..light.flare_texture_names.len())
            .map(|_| self.mdl.u32_slot())
            .collect();
        for (name, patch) in light.flare_texture_names.iter().zip(name_patches) {
            let at = self.data_pos();
            self.mdl.patch_u32(patch, at);
            self.mdl.cstring(name);
        }
        self.mdl.pad_to(4);
        Ok(())
    }

    fn emit_mesh_header(&mut self, mesh: &Mesh) -> Result<MeshPatches, ParserError> {
        let vertex_count = mesh.positions.len();
        if vertex_count > u16::MAX as usize {
            return Err(ParserError::Unrepresentable {
                reason: format!("{} vertices exceed the 16-bit vertex count", vertex_count),
            });
        }
        let check_attribute = |len: usize, what: &str| -> Result<(), ParserError> {
            if len != 0 && len != vertex_count {
                return Err(ParserError::Unrepresentable {
                    reason: format!(
                        "{} array carries {} entries for {} vertices",
                        what, len, vertex_count
                    ),
                });
            }
            Ok(())
        };
        check_attribute(mesh.normals.len(), "normal")?;
        check_attribute(mesh.uv0.len(), "uv0")?;
        check_attribute(mesh.uv1.len(), "uv1")?;
        if let Some(skin) = &mesh.skin {
            if skin.weights.len() != vertex_count || skin.bone_indices.len() != vertex_count {
                return Err(ParserError::Unrepresentable {
                    reason: format!(
                        "skin weight tables carry {}/{} entries for {} vertices",
                        skin.weights.len(),
                        skin.bone_indices.len(),
                        vertex_count
                    ),
                });
            }
        }

        // the interleaved MDX record: positions, normals, uv0, uv1, then
        // skin weights and bone indices
        let mut bitmap = MdxFlags::VERTICES;
        let mut stride = 12u32;
        let mut normals_off = -1i32;
        let mut uv0_off = -1i32;
        let mut uv1_off = -1i32;
        if !mesh.normals.is_empty() {
            bitmap |= MdxFlags::NORMALS;
            normals_off = stride as i32;
            stride += 12;
        }
        if !mesh.uv0.is_empty() {
            bitmap |= MdxFlags::UV0;
            uv0_off = stride as i32;
            stride += 8;
        }
        if !mesh.uv1.is_empty() {
            bitmap |= MdxFlags::UV1;
            uv1_off = stride as i32;
            stride += 8;
        }
        let mut weights_off = -1i32;
        let mut indices_off = -1i32;
        if mesh.skin.is_some() {
            weights_off = stride as i32;
            stride += 16;
            indices_off = stride as i32;
            stride += 16;
        }

        let mdx_data_offset = self.emit_mdx_stream(mesh, stride, normals_off >= 0)?;

        let fps = function_pointers::mesh(self.game, mesh.skin.is_some(), mesh.dangly.is_some());
        self.mdl.u32(fps.0);
        self.mdl.u32(fps.1);
        let faces = array_def(&mut self.mdl, mesh.faces.len() as u32);
        self.mdl.vec3(mesh.bounding_box.min);
        self.mdl.vec3(mesh.bounding_box.max);
        self.mdl.f32(mesh.radius);
        self.mdl.vec3(mesh.average);
        // colors go out reversed: (b, g, r)
        self.mdl.vec3(C3Vector::new(mesh.diffuse.z, mesh.diffuse.y, mesh.diffuse.x));
        self.mdl.vec3(C3Vector::new(mesh.ambient.z, mesh.ambient.y, mesh.ambient.x));
        self.mdl.u32(mesh.transparency_hint);
        let texture = if mesh.texture.is_empty() { "NULL" } else { mesh.texture.as_str() };
        let lightmap = if mesh.lightmap.is_empty() { "NULL" } else { mesh.lightmap.as_str() };
        self.mdl.fixed_string(texture, 32)?;
        self.mdl.fixed_string(lightmap, 32)?;
        self.mdl.fixed_string("", 12)?;
        self.mdl.fixed_string("", 12)?;
        let indices_count = array_def(&mut self.mdl, 1);
        let indices_offset = array_def(&mut self.mdl, 1);
        let inverted_counter = array_def(&mut self.mdl, 1);
        for value in mesh.unknown_ints {
            self.mdl.i32(value);
        }
        self.mdl.bytes(&mesh.saber_unknowns);
        self.mdl.u32(mesh.animate_uv as u32);
        self.mdl.f32(mesh.uv_direction_x);
        self.mdl.f32(mesh.uv_direction_y);
        self.mdl.f32(mesh.uv_jitter);
        self.mdl.f32(mesh.uv_jitter_speed);
        self.mdl.u32(stride);
        self.mdl.u32(bitmap.bits());
        self.mdl.i32(0);
        self.mdl.i32(normals_off);
        self.mdl.i32(-1);
        self.mdl.i32(uv0_off);
        self.mdl.i32(uv1_off);
        self.mdl.i32(-1);
        self.mdl.i32(-1);
        for _ in 0..4 {
            self.mdl.i32(-1);
        }
        self.mdl.u16(vertex_count as u16);
        let has_lightmap = !mesh.lightmap.is_empty();
        self.mdl.u16(if has_lightmap { 2 } else { 1 });
        self.mdl.u8(has_lightmap as u8);
        self.mdl.u8(mesh.rotate_texture as u8);
        self.mdl.u8(mesh.background_geometry as u8);
        self.mdl.u8(mesh.shadow as u8);
        self.mdl.u8(mesh.beaming as u8);
        self.mdl.u8(mesh.render as u8);
        self.mdl.u16(mesh.unknown_word);
        self.mdl.f32(mesh.total_area);
        self.mdl.u32(mesh.unknown_dword);
        if self.game == Game::Kotor2 {
            self.mdl.u32(mesh.k2_unknowns[0]);
            self.mdl.u32(mesh.k2_unknowns[1]);
        }
        self.mdl.u32(mdx_data_offset);
        let vertices = self.mdl.u32_slot();

        let mut patches = MeshPatches {
            faces,
            indices_count,
            indices_offset,
            inverted_counter,
            vertices,
            skin: None,
            dangly: None,
            saber: None,
            animmesh: None,
            aabb: None,
        };

        // extensions, same order the reader consumes them
        if let Some(skin) = &mesh.skin {
            let unused = array_def(&mut self.mdl, 0);
            let bone_map_offset = self.mdl.u32_slot();
            self.mdl.u32(skin.bone_map.len() as u32);
            let qbones = array_def(&mut self.mdl, skin.qbones.len() as u32);
            let tbones = array_def(&mut self.mdl, skin.tbones.len() as u32);
            let unknown = array_def(&mut self.mdl, 0);
            for serial in skin.bone_serial {
                self.mdl.u16(serial);
            }
            self.mdl.i32(weights_off);
            self.mdl.i32(indices_off);
            self.mdl.u32(0);
            patches.skin = Some(SkinPatches {
                unused,
                bone_map_offset,
                qbones,
                tbones,
                unknown,
            });
        }
        if let Some(dangly) = &mesh.dangly {
            let constraints = array_def(&mut self.mdl, dangly.constraints.len() as u32);
            self.mdl.f32(dangly.displacement);
            self.mdl.f32(dangly.tightness);
            self.mdl.f32(dangly.period);
            self.mdl.u32(0);
            patches.dangly = Some(constraints);
        }
        if mesh.saber.is_some() {
            let vertices = self.mdl.u32_slot();
            let uvs = self.mdl.u32_slot();
            let normals = self.mdl.u32_slot();
            self.mdl.u32(0);
            self.mdl.u32(0);
            patches.saber = Some(SaberPatches {
                vertices,
                uvs,
                normals,
            });
        }
        if let Some(animmesh) = &mesh.animmesh {
            self.mdl.f32(animmesh.sample_period);
            let vertices = array_def(&mut self.mdl, animmesh.animated_vertices.len() as u32);
            let uvs = array_def(&mut self.mdl, animmesh.animated_uvs.len() as u32);
            patches.animmesh = Some(AnimMeshPatches { vertices, uvs });
        }
        if mesh.aabb.is_some() {
            patches.aabb = Some(self.mdl.u32_slot());
        }

        Ok(patches)
    }

    /// Interleaved per-vertex records for one node, then the sentinel
    /// trailer. Returns the node's absolute MDX offset.
    fn emit_mdx_stream(
        &mut self,
        mesh: &Mesh,
        stride: u32,
        has_normals: bool,
    ) -> Result<u32, ParserError> {
        let offset = self.mdx.pos();
        for (v, position) in mesh.positions.iter().enumerate() {
            let record_start = self.mdx.pos();
            self.mdx.vec3(*position);
            if let Some(normal) = mesh.normals.get(v) {
                self.mdx.vec3(*normal);
            }
            if let Some(uv) = mesh.uv0.get(v) {
                self.mdx.vec2(*uv);
            }
            if let Some(uv) = mesh.uv1.get(v) {
                self.mdx.vec2(*uv);
            }
            if let Some(skin) = &mesh.skin {
                for weight in skin.weights[v] {
                    self.mdx.f32(weight);
                }
                for index in skin.bone_indices[v] {
                    self.mdx.f32(index);
                }
            }
            debug_assert_eq!(self.mdx.pos() - record_start, stride);
        }

        // sentinel trailer
        self.mdx.vec3(C3Vector::new(1e7, 1e7, 1e7));
        if has_normals {
            self.mdx.vec3(C3Vector::ZERO);
        }
        if !mesh.uv0.is_empty() {
            self.mdx.vec2(C2Vector::new(0.0, 0.0));
        }
        if !mesh.uv1.is_empty() {
            self.mdx.vec2(C2Vector::new(0.0, 0.0));
        }
        if mesh.skin.is_some() {
            let pattern: [f32; 16] = [
                1e6, 1e6, 1e6, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ];
            for value in pattern {
                self.mdx.f32(value);
            }
        }
        Ok(offset)
    }

    /// The MDL-side mesh payload: index bookkeeping arrays, the u16 face
    /// index triples, vertex positions, face records, and extension arrays.
    fn emit_mesh_data(&mut self, mesh: &Mesh, patches: MeshPatches) -> Result<(), ParserError> {
        // indices-count array [3 * faces]
        let at = self.data_pos();
        self.mdl.patch_u32(patches.indices_count, at);
        self.mdl.u32(mesh.faces.len() as u32 * 3);

        // indices-offset array; its single entry points at the triples below
        let at = self.data_pos();
        self.mdl.patch_u32(patches.indices_offset, at);
        let triples_patch = self.mdl.u32_slot();

        // inverted counter array [0]
        let at = self.data_pos();
        self.mdl.patch_u32(patches.inverted_counter, at);
        self.mdl.u32(0);

        // face-index u16 triples
        let triples_offset = self.data_pos();
        self.mdl.patch_u32(triples_patch, triples_offset);
        for face in &mesh.faces {
            for index in face.indices {
                if index > u16::MAX as u32 {
                    return Err(ParserError::Unrepresentable {
                        reason: format!("face index {} exceeds the 16-bit triple", index),
                    });
                }
                self.mdl.u16(index as u16);
            }
        }
        self.mdl.pad_to(4);

        // vertex positions
        let at = self.data_pos();
        self.mdl.patch_u32(patches.vertices, at);
        for position in &mesh.positions {
            self.mdl.vec3(*position);
        }

        // face records
        let at = self.data_pos();
        self.mdl.patch_u32(patches.faces, at);
        for face in &mesh.faces {
            self.mdl.vec3(face.normal);
            self.mdl.f32(face.plane_coefficient);
            self.mdl.u32(face.material);
            for slot in face.adjacency {
                self.mdl.i32(slot.face);
                self.mdl.i32(slot.edge);
            }
            for index in face.indices {
                self.mdl.u32(index);
            }
        }

        if let (Some(skin), Some(skin_patches)) = (&mesh.skin, patches.skin) {
            let at = self.data_pos();
            self.mdl.patch_u32(skin_patches.unused, at);
            self.mdl.patch_u32(skin_patches.unknown, at);

            let at = self.data_pos();
            self.mdl.patch_u32(skin_patches.bone_map_offset, at);
            for bone in &skin.bone_map {
                self.mdl.u32(*bone);
            }

            let at = self.data_pos();
            self.mdl.patch_u32(skin_patches.qbones, at);
            for qbone in &skin.qbones {
                self.mdl.f32(qbone.w);
                self.mdl.f32(qbone.x);
                self.mdl.f32(qbone.y);
                self.mdl.f32(qbone.z);
            }

            let at = self.data_pos();
            self.mdl.patch_u32(skin_patches.tbones, at);
            for tbone in &skin.tbones {
                self.mdl.vec3(*tbone);
            }
        }

        if let (Some(dangly), Some(constraints_patch)) = (&mesh.dangly, patches.dangly) {
            let at = self.data_pos();
            self.mdl.patch_u32(constraints_patch, at);
            for constraint in &dangly.constraints {
                self.mdl.f32(*constraint);
            }
        }

        if let (Some(saber), Some(saber_patches)) = (&mesh.saber, patches.saber) {
            if saber.vertices.len() != mesh.positions.len()
                || saber.uvs.len() != mesh.positions.len()
                || saber.normals.len() != mesh.positions.len()
            {
                return Err(ParserError::Unrepresentable {
                    reason: "saber sub-arrays disagree with the vertex count".to_string(),
                });
            }
            let at = self.data_pos();
            self.mdl.patch_u32(saber_patches.vertices, at);
            for vertex in &saber.vertices {
                self.mdl.vec3(*vertex);
            }
            let at = self.data_pos();
            self.mdl.patch_u32(saber_patches.uvs, at);
            for uv in &saber.uvs {
                self.mdl.vec2(*uv);
            }
            let at = self.data_pos();
            self.mdl.patch_u32(saber_patches.normals, at);
            for normal in &saber.normals {
                self.mdl.vec3(*normal);
            }
        }

        if let (Some(animmesh), Some(animmesh_patches)) = (&mesh.animmesh, patches.animmesh) {
            let at = self.data_pos();
            self.mdl.patch_u32(animmesh_patches.vertices, at);
            for vertex in &animmesh.animated_vertices {
                self.mdl.vec3(*vertex);
            }
            let at = self.data_pos();
            self.mdl.patch_u32(animmesh_patches.uvs, at);
            for uv in &animmesh.animated_uvs {
                self.mdl.vec2(*uv);
            }
        }

        if let (Some(aabb), Some(aabb_patch)) = (&mesh.aabb, patches.aabb) {
            let root_offset = self.emit_aabb_node(aabb);
            self.mdl.patch_u32(aabb_patch, root_offset);
        }

        Ok(())
    }

    fn emit_aabb_node(&mut self, node: &MdlAabbNode) -> u32 {
        let offset = self.data_pos();
        self.mdl.vec3(node.bounding_box.min);
        self.mdl.vec3(node.bounding_box.max);
        let left_patch = self.mdl.u32_slot();
        let right_patch = self.mdl.u32_slot();
        self.mdl.i32(node.leaf_face);
        self.mdl.u32(node.most_significant_plane);

        if let Some(children) = &node.children {
            let left = self.emit_aabb_node(&children.0);
            let right = self.emit_aabb_node(&children.1);
            self.mdl.patch_u32(left_patch, left);
            self.mdl.patch_u32(right_patch, right);
        }
        offset
    }
}

struct MeshPatches {
    faces: u32,
    indices_count: u32,
    indices_offset: u32,
    inverted_counter: u32,
    vertices: u32,
    skin: Option<SkinPatches>,
    dangly: Option<u32>,
    saber: Option<SaberPatches>,
    animmesh: Option<AnimMeshPatches>,
    aabb: Option<u32>,
}

struct SkinPatches {
    unused: u32,
    bone_map_offset: u32,
    qbones: u32,
    tbones: u32,
    unknown: u32,
}

struct SaberPatches {
    vertices: u32,
    uvs: u32,
    normals: u32,
}

struct AnimMeshPatches {
    vertices: u32,
    uvs: u32,
}

struct LightPatches {
    unknown: u32,
    sizes: u32,
    positions: u32,
    shifts: u32,
    textures: u32,
}

/// Convenience alias mirroring the reader's entry point.
pub fn write(model: &Model, game: Game) -> Result<(Vec<u8>, Vec<u8>), ParserError> {
    MdlWriter::write(model, game)
}
