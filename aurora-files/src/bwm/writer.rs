use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::bwm::types::{BWM_SIGNATURE, Walkmesh};
use crate::common::writer::Writeable;

/// Fixed header: signature, type, position, then four (count, offset) /
/// offset words for the vertex, face, material, adjacency and aabb blocks.
const HEADER_SIZE: u32 = 56;

pub struct BwmWriter {}

impl BwmWriter {
    pub fn write(walkmesh: &Walkmesh) -> Result<Vec<u8>, ParserError> {
        let vertex_offset = HEADER_SIZE;
        let face_offset = vertex_offset + walkmesh.vertices.len() as u32 * 12;
        let material_offset = face_offset + walkmesh.faces.len() as u32 * 12;
        let adjacency_offset = material_offset + walkmesh.faces.len() as u32 * 4;
        let aabb_offset = adjacency_offset + walkmesh.faces.len() as u32 * 12;

        let mut buf = Vec::with_capacity((aabb_offset + walkmesh.aabbs.len() as u32 * 44) as usize);
        buf.write_all(BWM_SIGNATURE)?;
        buf.write_u32::<LittleEndian>(walkmesh.walkmesh_type.into())?;
        walkmesh.position.write(&mut buf)?;
        buf.write_u32::<LittleEndian>(walkmesh.vertices.len() as u32)?;
        buf.write_u32::<LittleEndian>(vertex_offset)?;
        buf.write_u32::<LittleEndian>(walkmesh.faces.len() as u32)?;
        buf.write_u32::<LittleEndian>(face_offset)?;
        buf.write_u32::<LittleEndian>(material_offset)?;
        buf.write_u32::<LittleEndian>(adjacency_offset)?;
        buf.write_u32::<LittleEndian>(walkmesh.aabbs.len() as u32)?;
        buf.write_u32::<LittleEndian>(aabb_offset)?;

        for vertex in &walkmesh.vertices {
            vertex.write(&mut buf)?;
        }
        for face in &walkmesh.faces {
            for index in face.indices {
                if index as usize >= walkmesh.vertices.len() {
                    return Err(ParserError::Unrepresentable {
                        reason: format!(
                            "face index {} outside the {}-vertex array",
                            index,
                            walkmesh.vertices.len()
                        ),
                    });
                }
                buf.write_u32::<LittleEndian>(index)?;
            }
        }
        for face in &walkmesh.faces {
            buf.write_u32::<LittleEndian>(face.material.into())?;
        }
        for face in &walkmesh.faces {
            for slot in face.adjacency {
                buf.write_i32::<LittleEndian>(slot)?;
            }
        }
        for node in &walkmesh.aabbs {
            node.write(&mut buf)?;
        }

        Ok(buf)
    }

    pub fn write_to<W: Write>(walkmesh: &Walkmesh, out: &mut W) -> Result<(), ParserError> {
        out.write_all(&Self::write(walkmesh)?)?;
        Ok(())
    }
}
