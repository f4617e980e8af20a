use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::bwm::types::{
    BWM_SIGNATURE, BwmAabbNode, SurfaceMaterial, Walkmesh, WalkmeshFace, WalkmeshType,
};
use crate::common::reader::{Parseable, map_eof};
use crate::common::types::C3Vector;

pub struct BwmReader {}

impl BwmReader {
    pub fn read(data: &[u8]) -> Result<Walkmesh, ParserError> {
        Self::read_inner(data).map_err(map_eof)
    }

    fn read_inner(data: &[u8]) -> Result<Walkmesh, ParserError> {
        let mut rdr = Cursor::new(data);

        let mut signature = [0u8; 8];
        rdr.read_exact(&mut signature)?;
        if &signature != BWM_SIGNATURE {
            return Err(ParserError::InvalidMagicValue {
                magic: u32::from_le_bytes(signature[0..4].try_into().unwrap_or_default()),
            });
        }

        let type_raw = rdr.read_u32::<LittleEndian>()?;
        let walkmesh_type =
            WalkmeshType::try_from(type_raw).map_err(|_| ParserError::Unsupported {
                what: "walkmesh type",
                value: type_raw,
            })?;
        let position = C3Vector::parse(&mut rdr)?;

        let vertex_count = rdr.read_u32::<LittleEndian>()?;
        let vertex_offset = rdr.read_u32::<LittleEndian>()?;
        let face_count = rdr.read_u32::<LittleEndian>()?;
        let face_offset = rdr.read_u32::<LittleEndian>()?;
        let material_offset = rdr.read_u32::<LittleEndian>()?;
        let adjacency_offset = rdr.read_u32::<LittleEndian>()?;
        let aabb_count = rdr.read_u32::<LittleEndian>()?;
        let aabb_offset = rdr.read_u32::<LittleEndian>()?;

        let check = |offset: u32, len: u64, what: &'static str| -> Result<(), ParserError> {
            if offset as u64 + len > data.len() as u64 {
                return Err(ParserError::MalformedFormat {
                    offset: offset as u64,
                    reason: what,
                });
            }
            Ok(())
        };

        check(vertex_offset, vertex_count as u64 * 12, "vertex array exceeds the buffer")?;
        rdr.seek(SeekFrom::Start(vertex_offset as u64))?;
        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for _ in 0..vertex_count {
            vertices.push(C3Vector::parse(&mut rdr)?);
        }

        check(face_offset, face_count as u64 * 12, "face index array exceeds the buffer")?;
        rdr.seek(SeekFrom::Start(face_offset as u64))?;
        let mut indices = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            let triple = <[u32; 3]>::parse(&mut rdr)?;
            for index in triple {
                if index >= vertex_count {
                    return Err(ParserError::MalformedFormat {
                        offset: face_offset as u64,
                        reason: "face references a vertex outside the array",
                    });
                }
            }
            indices.push(triple);
        }

        check(material_offset, face_count as u64 * 4, "material array exceeds the buffer")?;
        rdr.seek(SeekFrom::Start(material_offset as u64))?;
        let mut materials = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            let raw = rdr.read_u32::<LittleEndian>()?;
            materials.push(SurfaceMaterial::try_from(raw).map_err(|_| {
                ParserError::Unsupported {
                    what: "surface material",
                    value: raw,
                }
            })?);
        }

        check(adjacency_offset, face_count as u64 * 12, "adjacency array exceeds the buffer")?;
        rdr.seek(SeekFrom::Start(adjacency_offset as u64))?;
        let mut adjacency = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            adjacency.push(<[i32; 3]>::parse(&mut rdr)?);
        }

        check(aabb_offset, aabb_count as u64 * 44, "aabb array exceeds the buffer")?;
        rdr.seek(SeekFrom::Start(aabb_offset as u64))?;
        let mut aabbs = Vec::with_capacity(aabb_count as usize);
        for _ in 0..aabb_count {
            let node = BwmAabbNode::parse(&mut rdr)?;
            for child in [node.left, node.right] {
                if child >= aabb_count as i32 {
                    return Err(ParserError::MalformedFormat {
                        offset: aabb_offset as u64,
                        reason: "aabb child index outside the node array",
                    });
                }
            }
            aabbs.push(node);
        }

        let faces = indices
            .into_iter()
            .zip(materials)
            .zip(adjacency)
            .map(|((indices, material), adjacency)| WalkmeshFace {
                indices,
                material,
                adjacency,
            })
            .collect();

        Ok(Walkmesh {
            walkmesh_type,
            position,
            vertices,
            faces,
            aabbs,
        })
    }
}
