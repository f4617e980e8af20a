use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::common::types::{C2Vector, C3Vector, C4Quaternion, CAaBox, CArgb};

/// Mirror image of `Parseable`: a type that knows its little-endian disk form.
pub trait Writeable {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError>;
}

impl Writeable for C3Vector {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        wrt.write_f32::<LittleEndian>(self.x)?;
        wrt.write_f32::<LittleEndian>(self.y)?;
        wrt.write_f32::<LittleEndian>(self.z)?;
        Ok(())
    }
}

impl Writeable for C2Vector {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        wrt.write_f32::<LittleEndian>(self.x)?;
        wrt.write_f32::<LittleEndian>(self.y)?;
        Ok(())
    }
}

// Scalar part first, matching the parse order.
impl Writeable for C4Quaternion {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        wrt.write_f32::<LittleEndian>(self.w)?;
        wrt.write_f32::<LittleEndian>(self.x)?;
        wrt.write_f32::<LittleEndian>(self.y)?;
        wrt.write_f32::<LittleEndian>(self.z)?;
        Ok(())
    }
}

impl Writeable for CAaBox {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        self.min.write(wrt)?;
        self.max.write(wrt)?;
        Ok(())
    }
}

impl Writeable for CArgb {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_u32::<LittleEndian>(u32::from(*self))?)
    }
}

impl Writeable for u8 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_u8(*self)?)
    }
}

impl Writeable for i8 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_i8(*self)?)
    }
}

impl Writeable for u16 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_u16::<LittleEndian>(*self)?)
    }
}

impl Writeable for i16 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_i16::<LittleEndian>(*self)?)
    }
}

impl Writeable for u32 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_u32::<LittleEndian>(*self)?)
    }
}

impl Writeable for i32 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_i32::<LittleEndian>(*self)?)
    }
}

impl Writeable for f32 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_f32::<LittleEndian>(*self)?)
    }
}

impl Writeable for u64 {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        Ok(wrt.write_u64::<LittleEndian>(*self)?)
    }
}

impl<T: Writeable, const N: usize> Writeable for [T; N] {
    fn write<W: Write>(&self, wrt: &mut W) -> Result<(), ParserError> {
        for element in self {
            element.write(wrt)?;
        }
        Ok(())
    }
}

/// Emits `s` NUL-padded to `width` bytes. Fails `Unrepresentable` when the
/// string does not fit its declared field.
pub fn write_fixed_string<W: Write>(wrt: &mut W, s: &str, width: usize) -> Result<(), ParserError> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(ParserError::Unrepresentable {
            reason: format!("string '{}' exceeds its {}-byte field", s, width),
        });
    }

    wrt.write_all(bytes)?;
    for _ in bytes.len()..width {
        wrt.write_u8(0)?;
    }
    Ok(())
}
