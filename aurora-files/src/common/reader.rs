use std::ffi::CString;
use std::io::ErrorKind::UnexpectedEof;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::types::{C2Vector, C3Vector, C4Quaternion, CAaBox, CArgb};

pub trait Parseable<T> {
    fn parse<R: Read>(rdr: &mut R) -> Result<T, ParserError>;
}

impl Parseable<C3Vector> for C3Vector {
    fn parse<R: Read>(rdr: &mut R) -> Result<C3Vector, ParserError> {
        Ok(C3Vector {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
            z: rdr.read_f32::<LittleEndian>()?,
        })
    }
}

impl Parseable<C2Vector> for C2Vector {
    fn parse<R: Read>(rdr: &mut R) -> Result<C2Vector, ParserError> {
        Ok(C2Vector {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
        })
    }
}

// The node header stores the scalar part first.
impl Parseable<C4Quaternion> for C4Quaternion {
    fn parse<R: Read>(rdr: &mut R) -> Result<C4Quaternion, ParserError> {
        let w = rdr.read_f32::<LittleEndian>()?;
        Ok(C4Quaternion {
            x: rdr.read_f32::<LittleEndian>()?,
            y: rdr.read_f32::<LittleEndian>()?,
            z: rdr.read_f32::<LittleEndian>()?,
            w,
        })
    }
}

impl Parseable<CAaBox> for CAaBox {
    fn parse<R: Read>(rdr: &mut R) -> Result<CAaBox, ParserError> {
        Ok(CAaBox {
            min: C3Vector::parse(rdr)?,
            max: C3Vector::parse(rdr)?,
        })
    }
}

impl From<u32> for CArgb {
    fn from(value: u32) -> Self {
        let bytes = value.to_le_bytes();
        CArgb {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }
}

impl From<CArgb> for u32 {
    fn from(value: CArgb) -> Self {
        u32::from_le_bytes([value.r, value.g, value.b, value.a])
    }
}

impl Parseable<CArgb> for CArgb {
    fn parse<R: Read>(rdr: &mut R) -> Result<CArgb, ParserError> {
        Ok(CArgb::from(rdr.read_u32::<LittleEndian>()?))
    }
}

impl Parseable<u8> for u8 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u8, ParserError> {
        Ok(rdr.read_u8()?)
    }
}

impl Parseable<i8> for i8 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i8, ParserError> {
        Ok(rdr.read_i8()?)
    }
}

impl Parseable<u16> for u16 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u16, ParserError> {
        Ok(rdr.read_u16::<LittleEndian>()?)
    }
}

impl Parseable<i16> for i16 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i16, ParserError> {
        Ok(rdr.read_i16::<LittleEndian>()?)
    }
}

impl Parseable<u32> for u32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u32, ParserError> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }
}

impl Parseable<i32> for i32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i32, ParserError> {
        Ok(rdr.read_i32::<LittleEndian>()?)
    }
}

impl Parseable<f32> for f32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<f32, ParserError> {
        Ok(rdr.read_f32::<LittleEndian>()?)
    }
}

impl Parseable<u64> for u64 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u64, ParserError> {
        Ok(rdr.read_u64::<LittleEndian>()?)
    }
}

impl<T: Parseable<T>, const N: usize> Parseable<[T; N]> for [T; N] {
    fn parse<R: Read>(rdr: &mut R) -> Result<[T; N], ParserError> {
        let mut list = Vec::with_capacity(N);
        for _ in 0..N {
            list.push(T::parse(rdr)?);
        }
        Ok(list
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly N elements were pushed")))
    }
}

/// Reads a fixed-width ASCII field and strips the NUL padding.
pub fn read_fixed_string<R: Read>(rdr: &mut R, width: usize) -> Result<String, ParserError> {
    let mut buf = vec![0u8; width];
    rdr.read_exact(&mut buf)?;
    let len = buf.iter().position(|&c| c == 0).unwrap_or(width);
    buf.truncate(len);
    Ok(String::from_utf8(buf)?)
}

pub(crate) fn read_cstring<R: Read>(rdr: &mut R) -> Result<CString, ParserError> {
    let mut buf = Vec::new();
    loop {
        let c = rdr.read_u8()?;
        if c == 0 {
            // SAFETY: We can ensure, that there are no nul-bytes in buf
            return Ok(unsafe { CString::from_vec_unchecked(buf) });
        }
        buf.push(c);
    }
}

/// Short reads surface as `UnexpectedEof` inside the io error; callers that
/// know the read was mid-structure fold them into `Truncated`.
pub(crate) fn map_eof(err: ParserError) -> ParserError {
    match err {
        ParserError::IOError(internal) if internal.kind() == UnexpectedEof => ParserError::Truncated,
        err => err,
    }
}
