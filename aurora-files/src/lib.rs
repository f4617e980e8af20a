use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file's magic value does not match the expectation {magic}")]
    InvalidMagicValue { magic: u32 },

    /// The source ended before a structure could be read in full.
    #[error("Input ended before the structure at hand could be read")]
    Truncated,

    /// An offset or count points outside the buffer, or a duplicated count
    /// field disagrees with its primary.
    #[error("The file is violating the expected format at offset {offset}, because: {reason}")]
    MalformedFormat { offset: u64, reason: &'static str },

    /// A discriminator value outside the documented set (geometry type byte,
    /// node type word, controller encoding).
    #[error("Unsupported {what} value {value:#x}")]
    Unsupported { what: &'static str, value: u32 },

    /// The in-memory model cannot be serialized: a string exceeds its fixed
    /// field, or an attribute array contradicts the vertex count.
    #[error("The model cannot be represented on disk, because: {reason}")]
    Unrepresentable { reason: String },

    /// Represents all cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    StringConversationError(#[from] std::ffi::IntoStringError),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),
}

pub mod bwm;
pub mod common;
pub mod mdl;
