use thiserror::Error;

/// Errors produced while decoding the calibration text format.
///
/// Any of these aborts the parse for the entry being decoded; the storage
/// layer treats a failed parse the same as a missing cache file.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The stream ended in the middle of a value.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A token could not be parsed as the expected numeric type.
    #[error("malformed token {token:?}: expected {expected}")]
    MalformedToken {
        token: String,
        expected: &'static str,
    },

    /// A sequence declared more elements than the format allows.
    #[error("sequence length {len} exceeds limit {limit}")]
    LengthOutOfRange { len: u64, limit: u64 },

    /// A fixed-size array was stored with a different element count.
    #[error("expected array of {expected} entries, found {found}")]
    ArraySizeMismatch { expected: usize, found: u64 },

    /// Shading reference arrays disagree with their declared size.
    #[error("shading arrays ({white} white, {dark} dark) do not match declared size {declared}")]
    ShadingSizeMismatch {
        declared: u64,
        white: usize,
        dark: usize,
    },

    /// Underlying reader failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
