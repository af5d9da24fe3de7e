use crate::format_code::FormatCode;

/// Errors raised by the buffer layer and the type codec
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid format code 0x{0:02x}")]
    InvalidFormatCode(u8),

    #[error("invalid value for format code {0}")]
    InvalidValue(FormatCode),

    #[error("descriptor must be an unsigned long or a symbol")]
    InvalidDescriptor,

    #[error("unexpected descriptor")]
    UnexpectedDescriptor,

    #[error("invalid UTF-8 encoding")]
    InvalidUtf8Encoding,

    #[error("symbol contains non-ASCII bytes")]
    NonAsciiSymbol,

    #[error("malformed size/count: size {size}, count {count}")]
    MalformedLength { size: usize, count: usize },

    #[error("array elements must share a single constructor")]
    MixedArray,

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("mandatory field `{0}` is null or missing")]
    MissingField(&'static str),

    #[error("value is too long to be encoded")]
    TooLong,

    // Buffer layer
    #[error("offset {offset} out of bounds for capacity {capacity}")]
    OutOfBounds { offset: usize, capacity: usize },

    #[error("constituent buffer is already part of the composite")]
    DuplicateConstituent,

    #[error("appending the constituent would create a write gap")]
    WriteGap,

    #[error("appending the constituent would create a read gap")]
    ReadGap,

    #[error("buffer capacity overflow")]
    CapacityOverflow,
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8Encoding
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8Encoding
    }
}
