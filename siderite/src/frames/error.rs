/// Errors raised while parsing or emitting frames
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] siderite_codec::Error),

    #[error("frame size {size} exceeds the maximum of {max}")]
    FrameSizeExceeded { size: usize, max: usize },

    #[error("frame size {0} is below the 8-byte minimum")]
    FrameSizeTooSmall(usize),

    #[error("invalid data offset {0}")]
    InvalidDataOffset(u8),

    #[error("unexpected frame type 0x{0:02x}")]
    UnexpectedFrameType(u8),

    #[error("invalid protocol header {0:02x?}")]
    InvalidProtocolHeader([u8; 8]),

    #[error("frame parser already failed; refusing further input")]
    Poisoned,
}
