use thiserror::Error;

/// Errors raised while encoding or decoding serialized values and snapshots.
#[derive(Debug, Error)]
pub enum SerializerError {
    /// The caller passed something that cannot be encoded.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading or writing the underlying stream failed, including truncated input.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The bytes were read completely but do not describe a valid value.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("unsupported snapshot version {found} (current is {current})")]
    UnsupportedVersion { found: i32, current: i32 },
}
