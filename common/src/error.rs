use thiserror::Error;

// Errors raised while decoding a `Serializer` implementor from a byte buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("not enough bytes left in buffer")]
    OutOfBounds,

    #[error("value out of the range accepted by this field")]
    InvalidValue,

    #[error("{0} trailing byte(s) after a complete message")]
    TrailingData(usize),
}

pub type ReaderResult<T> = Result<T, ReaderError>;
