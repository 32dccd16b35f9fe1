mod request;
mod response;

pub use request::{Request, RequestCodec, REQUEST_WIRE_SIZE};
pub use response::{response_path, Response};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("truncated request record: {0} trailing bytes")]
    TruncatedRecord(usize),

    #[error("invalid status token: {0:?}")]
    InvalidStatus(String),

    #[error("malformed response line: {0:?}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
