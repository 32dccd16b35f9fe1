mod client;

pub use client::Client;

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to create private channel {path}: {source}")]
    PrivateChannel {
        path: PathBuf,
        source: io::Error,
    },

    #[error("cannot reach public channel {path}: {source}")]
    Connect {
        path: PathBuf,
        source: io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] taskpipe_protocol::ProtocolError),

    #[error("response stream error: {0}")]
    Decode(#[from] LinesCodecError),

    #[error("response stream closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ClientError>;
