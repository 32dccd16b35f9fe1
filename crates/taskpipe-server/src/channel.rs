use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use nix::sys::stat::Mode;
use nix::unistd;
use taskpipe_core::{Task, WorkerId};
use taskpipe_protocol::{response_path, ProtocolError, Request, RequestCodec, Response};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to create public channel {path}: {source}")]
    Create {
        path: PathBuf,
        source: io::Error,
    },

    #[error("public channel read error: {0}")]
    Read(#[from] ProtocolError),

    #[error("response channel {path} is unreachable: {source}")]
    Unreachable {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to write response to {path}: {source}")]
    Write {
        path: PathBuf,
        source: io::Error,
    },
}

/// The well-known public FIFO every client submits requests to.
///
/// The read end is opened in read-write mode so the stream never reports
/// EOF while submitters come and go. FIFO byte streams cannot be framed
/// by concurrent readers, so all reads go through one lock.
pub struct RequestChannel {
    path: PathBuf,
    reader: Mutex<FramedRead<pipe::Receiver, RequestCodec>>,
}

impl RequestChannel {
    /// Create the FIFO backing object and open its read end. Failure here
    /// is fatal to the session.
    pub fn create(path: &Path) -> Result<Self, ChannelError> {
        unistd::mkfifo(path, Mode::from_bits_truncate(0o666)).map_err(|errno| {
            ChannelError::Create {
                path: path.to_path_buf(),
                source: errno.into(),
            }
        })?;

        let receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(path)
            .map_err(|source| ChannelError::Create {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(RequestChannel {
            path: path.to_path_buf(),
            reader: Mutex::new(FramedRead::new(receiver, RequestCodec)),
        })
    }

    /// Read one request record. `Ok(None)` means no complete record is
    /// available right now; callers back off and retry.
    pub async fn recv(&self) -> Result<Option<Request>, ChannelError> {
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(Ok(request)) => Ok(Some(request)),
            Some(Err(err)) => Err(ChannelError::Read(err)),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the FIFO from the filesystem namespace. Removal failure is
    /// logged, not fatal.
    pub fn remove(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(
                "failed to remove public channel {}: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Write end of one client's private FIFO.
///
/// Opened on demand and owned by a single pool worker while in use; the
/// open fails if the client is not listening. Status lines are far below
/// `PIPE_BUF`, so writes from different workers never interleave.
pub struct ResponseChannel {
    path: PathBuf,
    sender: pipe::Sender,
}

impl ResponseChannel {
    pub fn open(public: &Path, task: &Task) -> Result<Self, ChannelError> {
        let path = response_path(public, task.client);
        let sender = pipe::OpenOptions::new().open_sender(&path).map_err(|source| {
            ChannelError::Unreachable {
                path: path.clone(),
                source,
            }
        })?;
        Ok(ResponseChannel { path, sender })
    }

    pub async fn send(&mut self, response: &Response) -> Result<(), ChannelError> {
        let line = format!("{response}\n");
        self.sender
            .write_all(line.as_bytes())
            .await
            .map_err(|source| ChannelError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Cap on one status delivery. A client that stops draining its channel
/// must not wedge a pool worker past the session teardown.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Status emitter for one pool worker: stamps events with the server pid
/// and the worker's id, then delivers them over the submitter's private
/// channel.
pub struct StatusReporter {
    public: PathBuf,
    server_pid: i32,
    worker_id: WorkerId,
}

impl StatusReporter {
    pub fn new(public: PathBuf, worker_id: WorkerId) -> Self {
        StatusReporter {
            public,
            server_pid: std::process::id() as i32,
            worker_id,
        }
    }

    /// Send the task's current status to its submitter.
    pub async fn emit(&self, task: &Task) -> Result<(), ChannelError> {
        let response = Response::new(
            Utc::now().timestamp(),
            task.request_id,
            task.workload,
            self.server_pid,
            self.worker_id,
            task.result,
            task.status,
        );
        let mut channel = ResponseChannel::open(&self.public, task)?;
        match tokio::time::timeout(DELIVERY_TIMEOUT, channel.send(&response)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Write {
                path: channel.path,
                source: io::Error::new(io::ErrorKind::TimedOut, "client not draining its channel"),
            }),
        }
    }
}
