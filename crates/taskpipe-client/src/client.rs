use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use nix::sys::stat::Mode;
use nix::unistd;
use taskpipe_core::{ClientId, RequestId};
use taskpipe_protocol::{response_path, Request, RequestCodec, Response};
use tokio::net::unix::pipe;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::debug;

use crate::{ClientError, Result};

/// One submitter identity: a write end on the server's public channel
/// plus its own private FIFO for status lines.
///
/// The private FIFO is created at connect time (so the server always
/// finds a listener) and removed again on drop. Its read end is held in
/// read-write mode, so the stream stays open between server writes.
pub struct Client {
    identity: ClientId,
    requests: FramedWrite<pipe::Sender, RequestCodec>,
    responses: FramedRead<pipe::Receiver, LinesCodec>,
    private_path: PathBuf,
    next_request: RequestId,
}

impl Client {
    /// Connect to a server's public channel. `tid` distinguishes logical
    /// submitters within one process; each gets its own private channel.
    pub async fn connect(public: &Path, tid: u64) -> Result<Self> {
        let identity = ClientId::new(std::process::id() as i32, tid);
        let private_path = response_path(public, identity);

        unistd::mkfifo(&private_path, Mode::from_bits_truncate(0o666)).map_err(|errno| {
            ClientError::PrivateChannel {
                path: private_path.clone(),
                source: errno.into(),
            }
        })?;

        let receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(&private_path)
            .map_err(|source| ClientError::PrivateChannel {
                path: private_path.clone(),
                source,
            })?;

        let sender = open_sender_with_retry(public).await?;

        debug!(client = %identity, "connected to {}", public.display());

        Ok(Client {
            identity,
            requests: FramedWrite::new(sender, RequestCodec),
            responses: FramedRead::new(receiver, LinesCodec::new()),
            private_path,
            next_request: 0,
        })
    }

    pub fn identity(&self) -> ClientId {
        self.identity
    }

    /// Submit one workload; returns the assigned request id.
    pub async fn submit(&mut self, workload: i32) -> Result<RequestId> {
        self.next_request += 1;
        let request = Request::new(self.next_request, self.identity, workload);
        self.requests.send(request).await?;
        Ok(self.next_request)
    }

    /// Next status event from the private channel. Blocks until the
    /// server reports something.
    pub async fn next_response(&mut self) -> Result<Response> {
        match self.responses.next().await {
            Some(Ok(line)) => Ok(line.parse()?),
            Some(Err(err)) => Err(err.into()),
            None => Err(ClientError::Closed),
        }
    }

    /// Read status events until the given request reaches a terminal
    /// state, returning that terminal event.
    pub async fn wait_for_terminal(&mut self, request_id: RequestId) -> Result<Response> {
        loop {
            let response = self.next_response().await?;
            if response.request_id == request_id && response.status.is_terminal() {
                return Ok(response);
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // The private channel belongs to this client; best effort removal
        let _ = std::fs::remove_file(&self.private_path);
    }
}

/// The server opens its read end right after creating the public FIFO; a
/// client racing that window sees ENXIO and retries briefly.
async fn open_sender_with_retry(public: &Path) -> Result<pipe::Sender> {
    for _ in 0..50 {
        match pipe::OpenOptions::new().open_sender(public) {
            Ok(sender) => return Ok(sender),
            Err(err) if err.raw_os_error() == Some(nix::libc::ENXIO) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(source) => {
                return Err(ClientError::Connect {
                    path: public.to_path_buf(),
                    source,
                })
            }
        }
    }
    Err(ClientError::Connect {
        path: public.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotConnected, "no server listening"),
    })
}
