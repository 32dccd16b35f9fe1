use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::channel::{RequestChannel, StatusReporter};
use crate::queue::BoundedTaskQueue;
use crate::session::{next_worker_id, Session};

/// Pause between attempts when the public channel has nothing to read.
const READ_BACKOFF: Duration = Duration::from_millis(50);

/// Intake pool: persistent tasks that move requests from the public
/// channel into the queue, acknowledging each receipt with `RECVD`.
pub struct ProducerPool {
    handles: Vec<JoinHandle<()>>,
}

impl ProducerPool {
    pub fn spawn(
        count: usize,
        channel: Arc<RequestChannel>,
        queue: Arc<BoundedTaskQueue>,
        session: Arc<Session>,
    ) -> Self {
        let handles = (0..count)
            .map(|_| {
                let channel = channel.clone();
                let queue = queue.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    producer_loop(channel, queue, session).await;
                })
            })
            .collect();

        ProducerPool { handles }
    }

    /// Wait for every producer to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!("producer task aborted: {err}");
            }
        }
    }
}

async fn producer_loop(
    channel: Arc<RequestChannel>,
    queue: Arc<BoundedTaskQueue>,
    session: Arc<Session>,
) {
    let worker_id = next_worker_id();
    let reporter = StatusReporter::new(channel.path().to_path_buf(), worker_id);
    let shutdown = session.shutdown_token();

    debug!(worker_id, "producer started");

    loop {
        let received = tokio::select! {
            received = channel.recv() => received,
            _ = shutdown.cancelled() => break,
        };

        match received {
            Ok(Some(request)) => {
                debug!(
                    worker_id,
                    request_id = request.request_id,
                    client = %request.client(),
                    workload = request.workload,
                    "request received"
                );

                let mut task = request.into_task();

                // Receipt ack goes out before admission so the client's
                // event stream always starts with RECVD. It is not
                // terminal: a delivery failure only costs this line.
                if let Err(err) = reporter.emit(&task).await {
                    warn!(
                        worker_id,
                        request_id = task.request_id,
                        "failed to acknowledge receipt: {err}"
                    );
                }

                if queue.push(task.clone()).await.is_err() {
                    // The deadline closed the queue under this request;
                    // close out the client's event stream and exit.
                    task.abandon();
                    session.stats().record_terminal(task.status);
                    if let Err(err) = reporter.emit(&task).await {
                        warn!(
                            worker_id,
                            request_id = task.request_id,
                            "failed to deliver terminal status: {err}"
                        );
                    }
                    break;
                }
                session.stats().record_admitted();
            }
            Ok(None) => {
                tokio::select! {
                    _ = time::sleep(READ_BACKOFF) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            Err(err) => {
                warn!(worker_id, "public channel read error: {err}");
                tokio::select! {
                    _ = time::sleep(READ_BACKOFF) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }
    }

    debug!(worker_id, "producer exiting");
}
