use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::channel::RequestChannel;
use crate::config::ServerConfig;
use crate::consumer::ConsumerPool;
use crate::lifecycle::LifecycleController;
use crate::producer::ProducerPool;
use crate::queue::BoundedTaskQueue;
use crate::session::Session;

/// One bounded server session: owns the configuration and the session
/// state, wires the channel, queue, and pools together, and tears
/// everything down when the budget expires.
pub struct Server {
    config: ServerConfig,
    session: Arc<Session>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let session = Arc::new(Session::new(config.budget));
        Server { config, session }
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    /// Run the session to completion. Only failure to establish the
    /// public channel is fatal; everything after that is task-local.
    pub async fn run(&self) -> anyhow::Result<()> {
        let channel = Arc::new(
            RequestChannel::create(&self.config.channel_path)
                .context("cannot establish the public channel")?,
        );
        info!(
            path = %self.config.channel_path.display(),
            capacity = self.config.capacity,
            producers = self.config.producers,
            consumers = self.config.consumers,
            "public channel ready"
        );

        let queue = Arc::new(BoundedTaskQueue::new(
            self.config.capacity,
            self.session.shutdown_token(),
        ));

        let producers = ProducerPool::spawn(
            self.config.producers,
            channel.clone(),
            queue.clone(),
            self.session.clone(),
        );
        let consumers = ConsumerPool::spawn(
            self.config.consumers,
            self.config.channel_path.clone(),
            queue.clone(),
            self.session.clone(),
            self.config.workload_unit,
        );

        LifecycleController::new(self.session.clone()).run().await;

        // Intake stops first; consumers then drain whatever is queued
        producers.join().await;
        consumers.join().await;

        if self.session.mark_stopped() {
            channel.remove();
        }
        self.session.stats().log_summary();
        info!("session stopped");

        Ok(())
    }
}
