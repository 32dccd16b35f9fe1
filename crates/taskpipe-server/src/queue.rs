use std::collections::VecDeque;

use parking_lot::Mutex;
use taskpipe_core::Task;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Signal that the session deadline has passed and the queue no longer
/// accepts (or, once drained, yields) tasks. Ordinary control flow for
/// pool workers, not a fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue is shutting down")]
pub struct ShuttingDown;

/// Fixed-capacity FIFO buffer between the intake and execution pools.
///
/// All mutations happen under one lock. Waiters block on two conditions,
/// one per predicate (space available, item available); shutdown is a
/// broadcast that wakes every blocked caller so nobody deadlocks against
/// a queue that will never fill or empty again. A popped task is seen by
/// exactly one consumer.
pub struct BoundedTaskQueue {
    inner: Mutex<VecDeque<Task>>,
    capacity: usize,
    space: Notify,
    item: Notify,
    shutdown: CancellationToken,
}

impl BoundedTaskQueue {
    pub fn new(capacity: usize, shutdown: CancellationToken) -> Self {
        BoundedTaskQueue {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            space: Notify::new(),
            item: Notify::new(),
            shutdown,
        }
    }

    /// Enqueue a task, waiting for capacity if the queue is full.
    ///
    /// Once shutdown is signaled the queue stops admitting work even if
    /// space is available.
    pub async fn push(&self, task: Task) -> Result<(), ShuttingDown> {
        loop {
            // Arm the waiter before checking the predicate so a wakeup
            // issued between the check and the await is not lost.
            let space = self.space.notified();
            {
                let mut queue = self.inner.lock();
                if self.shutdown.is_cancelled() {
                    return Err(ShuttingDown);
                }
                if queue.len() < self.capacity {
                    queue.push_back(task);
                    drop(queue);
                    self.item.notify_one();
                    return Ok(());
                }
            }
            tokio::select! {
                _ = space => {}
                _ = self.shutdown.cancelled() => return Err(ShuttingDown),
            }
        }
    }

    /// Dequeue the oldest task, waiting for one if the queue is empty.
    ///
    /// During shutdown, already-queued tasks are still handed out until
    /// the queue is empty; only then does the call fail.
    pub async fn pop(&self) -> Result<Task, ShuttingDown> {
        loop {
            let item = self.item.notified();
            {
                let mut queue = self.inner.lock();
                if let Some(task) = queue.pop_front() {
                    drop(queue);
                    self.space.notify_one();
                    return Ok(task);
                }
                if self.shutdown.is_cancelled() {
                    return Err(ShuttingDown);
                }
            }
            tokio::select! {
                _ = item => {}
                // Re-check under the lock: the queue may still hold tasks
                // that have to be drained before reporting shutdown.
                _ = self.shutdown.cancelled() => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;
    use taskpipe_core::ClientId;

    fn task(request_id: i32) -> Task {
        Task::new(request_id, ClientId::new(100, 1), 1)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = BoundedTaskQueue::new(3, CancellationToken::new());

        for id in 1..=3 {
            queue.push(task(id)).await.unwrap();
        }
        assert_eq!(queue.len(), 3);

        for id in 1..=3 {
            assert_eq!(queue.pop().await.unwrap().request_id, id);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_blocks_at_capacity() {
        let queue = Arc::new(BoundedTaskQueue::new(1, CancellationToken::new()));
        queue.push(task(1)).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(task(2)).await })
        };

        // The second push has nowhere to go yet
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());
        assert_eq!(queue.len(), 1);

        // Freeing capacity unblocks it
        assert_eq!(queue.pop().await.unwrap().request_id, 1);
        blocked.await.unwrap().unwrap();
        assert_eq!(queue.pop().await.unwrap().request_id, 2);
    }

    #[tokio::test]
    async fn test_shutdown_wakes_blocked_pop() {
        let token = CancellationToken::new();
        let queue = Arc::new(BoundedTaskQueue::new(1, token.clone()));

        let blocked = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        assert_eq!(blocked.await.unwrap(), Err(ShuttingDown));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_push_with_space() {
        let token = CancellationToken::new();
        let queue = BoundedTaskQueue::new(4, token.clone());

        token.cancel();
        assert_eq!(queue.push(task(1)).await, Err(ShuttingDown));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_tasks() {
        let token = CancellationToken::new();
        let queue = BoundedTaskQueue::new(2, token.clone());

        queue.push(task(1)).await.unwrap();
        queue.push(task(2)).await.unwrap();
        token.cancel();

        assert_eq!(queue.pop().await.unwrap().request_id, 1);
        assert_eq!(queue.pop().await.unwrap().request_id, 2);
        assert_eq!(queue.pop().await, Err(ShuttingDown));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Under randomized pool sizes, the queue never holds more than
        /// `capacity` tasks and every pushed task is popped exactly once.
        #[test]
        fn prop_bounded_exactly_once_delivery(
            producers in 1usize..4,
            consumers in 1usize..4,
            capacity in 1usize..4,
            per_producer in 1i32..25,
        ) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async move {
                let token = CancellationToken::new();
                let queue = Arc::new(BoundedTaskQueue::new(capacity, token.clone()));
                let delivered = Arc::new(Mutex::new(Vec::new()));

                let pushers: Vec<_> = (0..producers)
                    .map(|p| {
                        let queue = queue.clone();
                        tokio::spawn(async move {
                            for k in 0..per_producer {
                                let id = p as i32 * per_producer + k;
                                queue.push(task(id)).await.unwrap();
                                assert!(queue.len() <= queue.capacity());
                            }
                        })
                    })
                    .collect();

                let poppers: Vec<_> = (0..consumers)
                    .map(|_| {
                        let queue = queue.clone();
                        let delivered = delivered.clone();
                        tokio::spawn(async move {
                            while let Ok(popped) = queue.pop().await {
                                assert!(queue.len() <= queue.capacity());
                                delivered.lock().push(popped.request_id);
                            }
                        })
                    })
                    .collect();

                for pusher in pushers {
                    pusher.await.unwrap();
                }
                token.cancel();
                for popper in poppers {
                    popper.await.unwrap();
                }

                let mut seen = delivered.lock().clone();
                seen.sort_unstable();
                let expected: Vec<i32> = (0..producers as i32 * per_producer).collect();
                assert_eq!(seen, expected);
            });
        }
    }
}
