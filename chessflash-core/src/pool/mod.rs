//! The worker pool: a bounded queue of boxed jobs drained by a fixed number
//! of tokio tasks, with cooperative cancellation and panic isolation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::PoolError;
use crate::job::{BoxedJob, JobScope};

type Receiver = Arc<AsyncMutex<mpsc::Receiver<BoxedJob>>>;

struct Channel {
    tx: mpsc::Sender<BoxedJob>,
    rx: Receiver,
}

struct Generation {
    token: CancellationToken,
}

/// The pool's lifecycle state. `Stopped` means no workers are live and
/// submit must be rejected; `Running` carries the cancellation token shared
/// by the current generation of workers.
struct PoolState {
    channel: Option<Channel>,
    generation: Option<Generation>,
}

pub struct WorkerPool {
    worker_count: usize,
    queue_capacity: usize,
    state: std::sync::Mutex<PoolState>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        WorkerPool {
            worker_count,
            queue_capacity,
            state: std::sync::Mutex::new(PoolState { channel: None, generation: None }),
            workers: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().generation.is_some()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Current number of jobs sitting in the queue, not yet picked up by a worker.
    pub fn queue_size(&self) -> usize {
        let state = self.state.lock().unwrap();
        match &state.channel {
            Some(channel) => channel.tx.max_capacity() - channel.tx.capacity(),
            None => 0,
        }
    }

    /// Starts `worker_count` workers against a fresh or existing queue.
    /// A no-op if the pool already has live workers.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        let mut state = self.state.lock().unwrap();
        if state.generation.is_some() {
            return;
        }
        if state.channel.is_none() {
            let (tx, rx) = mpsc::channel(self.queue_capacity.max(1));
            state.channel = Some(Channel { tx, rx: Arc::new(AsyncMutex::new(rx)) });
        }
        let token = CancellationToken::new();
        state.generation = Some(Generation { token: token.clone() });
        let rx = state.channel.as_ref().unwrap().rx.clone();
        drop(state);

        for id in 0..self.worker_count {
            let rx = rx.clone();
            let token = token.clone();
            workers.push(tokio::spawn(worker_loop(id, rx, token)));
        }
    }

    /// Submits a job without blocking. Rejects with `Stopped` when the pool
    /// has no live workers, `QueueFull` when the queue is at capacity.
    pub fn submit(&self, job: BoxedJob) -> Result<(), PoolError> {
        let state = self.state.lock().unwrap();
        if state.generation.is_none() {
            return Err(PoolError::Stopped);
        }
        let Some(channel) = &state.channel else {
            return Err(PoolError::Stopped);
        };
        match channel.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(PoolError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PoolError::Stopped),
        }
    }

    /// Cancels the current generation's scope and marks the pool stopped.
    /// Does not wait for workers to exit and does not touch queued jobs;
    /// pair with `restart` to resume, or `clear_queue` to drop the backlog
    /// first.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(generation) = state.generation.take() {
            generation.token.cancel();
        }
    }

    /// Drops every job currently sitting in the queue. Safe to call at any
    /// time; typically used after `cancel` and before `restart`.
    pub async fn clear_queue(&self) {
        let rx = {
            let state = self.state.lock().unwrap();
            state.channel.as_ref().map(|c| c.rx.clone())
        };
        if let Some(rx) = rx {
            let mut rx = rx.lock().await;
            while rx.try_recv().is_ok() {}
        }
    }

    /// Cancels the current scope, waits for every worker to exit, then
    /// starts a fresh generation against the same queue. Pending jobs
    /// survive the restart unless `clear_queue` was called first.
    pub async fn restart(&self) {
        self.cancel();
        self.join_workers().await;
        self.start().await;
    }

    /// Cancels, closes the queue so idle workers wake immediately, and waits
    /// for every worker to exit. The pool cannot be resumed after this; a
    /// later `start` call builds an entirely new queue.
    pub async fn stop(&self) {
        self.cancel();
        {
            let mut state = self.state.lock().unwrap();
            state.channel = None;
        }
        self.join_workers().await;
    }

    async fn join_workers(&self) {
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(id: usize, rx: Receiver, token: CancellationToken) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        let span = tracing::info_span!("job", worker = id, name = job.name());
        let scope = JobScope::new(token.child_token(), span.clone());
        let outcome = AssertUnwindSafe(job.run(&scope)).catch_unwind().instrument(span).await;
        match outcome {
            Ok(Ok(())) => tracing::debug!("job completed"),
            Ok(Err(err)) => tracing::error!(error = %err, "job failed"),
            Err(panic) => {
                let message = panic_message(&panic);
                tracing::error!(panic = %message, "job panicked");
            }
        }
    }
    tracing::debug!(worker = id, "worker exiting");
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingJob {
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl crate::job::Job for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }
        async fn run(&self, _scope: &JobScope) -> Result<(), JobError> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SleepingJob {
        millis: u64,
    }

    #[async_trait]
    impl crate::job::Job for SleepingJob {
        fn name(&self) -> &str {
            "sleeping"
        }
        async fn run(&self, _scope: &JobScope) -> Result<(), JobError> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            Ok(())
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl crate::job::Job for PanickingJob {
        fn name(&self) -> &str {
            "panicking"
        }
        async fn run(&self, _scope: &JobScope) -> Result<(), JobError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn submit_rejects_when_stopped() {
        let pool = WorkerPool::new(2, 4);
        let err = pool.submit(Box::new(PanickingJob)).unwrap_err();
        assert_eq!(err, PoolError::Stopped);
    }

    #[tokio::test]
    async fn submit_rejects_when_queue_full() {
        let pool = WorkerPool::new(0, 1);
        pool.start().await;
        pool.submit(Box::new(PanickingJob)).unwrap();
        let err = pool.submit(Box::new(PanickingJob)).unwrap_err();
        assert_eq!(err, PoolError::QueueFull);
    }

    #[tokio::test]
    async fn jobs_run_to_completion() {
        let pool = WorkerPool::new(2, 8);
        pool.start().await;
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            pool.submit(Box::new(CountingJob { counter: counter.clone() })).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn panics_are_isolated_and_worker_keeps_running() {
        let pool = WorkerPool::new(1, 8);
        pool.start().await;
        pool.submit(Box::new(PanickingJob)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(Box::new(CountingJob { counter: counter.clone() })).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn restart_preserves_pending_backlog() {
        let pool = WorkerPool::new(1, 8);
        pool.start().await;
        pool.submit(Box::new(SleepingJob { millis: 50 })).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(Box::new(CountingJob { counter: counter.clone() })).unwrap();
        pool.cancel();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(pool.queue_size(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        pool.restart().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_queue_discards_backlog() {
        let pool = WorkerPool::new(0, 8);
        pool.start().await;
        pool.submit(Box::new(PanickingJob)).unwrap();
        pool.submit(Box::new(PanickingJob)).unwrap();
        pool.cancel();
        pool.clear_queue().await;
        pool.restart().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.queue_size(), 0);
    }

    #[tokio::test]
    async fn stop_rejects_further_submits() {
        let pool = WorkerPool::new(1, 8);
        pool.start().await;
        pool.stop().await;
        let err = pool.submit(Box::new(PanickingJob)).unwrap_err();
        assert_eq!(err, PoolError::Stopped);
        assert!(!pool.is_running());
    }
}
