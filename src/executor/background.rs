use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::errors::{GameLensError, GameLensResult};
use crate::perception::saliency::analyze_saliency;
use crate::perception::traits::SaliencyExecutor;
use crate::perception::types::{PixelBuffer, SaliencyResult};

const WORKER_NAME: &str = "gamelens-saliency";

type Work = Box<dyn FnOnce() -> GameLensResult<SaliencyResult> + Send>;

/// One request for the worker; the answer goes back on `reply`.
struct Job {
    work: Work,
    reply: oneshot::Sender<GameLensResult<SaliencyResult>>,
}

/// Saliency on a dedicated OS thread, so an interactive caller is never
/// blocked by the blur passes. Jobs are served in order.
pub struct BackgroundExecutor {
    tx: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    /// Jobs sent but not yet answered, including ones whose caller timed out.
    pending: Arc<AtomicUsize>,
    timeout: Duration,
}

impl BackgroundExecutor {
    /// Start the worker thread. Fails only if the OS refuses the thread.
    pub fn spawn(timeout: Duration) -> GameLensResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = pending.clone();
        let worker = std::thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || {
                while let Some(Job { work, reply }) = rx.blocking_recv() {
                    let outcome = std::panic::catch_unwind(AssertUnwindSafe(work));
                    let result = outcome.unwrap_or_else(|_| {
                        Err(GameLensError::Executor("saliency worker panicked".into()))
                    });
                    worker_pending.fetch_sub(1, Ordering::AcqRel);
                    // The caller may have timed out and gone away.
                    let _ = reply.send(result);
                }
                tracing::debug!("saliency worker exiting");
            })
            .map_err(|e| GameLensError::Executor(format!("failed to spawn saliency worker: {e}")))?;

        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "saliency worker started");
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            pending,
            timeout,
        })
    }

    pub fn is_running(&self) -> bool {
        self.tx.is_some()
    }

    /// Jobs the worker has not answered yet.
    pub fn in_flight(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    async fn submit(&self, work: Work) -> GameLensResult<SaliencyResult> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| GameLensError::Executor("saliency worker has been shut down".into()))?;
        let (reply, answer) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(Job { work, reply }).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(GameLensError::Executor("saliency worker is not running".into()));
        }

        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GameLensError::Executor(
                "saliency worker dropped the request".into(),
            )),
            Err(_) => Err(GameLensError::Executor(format!(
                "saliency worker timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl SaliencyExecutor for BackgroundExecutor {
    fn name(&self) -> &'static str {
        "background"
    }

    async fn analyze(&self, image: Arc<PixelBuffer>, max_dim: u32) -> GameLensResult<SaliencyResult> {
        self.submit(Box::new(move || analyze_saliency(&image, max_dim))).await
    }

    /// Close the queue. An idle worker is joined; a worker still busy with
    /// an abandoned job is detached and exits on its own when that job ends,
    /// so shutdown and `Drop` never wait on a computation.
    fn shutdown(&mut self) {
        self.tx.take();
        let Some(handle) = self.worker.take() else {
            return;
        };
        let pending = self.in_flight();
        if pending > 0 {
            tracing::debug!(pending, "detaching busy saliency worker");
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("saliency worker terminated abnormally");
        }
    }
}

impl Drop for BackgroundExecutor {
    fn drop(&mut self) {
        SaliencyExecutor::shutdown(self);
    }
}
