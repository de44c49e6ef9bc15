//! Dedicated worker threads for witness solving

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

use super::backend::ProvingBackend;
use super::kind::ProofTask;

const EXITED_WITHOUT_RESULT: &str = "worker exited without posting a result";

/// Outcome of racing two completion signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Result(T),
    Error(E),
}

/// Resolve to whichever future completes first
///
/// The result side is polled first, so a result and an error that are both
/// ready settle as the result. The losing future is dropped unpolled.
pub async fn first_of<T, E, R, F>(result: R, error: F) -> Settled<T, E>
where
    R: Future<Output = T>,
    F: Future<Output = E>,
{
    tokio::select! {
        biased;
        value = result => Settled::Result(value),
        err = error => Settled::Error(err),
    }
}

/// Message posted into a worker
pub struct WorkerRequest<R> {
    pub representation: R,
    pub input: ProofTask,
}

/// Single-use handle to a worker thread
///
/// Consumed by [`WorkerHandle::settle`]; the thread itself is never joined.
pub struct WorkerHandle<B: ProvingBackend> {
    name: String,
    inbox: mpsc::Sender<WorkerRequest<B::Representation>>,
    result: oneshot::Receiver<B::Witness>,
    error: oneshot::Receiver<String>,
}

impl<B: ProvingBackend> WorkerHandle<B> {
    /// Start a worker thread waiting for its one request
    pub fn spawn(backend: Arc<B>, name: String) -> Result<Self> {
        let (inbox, requests) = mpsc::channel::<WorkerRequest<B::Representation>>();
        let (result_tx, result) = oneshot::channel();
        let (error_tx, error) = oneshot::channel();

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let request = match requests.recv() {
                    Ok(request) => request,
                    // Handle dropped before posting
                    Err(_) => return,
                };

                let solved = catch_unwind(AssertUnwindSafe(|| {
                    backend.solve_witness(&request.representation, &request.input)
                }));

                match solved {
                    Ok(Ok(witness)) => {
                        let _ = result_tx.send(witness);
                    }
                    Ok(Err(e)) => {
                        let _ = error_tx.send(format!("{:#}", e));
                    }
                    Err(panic) => {
                        let _ = error_tx.send(panic_message(panic.as_ref()));
                    }
                }
            })
            .map_err(|e| Error::ProofExecution(format!("Failed to spawn worker: {}", e)))?;

        Ok(Self {
            name,
            inbox,
            result,
            error,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self, request: WorkerRequest<B::Representation>) -> Result<()> {
        self.inbox
            .send(request)
            .map_err(|_| Error::ProofExecution(EXITED_WITHOUT_RESULT.to_string()))
    }

    /// Wait for the first signal from the worker
    pub async fn settle(self) -> Settled<B::Witness, String> {
        let Self {
            mut result, error, ..
        } = self;

        let settled = first_of(
            async {
                match (&mut result).await {
                    Ok(witness) => witness,
                    // Sender dropped without a result: only the error side can settle now
                    Err(_) => std::future::pending().await,
                }
            },
            async move { error.await.ok() },
        )
        .await;

        match settled {
            Settled::Result(witness) => Settled::Result(witness),
            Settled::Error(Some(message)) => Settled::Error(message),
            // The error sender also drops when a worker exits after posting its
            // witness, so a closed error side only settles once the result is gone too
            Settled::Error(None) => match result.try_recv() {
                Ok(witness) => Settled::Result(witness),
                Err(_) => Settled::Error(EXITED_WITHOUT_RESULT.to_string()),
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}

/// Runs each proof task on its own fresh worker
pub struct ProofWorkerChannel<B: ProvingBackend> {
    backend: Arc<B>,
    spawned: AtomicU64,
}

impl<B: ProvingBackend> ProofWorkerChannel<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            spawned: AtomicU64::new(0),
        }
    }

    /// Workers started so far
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Solve the witness for `task` on a dedicated worker
    pub async fn run(&self, representation: B::Representation, task: ProofTask) -> Result<B::Witness> {
        let seq = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("proof-worker-{}-{}", task.kind(), seq);

        let worker = WorkerHandle::spawn(Arc::clone(&self.backend), name)?;
        debug!("Spawned {}", worker.name());

        worker.post(WorkerRequest {
            representation,
            input: task,
        })?;

        let name = worker.name().to_string();
        match worker.settle().await {
            Settled::Result(witness) => {
                debug!("{} posted a witness", name);
                Ok(witness)
            }
            Settled::Error(message) => {
                if message == EXITED_WITHOUT_RESULT {
                    warn!("{} exited without a result", name);
                } else {
                    error!("{} failed: {}", name, message);
                }
                Err(Error::ProofExecution(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::testing::{board_task, MockBackend, WitnessBehavior};
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_of_prefers_ready_result() {
        let settled: Settled<u8, &str> = first_of(async { 1 }, async { "boom" }).await;
        assert_eq!(settled, Settled::Result(1));
    }

    #[tokio::test]
    async fn test_first_of_takes_earlier_error() {
        let result = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            1u8
        };
        let settled = first_of(result, async { "boom" }).await;
        assert_eq!(settled, Settled::Error("boom"));
    }

    #[tokio::test]
    async fn test_first_of_takes_earlier_result() {
        let error = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            "late"
        };
        let settled = first_of(async { 7u8 }, error).await;
        assert_eq!(settled, Settled::Result(7));
    }

    #[tokio::test]
    async fn test_worker_posts_witness() {
        let channel = ProofWorkerChannel::new(Arc::new(MockBackend::new()));
        let witness = channel
            .run("repr".to_string(), board_task())
            .await
            .unwrap();
        assert!(!witness.is_empty());
        assert_eq!(channel.spawned(), 1);
    }

    #[tokio::test]
    async fn test_worker_error_surfaces_verbatim() {
        let backend = MockBackend::new().with_witness(WitnessBehavior::Fail("unsatisfied constraint"));
        let channel = ProofWorkerChannel::new(Arc::new(backend));

        match channel.run("repr".to_string(), board_task()).await {
            Err(Error::ProofExecution(message)) => assert_eq!(message, "unsatisfied constraint"),
            other => panic!("unexpected result {:?}", other.map(|w| w.len())),
        }
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_error() {
        let backend = MockBackend::new().with_witness(WitnessBehavior::Panic);
        let channel = ProofWorkerChannel::new(Arc::new(backend));

        match channel.run("repr".to_string(), board_task()).await {
            Err(Error::ProofExecution(message)) => {
                assert!(message.starts_with("worker panicked"), "{}", message)
            }
            other => panic!("unexpected result {:?}", other.map(|w| w.len())),
        }
    }

    #[tokio::test]
    async fn test_each_run_uses_a_fresh_worker() {
        let backend = Arc::new(MockBackend::new());
        let channel = ProofWorkerChannel::new(Arc::clone(&backend));

        for _ in 0..3 {
            channel.run("repr".to_string(), board_task()).await.unwrap();
        }
        assert_eq!(channel.spawned(), 3);

        let threads = backend.worker_threads();
        assert_eq!(threads.len(), 3);
        assert!(threads.iter().all(|name| name.starts_with("proof-worker-board-")));
        let mut unique = threads.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    fn detached_handle() -> (
        WorkerHandle<MockBackend>,
        oneshot::Sender<Vec<u8>>,
        oneshot::Sender<String>,
    ) {
        let (inbox, _requests) = mpsc::channel();
        let (result_tx, result) = oneshot::channel();
        let (error_tx, error) = oneshot::channel();
        let handle = WorkerHandle {
            name: "proof-worker-test".to_string(),
            inbox,
            result,
            error,
        };
        (handle, result_tx, error_tx)
    }

    #[tokio::test]
    async fn test_posted_witness_survives_closed_error_side() {
        let (handle, result_tx, error_tx) = detached_handle();
        result_tx.send(vec![1, 2, 3]).unwrap();
        drop(error_tx);

        assert_eq!(handle.settle().await, Settled::Result(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_witness_posted_while_settling() {
        let (handle, result_tx, error_tx) = detached_handle();
        let settling = tokio::spawn(handle.settle());

        tokio::time::sleep(Duration::from_millis(20)).await;
        result_tx.send(vec![9]).unwrap();
        drop(error_tx);

        assert_eq!(settling.await.unwrap(), Settled::Result(vec![9]));
    }

    #[tokio::test]
    async fn test_both_sides_closed_is_exit_error() {
        let (handle, result_tx, error_tx) = detached_handle();
        drop(result_tx);
        drop(error_tx);

        assert_eq!(
            handle.settle().await,
            Settled::Error(EXITED_WITHOUT_RESULT.to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_solves_never_misreported() {
        let channel = Arc::new(ProofWorkerChannel::new(Arc::new(MockBackend::new())));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let channel = Arc::clone(&channel);
            tasks.push(tokio::spawn(async move {
                let mut failures = 0;
                for _ in 0..250 {
                    if channel.run("repr".to_string(), board_task()).await.is_err() {
                        failures += 1;
                    }
                }
                failures
            }));
        }

        let mut failures = 0;
        for task in tasks {
            failures += task.await.unwrap();
        }
        assert_eq!(failures, 0);
        assert_eq!(channel.spawned(), 2000);
    }

    #[tokio::test]
    async fn test_outcomes_do_not_leak_between_runs() {
        let backend = MockBackend::new().with_witness(WitnessBehavior::FailFirst("first run fails"));
        let channel = ProofWorkerChannel::new(Arc::new(backend));

        assert!(channel.run("repr".to_string(), board_task()).await.is_err());
        assert!(channel.run("repr".to_string(), board_task()).await.is_ok());
    }
}
