use crate::domain::errors::AnalyticsError;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-task cancellation handle. Cloning shares the underlying flag, so a
/// caller can keep a clone and cancel a task after submission.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type TaskPayload<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T, AnalyticsError> + Send>;

/// A unit of work for the pool. The payload receives the task's
/// cancellation token and is expected to poll it during long computations.
pub struct Task<T> {
    pub id: Uuid,
    pub priority: u8,
    token: CancellationToken,
    timeout: Option<Duration>,
    payload: TaskPayload<T>,
}

impl<T> Task<T> {
    pub fn new<F>(payload: F) -> Self
    where
        F: FnOnce(&CancellationToken) -> Result<T, AnalyticsError> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            priority: 0,
            token: CancellationToken::new(),
            timeout: None,
            payload: Box::new(payload),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Deadline relative to submission time; an expired task reports a
    /// cancellation error instead of running.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Handle for cancelling this task after submission.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Outcome of one task. Exactly one of `output`/`error` is set.
#[derive(Debug)]
pub struct TaskResult<T> {
    pub id: Uuid,
    pub output: Option<T>,
    pub error: Option<AnalyticsError>,
    pub duration: Duration,
    pub worker_id: usize,
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Stopped,
    Running,
    Draining,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1000,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Scheduler statistics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub completed: u64,
    pub in_flight: u64,
    pub avg_processing_ms: f64,
    pub throughput_per_sec: f64,
}

struct QueuedTask<T> {
    id: Uuid,
    token: CancellationToken,
    deadline: Option<Instant>,
    payload: TaskPayload<T>,
}

#[derive(Default)]
struct Counters {
    submitted: u64,
    completed: u64,
    total_processing: Duration,
}

struct Shared {
    counters: Mutex<Counters>,
    all_done: Condvar,
    force_stop: AtomicBool,
}

/// Fixed-size pool of worker threads over a bounded submission queue.
///
/// Submission fails fast once the queue is full; that rejection is the
/// system's only backpressure mechanism. Results land on a bounded channel
/// that consumers must drain, otherwise workers stall on the send.
pub struct WorkerPool<T> {
    config: WorkerPoolConfig,
    state: Mutex<PoolState>,
    task_tx: Mutex<Option<Sender<QueuedTask<T>>>>,
    task_rx: Receiver<QueuedTask<T>>,
    result_rx: Receiver<TaskResult<T>>,
    result_tx: Sender<TaskResult<T>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
    started_at: Mutex<Option<Instant>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (task_tx, task_rx) = bounded(config.queue_capacity);
        // Headroom for in-flight tasks so a worker finishing its current
        // task can always hand off before consumers catch up.
        let (result_tx, result_rx) = bounded(config.queue_capacity + config.workers);

        Self {
            config,
            state: Mutex::new(PoolState::Stopped),
            task_tx: Mutex::new(Some(task_tx)),
            task_rx,
            result_rx,
            result_tx,
            handles: Mutex::new(Vec::new()),
            shared: Arc::new(Shared {
                counters: Mutex::new(Counters::default()),
                all_done: Condvar::new(),
                force_stop: AtomicBool::new(false),
            }),
            started_at: Mutex::new(None),
        }
    }

    /// Transitions Stopped -> Running and spawns the worker threads.
    pub fn start(&self) -> Result<(), AnalyticsError> {
        let mut state = lock(&self.state);
        if *state != PoolState::Stopped {
            return Err(AnalyticsError::validation(format!(
                "Worker pool already started (state {:?})",
                *state
            )));
        }

        let mut handles = lock(&self.handles);
        for worker_id in 0..self.config.workers {
            let task_rx = self.task_rx.clone();
            let result_tx = self.result_tx.clone();
            let shared = self.shared.clone();

            let handle = std::thread::Builder::new()
                .name(format!("analytics-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, task_rx, result_tx, shared))
                .map_err(|e| {
                    AnalyticsError::computation(format!("Failed to spawn worker: {}", e))
                })?;
            handles.push(handle);
        }

        *lock(&self.started_at) = Some(Instant::now());
        *state = PoolState::Running;
        info!(
            "WorkerPool: started {} workers, queue capacity {}",
            self.config.workers, self.config.queue_capacity
        );
        Ok(())
    }

    pub fn state(&self) -> PoolState {
        *lock(&self.state)
    }

    /// Enqueues a task. Never blocks: a full queue returns a capacity
    /// error immediately and a pool past shutdown returns a shutdown
    /// error.
    pub fn submit(&self, task: Task<T>) -> Result<Uuid, AnalyticsError> {
        {
            let state = lock(&self.state);
            match *state {
                PoolState::Running => {}
                PoolState::Draining | PoolState::Stopped => {
                    return Err(AnalyticsError::Shutdown {
                        reason: format!("pool is {:?}, not accepting tasks", *state),
                    });
                }
            }
        }

        let tx_guard = lock(&self.task_tx);
        let tx = tx_guard.as_ref().ok_or_else(|| AnalyticsError::Shutdown {
            reason: "submission queue closed".to_string(),
        })?;

        let id = task.id;
        let queued = QueuedTask {
            id,
            token: task.token,
            deadline: task.timeout.map(|t| Instant::now() + t),
            payload: task.payload,
        };

        match tx.try_send(queued) {
            Ok(()) => {
                let mut counters = lock(&self.shared.counters);
                counters.submitted += 1;
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(AnalyticsError::Capacity {
                capacity: self.config.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(AnalyticsError::Shutdown {
                reason: "submission queue closed".to_string(),
            }),
        }
    }

    /// The bounded result channel; consumers must drain it.
    pub fn results(&self) -> &Receiver<TaskResult<T>> {
        &self.result_rx
    }

    /// Receives the next result, waiting up to `timeout`.
    pub fn next_result(&self, timeout: Duration) -> Option<TaskResult<T>> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Blocks until every submitted task has a result or the timeout
    /// elapses. Returns true when all work is accounted for.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counters = lock(&self.shared.counters);

        while counters.completed < counters.submitted {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(r) if !r.is_zero() => r,
                _ => return false,
            };
            let (guard, wait_result) = self
                .shared
                .all_done
                .wait_timeout(counters, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            counters = guard;
            if wait_result.timed_out() && counters.completed < counters.submitted {
                return false;
            }
        }
        true
    }

    /// Cooperative shutdown: rejects new submissions immediately, gives
    /// in-flight tasks the configured grace period, then force-stops and
    /// reports the remainder as shutdown failures.
    pub fn shutdown(&self) {
        {
            let mut state = lock(&self.state);
            if *state != PoolState::Running {
                return;
            }
            *state = PoolState::Draining;
        }
        info!(
            "WorkerPool: draining, grace period {:?}",
            self.config.shutdown_grace
        );

        // Close the submission queue; workers exit once it drains.
        lock(&self.task_tx).take();

        if !self.wait(self.config.shutdown_grace) {
            warn!("WorkerPool: grace period elapsed, force-stopping remaining tasks");
            self.shared.force_stop.store(true, Ordering::SeqCst);
            // Queued tasks are still drained by the workers, now reported
            // as shutdown errors rather than executed.
            self.wait(self.config.shutdown_grace);
        }

        let mut handles = lock(&self.handles);
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                warn!("WorkerPool: worker panicked during shutdown");
            }
        }

        *lock(&self.state) = PoolState::Stopped;
        info!("WorkerPool: stopped");
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = lock(&self.shared.counters);
        let elapsed = lock(&self.started_at)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        SchedulerStats {
            submitted: counters.submitted,
            completed: counters.completed,
            in_flight: counters.submitted - counters.completed,
            avg_processing_ms: if counters.completed > 0 {
                counters.total_processing.as_secs_f64() * 1000.0 / counters.completed as f64
            } else {
                0.0
            },
            throughput_per_sec: if elapsed > 0.0 {
                counters.completed as f64 / elapsed
            } else {
                0.0
            },
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Close the queue so detached workers exit instead of blocking on
        // recv forever.
        lock(&self.task_tx).take();
    }
}

fn worker_loop<T: Send>(
    worker_id: usize,
    task_rx: Receiver<QueuedTask<T>>,
    result_tx: Sender<TaskResult<T>>,
    shared: Arc<Shared>,
) {
    debug!("Worker {} started", worker_id);

    while let Ok(task) = task_rx.recv() {
        let started = Instant::now();

        let outcome: Result<T, AnalyticsError> = if shared.force_stop.load(Ordering::SeqCst) {
            Err(AnalyticsError::Shutdown {
                reason: "pool force-stopped before task ran".to_string(),
            })
        } else if task.token.is_cancelled() {
            Err(AnalyticsError::Cancelled {
                reason: "cancelled before execution".to_string(),
            })
        } else if task.deadline.is_some_and(|d| Instant::now() >= d) {
            Err(AnalyticsError::Cancelled {
                reason: "deadline exceeded before execution".to_string(),
            })
        } else {
            let result = (task.payload)(&task.token);
            // A payload that returned normally after its token was
            // cancelled must still surface as cancelled, never as a
            // false success.
            if task.token.is_cancelled() {
                Err(AnalyticsError::Cancelled {
                    reason: "cancelled during execution".to_string(),
                })
            } else {
                result
            }
        };

        let duration = started.elapsed();
        let (output, error) = match outcome {
            Ok(output) => (Some(output), None),
            Err(e) => (None, Some(e)),
        };

        let result = TaskResult {
            id: task.id,
            output,
            error,
            duration,
            worker_id,
        };

        // Blocks when consumers lag; that stall is the documented contract.
        if result_tx.send(result).is_err() {
            warn!("Worker {}: result channel closed, dropping result", worker_id);
        }

        let mut counters = lock(&shared.counters);
        counters.completed += 1;
        counters.total_processing += duration;
        shared.all_done.notify_all();
    }

    debug!("Worker {} exiting", worker_id);
}

fn lock<G>(mutex: &Mutex<G>) -> std::sync::MutexGuard<'_, G> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("WorkerPool: lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
