//! Main-thread executor queue.
//!
//! Exactly two execution contexts exist: the async I/O context
//! (transports and dispatcher) and the host's single cooperative tick
//! loop, which owns all mutable host state. The only channel between
//! them is this bounded queue, producer side on the I/O context and
//! consumer side on the tick loop, plus a oneshot responder per task
//! carrying the result back.
//!
//! Enqueue never blocks: a full queue fails immediately so the network
//! layer stays responsive. The tick loop drains a bounded number of
//! tasks per tick so a burst of tool calls cannot starve the UI.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::BridgeError;
use crate::host::HostState;

/// Work crossing into the tick loop: a closure over host state.
pub type HostJob = Box<dyn FnOnce(&mut HostState) -> Result<Value, BridgeError> + Send + 'static>;

/// Terminal channel back to the dispatcher.
pub type TaskResponder = oneshot::Sender<Result<Value, BridgeError>>;

/// Lifecycle of a task. `Cancelled` while Executing only suppresses
/// the response; a running host call cannot be preempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

/// One unit of work queued for the host tick loop.
///
/// Owned exclusively by the queue until drained; ownership transfers
/// to the tick loop during execution.
pub struct ExecutionTask {
    pub correlation_id: Uuid,
    pub session_id: Uuid,
    pub tool_name: String,
    pub enqueued_at: Instant,
    job: HostJob,
    responder: TaskResponder,
}

impl ExecutionTask {
    pub fn new(
        session_id: Uuid,
        tool_name: impl Into<String>,
        job: HostJob,
        responder: TaskResponder,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            session_id,
            tool_name: tool_name.into(),
            enqueued_at: Instant::now(),
            job,
            responder,
        }
    }
}

/// Millisecond-resolution liveness signal updated once per tick.
#[derive(Clone, Default)]
pub struct Heartbeat(Arc<AtomicU64>);

impl Heartbeat {
    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn beat(&self) {
        self.0.store(Self::now_millis(), Ordering::Relaxed);
    }

    /// Time since the last tick. `Duration::MAX` before the first one.
    pub fn age(&self) -> Duration {
        let last = self.0.load(Ordering::Relaxed);
        if last == 0 {
            return Duration::MAX;
        }
        Duration::from_millis(Self::now_millis().saturating_sub(last))
    }

    pub fn is_alive(&self, threshold: Duration) -> bool {
        self.age() <= threshold
    }
}

type CancelSet = Arc<Mutex<HashSet<Uuid>>>;

/// Producer side, held by the dispatcher on the I/O context.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<ExecutionTask>,
    cancelled: CancelSet,
}

impl ExecutorHandle {
    /// Enqueue a task. Fails immediately on a full queue; never blocks.
    pub fn submit(&self, task: ExecutionTask) -> Result<(), BridgeError> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                warn!(
                    tool = %task.tool_name,
                    session = %task.session_id,
                    "executor queue full, rejecting task"
                );
                Err(BridgeError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                Err(BridgeError::Execution("host tick loop is not running".into()))
            }
        }
    }

    /// Mark a session's outstanding tasks for cancellation. Tasks still
    /// Queued are dequeued without execution; a task already Executing
    /// completes internally with its response suppressed. The mark is
    /// pruned by the tick loop once the queue drains.
    pub fn cancel_session(&self, session_id: Uuid) {
        self.cancelled.lock().unwrap().insert(session_id);
    }
}

/// What one tick did; `popped()` is bounded by the per-tick budget.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub executed: usize,
    pub cancelled: usize,
}

impl TickReport {
    pub fn popped(&self) -> usize {
        self.executed + self.cancelled
    }
}

/// Consumer side. Lives on the host's single execution context.
pub struct HostRuntime {
    rx: mpsc::Receiver<ExecutionTask>,
    budget: usize,
    cancelled: CancelSet,
    heartbeat: Heartbeat,
}

/// Build the bounded queue pair from settings.
pub fn queue(settings: &Settings) -> (ExecutorHandle, HostRuntime) {
    let (tx, rx) = mpsc::channel(settings.queue_depth.max(1));
    let cancelled: CancelSet = Arc::default();
    let handle = ExecutorHandle {
        tx,
        cancelled: Arc::clone(&cancelled),
    };
    let runtime = HostRuntime {
        rx,
        budget: settings.max_tasks_per_tick.max(1),
        cancelled,
        heartbeat: Heartbeat::default(),
    };
    (handle, runtime)
}

impl HostRuntime {
    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat.clone()
    }

    /// One cooperative tick: pop up to the per-tick budget of tasks in
    /// global FIFO order and execute them against host state. Remaining
    /// tasks stay queued for the next tick.
    pub fn tick(&mut self, host: &mut HostState) -> TickReport {
        self.heartbeat.beat();
        let mut report = TickReport::default();

        while report.popped() < self.budget {
            let task = match self.rx.try_recv() {
                Ok(task) => task,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    // A closed session cannot enqueue again, so its
                    // cancellation mark only has to outlive its queued
                    // tasks. An empty queue means none are left for
                    // any session and the whole set can go.
                    self.cancelled.lock().unwrap().clear();
                    break;
                }
            };

            if self.is_cancelled(task.session_id) {
                debug!(
                    correlation = %task.correlation_id,
                    tool = %task.tool_name,
                    "task cancelled before execution"
                );
                // Dropping the responder is the suppression: the task
                // produces no response at all.
                report.cancelled += 1;
                continue;
            }

            self.execute(task, host);
            report.executed += 1;
        }

        report
    }

    /// Drive ticks on a dedicated thread until shutdown. Production
    /// hosts call `tick` from their own loop instead.
    pub fn run(mut self, mut host: HostState, interval: Duration, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.tick(&mut host);
            std::thread::sleep(interval);
        }
        debug!("host tick loop stopped");
    }

    fn is_cancelled(&self, session_id: Uuid) -> bool {
        self.cancelled.lock().unwrap().contains(&session_id)
    }

    fn execute(&self, task: ExecutionTask, host: &mut HostState) {
        let queued_for = task.enqueued_at.elapsed();
        let ExecutionTask {
            correlation_id,
            tool_name,
            job,
            responder,
            ..
        } = task;

        debug!(
            correlation = %correlation_id,
            tool = %tool_name,
            queued_ms = queued_for.as_millis() as u64,
            "executing task"
        );

        // A handler failure must never take down the tick loop; panics
        // are folded into the same ExecutionError path as Err returns.
        let outcome = match catch_unwind(AssertUnwindSafe(|| job(host))) {
            Ok(result) => result,
            Err(panic) => Err(BridgeError::Execution(panic_message(panic.as_ref()))),
        };

        let state = match &outcome {
            Ok(_) => TaskState::Completed,
            Err(_) => TaskState::Failed,
        };
        debug!(correlation = %correlation_id, ?state, "task finished");

        if responder.send(outcome).is_err() {
            // Requester timed out or disconnected mid-flight.
            debug!(correlation = %correlation_id, "response suppressed, requester gone");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
