//! Memory-aware job scheduling across repositories.
//!
//! A bounded-concurrency worker pool services a priority queue of
//! repository jobs; a watchdog thread samples process-wide memory and
//! closes an admission gate when usage exceeds the cap, so no new job
//! starts until usage falls back. Jobs retry on failure and land in a
//! failed table when their retries are exhausted.

pub mod memory;

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use self::memory::MemoryMonitor;

/// Default retry budget per job.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Watchdog sampling interval.
const WATCHDOG_TICK: Duration = Duration::from_secs(2);

/// Per-worker join deadline on `stop(wait = true)`.
const JOIN_DEADLINE: Duration = Duration::from_secs(60);

/// Locks a mutex, recovering the data on poisoning.
fn lock<G>(mutex: &Mutex<G>) -> std::sync::MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker thread count. Defaults to `cpus - 1`, capped at 4.
    pub max_workers: usize,
    /// Memory usage percentage that closes the admission gate.
    pub max_memory_percent: f64,
    /// Free-memory floor in megabytes.
    pub min_free_memory_mb: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().saturating_sub(1).clamp(1, 4),
            max_memory_percent: 75.0,
            min_free_memory_mb: 1_000,
        }
    }
}

/// A unit of schedulable work producing a `T`.
pub struct Job<T> {
    /// Stable identifier, unique within one scheduler.
    pub id: String,
    /// Higher runs earlier.
    pub priority: i64,
    /// Estimated resident cost in megabytes (advisory).
    pub est_memory_mb: u64,
    retries_left: u32,
    task: Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
}

struct QueuedJob<T> {
    priority: i64,
    seq: u64,
    job: Job<T>,
}

impl<T> PartialEq for QueuedJob<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<T> Eq for QueuedJob<T> {}
impl<T> PartialOrd for QueuedJob<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for QueuedJob<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap on priority; FIFO within one priority.
        self.priority
            .cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

struct Shared<T> {
    queue: Mutex<BinaryHeap<QueuedJob<T>>>,
    available: Condvar,
    completed: Mutex<HashMap<String, T>>,
    failed: Mutex<HashMap<String, String>>,
    active: Mutex<HashMap<String, Instant>>,
    should_stop: Arc<AtomicBool>,
    gate_open: AtomicBool,
    seq: AtomicU64,
    in_flight: AtomicU64,
}

/// Priority worker pool with memory admission control.
pub struct Scheduler<T> {
    shared: Arc<Shared<T>>,
    config: SchedulerConfig,
    workers: Vec<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Creates a stopped scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(BinaryHeap::new()),
                available: Condvar::new(),
                completed: Mutex::new(HashMap::new()),
                failed: Mutex::new(HashMap::new()),
                active: Mutex::new(HashMap::new()),
                should_stop: Arc::new(AtomicBool::new(false)),
                gate_open: AtomicBool::new(true),
                seq: AtomicU64::new(0),
                in_flight: AtomicU64::new(0),
            }),
            config,
            workers: Vec::new(),
            watchdog: None,
        }
    }

    /// Handle to the cooperative stop flag; long-running jobs poll it
    /// between batches so `stop` takes effect without preemption.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.should_stop)
    }

    /// Submits a job closure under `id` with the given priority.
    pub fn submit<F>(&self, id: impl Into<String>, priority: i64, est_memory_mb: u64, task: F)
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let id = id.into();
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        let job = Job {
            id: id.clone(),
            priority,
            est_memory_mb,
            retries_left: DEFAULT_MAX_RETRIES,
            task: Arc::new(task),
        };
        debug!(job = %id, priority, est_memory_mb, "job submitted");
        {
            let mut queue = lock(&self.shared.queue);
            queue.push(QueuedJob { priority, seq, job });
        }
        self.shared.available.notify_one();
    }

    /// Starts the worker pool and the memory watchdog.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            return;
        }
        self.shared.should_stop.store(false, Ordering::SeqCst);

        for index in 0..self.config.max_workers {
            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name(format!("gitmine-worker-{index}"))
                .spawn(move || worker_loop(&shared))
                .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"));
            self.workers.push(handle);
        }

        let shared = Arc::clone(&self.shared);
        let limit = self.config.max_memory_percent;
        let floor = self.config.min_free_memory_mb;
        self.watchdog = Some(
            std::thread::Builder::new()
                .name("gitmine-memwatch".to_string())
                .spawn(move || watchdog_loop(&shared, limit, floor))
                .unwrap_or_else(|e| panic!("failed to spawn watchdog thread: {e}")),
        );

        info!(workers = self.config.max_workers, "scheduler started");
    }

    /// Signals stop and, when `wait` is set, joins each worker with a
    /// 60-second deadline. In-flight jobs always run to completion.
    pub fn stop(&mut self, wait: bool) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();

        if wait {
            for handle in self.workers.drain(..) {
                let deadline = Instant::now() + JOIN_DEADLINE;
                while !handle.is_finished() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(100));
                }
                if handle.is_finished() {
                    let _ = handle.join();
                } else {
                    warn!("worker did not stop within the join deadline, detaching");
                }
            }
            if let Some(handle) = self.watchdog.take() {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !handle.is_finished() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(100));
                }
                if handle.is_finished() {
                    let _ = handle.join();
                }
            }
        } else {
            self.workers.clear();
            self.watchdog = None;
        }
        info!("scheduler stopped");
    }

    /// Blocks until the queue is empty and no job is in flight.
    pub fn wait_idle(&self) {
        loop {
            let queued = lock(&self.shared.queue).len();
            let in_flight = self.shared.in_flight.load(Ordering::SeqCst);
            if queued == 0 && in_flight == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    /// Takes the completed-job results accumulated so far.
    pub fn take_completed(&self) -> HashMap<String, T> {
        std::mem::take(&mut *lock(&self.shared.completed))
    }

    /// Snapshot of the failed table: `job id → final error`.
    pub fn failed(&self) -> HashMap<String, String> {
        lock(&self.shared.failed).clone()
    }
}

fn worker_loop<T: Send + 'static>(shared: &Arc<Shared<T>>) {
    loop {
        if shared.should_stop.load(Ordering::SeqCst) {
            return;
        }

        // Admission control: no new job while the gate is closed.
        if !shared.gate_open.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(250));
            continue;
        }

        let popped = {
            let mut queue = lock(&shared.queue);
            loop {
                if shared.should_stop.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(entry) = queue.pop() {
                    // Counted while the lock is held so wait_idle never
                    // observes a popped-but-unregistered job.
                    shared.in_flight.fetch_add(1, Ordering::SeqCst);
                    break Some(entry);
                }
                let Ok((guard, timeout)) = shared
                    .available
                    .wait_timeout(queue, Duration::from_secs(1))
                else {
                    return;
                };
                queue = guard;
                if timeout.timed_out() {
                    break None;
                }
            }
        };

        let Some(QueuedJob { mut job, .. }) = popped else {
            continue;
        };

        lock(&shared.active).insert(job.id.clone(), Instant::now());
        debug!(job = %job.id, "job started");

        let outcome = (job.task)();

        lock(&shared.active).remove(&job.id);

        match outcome {
            Ok(result) => {
                debug!(job = %job.id, "job completed");
                lock(&shared.completed).insert(job.id.clone(), result);
            }
            Err(err) if job.retries_left > 0 => {
                job.retries_left -= 1;
                warn!(
                    job = %job.id,
                    retries_left = job.retries_left,
                    error = %err,
                    "job failed, requeueing"
                );
                let seq = shared.seq.fetch_add(1, Ordering::Relaxed);
                let priority = job.priority;
                lock(&shared.queue).push(QueuedJob { priority, seq, job });
                shared.available.notify_one();
            }
            Err(err) => {
                error!(job = %job.id, error = %err, "job failed permanently");
                lock(&shared.failed).insert(job.id.clone(), err.to_string());
            }
        }

        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn watchdog_loop<T>(shared: &Arc<Shared<T>>, limit_percent: f64, floor_mb: u64) {
    let mut monitor = MemoryMonitor::new();
    while !shared.should_stop.load(Ordering::SeqCst) {
        let used = monitor.percent_used();
        let available = monitor.available_mb();

        if used > limit_percent || available < floor_mb {
            if shared.gate_open.swap(false, Ordering::SeqCst) {
                warn!(
                    used_percent = used,
                    available_mb = available,
                    "memory pressure, closing admission gate"
                );
            }
            monitor.block_until_released(limit_percent, floor_mb);
            shared.gate_open.store(true, Ordering::SeqCst);
            debug!("admission gate reopened");
        }

        std::thread::sleep(WATCHDOG_TICK);
    }
}
