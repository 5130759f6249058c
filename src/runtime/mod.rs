use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

pub const SUGGEST_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to start debounce timer: {0}")]
    TimerSpawn(std::io::Error),
}

/// Background pool for ingestion, search and trace generation.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// `threads == 0` lets rayon pick.
    pub fn new(threads: usize) -> Result<Self, RuntimeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("kira-volcano-worker-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn submit<T, F>(&self, job: F) -> ResultHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.pool.spawn(move || {
            let _ = tx.send(job());
        });
        ResultHandle { rx }
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Receiving end of a single-assignment result channel.
pub struct ResultHandle<T> {
    rx: Receiver<T>,
}

impl<T> ResultHandle<T> {
    /// Blocks until the job finishes; `None` if the job panicked.
    pub fn wait(self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

struct Slot<T> {
    version: u64,
    value: Option<Arc<T>>,
}

/// Observed output slot: whichever result is published last wins.
pub struct LatestSlot<T> {
    inner: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slot {
                version: 0,
                value: None,
            })),
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new version.
    pub fn publish(&self, value: T) -> u64 {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        slot.version += 1;
        slot.value = Some(Arc::new(value));
        slot.version
    }

    pub fn latest(&self) -> Option<(u64, Arc<T>)> {
        let slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        slot.value.as_ref().map(|v| (slot.version, Arc::clone(v)))
    }

    pub fn version(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }
}

#[derive(Clone)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    mine: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.mine
    }
}

type TimerJob = Box<dyn FnOnce() + Send>;

struct Pending {
    due: Instant,
    run: TimerJob,
}

/// Each `schedule` cancels every job scheduled before it. A job runs only if it
/// survives the delay window; a result of a job cancelled mid-flight is dropped.
/// One timer thread holds pending jobs and hands survivors to the pool.
pub struct Debouncer {
    pool: WorkerPool,
    generation: Arc<AtomicU64>,
    delay: Duration,
    timer: Sender<Pending>,
}

impl Debouncer {
    pub fn new(pool: WorkerPool, delay: Duration) -> Result<Self, RuntimeError> {
        let (timer, rx) = mpsc::channel();
        thread::Builder::new()
            .name("kira-volcano-debounce".to_string())
            .spawn(move || run_timer(rx))
            .map_err(RuntimeError::TimerSpawn)?;
        Ok(Self {
            pool,
            generation: Arc::new(AtomicU64::new(0)),
            delay,
            timer,
        })
    }

    /// The handle yields `Some(result)`, or `None` when superseded.
    pub fn schedule<T, F>(&self, job: F) -> ResultHandle<Option<T>>
    where
        F: FnOnce(&CancelToken) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancelToken {
            generation: Arc::clone(&self.generation),
            mine,
        };
        let (tx, rx) = mpsc::sync_channel(1);
        let pool = self.pool.clone();
        let run: TimerJob = Box::new(move || {
            if token.is_cancelled() {
                debug!(generation = mine, "debounced job superseded before start");
                let _ = tx.send(None);
                return;
            }
            pool.pool.spawn(move || {
                let out = job(&token);
                let out = if token.is_cancelled() {
                    debug!(generation = mine, "debounced job superseded mid-flight");
                    None
                } else {
                    Some(out)
                };
                let _ = tx.send(out);
            });
        });
        let pending = Pending {
            due: Instant::now() + self.delay,
            run,
        };
        if let Err(mpsc::SendError(pending)) = self.timer.send(pending) {
            // Timer thread is gone; run at once so the handle still resolves.
            (pending.run)();
        }
        ResultHandle { rx }
    }

    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Jobs arrive in due order (fixed delay), so the queue stays sorted.
fn run_timer(rx: Receiver<Pending>) {
    let mut queue: VecDeque<Pending> = VecDeque::new();
    let mut open = true;
    while open || !queue.is_empty() {
        let next = match queue.front() {
            Some(front) if open => {
                let wait = front.due.saturating_duration_since(Instant::now());
                rx.recv_timeout(wait)
            }
            Some(front) => {
                thread::sleep(front.due.saturating_duration_since(Instant::now()));
                Err(RecvTimeoutError::Timeout)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(pending) => queue.push_back(pending),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => open = false,
        }
        let now = Instant::now();
        while queue.front().is_some_and(|p| p.due <= now) {
            if let Some(pending) = queue.pop_front() {
                (pending.run)();
            }
        }
    }
}

/// Copy-on-write state: readers get immutable snapshots, writers are serialized
/// and publish a whole new value.
pub struct StateCell<T> {
    current: RwLock<Arc<T>>,
    writer: Mutex<()>,
}

impl<T> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn update<F>(&self, f: F) -> Arc<T>
    where
        F: FnOnce(&T) -> T,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        let next = Arc::new(f(&snapshot));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        next
    }

    pub fn replace(&self, value: T) -> Arc<T> {
        self.update(|_| value)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/runtime/tests.rs"]
mod tests;
