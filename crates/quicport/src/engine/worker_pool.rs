// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Worker pool: N OS threads servicing an unbounded FIFO task queue.
//!
//! `schedule_task` hands a closure to the queue and returns a
//! [`TaskHandle`] the caller can wait on. `run_forever` is the
//! housekeeping loop (pruning completed handles) that the QUIC manager
//! drives from a background thread; `stop` disconnects the queue, lets
//! the workers drain what remains, and joins them.
//!
//! A task that panics marks its handle failed; the worker logs and keeps
//! going rather than taking the pool down.

use crate::config::{DEFAULT_WORKER_THREADS, POOL_TICK_INTERVAL};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Capability trait for task scheduling.
pub trait TaskScheduler: Send + Sync {
    /// Submit a type-erased job.
    fn schedule(&self, job: Job);

    /// Service the queue until `stop` is called.
    fn run_forever(&self);

    /// Drain outstanding work and join the workers. Idempotent.
    fn stop(&self);
}

struct TaskSlot<T> {
    result: Mutex<Option<Result<T, PoolTaskError>>>,
    done: Condvar,
}

/// Error surfaced by a handle whose task panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTaskError;

impl std::fmt::Display for PoolTaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scheduled task panicked")
    }
}

impl std::error::Error for PoolTaskError {}

/// Future-like handle to a scheduled task.
pub struct TaskHandle<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> TaskHandle<T> {
    /// Whether the task has finished (successfully or not).
    pub fn is_done(&self) -> bool {
        self.slot.result.lock().is_some()
    }

    /// Block until the task finishes and take its result.
    pub fn wait(self) -> Result<T, PoolTaskError> {
        let mut guard = self.slot.result.lock();
        while guard.is_none() {
            self.slot.done.wait(&mut guard);
        }
        guard.take().expect("checked above")
    }

    /// Block up to `timeout`; `None` when the task is still running.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<T, PoolTaskError>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.slot.result.lock();
        while guard.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if self.slot.done.wait_for(&mut guard, deadline - now).timed_out()
                && guard.is_none()
            {
                return None;
            }
        }
        guard.take()
    }
}

trait PendingTask: Send + Sync {
    fn finished(&self) -> bool;
}

impl<T: Send> PendingTask for TaskSlot<T> {
    fn finished(&self) -> bool {
        self.result.lock().is_some()
    }
}

/// Fixed-size pool of worker threads over an unbounded FIFO queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Mutex<Vec<Arc<dyn PendingTask>>>,
    running: AtomicBool,
}

impl WorkerPool {
    /// Pool with the default worker count.
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKER_THREADS)
    }

    /// Pool with `max_workers` threads, spawned immediately.
    pub fn with_workers(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = unbounded();
        let mut workers = Vec::with_capacity(max_workers);
        for worker_id in 0..max_workers {
            let rx = receiver.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("pool-worker-{}", worker_id))
                    .spawn(move || worker_loop(worker_id, &rx))
                    .expect("spawning a pool worker cannot fail"),
            );
        }
        log::info!("[POOL] started {} workers", max_workers);
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            pending: Mutex::new(Vec::new()),
            running: AtomicBool::new(true),
        }
    }

    /// Submit a closure, returning a waitable handle to its result.
    pub fn schedule_task<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let slot = Arc::new(TaskSlot {
            result: Mutex::new(None),
            done: Condvar::new(),
        });
        let slot_for_job = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task));
            let mut result = slot_for_job.result.lock();
            *result = Some(match outcome {
                Ok(value) => Ok(value),
                Err(_) => {
                    log::error!("[POOL] scheduled task panicked");
                    Err(PoolTaskError)
                }
            });
            drop(result);
            slot_for_job.done.notify_all();
        });
        self.submit(job);
        self.pending.lock().push(slot.clone() as Arc<dyn PendingTask>);
        TaskHandle { slot }
    }

    fn submit(&self, job: Job) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => {
                // Unbounded channel: send only fails after disconnect.
                if tx.send(job).is_err() {
                    log::warn!("[POOL] task submitted after shutdown; dropped");
                }
            }
            None => log::warn!("[POOL] task submitted after shutdown; dropped"),
        }
    }

    /// Number of handles not yet finished.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().iter().filter(|t| !t.finished()).count()
    }
}

fn worker_loop(worker_id: usize, receiver: &Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        job();
    }
    log::debug!("[POOL] worker {} exiting", worker_id);
}

impl TaskScheduler for WorkerPool {
    fn schedule(&self, job: Job) {
        self.submit(job);
    }

    fn run_forever(&self) {
        while self.running.load(Ordering::Acquire) {
            {
                let mut pending = self.pending.lock();
                pending.retain(|task| !task.finished());
            }
            thread::sleep(POOL_TICK_INTERVAL);
        }
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        // Dropping the sender disconnects the queue; workers drain the
        // remaining jobs and exit.
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                log::error!("[POOL] worker thread panicked");
            }
        }
        log::info!("[POOL] stopped");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_task_returns_value() {
        let pool = WorkerPool::with_workers(2);
        let handle = pool.schedule_task(|| 21 * 2);
        assert_eq!(handle.wait().unwrap(), 42);
        pool.stop();
    }

    #[test]
    fn test_many_tasks_all_run() {
        let pool = WorkerPool::with_workers(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let c = Arc::clone(&counter);
                pool.schedule_task(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        pool.stop();
    }

    #[test]
    fn test_panicking_task_isolated() {
        let pool = WorkerPool::with_workers(1);
        let bad: TaskHandle<()> = pool.schedule_task(|| panic!("task bug"));
        assert_eq!(bad.wait(), Err(PoolTaskError));
        // The worker survives and runs the next task.
        let good = pool.schedule_task(|| "still alive");
        assert_eq!(good.wait().unwrap(), "still alive");
        pool.stop();
    }

    #[test]
    fn test_wait_timeout_on_slow_task() {
        let pool = WorkerPool::with_workers(1);
        let handle = pool.schedule_task(|| thread::sleep(Duration::from_millis(200)));
        assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
        pool.stop();
    }

    #[test]
    fn test_stop_drains_queue() {
        let pool = WorkerPool::with_workers(1);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let c = Arc::clone(&counter);
            pool.schedule_task(move || {
                thread::sleep(Duration::from_millis(1));
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 20, "stop drains the queue");
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pool = WorkerPool::with_workers(2);
        pool.stop();
        pool.stop();
    }

    #[test]
    fn test_run_forever_prunes_and_stops() {
        let pool = Arc::new(WorkerPool::with_workers(2));
        let runner = Arc::clone(&pool);
        let thread = thread::spawn(move || runner.run_forever());
        let handle = pool.schedule_task(|| 1);
        handle.wait().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.pending_count(), 0, "finished handles pruned");
        pool.stop();
        thread.join().unwrap();
    }

    #[test]
    fn test_schedule_after_stop_is_dropped() {
        let pool = WorkerPool::with_workers(1);
        pool.stop();
        let handle = pool.schedule_task(|| 5);
        assert!(handle.wait_timeout(Duration::from_millis(50)).is_none());
    }
}
