use crate::error::{GeneticError, Result};
use log::{error, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};

struct PoolState {
    pending: Mutex<usize>,
    done: Condvar,
    closed: AtomicBool,
    failures: AtomicUsize,
}

impl PoolState {
    fn pending(&self) -> MutexGuard<'_, usize> {
        // tasks never panic while holding the lock, so a poisoned guard is still consistent
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self) {
        let mut pending = self.pending();
        *pending -= 1;
        if *pending == 0 {
            self.done.notify_all();
        }
    }
}

/// Fixed set of worker threads running independent fallible tasks.
///
/// Threads are created once and reused across `drain` cycles. A task that fails or
/// panics is logged and counted without disturbing its siblings.
pub struct WorkerPool {
    pool: ThreadPool,
    state: Arc<PoolState>,
}

impl WorkerPool {
    pub fn new(thread_number: usize) -> Result<WorkerPool> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_number.max(1))
            .thread_name(|i| format!("gesnp-worker-{}", i))
            .build()
            .map_err(|e| GeneticError::InvalidParam(format!("cannot start {} worker threads: {}", thread_number, e)))?;

        Ok(WorkerPool {
            pool,
            state: Arc::new(PoolState {
                pending: Mutex::new(0),
                done: Condvar::new(),
                closed: AtomicBool::new(false),
                failures: AtomicUsize::new(0),
            }),
        })
    }

    pub fn thread_number(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues a task and returns immediately
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(GeneticError::PoolClosed);
        }
        *self.state.pending() += 1;

        let state = Arc::clone(&self.state);
        self.pool.spawn(move || {
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Task failed: {}", e);
                    state.failures.fetch_add(1, Ordering::SeqCst);
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Task panicked: {}", message);
                    state.failures.fetch_add(1, Ordering::SeqCst);
                }
            }
            state.finish();
        });

        Ok(())
    }

    /// Blocks until every submitted task has completed.
    /// Returns the number of failed tasks since the previous drain.
    pub fn drain(&self) -> usize {
        let mut pending = self.state.pending();
        while *pending > 0 {
            pending = self.state.done.wait(pending).unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        drop(pending);
        self.state.failures.swap(0, Ordering::SeqCst)
    }

    /// Drains and refuses any further task. Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.drain();
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fitness array of one generation. Each index can be written through exactly one
/// `FitnessSlot`, handed out at construction.
pub struct FitnessBoard {
    cells: Arc<Vec<OnceLock<f64>>>,
}

/// Write handle to a single fitness cell, consumed by `write`
pub struct FitnessSlot {
    index: usize,
    cells: Arc<Vec<OnceLock<f64>>>,
}

impl FitnessBoard {
    pub fn new(size: usize) -> (FitnessBoard, Vec<FitnessSlot>) {
        let cells: Arc<Vec<OnceLock<f64>>> = Arc::new((0..size).map(|_| OnceLock::new()).collect());
        let slots = (0..size).map(|index| FitnessSlot { index, cells: Arc::clone(&cells) }).collect();
        (FitnessBoard { cells }, slots)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn written(&self) -> usize {
        self.cells.iter().filter(|c| c.get().is_some()).count()
    }

    /// fitness values in index order, 0.0 where nothing was written
    pub fn collect(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.get().copied().unwrap_or(0.0)).collect()
    }
}

impl FitnessSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn write(self, value: f64) {
        // the handle is unique per index, so the cell is always empty here
        let _ = self.cells[self.index].set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tasks_write_their_own_slots() {
        let pool = WorkerPool::new(4).unwrap();
        let (board, slots) = FitnessBoard::new(50);
        for slot in slots {
            pool.submit(move || {
                let value = slot.index() as f64 * 2.0;
                slot.write(value);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(pool.drain(), 0, "no task should fail");
        let expected: Vec<f64> = (0..50).map(|i| i as f64 * 2.0).collect();
        assert_eq!(board.collect(), expected);
        assert_eq!(board.written(), 50);
    }

    #[test]
    fn test_failed_and_panicking_tasks_are_isolated() {
        let pool = WorkerPool::new(2).unwrap();
        let (board, slots) = FitnessBoard::new(6);
        for slot in slots {
            pool.submit(move || match slot.index() {
                1 => Err(GeneticError::training("stub", "cannot fit")),
                4 => panic!("classifier exploded"),
                i => {
                    slot.write(i as f64 + 1.0);
                    Ok(())
                }
            })
            .unwrap();
        }
        assert_eq!(pool.drain(), 2, "one error and one panic should be counted");
        assert_eq!(board.collect(), vec![1.0, 0.0, 3.0, 4.0, 0.0, 6.0], "failed slots read back as 0");

        // the pool keeps working after failures
        let (board, slots) = FitnessBoard::new(1);
        for slot in slots {
            pool.submit(move || {
                slot.write(7.0);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(pool.drain(), 0, "failure count is reset by the previous drain");
        assert_eq!(board.collect(), vec![7.0]);
    }

    #[test]
    fn test_drain_waits_for_slow_tasks() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(20));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        pool.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 3, "drain must return only after every task ran");
    }

    #[test]
    fn test_repeated_cycles_reuse_the_pool() {
        let pool = WorkerPool::new(3).unwrap();
        for generation in 0..5 {
            let (board, slots) = FitnessBoard::new(10);
            for slot in slots {
                pool.submit(move || {
                    slot.write(generation as f64);
                    Ok(())
                })
                .unwrap();
            }
            pool.drain();
            assert!(board.collect().iter().all(|&f| f == generation as f64));
        }
        assert_eq!(pool.thread_number(), 3);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.is_closed());
        assert!(matches!(pool.submit(|| Ok(())), Err(GeneticError::PoolClosed)), "closed pool must refuse tasks");
    }

    #[test]
    fn test_zero_threads_means_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.thread_number(), 1);
    }
}
