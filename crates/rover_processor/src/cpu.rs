//! Parallel CPU backend on a rayon worker pool.
//!
//! The pool is built by `start()` and dropped by `stop()`. Index ranges
//! are split into tasks of at least `batch_size` indices; every call joins
//! before returning.

use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, error};

use crate::error::ProcessorError;
use crate::state::{Lifecycle, ProcessorState, ProcessorType};

/// Default minimum number of indices per rayon task.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Data-parallel processor backed by a private thread pool.
#[derive(Debug)]
pub struct CpuProcessor {
    life: Lifecycle,
    /// 0 lets rayon pick one worker per core.
    workers: usize,
    batch_size: usize,
    pool: Option<ThreadPool>,
}

impl Default for CpuProcessor {
    fn default() -> Self {
        Self::new(0, DEFAULT_BATCH_SIZE)
    }
}

impl CpuProcessor {
    /// An idle CPU processor.
    #[must_use]
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            life: Lifecycle::new(ProcessorType::Cpu),
            workers,
            batch_size: batch_size.max(1),
            pool: None,
        }
    }

    /// Worker threads of the running pool, 0 when stopped.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    pub(crate) fn start(&mut self) -> Result<(), ProcessorError> {
        if self.life.state() == ProcessorState::Stopped {
            self.life.transition(ProcessorState::Idle)?;
        }
        self.life.check(ProcessorState::Running)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("rover-cpu-{i}"))
            .build()
            .map_err(|e| {
                error!(error = %e, "failed to build cpu worker pool");
                ProcessorError::BackendUnavailable {
                    processor: ProcessorType::Cpu,
                    reason: e.to_string(),
                }
            })?;
        debug!(workers = pool.current_num_threads(), batch = self.batch_size, "cpu pool ready");
        self.pool = Some(pool);
        self.life.transition(ProcessorState::Running)
    }

    pub(crate) fn set_state(&mut self, to: ProcessorState) -> Result<(), ProcessorError> {
        self.life.transition(to)?;
        if to == ProcessorState::Stopped {
            self.pool = None;
        }
        Ok(())
    }

    fn pool(&self) -> Result<&ThreadPool, ProcessorError> {
        self.life.ensure_running()?;
        self.pool.as_ref().ok_or(ProcessorError::NotRunning {
            processor: ProcessorType::Cpu,
            state: self.life.state(),
        })
    }

    pub(crate) fn run<F>(&self, start: usize, end: usize, f: &F) -> Result<(), ProcessorError>
    where
        F: Fn(usize) + Send + Sync,
    {
        let pool = self.pool()?;
        let batch = self.batch_size;
        pool.install(|| {
            (start..end)
                .into_par_iter()
                .with_min_len(batch)
                .for_each(f);
        });
        Ok(())
    }

    pub(crate) fn run_mut<T, F>(&self, items: &mut [T], f: &F) -> Result<(), ProcessorError>
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        let pool = self.pool()?;
        let batch = self.batch_size;
        pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .with_min_len(batch)
                .for_each(|(i, item)| f(i, item));
        });
        Ok(())
    }
}
