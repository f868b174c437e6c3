//! Single-threaded backend.

use crate::error::ProcessorError;
use crate::state::{Lifecycle, ProcessorState, ProcessorType};

/// Visits indices in ascending order on the calling thread.
#[derive(Debug)]
pub struct SerialProcessor {
    life: Lifecycle,
}

impl Default for SerialProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialProcessor {
    /// An idle serial processor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            life: Lifecycle::new(ProcessorType::Serial),
        }
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    pub(crate) fn start(&mut self) -> Result<(), ProcessorError> {
        if self.life.state() == ProcessorState::Stopped {
            self.life.transition(ProcessorState::Idle)?;
        }
        self.life.transition(ProcessorState::Running)
    }

    pub(crate) fn set_state(&mut self, to: ProcessorState) -> Result<(), ProcessorError> {
        self.life.transition(to)
    }

    pub(crate) fn run<F>(&self, start: usize, end: usize, f: &F) -> Result<(), ProcessorError>
    where
        F: Fn(usize) + Send + Sync,
    {
        self.life.ensure_running()?;
        (start..end).for_each(f);
        Ok(())
    }

    pub(crate) fn run_mut<T, F>(&self, items: &mut [T], f: &F) -> Result<(), ProcessorError>
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        self.life.ensure_running()?;
        for (i, item) in items.iter_mut().enumerate() {
            f(i, item);
        }
        Ok(())
    }
}
