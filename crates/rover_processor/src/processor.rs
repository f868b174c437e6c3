//! The processor variant.
//!
//! The set of backends is closed, so [`Processor`] is an enum and every
//! call is a `match` over it. All backends share one contract: `run` visits
//! each index of `start..end` exactly once and returns only after the last
//! visit has finished.

use bytemuck::Pod;
use rover_component::{DataManager, Entity, EntityView};
use tracing::debug;

use crate::cpu::CpuProcessor;
use crate::error::ProcessorError;
use crate::gpu::{DeviceBuffer, DeviceProvider, GpuProcessor};
use crate::script::Script;
use crate::serial::SerialProcessor;
use crate::state::{Lifecycle, ProcessorState, ProcessorType};

/// An execution backend.
#[derive(Debug)]
pub enum Processor {
    Serial(SerialProcessor),
    Cpu(CpuProcessor),
    Gpu(GpuProcessor),
}

impl Processor {
    #[must_use]
    pub fn serial() -> Self {
        Self::Serial(SerialProcessor::new())
    }

    /// A rayon-backed processor; `workers == 0` uses one thread per core.
    #[must_use]
    pub fn cpu(workers: usize, batch_size: usize) -> Self {
        Self::Cpu(CpuProcessor::new(workers, batch_size))
    }

    #[must_use]
    pub fn gpu(provider: Box<dyn DeviceProvider>, block_size: usize) -> Self {
        Self::Gpu(GpuProcessor::new(provider, block_size))
    }

    #[must_use]
    pub fn kind(&self) -> ProcessorType {
        match self {
            Self::Serial(_) => ProcessorType::Serial,
            Self::Cpu(_) => ProcessorType::Cpu,
            Self::Gpu(_) => ProcessorType::Gpu,
        }
    }

    fn lifecycle(&self) -> &Lifecycle {
        match self {
            Self::Serial(p) => p.lifecycle(),
            Self::Cpu(p) => p.lifecycle(),
            Self::Gpu(p) => p.lifecycle(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.lifecycle().state()
    }

    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`] unless running.
    pub fn ensure_running(&self) -> Result<(), ProcessorError> {
        self.lifecycle().ensure_running()
    }

    /// Acquire backend resources and start running.
    ///
    /// A stopped processor passes back through `Idle`.
    ///
    /// # Errors
    ///
    /// - [`ProcessorError::InvalidTransition`] if already running or paused.
    /// - [`ProcessorError::BackendUnavailable`] if the backend cannot start;
    ///   the processor is left idle.
    pub fn start(&mut self) -> Result<(), ProcessorError> {
        match self {
            Self::Serial(p) => p.start(),
            Self::Cpu(p) => p.start(),
            Self::Gpu(p) => p.start(),
        }
    }

    fn set_state(&mut self, to: ProcessorState) -> Result<(), ProcessorError> {
        match self {
            Self::Serial(p) => p.set_state(to),
            Self::Cpu(p) => p.set_state(to),
            Self::Gpu(p) => p.set_state(to),
        }
    }

    /// Stop issuing work until [`resume`](Self::resume).
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidTransition`] unless running.
    pub fn pause(&mut self) -> Result<(), ProcessorError> {
        self.set_state(ProcessorState::Paused)
    }

    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidTransition`] unless paused.
    pub fn resume(&mut self) -> Result<(), ProcessorError> {
        self.set_state(ProcessorState::Running)
    }

    /// Release threads and devices.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidTransition`] unless running or paused.
    pub fn stop(&mut self) -> Result<(), ProcessorError> {
        self.set_state(ProcessorState::Stopped)
    }

    /// Call `f(i)` for every `i` in `start..end` and wait for all calls.
    ///
    /// Only the serial backend visits indices in order.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`] unless running.
    pub fn run<F>(&self, start: usize, end: usize, f: F) -> Result<(), ProcessorError>
    where
        F: Fn(usize) + Send + Sync,
    {
        match self {
            Self::Serial(p) => p.run(start, end, &f),
            Self::Cpu(p) => p.run(start, end, &f),
            Self::Gpu(p) => p.run(start, end, &f),
        }
    }

    /// Call `f(i, &mut items[i])` for every item and wait for all calls.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`] unless running.
    pub fn run_mut<T, F>(&self, items: &mut [T], f: F) -> Result<(), ProcessorError>
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        match self {
            Self::Serial(p) => p.run_mut(items, &f),
            Self::Cpu(p) => p.run_mut(items, &f),
            Self::Gpu(p) => p.run_mut(items, &f),
        }
    }

    /// Run `script.update` once per view.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`] unless running.
    pub fn run_script(
        &self,
        script: &dyn Script,
        views: &mut [EntityView<'_>],
        dt: f32,
    ) -> Result<(), ProcessorError> {
        self.run_mut(views, |_, view| script.update(view, dt))
    }

    /// Update `count` consecutive clones of `entity.id`, starting at
    /// `entity.clone_id`.
    ///
    /// The end state matches calling `update` on each clone in turn as long
    /// as the script only touches its own clone.
    ///
    /// # Errors
    ///
    /// - [`ProcessorError::NotRunning`] unless running.
    /// - [`ProcessorError::Data`] if the entity is gone or the range passes
    ///   its last clone.
    pub fn run_clones(
        &self,
        data: &mut DataManager,
        script: &dyn Script,
        entity: Entity,
        dt: f32,
        count: u32,
    ) -> Result<(), ProcessorError> {
        self.ensure_running()?;
        let first = entity.clone_id;
        let mut views = data.clone_views(entity.id, first..first.saturating_add(count))?;
        debug!(processor = %self.kind(), entity = %entity, count, "dispatching clones");
        self.run_script(script, &mut views, dt)
    }

    /// Stage `data` into `buffer` at byte `offset`.
    ///
    /// Host backends share memory with the buffer and copy directly.
    ///
    /// # Errors
    ///
    /// - [`ProcessorError::NotRunning`] unless running.
    /// - [`ProcessorError::BufferRange`] if the data does not fit.
    pub fn write_data<T: Pod>(
        &self,
        buffer: &mut DeviceBuffer,
        offset: usize,
        data: &[T],
    ) -> Result<(), ProcessorError> {
        match self {
            Self::Gpu(p) => p.write_data(buffer, offset, data),
            _ => {
                self.ensure_running()?;
                buffer.write(offset, data)
            }
        }
    }

    /// Copy bytes out of `buffer` starting at `offset`.
    ///
    /// # Errors
    ///
    /// - [`ProcessorError::NotRunning`] unless running.
    /// - [`ProcessorError::BufferRange`] if `out` reaches past the end.
    pub fn read_data<T: Pod>(
        &self,
        buffer: &DeviceBuffer,
        offset: usize,
        out: &mut [T],
    ) -> Result<(), ProcessorError> {
        match self {
            Self::Gpu(p) => p.read_data(buffer, offset, out),
            _ => {
                self.ensure_running()?;
                buffer.read(offset, out)
            }
        }
    }
}
