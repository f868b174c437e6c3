//! Backend selection and simulation-state handling.

use rover_component::EventKind;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cpu::DEFAULT_BATCH_SIZE;
use crate::error::ProcessorError;
use crate::gpu::{DEFAULT_BLOCK_SIZE, DeviceProvider};
use crate::processor::Processor;
use crate::state::{ProcessorState, ProcessorType};

/// Backend tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// CPU worker threads, 0 for one per core.
    pub cpu_workers: usize,
    /// Minimum indices per CPU task.
    pub cpu_batch_size: usize,
    /// Device threads per block.
    pub gpu_block_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cpu_workers: 0,
            cpu_batch_size: DEFAULT_BATCH_SIZE,
            gpu_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Owns one processor per backend and tracks which one is in use.
#[derive(Debug)]
pub struct ProcessorManager {
    serial: Processor,
    cpu: Processor,
    gpu: Processor,
    selected: ProcessorType,
    active: ProcessorType,
}

impl ProcessorManager {
    /// Build all three backends, with `selected` as the preferred one.
    #[must_use]
    pub fn new(
        config: ProcessorConfig,
        provider: Box<dyn DeviceProvider>,
        selected: ProcessorType,
    ) -> Self {
        Self {
            serial: Processor::serial(),
            cpu: Processor::cpu(config.cpu_workers, config.cpu_batch_size),
            gpu: Processor::gpu(provider, config.gpu_block_size),
            selected,
            active: selected,
        }
    }

    /// The preferred backend.
    #[must_use]
    pub fn selected(&self) -> ProcessorType {
        self.selected
    }

    /// The processor work is dispatched to. Differs from
    /// [`selected`](Self::selected) after a fallback.
    #[must_use]
    pub fn processor(&self) -> &Processor {
        self.get(self.active)
    }

    pub fn processor_mut(&mut self) -> &mut Processor {
        self.get_mut(self.active)
    }

    #[must_use]
    pub fn get(&self, ty: ProcessorType) -> &Processor {
        match ty {
            ProcessorType::Serial => &self.serial,
            ProcessorType::Cpu => &self.cpu,
            ProcessorType::Gpu => &self.gpu,
        }
    }

    fn get_mut(&mut self, ty: ProcessorType) -> &mut Processor {
        match ty {
            ProcessorType::Serial => &mut self.serial,
            ProcessorType::Cpu => &mut self.cpu,
            ProcessorType::Gpu => &mut self.gpu,
        }
    }

    /// Prefer `ty` from the next start on.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Busy`] while the current processor is
    /// running or paused.
    pub fn select(&mut self, ty: ProcessorType) -> Result<(), ProcessorError> {
        if self.processor().state().is_active() {
            return Err(ProcessorError::Busy(self.active));
        }
        self.selected = ty;
        self.active = ty;
        info!(processor = %ty, "processor selected");
        Ok(())
    }

    /// Start the selected backend, or the serial one if it is unavailable.
    ///
    /// Returns the backend that actually started.
    ///
    /// # Errors
    ///
    /// Returns any start failure other than an unavailable backend.
    pub fn start_with_fallback(&mut self) -> Result<ProcessorType, ProcessorError> {
        let selected = self.selected;
        match self.get_mut(selected).start() {
            Ok(()) => {
                self.active = selected;
                Ok(selected)
            }
            Err(ProcessorError::BackendUnavailable { processor, reason })
                if processor != ProcessorType::Serial =>
            {
                warn!(%processor, %reason, "falling back to serial processor");
                self.serial.start()?;
                self.active = ProcessorType::Serial;
                Ok(ProcessorType::Serial)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a simulation state event. Other events are ignored.
    ///
    /// A step on an idle processor starts it and leaves it paused; a step on
    /// a running one pauses it. The caller then resumes for exactly one
    /// tick.
    ///
    /// # Errors
    ///
    /// Returns the failed transition.
    pub fn on_event(&mut self, event: &EventKind) -> Result<(), ProcessorError> {
        match event {
            EventKind::SimulationStart => self.start_with_fallback().map(drop),
            EventKind::SimulationPause => self.processor_mut().pause(),
            EventKind::SimulationContinue => self.processor_mut().resume(),
            EventKind::SimulationStop => self.processor_mut().stop(),
            EventKind::SimulationStep => match self.processor().state() {
                ProcessorState::Idle | ProcessorState::Stopped => {
                    self.start_with_fallback()?;
                    self.processor_mut().pause()
                }
                ProcessorState::Running => self.processor_mut().pause(),
                ProcessorState::Paused => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
