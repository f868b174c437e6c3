//! # rover_processor
//!
//! Execution backends for per-entity script updates.
//!
//! - [`Processor`]: the closed set of backends (serial, rayon CPU pool,
//!   compute device) behind one `run` contract.
//! - [`ProcessorState`]: the lifecycle every backend follows.
//! - [`Script`] and [`ScriptRegistry`]: update logic attached to entities.
//! - [`ProcessorManager`]: backend selection, serial fallback and reaction
//!   to simulation events.

pub mod cpu;
pub mod error;
pub mod gpu;
pub mod manager;
pub mod processor;
pub mod script;
pub mod serial;
pub mod state;

pub use cpu::{CpuProcessor, DEFAULT_BATCH_SIZE};
pub use error::ProcessorError;
pub use gpu::{
    DEFAULT_BLOCK_SIZE, Device, DeviceBuffer, DeviceProvider, EmulatedDevice, EmulatedProvider,
    GpuProcessor, NoDevice,
};
pub use manager::{ProcessorConfig, ProcessorManager};
pub use processor::Processor;
pub use script::{Script, ScriptRegistry};
pub use serial::SerialProcessor;
pub use state::{Lifecycle, ProcessorState, ProcessorType};
