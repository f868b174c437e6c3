//! Compute-device backend.
//!
//! A [`DeviceProvider`] is asked for a [`Device`] when the processor
//! starts; if none is available `start()` fails with
//! [`ProcessorError::BackendUnavailable`] and the caller can fall back to
//! the serial backend. Work is launched in fixed-size blocks and every
//! launch joins before returning.
//!
//! Data the kernels read must already be staged in a [`DeviceBuffer`]:
//! `write_data` and `read_data` mark the host/device boundary.
//!
//! [`EmulatedDevice`] runs kernels on a host thread pool, one rayon task
//! per block.

use std::fmt;
use std::sync::Mutex;

use bytemuck::Pod;
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, error, trace};

use crate::error::ProcessorError;
use crate::state::{Lifecycle, ProcessorState, ProcessorType};

/// Default threads per block.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// A kernel: called once per global thread index.
pub type Kernel<'a> = &'a (dyn Fn(usize) + Sync);

/// An execution device.
pub trait Device: Send + Sync + fmt::Debug {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Run `kernel(i)` for every `i` in `0..threads`, grouped into blocks of
    /// `block_size`, and wait for all of them.
    fn launch(&self, threads: usize, block_size: usize, kernel: Kernel<'_>);
}

/// Source of devices.
pub trait DeviceProvider: Send + Sync + fmt::Debug {
    /// Acquire a device, or explain why there is none.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when no device can be used.
    fn acquire(&self) -> Result<Box<dyn Device>, String>;
}

/// Host-side device that runs each block as a rayon task.
#[derive(Debug)]
pub struct EmulatedDevice {
    pool: ThreadPool,
}

impl EmulatedDevice {
    /// Build an emulated device with `workers` threads (0 for one per core).
    ///
    /// # Errors
    ///
    /// Returns the thread pool build error as text.
    pub fn new(workers: usize) -> Result<Self, String> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rover-device-{i}"))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { pool })
    }
}

impl Device for EmulatedDevice {
    fn name(&self) -> &str {
        "emulated"
    }

    fn launch(&self, threads: usize, block_size: usize, kernel: Kernel<'_>) {
        let block_size = block_size.max(1);
        let blocks = threads.div_ceil(block_size);
        trace!(threads, blocks, block_size, "launch");
        self.pool.install(|| {
            (0..blocks).into_par_iter().for_each(|block| {
                let first = block * block_size;
                let last = (first + block_size).min(threads);
                (first..last).for_each(kernel);
            });
        });
    }
}

/// Provides [`EmulatedDevice`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedProvider {
    /// Worker threads per device, 0 for one per core.
    pub workers: usize,
}

impl DeviceProvider for EmulatedProvider {
    fn acquire(&self) -> Result<Box<dyn Device>, String> {
        Ok(Box::new(EmulatedDevice::new(self.workers)?))
    }
}

/// A provider that never finds a device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevice;

impl DeviceProvider for NoDevice {
    fn acquire(&self) -> Result<Box<dyn Device>, String> {
        Err("no compute device present".to_string())
    }
}

/// Device-resident memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceBuffer {
    bytes: Vec<u8>,
}

impl DeviceBuffer {
    /// A zeroed buffer of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for a zero-length buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Device-side view for kernels.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, ProcessorError> {
        let end = offset.saturating_add(len);
        if end > self.bytes.len() {
            return Err(ProcessorError::BufferRange {
                offset,
                end,
                len: self.bytes.len(),
            });
        }
        Ok(offset..end)
    }

    /// Copy `data` in at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::BufferRange`] if it does not fit.
    pub fn write<T: Pod>(&mut self, offset: usize, data: &[T]) -> Result<(), ProcessorError> {
        let src: &[u8] = bytemuck::cast_slice(data);
        let range = self.range(offset, src.len())?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }

    /// Copy out into `out`, starting at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::BufferRange`] if `out` reaches past the end.
    pub fn read<T: Pod>(&self, offset: usize, out: &mut [T]) -> Result<(), ProcessorError> {
        let dst: &mut [u8] = bytemuck::cast_slice_mut(out);
        let range = self.range(offset, dst.len())?;
        dst.copy_from_slice(&self.bytes[range]);
        Ok(())
    }
}

/// Processor that launches work on a [`Device`].
pub struct GpuProcessor {
    life: Lifecycle,
    provider: Box<dyn DeviceProvider>,
    block_size: usize,
    device: Option<Box<dyn Device>>,
}

impl fmt::Debug for GpuProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuProcessor")
            .field("state", &self.life.state())
            .field("provider", &self.provider)
            .field("block_size", &self.block_size)
            .field("device", &self.device.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl GpuProcessor {
    /// An idle processor drawing devices from `provider`.
    #[must_use]
    pub fn new(provider: Box<dyn DeviceProvider>, block_size: usize) -> Self {
        Self {
            life: Lifecycle::new(ProcessorType::Gpu),
            provider,
            block_size: block_size.max(1),
            device: None,
        }
    }

    /// Name of the acquired device.
    #[must_use]
    pub fn device_name(&self) -> Option<&str> {
        self.device.as_deref().map(Device::name)
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.life
    }

    pub(crate) fn start(&mut self) -> Result<(), ProcessorError> {
        if self.life.state() == ProcessorState::Stopped {
            self.life.transition(ProcessorState::Idle)?;
        }
        self.life.check(ProcessorState::Running)?;

        let device = self.provider.acquire().map_err(|reason| {
            error!(%reason, "no compute device");
            ProcessorError::BackendUnavailable {
                processor: ProcessorType::Gpu,
                reason,
            }
        })?;
        debug!(device = device.name(), block = self.block_size, "device acquired");
        self.device = Some(device);
        self.life.transition(ProcessorState::Running)
    }

    pub(crate) fn set_state(&mut self, to: ProcessorState) -> Result<(), ProcessorError> {
        self.life.transition(to)?;
        if to == ProcessorState::Stopped {
            self.device = None;
        }
        Ok(())
    }

    fn device(&self) -> Result<&dyn Device, ProcessorError> {
        self.life.ensure_running()?;
        self.device.as_deref().ok_or(ProcessorError::NotRunning {
            processor: ProcessorType::Gpu,
            state: self.life.state(),
        })
    }

    pub(crate) fn run<F>(&self, start: usize, end: usize, f: &F) -> Result<(), ProcessorError>
    where
        F: Fn(usize) + Send + Sync,
    {
        let device = self.device()?;
        let threads = end.saturating_sub(start);
        device.launch(threads, self.block_size, &|i| f(start + i));
        Ok(())
    }

    pub(crate) fn run_mut<T, F>(&self, items: &mut [T], f: &F) -> Result<(), ProcessorError>
    where
        T: Send,
        F: Fn(usize, &mut T) + Send + Sync,
    {
        let device = self.device()?;
        let block = self.block_size;
        // One uncontended lock per block hands each block its own sub-slice.
        let chunks: Vec<Mutex<&mut [T]>> = items.chunks_mut(block).map(Mutex::new).collect();
        device.launch(chunks.len(), 1, &|b| {
            if let Ok(mut chunk) = chunks[b].lock() {
                for (j, item) in chunk.iter_mut().enumerate() {
                    f(b * block + j, item);
                }
            }
        });
        Ok(())
    }

    pub(crate) fn write_data<T: Pod>(
        &self,
        buffer: &mut DeviceBuffer,
        offset: usize,
        data: &[T],
    ) -> Result<(), ProcessorError> {
        self.device()?;
        trace!(bytes = std::mem::size_of_val(data), offset, "host to device");
        buffer.write(offset, data)
    }

    pub(crate) fn read_data<T: Pod>(
        &self,
        buffer: &DeviceBuffer,
        offset: usize,
        out: &mut [T],
    ) -> Result<(), ProcessorError> {
        self.device()?;
        trace!(bytes = std::mem::size_of_val(out), offset, "device to host");
        buffer.read(offset, out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_emulated_launch_covers_every_thread_once() {
        let device = EmulatedDevice::new(2).unwrap();
        let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
        device.launch(1000, 64, &|i| {
            hits[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_no_device_fails_start() {
        let mut gpu = GpuProcessor::new(Box::new(NoDevice), 32);
        let err = gpu.start().unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::BackendUnavailable {
                processor: ProcessorType::Gpu,
                ..
            }
        ));
        assert_eq!(gpu.lifecycle().state(), ProcessorState::Idle);
        assert!(gpu.device_name().is_none());
    }

    #[test]
    fn test_stop_releases_device() {
        let mut gpu = GpuProcessor::new(Box::new(EmulatedProvider { workers: 1 }), 32);
        gpu.start().unwrap();
        assert_eq!(gpu.device_name(), Some("emulated"));
        gpu.set_state(ProcessorState::Stopped).unwrap();
        assert!(gpu.device_name().is_none());
        assert!(gpu.run(0, 4, &|_| {}).is_err());
    }

    #[test]
    fn test_buffer_staging() {
        let mut gpu = GpuProcessor::new(Box::new(EmulatedProvider { workers: 1 }), 8);
        let mut buffer = DeviceBuffer::new(16);
        assert!(gpu.write_data(&mut buffer, 0, &[1.0f32]).is_err());

        gpu.start().unwrap();
        gpu.write_data(&mut buffer, 4, &[1.5f32, 2.5]).unwrap();
        let mut out = [0.0f32; 2];
        gpu.read_data(&buffer, 4, &mut out).unwrap();
        assert_eq!(out, [1.5, 2.5]);
        assert!(matches!(
            gpu.write_data(&mut buffer, 12, &[0u32, 0]),
            Err(ProcessorError::BufferRange { end: 20, len: 16, .. })
        ));
    }
}
