//! Processor lifecycle.
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running|Paused --stop--> Stopped --start--> (Idle) --> Running
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProcessorError;

/// The execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorType {
    /// Single-threaded, deterministic order.
    #[default]
    Serial,
    /// Rayon worker pool.
    Cpu,
    /// Compute device.
    Gpu,
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        })
    }
}

impl FromStr for ProcessorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            other => Err(format!("unknown processor '{other}', expected serial, cpu or gpu")),
        }
    }
}

/// Where a processor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessorState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        })
    }
}

impl ProcessorState {
    /// Returns `true` if the state machine has an edge `self -> to`.
    #[must_use]
    pub const fn can_transition(self, to: ProcessorState) -> bool {
        matches!(
            (self, to),
            (Self::Idle | Self::Stopped, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running | Self::Paused, Self::Stopped)
                | (Self::Stopped, Self::Idle)
        )
    }

    /// Returns `true` while backend resources are held.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// State tracking shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    processor: ProcessorType,
    state: ProcessorState,
}

impl Lifecycle {
    /// A new, idle lifecycle.
    #[must_use]
    pub const fn new(processor: ProcessorType) -> Self {
        Self {
            processor,
            state: ProcessorState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ProcessorState {
        self.state
    }

    /// Fail unless `self -> to` is allowed. Does not change state.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidTransition`].
    pub fn check(&self, to: ProcessorState) -> Result<(), ProcessorError> {
        if self.state.can_transition(to) {
            Ok(())
        } else {
            Err(ProcessorError::InvalidTransition {
                processor: self.processor,
                from: self.state,
                to,
            })
        }
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidTransition`].
    pub fn transition(&mut self, to: ProcessorState) -> Result<(), ProcessorError> {
        self.check(to)?;
        info!(processor = %self.processor, from = %self.state, to = %to, "processor state changed");
        self.state = to;
        Ok(())
    }

    /// Fail unless running.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`].
    pub fn ensure_running(&self) -> Result<(), ProcessorError> {
        if self.state == ProcessorState::Running {
            Ok(())
        } else {
            Err(ProcessorError::NotRunning {
                processor: self.processor,
                state: self.state,
            })
        }
    }
}
