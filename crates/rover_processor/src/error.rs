//! Processor error types.

use rover_component::{DataError, StringId, StringIdError};

use crate::state::{ProcessorState, ProcessorType};

/// Errors raised by processors and the processor manager.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Work was dispatched while the processor was not running.
    #[error("{processor} processor is {state}, not running")]
    NotRunning {
        /// Backend.
        processor: ProcessorType,
        /// Current state.
        state: ProcessorState,
    },

    /// A lifecycle call that the state machine does not allow.
    #[error("{processor} processor cannot go from {from} to {to}")]
    InvalidTransition {
        /// Backend.
        processor: ProcessorType,
        /// Current state.
        from: ProcessorState,
        /// Requested state.
        to: ProcessorState,
    },

    /// The backend could not be brought up; fall back to serial.
    #[error("{processor} backend unavailable: {reason}")]
    BackendUnavailable {
        /// Backend.
        processor: ProcessorType,
        /// What went wrong.
        reason: String,
    },

    /// The active processor must be stopped before switching.
    #[error("cannot switch processors while {0} is active")]
    Busy(ProcessorType),

    /// A device buffer access fell outside the buffer.
    #[error("device buffer access {offset}..{end} exceeds {len} bytes")]
    BufferRange {
        /// First byte.
        offset: usize,
        /// One past the last byte.
        end: usize,
        /// Buffer length.
        len: usize,
    },

    /// No script is registered under this id.
    #[error("no script registered as {0}")]
    UnknownScript(StringId),

    /// A script name collides with another interned string.
    #[error("script name rejected: {0}")]
    ScriptName(#[from] StringIdError),

    /// Building clone views failed.
    #[error(transparent)]
    Data(#[from] DataError),
}
