//! Error types for the poster pipeline.
//!
//! Errors are split into two layers:
//!
//! - [`StageError`] - failures inside the pipeline. These are caught at the
//!   stage executor boundary and written into the job/slot record; they are
//!   never raised to the scheduler, so background tasks cannot crash the
//!   process.
//! - [`RequestError`] - synchronous failures returned to the caller of the
//!   service surface (unknown job, slot not ready, locked radius).

use crate::job::slot::Radius;
use thiserror::Error;

/// Place name could not be resolved to coordinates.
///
/// Terminal for the job: without coordinates no stage can run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("place not found: {place}")]
pub struct LocateError {
    /// The place name that failed to resolve.
    pub place: String,
}

impl LocateError {
    pub fn new(place: impl Into<String>) -> Self {
        Self {
            place: place.into(),
        }
    }
}

/// A geodata fetch failed (timeout, network failure, bad response).
///
/// Terminal for the job only when it hits the initial radius; otherwise the
/// failure is confined to the affected radius slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed: {message}")]
pub struct FetchError {
    /// Human-readable cause.
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rendering failed (malformed geometry or I/O failure).
///
/// Terminal for the attempted render only; the cached dataset stays usable
/// for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    /// Human-readable cause.
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of a single pipeline stage run.
///
/// Produced by the stage executor and the re-render path. Variants carry the
/// collaborator error where one exists; `Cancelled` and `JobGone` mark the
/// two ways a run stops without a collaborator failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// The job's cancellation token fired; the run stopped cooperatively.
    #[error("job cancelled")]
    Cancelled,

    /// The job record disappeared mid-flight (evicted by the sweeper).
    #[error("job no longer exists")]
    JobGone,
}

/// Synchronous, client-facing errors from the service surface.
///
/// These never represent a pipeline fault: handlers translate them directly
/// into responses. Status polling never returns an error at all - unknown
/// jobs yield a well-formed "not found" snapshot instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Unknown job identifier.
    #[error("job not found")]
    NotFound,

    /// The requested slot has not been populated yet.
    #[error("radius {0} not ready")]
    NotReady(Radius),

    /// The requested radius is locked (restricted without entitlement).
    #[error("radius {0} is locked")]
    Locked(Radius),

    /// Unknown theme identifier.
    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    /// A re-render was attempted and the renderer failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}
