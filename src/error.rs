//! Error taxonomy for the simulator.

use std::fmt;

use crate::job::JobId;

/// Every failure the simulator can report.
///
/// Only `InvalidConfig` and `EmptyJobSet` are fatal, and only at startup; the
/// rest are surfaced to the caller as outcomes of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Non-positive frame count, frame size or page size
    InvalidConfig(String),
    /// Not enough free frames to place every page of a job at once
    InsufficientMemory {
        job: JobId,
        required: usize,
        available: usize,
    },
    /// Logical address or page number outside the job
    OutOfBounds { job: JobId, address: i64, limit: usize },
    /// Static resolution of a page that has no frame
    PageNotLoaded { job: JobId, page: usize },
    /// Page table points somewhere the frame table cannot back
    InvalidMapping(String),
    /// Import record that could not be parsed
    UnparseableRecord { line: usize, reason: String },
    UnknownJob(JobId),
    DuplicateJob(JobId),
    EmptyJobSet,
    Io(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SimError::InsufficientMemory {
                job,
                required,
                available,
            } => write!(
                f,
                "Not enough free frames for {}: needs {}, {} free",
                job, required, available
            ),
            SimError::OutOfBounds {
                job,
                address,
                limit,
            } => write!(
                f,
                "{} is out of bounds for {} (valid range 0..{})",
                address, job, limit
            ),
            SimError::PageNotLoaded { job, page } => {
                write!(f, "Page {} of {} is not loaded in memory", page, job)
            }
            SimError::InvalidMapping(msg) => write!(f, "Invalid mapping: {}", msg),
            SimError::UnparseableRecord { line, reason } => {
                write!(f, "Skipping record on line {}: {}", line, reason)
            }
            SimError::UnknownJob(job) => write!(f, "{} not found", job),
            SimError::DuplicateJob(job) => write!(f, "{} already exists", job),
            SimError::EmptyJobSet => write!(f, "No jobs to simulate"),
            SimError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
