use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimError};
use crate::job::Job;
use crate::memory::{FrameId, FrameTable};

/// Kind of memory reference made through a logical address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// How a miss during resolution is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagingMode {
    /// Pages are placed up front; a miss is reported as `PageNotLoaded`
    Static,
    /// A miss loads the page on the spot
    #[default]
    Demand,
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagingMode::Static => write!(f, "static"),
            PagingMode::Demand => write!(f, "demand"),
        }
    }
}

impl FromStr for PagingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(PagingMode::Static),
            "demand" => Ok(PagingMode::Demand),
            _ => Err(format!("Unknown paging mode: {}", s)),
        }
    }
}

/// A logical address resolved down to its physical location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub logical_address: usize,
    pub page_number: usize,
    pub offset: usize,
    pub frame: FrameId,
    pub physical_address: usize,
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Logical {} -> Page {} Offset {} -> Physical {} (Frame {})",
            self.logical_address,
            self.page_number,
            self.offset,
            self.physical_address,
            self.frame
        )
    }
}

/// Validate a logical address against the job's size.
///
/// Returns the address as an index into the job's address space.
pub fn check_bounds(job: &Job, logical_address: i64) -> Result<usize> {
    match usize::try_from(logical_address) {
        Ok(address) if address < job.size => Ok(address),
        _ => Err(SimError::OutOfBounds {
            job: job.id,
            address: logical_address,
            limit: job.size,
        }),
    }
}

/// Translate a logical address through the job's page table.
///
/// Never loads anything: a non-resident page is `PageNotLoaded`. The mapped
/// frame must exist and be large enough to hold the offset, otherwise the page
/// table is inconsistent with physical memory and `InvalidMapping` is returned
/// instead of a made-up address.
pub fn translate(job: &Job, frames: &FrameTable, logical_address: i64) -> Result<Translation> {
    let address = check_bounds(job, logical_address)?;
    let (page_number, offset) = job.split_address(address);

    let frame_id = job.frame_of(page_number).ok_or(SimError::PageNotLoaded {
        job: job.id,
        page: page_number,
    })?;

    let frame = frames.get(frame_id).ok_or_else(|| {
        SimError::InvalidMapping(format!(
            "page {} of {} maps to frame {}, but memory has {} frames",
            page_number,
            job.id,
            frame_id,
            frames.len()
        ))
    })?;

    if offset >= frame.size {
        return Err(SimError::InvalidMapping(format!(
            "offset {} exceeds frame size {}",
            offset, frame.size
        )));
    }

    Ok(Translation {
        logical_address: address,
        page_number,
        offset,
        frame: frame_id,
        physical_address: frame.base_address() + offset,
    })
}
