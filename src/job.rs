//! Jobs and their division into pages.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{DEFAULT_ARRIVAL_TIME, DURATION_DIVISOR, MIN_DURATION};
use crate::error::{Result, SimError};
use crate::memory::FrameId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {}", self.0)
    }
}

/// Result of cutting a job's address space into pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub pages: Vec<usize>,
    pub internal_fragmentation: usize,
}

/// Divide `size` bytes into pages of `page_size` bytes.
///
/// The last page is partially filled when `size` is not a multiple of
/// `page_size`; the unused tail of that page is the internal fragmentation.
/// A zero-size job has no pages.
pub fn divide_into_pages(size: usize, page_size: usize) -> Result<Segmentation> {
    if page_size == 0 {
        return Err(SimError::InvalidConfig(
            "page size must be positive".to_string(),
        ));
    }

    let mut num_pages = size / page_size;
    let remainder = size % page_size;

    let internal_fragmentation = if remainder > 0 {
        num_pages += 1;
        page_size - remainder
    } else {
        0
    };

    Ok(Segmentation {
        pages: (0..num_pages).collect(),
        internal_fragmentation,
    })
}

/// A simulated process, characterized only by its size and schedule
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub size: usize,
    pub page_size: usize,
    pub pages: Vec<usize>,
    pub internal_fragmentation: usize,
    pub arrival_time: u64,
    pub duration: u64,

    // Resident pages only; its key set is the loaded-page set.
    page_table: BTreeMap<usize, FrameId>,
    page_faults: u64,
    start_time: Option<u64>,
}

impl Job {
    pub fn new(id: JobId, size: usize, page_size: usize) -> Result<Self> {
        let Segmentation {
            pages,
            internal_fragmentation,
        } = divide_into_pages(size, page_size)?;

        Ok(Job {
            id,
            size,
            page_size,
            pages,
            internal_fragmentation,
            arrival_time: DEFAULT_ARRIVAL_TIME,
            duration: Self::default_duration(size),
            page_table: BTreeMap::new(),
            page_faults: 0,
            start_time: None,
        })
    }

    pub fn with_schedule(mut self, arrival_time: u64, duration: u64) -> Self {
        self.arrival_time = arrival_time;
        self.duration = duration;
        self
    }

    /// Run time for jobs imported without an explicit duration
    pub fn default_duration(size: usize) -> u64 {
        ((size / DURATION_DIVISOR) as u64).max(MIN_DURATION)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    #[inline]
    pub fn is_resident(&self, page: usize) -> bool {
        self.page_table.contains_key(&page)
    }

    #[inline]
    pub fn frame_of(&self, page: usize) -> Option<FrameId> {
        self.page_table.get(&page).copied()
    }

    pub fn loaded_page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Frames currently backing this job, in page order
    pub fn resident_frames(&self) -> impl Iterator<Item = (usize, FrameId)> + '_ {
        self.page_table.iter().map(|(&page, &frame)| (page, frame))
    }

    /// Split an in-range logical address into (page number, offset)
    #[inline]
    pub fn split_address(&self, address: usize) -> (usize, usize) {
        (address / self.page_size, address % self.page_size)
    }

    pub(crate) fn map_page(&mut self, page: usize, frame: FrameId) {
        self.page_table.insert(page, frame);
    }

    pub(crate) fn unmap_page(&mut self, page: usize) -> Option<FrameId> {
        self.page_table.remove(&page)
    }

    pub(crate) fn clear_page_table(&mut self) {
        self.page_table.clear();
    }

    /// Re-cut the job into pages of a new size; nothing stays resident
    pub(crate) fn repaginate(&mut self, page_size: usize, segmentation: Segmentation) {
        self.page_size = page_size;
        self.pages = segmentation.pages;
        self.internal_fragmentation = segmentation.internal_fragmentation;
        self.page_table.clear();
    }

    pub(crate) fn record_fault(&mut self) {
        self.page_faults += 1;
    }

    pub(crate) fn mark_started(&mut self, time: u64) {
        self.start_time = Some(time);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            size: self.size,
            page_count: self.page_count(),
            loaded_page_count: self.loaded_page_count(),
            page_faults: self.page_faults,
            internal_fragmentation: self.internal_fragmentation,
            arrival_time: self.arrival_time,
            duration: self.duration,
            start_time: self.start_time,
        }
    }
}

/// Row of the job table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub size: usize,
    pub page_count: usize,
    pub loaded_page_count: usize,
    pub page_faults: u64,
    pub internal_fragmentation: usize,
    pub arrival_time: u64,
    pub duration: u64,
    pub start_time: Option<u64>,
}

/// Row of the page map table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub job: JobId,
    pub page: usize,
    pub frame: Option<FrameId>,
    pub resident: bool,
    pub modified: bool,
    pub referenced: bool,
}
