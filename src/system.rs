//! The memory system aggregate: physical memory, jobs, clock and replacement
//! state behind one command/query API.

use hashbrown::HashMap;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, SimError};
use crate::job::{divide_into_pages, Job, JobId, JobSnapshot, PageSnapshot};
use crate::memory::{FrameId, FrameSnapshot, FrameTable, MemoryConfig, MemoryUsage, Occupant};
use crate::replacement::{ReplacementPolicy, Replacer};
use crate::translation::{check_bounds, translate, Operation, PagingMode, Translation};

/// A page pushed out of memory to make room for another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub frame: FrameId,
    pub job: JobId,
    pub page: usize,
}

/// Outcome of touching a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    Hit {
        frame: FrameId,
    },
    Fault {
        frame: FrameId,
        evicted: Option<Eviction>,
    },
}

impl PageLoad {
    pub fn frame(&self) -> FrameId {
        match *self {
            PageLoad::Hit { frame } | PageLoad::Fault { frame, .. } => frame,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, PageLoad::Fault { .. })
    }
}

/// Result of resolving a logical address; `load` is set when resolution went
/// through the demand pager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub translation: Translation,
    pub load: Option<PageLoad>,
}

pub struct MemorySystem {
    config: MemoryConfig,
    frames: FrameTable,
    replacer: Replacer,
    // Advanced once per page access, hit or fault
    clock: u64,
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    rng: StdRng,
}

impl MemorySystem {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        Self::build(config, StdRng::from_os_rng())
    }

    /// Same as `new`, but random frame placement is reproducible
    pub fn with_seed(config: MemoryConfig, seed: u64) -> Result<Self> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: MemoryConfig, rng: StdRng) -> Result<Self> {
        let frames = FrameTable::new(&config)?;
        Ok(MemorySystem {
            config,
            frames,
            replacer: Replacer::default(),
            clock: 0,
            jobs: Vec::new(),
            index: HashMap::new(),
            rng,
        })
    }

    pub fn config(&self) -> MemoryConfig {
        self.config
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.replacer.policy()
    }

    /// Affects future faults only; existing queue and stamps are left as they are.
    pub fn set_replacement_policy(&mut self, policy: ReplacementPolicy) {
        info!("Replacement policy set to {}", policy);
        self.replacer.set_policy(policy);
    }

    pub fn fifo_queue(&self) -> Vec<FrameId> {
        self.replacer.fifo_queue()
    }

    /// Replace physical memory with `frame_count` free frames of `frame_size` bytes.
    ///
    /// Pages are frame-sized, so every job is divided again at `frame_size`
    /// and loses its resident pages. The FIFO queue and clock start over. An
    /// invalid shape is rejected before anything changes.
    pub fn configure_memory(&mut self, frame_count: usize, frame_size: usize) -> Result<()> {
        let config = MemoryConfig::new(frame_count, frame_size);
        let frames = FrameTable::new(&config)?;
        let segmentations = self
            .jobs
            .iter()
            .map(|job| divide_into_pages(job.size, frame_size))
            .collect::<Result<Vec<_>>>()?;

        self.config = config;
        self.frames = frames;
        self.replacer.reset();
        self.clock = 0;
        for (job, segmentation) in self.jobs.iter_mut().zip(segmentations) {
            job.repaginate(frame_size, segmentation);
        }

        info!(
            "Configured memory: {} frames of {} bytes ({} bytes total)",
            frame_count,
            frame_size,
            config.capacity()
        );
        Ok(())
    }

    pub fn add_job(&mut self, job: Job) -> Result<()> {
        if self.index.contains_key(&job.id) {
            return Err(SimError::DuplicateJob(job.id));
        }
        debug!(
            "Added {} ({} bytes, {} pages)",
            job.id,
            job.size,
            job.page_count()
        );
        self.index.insert(job.id, self.jobs.len());
        self.jobs.push(job);
        Ok(())
    }

    fn index_of(&self, id: JobId) -> Result<usize> {
        self.index.get(&id).copied().ok_or(SimError::UnknownJob(id))
    }

    pub fn job(&self, id: JobId) -> Result<&Job> {
        Ok(&self.jobs[self.index_of(id)?])
    }

    /// Jobs in the order they were added
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn mark_started(&mut self, id: JobId, time: u64) -> Result<()> {
        let idx = self.index_of(id)?;
        self.jobs[idx].mark_started(time);
        Ok(())
    }

    /// Place every non-resident page of a job into free frames picked at random.
    ///
    /// All or nothing: when there are fewer free frames than pages to place,
    /// `InsufficientMemory` is returned and memory is untouched. Returns the
    /// (page, frame) pairs that were placed.
    pub fn allocate_random(&mut self, id: JobId) -> Result<Vec<(usize, FrameId)>> {
        let idx = self.index_of(id)?;
        let job = &self.jobs[idx];
        let pending: Vec<usize> = job
            .pages
            .iter()
            .copied()
            .filter(|&page| !job.is_resident(page))
            .collect();

        let mut free = self.frames.free_frames();
        if pending.len() > free.len() {
            warn!(
                "Not enough free frames to load {}: needs {}, {} free",
                id,
                pending.len(),
                free.len()
            );
            return Err(SimError::InsufficientMemory {
                job: id,
                required: pending.len(),
                available: free.len(),
            });
        }

        free.shuffle(&mut self.rng);

        let placed: Vec<(usize, FrameId)> = pending.into_iter().zip(free).collect();
        for &(page, frame_id) in &placed {
            if let Some(frame) = self.frames.get_mut(frame_id) {
                frame.reserve(Occupant { job: id, page }, self.clock);
            }
            self.jobs[idx].map_page(page, frame_id);
        }

        debug!("Allocated {} pages of {}", placed.len(), id);
        Ok(placed)
    }

    /// Run `allocate_random` over every job in order, collecting the failures
    pub fn allocate_all(&mut self) -> Vec<SimError> {
        let ids: Vec<JobId> = self.jobs.iter().map(|j| j.id).collect();
        ids.into_iter()
            .filter_map(|id| self.allocate_random(id).err())
            .collect()
    }

    /// Release every frame held by a job. Returns how many were released.
    pub fn free_job_frames(&mut self, id: JobId) -> Result<usize> {
        let idx = self.index_of(id)?;
        let owned = self.frames.owned_by(id);

        for &frame_id in &owned {
            if let Some(frame) = self.frames.get_mut(frame_id) {
                frame.clear();
            }
            self.replacer.forget(frame_id);
        }
        self.jobs[idx].clear_page_table();

        if !owned.is_empty() {
            debug!("Freed {} frames held by {}", owned.len(), id);
        }
        Ok(owned.len())
    }

    /// Make `page` of job `id` resident, faulting it in if needed.
    ///
    /// A fault takes the first free frame, or asks the active replacement
    /// policy for a victim and evicts its page from whichever job owns it.
    /// The eviction and the install happen within this call.
    pub fn load_page(&mut self, id: JobId, page: usize) -> Result<PageLoad> {
        let idx = self.index_of(id)?;
        let job = &self.jobs[idx];
        if page >= job.page_count() {
            return Err(SimError::OutOfBounds {
                job: id,
                address: page as i64,
                limit: job.page_count(),
            });
        }

        if let Some(frame_id) = job.frame_of(page) {
            let now = self.clock + 1;
            let frame = self.frames.get_mut(frame_id).ok_or_else(|| {
                SimError::InvalidMapping(format!(
                    "page {} of {} maps to missing frame {}",
                    page, id, frame_id
                ))
            })?;
            frame.touch(now);
            self.clock = now;
            debug!("{} page {} hit in frame {}", id, page, frame_id);
            return Ok(PageLoad::Hit { frame: frame_id });
        }

        self.clock += 1;
        self.jobs[idx].record_fault();

        let (frame_id, evicted) = match self.frames.find_free_frame() {
            Some(free) => (free, None),
            None => {
                let victim = self.replacer.select_victim(&self.frames);
                (victim, self.evict(victim)?)
            }
        };

        let frame = self.frames.get_mut(frame_id).ok_or_else(|| {
            SimError::InvalidMapping(format!("frame {} does not exist", frame_id))
        })?;
        frame.load(Occupant { job: id, page }, self.clock);
        self.jobs[idx].map_page(page, frame_id);
        self.replacer.record_load(frame_id);

        info!(
            "Page fault: {} page {} loaded into frame {} (faults: {})",
            id,
            page,
            frame_id,
            self.jobs[idx].page_faults()
        );
        Ok(PageLoad::Fault {
            frame: frame_id,
            evicted,
        })
    }

    fn evict(&mut self, frame_id: FrameId) -> Result<Option<Eviction>> {
        let frame = self.frames.get_mut(frame_id).ok_or_else(|| {
            SimError::InvalidMapping(format!("victim frame {} does not exist", frame_id))
        })?;
        let Some(occupant) = frame.occupant() else {
            return Ok(None);
        };
        frame.clear();

        if let Some(&owner) = self.index.get(&occupant.job) {
            self.jobs[owner].unmap_page(occupant.page);
        }

        info!(
            "Evicted {} page {} from frame {} ({})",
            occupant.job,
            occupant.page,
            frame_id,
            self.replacer.policy()
        );
        Ok(Some(Eviction {
            frame: frame_id,
            job: occupant.job,
            page: occupant.page,
        }))
    }

    /// Resolve a logical address of job `id` for reading
    pub fn resolve_address(&mut self, id: JobId, address: i64, mode: PagingMode) -> Result<Resolution> {
        self.access_address(id, address, Operation::Read, mode)
    }

    /// Resolve a logical address and apply the reference to its frame.
    ///
    /// In demand mode the page is loaded (or its access stamp refreshed) before
    /// translation. Static mode only translates. Out-of-bounds addresses fail
    /// before anything is touched. Writes set the frame's modified bit.
    pub fn access_address(
        &mut self,
        id: JobId,
        address: i64,
        operation: Operation,
        mode: PagingMode,
    ) -> Result<Resolution> {
        let idx = self.index_of(id)?;
        let in_range = check_bounds(&self.jobs[idx], address)?;

        let load = match mode {
            PagingMode::Static => None,
            PagingMode::Demand => {
                let (page, _) = self.jobs[idx].split_address(in_range);
                Some(self.load_page(id, page)?)
            }
        };

        let translation = translate(&self.jobs[idx], &self.frames, address)?;
        if operation == Operation::Write {
            if let Some(frame) = self.frames.get_mut(translation.frame) {
                frame.modified = true;
            }
        }

        Ok(Resolution { translation, load })
    }

    pub fn job_snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs.iter().map(Job::snapshot).collect()
    }

    pub fn page_snapshots(&self) -> Vec<PageSnapshot> {
        self.jobs
            .iter()
            .flat_map(|job| {
                job.pages.iter().map(move |&page| {
                    let frame = job.frame_of(page);
                    let bits = frame.and_then(|f| self.frames.get(f));
                    PageSnapshot {
                        job: job.id,
                        page,
                        frame,
                        resident: frame.is_some(),
                        modified: bits.is_some_and(|f| f.modified),
                        referenced: bits.is_some_and(|f| f.referenced),
                    }
                })
            })
            .collect()
    }

    pub fn frame_snapshots(&self) -> Vec<FrameSnapshot> {
        self.frames.snapshot()
    }

    pub fn usage(&self) -> MemoryUsage {
        self.frames.usage()
    }
}
