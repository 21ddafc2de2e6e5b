use std::fmt;

use crate::constants::*;
use crate::error::{Result, SimError};
use crate::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub usize);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of physical memory: how many frames and how large each one is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    pub frame_count: usize,
    pub frame_size: usize,
}

impl MemoryConfig {
    pub fn new(frame_count: usize, frame_size: usize) -> Self {
        MemoryConfig {
            frame_count,
            frame_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(SimError::InvalidConfig(
                "frame count must be positive".to_string(),
            ));
        }
        if self.frame_size == 0 {
            return Err(SimError::InvalidConfig(
                "frame size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Total bytes of simulated physical memory
    pub fn capacity(&self) -> usize {
        self.frame_count * self.frame_size
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_COUNT, DEFAULT_FRAME_SIZE)
    }
}

/// The (job, page) pair held by an occupied frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub job: JobId,
    pub page: usize,
}

/// A fixed-size slot of physical memory
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub size: usize,
    pub last_access_time: u64,
    pub referenced: bool,
    pub modified: bool,
    occupant: Option<Occupant>,
}

impl Frame {
    fn new(id: FrameId, size: usize) -> Self {
        Frame {
            id,
            size,
            last_access_time: 0,
            referenced: false,
            modified: false,
            occupant: None,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    #[inline]
    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    /// Physical address of the first byte of this frame
    #[inline]
    pub fn base_address(&self) -> usize {
        self.id.0 * self.size
    }

    /// Install a page brought in by a fault
    pub(crate) fn load(&mut self, occupant: Occupant, time: u64) {
        self.occupant = Some(occupant);
        self.last_access_time = time;
        self.referenced = true;
        self.modified = false;
    }

    /// Reserve for a page placed by up-front allocation; nothing has touched it yet
    pub(crate) fn reserve(&mut self, occupant: Occupant, time: u64) {
        self.occupant = Some(occupant);
        self.last_access_time = time;
        self.referenced = false;
        self.modified = false;
    }

    pub(crate) fn touch(&mut self, time: u64) {
        self.last_access_time = time;
        self.referenced = true;
    }

    pub(crate) fn clear(&mut self) {
        self.occupant = None;
        self.referenced = false;
        self.modified = false;
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            frame: self.id,
            free: self.is_free(),
            owner: self.occupant.map(|o| o.job),
            page: self.occupant.map(|o| o.page),
            last_access_time: self.last_access_time,
        }
    }
}

/// Physical memory: every frame, indexed by frame ID
#[derive(Debug, Clone)]
pub struct FrameTable {
    frames: Vec<Frame>,
    frame_size: usize,
}

impl FrameTable {
    pub fn new(config: &MemoryConfig) -> Result<Self> {
        config.validate()?;
        let frames = (0..config.frame_count)
            .map(|i| Frame::new(FrameId(i), config.frame_size))
            .collect();
        Ok(FrameTable {
            frames,
            frame_size: config.frame_size,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn get(&self, frame: FrameId) -> Option<&Frame> {
        self.frames.get(frame.0)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, frame: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(frame.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// First-fit scan for an unoccupied frame
    pub fn find_free_frame(&self) -> Option<FrameId> {
        self.frames.iter().position(Frame::is_free).map(FrameId)
    }

    pub fn free_frames(&self) -> Vec<FrameId> {
        self.frames
            .iter()
            .filter(|f| f.is_free())
            .map(|f| f.id)
            .collect()
    }

    pub fn free_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_free()).count()
    }

    pub fn used_count(&self) -> usize {
        self.len() - self.free_count()
    }

    /// Frame holding `page` of `job`, if resident
    pub fn locate(&self, job: JobId, page: usize) -> Option<FrameId> {
        self.frames
            .iter()
            .find(|f| f.occupant == Some(Occupant { job, page }))
            .map(|f| f.id)
    }

    pub fn owned_by(&self, job: JobId) -> Vec<FrameId> {
        self.frames
            .iter()
            .filter(|f| f.occupant.is_some_and(|o| o.job == job))
            .map(|f| f.id)
            .collect()
    }

    pub fn usage(&self) -> MemoryUsage {
        MemoryUsage::new(self.len(), self.used_count())
    }

    pub fn snapshot(&self) -> Vec<FrameSnapshot> {
        self.frames.iter().map(Frame::snapshot).collect()
    }
}

/// Row of the memory map table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub frame: FrameId,
    pub free: bool,
    pub owner: Option<JobId>,
    pub page: Option<usize>,
    pub last_access_time: u64,
}

/// Aggregate occupancy of physical memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
    pub usage_percent: f64,
}

impl MemoryUsage {
    pub fn new(total_frames: usize, used_frames: usize) -> Self {
        let usage_percent = if total_frames == 0 {
            0.0
        } else {
            used_frames as f64 * 100.0 / total_frames as f64
        };
        MemoryUsage {
            total_frames,
            used_frames,
            free_frames: total_frames - used_frames,
            usage_percent,
        }
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} frames used ({:.1}%), {} free",
            self.used_frames, self.total_frames, self.usage_percent, self.free_frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(count: usize, size: usize) -> FrameTable {
        FrameTable::new(&MemoryConfig::new(count, size)).unwrap()
    }

    #[test]
    fn test_table_initialization() {
        let frames = table(4, 512);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.frame_size(), 512);
        assert_eq!(frames.free_count(), 4);
        assert!(frames.iter().all(|f| f.is_free() && f.size == 512));
        assert_eq!(frames.get(FrameId(4)).map(|f| f.id), None);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(matches!(
            FrameTable::new(&MemoryConfig::new(0, 512)),
            Err(SimError::InvalidConfig(_))
        ));
        assert!(matches!(
            FrameTable::new(&MemoryConfig::new(8, 0)),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = MemoryConfig::default();
        assert_eq!(config.frame_count, DEFAULT_FRAME_COUNT);
        assert_eq!(config.frame_size, DEFAULT_FRAME_SIZE);
        assert_eq!(config.capacity(), DEFAULT_FRAME_COUNT * DEFAULT_FRAME_SIZE);
    }

    #[test]
    fn test_find_free_frame_is_first_fit() {
        let mut frames = table(3, 256);
        let occupant = Occupant {
            job: JobId(1),
            page: 0,
        };
        frames.get_mut(FrameId(0)).unwrap().load(occupant, 1);
        assert_eq!(frames.find_free_frame(), Some(FrameId(1)));

        frames.get_mut(FrameId(1)).unwrap().load(occupant, 2);
        frames.get_mut(FrameId(2)).unwrap().load(occupant, 3);
        assert_eq!(frames.find_free_frame(), None);
    }

    #[test]
    fn test_load_and_clear() {
        let mut frames = table(2, 256);
        let frame = frames.get_mut(FrameId(1)).unwrap();
        frame.load(
            Occupant {
                job: JobId(3),
                page: 2,
            },
            7,
        );
        assert!(!frame.is_free());
        assert!(frame.referenced);
        assert!(!frame.modified);
        assert_eq!(frame.last_access_time, 7);

        assert_eq!(frames.locate(JobId(3), 2), Some(FrameId(1)));
        assert_eq!(frames.locate(JobId(3), 1), None);
        assert_eq!(frames.owned_by(JobId(3)), vec![FrameId(1)]);

        frames.get_mut(FrameId(1)).unwrap().clear();
        assert_eq!(frames.free_count(), 2);
        assert!(frames.owned_by(JobId(3)).is_empty());
    }

    #[test]
    fn test_reserve_leaves_reference_bit_clear() {
        let mut frames = table(1, 256);
        let frame = frames.get_mut(FrameId(0)).unwrap();
        frame.reserve(
            Occupant {
                job: JobId(1),
                page: 0,
            },
            0,
        );
        assert!(!frame.is_free());
        assert!(!frame.referenced);

        frame.touch(5);
        assert!(frame.referenced);
        assert_eq!(frame.last_access_time, 5);
    }

    #[test]
    fn test_base_address() {
        let frames = table(11, 512);
        assert_eq!(frames.get(FrameId(0)).unwrap().base_address(), 0);
        assert_eq!(frames.get(FrameId(4)).unwrap().base_address(), 2048);
        assert_eq!(frames.get(FrameId(10)).unwrap().base_address(), 5120);
    }

    #[test]
    fn test_usage() {
        let mut frames = table(4, 128);
        let occupant = Occupant {
            job: JobId(1),
            page: 0,
        };
        frames.get_mut(FrameId(2)).unwrap().load(occupant, 1);

        let usage = frames.usage();
        assert_eq!(usage.total_frames, 4);
        assert_eq!(usage.used_frames, 1);
        assert_eq!(usage.free_frames, 3);
        assert_eq!(usage.usage_percent, 25.0);
        assert!(usage.to_string().contains("1/4 frames used"));
    }

    #[test]
    fn test_snapshot() {
        let mut frames = table(2, 128);
        frames.get_mut(FrameId(1)).unwrap().load(
            Occupant {
                job: JobId(5),
                page: 3,
            },
            9,
        );
        let snap = frames.snapshot();
        assert_eq!(snap[0].free, true);
        assert_eq!(snap[0].owner, None);
        assert_eq!(
            snap[1],
            FrameSnapshot {
                frame: FrameId(1),
                free: false,
                owner: Some(JobId(5)),
                page: Some(3),
                last_access_time: 9,
            }
        );
    }
}
