//! Victim selection when a fault finds no free frame.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::memory::{Frame, FrameId, FrameTable};

/// Which replacement algorithm future faults consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    #[default]
    Fifo,
    Lru,
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Fifo => write!(f, "FIFO"),
            ReplacementPolicy::Lru => write!(f, "LRU"),
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(ReplacementPolicy::Fifo),
            "lru" => Ok(ReplacementPolicy::Lru),
            _ => Err(format!("Unknown replacement policy: {} (expected fifo or lru)", s)),
        }
    }
}

pub trait PageReplacementPolicy {
    /// Choose the frame to evict. Only called when every frame is occupied.
    fn pick_victim(&mut self, frames: &FrameTable) -> FrameId;
}

/// Evicts in load order
#[derive(Debug, Default)]
pub struct Fifo {
    queue: VecDeque<FrameId>,
}

impl Fifo {
    pub fn record_load(&mut self, frame: FrameId) {
        self.queue.push_back(frame);
    }

    pub fn forget(&mut self, frame: FrameId) {
        self.queue.retain(|&f| f != frame);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn queued(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.queue.iter().copied()
    }
}

impl PageReplacementPolicy for Fifo {
    fn pick_victim(&mut self, _frames: &FrameTable) -> FrameId {
        // Frames filled while another policy was active never entered the queue
        self.queue.pop_front().unwrap_or(FrameId(0))
    }
}

/// Evicts the frame with the oldest access stamp across the whole table
#[derive(Debug, Default)]
pub struct Lru;

impl PageReplacementPolicy for Lru {
    fn pick_victim(&mut self, frames: &FrameTable) -> FrameId {
        // min_by_key keeps the first minimum, so ties go to the lowest index
        frames
            .iter()
            .min_by_key(|f| f.last_access_time)
            .map(|f: &Frame| f.id)
            .unwrap_or(FrameId(0))
    }
}

/// Replacement state owned by the memory system.
///
/// Switching policy does not rebuild the FIFO queue or touch access stamps;
/// it only changes which algorithm the next fault asks.
#[derive(Debug, Default)]
pub struct Replacer {
    active: ReplacementPolicy,
    fifo: Fifo,
    lru: Lru,
}

impl Replacer {
    pub fn new(policy: ReplacementPolicy) -> Self {
        Replacer {
            active: policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.active
    }

    pub fn set_policy(&mut self, policy: ReplacementPolicy) {
        self.active = policy;
    }

    /// Note a freshly installed page. The FIFO queue only grows while FIFO is active.
    pub fn record_load(&mut self, frame: FrameId) {
        if self.active == ReplacementPolicy::Fifo {
            self.fifo.record_load(frame);
        }
    }

    pub fn forget(&mut self, frame: FrameId) {
        self.fifo.forget(frame);
    }

    pub fn reset(&mut self) {
        self.fifo.clear();
    }

    pub fn fifo_queue(&self) -> Vec<FrameId> {
        self.fifo.queued().collect()
    }

    pub fn select_victim(&mut self, frames: &FrameTable) -> FrameId {
        match self.active {
            ReplacementPolicy::Fifo => self.fifo.pick_victim(frames),
            ReplacementPolicy::Lru => self.lru.pick_victim(frames),
        }
    }
}
