pub mod command;
pub mod constants;
pub mod display;
pub mod error;
pub mod io;
pub mod job;
pub mod memory;
pub mod replacement;
pub mod scheduler;
pub mod system;
pub mod translation;

// Re-export commonly used items for convenience
pub use error::{Result, SimError};
pub use job::{Job, JobId};
pub use memory::{FrameId, MemoryConfig};
pub use replacement::ReplacementPolicy;
pub use scheduler::EventScheduler;
pub use system::{MemorySystem, PageLoad};
pub use translation::{Operation, PagingMode, Translation};
