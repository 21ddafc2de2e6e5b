pub const DEFAULT_FRAME_COUNT: usize = 10;
pub const DEFAULT_FRAME_SIZE: usize = 512;

// Bound on simulated time for the event-driven run
pub const DEFAULT_MAX_TICKS: u64 = 200;

// Imported jobs without a duration run for max(1, size / DURATION_DIVISOR) ticks
pub const DURATION_DIVISOR: usize = 500;
pub const MIN_DURATION: u64 = 1;

pub const DEFAULT_ARRIVAL_TIME: u64 = 0;
