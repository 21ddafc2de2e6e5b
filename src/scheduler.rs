//! Discrete-event simulation of jobs arriving, holding memory, and completing.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

use log::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::job::JobId;
use crate::memory::MemoryUsage;
use crate::system::MemorySystem;

/// Declaration order is the tie-break order: arrivals before completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    Arrival,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Event {
    pub time: u64,
    pub kind: EventKind,
    // Keeps same-time, same-kind events in the order they were scheduled
    seq: u64,
    pub job: JobId,
}

/// What happened to a job during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allocated { job: JobId, completes_at: u64 },
    Deferred { job: JobId, required: usize, available: usize },
    Completed { job: JobId, freed: usize },
    /// A waiting job that fit once memory was released
    Resumed { job: JobId, completes_at: u64 },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allocated { job, completes_at } => {
                write!(f, "{} allocated (will complete at t={})", job, completes_at)
            }
            Outcome::Deferred {
                job,
                required,
                available,
            } => write!(
                f,
                "{} needs {} frames, {} free; moved to waiting queue",
                job, required, available
            ),
            Outcome::Completed { job, freed } => {
                write!(f, "{} completed, {} frames released", job, freed)
            }
            Outcome::Resumed { job, completes_at } => write!(
                f,
                "Waiting {} allocated (will complete at t={})",
                job, completes_at
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub time: u64,
    pub outcomes: Vec<Outcome>,
    pub usage: MemoryUsage,
    pub waiting: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    /// Number of ticks simulated
    pub ticks: u64,
    pub completed: Vec<JobId>,
    /// Allocated but not yet completed when the run stopped
    pub running: Vec<JobId>,
    pub waiting: Vec<JobId>,
    pub hit_tick_limit: bool,
}

#[derive(Debug, Default)]
pub struct EventScheduler {
    events: BinaryHeap<Reverse<Event>>,
    waiting: VecDeque<JobId>,
    next_seq: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with an arrival queued for every job, in job order
    pub fn for_jobs(system: &MemorySystem) -> Self {
        let mut scheduler = Self::new();
        for job in system.jobs() {
            scheduler.schedule(job.arrival_time, EventKind::Arrival, job.id);
        }
        scheduler
    }

    pub fn schedule(&mut self, time: u64, kind: EventKind, job: JobId) {
        self.events.push(Reverse(Event {
            time,
            kind,
            seq: self.next_seq,
            job,
        }));
        self.next_seq += 1;
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn waiting(&self) -> Vec<JobId> {
        self.waiting.iter().copied().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.events.is_empty() && self.waiting.is_empty()
    }

    /// Advance simulated time one tick at a time until there is nothing left
    /// to do or `max_ticks` is passed.
    ///
    /// Every event due at or before the current tick is handled before the
    /// observer sees that tick's report.
    pub fn run<F>(
        &mut self,
        system: &mut MemorySystem,
        max_ticks: u64,
        mut observer: F,
    ) -> Result<SimulationReport>
    where
        F: FnMut(&TickReport),
    {
        let mut now = 0;
        let mut completed = Vec::new();
        let mut hit_tick_limit = false;

        info!(
            "Starting event simulation: {} events, {} frames",
            self.pending_events(),
            system.frames().len()
        );

        while !self.is_idle() {
            let mut outcomes = Vec::new();

            while let Some(&Reverse(event)) = self.events.peek() {
                if event.time > now {
                    break;
                }
                self.events.pop();
                self.handle(system, event, now, &mut outcomes, &mut completed)?;
            }

            observer(&TickReport {
                time: now,
                outcomes,
                usage: system.usage(),
                waiting: self.waiting.len(),
            });

            now += 1;
            if now > max_ticks {
                hit_tick_limit = !self.is_idle();
                if hit_tick_limit {
                    warn!(
                        "Reached tick limit {} with {} jobs waiting and {} events pending",
                        max_ticks,
                        self.waiting.len(),
                        self.pending_events()
                    );
                }
                break;
            }
        }

        let running = system
            .jobs()
            .iter()
            .filter(|j| j.start_time().is_some() && !completed.contains(&j.id))
            .map(|j| j.id)
            .collect();

        info!("Simulation finished after {} ticks", now);
        Ok(SimulationReport {
            ticks: now,
            completed,
            running,
            waiting: self.waiting(),
            hit_tick_limit,
        })
    }

    fn handle(
        &mut self,
        system: &mut MemorySystem,
        event: Event,
        now: u64,
        outcomes: &mut Vec<Outcome>,
        completed: &mut Vec<JobId>,
    ) -> Result<()> {
        match event.kind {
            EventKind::Arrival => {
                info!("[t={}] Arrival: {}", now, event.job);
                match self.try_start(system, event.job, now)? {
                    Ok(completes_at) => outcomes.push(Outcome::Allocated {
                        job: event.job,
                        completes_at,
                    }),
                    Err((required, available)) => {
                        info!(
                            "[t={}] {} deferred: needs {} frames, {} free",
                            now, event.job, required, available
                        );
                        self.waiting.push_back(event.job);
                        outcomes.push(Outcome::Deferred {
                            job: event.job,
                            required,
                            available,
                        });
                    }
                }
            }
            EventKind::Completion => {
                let freed = system.free_job_frames(event.job)?;
                info!("[t={}] Completion: {} released {} frames", now, event.job, freed);
                completed.push(event.job);
                outcomes.push(Outcome::Completed {
                    job: event.job,
                    freed,
                });
                self.drain_waiting(system, now, outcomes)?;
            }
        }
        Ok(())
    }

    /// One pass over the waiting queue; jobs that still do not fit go to the
    /// back in their original relative order
    fn drain_waiting(
        &mut self,
        system: &mut MemorySystem,
        now: u64,
        outcomes: &mut Vec<Outcome>,
    ) -> Result<()> {
        for _ in 0..self.waiting.len() {
            let Some(job) = self.waiting.pop_front() else {
                break;
            };
            match self.try_start(system, job, now)? {
                Ok(completes_at) => {
                    info!("[t={}] {} resumed from waiting queue", now, job);
                    outcomes.push(Outcome::Resumed { job, completes_at });
                }
                Err(_) => self.waiting.push_back(job),
            }
        }
        Ok(())
    }

    /// Allocate a job and schedule its completion.
    ///
    /// The inner `Err` carries (required, available) frames when it does not
    /// fit; any other failure is propagated.
    fn try_start(
        &mut self,
        system: &mut MemorySystem,
        job: JobId,
        now: u64,
    ) -> Result<std::result::Result<u64, (usize, usize)>> {
        match system.allocate_random(job) {
            Ok(placed) => {
                let completes_at = now.saturating_add(system.job(job)?.duration);
                system.mark_started(job, now)?;
                self.schedule(completes_at, EventKind::Completion, job);
                debug!(
                    "{} holds {} frames until t={}",
                    job,
                    placed.len(),
                    completes_at
                );
                Ok(Ok(completes_at))
            }
            Err(SimError::InsufficientMemory {
                required,
                available,
                ..
            }) => Ok(Err((required, available))),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use crate::memory::MemoryConfig;

    fn system_with(frames: usize, jobs: &[(u32, usize, u64, u64)]) -> MemorySystem {
        let mut sys = MemorySystem::with_seed(MemoryConfig::new(frames, 512), 1).unwrap();
        for &(id, size, arrival, duration) in jobs {
            let job = Job::new(JobId(id), size, 512)
                .unwrap()
                .with_schedule(arrival, duration);
            sys.add_job(job).unwrap();
        }
        sys
    }

    fn run(sys: &mut MemorySystem, max_ticks: u64) -> (SimulationReport, Vec<TickReport>) {
        let mut ticks = Vec::new();
        let report = EventScheduler::for_jobs(sys)
            .run(sys, max_ticks, |t| ticks.push(t.clone()))
            .unwrap();
        (report, ticks)
    }

    #[test]
    fn test_event_ordering() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(3, EventKind::Arrival, JobId(1));
        scheduler.schedule(2, EventKind::Completion, JobId(2));
        scheduler.schedule(2, EventKind::Arrival, JobId(3));
        scheduler.schedule(2, EventKind::Arrival, JobId(4));

        let order: Vec<(u64, EventKind, JobId)> =
            std::iter::from_fn(|| scheduler.events.pop().map(|Reverse(e)| (e.time, e.kind, e.job)))
                .collect();
        assert_eq!(
            order,
            vec![
                (2, EventKind::Arrival, JobId(3)),
                (2, EventKind::Arrival, JobId(4)),
                (2, EventKind::Completion, JobId(2)),
                (3, EventKind::Arrival, JobId(1)),
            ]
        );
    }

    #[test]
    fn test_waiting_job_starts_after_completion() {
        // One frame; both jobs arrive at t=0 and need it
        let mut sys = system_with(1, &[(1, 500, 0, 5), (2, 500, 0, 3)]);
        let (report, ticks) = run(&mut sys, 100);

        assert_eq!(
            ticks[0].outcomes,
            vec![
                Outcome::Allocated {
                    job: JobId(1),
                    completes_at: 5,
                },
                Outcome::Deferred {
                    job: JobId(2),
                    required: 1,
                    available: 0,
                },
            ]
        );
        for tick in &ticks[1..5] {
            assert!(tick.outcomes.is_empty());
            assert_eq!(tick.waiting, 1);
        }
        assert_eq!(
            ticks[5].outcomes,
            vec![
                Outcome::Completed {
                    job: JobId(1),
                    freed: 1,
                },
                Outcome::Resumed {
                    job: JobId(2),
                    completes_at: 8,
                },
            ]
        );
        assert_eq!(sys.job(JobId(2)).unwrap().start_time(), Some(5));
        assert_eq!(report.completed, vec![JobId(1), JobId(2)]);
        assert_eq!(report.ticks, 9);
        assert!(!report.hit_tick_limit);
        assert!(report.waiting.is_empty());
        assert_eq!(sys.usage().used_frames, 0);
    }

    #[test]
    fn test_waiting_queue_keeps_fifo_order() {
        // 2 frames: job 1 takes both; jobs 2 and 3 wait, 2 before 3
        let mut sys = system_with(
            2,
            &[(1, 1024, 0, 2), (2, 1024, 1, 1), (3, 512, 1, 1)],
        );
        let (report, ticks) = run(&mut sys, 50);

        assert_eq!(
            ticks[2].outcomes,
            vec![
                Outcome::Completed {
                    job: JobId(1),
                    freed: 2,
                },
                Outcome::Resumed {
                    job: JobId(2),
                    completes_at: 3,
                },
            ]
        );
        assert_eq!(ticks[2].waiting, 1);
        assert_eq!(report.completed, vec![JobId(1), JobId(2), JobId(3)]);
        assert_eq!(sys.job(JobId(3)).unwrap().start_time(), Some(3));
    }

    #[test]
    fn test_later_arrival() {
        let mut sys = system_with(4, &[(1, 100, 3, 2)]);
        let (report, ticks) = run(&mut sys, 50);

        assert!(ticks[..3].iter().all(|t| t.outcomes.is_empty()));
        assert_eq!(
            ticks[3].outcomes,
            vec![Outcome::Allocated {
                job: JobId(1),
                completes_at: 5,
            }]
        );
        assert_eq!(ticks[3].usage.used_frames, 1);
        assert_eq!(report.ticks, 6);
    }

    #[test]
    fn test_tick_limit_stops_starved_run() {
        // Job 2 can never fit in 2 frames
        let mut sys = system_with(2, &[(1, 512, 0, 1), (2, 2048, 0, 1)]);
        let (report, ticks) = run(&mut sys, 10);

        assert!(report.hit_tick_limit);
        assert_eq!(report.ticks, 11);
        assert_eq!(ticks.len(), 11);
        assert_eq!(report.completed, vec![JobId(1)]);
        assert_eq!(report.waiting, vec![JobId(2)]);
    }

    #[test]
    fn test_tick_limit_reports_running_jobs() {
        let mut sys = system_with(2, &[(1, 512, 0, 50)]);
        let (report, _) = run(&mut sys, 5);

        assert!(report.hit_tick_limit);
        assert!(report.completed.is_empty());
        assert_eq!(report.running, vec![JobId(1)]);
    }

    #[test]
    fn test_huge_duration_saturates_completion_time() {
        let report = crate::io::parse_jobs("1,100,1,18446744073709551615\n", 512).unwrap();
        let mut sys = MemorySystem::with_seed(MemoryConfig::new(2, 512), 1).unwrap();
        for job in report.jobs {
            sys.add_job(job).unwrap();
        }

        let (report, ticks) = run(&mut sys, 10);
        assert_eq!(
            ticks[1].outcomes,
            vec![Outcome::Allocated {
                job: JobId(1),
                completes_at: u64::MAX,
            }]
        );
        assert!(report.hit_tick_limit);
        assert_eq!(report.running, vec![JobId(1)]);
    }

    #[test]
    fn test_outcome_display() {
        let deferred = Outcome::Deferred {
            job: JobId(2),
            required: 3,
            available: 1,
        };
        assert_eq!(
            deferred.to_string(),
            "Job 2 needs 3 frames, 1 free; moved to waiting queue"
        );
        let resumed = Outcome::Resumed {
            job: JobId(2),
            completes_at: 9,
        };
        assert!(resumed.to_string().contains("t=9"));
    }

    #[test]
    fn test_empty_scheduler_does_nothing() {
        let mut sys = system_with(2, &[]);
        let (report, ticks) = run(&mut sys, 10);
        assert!(ticks.is_empty());
        assert_eq!(report.ticks, 0);
        assert!(!report.hit_tick_limit);
    }
}
