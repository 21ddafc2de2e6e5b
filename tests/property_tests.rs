//! Properties that must hold for any job shape and access sequence.

use std::collections::HashSet;

use proptest::prelude::*;

use paged_memory_sim::job::divide_into_pages;
use paged_memory_sim::{Job, JobId, MemoryConfig, MemorySystem, PagingMode, SimError};

const PAGE: usize = 256;

fn system_with_job(frames: usize, size: usize, seed: u64) -> MemorySystem {
    let mut system = MemorySystem::with_seed(MemoryConfig::new(frames, PAGE), seed).unwrap();
    system.add_job(Job::new(JobId(1), size, PAGE).unwrap()).unwrap();
    system
}

proptest! {
    #[test]
    fn prop_pages_cover_job(size in 0usize..100_000, page_size in 1usize..4096) {
        let seg = divide_into_pages(size, page_size).unwrap();

        prop_assert_eq!(seg.pages.len(), size.div_ceil(page_size));
        prop_assert!(seg.internal_fragmentation < page_size);
        prop_assert_eq!(seg.pages.len() * page_size, size + seg.internal_fragmentation);
        if size % page_size == 0 {
            prop_assert_eq!(seg.internal_fragmentation, 0);
        }
    }

    #[test]
    fn prop_random_allocation_is_all_or_nothing(
        frames in 1usize..32,
        size in 0usize..(40 * PAGE),
        seed in any::<u64>(),
    ) {
        let mut system = system_with_job(frames, size, seed);
        let pages = system.job(JobId(1)).unwrap().page_count();
        let free_before = system.frames().free_count();

        match system.allocate_random(JobId(1)) {
            Ok(placed) => {
                prop_assert!(pages <= free_before);
                prop_assert_eq!(placed.len(), pages);
                prop_assert_eq!(system.frames().free_count(), free_before - pages);
                let distinct: HashSet<_> = placed.iter().map(|&(_, f)| f).collect();
                prop_assert_eq!(distinct.len(), pages);
            }
            Err(SimError::InsufficientMemory { required, available, .. }) => {
                prop_assert!(pages > free_before);
                prop_assert_eq!(required, pages);
                prop_assert_eq!(available, free_before);
                prop_assert_eq!(system.frames().free_count(), free_before);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn prop_static_translation_arithmetic(
        size in 1usize..(16 * PAGE),
        fraction in 0.0f64..1.0,
        seed in any::<u64>(),
    ) {
        let mut system = system_with_job(16, size, seed);
        system.allocate_random(JobId(1)).unwrap();
        let address = ((size as f64 * fraction) as usize).min(size - 1);

        let t = system
            .resolve_address(JobId(1), address as i64, PagingMode::Static)
            .unwrap()
            .translation;

        prop_assert_eq!(t.page_number, address / PAGE);
        prop_assert_eq!(t.offset, address % PAGE);
        prop_assert!(t.offset < PAGE);
        prop_assert_eq!(t.physical_address, t.frame.0 * PAGE + t.offset);
        prop_assert_eq!(system.clock(), 0);
    }

    #[test]
    fn prop_out_of_bounds_changes_nothing(
        size in 1usize..(8 * PAGE),
        past_end in 0i64..10_000,
        negative in any::<bool>(),
    ) {
        let mut system = system_with_job(4, size, 7);
        system.resolve_address(JobId(1), 0, PagingMode::Demand).unwrap();
        let clock = system.clock();
        let faults = system.job(JobId(1)).unwrap().page_faults();
        let frames = system.frame_snapshots();

        let address = if negative { -1 - past_end } else { size as i64 + past_end };
        let result = system.resolve_address(JobId(1), address, PagingMode::Demand);

        let is_out_of_bounds = matches!(result, Err(SimError::OutOfBounds { .. }));
        prop_assert!(is_out_of_bounds);
        prop_assert_eq!(system.clock(), clock);
        prop_assert_eq!(system.job(JobId(1)).unwrap().page_faults(), faults);
        prop_assert_eq!(system.frame_snapshots(), frames);
    }

    #[test]
    fn prop_demand_paging_keeps_tables_consistent(
        frames in 1usize..6,
        accesses in prop::collection::vec(0usize..(10 * PAGE), 1..60),
        lru in any::<bool>(),
    ) {
        let mut system = system_with_job(frames, 10 * PAGE, 3);
        if lru {
            system.set_replacement_policy(paged_memory_sim::ReplacementPolicy::Lru);
        }

        for &address in &accesses {
            let resolution = system
                .resolve_address(JobId(1), address as i64, PagingMode::Demand)
                .unwrap();
            prop_assert_eq!(resolution.translation.page_number, address / PAGE);
        }

        let job = system.job(JobId(1)).unwrap();
        prop_assert!(job.loaded_page_count() <= frames);
        prop_assert_eq!(job.loaded_page_count(), system.usage().used_frames);
        prop_assert!(job.page_faults() as usize <= accesses.len());
        prop_assert_eq!(system.clock(), accesses.len() as u64);
        for (page, frame) in job.resident_frames() {
            let occupant = system.frames().get(frame).and_then(|f| f.occupant());
            prop_assert_eq!(occupant.map(|o| (o.job, o.page)), Some((JobId(1), page)));
        }
    }
}
