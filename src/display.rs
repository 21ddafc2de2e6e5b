//! Plain-text tables for the job, page map and memory map views.

use crate::job::{Job, JobSnapshot, PageSnapshot};
use crate::memory::{FrameSnapshot, MemoryUsage};

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn flag(set: bool) -> &'static str {
    if set { "1" } else { "0" }
}

pub fn render_job_preview(jobs: &[Job]) -> String {
    let mut out = format!(
        "{:<8}{:<10}{:<8}{:<10}{:<10}{:<14}\n",
        "Job ID", "Size", "Pages", "Arrival", "Duration", "Fragmentation"
    );
    for job in jobs {
        out.push_str(&format!(
            "{:<8}{:<10}{:<8}{:<10}{:<10}{:<14}\n",
            job.id.0,
            job.size,
            job.page_count(),
            job.arrival_time,
            job.duration,
            job.internal_fragmentation
        ));
    }
    out
}

pub fn render_job_table(jobs: &[JobSnapshot]) -> String {
    let mut out = String::from("--- Job Table ---\n");
    out.push_str(&format!(
        "{:<8}{:<10}{:<8}{:<14}{:<13}{:<15}{:<8}\n",
        "Job ID", "Size", "Pages", "Pages Loaded", "Page Faults", "Fragmentation", "Started"
    ));
    for job in jobs {
        out.push_str(&format!(
            "{:<8}{:<10}{:<8}{:<14}{:<13}{:<15}{:<8}\n",
            job.id.0,
            job.size,
            job.page_count,
            job.loaded_page_count,
            job.page_faults,
            job.internal_fragmentation,
            or_dash(job.start_time)
        ));
    }
    out
}

pub fn render_page_table(pages: &[PageSnapshot]) -> String {
    let mut out = String::from("--- Page Map Table ---\n");
    out.push_str(&format!(
        "{:<8}{:<8}{:<8}{:<12}{:<5}{:<5}\n",
        "Job ID", "Page", "Frame", "Status", "R", "M"
    ));
    for page in pages {
        out.push_str(&format!(
            "{:<8}{:<8}{:<8}{:<12}{:<5}{:<5}\n",
            page.job.0,
            page.page,
            or_dash(page.frame),
            if page.resident { "Loaded" } else { "Not Loaded" },
            flag(page.referenced),
            flag(page.modified)
        ));
    }
    out
}

pub fn render_memory_map(frames: &[FrameSnapshot]) -> String {
    let mut out = String::from("--- Memory Map Table ---\n");
    out.push_str(&format!(
        "{:<8}{:<10}{:<8}{:<8}{:<12}\n",
        "Frame", "Status", "Job ID", "Page", "Last Access"
    ));
    for frame in frames {
        out.push_str(&format!(
            "{:<8}{:<10}{:<8}{:<8}{:<12}\n",
            frame.frame,
            if frame.free { "Free" } else { "Occupied" },
            or_dash(frame.owner.map(|j| j.0)),
            or_dash(frame.page),
            if frame.free {
                "-".to_string()
            } else {
                frame.last_access_time.to_string()
            }
        ));
    }
    out
}

pub fn render_usage(usage: &MemoryUsage) -> String {
    format!("Memory Usage: {}", usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;
    use crate::memory::FrameId;

    #[test]
    fn test_memory_map_rows() {
        let frames = vec![
            FrameSnapshot {
                frame: FrameId(0),
                free: true,
                owner: None,
                page: None,
                last_access_time: 0,
            },
            FrameSnapshot {
                frame: FrameId(1),
                free: false,
                owner: Some(JobId(3)),
                page: Some(2),
                last_access_time: 7,
            },
        ];
        let table = render_memory_map(&frames);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("0"));
        assert!(lines[2].contains("Free"));
        assert!(lines[3].contains("Occupied"));
        assert_eq!(
            lines[3].split_whitespace().collect::<Vec<_>>(),
            vec!["1", "Occupied", "3", "2", "7"]
        );
    }

    #[test]
    fn test_page_table_marks_missing_frames() {
        let pages = vec![PageSnapshot {
            job: JobId(1),
            page: 0,
            frame: None,
            resident: false,
            modified: false,
            referenced: false,
        }];
        let table = render_page_table(&pages);
        assert!(table.contains("Not Loaded"));
        assert_eq!(
            table.lines().nth(2).unwrap().split_whitespace().collect::<Vec<_>>(),
            vec!["1", "0", "-", "Not", "Loaded", "0", "0"]
        );
    }

    #[test]
    fn test_job_table_and_preview() {
        let job = Job::new(JobId(2), 1000, 512).unwrap().with_schedule(1, 4);
        let preview = render_job_preview(std::slice::from_ref(&job));
        assert_eq!(
            preview.lines().nth(1).unwrap().split_whitespace().collect::<Vec<_>>(),
            vec!["2", "1000", "2", "1", "4", "24"]
        );

        let table = render_job_table(&[job.snapshot()]);
        assert!(table.starts_with("--- Job Table ---"));
        assert_eq!(
            table.lines().nth(2).unwrap().split_whitespace().collect::<Vec<_>>(),
            vec!["2", "1000", "2", "0", "0", "24", "-"]
        );
    }

    #[test]
    fn test_usage_line() {
        let usage = MemoryUsage::new(8, 2);
        assert_eq!(
            render_usage(&usage),
            "Memory Usage: 2/8 frames used (25.0%), 6 free"
        );
    }
}
