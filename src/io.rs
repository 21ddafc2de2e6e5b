use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Result, SimError};
use crate::job::{Job, JobId};

/// Jobs read from an import file, plus the records that had to be skipped
#[derive(Debug, Default)]
pub struct ImportReport {
    pub jobs: Vec<Job>,
    pub skipped: Vec<SimError>,
}

/// Read `jobID,jobSize[,arrival[,duration]]` records from a CSV file.
///
/// Only failing to read the file (or a zero page size) is an error; bad
/// records are collected in `skipped`.
pub fn import_jobs_from_file<P: AsRef<Path>>(path: P, page_size: usize) -> Result<ImportReport> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        SimError::Io(format!(
            "Failed to read job file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    parse_jobs(&content, page_size)
}

pub fn parse_jobs(content: &str, page_size: usize) -> Result<ImportReport> {
    if page_size == 0 {
        return Err(SimError::InvalidConfig(
            "page size must be positive".to_string(),
        ));
    }

    let mut report = ImportReport::default();
    let mut first = true;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if first {
            first = false;
            if is_header(line) {
                debug!("Skipping header line: {}", line);
                continue;
            }
        }

        match parse_record(line, line_no, page_size) {
            Ok(job) => report.jobs.push(job),
            Err(err) => {
                warn!("{}", err);
                report.skipped.push(err);
            }
        }
    }

    debug!(
        "Imported {} jobs, skipped {} records",
        report.jobs.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn is_header(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_alphabetic())
}

fn parse_record(line: &str, line_no: usize, page_size: usize) -> Result<Job> {
    let mut fields = line.split(',').map(str::trim);

    let unparseable = |reason: String| SimError::UnparseableRecord {
        line: line_no,
        reason,
    };

    let id_token = fields.next().unwrap_or("");
    let id: u32 = id_token
        .parse()
        .map_err(|_| unparseable(format!("invalid job ID '{}'", id_token)))?;

    let size_token = fields.next().unwrap_or("");
    let size: usize = size_token
        .parse()
        .map_err(|_| unparseable(format!("invalid job size '{}'", size_token)))?;

    let job = Job::new(JobId(id), size, page_size)?;

    let arrival = optional_field(fields.next(), line_no, "arrival time")
        .unwrap_or(job.arrival_time);
    let duration = optional_field(fields.next(), line_no, "duration")
        .unwrap_or_else(|| Job::default_duration(size));

    Ok(job.with_schedule(arrival, duration))
}

/// Absent and empty fields take the default silently; garbage takes it with a warning
fn optional_field(token: Option<&str>, line_no: usize, name: &str) -> Option<u64> {
    let token = token.filter(|t| !t.is_empty())?;
    match token.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                "Line {}: invalid {} '{}', using default",
                line_no, name, token
            );
            None
        }
    }
}

/// Parse a `JOB:ADDR` resolve request
pub fn parse_resolve_request(request: &str) -> std::result::Result<(JobId, i64), String> {
    let (job, address) = request
        .split_once(':')
        .ok_or_else(|| format!("Expected JOB:ADDR, got '{}'", request))?;
    let job: u32 = job
        .trim()
        .parse()
        .map_err(|_| format!("Invalid job ID: {}", job))?;
    let address: i64 = address
        .trim()
        .parse()
        .map_err(|_| format!("Invalid logical address: {}", address))?;
    Ok((JobId(job), address))
}
