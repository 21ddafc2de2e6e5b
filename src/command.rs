//! Commands accepted by the interactive loop.

use std::str::FromStr;

use crate::job::JobId;
use crate::replacement::ReplacementPolicy;
use crate::translation::PagingMode;

pub const HELP: &str = "\
Commands:
  resolve <job> <addr>     resolve a logical address (read)
  write <job> <addr>       resolve a logical address and mark the page modified
  load <job> <page>        bring a page into memory
  allocate [job]           place a job (or every job) into random free frames
  free <job>               release every frame a job holds
  policy <fifo|lru>        replacement policy for future faults
  mode <static|demand>     how resolve treats pages that are not loaded
  memory <frames> <size>   reconfigure physical memory (clears all pages)
  tables                   show the job, page map and memory map tables
  usage                    show frame usage
  help                     show this message
  quit                     leave";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Resolve { job: JobId, address: i64 },
    Write { job: JobId, address: i64 },
    Load { job: JobId, page: usize },
    Allocate(Option<JobId>),
    Free(JobId),
    Policy(ReplacementPolicy),
    Mode(PagingMode),
    Configure { frames: usize, frame_size: usize },
    Tables,
    Usage,
    Help,
    Quit,
}

fn arg<T: FromStr>(args: &[&str], idx: usize, name: &str) -> Result<T, String> {
    let raw = args
        .get(idx)
        .ok_or_else(|| format!("Missing argument: {}", name))?;
    raw.parse()
        .map_err(|_| format!("Invalid {}: {}", name, raw))
}

fn job_arg(args: &[&str], idx: usize) -> Result<JobId, String> {
    arg(args, idx, "job ID").map(JobId)
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Err("Empty command".to_string());
        };

        let expected = match name.to_ascii_lowercase().as_str() {
            "resolve" | "r" => 2,
            "write" | "w" => 2,
            "load" | "l" => 2,
            "allocate" | "a" => args.len().min(1),
            "free" => 1,
            "policy" | "mode" => 1,
            "memory" => 2,
            _ => 0,
        };
        if args.len() > expected {
            return Err(format!("Too many arguments for '{}'", name));
        }

        match name.to_ascii_lowercase().as_str() {
            "resolve" | "r" => Ok(Command::Resolve {
                job: job_arg(args, 0)?,
                address: arg(args, 1, "logical address")?,
            }),
            "write" | "w" => Ok(Command::Write {
                job: job_arg(args, 0)?,
                address: arg(args, 1, "logical address")?,
            }),
            "load" | "l" => Ok(Command::Load {
                job: job_arg(args, 0)?,
                page: arg(args, 1, "page number")?,
            }),
            "allocate" | "a" => {
                if args.is_empty() {
                    Ok(Command::Allocate(None))
                } else {
                    Ok(Command::Allocate(Some(job_arg(args, 0)?)))
                }
            }
            "free" => Ok(Command::Free(job_arg(args, 0)?)),
            "policy" => args
                .first()
                .ok_or_else(|| "Missing argument: policy".to_string())?
                .parse()
                .map(Command::Policy),
            "mode" => args
                .first()
                .ok_or_else(|| "Missing argument: mode".to_string())?
                .parse()
                .map(Command::Mode),
            "memory" => Ok(Command::Configure {
                frames: arg(args, 0, "frame count")?,
                frame_size: arg(args, 1, "frame size")?,
            }),
            "tables" | "t" => Ok(Command::Tables),
            "usage" | "u" => Ok(Command::Usage),
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(format!("Unknown command: {} (try 'help')", name)),
        }
    }
}
