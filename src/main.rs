//! Paged Memory Simulator - Main Entry Point
//!
//! Usage: paged-memory-sim [OPTIONS] <jobs_file>
//!
//! Arguments:
//!   jobs_file  - CSV file with jobID,jobSize[,arrival[,duration]] records
//!
//! Options:
//!   -m, --mode <MODE>         static, demand or events (default: demand)
//!   -f, --frames <N>          number of physical frames
//!   -s, --frame-size <BYTES>  frame size, also used as the page size
//!   -p, --policy <POLICY>     fifo or lru (default: fifo)
//!   -t, --max-ticks <N>       tick bound for the event simulation
//!   --tick-ms <MS>            pause between simulated ticks
//!   --seed <N>                seed for random frame placement
//!   -r, --resolve <JOB:ADDR>  resolve a logical address (repeatable)
//!   -i, --interactive         read commands from stdin after the run
//!   -v, --verbose             more log output (repeat for debug)
//!   -h, --help                print help information

use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::thread;
use std::time::Duration;

use log::{LevelFilter, Log, Metadata, Record, warn};

use paged_memory_sim::command::{Command, HELP};
use paged_memory_sim::constants::*;
use paged_memory_sim::display::{
    render_job_preview, render_job_table, render_memory_map, render_page_table, render_usage,
};
use paged_memory_sim::io::{import_jobs_from_file, parse_resolve_request};
use paged_memory_sim::scheduler::TickReport;
use paged_memory_sim::system::Resolution;
use paged_memory_sim::{
    EventScheduler, JobId, MemoryConfig, MemorySystem, Operation, PageLoad, PagingMode,
    ReplacementPolicy, Result, SimError,
};

/// Writes log records to stderr so they never mix with the tables on stdout
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Static,
    Demand,
    Events,
}

impl RunMode {
    /// How resolve requests behave once the run itself is over
    fn paging_mode(self) -> PagingMode {
        match self {
            RunMode::Demand => PagingMode::Demand,
            RunMode::Static | RunMode::Events => PagingMode::Static,
        }
    }
}

/// Command-line configuration
struct Config {
    jobs_file: String,
    mode: RunMode,
    memory: MemoryConfig,
    policy: ReplacementPolicy,
    max_ticks: u64,
    tick_ms: u64,
    seed: Option<u64>,
    resolves: Vec<(JobId, i64)>,
    interactive: bool,
    verbosity: u8,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    init_logger(config.verbosity);

    // Run the simulator and handle any errors
    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn print_help(program: &str) {
    eprintln!("Paged Memory Simulator - paging, demand paging and event-driven allocation");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] <jobs_file>", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  jobs_file  - CSV with jobID,jobSize[,arrival[,duration]] per line");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -m, --mode <MODE>         static, demand or events (default: demand)");
    eprintln!("  -f, --frames <N>          number of frames (default: {})", DEFAULT_FRAME_COUNT);
    eprintln!("  -s, --frame-size <BYTES>  frame and page size (default: {})", DEFAULT_FRAME_SIZE);
    eprintln!("  -p, --policy <POLICY>     fifo or lru (default: fifo)");
    eprintln!("  -t, --max-ticks <N>       event simulation tick bound (default: {})", DEFAULT_MAX_TICKS);
    eprintln!("      --tick-ms <MS>        pause between ticks (default: 0)");
    eprintln!("      --seed <N>            seed for random frame placement");
    eprintln!("  -r, --resolve <JOB:ADDR>  resolve a logical address, may be repeated");
    eprintln!("  -i, --interactive         read commands from stdin after the run");
    eprintln!("  -v, --verbose             log allocations and faults (-vv for debug)");
    eprintln!("  -h, --help                print this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} jobs.csv -r 1:600 -r 2:0", program);
    eprintln!("  {} -m events -f 8 --tick-ms 200 jobs.csv", program);
    eprintln!("  {} -m static -i jobs.csv", program);
}

fn parse_args() -> std::result::Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("paged-memory-sim");

    let mut config = Config {
        jobs_file: String::new(),
        mode: RunMode::Demand,
        memory: MemoryConfig::default(),
        policy: ReplacementPolicy::default(),
        max_ticks: DEFAULT_MAX_TICKS,
        tick_ms: 0,
        seed: None,
        resolves: Vec::new(),
        interactive: false,
        verbosity: 0,
    };
    let mut positional: Vec<&String> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .map(String::as_str)
                .ok_or_else(|| format!("Missing value for {}", name))
        };

        match arg.as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => config.verbosity += 1,
            "-vv" => config.verbosity += 2,
            "-i" | "--interactive" => config.interactive = true,
            "-m" | "--mode" => {
                config.mode = match value(arg)? {
                    "static" => RunMode::Static,
                    "demand" => RunMode::Demand,
                    "events" => RunMode::Events,
                    other => return Err(format!("Unknown mode: {}", other)),
                }
            }
            "-f" | "--frames" => config.memory.frame_count = parse_number(arg, value(arg)?)?,
            "-s" | "--frame-size" => config.memory.frame_size = parse_number(arg, value(arg)?)?,
            "-p" | "--policy" => config.policy = value(arg)?.parse()?,
            "-t" | "--max-ticks" => config.max_ticks = parse_number(arg, value(arg)?)?,
            "--tick-ms" => config.tick_ms = parse_number(arg, value(arg)?)?,
            "--seed" => config.seed = Some(parse_number(arg, value(arg)?)?),
            "-r" | "--resolve" => config.resolves.push(parse_resolve_request(value(arg)?)?),
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}\nUse --help for usage information.", arg));
            }
            _ => positional.push(arg),
        }
    }

    if positional.len() != 1 {
        print_help(program);
        return Err(format!("\nError: Expected 1 argument, got {}", positional.len()));
    }
    config.jobs_file = positional[0].clone();

    Ok(config)
}

fn parse_number<T: std::str::FromStr>(option: &str, raw: &str) -> std::result::Result<T, String> {
    raw.parse()
        .map_err(|_| format!("Invalid value for {}: {}", option, raw))
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> Result<()> {
    // Step 1: Build physical memory
    config.memory.validate()?;
    let mut system = match config.seed {
        Some(seed) => MemorySystem::with_seed(config.memory, seed)?,
        None => MemorySystem::new(config.memory)?,
    };
    system.set_replacement_policy(config.policy);

    // Step 2: Import jobs, pages are frame-sized
    let import = import_jobs_from_file(&config.jobs_file, config.memory.frame_size)?;
    for job in import.jobs {
        if let Err(e) = system.add_job(job) {
            warn!("{}", e);
        }
    }
    if system.job_count() == 0 {
        eprintln!("No jobs loaded from '{}'. Expected lines like:", config.jobs_file);
        eprintln!("jobID,jobSize,arrival,duration");
        eprintln!("1,1000,0,5");
        return Err(SimError::EmptyJobSet);
    }

    println!("Paged Memory Simulator");
    println!(
        "Frames: {} x {} bytes, policy: {}, mode: {:?}",
        config.memory.frame_count, config.memory.frame_size, config.policy, config.mode
    );
    if !import.skipped.is_empty() {
        println!("Skipped {} malformed records", import.skipped.len());
    }
    println!();
    println!("Loaded {} jobs:", system.job_count());
    print!("{}", render_job_preview(system.jobs()));
    println!();

    // Step 3: Run the selected simulation
    match config.mode {
        RunMode::Static => {
            println!("Allocating pages to random frames...");
            for failure in system.allocate_all() {
                println!("  {}", failure);
            }
            println!("Allocation complete. {}", render_usage(&system.usage()));
        }
        RunMode::Demand => {
            println!("Demand paging: pages are loaded on first access.");
        }
        RunMode::Events => run_events(&mut system, config)?,
    }
    println!();

    // Step 4: Resolve requested addresses
    let paging = config.mode.paging_mode();
    for &(job, address) in &config.resolves {
        let result = system.resolve_address(job, address, paging);
        print_resolution(&system, job, address, result);
    }
    if !config.resolves.is_empty() {
        println!();
    }

    print_tables(&system);

    if config.interactive {
        interactive(&mut system, paging)?;
    }

    Ok(())
}

fn run_events(system: &mut MemorySystem, config: &Config) -> Result<()> {
    let pause = Duration::from_millis(config.tick_ms);
    let mut scheduler = EventScheduler::for_jobs(system);

    let report = scheduler.run(system, config.max_ticks, |tick: &TickReport| {
        for outcome in &tick.outcomes {
            println!("[t={}] {}", tick.time, outcome);
        }
        if !tick.outcomes.is_empty() {
            println!(
                "  {}. Waiting queue: {}",
                render_usage(&tick.usage),
                tick.waiting
            );
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    })?;

    if report.hit_tick_limit {
        println!("Reached tick limit {}, stopping simulation.", config.max_ticks);
    }
    println!(
        "Simulation finished at t={}. Completed: {}, running: {}, waiting: {}",
        report.ticks,
        report.completed.len(),
        report.running.len(),
        report.waiting.len()
    );
    Ok(())
}

fn print_resolution(system: &MemorySystem, job: JobId, address: i64, result: Result<Resolution>) {
    match result {
        Ok(resolution) => {
            let t = resolution.translation;
            if let Some(PageLoad::Fault { frame, evicted }) = resolution.load {
                println!(
                    "Page {} not in memory. Loaded on demand into frame {}.",
                    t.page_number, frame
                );
                if let Some(e) = evicted {
                    println!("  Replaced {} page {} in frame {}", e.job, e.page, e.frame);
                }
            }
            println!("{}", t);
            if let Ok(j) = system.job(job) {
                println!("Page faults for {}: {}", job, j.page_faults());
            }
        }
        Err(e) => println!("{} {}: {}", job, address, e),
    }
}

fn print_tables(system: &MemorySystem) {
    println!("{}", render_job_table(&system.job_snapshots()));
    println!("{}", render_page_table(&system.page_snapshots()));
    println!("{}", render_memory_map(&system.frame_snapshots()));
    println!("{}", render_usage(&system.usage()));
}

/// Read commands from stdin until EOF or `quit`
fn interactive(system: &mut MemorySystem, mut paging: PagingMode) -> Result<()> {
    println!("{}", HELP);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Tables => print_tables(system),
            Command::Usage => println!("{}", render_usage(&system.usage())),
            Command::Policy(policy) => {
                system.set_replacement_policy(policy);
                println!("Replacement policy: {}", policy);
            }
            Command::Mode(mode) => {
                paging = mode;
                println!("Paging mode: {}", mode);
            }
            Command::Resolve { job, address } => {
                let result = system.resolve_address(job, address, paging);
                print_resolution(system, job, address, result);
            }
            Command::Write { job, address } => {
                let result = system.access_address(job, address, Operation::Write, paging);
                print_resolution(system, job, address, result);
            }
            Command::Load { job, page } => match system.load_page(job, page) {
                Ok(PageLoad::Hit { frame }) => println!("Page {} already in frame {}", page, frame),
                Ok(PageLoad::Fault { frame, evicted }) => {
                    println!("Page fault: page {} loaded into frame {}", page, frame);
                    if let Some(e) = evicted {
                        println!("  Replaced {} page {} in frame {}", e.job, e.page, e.frame);
                    }
                }
                Err(e) => println!("{}", e),
            },
            Command::Allocate(Some(job)) => match system.allocate_random(job) {
                Ok(placed) => println!("Placed {} pages of {}", placed.len(), job),
                Err(e) => println!("{}", e),
            },
            Command::Allocate(None) => {
                for failure in system.allocate_all() {
                    println!("{}", failure);
                }
                println!("{}", render_usage(&system.usage()));
            }
            Command::Free(job) => match system.free_job_frames(job) {
                Ok(freed) => println!("Released {} frames held by {}", freed, job),
                Err(e) => println!("{}", e),
            },
            Command::Configure { frames, frame_size } => {
                match system.configure_memory(frames, frame_size) {
                    Ok(()) => println!("Memory reset to {} frames of {} bytes", frames, frame_size),
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    println!("Exiting simulator.");
    Ok(())
}
