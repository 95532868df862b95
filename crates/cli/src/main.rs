//! VR4300 simulator CLI.
//!
//! Loads an S-record image into physical memory, launches the selected
//! CPU model on a worker thread, and pumps stdin bytes into the UART.
//! Worker and console serialise on one process-wide mutex; the worker
//! holds it for a bounded batch of cycles before yielding, and observes a
//! shutdown flag at batch boundaries.

mod tty;

use std::io::Read;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use clap::{Parser, ValueEnum};

use vr4300_core::common::constants::KSEG1_BASE;
use vr4300_core::sim::loader;
use vr4300_core::{Bus, Config, FunctionalCore, Vr4300};

/// Which CPU model runs the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Model {
    /// Cycle-accurate five-stage pipeline.
    #[value(alias = "cen64")]
    Pipelined,
    /// Instruction-at-a-time functional interpreter.
    #[value(alias = "cmips")]
    Functional,
}

#[derive(Parser, Debug)]
#[command(
    name = "sim",
    author,
    version,
    about = "VR4300 (MIPS III) system simulator",
    long_about = "Load an S-record image and run it on the cycle-accurate\n\
        pipelined core or the functional reference interpreter.\n\n\
        Console I/O flows through the emulated UART: stdin is switched to\n\
        raw mode and fed to the guest byte by byte."
)]
struct Cli {
    /// S-record image to load into physical memory.
    image: String,

    /// CPU model to run (`pipelined`/`cen64` or `functional`/`cmips`).
    #[arg(value_enum)]
    model: Model,

    /// JSON configuration file (defaults used when omitted).
    #[arg(long)]
    config: Option<String>,

    /// Print statistics on exit.
    #[arg(long)]
    stats: bool,
}

/// Either core behind one dispatch point.
enum Core {
    Pipelined(Vr4300),
    Functional(FunctionalCore),
}

impl Core {
    fn advance(&mut self, bus: &mut Bus) {
        match self {
            Core::Pipelined(cpu) => {
                let _ = cpu.cycle(bus);
            }
            Core::Functional(cpu) => {
                let _ = cpu.step(bus);
            }
        }
    }

    fn print_stats(&self) {
        match self {
            Core::Pipelined(cpu) => cpu.stats.print(),
            Core::Functional(cpu) => cpu.stats.print(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| Config::from_json(&text).map_err(|e| e.to_string()))
        {
            Ok(config) => config,
            Err(e) => {
                eprintln!("sim: bad config {path}: {e}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    let mut bus = match Bus::new(&config) {
        Ok(bus) => bus,
        Err(e) => {
            eprintln!("sim: {e}");
            process::exit(1);
        }
    };

    let entry = match loader::load_srec_file(&mut bus, &cli.image) {
        Ok(entry) => entry,
        Err(e) => {
            eprintln!("sim: {e}");
            process::exit(1);
        }
    };

    // Execution starts in the uncached kseg1 window over the image's
    // declared entry point (physical 0 when the image names none).
    let start = KSEG1_BASE | u64::from(entry.unwrap_or(0));

    let core = match cli.model {
        Model::Pipelined => {
            let mut cpu = Vr4300::new(&config);
            cpu.set_fetch_pc(start);
            Core::Pipelined(cpu)
        }
        Model::Functional => {
            let mut cpu = FunctionalCore::new(&config);
            cpu.pc = start;
            Core::Functional(cpu)
        }
    };

    let raw = match tty::RawMode::enter() {
        Ok(raw) => Some(raw),
        Err(e) => {
            // Not a terminal (piped input): run cooked.
            tracing::debug!(error = %e, "raw mode unavailable");
            None
        }
    };

    let shared = Arc::new(Mutex::new((core, bus)));
    let shutdown = Arc::new(AtomicBool::new(false));
    let batch = config.harness.batch_cycles;

    let worker = {
        let shared = Arc::clone(&shared);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            while !shutdown.load(Ordering::Acquire) {
                let mut guard = match shared.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        eprintln!("sim: emulation mutex poisoned, exiting");
                        process::exit(1);
                    }
                };
                let (core, bus) = &mut *guard;
                for _ in 0..batch {
                    core.advance(bus);
                }
            }
        })
    };

    // Console pump: one stdin byte at a time into the UART receive path.
    let mut stdin = std::io::stdin().lock();
    let mut byte = [0u8; 1];
    loop {
        match stdin.read(&mut byte) {
            Ok(1) => {
                if let Ok(mut guard) = shared.lock() {
                    guard.1.uart.receive_char(byte[0]);
                }
            }
            _ => break, // EOF or read error: shut down.
        }
    }

    shutdown.store(true, Ordering::Release);
    let _ = worker.join();
    drop(raw);

    if cli.stats {
        if let Ok(guard) = shared.lock() {
            guard.0.print_stats();
        }
    }
}
