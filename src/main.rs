use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod vm;

use config::{Profile, RuntimeConfig};
use vm::Machine;

#[derive(Parser)]
#[command(name = "okto")]
#[command(about = "A minimal stack-based bytecode virtual machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flat bytecode file
    Run {
        /// The bytecode file to run
        file: PathBuf,

        /// Machine profile file (TOML) with a [limits] table
        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// Stack capacity in cells (overrides the profile)
        #[arg(long)]
        stack_capacity: Option<usize>,

        /// Memory capacity in cells (overrides the profile)
        #[arg(long)]
        memory_capacity: Option<usize>,

        /// Composition nesting depth limit (overrides the profile)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Trace each top-level instruction to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            profile,
            stack_capacity,
            memory_capacity,
            max_depth,
            trace,
        } => {
            let mut config = RuntimeConfig::default();

            if let Some(path) = profile {
                match Profile::load(&path) {
                    Ok(p) => p.apply(&mut config),
                    Err(e) => {
                        eprintln!("{}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            if let Some(n) = stack_capacity {
                config.stack_capacity = n;
            }
            if let Some(n) = memory_capacity {
                config.memory_capacity = n;
            }
            if let Some(n) = max_depth {
                config.max_nesting_depth = n;
            }

            let program = match std::fs::read(&file) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("failed to read {}: {}", file.display(), e);
                    return ExitCode::FAILURE;
                }
            };

            let mut machine = Machine::new(&config);
            machine.set_trace(trace);
            if let Err(e) = machine.run(&program) {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
