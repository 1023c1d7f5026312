//! didc - the didactic compiler
//!
//! Compiles a small imperative language to RISC-V assembly.

mod backend;
mod driver;
mod frontend;
mod repl;
mod types;
mod utils;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use driver::{ErrorFormat, Options};
use utils::Error;

/// didactic compiler
#[derive(Parser, Debug)]
#[command(name = "didc")]
#[command(version)]
#[command(about = "Compiles a small imperative language to RISC-V assembly")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file; starts the REPL when omitted
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Leave out the __start/__end wrapper
    #[arg(long)]
    test_mode: bool,

    /// How errors are printed
    #[arg(long, value_enum, default_value_t = ErrorFormat::Human)]
    error_format: ErrorFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
    /// Start the interactive compiler
    Repl,
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let options = Options { test_mode: cli.test_mode };

    let result = match &cli.command {
        Some(Commands::Build { input, output }) => build(input, output.as_deref(), options, cli.error_format),
        Some(Commands::Check { input }) => check(input, cli.error_format),
        Some(Commands::Repl) => run_repl(cli.error_format),
        Some(Commands::Version) => {
            println!("didc {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
        None => match &cli.input {
            Some(input) => build(input, cli.output.as_deref(), options, cli.error_format),
            None => run_repl(cli.error_format),
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Read a source file, reporting a failure as a diagnostic
fn read_source(input: &Path, format: ErrorFormat) -> Option<String> {
    match fs::read_to_string(input) {
        Ok(source) => Some(source),
        Err(e) => {
            let error = Error::Io(format!("can not read {}: {}", input.display(), e));
            driver::report(&[error], None, format);
            None
        }
    }
}

/// Compile a file. `Ok(false)` means errors were reported.
fn build(input: &Path, output: Option<&Path>, options: Options, format: ErrorFormat) -> Result<bool> {
    let Some(source) = read_source(input, format) else {
        return Ok(false);
    };
    log::info!("compiling {}", input.display());

    let asm = match driver::compile_source(&source, options) {
        Ok(asm) => asm,
        Err(errors) => {
            driver::report(&errors, Some(input), format);
            return Ok(false);
        }
    };

    match output {
        Some(path) => {
            fs::write(path, asm).with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", asm),
    }
    Ok(true)
}

fn check(input: &Path, format: ErrorFormat) -> Result<bool> {
    let Some(source) = read_source(input, format) else {
        return Ok(false);
    };
    match driver::check_source(&source) {
        Ok(()) => {
            log::info!("{}: no errors", input.display());
            Ok(true)
        }
        Err(errors) => {
            driver::report(&errors, Some(input), format);
            Ok(false)
        }
    }
}

fn run_repl(format: ErrorFormat) -> Result<bool> {
    let stdin = io::stdin();
    repl::run(stdin.lock(), io::stdout(), format).context("REPL failed")?;
    Ok(true)
}
