//! `kc`: drives the middle-end (§4.I/§4.J) over a pre-typechecked AST
//! fixture given as JSON, printing the requested intermediate
//! representation on success or every diagnostic on failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use kc_compiler::Compilation;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "kc", version, about = "AST-to-C-form middle-end driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run K-normalization through C-form type generation over a JSON
    /// fixture (a `Vec<kc_core::ast::Module>`), printing the requested IR.
    Compile {
        /// Path to the JSON module-list fixture.
        input: PathBuf,
        /// Which intermediate representation to print.
        #[arg(long, value_enum, default_value_t = Emit::Cform)]
        emit: Emit,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    Kform,
    Cform,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse {path} as a module list: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
    #[error(transparent)]
    Compile(#[from] kc_core::CompileError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` (not an `Err`) when compilation itself fails with
/// diagnostics rather than a fatal `CompileError` — the fixture was well
/// formed, the program it describes wasn't.
fn run(command: Command) -> Result<bool, CliError> {
    match command {
        Command::Compile { input, emit } => compile(&input, emit),
    }
}

fn compile(input: &Path, emit: Emit) -> Result<bool, CliError> {
    let text = std::fs::read_to_string(input).map_err(|source| CliError::Read { path: input.to_path_buf(), source })?;
    let modules: Vec<kc_core::ast::Module> =
        serde_json::from_str(&text).map_err(|source| CliError::Parse { path: input.to_path_buf(), source })?;

    let mut comp = Compilation::new();
    match emit {
        Emit::Kform => {
            let kmodules = comp.lower_to_kform(&modules)?;
            if !comp.diagnostics().is_empty() {
                eprint!("{}", comp.diagnostics());
                return Ok(false);
            }
            for m in &kmodules {
                println!("{}", serde_json::to_string_pretty(m).expect("KModule always serializes"));
            }
        }
        Emit::Cform => {
            let cmodules = comp.compile_modules(&modules)?;
            if !comp.diagnostics().is_empty() {
                eprint!("{}", comp.diagnostics());
                return Ok(false);
            }
            for m in &cmodules {
                println!("{}", kc_compiler::codegen::stub::render(m));
            }
        }
    }
    Ok(true)
}
