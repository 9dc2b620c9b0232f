//! Vesper compiler CLI.
//!
//! Usage:
//!
//! ```text
//! vesper                      # read a program from stdin until an `EOF` line
//! vesper <input> <output>     # compile a file
//! ```
//!
//! The produced module is written as textual LLVM assembly
//! (`output.ll` in stdin mode). Verification problems are reported as
//! warnings and never stop emission.
//!
//! Environment:
//! - `RUST_LOG=vesper_codegen=trace` — trace every generation step.
//! - `VESPER_DUMP` — also dump the produced module to stdout.

use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Once;

use vesper_codegen::compile_program;
use vesper_reader::parse_program;

static TRACING_INIT: Once = Once::new();

/// Install an `EnvFilter`-driven subscriber once, only when `RUST_LOG`
/// is set. Safe to call multiple times.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            use tracing_subscriber::{fmt, prelude::*, EnvFilter};
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

enum DriverError {
    Read(vesper_reader::ReadError),
    Codegen(vesper_codegen::CodegenError),
    Io(std::io::Error),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Read(err) => write!(f, "{err}"),
            DriverError::Codegen(err) => write!(f, "{err}"),
            DriverError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl From<vesper_reader::ReadError> for DriverError {
    fn from(err: vesper_reader::ReadError) -> Self {
        DriverError::Read(err)
    }
}

impl From<vesper_codegen::CodegenError> for DriverError {
    fn from(err: vesper_codegen::CodegenError) -> Self {
        DriverError::Codegen(err)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::Io(err)
    }
}

/// Compile source text to printed IR plus verification warnings.
fn compile_source(source: &str) -> Result<(String, Vec<String>), DriverError> {
    let program = parse_program(source)?;
    let module = compile_program(&program)?;
    let warnings = vesper_ir::verify(&module)
        .into_iter()
        .map(|issue| issue.to_string())
        .collect();
    Ok((module.to_string(), warnings))
}

fn read_stdin_until_eof() -> Result<String, std::io::Error> {
    println!("Reading until 'EOF' line");
    let stdin = std::io::stdin();
    let mut source = String::new();
    for line in stdin.lock().lines() {
        let line = line?;
        if line == "EOF" {
            break;
        }
        source.push_str(&line);
        source.push('\n');
    }
    Ok(source)
}

fn run() -> Result<(), DriverError> {
    let args: Vec<String> = std::env::args().collect();

    let (source, output) = match args.len() {
        1 => (read_stdin_until_eof()?, "output.ll".to_owned()),
        3 => (std::fs::read_to_string(&args[1])?, args[2].clone()),
        _ => {
            eprintln!("Usage: {} [<input> <output>]", args[0]);
            std::process::exit(1);
        }
    };

    println!("Generating {output}...");
    let (printed, warnings) = compile_source(&source)?;
    for warning in &warnings {
        eprintln!("warning: {warning}");
    }

    if std::env::var("VESPER_DUMP").is_ok() {
        println!("{printed}");
    }

    let mut file = std::fs::File::create(&output)?;
    file.write_all(printed.as_bytes())?;
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::compile_source;

    #[test]
    fn pipeline_produces_ir_text() {
        let (printed, warnings) = compile_source("(printf \"%d\\n\" (+ 1 2))")
            .unwrap_or_else(|err| panic!("pipeline failed: {err}"));
        assert!(printed.contains("define i32 @main()"));
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn read_errors_are_fatal() {
        assert!(compile_source("(var x 1").is_err());
    }

    #[test]
    fn codegen_errors_are_fatal() {
        assert!(compile_source("(printf \"%d\" ghost)").is_err());
    }
}
