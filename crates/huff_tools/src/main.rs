//! Huff Syntax CLI

use clap::Parser;
use huff_tools::cli::{Cli, Commands};
use huff_tools::commands::{self, CliError};
use std::io::{self, Write};
use std::process::ExitCode;

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Parse { file, format } => commands::parse(&file, format, cli.verbose, &mut out)?,
        Commands::Check { files } => {
            let errors = commands::check(&files, cli.verbose, &mut out)?;
            out.flush()?;
            if errors > 0 {
                eprintln!("{errors} syntax error(s)");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Table { output, canonical } => {
            commands::table(output.as_deref(), canonical, cli.verbose, &mut out)?;
        }
        Commands::Symbols => commands::symbols(&mut out)?,
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(2)
        }
    }
}
