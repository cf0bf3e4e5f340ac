//! Command-line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "huff-syntax")]
#[command(about = "Parse and check Huff sources, inspect the compiled grammar")]
#[command(version)]
pub struct Cli {
    /// Print parse statistics and grammar warnings to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a file and print its syntax tree
    Parse {
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Sexp)]
        format: OutputFormat,
    },

    /// Report syntax errors as `file:line:col: message`
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compile the grammar and write the language artifact
    Table {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build a canonical LR(1) table instead of LALR(1)
        #[arg(long)]
        canonical: bool,
    },

    /// List the grammar's symbols
    Symbols,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tree-sitter style S-expression of the named nodes
    Sexp,
    /// Every node and token with its byte range
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from(["huff-syntax", "parse", "main.huff", "--format", "json"]).unwrap();
        assert!(!cli.verbose);
        let Commands::Parse { file, format } = cli.command else {
            panic!("expected the parse command");
        };
        assert_eq!(file, PathBuf::from("main.huff"));
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_check_requires_files() {
        assert!(Cli::try_parse_from(["huff-syntax", "check"]).is_err());
        let cli = Cli::try_parse_from(["huff-syntax", "-v", "check", "a.huff", "b.huff"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Check { files } if files.len() == 2));
    }

    #[test]
    fn test_table_defaults() {
        let cli = Cli::try_parse_from(["huff-syntax", "table"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Table {
                output: None,
                canonical: false
            }
        ));
    }
}
