//! Subcommand implementations
//!
//! Each command writes its report to the given writer so it can be tested
//! without touching stdout.

use crate::cli::OutputFormat;
use huff_syntax::error::{ArtifactError, GrammarError};
use huff_syntax::syntax::{SyntaxElement, SyntaxNode, SyntaxTree};
use huff_syntax::table::TableConfig;
use huff_syntax::{Language, huff};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write output: {0}")]
    Write(#[from] io::Error),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("cannot encode the tree: {0}")]
    Json(#[from] serde_json::Error),
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn report_stats(tree: &SyntaxTree, path: &Path) {
    let stats = tree.stats();
    eprintln!(
        "{}: {} tokens, {} errors, parsed in {:?}",
        path.display(),
        stats.tokens,
        stats.errors,
        stats.duration
    );
}

/// One node or token of a tree in JSON output
#[derive(Debug, Serialize)]
struct JsonElement {
    kind: String,
    start: u32,
    end: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonElement>,
}

impl JsonElement {
    fn from_element(tree: &SyntaxTree, element: &SyntaxElement) -> Self {
        let language = tree.language();
        let range = element.text_range();
        let field = match element {
            SyntaxElement::Node(node) => node.field(),
            SyntaxElement::Token(token) => token.field(),
        };
        let (text, children) = match element {
            SyntaxElement::Node(node) => (None, Self::children(tree, node)),
            SyntaxElement::Token(_) => (
                Some(String::from_utf8_lossy(tree.slice(range)).into_owned()),
                Vec::new(),
            ),
        };
        Self {
            kind: language.kind_name(element.kind()).to_owned(),
            start: range.start().into(),
            end: range.end().into(),
            field: field.and_then(|f| language.field_name(f)).map(str::to_owned),
            text,
            children,
        }
    }

    fn children(tree: &SyntaxTree, node: &SyntaxNode) -> Vec<Self> {
        node.children()
            .map(|child| Self::from_element(tree, &child))
            .collect()
    }
}

/// `parse`: print the tree of one file.
///
/// # Errors
///
/// Fails when the file cannot be read or the output cannot be written.
pub fn parse(path: &Path, format: OutputFormat, verbose: bool, out: &mut impl Write) -> Result<(), CliError> {
    let source = read(path)?;
    let tree = huff::parse(&source);
    if verbose {
        report_stats(&tree, path);
    }
    match format {
        OutputFormat::Sexp => writeln!(out, "{}", tree.to_sexp())?,
        OutputFormat::Json => {
            let root = JsonElement::from_element(&tree, &SyntaxElement::Node(tree.root_node()));
            serde_json::to_writer_pretty(&mut *out, &root)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// `check`: report the syntax errors of every file. Returns the number of
/// errors found.
///
/// # Errors
///
/// Fails when a file cannot be read or the output cannot be written.
pub fn check(paths: &[PathBuf], verbose: bool, out: &mut impl Write) -> Result<usize, CliError> {
    let parser = huff::parser();
    let mut total = 0;
    for path in paths {
        let source = read(path)?;
        let tree = parser.parse(&source, None, &[]);
        if verbose {
            report_stats(&tree, path);
        }
        let index = tree.line_index();
        for error in tree.errors() {
            let position = index.line_col(error.range.start());
            writeln!(out, "{}:{position}: {error}", path.display())?;
            total += 1;
        }
    }
    Ok(total)
}

/// `table`: compile the grammar and write the language artifact.
///
/// # Errors
///
/// Fails when the grammar does not compile or the artifact cannot be
/// written.
pub fn table(output: Option<&Path>, canonical: bool, verbose: bool, out: &mut impl Write) -> Result<(), CliError> {
    let config = if canonical {
        TableConfig::canonical()
    } else {
        TableConfig::default()
    };
    let compiled = huff::grammar()?.compile(&config)?;
    if verbose {
        for warning in &compiled.warnings {
            eprintln!("warning: {warning}");
        }
        let language = &compiled.language;
        eprintln!(
            "{} {}: {} symbols, {} states, {} actions, {} lexer states",
            language.name(),
            language.version(),
            language.symbol_count(),
            language.table().state_count(),
            language.table().action_count(),
            language.lexer().state_count()
        );
    }

    let bytes = compiled.language.to_artifact_bytes()?;
    match output {
        Some(path) => std::fs::write(path, bytes)?,
        None => {
            out.write_all(&bytes)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// `symbols`: one line per symbol of the Huff language.
///
/// # Errors
///
/// Fails when the output cannot be written.
pub fn symbols(out: &mut impl Write) -> Result<(), CliError> {
    let language: &Language = &huff::language();
    for (kind, info) in language.symbols() {
        let class = if info.terminal { "terminal" } else { "rule" };
        let mut flags = Vec::new();
        if language.is_extra(kind) {
            flags.push("extra");
        }
        if !info.visible {
            flags.push("hidden");
        }
        if !info.named {
            flags.push("anonymous");
        }
        writeln!(out, "{:>4} {class:<8} {} {}", kind.raw(), info.name, flags.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("huff_tools_{}_{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_sexp() {
        let path = temp_file("ok.huff", b"#define constant A = 0x01\n");
        let mut out = Vec::new();
        parse(&path, OutputFormat::Sexp, false, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "(source_file (declaration (constant name: (identifier) value: (number))))\n"
        );
    }

    #[test]
    fn test_parse_json() {
        let path = temp_file("json.huff", b"#define constant A = 0x01");
        let mut out = Vec::new();
        parse(&path, OutputFormat::Json, false, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["kind"], "source_file");
        assert_eq!(value["end"], 25);
        let constant = &value["children"][0]["children"][2];
        assert_eq!(constant["kind"], "constant");
        assert_eq!(constant["children"][2]["field"], "name");
        assert_eq!(constant["children"][2]["text"], "A");
    }

    #[test]
    fn test_check_reports_positions() {
        let good = temp_file("good.huff", b"#define macro M() = takes(0) { stop }\n");
        let bad = temp_file("bad.huff", b"#define macro M() = takes(0) {\n  0x01 $\n}\n");
        let mut out = Vec::new();
        let errors = check(&[good, bad.clone()], false, &mut out).unwrap();
        assert_eq!(errors, 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!("{}:2:8: unrecognized input `$`\n", bad.display())
        );
    }

    #[test]
    fn test_missing_file() {
        let err = check(&[PathBuf::from("/nonexistent/x.huff")], false, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CliError::Read { .. }));
    }

    #[test]
    fn test_table_round_trips() {
        let mut out = Vec::new();
        table(None, false, false, &mut out).unwrap();
        let language = Language::from_artifact_bytes(&out).unwrap();
        assert_eq!(&language, huff::language().as_ref());
    }

    #[test]
    fn test_symbols_lists_reserved_kinds() {
        let mut out = Vec::new();
        symbols(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|line| line.contains("source_file")));
        assert!(text.lines().any(|line| line.contains("_whitespace") && line.contains("extra")));
    }
}
