//! Huff Tools - command-line utilities for the Huff syntax crate
//!
//! Parses and checks Huff sources and exports the compiled grammar.

pub mod cli;
pub mod commands;
