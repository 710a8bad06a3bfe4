// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::error::{GenError, GenErrorKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "In-place code generator for //CG-marked C++ source trees.

Positional inputs are a mix of file names and exactly one directory. Files
listed before the directory are processed first, in the given order. The
directory's own entries follow, sorted by name and filtered to .h/.c/.cpp,
minus any file already listed. Files listed after the directory are processed
last. Processing order matters: symbol ids are assigned on first use.

Files are rewritten only when their generated content actually changed, so
re-running on an already generated tree touches nothing.";

fn cli_error(message: String) -> GenError {
    GenError::new(GenErrorKind::Cli, &message, None)
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "cgforge",
    version = VERSION,
    about = "Directive-driven code generator: expands //CG blocks in place",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select output format for the run report. text is default; json emits one machine-readable object."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::SetTrue,
        long_help = "Report skipped companion files and unknown directives. Unknown directives make the run exit non-zero."
    )]
    pub verbose: bool,
    #[arg(
        long = "strip",
        action = ArgAction::SetTrue,
        long_help = "Remove generated blocks after expansion, keeping only what belongs in source control."
    )]
    pub strip: bool,
    #[arg(
        long = "stats",
        action = ArgAction::SetTrue,
        long_help = "Count directives per command across the tree and include the tally in the report."
    )]
    pub stats: bool,
    #[arg(
        short = 'n',
        long = "dry-run",
        action = ArgAction::SetTrue,
        long_help = "Report which files would be rewritten without writing anything."
    )]
    pub dry_run: bool,
    #[arg(
        value_name = "PATH",
        required = true,
        long_help = "Input files and exactly one directory. File order around the directory fixes processing order."
    )]
    pub inputs: Vec<PathBuf>,
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct CliConfig {
    pub root: PathBuf,
    pub first: Vec<String>,
    pub last: Vec<String>,
    pub format: OutputFormat,
    pub verbose: bool,
    pub strip: bool,
    pub stats: bool,
    pub dry_run: bool,
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, GenError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )))
        }
    };
    Ok(parsed)
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, GenError> {
    let env_verbose = parse_env_bool("CGFORGE_VERBOSE")?;
    let env_dry_run = parse_env_bool("CGFORGE_DRY_RUN")?;

    let mut root: Option<PathBuf> = None;
    let mut first: Vec<PathBuf> = Vec::new();
    let mut last: Vec<PathBuf> = Vec::new();
    for input in &cli.inputs {
        if input.is_dir() {
            if root.is_some() {
                return Err(cli_error(format!(
                    "Exactly one directory input is allowed, got a second: {}",
                    input.display()
                )));
            }
            root = Some(input.clone());
        } else if !input.is_file() {
            return Err(cli_error(format!("Input not found: {}", input.display())));
        } else if root.is_none() {
            first.push(input.clone());
        } else {
            last.push(input.clone());
        }
    }
    let root = root.ok_or_else(|| cli_error("One directory input is required".to_string()))?;

    // File inputs under the root become root-relative names; anything else
    // is kept as given and resolved from the root at load time.
    let relativize = |paths: Vec<PathBuf>| -> Vec<String> {
        paths
            .into_iter()
            .map(|p| match p.strip_prefix(&root) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => p.to_string_lossy().into_owned(),
            })
            .collect()
    };

    let first = relativize(first);
    let last = relativize(last);

    Ok(CliConfig {
        root,
        first,
        last,
        format: cli.format,
        verbose: env_verbose.unwrap_or(cli.verbose),
        strip: cli.strip,
        stats: cli.stats,
        dry_run: env_dry_run.unwrap_or(cli.dry_run),
    })
}
