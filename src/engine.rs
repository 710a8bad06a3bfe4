// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The generation pipeline: load, run passes in phase order, write back.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::json;

use crate::cli::CliConfig;
use crate::context::GenContext;
use crate::error::GenError;
use crate::passes::expand::ExpandPass;
use crate::passes::qstr::{QstrPass, QstrPhase};
use crate::passes::stats::StatsPass;
use crate::passes::strip::StripPass;
use crate::passes::run_pass;
use crate::tree::SourceTree;

/// Outcome of one generator invocation.
#[derive(Debug)]
pub struct RunReport {
    /// Files whose content changed (or would change, with dry-run).
    pub rewritten: Vec<PathBuf>,
    /// Directive commands with no handler, with occurrence counts.
    pub unknown: BTreeMap<String, usize>,
    /// Non-fatal notes collected during the run.
    pub notes: Vec<String>,
    /// Directive tally, present when --stats was requested.
    pub stats: Option<BTreeMap<String, usize>>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(stats) = &self.stats {
            for (cmd, count) in stats {
                out.push_str(&format!("{cmd} {count}\n"));
            }
        }
        let verb = if self.dry_run { "would rewrite" } else { "rewriting" };
        for path in &self.rewritten {
            out.push_str(&format!("{verb}: {}\n", path.display()));
        }
        for (cmd, count) in &self.unknown {
            out.push_str(&format!("unknown directive: {cmd} ({count}x)\n"));
        }
        out
    }

    pub fn render_json(&self) -> serde_json::Value {
        let rewritten: Vec<String> = self
            .rewritten
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        json!({
            "rewritten": rewritten,
            "dryRun": self.dry_run,
            "unknown": self.unknown,
            "notes": self.notes,
            "stats": self.stats,
        })
    }

    pub fn has_unknown(&self) -> bool {
        !self.unknown.is_empty()
    }
}

/// Runs the full pipeline over the configured tree:
/// parse, optional stats, expand, the three qstr phases, optional strip,
/// then write-back of changed files.
pub fn run(config: &CliConfig) -> Result<RunReport, GenError> {
    let mut tree = SourceTree::load(&config.root, &config.first, &config.last)?;
    let mut ctx = GenContext::new(config.verbose);

    let mut stats = None;
    if config.stats {
        let mut pass = StatsPass::new();
        run_pass(&mut tree, &mut ctx, &mut pass)?;
        stats = Some(pass.into_counts());
    }

    run_pass(&mut tree, &mut ctx, &mut ExpandPass::new())?;
    for phase in [QstrPhase::Seed, QstrPhase::Substitute, QstrPhase::Emit] {
        run_pass(&mut tree, &mut ctx, &mut QstrPass::new(phase))?;
    }
    if config.strip {
        run_pass(&mut tree, &mut ctx, &mut StripPass)?;
    }

    let rewritten = tree.emit(config.dry_run)?;
    Ok(RunReport {
        rewritten,
        unknown: ctx.unknown,
        notes: ctx.notes,
        stats,
        dry_run: config.dry_run,
    })
}
