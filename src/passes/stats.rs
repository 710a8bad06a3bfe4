// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The stats pass: tallies directives per command, mutates nothing.

use std::collections::BTreeMap;

use crate::context::GenContext;
use crate::error::GenError;
use crate::parser::DirectiveNode;
use crate::passes::Pass;

#[derive(Default)]
pub struct StatsPass {
    counts: BTreeMap<String, usize>,
}

impl StatsPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies per command, sorted by command name.
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn into_counts(self) -> BTreeMap<String, usize> {
        self.counts
    }
}

impl Pass for StatsPass {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn on_directive(
        &mut self,
        _ctx: &mut GenContext,
        node: &DirectiveNode,
    ) -> Result<Option<Vec<String>>, GenError> {
        *self.counts.entry(node.command.clone()).or_insert(0) += 1;
        Ok(None)
    }
}
