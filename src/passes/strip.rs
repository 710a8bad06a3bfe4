// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The strip pass: removes generated blocks before committing source.

use crate::context::GenContext;
use crate::error::GenError;
use crate::parser::DirectiveNode;
use crate::passes::Pass;

/// Commands whose generated block must stay in source control verbatim.
const KEEP_ALL: &[&str] = &["binops", "exceptions", "if", "module", "opcodes", "qstr"];

/// Commands whose block is cut down to its signature line.
const KEEP_ONE: &[&str] = &["bind", "op", "type", "wrap", "wrappers"];

pub struct StripPass;

impl Pass for StripPass {
    fn name(&self) -> &'static str {
        "strip"
    }

    fn on_directive(
        &mut self,
        _ctx: &mut GenContext,
        node: &DirectiveNode,
    ) -> Result<Option<Vec<String>>, GenError> {
        let cmd = node.command.as_str();
        if KEEP_ONE.contains(&cmd) {
            return Ok(Some(node.block.first().cloned().into_iter().collect()));
        }
        if KEEP_ALL.contains(&cmd) {
            return Ok(None);
        }
        Ok(Some(Vec::new()))
    }
}
