// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The qstr pass: symbol interning in three traversal phases.
//!
//! Phase order is fixed. Seeding reads the checked-in builtin table,
//! substitution assigns ids to every `Q(n,"str")` reference in the tree
//! (text nodes included), and emission renders the packed table. Emission
//! never mutates the table, so re-running it is idempotent.

use std::collections::HashSet;
use std::path::Path;

use crate::context::GenContext;
use crate::error::{GenError, GenErrorKind};
use crate::parser::DirectiveNode;
use crate::passes::{DirectiveKind, Pass};
use crate::symtab::{qstr_hash, decoded_len, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QstrPhase {
    /// Seed the table from `qstr` directive blocks.
    Seed,
    /// Rewrite `Q(n,"str")` references everywhere, interning new strings.
    Substitute,
    /// Render the packed table into `qstr-emit` blocks.
    Emit,
}

pub struct QstrPass {
    phase: QstrPhase,
}

impl QstrPass {
    pub fn new(phase: QstrPhase) -> Self {
        Self { phase }
    }
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Matches `[ \d]*\d,"…")` starting just past `Q(`, returning the string
/// content and the byte offset one past the closing parenthesis. The content
/// ends at the first quote directly followed by a parenthesis, so embedded
/// backslash escapes pass through untouched.
fn match_ref(line: &str, pos: usize) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    let mut i = pos;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i].is_ascii_digit()) {
        i += 1;
    }
    if i == pos || !bytes[i - 1].is_ascii_digit() {
        return None;
    }
    if bytes.get(i) != Some(&b',') || bytes.get(i + 1) != Some(&b'"') {
        return None;
    }
    let start = i + 2;
    let mut j = start;
    while j < bytes.len() {
        if bytes[j] == b'"' && bytes.get(j + 1) == Some(&b')') {
            return Some((&line[start..j], j + 2));
        }
        j += 1;
    }
    None
}

/// Rewrites every qstr reference in `line` with its interned id.
pub fn substitute_line(table: &mut SymbolTable, line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut copied = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'Q'
            && bytes[i + 1] == b'('
            && (i == 0 || !is_word(bytes[i - 1]))
        {
            if let Some((text, end)) = match_ref(line, i + 2) {
                let id = table.intern(text);
                out.push_str(&line[copied..i]);
                out.push_str(&format!("Q({id},\"{text}\")"));
                copied = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&line[copied..]);
    out
}

fn substitute_block(table: &mut SymbolTable, lines: &[String]) -> Option<Vec<String>> {
    let out: Vec<String> = lines
        .iter()
        .map(|line| substitute_line(table, line))
        .collect();
    if out == lines {
        None
    } else {
        Some(out)
    }
}

/// Extracts the string literal from a seed line like `"print" "\0" // 172`.
fn seed_entry(line: &str) -> Option<String> {
    let cleaned = line.replace("\"\\0\"", "");
    let parts: Vec<&str> = cleaned.split('"').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(parts[parts.len() - 2].to_string())
}

fn seed(table: &mut SymbolTable, node: &DirectiveNode) -> Result<(), GenError> {
    let mut off: usize = match node.args.first() {
        Some(a) => a.parse().map_err(|_| {
            GenError::new(GenErrorKind::Directive, "qstr offset must be an integer", Some(a))
        })?,
        None => 0,
    };
    for line in &node.block {
        let text = seed_entry(line).ok_or_else(|| {
            GenError::new(GenErrorKind::Directive, "malformed qstr seed line", Some(line))
        })?;
        let len = decoded_len(&text) + 1;
        table.seed(&text, off, len);
        off += 1;
    }
    Ok(())
}

/// Renders the packed table sections selected by `mode` without touching
/// interning state.
fn emit(table: &SymbolTable, mode: &str) -> Result<Vec<String>, GenError> {
    if !matches!(mode, "x" | "h" | "s" | "v") {
        return Err(GenError::new(
            GenErrorKind::Directive,
            "qstr-emit mode must be x, h, s or v",
            Some(mode),
        ));
    }
    let mut out = Vec::new();
    let count = table.len();
    let num = count + 2;

    if mode == "x" || mode == "v" {
        // Cumulative two-byte offsets: a leading count slot, one slot per
        // string, a trailing sentinel. The first offset points past the
        // index itself.
        let mut lens = Vec::with_capacity(num);
        lens.push(count);
        lens.extend(table.entries().map(|(_, _, len)| len));
        lens.push(0);
        let mut line = String::new();
        let mut i = 0usize;
        let mut n = 2 * num;
        for x in &lens {
            line.push_str(&format!("\\x{:02X}\\x{:02X}", n & 0xFF, (n >> 8) & 0xFF));
            i += 1;
            n += x;
            if i % 8 == 0 {
                out.push(format!("\"{line}\""));
                line.clear();
            }
        }
        if !line.is_empty() {
            out.push(format!("\"{line}\""));
        }
        out.push(format!(
            "// index [0..{}], hashes [{}..{}], {} strings [{}..{}]",
            2 * i - 1,
            2 * i,
            2 * i + num - 3,
            i - 2,
            2 * i + num - 2,
            n - 1
        ));
    }

    if mode == "h" || mode == "v" {
        let mut line = String::new();
        let mut distinct = HashSet::new();
        let mut i = 0usize;
        for (text, _, _) in table.entries() {
            let b = (qstr_hash(text) & 0xFF) as u8;
            line.push_str(&format!("\\x{b:02X}"));
            distinct.insert(b);
            i += 1;
            if i % 16 == 0 {
                out.push(format!("\"{line}\""));
                line.clear();
            }
        }
        if !line.is_empty() {
            out.push(format!("\"{line}\""));
        }
        out.push(format!("// found {} distinct hashes", distinct.len()));
    }

    if mode == "s" || mode == "v" {
        for (text, id, _) in table.entries() {
            out.push(format!("{:<22} \"\\0\" // {id}", format!("\"{text}\"")));
        }
    }

    Ok(out)
}

impl Pass for QstrPass {
    fn name(&self) -> &'static str {
        match self.phase {
            QstrPhase::Seed => "qstr-seed",
            QstrPhase::Substitute => "qstr-substitute",
            QstrPhase::Emit => "qstr-emit",
        }
    }

    fn begin_file(&mut self, _ctx: &mut GenContext, _path: &Path) {}

    fn on_directive(
        &mut self,
        ctx: &mut GenContext,
        node: &DirectiveNode,
    ) -> Result<Option<Vec<String>>, GenError> {
        match (self.phase, DirectiveKind::lookup(&node.command)) {
            (QstrPhase::Seed, Some(DirectiveKind::Qstr)) => {
                seed(&mut ctx.symbols, node)?;
                Ok(None)
            }
            (QstrPhase::Substitute, _) => Ok(substitute_block(&mut ctx.symbols, &node.block)),
            (QstrPhase::Emit, Some(DirectiveKind::QstrEmit)) => {
                let mode = node.args.first().map(String::as_str).unwrap_or("v");
                emit(&ctx.symbols, mode).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn on_text(&mut self, ctx: &mut GenContext, lines: &[String]) -> Option<Vec<String>> {
        if self.phase == QstrPhase::Substitute {
            substitute_block(&mut ctx.symbols, lines)
        } else {
            None
        }
    }
}
