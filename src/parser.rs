// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive parser: splits source text into alternating plain-text and
//! `//CG` directive nodes, and re-emits them.
//!
//! The round-trip contract is byte-exact: rendering a parsed file whose nodes
//! were never replaced reproduces the original text, including directive
//! marker lines. Only directives whose block a pass actually replaced get
//! their marker recomputed on output.

use std::path::{Path, PathBuf};

use crate::error::{GenError, GenErrorKind};

/// The four-character directive marker.
pub const MARKER: &str = "//CG";

/// Block discipline declared by a directive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// No captured lines.
    Inline,
    /// Exactly this many following lines belong to the block.
    Fixed(usize),
    /// Open-ended block terminated by a `//CG>` line.
    Open,
}

/// A directive node with its captured block.
#[derive(Debug, Clone)]
pub struct DirectiveNode {
    /// Command name as written in the source (e.g. `qstr-emit`).
    pub command: String,
    /// Positional argument tokens.
    pub args: Vec<String>,
    /// Declared block discipline.
    pub kind: BlockKind,
    /// Current block content.
    pub block: Vec<String>,
    /// Header line number in the source (1-based).
    pub line: u32,
    /// Text before the marker on the header line (indentation).
    pub prefix: String,
    /// Trailing `# ...` comment on the header line, if any.
    pub comment: Option<String>,
    header: String,
    close: Option<String>,
    rewritten: bool,
}

impl DirectiveNode {
    /// Replaces the block; the marker line is recomputed on render.
    pub fn replace_block(&mut self, block: Vec<String>) {
        self.block = block;
        self.rewritten = true;
    }

    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    fn render_into(&self, out: &mut Vec<String>) {
        if !self.rewritten {
            out.push(self.header.clone());
            out.extend(self.block.iter().cloned());
            if let Some(close) = &self.close {
                out.push(close.clone());
            }
            return;
        }

        // Canonical marker thresholds: >3 lines bracketed, 1-3 numeral,
        // empty inline.
        let head = match self.block.len() {
            0 => format!("{MARKER}:"),
            n @ 1..=3 => format!("{MARKER}{n}"),
            _ => format!("{MARKER}<"),
        };
        let open = head.ends_with('<');
        let mut words = vec![head, self.command.clone()];
        words.extend(self.args.iter().cloned());
        let mut header = format!("{}{}", self.prefix, words.join(" "));
        if let Some(comment) = &self.comment {
            header.push_str(" # ");
            header.push_str(comment);
        }
        out.push(header);

        let reindent = !self
            .block
            .first()
            .and_then(|b| b.chars().next())
            .is_some_and(|c| c.is_whitespace());
        for b in &self.block {
            if reindent {
                out.push(format!("{}{}", self.prefix, b));
            } else {
                out.push(b.clone());
            }
        }
        if open {
            out.push(format!("{}{MARKER}>", self.prefix));
        }
    }
}

/// The parser's atomic unit: an opaque text block or a directive.
#[derive(Debug, Clone)]
pub enum Node {
    Text(Vec<String>),
    Directive(DirectiveNode),
}

/// One parsed source file: original text plus its node sequence.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub text: String,
    pub nodes: Vec<Node>,
}

impl ParsedFile {
    pub fn parse(path: &Path, text: String) -> Result<Self, GenError> {
        let nodes = parse(&text).map_err(|e| e.in_file(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
            nodes,
        })
    }

    /// Renders the node sequence back to full file text.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Text(block) => lines.extend(block.iter().cloned()),
                Node::Directive(dir) => dir.render_into(&mut lines),
            }
        }
        lines.join("\n")
    }

    /// True if rendering differs from the original text.
    pub fn is_dirty(&self) -> bool {
        self.render() != self.text
    }
}

/// Splits source text into nodes. Lines are separated by `\n`; the split
/// preserves a trailing newline as a final empty line, so rendering is
/// byte-exact.
pub fn parse(text: &str) -> Result<Vec<Node>, GenError> {
    let mut nodes: Vec<Node> = Vec::new();
    let mut fixed_remaining = 0usize;
    let mut open_block = false;
    let mut last_line = 0u32;

    for (idx, line) in text.split('\n').enumerate() {
        let line_no = idx as u32 + 1;
        last_line = line_no;

        if fixed_remaining > 0 {
            // Fixed blocks capture exactly N lines regardless of content,
            // marker lookalikes included.
            push_block_line(&mut nodes, line);
            fixed_remaining -= 1;
            continue;
        }

        let offset = match line.find(MARKER) {
            Some(offset) => offset,
            None => {
                if open_block {
                    push_block_line(&mut nodes, line);
                } else {
                    push_text_line(&mut nodes, line);
                }
                continue;
            }
        };

        let rest = &line[offset + MARKER.len()..];
        if rest.starts_with('>') {
            if !open_block {
                return Err(parse_err(line_no, "close marker without open block", line));
            }
            open_block = false;
            if let Some(Node::Directive(dir)) = nodes.last_mut() {
                dir.close = Some(line.to_string());
            }
            continue;
        }
        if open_block {
            return Err(parse_err(line_no, "directive marker inside open block", line));
        }

        let (kind, body) = match rest.chars().next() {
            Some(c) if c.is_ascii_digit() => {
                (BlockKind::Fixed((c as u8 - b'0') as usize), &rest[1..])
            }
            Some('<') => (BlockKind::Open, &rest[1..]),
            Some(':') => (BlockKind::Inline, &rest[1..]),
            Some(_) => (BlockKind::Inline, rest),
            None => return Err(parse_err(line_no, "bare directive marker", line)),
        };
        if !body
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace())
        {
            return Err(parse_err(line_no, "malformed directive header", line));
        }

        let (spec, comment) = match body.find('#') {
            Some(pos) => (&body[..pos], Some(body[pos + 1..].trim().to_string())),
            None => (body, None),
        };
        let mut tokens = spec.split_whitespace().map(str::to_string);
        let command = tokens
            .next()
            .ok_or_else(|| parse_err(line_no, "missing directive command", line))?;
        let args: Vec<String> = tokens.collect();

        match kind {
            BlockKind::Fixed(n) => fixed_remaining = n,
            BlockKind::Open => open_block = true,
            BlockKind::Inline => {}
        }
        nodes.push(Node::Directive(DirectiveNode {
            command,
            args,
            kind,
            block: Vec::new(),
            line: line_no,
            prefix: line[..offset].to_string(),
            comment,
            header: line.to_string(),
            close: None,
            rewritten: false,
        }));
    }

    if open_block {
        return Err(parse_err(last_line, "missing //CG> before end of file", ""));
    }
    if fixed_remaining > 0 {
        return Err(parse_err(
            last_line,
            "fixed block truncated by end of file",
            "",
        ));
    }
    Ok(nodes)
}

fn push_block_line(nodes: &mut [Node], line: &str) {
    if let Some(Node::Directive(dir)) = nodes.last_mut() {
        dir.block.push(line.to_string());
    }
}

fn push_text_line(nodes: &mut Vec<Node>, line: &str) {
    if let Some(Node::Text(block)) = nodes.last_mut() {
        block.push(line.to_string());
    } else {
        nodes.push(Node::Text(vec![line.to_string()]));
    }
}

fn parse_err(line: u32, msg: &str, context: &str) -> GenError {
    let msg = format!("line {line}: {msg}");
    let param = if context.is_empty() {
        None
    } else {
        Some(context)
    };
    GenError::new(GenErrorKind::Parse, &msg, param)
}
