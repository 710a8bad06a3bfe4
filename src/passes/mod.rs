// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tree traversal and the pass dispatch seam.
//!
//! A pass visits every node of every parsed file in tree order. Directive
//! commands resolve through the closed [`DirectiveKind`] enumeration rather
//! than any reflective name lookup; unknown commands pass through unchanged and
//! are tallied on the context.

pub mod expand;
pub mod qstr;
pub mod stats;
pub mod strip;

use std::path::Path;

use crate::context::GenContext;
use crate::error::GenError;
use crate::parser::{DirectiveNode, Node};
use crate::tree::SourceTree;

/// One traversal strategy over the node tree.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Called before each file's nodes are visited.
    fn begin_file(&mut self, _ctx: &mut GenContext, _path: &Path) {}

    /// Returns `Some(lines)` to replace the directive's block, `None` to
    /// leave it untouched.
    fn on_directive(
        &mut self,
        ctx: &mut GenContext,
        node: &DirectiveNode,
    ) -> Result<Option<Vec<String>>, GenError>;

    /// Catch-all for plain text blocks; most passes ignore them.
    fn on_text(&mut self, _ctx: &mut GenContext, _lines: &[String]) -> Option<Vec<String>> {
        None
    }
}

/// Runs one pass over the whole tree, applying replacements in place.
pub fn run_pass(
    tree: &mut SourceTree,
    ctx: &mut GenContext,
    pass: &mut dyn Pass,
) -> Result<(), GenError> {
    for file in tree.files_mut() {
        ctx.file = file.path.clone();
        pass.begin_file(ctx, &file.path);
        for node in &mut file.nodes {
            match node {
                Node::Text(lines) => {
                    if let Some(replacement) = pass.on_text(ctx, lines) {
                        *lines = replacement;
                    }
                }
                Node::Directive(dir) => {
                    let replacement = pass
                        .on_directive(ctx, dir)
                        .map_err(|e| e.at(&file.path, dir.line).in_pass(pass.name()))?;
                    if let Some(block) = replacement {
                        dir.replace_block(block);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Normalizes a command token for lookup: upper-case, dashes to underscores.
pub fn normalize_command(command: &str) -> String {
    command.to_ascii_uppercase().replace('-', "_")
}

/// The closed set of directive commands the expand pass understands.
/// `Qstr` and `QstrEmit` belong to the qstr pass but are listed here so the
/// expand pass does not report them as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Args,
    Bind,
    Binops,
    Exceptions,
    ExceptionEmit,
    Kwargs,
    Module,
    ModuleEnd,
    Off,
    On,
    Op,
    OpEmit,
    OpInit,
    Opcodes,
    Qstr,
    QstrEmit,
    Sizes,
    Tag,
    Type,
    TypeBuiltin,
    TypeInfo,
    Wrap,
    Wrappers,
}

impl DirectiveKind {
    pub fn lookup(command: &str) -> Option<Self> {
        let kind = match normalize_command(command).as_str() {
            "ARGS" => Self::Args,
            "BIND" => Self::Bind,
            "BINOPS" => Self::Binops,
            "EXCEPTIONS" => Self::Exceptions,
            "EXCEPTION_EMIT" => Self::ExceptionEmit,
            "KWARGS" => Self::Kwargs,
            "MODULE" => Self::Module,
            "MODULE_END" => Self::ModuleEnd,
            "OFF" => Self::Off,
            "ON" => Self::On,
            "OP" => Self::Op,
            "OP_EMIT" => Self::OpEmit,
            "OP_INIT" => Self::OpInit,
            "OPCODES" => Self::Opcodes,
            "QSTR" => Self::Qstr,
            "QSTR_EMIT" => Self::QstrEmit,
            "SIZES" => Self::Sizes,
            "TAG" => Self::Tag,
            "TYPE" => Self::Type,
            "TYPE_BUILTIN" => Self::TypeBuiltin,
            "TYPE_INFO" => Self::TypeInfo,
            "WRAP" => Self::Wrap,
            "WRAPPERS" => Self::Wrappers,
            _ => return None,
        };
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalizes_case_and_dashes() {
        assert_eq!(DirectiveKind::lookup("qstr-emit"), Some(DirectiveKind::QstrEmit));
        assert_eq!(DirectiveKind::lookup("TYPE-INFO"), Some(DirectiveKind::TypeInfo));
        assert_eq!(DirectiveKind::lookup("args"), Some(DirectiveKind::Args));
        assert_eq!(DirectiveKind::lookup("no-such-thing"), None);
    }

    #[test]
    fn normalize_command_examples() {
        assert_eq!(normalize_command("exception-emit"), "EXCEPTION_EMIT");
        assert_eq!(normalize_command("bind"), "BIND");
    }

    #[test]
    fn handler_errors_name_the_pass_and_position() {
        use crate::parser::ParsedFile;
        use crate::passes::expand::ExpandPass;

        let file = ParsedFile::parse(Path::new("demo.cpp"), "//CG: module-end\n".to_string())
            .expect("parse");
        let mut tree = SourceTree::from_files(vec![file]);
        let mut ctx = GenContext::new(false);
        let err = run_pass(&mut tree, &mut ctx, &mut ExpandPass::new())
            .expect_err("module-end without module must fail");
        assert_eq!(
            err.to_string(),
            "expand: demo.cpp:1: module-end without an open module"
        );
    }
}
