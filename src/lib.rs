// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! cgforge: a directive-driven, in-place code generator.
//!
//! Source files carry `//CG` directive markers whose blocks this tool
//! computes and substitutes. Parsing keeps everything outside directives
//! byte-exact, and files are only written back when their generated content
//! actually changed, so repeated runs converge to a fixed point.

pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod parser;
pub mod passes;
pub mod symtab;
pub mod tree;
