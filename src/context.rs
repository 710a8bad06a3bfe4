// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Shared traversal state, one per generator invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::symtab::SymbolTable;

/// Mutable state threaded through every pass and handler call. There is no
/// process-wide state; the context owns the symbol table and the run-level
/// bookkeeping.
#[derive(Debug, Default)]
pub struct GenContext {
    pub symbols: SymbolTable,
    pub verbose: bool,
    /// Path of the file currently being traversed.
    pub file: PathBuf,
    /// Tally of directive commands with no registered handler.
    pub unknown: BTreeMap<String, usize>,
    /// Non-fatal notes (missing companion files and the like).
    pub notes: Vec<String>,
}

impl GenContext {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    pub fn note_unknown(&mut self, command: &str) {
        *self.unknown.entry(command.to_string()).or_insert(0) += 1;
    }

    /// Records a non-fatal note, prefixed with the file being traversed.
    pub fn note(&mut self, message: String) {
        let message = if self.file.as_os_str().is_empty() {
            message
        } else {
            format!("{}: {message}", self.file.display())
        };
        if self.verbose {
            eprintln!("{message}");
        }
        self.notes.push(message);
    }
}
