// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types for the code generator.

use std::fmt;
use std::path::Path;

/// Categories of generator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenErrorKind {
    Cli,
    Parse,
    Directive,
    Reference,
    Io,
}

/// A generator error with a kind and message.
#[derive(Debug, Clone)]
pub struct GenError {
    kind: GenErrorKind,
    message: String,
}

impl GenError {
    pub fn new(kind: GenErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    /// Attaches a file + line position prefix to the message.
    pub fn at(self, path: &Path, line: u32) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}:{}: {}", path.display(), line, self.message),
        }
    }

    /// Attaches the reporting pass name as a message prefix.
    pub fn in_pass(self, pass: &str) -> Self {
        Self {
            kind: self.kind,
            message: format!("{pass}: {}", self.message),
        }
    }

    /// Attaches a file prefix to the message.
    pub fn in_file(self, path: &Path) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", path.display(), self.message),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> GenErrorKind {
        self.kind
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenError {}

impl From<std::io::Error> for GenError {
    fn from(err: std::io::Error) -> Self {
        Self::new(GenErrorKind::Io, &err.to_string(), None)
    }
}

fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}
