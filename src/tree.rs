// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source tree loading, ordering, and write-back.
//!
//! Traversal order is deterministic: explicitly listed "first" files in the
//! given order, then the root directory's entries sorted by name, then the
//! "last" files. Symbol id assignment depends on this order, so it must be
//! reproducible for identical inputs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GenError, GenErrorKind};
use crate::parser::ParsedFile;

/// Extensions picked up by the directory scan.
const SOURCE_EXTENSIONS: [&str; 3] = ["h", "c", "cpp"];

/// All parsed files of one invocation, in traversal order.
#[derive(Debug, Default)]
pub struct SourceTree {
    files: Vec<ParsedFile>,
}

impl SourceTree {
    /// Loads and parses the root directory plus the first/last file lists
    /// (names resolved within the root). Parse failures are collected per
    /// file and reported together; one broken file does not hide another.
    pub fn load(root: &Path, first: &[String], last: &[String]) -> Result<Self, GenError> {
        let mut names: Vec<String> = Vec::new();
        names.extend(first.iter().cloned());

        let mut listed: Vec<String> = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| GenError::from(e).in_file(root))? {
            let entry = entry.map_err(|e| GenError::from(e).in_file(root))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            listed.push(name);
        }
        listed.sort();
        for name in listed {
            if first.contains(&name) || last.contains(&name) {
                continue;
            }
            if has_source_extension(Path::new(&name)) {
                names.push(name);
            }
        }
        names.extend(last.iter().cloned());

        let mut files = Vec::with_capacity(names.len());
        let mut failures: Vec<String> = Vec::new();
        for name in names {
            let path = root.join(&name);
            let text = fs::read_to_string(&path).map_err(|e| GenError::from(e).in_file(&path))?;
            match ParsedFile::parse(&path, text) {
                Ok(file) => files.push(file),
                Err(err) => failures.push(err.to_string()),
            }
        }
        if !failures.is_empty() {
            return Err(GenError::new(GenErrorKind::Parse, &failures.join("\n"), None));
        }
        Ok(Self { files })
    }

    pub fn from_files(files: Vec<ParsedFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> impl Iterator<Item = &ParsedFile> {
        self.files.iter()
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut ParsedFile> {
        self.files.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes back every file whose rendered text changed, returning the
    /// rewritten paths. With `dry_run` nothing is written but the would-be
    /// rewrites are still reported.
    pub fn emit(&self, dry_run: bool) -> Result<Vec<PathBuf>, GenError> {
        let mut rewritten = Vec::new();
        for file in &self.files {
            let out = file.render();
            if out != file.text {
                if !dry_run {
                    fs::write(&file.path, &out).map_err(|e| GenError::from(e).in_file(&file.path))?;
                }
                rewritten.push(file.path.clone());
            }
        }
        Ok(rewritten)
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}
