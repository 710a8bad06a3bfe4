// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Interned symbol ("qstr") table.
//!
//! Assigns stable, monotonically increasing ids to distinct strings. Ids are
//! never reassigned within a run; first-seen order determines the id value.
//! Seeded entries come from the checked-in builtin table, fresh entries from
//! phase-1 reference substitution.

use std::collections::HashMap;

/// Insertion-ordered string-to-id table with per-entry encoded byte lengths.
#[derive(Debug, Default)]
pub struct SymbolTable {
    ids: HashMap<String, usize>,
    order: Vec<String>,
    lens: Vec<usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one builtin entry with an explicit id and encoded length
    /// (decoded byte count plus the terminating NUL).
    pub fn seed(&mut self, text: &str, id: usize, encoded_len: usize) {
        if self.ids.contains_key(text) {
            return;
        }
        self.ids.insert(text.to_string(), id);
        self.order.push(text.to_string());
        self.lens.push(encoded_len);
    }

    /// Returns the id for `text`, assigning the next sequential id for a
    /// previously unseen string.
    pub fn intern(&mut self, text: &str) -> usize {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = self.ids.len() + 1;
        self.ids.insert(text.to_string(), id);
        self.order.push(text.to_string());
        self.lens.push(text.len() + 1);
        id
    }

    pub fn get(&self, text: &str) -> Option<usize> {
        self.ids.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order: (string, id, encoded length).
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize, usize)> {
        self.order
            .iter()
            .zip(&self.lens)
            .map(|(text, &len)| (text.as_str(), self.ids[text], len))
    }
}

/// The qstr hash: djb2 with xor, truncated to 32 bits by wrapping.
pub fn qstr_hash(text: &str) -> u32 {
    let mut h: u32 = 5381;
    for &b in text.as_bytes() {
        h = (h.wrapping_shl(5).wrapping_add(h)) ^ b as u32;
    }
    h
}

/// Decodes C-style backslash escapes, returning the raw byte count.
/// Unknown escapes keep the escaped character, as a C compiler would.
pub fn decoded_len(text: &str) -> usize {
    let mut count = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            count += c.len_utf8();
            continue;
        }
        match chars.next() {
            Some('x') => {
                // \xHH consumes up to two hex digits.
                let mut rest = chars.clone();
                for _ in 0..2 {
                    match rest.next() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            chars.next();
                        }
                        _ => break,
                    }
                }
                count += 1;
            }
            Some(c) => count += c.len_utf8(),
            None => count += 1,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_assigns_sequential_ids_from_one() {
        let mut table = SymbolTable::new();
        assert_eq!(table.intern("foo"), 1);
        assert_eq!(table.intern("bar"), 2);
        assert_eq!(table.intern("foo"), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn seeded_ids_are_stable_and_continue_sequentially() {
        let mut table = SymbolTable::new();
        table.seed("foo", 1, 4);
        // Three lookups of the seeded string and one new string: exactly
        // two distinct ids, the new one next in sequence.
        assert_eq!(table.intern("foo"), 1);
        assert_eq!(table.intern("foo"), 1);
        assert_eq!(table.intern("foo"), 1);
        assert_eq!(table.intern("bar"), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn entries_preserve_insertion_order_and_lengths() {
        let mut table = SymbolTable::new();
        table.seed("a\\n", 1, 3);
        table.intern("bcd");
        let entries: Vec<_> = table.entries().collect();
        assert_eq!(entries, vec![("a\\n", 1, 3), ("bcd", 2, 4)]);
    }

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(qstr_hash(""), 5381);
        // h = ((5381 << 5) + 5381) ^ 'a' = 177573 ^ 97
        assert_eq!(qstr_hash("a"), 177573 ^ 97);
        assert_eq!(qstr_hash("a") & 0xFF, 0xC4);
    }

    #[test]
    fn decoded_len_counts_escapes_as_single_bytes() {
        assert_eq!(decoded_len("abc"), 3);
        assert_eq!(decoded_len("a\\nb"), 3);
        assert_eq!(decoded_len("\\x2a"), 1);
        assert_eq!(decoded_len("\\\\"), 1);
        assert_eq!(decoded_len("a\\x41b"), 3);
    }
}
