// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arena-backed string interning.

use std::cmp::Ordering;

use vigil_mem::{Arena, Span};

use crate::hash::fnv1a_seeded;
use crate::objtbl::{ObjTbl, TblOps};

/// Handle to an interned string.
///
/// Symbols compare equal iff the interned contents are equal within the
/// same [`Interner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sym(u32);

#[derive(Debug)]
struct SymEntry {
    sym: Sym,
    span: Span,
}

struct SymOps<'a> {
    arena: &'a Arena,
}

impl TblOps<SymEntry> for SymOps<'_> {
    fn hash(&self, item: &SymEntry, seed: u32) -> u32 {
        fnv1a_seeded(seed, self.arena.get(item.span))
    }
    fn cmp(&self, a: &SymEntry, b: &SymEntry) -> Ordering {
        self.arena.get(a.span).cmp(self.arena.get(b.span))
    }
}

/// Value-keyed string interner.
///
/// Interned bytes are copied into an [`Arena`] once; subsequent interns of
/// equal content return the same [`Sym`]. All storage is released together
/// when the interner is dropped, which matches the per-run lifetime of the
/// collation tables.
#[derive(Debug)]
pub struct Interner {
    arena: Arena,
    spans: Vec<Span>,
    tbl: ObjTbl<SymEntry>,
}

impl Interner {
    /// Create an interner hashing under `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            arena: Arena::default(),
            spans: Vec::new(),
            tbl: ObjTbl::with_capacity(seed, 1024),
        }
    }

    /// Number of distinct strings interned.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// `true` when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Intern `s`, deduplicating by content.
    pub fn intern(&mut self, s: &str) -> Sym {
        self.intern_bytes(s.as_bytes())
    }

    /// Intern raw bytes, deduplicating by content.
    pub fn intern_bytes(&mut self, bytes: &[u8]) -> Sym {
        // The probe needs its bytes in the arena for hash/compare; rolled
        // back on a hit.
        let probe_span = self.arena.alloc(bytes);
        let probe = SymEntry {
            sym: Sym(self.spans.len() as u32),
            span: probe_span,
        };

        let ops = SymOps { arena: &self.arena };
        if let Some(existing) = self.tbl.get(&ops, &probe) {
            let sym = existing.sym;
            self.arena.rollback(probe_span);
            return sym;
        }

        let sym = probe.sym;
        self.spans.push(probe_span);
        self.tbl.insert(&ops, probe);
        sym
    }

    /// Resolve a symbol to its bytes.
    pub fn resolve_bytes(&self, sym: Sym) -> &[u8] {
        self.arena.get(self.spans[sym.0 as usize])
    }

    /// Resolve a symbol to its text.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was interned from non-UTF-8 bytes.
    pub fn resolve(&self, sym: Sym) -> &str {
        std::str::from_utf8(self.resolve_bytes(sym)).expect("symbol is not UTF-8")
    }
}
