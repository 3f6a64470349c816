//! Identifiers and the three parallel, append-only symbol tables (§3 "Symbols", §4.A).
//!
//! Every identifier is one of `Name`/`Val`/`Temp`; `Val` and `Temp` carry a
//! globally-unique integer `k` that indexes into three parallel tables (AST
//! info, K-form info, C-form info). Equality and hashing use `k` only — the
//! textual prefix is descriptive and must never participate in comparison,
//! or the name-mangler's memoization (§4.E, §9 "Identifier comparison")
//! silently breaks.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::CompileError;
use crate::span::Span;

/// The raw integer handle shared by all three symbol tables.
///
/// A `Copy` handle over a dense index, hashed and compared purely on the
/// integer rather than on any descriptive text.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct SymId(u32);

impl SymId {
    #[inline]
    pub const fn from_raw(k: u32) -> Self {
        Self(k)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `k` is one handle shared across the AST-info, K-form-info, and C-form-info
/// tables (§3). They are distinguished only so a pass can't accidentally
/// index the wrong table with the wrong kind of lookup key; all three share
/// the same underlying sequence produced by `new_id`.
pub type AstId = SymId;
pub type KId = SymId;
pub type CId = SymId;

/// A compiler identifier: unresolved textual name, user-visible value, or
/// compiler-generated temporary. `NONE` is the distinguished empty id (§3).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Ident {
    /// Unresolved textual name — only ever appears in parser-fragment ASTs
    /// that predate symbol resolution; never flows into K-form.
    Name(String),
    /// A user-visible value or function with textual prefix `s` and
    /// globally-unique id `k`.
    Val(String, SymId),
    /// A compiler-generated temporary; same shape as `Val`, printed with a
    /// different convention (e.g. `t123` instead of the source name).
    Temp(String, SymId),
    /// The distinguished empty identifier.
    None,
}

impl Ident {
    pub const NONE: Ident = Ident::None;

    pub fn val(prefix: impl Into<String>, k: SymId) -> Self {
        Ident::Val(prefix.into(), k)
    }

    pub fn temp(prefix: impl Into<String>, k: SymId) -> Self {
        Ident::Temp(prefix.into(), k)
    }

    /// The integer id, if this identifier has one (`Val`/`Temp`).
    pub fn id(&self) -> Option<SymId> {
        match self {
            Ident::Val(_, k) | Ident::Temp(_, k) => Some(*k),
            Ident::Name(_) | Ident::None => None,
        }
    }

    /// The raw `u32`, for serialization/debugging. Panics on `Name`/`None`.
    pub fn as_u32(&self) -> u32 {
        self.id().expect("Ident::as_u32 on an id-less identifier").as_u32()
    }

    pub fn prefix(&self) -> &str {
        match self {
            Ident::Name(s) | Ident::Val(s, _) | Ident::Temp(s, _) => s,
            Ident::None => "",
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Ident::Temp(..))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Ident::None)
    }
}

// Equality/hashing key on `k` only (and on the Name variant's text, since it
// has no `k`). The prefix string carried alongside `Val`/`Temp` is purely
// descriptive and must never affect comparison (§9).
impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Ident::Val(_, a), Ident::Val(_, b)) => a == b,
            (Ident::Temp(_, a), Ident::Temp(_, b)) => a == b,
            (Ident::Name(a), Ident::Name(b)) => a == b,
            (Ident::None, Ident::None) => true,
            _ => false,
        }
    }
}
impl Eq for Ident {}

impl Hash for Ident {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Ident::Val(_, k) | Ident::Temp(_, k) => k.hash(state),
            Ident::Name(s) => s.hash(state),
            Ident::None => {}
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Name(s) => write!(f, "{s}"),
            Ident::Val(s, k) => write!(f, "{s}/{}", k.as_u32()),
            Ident::Temp(s, k) => write!(f, "{s}@{}", k.as_u32()),
            Ident::None => write!(f, "<none>"),
        }
    }
}

/// One of the three parallel, append-only, id-indexed symbol tables (§4.A).
///
/// `push_empty` is the only way to grow a table and must be called in
/// lockstep across all three tables sharing a `k` sequence (see
/// `SymbolTables::new_id`) so their lengths stay synchronized. Once a stage
/// is done growing ids the table is conceptually frozen; nothing enforces
/// this beyond convention.
#[derive(Clone, Debug, Default)]
pub struct IdTable<Info> {
    entries: Vec<Option<Info>>,
}

impl<Info> IdTable<Info> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a fresh empty entry, returning its id. Callers that share a
    /// `k` sequence across tables (see `SymbolTables`) must call this in
    /// lockstep so indices line up.
    pub fn push_empty(&mut self) -> SymId {
        let id = SymId::from_raw(self.entries.len() as u32);
        self.entries.push(None);
        id
    }

    pub fn get(&self, id: SymId) -> Option<&Info> {
        self.entries.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: SymId) -> Option<&mut Info> {
        self.entries.get_mut(id.index())?.as_mut()
    }

    pub fn set_info(&mut self, id: SymId, info: Info) {
        self.entries[id.index()] = Some(info);
    }

    /// Read an entry, turning a missing one into a located `Internal`
    /// compile error rather than a panic (§4.A: "reads of an empty entry
    /// are compile errors with the source location").
    pub fn expect_info(&self, id: SymId, span: Span) -> Result<&Info, CompileError> {
        self.get(id).ok_or_else(|| CompileError::Internal {
            span: Some(span),
            invariant: format!("symbol table entry for {} is empty", id),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymId, &Info)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|info| (SymId::from_raw(i as u32), info)))
    }

    /// Reinitialize to an empty table of the given length, all entries
    /// empty. Used when a later stage's table must start in sync with an
    /// earlier stage's frozen length (§4.A).
    pub fn init_to_len(&mut self, len: usize) {
        self.entries.clear();
        self.entries.resize_with(len, || None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_equality_ignores_prefix() {
        let k = SymId::from_raw(7);
        let a = Ident::val("foo", k);
        let b = Ident::val("bar", k);
        assert_eq!(a, b, "idents with the same k must compare equal regardless of prefix");
    }

    #[test]
    fn ident_equality_distinguishes_val_and_temp() {
        let k = SymId::from_raw(3);
        assert_ne!(Ident::val("x", k), Ident::temp("x", k));
    }

    #[test]
    fn id_table_push_and_get() {
        let mut t: IdTable<i32> = IdTable::new();
        let id = t.push_empty();
        assert!(t.get(id).is_none());
        t.set_info(id, 42);
        assert_eq!(t.get(id), Some(&42));
    }

    #[test]
    fn id_table_expect_info_on_empty_is_internal_error() {
        let mut t: IdTable<i32> = IdTable::new();
        let id = t.push_empty();
        let err = t.expect_info(id, Span::synthetic()).unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }
}
