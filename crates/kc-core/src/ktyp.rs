//! Structural types shared by the AST and K-form (§3 "K-form", §4.E).
//!
//! The same `KTyp` tree is used from the type-checked input AST all the way
//! through K-normalization; the name mangler (§4.E) is the pass that turns
//! most of these structural shapes into `KTypName` references to a
//! materialized `KDefTyp`. `KTypRecord` is the one shape retained as-is
//! rather than being converted — see §3's "Structural invariants".

use serde::{Deserialize, Serialize};

use crate::symbol::SymId;

/// A structural type. Primitive variants are scalar by construction;
/// compound variants (`Tuple`, `List`, `Ref`, `Fun`) must, after mangling,
/// have been rewritten to `Name` (§8 invariant "For every non-record
/// KTypTuple, KTypList, KTypRef, KTypFun that appears in K-form after
/// mangling, it has been rewritten to KTypName").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KTyp {
    Void,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Char,
    String,
    /// An opaque C pointer (`cptr` in §4.E's signature codes).
    CPtr,
    /// An exception value (`E` in §4.E's signature codes).
    Exn,
    Tuple(Vec<KTyp>),
    /// A record type: named fields in declaration order. Unlike the other
    /// compound shapes, records are never converted to a structural
    /// encoding by the mangler — they're always nominal already, or become
    /// nominal immediately on first use (§3).
    Record(Vec<RecordField>),
    /// A multi-case (or recursive single-case) variant, referenced nominally
    /// once `KDefVariant` exists; appears structurally only transiently
    /// during K-normalization of a case literal.
    Variant(SymId),
    List(Box<KTyp>),
    Ref(Box<KTyp>),
    Array(Box<KTyp>, u32),
    Fun(Box<KTyp>, Vec<KTyp>),
    /// A reference to a materialized `KDefTyp`/`KDefVariant` entry — the
    /// mangler's target representation for every compound shape above.
    Name(SymId),
    /// Placeholder for a type that failed to resolve; encountering this
    /// anywhere past type-checking (e.g. inside the mangler) is an
    /// `Internal` error, never a diagnostic (§7: "Internal ... KTypErr
    /// appearing in mangler").
    Err,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub typ: KTyp,
    /// Source text of the field's default initializer, if declared.
    /// K-normalization fills missing constructor fields from this; a field
    /// with neither a supplied value nor a default is a compile error
    /// (§4.C "Record construction").
    pub default: Option<String>,
}

impl KTyp {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            KTyp::Void
                | KTyp::Bool
                | KTyp::Int
                | KTyp::Int8
                | KTyp::Int16
                | KTyp::Int32
                | KTyp::Int64
                | KTyp::UInt8
                | KTyp::UInt16
                | KTyp::UInt32
                | KTyp::UInt64
                | KTyp::Float16
                | KTyp::Float32
                | KTyp::Float64
                | KTyp::Char
        )
    }

    /// True for the structural shapes the mangler (§4.E) must rewrite to
    /// `Name` before C-form generation; `Record` is deliberately excluded.
    pub fn is_structural_anonymous(&self) -> bool {
        matches!(self, KTyp::Tuple(_) | KTyp::List(_) | KTyp::Ref(_) | KTyp::Fun(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_not_structural_anonymous() {
        let t = KTyp::Record(vec![]);
        assert!(!t.is_structural_anonymous());
    }

    #[test]
    fn tuple_is_structural_anonymous() {
        let t = KTyp::Tuple(vec![KTyp::Int, KTyp::Float64]);
        assert!(t.is_structural_anonymous());
    }
}
