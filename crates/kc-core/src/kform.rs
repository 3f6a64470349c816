//! K-form: the let-normalized IR (§3 "K-form").
//!
//! Every primitive operand is an `Atom` — either an identifier already bound
//! by an enclosing `Block`, or a literal. Anything non-atomic that would
//! otherwise appear as an operand gets hoisted into a fresh `KDefVal` by the
//! K-normalizer and replaced by a reference to it; see `crate::ast` for the
//! tree this is lowered from.

use serde::{Deserialize, Serialize};

use crate::ast::{BinOp, FunFlags, Literal, UnOp};
use crate::ktyp::KTyp;
use crate::span::Span;
use crate::symbol::Ident;

/// An atomic operand: already-bound identifier, or a literal (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Atom {
    Id(Ident),
    Lit(Literal),
}

impl Atom {
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Atom::Id(id) => Some(id),
            Atom::Lit(_) => None,
        }
    }
}

/// A K-form primitive not expressible as a user function (Glossary
/// "Intrinsic"). Emitted by the pattern compiler (§4.B) and by specific
/// K-normalization lowerings (§4.C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    VariantTag,
    VariantCase,
    ListHead,
    ListTail,
    StrConcat,
    GetSize,
    CheckIdx,
    PopExn,
}

/// One `pattern <- domain` clause of a lowered comprehension, retaining the
/// original source nesting as a list of stages (§3's "list of clause-stages").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KClauseStage {
    /// Code that must run once, before the loop over this stage's domain
    /// (e.g. evaluating a non-atomic iterable expression into a temp).
    pub pre_code: Vec<KStmt>,
    pub domain: KIterDomain,
    /// The proxy identifier bound to each element of `domain`, later
    /// unpacked in the body as `val pat = i` (§4.C).
    pub proxy: Ident,
    pub at_index: Option<KAtIndex>,
    pub when: Option<Box<KExpr>>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KIterDomain {
    Range { start: Atom, end: Atom, step: Atom },
    Array(Atom),
    List(Atom),
    String(Atom),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KAtIndex {
    Single(Ident),
    Multi(Vec<Ident>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KExprKind {
    Atom(Atom),
    Binop(BinOp, Atom, Atom),
    Unop(UnOp, Atom),
    Call(Atom, Vec<Atom>),
    MkTuple(Vec<Atom>),
    /// `ctor` is set when constructing a case of a variant rather than a
    /// plain record (§4.C: "requires a constructor id if the record is a
    /// variant case").
    MkRecord { ctor: Option<Ident>, fields: Vec<Atom> },
    MkArray(Vec<Atom>),
    /// Tuple/record field access by position — `ExpMem(n, i)` in §4.B.
    Mem(Atom, u32),
    At(Atom, Vec<Atom>),
    Assign(Ident, Atom),
    Cast(Atom, KTyp),
    CCode(String),
    Intrinsic(Intrinsic, Vec<Atom>),
    If(Atom, Box<KExpr>, Box<KExpr>),
    /// A let-normalized block: a prefix of statements followed by a tail
    /// expression whose value the block evaluates to.
    Block(Vec<KStmt>, Box<KExpr>),
    While(Box<KExpr>, Box<KExpr>),
    DoWhile(Box<KExpr>, Box<KExpr>),
    For(Vec<KClauseStage>, Box<KExpr>),
    Map(Vec<KClauseStage>, Box<KExpr>),
    Throw(Atom),
    /// `handler` receives the popped exception bound to `exn_id` and is the
    /// pattern compiler's output in catch-mode (§4.C "try/catch").
    Try { body: Box<KExpr>, exn_id: Ident, handler: Box<KExpr> },
}

/// A K-form expression: every node carries its type and source span, except
/// statements of type `void` per §3's structural invariant (those use
/// `KTyp::Void` rather than omitting the field, since the IR is uniform;
/// callers that care about the exception check `typ == KTyp::Void`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KExpr {
    pub kind: KExprKind,
    pub typ: KTyp,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KDefVal {
    pub id: Ident,
    pub typ: KTyp,
    pub value: KExpr,
    pub mutable: bool,
    /// Lifetime-bound to a single enclosing expression/statement rather
    /// than the block (§3 "Lifecycle & ownership").
    pub tempref: bool,
    /// Set when this binding is ever the base of an array-element
    /// assignment (§4.C "Assignment"); C-gen needs this to know the
    /// backing storage is mutated in place rather than rebound.
    pub subarray: bool,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KStmt {
    Val(KDefVal),
    Expr(KExpr),
}

/// Which free-variable closure artifacts a hoisted function needs, assigned
/// by lambda-lifting and the mangler (§3 "Every KDefFun records ... closure
/// info").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClosureInfo {
    pub free_var_struct: Option<Ident>,
    pub fp_typ: Option<Ident>,
    pub make_fp: Option<Ident>,
    pub wrap: Option<Ident>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KDefFun {
    pub id: Ident,
    pub args: Vec<(Ident, KTyp)>,
    pub ret_typ: KTyp,
    pub body: KExpr,
    pub flags: FunFlags,
    pub closure: ClosureInfo,
    pub span: Span,
}

/// A named type materialized by the mangler, or a direct `KTyp::Record`
/// alias, or a lowered single-case record-variant (§3, §4.C, §4.E).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KDefTyp {
    pub id: Ident,
    pub typ: KTyp,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KVariantCase {
    pub name: Ident,
    pub payload: Option<KTyp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KDefVariant {
    pub id: Ident,
    pub cases: Vec<KVariantCase>,
    pub recursive: bool,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KDefExn {
    pub id: Ident,
    pub payload: Option<KTyp>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KDef {
    Val(KDefVal),
    Fun(KDefFun),
    Typ(KDefTyp),
    Variant(KDefVariant),
    Exn(KDefExn),
}

impl KDef {
    pub fn id(&self) -> &Ident {
        match self {
            KDef::Val(d) => &d.id,
            KDef::Fun(d) => &d.id,
            KDef::Typ(d) => &d.id,
            KDef::Variant(d) => &d.id,
            KDef::Exn(d) => &d.id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KModule {
    pub name: Ident,
    pub defs: Vec<KDef>,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymId;

    #[test]
    fn kdef_id_covers_every_variant() {
        let span = Span::synthetic();
        let id = Ident::val("x", SymId::from_raw(0));
        let d = KDef::Exn(KDefExn { id: id.clone(), payload: None, span });
        assert_eq!(*d.id(), id);
    }

    #[test]
    fn atom_as_ident_is_none_for_literals() {
        assert!(Atom::Lit(Literal::Int(1)).as_ident().is_none());
    }
}
