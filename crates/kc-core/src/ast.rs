//! The type-checked input AST (§3 "AST (input)", §6 "Input AST contract").
//!
//! Every identifier has already been resolved to a unique id, every
//! subexpression carries a non-placeholder type and a source span, and
//! generic definitions carry their concrete instantiations — none of that
//! is enforced here (this crate doesn't own the type checker), it's a
//! precondition the driver assumes of anything handed to `compile_modules`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ktyp::KTyp;
use crate::span::Span;
use crate::symbol::Ident;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Cons,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    Deref,
    /// `.-`: reverse index, meaningful only as an index-expression operand;
    /// the K-normalizer rewrites it against the enclosing array/axis (§4.C).
    RevIndex,
}

/// One argument to a call: positional, or `name: value` keyword form. A
/// call with trailing keyword args against a `has_keywords` function is
/// reordered to positional form during K-normalization (§4.C).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordFieldInit {
    pub name: String,
    pub value: Expr,
}

/// One `pattern <- iter [@ at] [when guard]` clause of a `for`/`map`
/// comprehension. A comprehension carries a list of these clause-stages in
/// source nesting order (§3, §4.C).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForClause {
    pub pattern: Pattern,
    pub iter: Expr,
    pub at_index: Option<AtIndex>,
    pub when: Option<Expr>,
    pub span: Span,
}

/// The `@`-index binder on a `for`/`map` clause (§4.C: "PatAny -> none;
/// typed int ident -> single bound index; typed tuple of int idents -> one
/// fresh index per axis").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AtIndex {
    Single(Ident),
    Multi(Vec<Ident>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

/// Patterns: any/ident/literal/as/tuple/record/variant/cons/ref/typed/when (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Pattern {
    Any,
    Ident(Ident),
    Lit(Literal),
    As(Box<Pattern>, Ident),
    Tuple(Vec<Pattern>),
    /// `name?` is `Some(case/record name)` when matching a named record or
    /// a case of a multi-case variant; `None` for an anonymous record
    /// pattern, which the pattern compiler treats identically to the
    /// `Variant` form once the case is resolved (§8 "Boundary behaviors").
    Record(Option<Ident>, Vec<(String, Pattern)>),
    Variant(Ident, Vec<Pattern>),
    Cons(Box<Pattern>, Box<Pattern>),
    Ref(Box<Pattern>),
    Typed(Box<Pattern>, KTyp),
    When(Box<Pattern>, Box<Expr>),
}

impl Pattern {
    /// True for patterns that can never fail to match on their own (ignoring
    /// a `When` guard, which always can). Used by K-normalization's
    /// `pat_simple_unpack` (§4.C) to reject refutable patterns in `val`.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pattern::Any | Pattern::Ident(_) => true,
            Pattern::As(p, _) | Pattern::Ref(p) | Pattern::Typed(p, _) => p.is_irrefutable(),
            Pattern::Tuple(ps) => ps.iter().all(Pattern::is_irrefutable),
            Pattern::Record(case, fields) => case.is_none() && fields.iter().all(|(_, p)| p.is_irrefutable()),
            Pattern::Lit(_) | Pattern::Variant(..) | Pattern::Cons(..) | Pattern::When(..) => false,
        }
    }

    /// Identifiers this pattern binds, in left-to-right order. Used both by
    /// `pat_simple_unpack` and by `free_vars`'s binder accounting (§4.A).
    pub fn bound_idents(&self, out: &mut Vec<Ident>) {
        match self {
            Pattern::Any | Pattern::Lit(_) => {}
            Pattern::Ident(id) => out.push(id.clone()),
            Pattern::As(p, id) => {
                p.bound_idents(out);
                out.push(id.clone());
            }
            Pattern::Tuple(ps) | Pattern::Variant(_, ps) => {
                for p in ps {
                    p.bound_idents(out);
                }
            }
            Pattern::Record(_, fields) => {
                for (_, p) in fields {
                    p.bound_idents(out);
                }
            }
            Pattern::Cons(h, t) => {
                h.bound_idents(out);
                t.bound_idents(out);
            }
            Pattern::Ref(p) | Pattern::Typed(p, _) | Pattern::When(p, _) => p.bound_idents(out),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExprKind {
    Lit(Literal),
    Ident(Ident),
    Binop(BinOp, Box<Expr>, Box<Expr>),
    Unop(UnOp, Box<Expr>),
    Seq(Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Option<Box<Expr>>),
    Call(Box<Expr>, Vec<Arg>),
    Tuple(Vec<Expr>),
    /// A record literal, or (if `case` is set) a variant-case constructor
    /// application written in record syntax. §4.C: "requires a constructor
    /// id if the record is a variant case; otherwise emits `KExpMkRecord`."
    Record { case: Option<Ident>, fields: Vec<RecordFieldInit> },
    /// Functional record update: `{ base with f1 = e1, ... }`.
    RecordUpdate { base: Box<Expr>, fields: Vec<RecordFieldInit> },
    Array(Vec<Expr>),
    /// `start:end[:step]`, any endpoint may be open.
    Range { start: Option<Box<Expr>>, end: Option<Box<Expr>>, step: Option<Box<Expr>> },
    For(Vec<ForClause>, Box<Expr>),
    While(Box<Expr>, Box<Expr>),
    DoWhile(Box<Expr>, Box<Expr>),
    /// List/array comprehension (§3, §4.C "for/map clauses").
    Map(Vec<ForClause>, Box<Expr>),
    Match(Box<Expr>, Vec<MatchCase>),
    Try(Box<Expr>, Vec<MatchCase>),
    Throw(Box<Expr>),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Vec<Expr>),
    Assign(Box<Expr>, Box<Expr>),
    Cast(Box<Expr>, KTyp),
    /// Source-level type annotation; load-bearing only for the type
    /// checker, carried through so diagnostics can point at it.
    Typed(Box<Expr>, KTyp),
    CCode(String),
}

/// An AST expression: every node carries its checked type and source span
/// (§3: "Input expressions carry a type and a source location").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub typ: KTyp,
    pub span: Span,
}

bitflags! {
    /// Function attributes carried from source annotations through to
    /// `KDefFun` (§3: "flags (ccode, pure, ctor, nothrow, private,
    /// has_keywords)").
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FunFlags: u16 {
        /// Body is inline C code (`CCode`), not a K-form expression.
        const CCODE       = 0b0000_0001;
        const PURE        = 0b0000_0010;
        /// A variant-case or record constructor function synthesized by
        /// K-normalization, not written by the user.
        const CTOR        = 0b0000_0100;
        const NOTHROW     = 0b0000_1000;
        const PRIVATE     = 0b0001_0000;
        /// Last positional parameter accepts a record literal whose fields
        /// are spread as trailing keyword arguments (§4.C).
        const HAS_KEYWORDS = 0b0010_0000;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunArg {
    pub name: Ident,
    pub typ: KTyp,
    pub default: Option<Expr>,
}

/// A concrete instantiation of a generic function or type, already resolved
/// by the type checker (§6: "templates already instantiated").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    pub type_args: Vec<KTyp>,
    pub mangled_name: Option<Ident>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefVal {
    pub pattern: Pattern,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefFun {
    pub name: Ident,
    pub template_args: Vec<String>,
    pub instances: Vec<Instance>,
    pub args: Vec<FunArg>,
    pub ret_typ: KTyp,
    pub body: Expr,
    pub flags: FunFlags,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefTypeAlias {
    pub name: Ident,
    pub template_args: Vec<String>,
    pub typ: KTyp,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariantCase {
    pub name: Ident,
    pub payload: Option<KTyp>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefVariant {
    pub name: Ident,
    pub template_args: Vec<String>,
    pub cases: Vec<VariantCase>,
    pub recursive: bool,
    /// A single-case variant declared in record syntax; lowered directly to
    /// a `KDefTyp` with a record body rather than a `KDefVariant` (§4.C).
    pub is_record_variant: bool,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefExn {
    pub name: Ident,
    pub payload: Option<KTyp>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportDirective {
    pub module: Ident,
    pub alias: Option<Ident>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PragmaDirective {
    pub name: String,
    pub args: Vec<String>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TopDef {
    Value(DefVal),
    Function(DefFun),
    TypeAlias(DefTypeAlias),
    Variant(DefVariant),
    Exception(DefExn),
    Import(ImportDirective),
    Pragma(PragmaDirective),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    pub name: Ident,
    pub defs: Vec<TopDef>,
    pub span: Span,
}

impl Module {
    /// Module names this module imports, in declaration order — the edges
    /// `compile_modules` topologically sorts on (§4.I, §5).
    pub fn import_names(&self) -> impl Iterator<Item = &Ident> {
        self.defs.iter().filter_map(|def| match def {
            TopDef::Import(imp) => Some(&imp.module),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymId;

    #[test]
    fn tuple_pattern_irrefutable_iff_all_parts_are() {
        let p = Pattern::Tuple(vec![Pattern::Ident(Ident::val("x", SymId::from_raw(0))), Pattern::Any]);
        assert!(p.is_irrefutable());
        let q = Pattern::Tuple(vec![Pattern::Lit(Literal::Int(0)), Pattern::Any]);
        assert!(!q.is_irrefutable());
    }

    #[test]
    fn bound_idents_collects_left_to_right() {
        let k0 = SymId::from_raw(0);
        let k1 = SymId::from_raw(1);
        let p = Pattern::As(
            Box::new(Pattern::Tuple(vec![Pattern::Ident(Ident::val("a", k0)), Pattern::Ident(Ident::val("b", k1))])),
            Ident::val("whole", SymId::from_raw(2)),
        );
        let mut out = Vec::new();
        p.bound_idents(&mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].prefix(), "whole");
    }

    #[test]
    fn module_import_names_skip_other_defs() {
        let m = Module {
            name: Ident::val("Main", SymId::from_raw(0)),
            defs: vec![
                TopDef::Import(ImportDirective { module: Ident::val("Std", SymId::from_raw(1)), alias: None, span: Span::synthetic() }),
                TopDef::Pragma(PragmaDirective { name: "cpp".into(), args: vec![], span: Span::synthetic() }),
            ],
            span: Span::synthetic(),
        };
        let names: Vec<_> = m.import_names().collect();
        assert_eq!(names.len(), 1);
    }
}
