//! C-form: the statement-oriented output representation (§3 "C-form",
//! §4.F, §6 "Output C-form contract").
//!
//! This module only models the *data* — expressions, statements, type
//! declarations and their properties. Deciding how to fill it in (layout,
//! destructors, enum numbering, dead-type elimination) lives in
//! `kc-compiler`'s `ctypegen`; turning it into text is `kc-compiler`'s
//! `codegen::stub`, which is explicitly not a real code generator (§4.G, §4.H).

use serde::{Deserialize, Serialize};

use crate::ast::{BinOp, Literal, UnOp};
use crate::span::Span;
use crate::symbol::Ident;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CPrimTyp {
    Void,
    Bool,
    Char,
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
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CField {
    pub name: String,
    pub typ: CTyp,
}

/// Every C type is one of these shapes (§3). `Struct`/`Union` carry their
/// field list inline (used both for a named type's body and for the rare
/// anonymous closure-environment struct); `Name` is the opaque reference
/// form most code actually uses once a type has a `CDefTyp` entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CTyp {
    Prim(CPrimTyp),
    Struct(Vec<CField>),
    Union(Vec<CField>),
    RawPtr(Box<CTyp>),
    RawArray(Box<CTyp>, u32),
    /// The generic runtime `fx_arr_t` header (§4.E: "Arrays remain
    /// unnamed"); the element type is carried for documentation only.
    Array(Box<CTyp>),
    FunRawPtr(Box<CTyp>, Vec<CTyp>),
    Name(Ident),
}

impl CTyp {
    pub fn is_ptr_shaped(&self) -> bool {
        matches!(self, CTyp::RawPtr(_) | CTyp::Array(_) | CTyp::FunRawPtr(..))
    }
}

/// Per-named-type properties the C-form type generator computes from the
/// type's shape (§4.F's table).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TypProps {
    pub scalar: bool,
    /// Needs a destructor.
    pub complex: bool,
    /// Pointer-sized, heap-allocated.
    pub ptr: bool,
    pub pass_by_ref: bool,
    pub free_macro: Option<String>,
    pub free_fn: Option<Ident>,
    pub copy_macro: Option<String>,
    pub copy_fn: Option<Ident>,
    /// Whether a generated copy needs the function form rather than the
    /// macro form — set when the type has custom copy semantics beyond a
    /// flat memcpy (§4.F: "the macro is preferred for ptr-typed and
    /// primitive elements, the function for complex elements").
    pub custom_copy: bool,
    /// Ids of `_fx_make_<name>` constructor functions generated for this
    /// type (tuples, records, lists, refs, recursive variants; §4.F).
    pub ctors: Vec<Ident>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CDefTyp {
    pub id: Ident,
    pub body: CTyp,
    pub props: TypProps,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CEnumMember {
    pub name: Ident,
    pub value: i32,
}

/// The companion enum generated per variant (§4.F "Enum generation").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CDefEnum {
    pub id: Ident,
    pub members: Vec<CEnumMember>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CExprKind {
    Ident(Ident),
    Lit(Literal),
    Binary(BinOp, Box<CExpr>, Box<CExpr>),
    Unary(UnOp, Box<CExpr>),
    /// `a.b`
    Mem(Box<CExpr>, String),
    /// `a->b`
    Arrow(Box<CExpr>, String),
    Cast(CTyp, Box<CExpr>),
    Ternary(Box<CExpr>, Box<CExpr>, Box<CExpr>),
    Call(Box<CExpr>, Vec<CExpr>),
    /// Brace-initializer aggregate literal, `{ ... }`.
    Init(Vec<CExpr>),
    CCode(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CExpr {
    pub kind: CExprKind,
    pub typ: CTyp,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CSwitchCase {
    pub values: Vec<i64>,
    pub body: Vec<CStmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CForwardKind {
    Struct,
    Union,
    Fun,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CDefFun {
    pub id: Ident,
    pub args: Vec<(Ident, CTyp)>,
    pub ret_typ: CTyp,
    pub body: Vec<CStmt>,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CStmt {
    Block(Vec<CStmt>),
    If(CExpr, Box<CStmt>, Option<Box<CStmt>>),
    For { init: Option<Box<CStmt>>, cond: Option<CExpr>, step: Option<CExpr>, body: Box<CStmt> },
    While(CExpr, Box<CStmt>),
    DoWhile(Box<CStmt>, CExpr),
    Switch { scrutinee: CExpr, cases: Vec<CSwitchCase>, default: Option<Vec<CStmt>> },
    Return(Option<CExpr>),
    Goto(String),
    Label(String),
    ValDecl { name: Ident, typ: CTyp, init: Option<CExpr> },
    FunDef(CDefFun),
    TypDef(CDefTyp),
    EnumDef(CDefEnum),
    /// A generated type-utility function body (destructor/copy/constructor,
    /// §4.F) expressed as a named C function rather than a macro.
    TypeUtilFun(CDefFun),
    ForwardDecl { id: Ident, kind: CForwardKind, span: Span },
    Include(String),
    Pragma(String),
    Expr(CExpr),
}

/// §6's `pragmas` record: `cpp` forces C++ compilation, `clibs` lists
/// required `-l` link names.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pragmas {
    pub cpp: bool,
    pub clibs: Vec<String>,
}

/// One module's C-form output: the ordered statement groups §6 specifies
/// (forward declarations, then type declarations, then type utility
/// functions, then value/function definitions), plus `pragmas` and whether
/// this module is the entrypoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CModule {
    pub name: Option<Ident>,
    pub forward_decls: Vec<CStmt>,
    pub type_decls: Vec<CStmt>,
    pub type_utils: Vec<CStmt>,
    pub defs: Vec<CStmt>,
    pub pragmas: Pragmas,
    pub main: bool,
}

impl CModule {
    pub fn new(name: Ident) -> Self {
        Self { name: Some(name), ..Default::default() }
    }

    /// The full statement list in the order §6 fixes, exactly what the stub
    /// consumer (§4.H) walks.
    pub fn all_statements(&self) -> impl Iterator<Item = &CStmt> {
        self.forward_decls.iter().chain(&self.type_decls).chain(&self.type_utils).chain(&self.defs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymId;

    #[test]
    fn all_statements_preserves_group_order() {
        let mut m = CModule::new(Ident::val("Main", SymId::from_raw(0)));
        m.forward_decls.push(CStmt::Include("fx.h".into()));
        m.defs.push(CStmt::Pragma("once".into()));
        let kinds: Vec<_> = m.all_statements().collect();
        assert!(matches!(kinds[0], CStmt::Include(_)));
        assert!(matches!(kinds[1], CStmt::Pragma(_)));
    }
}
