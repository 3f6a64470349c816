//! `pat_simple_unpack` (§4.C "Value declarations").
//!
//! Lowers `val p = e` by requiring `p` to be irrefutable (refusing any
//! pattern that could fail to match) and emitting one `KDefVal` per
//! identifier `p` binds, each extracted from the normalized value of `e`.
//! If `p` binds nothing at all (`val _ = e`), `e` is kept for its side
//! effects but no binding is emitted.

use kc_core::ast::Pattern;
use kc_core::kform::{Atom, KDefVal, KExpr, KExprKind, KStmt};
use kc_core::ktyp::KTyp;
use kc_core::span::Span;
use kc_core::symbol::Ident;
use kc_core::{CompileError, Diagnostics};

/// Extracts a sub-value of `source` (already an atom) at the path implied
/// by recursing through `pattern`, emitting one `KStmt::Val` per bound
/// identifier into `out`.
pub fn pat_simple_unpack(
    pattern: &Pattern,
    typ: &KTyp,
    source: Atom,
    span: Span,
    out: &mut Vec<KStmt>,
    diags: &mut Diagnostics,
    fresh: &mut dyn FnMut(&str) -> Ident,
) -> Result<(), CompileError> {
    if !pattern.is_irrefutable() {
        diags.error(span, "refutable pattern in `val` declaration; use `match` instead");
        return Ok(());
    }
    unpack_rec(pattern, typ, source, span, out, fresh);
    Ok(())
}

fn unpack_rec(pattern: &Pattern, typ: &KTyp, source: Atom, span: Span, out: &mut Vec<KStmt>, fresh: &mut dyn FnMut(&str) -> Ident) {
    match pattern {
        Pattern::Any => {}
        Pattern::Ident(id) => {
            out.push(KStmt::Val(KDefVal {
                id: id.clone(),
                typ: typ.clone(),
                value: KExpr { kind: KExprKind::Atom(source), typ: typ.clone(), span },
                mutable: false,
                tempref: false,
                subarray: false,
                span,
            }));
        }
        Pattern::As(inner, id) => {
            out.push(KStmt::Val(KDefVal {
                id: id.clone(),
                typ: typ.clone(),
                value: KExpr { kind: KExprKind::Atom(source.clone()), typ: typ.clone(), span },
                mutable: false,
                tempref: false,
                subarray: false,
                span,
            }));
            unpack_rec(inner, typ, source, span, out, fresh);
        }
        Pattern::Typed(inner, typ2) => unpack_rec(inner, typ2, source, span, out, fresh),
        Pattern::Tuple(ps) => {
            for (i, p) in ps.iter().enumerate() {
                let field_typ = match typ {
                    KTyp::Tuple(ts) => ts.get(i).cloned().unwrap_or(KTyp::Err),
                    _ => KTyp::Err,
                };
                let field_id = fresh("t");
                out.push(KStmt::Val(KDefVal {
                    id: field_id.clone(),
                    typ: field_typ.clone(),
                    value: KExpr { kind: KExprKind::Mem(source.clone(), i as u32), typ: field_typ.clone(), span },
                    mutable: false,
                    tempref: true,
                    subarray: false,
                    span,
                }));
                unpack_rec(p, &field_typ, Atom::Id(field_id), span, out, fresh);
            }
        }
        Pattern::Record(_, fields) => {
            for (name, p) in fields {
                let field_typ = match typ {
                    KTyp::Record(rfs) => rfs.iter().find(|f| &f.name == name).map(|f| f.typ.clone()).unwrap_or(KTyp::Err),
                    _ => KTyp::Err,
                };
                let idx = match typ {
                    KTyp::Record(rfs) => rfs.iter().position(|f| &f.name == name).unwrap_or(0) as u32,
                    _ => 0,
                };
                let field_id = fresh(name);
                out.push(KStmt::Val(KDefVal {
                    id: field_id.clone(),
                    typ: field_typ.clone(),
                    value: KExpr { kind: KExprKind::Mem(source.clone(), idx), typ: field_typ.clone(), span },
                    mutable: false,
                    tempref: true,
                    subarray: false,
                    span,
                }));
                unpack_rec(p, &field_typ, Atom::Id(field_id), span, out, fresh);
            }
        }
        Pattern::Ref(inner) => {
            let deref_id = fresh("deref");
            out.push(KStmt::Val(KDefVal {
                id: deref_id.clone(),
                typ: typ.clone(),
                value: KExpr { kind: KExprKind::Unop(kc_core::ast::UnOp::Deref, source), typ: typ.clone(), span },
                mutable: false,
                tempref: true,
                subarray: false,
                span,
            }));
            unpack_rec(inner, typ, Atom::Id(deref_id), span, out, fresh);
        }
        // Irrefutable-only by construction (`Pattern::is_irrefutable` already
        // rejected everything else before this function is reached).
        Pattern::Lit(_) | Pattern::Variant(..) | Pattern::Cons(..) | Pattern::When(..) => {}
    }
}
