//! C-form type generator (§4.F).
//!
//! Turns every K-form type reachable from a module's defs into a `CDefTyp`
//! with computed `TypProps`, synthesizes the destructor/copy/constructor
//! functions complex types need, numbers each variant's companion enum, and
//! finally drops whatever the module's statements don't actually reference
//! (bounded fixpoint dead-type elimination, mirroring the reachability BFS
//! the pattern compiler's sibling passes already use elsewhere in this
//! crate).

use std::collections::{HashMap, HashSet, VecDeque};

use kc_core::ast::Literal;
use kc_core::cform::{
    CDefEnum, CDefFun, CDefTyp, CEnumMember, CExpr, CExprKind, CField, CForwardKind, CModule, CPrimTyp, CStmt, CTyp, Pragmas, TypProps,
};
use kc_core::kform::{KDef, KDefFun, KModule, KVariantCase};
use kc_core::ktyp::KTyp;
use kc_core::span::Span;
use kc_core::symbol::{Ident, SymId};

use crate::runtime_abi;

const FIXPOINT_BOUND: usize = 100;

pub struct CTypeGen {
    /// Every def id this module defines, by its raw integer — lets a
    /// `KTyp::Name`/`KTyp::Variant` reference resolve back to the `Ident`
    /// (with its descriptive prefix) that named it.
    id_map: HashMap<u32, Ident>,
    props: HashMap<u32, TypProps>,
    next_exn_tag: i32,
}

impl CTypeGen {
    pub fn new() -> Self {
        Self { id_map: HashMap::new(), props: HashMap::new(), next_exn_tag: -1024 }
    }

    pub fn generate(mut self, module: &KModule) -> CModule {
        self.id_map = module.defs.iter().map(|d| (d.id().as_u32(), d.id().clone())).collect();

        let mut out = CModule::new(module.name.clone());
        out.pragmas = Pragmas::default();

        for def in &module.defs {
            match def {
                KDef::Typ(t) => self.emit_named_typ(t.id.clone(), &t.typ, t.span, &mut out),
                KDef::Variant(v) => self.emit_variant(v.id.clone(), &v.cases, v.recursive, v.span, &mut out),
                KDef::Exn(e) => self.emit_exception(e.id.clone(), e.payload.as_ref(), e.span, &mut out),
                _ => {}
            }
        }
        for def in &module.defs {
            if let KDef::Fun(f) = def {
                out.defs.push(CStmt::FunDef(self.fun_shell(f)));
            } else if let KDef::Val(v) = def {
                out.defs.push(CStmt::ValDecl { name: v.id.clone(), typ: self.ctyp_of(&v.typ), init: None });
            }
        }

        eliminate_dead_types(&mut out);
        out
    }

    fn resolve(&self, id: SymId) -> Ident {
        self.id_map.get(&id.as_u32()).cloned().unwrap_or(Ident::NONE)
    }

    /// Structural conversion only — no prop computation, used for
    /// non-defining occurrences (function signatures, value decls).
    fn ctyp_of(&self, t: &KTyp) -> CTyp {
        match t {
            KTyp::Void => CTyp::Prim(CPrimTyp::Void),
            KTyp::Bool => CTyp::Prim(CPrimTyp::Bool),
            KTyp::Int => CTyp::Prim(CPrimTyp::Int),
            KTyp::Int8 => CTyp::Prim(CPrimTyp::Int8),
            KTyp::Int16 => CTyp::Prim(CPrimTyp::Int16),
            KTyp::Int32 => CTyp::Prim(CPrimTyp::Int32),
            KTyp::Int64 => CTyp::Prim(CPrimTyp::Int64),
            KTyp::UInt8 => CTyp::Prim(CPrimTyp::UInt8),
            KTyp::UInt16 => CTyp::Prim(CPrimTyp::UInt16),
            KTyp::UInt32 => CTyp::Prim(CPrimTyp::UInt32),
            KTyp::UInt64 => CTyp::Prim(CPrimTyp::UInt64),
            KTyp::Float16 => CTyp::Prim(CPrimTyp::Float16),
            KTyp::Float32 => CTyp::Prim(CPrimTyp::Float32),
            KTyp::Float64 => CTyp::Prim(CPrimTyp::Float64),
            KTyp::Char => CTyp::Prim(CPrimTyp::Char),
            KTyp::String => CTyp::Name(Ident::val(runtime_abi::FX_STR_T, SymId::from_raw(0))),
            KTyp::CPtr => CTyp::RawPtr(Box::new(CTyp::Prim(CPrimTyp::Void))),
            KTyp::Exn => CTyp::Name(Ident::val(runtime_abi::FX_EXN_T, SymId::from_raw(0))),
            KTyp::Array(elt, _) => CTyp::Array(Box::new(self.ctyp_of(elt))),
            KTyp::Tuple(_) | KTyp::Record(_) | KTyp::List(_) | KTyp::Ref(_) | KTyp::Fun(..) => {
                // Anonymous occurrences of these shapes should already have
                // been rewritten to `Name` by the mangler; if one slips
                // through (a hand-built fixture, say), fall back to a
                // direct struct body instead of a named reference.
                self.shape_to_ctyp(t)
            }
            KTyp::Variant(id) | KTyp::Name(id) => CTyp::Name(self.resolve(*id)),
            KTyp::Err => CTyp::Prim(CPrimTyp::Void),
        }
    }

    fn shape_to_ctyp(&self, t: &KTyp) -> CTyp {
        match t {
            KTyp::Tuple(ts) => CTyp::Struct(ts.iter().enumerate().map(|(i, ft)| CField { name: format!("t{i}"), typ: self.ctyp_of(ft) }).collect()),
            KTyp::Record(fs) => CTyp::Struct(fs.iter().map(|f| CField { name: f.name.clone(), typ: self.ctyp_of(&f.typ) }).collect()),
            KTyp::List(elt) => {
                CTyp::RawPtr(Box::new(CTyp::Struct(vec![
                    CField { name: "rc".into(), typ: CTyp::Prim(CPrimTyp::Int) },
                    CField { name: "tl".into(), typ: CTyp::RawPtr(Box::new(CTyp::Prim(CPrimTyp::Void))) },
                    CField { name: "hd".into(), typ: self.ctyp_of(elt) },
                ])))
            }
            KTyp::Ref(elt) => CTyp::RawPtr(Box::new(CTyp::Struct(vec![
                CField { name: "rc".into(), typ: CTyp::Prim(CPrimTyp::Int) },
                CField { name: "data".into(), typ: self.ctyp_of(elt) },
            ]))),
            KTyp::Fun(ret, args) => CTyp::Struct(vec![
                CField { name: "fp".into(), typ: CTyp::FunRawPtr(Box::new(self.ctyp_of(ret)), args.iter().map(|a| self.ctyp_of(a)).collect()) },
                CField { name: "fcv".into(), typ: CTyp::RawPtr(Box::new(CTyp::Prim(CPrimTyp::Void))) },
            ]),
            _ => self.ctyp_of(t),
        }
    }

    fn is_complex(&self, t: &KTyp) -> bool {
        match t {
            KTyp::Tuple(ts) => ts.iter().any(|x| self.is_complex(x)),
            KTyp::Record(fs) => fs.iter().any(|f| self.is_complex(&f.typ)),
            KTyp::List(_) | KTyp::Ref(_) | KTyp::Fun(..) | KTyp::Array(..) | KTyp::String | KTyp::Exn | KTyp::CPtr => true,
            KTyp::Name(id) | KTyp::Variant(id) => self.props.get(&id.as_u32()).map(|p| p.complex).unwrap_or(true),
            _ => false,
        }
    }

    fn emit_named_typ(&mut self, id: Ident, typ: &KTyp, span: Span, out: &mut CModule) {
        let body = self.shape_to_ctyp(typ);
        let complex = self.is_complex(typ);
        let ptr = matches!(typ, KTyp::List(_) | KTyp::Ref(_));
        let mut props = TypProps {
            scalar: typ.is_scalar(),
            complex,
            ptr,
            pass_by_ref: complex && !ptr,
            free_macro: (!complex).then(|| runtime_abi::FX_NOP.to_string()),
            free_fn: None,
            copy_macro: (!complex).then(|| runtime_abi::FX_COPY_SIMPLE.to_string()),
            copy_fn: None,
            custom_copy: complex,
            ctors: vec![],
        };

        if complex {
            let free_fn = synth_ident(&runtime_abi::free_fn_name(""), &id);
            out.type_utils.push(CStmt::TypeUtilFun(free_destructor(&free_fn, &id, &body)));
            props.free_fn = Some(free_fn);

            if matches!(typ, KTyp::Tuple(_) | KTyp::Record(_) | KTyp::List(_) | KTyp::Ref(_)) {
                let copy_fn = synth_ident(&runtime_abi::copy_fn_name(""), &id);
                out.type_utils.push(CStmt::TypeUtilFun(copy_function(&copy_fn, &id)));
                props.copy_fn = Some(copy_fn);

                let make_fn = synth_ident(&runtime_abi::make_fn_name(""), &id);
                out.type_utils.push(CStmt::TypeUtilFun(make_constructor(&make_fn, &id, &body)));
                props.ctors.push(make_fn);
            }
        }

        self.props.insert(id.as_u32(), props.clone());
        out.type_decls.push(CStmt::TypDef(CDefTyp { id, body, props, span }));
    }

    fn emit_variant(&mut self, id: Ident, cases: &[KVariantCase], recursive: bool, span: Span, out: &mut CModule) {
        let nullable = cases.len() == 2 && cases.iter().any(|c| c.payload.is_none());
        let tag_base = if nullable { 0 } else { 1 };
        let members = cases
            .iter()
            .enumerate()
            .map(|(i, c)| CEnumMember { name: synth_ident(&format!("{}_", id.prefix()), &c.name), value: tag_base + i as i32 })
            .collect();
        let tag_typ_id = Ident::val(format!("{}_tag_t", id.prefix()), id.id().unwrap_or(SymId::from_raw(0)));
        out.type_decls.push(CStmt::EnumDef(CDefEnum { id: tag_typ_id, members, span }));

        let union_fields = cases
            .iter()
            .filter_map(|c| c.payload.as_ref().map(|p| CField { name: format!("case_{}", c.name.prefix()), typ: self.ctyp_of(p) }))
            .collect::<Vec<_>>();
        let has_tag = cases.len() > 1;
        let mut fields = vec![];
        if has_tag {
            fields.push(CField { name: "tag".into(), typ: CTyp::Prim(CPrimTyp::Int32) });
        }
        if !union_fields.is_empty() {
            fields.push(CField { name: "u".into(), typ: CTyp::Union(union_fields) });
        }
        let inline_body = CTyp::Struct(fields);

        let complex = cases.iter().any(|c| c.payload.as_ref().is_some_and(|p| self.is_complex(p)));

        if recursive {
            out.forward_decls.push(CStmt::ForwardDecl { id: id.clone(), kind: CForwardKind::Struct, span });
            let free_fn = synth_ident(&runtime_abi::free_fn_name(""), &id);
            out.forward_decls.push(CStmt::ForwardDecl { id: free_fn.clone(), kind: CForwardKind::Fun, span });

            let body = CTyp::RawPtr(Box::new(CTyp::Struct({
                let mut fs = vec![CField { name: "rc".into(), typ: CTyp::Prim(CPrimTyp::Int) }];
                fs.extend(if let CTyp::Struct(fs2) = inline_body { fs2 } else { vec![] });
                fs
            })));
            let props = TypProps {
                scalar: false,
                complex: true,
                ptr: true,
                pass_by_ref: false,
                free_macro: None,
                free_fn: Some(free_fn.clone()),
                copy_macro: Some(runtime_abi::FX_INCREF.to_string()),
                copy_fn: None,
                custom_copy: false,
                ctors: vec![synth_ident(&runtime_abi::make_fn_name(""), &id)],
            };
            out.type_utils.push(CStmt::TypeUtilFun(rc_destructor(&free_fn, &id)));
            out.type_utils.push(CStmt::TypeUtilFun(make_constructor(&props.ctors[0].clone(), &id, &body)));
            self.props.insert(id.as_u32(), props.clone());
            out.type_decls.push(CStmt::TypDef(CDefTyp { id, body, props, span }));
        } else {
            let props = TypProps {
                scalar: false,
                complex,
                ptr: false,
                pass_by_ref: complex,
                free_macro: (!complex).then(|| runtime_abi::FX_NOP.to_string()),
                free_fn: complex.then(|| synth_ident(&runtime_abi::free_fn_name(""), &id)),
                copy_macro: (!complex).then(|| runtime_abi::FX_COPY_SIMPLE.to_string()),
                copy_fn: None,
                custom_copy: complex,
                ctors: vec![],
            };
            if let Some(free_fn) = &props.free_fn {
                out.type_utils.push(CStmt::TypeUtilFun(free_destructor(free_fn, &id, &inline_body)));
            }
            self.props.insert(id.as_u32(), props.clone());
            out.type_decls.push(CStmt::TypDef(CDefTyp { id, body: inline_body, props, span }));
        }
    }

    fn emit_exception(&mut self, id: Ident, payload: Option<&KTyp>, span: Span, out: &mut CModule) {
        let tag = self.next_exn_tag;
        self.next_exn_tag -= 1;
        out.type_decls.push(CStmt::EnumDef(CDefEnum {
            id: Ident::val(format!("{}_tag", id.prefix()), id.id().unwrap_or(SymId::from_raw(0))),
            members: vec![CEnumMember { name: id.clone(), value: tag }],
            span,
        }));
        let body_typ = payload.map(|p| self.ctyp_of(p));
        let props = TypProps { scalar: false, complex: true, ptr: false, pass_by_ref: true, custom_copy: true, ..Default::default() };
        let fields = body_typ.into_iter().map(|t| CField { name: "payload".into(), typ: t }).collect();
        self.props.insert(id.as_u32(), props.clone());
        out.type_decls.push(CStmt::TypDef(CDefTyp { id, body: CTyp::Struct(fields), props, span }));
    }

    fn fun_shell(&self, f: &KDefFun) -> CDefFun {
        CDefFun {
            id: f.id.clone(),
            args: f.args.iter().map(|(id, t)| (id.clone(), self.ctyp_of(t))).collect(),
            ret_typ: self.ctyp_of(&f.ret_typ),
            body: vec![],
            span: f.span,
        }
    }
}

impl Default for CTypeGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a satellite C identifier (destructor/copy/constructor/enum name)
/// for a K-form def, reusing `base`'s own id rather than allocating a fresh
/// one — there is no counter here that could keep such an id distinct from
/// a next materialized type's id, and reuse is harmless since these names
/// never collide textually and `Ident` equality never looks at the prefix.
fn synth_ident(prefix: &str, base: &Ident) -> Ident {
    Ident::val(format!("{prefix}{}", base.prefix()), base.id().unwrap_or(SymId::from_raw(0)))
}

fn ccode_call(name: &str, args: Vec<CExpr>, span: Span) -> CStmt {
    CStmt::Expr(CExpr { kind: CExprKind::Call(Box::new(CExpr { kind: CExprKind::CCode(name.to_string()), typ: CTyp::Prim(CPrimTyp::Void), span }), args), typ: CTyp::Prim(CPrimTyp::Void), span })
}

/// A destructor body: for a struct/union shape, free every field whose type
/// is itself complex; for a pointer shape, decrement refcount (§4.F "the
/// macro is preferred for ptr-typed and primitive elements, the function
/// for complex elements").
fn free_destructor(free_fn: &Ident, typ_id: &Ident, body: &CTyp) -> CDefFun {
    let span = Span::synthetic();
    let dst = Ident::val("dst", SymId::from_raw(0));
    let stmts = match body {
        CTyp::Struct(fields) | CTyp::Union(fields) => fields
            .iter()
            .map(|f| {
                ccode_call(
                    runtime_abi::FX_FREE_FIELD,
                    vec![CExpr { kind: CExprKind::Arrow(Box::new(CExpr { kind: CExprKind::Ident(dst.clone()), typ: CTyp::Name(typ_id.clone()), span }), f.name.clone()), typ: f.typ.clone(), span }],
                    span,
                )
            })
            .collect(),
        _ => vec![ccode_call(runtime_abi::FX_DECREF, vec![CExpr { kind: CExprKind::Ident(dst.clone()), typ: CTyp::Name(typ_id.clone()), span }], span)],
    };
    CDefFun { id: free_fn.clone(), args: vec![(dst, CTyp::RawPtr(Box::new(CTyp::Name(typ_id.clone()))))], ret_typ: CTyp::Prim(CPrimTyp::Void), body: stmts, span }
}

/// A recursive variant's destructor: decrement rc; free the payload (by
/// tag) and release the block only if this was the last reference (§4.F
/// "Recursive variants").
fn rc_destructor(free_fn: &Ident, typ_id: &Ident) -> CDefFun {
    let span = Span::synthetic();
    let dst = Ident::val("dst", SymId::from_raw(0));
    let dst_expr = CExpr { kind: CExprKind::Ident(dst.clone()), typ: CTyp::Name(typ_id.clone()), span };
    let rc_field = CExpr { kind: CExprKind::Arrow(Box::new(dst_expr.clone()), "rc".into()), typ: CTyp::Prim(CPrimTyp::Int), span };
    let body = vec![
        CStmt::If(
            CExpr {
                kind: CExprKind::Binary(kc_core::ast::BinOp::Le, Box::new(rc_field.clone()), Box::new(CExpr { kind: CExprKind::Lit(Literal::Int(1)), typ: CTyp::Prim(CPrimTyp::Int), span })),
                typ: CTyp::Prim(CPrimTyp::Bool),
                span,
            },
            Box::new(CStmt::Block(vec![
                ccode_call(runtime_abi::FX_FREE_VARIANT_PAYLOAD, vec![dst_expr.clone()], span),
                ccode_call(runtime_abi::FX_FREE, vec![dst_expr.clone()], span),
            ])),
            Some(Box::new(CStmt::Block(vec![ccode_call(runtime_abi::FX_DECREF, vec![dst_expr], span)]))),
        ),
    ];
    CDefFun { id: free_fn.clone(), args: vec![(dst, CTyp::RawPtr(Box::new(CTyp::Name(typ_id.clone()))))], ret_typ: CTyp::Prim(CPrimTyp::Void), body, span }
}

fn copy_function(copy_fn: &Ident, typ_id: &Ident) -> CDefFun {
    let span = Span::synthetic();
    let src = Ident::val("src", SymId::from_raw(0));
    let dst = Ident::val("dst", SymId::from_raw(1));
    let body = vec![ccode_call(
        runtime_abi::FX_COPY_FIELDS,
        vec![
            CExpr { kind: CExprKind::Ident(src.clone()), typ: CTyp::Name(typ_id.clone()), span },
            CExpr { kind: CExprKind::Ident(dst.clone()), typ: CTyp::Name(typ_id.clone()), span },
        ],
        span,
    )];
    CDefFun {
        id: copy_fn.clone(),
        args: vec![(src, CTyp::RawPtr(Box::new(CTyp::Name(typ_id.clone())))), (dst, CTyp::RawPtr(Box::new(CTyp::Name(typ_id.clone()))))],
        ret_typ: CTyp::Prim(CPrimTyp::Void),
        body,
        span,
    }
}

fn make_constructor(make_fn: &Ident, typ_id: &Ident, body_typ: &CTyp) -> CDefFun {
    let span = Span::synthetic();
    let result = Ident::val("result", SymId::from_raw(0));
    // Heap-allocated shapes (list cells, refs, recursive variants) wrap
    // their field struct in one `RawPtr` layer; unwrap it to find the
    // fields the constructor actually takes.
    let struct_fields = match body_typ {
        CTyp::Struct(fields) => Some(fields),
        CTyp::RawPtr(inner) => match inner.as_ref() {
            CTyp::Struct(fields) => Some(fields),
            _ => None,
        },
        _ => None,
    };
    let args = match struct_fields {
        Some(fields) => fields
            .iter()
            .filter(|f| f.name != "rc")
            .enumerate()
            .map(|(i, f)| (Ident::val(format!("arg{i}"), SymId::from_raw((i + 1) as u32)), f.typ.clone()))
            .collect(),
        None => vec![],
    };
    let body = vec![
        ccode_call(runtime_abi::FX_FILL_FIELDS, vec![CExpr { kind: CExprKind::Ident(result.clone()), typ: CTyp::Name(typ_id.clone()), span }], span),
        CStmt::Return(Some(CExpr { kind: CExprKind::Lit(Literal::Int(0)), typ: CTyp::Prim(CPrimTyp::Int), span })),
    ];
    let mut all_args = args;
    all_args.push((result, CTyp::RawPtr(Box::new(CTyp::Name(typ_id.clone())))));
    CDefFun { id: make_fn.clone(), args: all_args, ret_typ: CTyp::Prim(CPrimTyp::Int), body, span }
}

/// Bounded-fixpoint dead-type elimination (§4.F): compute the set of type
/// ids reachable from `defs`, then drop any `type_decls`/`type_utils`/
/// `forward_decls` entry not in that closure, repeating until nothing more
/// is dropped (a struct referencing a now-dropped type could itself become
/// droppable next round).
fn eliminate_dead_types(module: &mut CModule) {
    for _ in 0..FIXPOINT_BOUND {
        let reachable = reachable_type_ids(module);
        let before = module.type_decls.len() + module.type_utils.len() + module.forward_decls.len();
        module.type_decls.retain(|s| stmt_type_id(s).map(|id| reachable.contains(&id)).unwrap_or(true));
        module.type_utils.retain(|s| stmt_type_id(s).map(|id| reachable.contains(&id)).unwrap_or(true));
        module.forward_decls.retain(|s| stmt_type_id(s).map(|id| reachable.contains(&id)).unwrap_or(true));
        let after = module.type_decls.len() + module.type_utils.len() + module.forward_decls.len();
        if after == before {
            return;
        }
    }
}

fn stmt_type_id(s: &CStmt) -> Option<u32> {
    match s {
        CStmt::TypDef(t) => Some(t.id.as_u32()),
        CStmt::EnumDef(e) => Some(e.id.as_u32()),
        CStmt::TypeUtilFun(f) => Some(f.id.as_u32()),
        CStmt::ForwardDecl { id, .. } => Some(id.as_u32()),
        _ => None,
    }
}

/// BFS from the roots any module statement actually names, over the
/// "references" edge a `CDefTyp`'s body (plus its destructor/constructor
/// ids) gives its dependencies — the same successors-map-plus-work-stack
/// shape the rest of this crate's reachability passes use. A type decl only
/// contributes its own outgoing edges once it's been dequeued as reachable
/// itself; referencing a type from a decl that's never reached must not
/// resurrect it.
fn reachable_type_ids(module: &CModule) -> HashSet<u32> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<u32> = VecDeque::new();
    for s in &module.defs {
        collect_ctyp_ids(stmt_ctyps(s), &mut queue);
    }
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(CStmt::TypDef(t)) = module.type_decls.iter().find(|s| stmt_type_id(s) == Some(id)) {
            collect_ctyp_ids(vec![&t.body], &mut queue);
            if let Some(f) = &t.props.free_fn {
                queue.push_back(f.as_u32());
            }
            for c in &t.props.ctors {
                queue.push_back(c.as_u32());
            }
        }
    }
    seen
}

fn stmt_ctyps(s: &CStmt) -> Vec<&CTyp> {
    match s {
        CStmt::FunDef(f) | CStmt::TypeUtilFun(f) => {
            let mut v: Vec<&CTyp> = f.args.iter().map(|(_, t)| t).collect();
            v.push(&f.ret_typ);
            v
        }
        CStmt::ValDecl { typ, .. } => vec![typ],
        _ => vec![],
    }
}

fn collect_ctyp_ids(ts: Vec<&CTyp>, queue: &mut VecDeque<u32>) {
    for t in ts {
        match t {
            CTyp::Name(id) => queue.push_back(id.as_u32()),
            CTyp::RawPtr(inner) | CTyp::Array(inner) => collect_ctyp_ids(vec![inner.as_ref()], queue),
            CTyp::RawArray(inner, _) => collect_ctyp_ids(vec![inner.as_ref()], queue),
            CTyp::FunRawPtr(ret, args) => {
                collect_ctyp_ids(vec![ret.as_ref()], queue);
                collect_ctyp_ids(args.iter().collect(), queue);
            }
            CTyp::Struct(fs) | CTyp::Union(fs) => collect_ctyp_ids(fs.iter().map(|f| &f.typ).collect(), queue),
            CTyp::Prim(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_core::kform::{KDef, KDefTyp};

    #[test]
    fn scalar_typ_gets_no_destructor() {
        let mut gen = CTypeGen::new();
        let mut out = CModule::new(Ident::val("M", SymId::from_raw(0)));
        gen.emit_named_typ(Ident::val("Pair", SymId::from_raw(1)), &KTyp::Tuple(vec![KTyp::Int, KTyp::Int]), Span::synthetic(), &mut out);
        // A tuple of two ints is not complex, so no type_utils entries.
        assert!(out.type_utils.is_empty());
    }

    #[test]
    fn complex_typ_gets_destructor() {
        let mut gen = CTypeGen::new();
        let mut out = CModule::new(Ident::val("M", SymId::from_raw(0)));
        gen.emit_named_typ(Ident::val("Boxed", SymId::from_raw(1)), &KTyp::Ref(Box::new(KTyp::Int)), Span::synthetic(), &mut out);
        assert!(!out.type_utils.is_empty());
    }

    #[test]
    fn dead_type_dropped_when_unreferenced() {
        let span = Span::synthetic();
        let module = KModule {
            name: Ident::val("M", SymId::from_raw(0)),
            defs: vec![KDef::Typ(KDefTyp { id: Ident::val("Unused", SymId::from_raw(1)), typ: KTyp::Tuple(vec![KTyp::Int, KTyp::Int]), span })],
            span,
        };
        let out = CTypeGen::new().generate(&module);
        assert!(out.type_decls.is_empty());
    }
}
