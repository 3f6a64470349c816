//! The K-normalizer (§4.C).
//!
//! Converts each AST expression into `(reversed-code-prefix, K-expression)`
//! — here a plain `Vec<KStmt>` in forward order plus a tail `KExpr` — and
//! substitutes generated temporaries for every non-atomic operand. Variant
//! and exception definitions are hoisted in a batch pass before any
//! expression in the module is lowered, per §4.C.

pub mod unpack;

use std::collections::{HashMap, HashSet};

use kc_core::ast::{self, Arg, BinOp, Expr, ExprKind, FunFlags, Literal, TopDef, UnOp};
use kc_core::kform::{
    Atom, KAtIndex, KClauseStage, KDef, KDefExn, KDefFun, KDefTyp, KDefVal, KDefVariant, KExpr, KExprKind, KIterDomain, KModule, KStmt,
    KVariantCase,
};
use kc_core::ktyp::{KTyp, RecordField};
use kc_core::span::Span;
use kc_core::symbol::{Ident, SymId};
use kc_core::{CompileError, Diagnostics};

use crate::pattern::{self, Case, MatchMode};

/// Per-module K-normalization state: the hoisted variant/exception tables
/// (consulted by the pattern compiler for tag resolution), the fresh-id
/// counter, and the bookkeeping an assignment target's binding needs
/// patched in after the fact (§4.C "Assignment"). One `KNormalizer` is used
/// for exactly one module.
pub struct KNormalizer {
    pub variants: HashMap<Ident, KDefVariant>,
    pub exceptions: HashMap<Ident, KDefExn>,
    /// Trailing record-parameter fields of every `has_keywords` function in
    /// this module, keyed by function id (§4.C "Calls with keyword
    /// arguments").
    fun_keyword_fields: HashMap<Ident, Vec<RecordField>>,
    /// Idents ever assigned to; their declaring `KDefVal` gets
    /// `mutable = true` patched in once the whole module is lowered.
    mutable_targets: HashSet<Ident>,
    /// Idents ever used as the base of an array-element assignment; their
    /// declaring `KDefVal` gets `subarray = true` patched in.
    subarray_targets: HashSet<Ident>,
    next_id: u32,
}

impl KNormalizer {
    pub fn new(next_id_start: u32) -> Self {
        Self {
            variants: HashMap::new(),
            exceptions: HashMap::new(),
            fun_keyword_fields: HashMap::new(),
            mutable_targets: HashSet::new(),
            subarray_targets: HashSet::new(),
            next_id: next_id_start,
        }
    }

    fn fresh(&mut self, prefix: &str) -> Ident {
        self.next_id += 1;
        Ident::temp(prefix, SymId::from_raw(self.next_id))
    }

    /// The next unused id, for a caller (the driver, §4.I) that needs to
    /// seed a subsequent pass's fresh-id counter past everything this one
    /// allocated.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Lowers a whole module: hoist variant/exception defs, then lower
    /// every other top-level def in source order (§4.C, §5).
    pub fn lower_module(&mut self, module: &ast::Module, diags: &mut Diagnostics) -> Result<KModule, CompileError> {
        let mut defs = Vec::new();
        self.hoist_defs(module, &mut defs);
        for def in &module.defs {
            match def {
                TopDef::Value(v) => self.lower_top_val(v, diags, &mut defs)?,
                TopDef::Function(f) => defs.push(KDef::Fun(self.lower_fun(f, diags)?)),
                TopDef::TypeAlias(t) => defs.push(KDef::Typ(KDefTyp { id: t.name.clone(), typ: t.typ.clone(), span: t.span })),
                TopDef::Variant(_) | TopDef::Exception(_) | TopDef::Import(_) | TopDef::Pragma(_) => {}
            }
        }
        self.apply_assignment_targets(&mut defs);
        Ok(KModule { name: module.name.clone(), defs, span: module.span })
    }

    fn hoist_defs(&mut self, module: &ast::Module, defs: &mut Vec<KDef>) {
        for def in &module.defs {
            match def {
                TopDef::Variant(v) => {
                    // A single-case record variant is lowered directly to a
                    // `KDefTyp` with a record body, not a `KDefVariant` (§4.C).
                    if v.is_record_variant && v.cases.len() == 1 {
                        let payload = v.cases[0].payload.clone().unwrap_or(KTyp::Void);
                        let kdef = KDefTyp { id: v.name.clone(), typ: payload, span: v.span };
                        defs.push(KDef::Typ(kdef));
                        continue;
                    }
                    let cases = v.cases.iter().map(|c| KVariantCase { name: c.name.clone(), payload: c.payload.clone() }).collect::<Vec<_>>();
                    let kdef = KDefVariant { id: v.name.clone(), cases, recursive: v.recursive, span: v.span };
                    self.variants.insert(v.name.clone(), kdef.clone());
                    defs.push(KDef::Variant(kdef));
                }
                TopDef::Exception(x) => {
                    let kdef = KDefExn { id: x.name.clone(), payload: x.payload.clone(), span: x.span };
                    self.exceptions.insert(x.name.clone(), kdef.clone());
                    defs.push(KDef::Exn(kdef));
                }
                TopDef::Function(f) => {
                    // A `has_keywords` function's trailing parameter is a
                    // structural record type (pre-mangling); record its
                    // fields so call sites can pack keyword args into the
                    // matching record literal (§4.C).
                    if f.flags.contains(FunFlags::HAS_KEYWORDS) {
                        if let Some(KTyp::Record(fields)) = f.args.last().map(|a| &a.typ) {
                            self.fun_keyword_fields.insert(f.name.clone(), fields.clone());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Patches every `KDefVal` whose id was recorded as an assignment
    /// target during lowering, setting `mutable`/`subarray` (§4.C
    /// "Assignment"). Run once the whole module is lowered, since a target
    /// can be assigned to only after its declaration has already been
    /// emitted and moved into the tree.
    fn apply_assignment_targets(&self, defs: &mut [KDef]) {
        if self.mutable_targets.is_empty() && self.subarray_targets.is_empty() {
            return;
        }
        for def in defs {
            match def {
                KDef::Val(v) => self.patch_val(v),
                KDef::Fun(f) => self.patch_expr(&mut f.body),
                KDef::Typ(_) | KDef::Variant(_) | KDef::Exn(_) => {}
            }
        }
    }

    fn patch_val(&self, v: &mut KDefVal) {
        if self.mutable_targets.contains(&v.id) {
            v.mutable = true;
        }
        if self.subarray_targets.contains(&v.id) {
            v.subarray = true;
        }
        self.patch_expr(&mut v.value);
    }

    fn patch_stmt(&self, s: &mut KStmt) {
        match s {
            KStmt::Val(v) => self.patch_val(v),
            KStmt::Expr(e) => self.patch_expr(e),
        }
    }

    fn patch_clause_stage(&self, stage: &mut KClauseStage) {
        for s in &mut stage.pre_code {
            self.patch_stmt(s);
        }
        if let Some(guard) = &mut stage.when {
            self.patch_expr(guard);
        }
    }

    fn patch_expr(&self, e: &mut KExpr) {
        match &mut e.kind {
            KExprKind::If(_, t, f) => {
                self.patch_expr(t);
                self.patch_expr(f);
            }
            KExprKind::Block(stmts, tail) => {
                for s in stmts.iter_mut() {
                    self.patch_stmt(s);
                }
                self.patch_expr(tail);
            }
            KExprKind::While(cond, body) | KExprKind::DoWhile(body, cond) => {
                self.patch_expr(cond);
                self.patch_expr(body);
            }
            KExprKind::For(stages, body) | KExprKind::Map(stages, body) => {
                for stage in stages.iter_mut() {
                    self.patch_clause_stage(stage);
                }
                self.patch_expr(body);
            }
            KExprKind::Try { body, handler, .. } => {
                self.patch_expr(body);
                self.patch_expr(handler);
            }
            KExprKind::Atom(_)
            | KExprKind::Binop(..)
            | KExprKind::Unop(..)
            | KExprKind::Call(..)
            | KExprKind::MkTuple(_)
            | KExprKind::MkRecord { .. }
            | KExprKind::MkArray(_)
            | KExprKind::Mem(..)
            | KExprKind::At(..)
            | KExprKind::Assign(..)
            | KExprKind::Cast(..)
            | KExprKind::CCode(_)
            | KExprKind::Intrinsic(..)
            | KExprKind::Throw(_) => {}
        }
    }

    fn lower_top_val(&mut self, v: &ast::DefVal, diags: &mut Diagnostics, defs: &mut Vec<KDef>) -> Result<(), CompileError> {
        let (mut prefix, value) = self.lower_expr(&v.value, diags)?;
        let source = self.atomize_kexpr(value, &mut prefix);
        let mut binds = Vec::new();
        unpack::pat_simple_unpack(&v.pattern, &v.value.typ, source, v.span, &mut binds, diags, &mut |p| {
            self.next_id += 1;
            Ident::temp(p, SymId::from_raw(self.next_id))
        })?;
        for stmt in prefix.into_iter().chain(binds) {
            if let KStmt::Val(val) = stmt {
                defs.push(KDef::Val(val));
            }
            // `KStmt::Expr` prefix entries at top level run for side effects
            // only; a real driver would wrap the module in a static
            // initializer. Out of scope here — see DESIGN.md.
        }
        Ok(())
    }

    fn lower_fun(&mut self, f: &ast::DefFun, diags: &mut Diagnostics) -> Result<KDefFun, CompileError> {
        let body = self.lower_expr_to_block(&f.body, diags)?;
        Ok(KDefFun {
            id: f.name.clone(),
            args: f.args.iter().map(|a| (a.name.clone(), a.typ.clone())).collect(),
            ret_typ: f.ret_typ.clone(),
            body,
            flags: f.flags,
            closure: Default::default(),
            span: f.span,
        })
    }

    fn wrap_block(prefix: Vec<KStmt>, tail: KExpr) -> KExpr {
        if prefix.is_empty() {
            tail
        } else {
            let typ = tail.typ.clone();
            let span = tail.span;
            KExpr { kind: KExprKind::Block(prefix, Box::new(tail)), typ, span }
        }
    }

    fn lower_expr_to_block(&mut self, e: &Expr, diags: &mut Diagnostics) -> Result<KExpr, CompileError> {
        let (prefix, tail) = self.lower_expr(e, diags)?;
        Ok(Self::wrap_block(prefix, tail))
    }

    fn atomize(&mut self, e: &Expr, diags: &mut Diagnostics, prefix: &mut Vec<KStmt>) -> Result<Atom, CompileError> {
        let (pre, kexpr) = self.lower_expr(e, diags)?;
        prefix.extend(pre);
        Ok(self.atomize_kexpr(kexpr, prefix))
    }

    fn atomize_kexpr(&mut self, kexpr: KExpr, prefix: &mut Vec<KStmt>) -> Atom {
        if let KExprKind::Atom(a) = kexpr.kind {
            return a;
        }
        let id = self.fresh("t");
        let typ = kexpr.typ.clone();
        let span = kexpr.span;
        prefix.push(KStmt::Val(KDefVal { id: id.clone(), typ, value: kexpr, mutable: false, tempref: true, subarray: false, span }));
        Atom::Id(id)
    }

    /// `(reversed-code-prefix, K-expression)` per §4.C, modeled here as a
    /// forward-order `Vec<KStmt>` plus the tail expression.
    fn lower_expr(&mut self, e: &Expr, diags: &mut Diagnostics) -> Result<(Vec<KStmt>, KExpr), CompileError> {
        let span = e.span;
        let typ = e.typ.clone();
        match &e.kind {
            ExprKind::Lit(l) => Ok((vec![], KExpr { kind: KExprKind::Atom(Atom::Lit(l.clone())), typ, span })),
            ExprKind::Ident(id) => Ok((vec![], KExpr { kind: KExprKind::Atom(Atom::Id(id.clone())), typ, span })),

            ExprKind::Binop(BinOp::And, l, r) => {
                let mut prefix = vec![];
                let a = self.atomize(l, diags, &mut prefix)?;
                let r_block = self.lower_expr_to_block(r, diags)?;
                let false_expr = KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Bool(false))), typ: KTyp::Bool, span };
                Ok((prefix, KExpr { kind: KExprKind::If(a, Box::new(r_block), Box::new(false_expr)), typ: KTyp::Bool, span }))
            }
            ExprKind::Binop(BinOp::Or, l, r) => {
                let mut prefix = vec![];
                let a = self.atomize(l, diags, &mut prefix)?;
                let r_block = self.lower_expr_to_block(r, diags)?;
                let true_expr = KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Bool(true))), typ: KTyp::Bool, span };
                Ok((prefix, KExpr { kind: KExprKind::If(a, Box::new(true_expr), Box::new(r_block)), typ: KTyp::Bool, span }))
            }
            ExprKind::Binop(op, l, r) => {
                let mut prefix = vec![];
                let a = self.atomize(l, diags, &mut prefix)?;
                let b = self.atomize(r, diags, &mut prefix)?;
                // Only `string+string`, `char+string`, `string+char` become the
                // intrinsic (§4.C); `char+char` stays a plain binop, so at
                // least one operand must itself be a string.
                let is_concat = matches!(op, BinOp::Add)
                    && ((l.typ == KTyp::String && matches!(r.typ, KTyp::String | KTyp::Char))
                        || (r.typ == KTyp::String && matches!(l.typ, KTyp::String | KTyp::Char)));
                let kind = if is_concat {
                    KExprKind::Intrinsic(kc_core::kform::Intrinsic::StrConcat, vec![a, b])
                } else {
                    KExprKind::Binop(*op, a, b)
                };
                Ok((prefix, KExpr { kind, typ, span }))
            }
            ExprKind::Unop(UnOp::RevIndex, x) => {
                // Only meaningful as an `Index` operand; a bare occurrence
                // falls back to the atom itself (the enclosing `Index`
                // lowering special-cases this node directly).
                let mut prefix = vec![];
                let a = self.atomize(x, diags, &mut prefix)?;
                Ok((prefix, KExpr { kind: KExprKind::Atom(a), typ, span }))
            }
            ExprKind::Unop(op, x) => {
                let mut prefix = vec![];
                let a = self.atomize(x, diags, &mut prefix)?;
                Ok((prefix, KExpr { kind: KExprKind::Unop(*op, a), typ, span }))
            }

            ExprKind::Seq(exprs) => {
                let mut prefix = vec![];
                if exprs.is_empty() {
                    return Ok((prefix, KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Unit)), typ: KTyp::Void, span }));
                }
                for sub in &exprs[..exprs.len() - 1] {
                    let (p, k) = self.lower_expr(sub, diags)?;
                    prefix.extend(p);
                    prefix.push(KStmt::Expr(k));
                }
                let (p, tail) = self.lower_expr(&exprs[exprs.len() - 1], diags)?;
                prefix.extend(p);
                Ok((prefix, tail))
            }

            ExprKind::If(c, t, f) => {
                let mut prefix = vec![];
                let c_atom = self.atomize(c, diags, &mut prefix)?;
                let t_block = self.lower_expr_to_block(t, diags)?;
                let f_block = match f {
                    Some(f) => self.lower_expr_to_block(f, diags)?,
                    None => KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Unit)), typ: KTyp::Void, span },
                };
                Ok((prefix, KExpr { kind: KExprKind::If(c_atom, Box::new(t_block), Box::new(f_block)), typ, span }))
            }

            ExprKind::Call(f, args) => {
                let mut prefix = vec![];
                let f_atom = self.atomize(f, diags, &mut prefix)?;
                let keyword_fields = match &f.kind {
                    ExprKind::Ident(callee) => self.fun_keyword_fields.get(callee).cloned(),
                    _ => None,
                };
                let mut call_args = vec![];
                let mut keywords: Vec<(&str, &Expr)> = vec![];
                for a in args {
                    match a {
                        Arg::Positional(ex) => call_args.push(self.atomize(ex, diags, &mut prefix)?),
                        Arg::Keyword(name, ex) => keywords.push((name.as_str(), ex)),
                    }
                }
                if !keywords.is_empty() {
                    // §4.C: a `has_keywords` function's keyword args are
                    // packed into a trailing record literal matching its
                    // last parameter's field list, not flattened positionally.
                    match keyword_fields {
                        Some(rfields) => {
                            let rec_atom = self.pack_keyword_record(&rfields, &keywords, diags, span, &mut prefix)?;
                            call_args.push(rec_atom);
                        }
                        None => {
                            diags.error(span, "keyword arguments require calling a `has_keywords` function");
                            for (_, ex) in keywords {
                                call_args.push(self.atomize(ex, diags, &mut prefix)?);
                            }
                        }
                    }
                }
                Ok((prefix, KExpr { kind: KExprKind::Call(f_atom, call_args), typ, span }))
            }

            ExprKind::Tuple(elts) => {
                let mut prefix = vec![];
                let mut atoms = Vec::with_capacity(elts.len());
                for el in elts {
                    atoms.push(self.atomize(el, diags, &mut prefix)?);
                }
                Ok((prefix, KExpr { kind: KExprKind::MkTuple(atoms), typ, span }))
            }

            ExprKind::Record { case, fields } => {
                let mut prefix = vec![];
                let rfields = if let KTyp::Record(fs) = &typ { fs.clone() } else { vec![] };
                let mut vals = Vec::with_capacity(rfields.len());
                for rf in &rfields {
                    if let Some(init) = fields.iter().find(|f| f.name == rf.name) {
                        vals.push(self.atomize(&init.value, diags, &mut prefix)?);
                    } else if let Some(default_src) = &rf.default {
                        let tmp = self.fresh(&rf.name);
                        prefix.push(KStmt::Val(KDefVal {
                            id: tmp.clone(),
                            typ: rf.typ.clone(),
                            value: KExpr { kind: KExprKind::CCode(default_src.clone()), typ: rf.typ.clone(), span },
                            mutable: false,
                            tempref: true,
                            subarray: false,
                            span,
                        }));
                        vals.push(Atom::Id(tmp));
                    } else {
                        diags.error(span, format!("missing field `{}` with no declared default", rf.name));
                        vals.push(Atom::Lit(Literal::Unit));
                    }
                }
                Ok((prefix, KExpr { kind: KExprKind::MkRecord { ctor: case.clone(), fields: vals }, typ, span }))
            }

            ExprKind::RecordUpdate { base, fields } => {
                let mut prefix = vec![];
                let base_atom = self.atomize(base, diags, &mut prefix)?;
                let rfields = if let KTyp::Record(fs) = &typ { fs.clone() } else { vec![] };
                let mut vals = Vec::with_capacity(rfields.len());
                for (i, rf) in rfields.iter().enumerate() {
                    if let Some(init) = fields.iter().find(|f| f.name == rf.name) {
                        vals.push(self.atomize(&init.value, diags, &mut prefix)?);
                    } else {
                        let tmp = self.fresh(&rf.name);
                        prefix.push(KStmt::Val(KDefVal {
                            id: tmp.clone(),
                            typ: rf.typ.clone(),
                            value: KExpr { kind: KExprKind::Mem(base_atom.clone(), i as u32), typ: rf.typ.clone(), span },
                            mutable: false,
                            tempref: true,
                            subarray: false,
                            span,
                        }));
                        vals.push(Atom::Id(tmp));
                    }
                }
                Ok((prefix, KExpr { kind: KExprKind::MkRecord { ctor: None, fields: vals }, typ, span }))
            }

            ExprKind::Array(elts) => {
                let mut prefix = vec![];
                let mut atoms = Vec::with_capacity(elts.len());
                for el in elts {
                    atoms.push(self.atomize(el, diags, &mut prefix)?);
                }
                Ok((prefix, KExpr { kind: KExprKind::MkArray(atoms), typ, span }))
            }

            ExprKind::Range { start, end, step } => {
                let mut prefix = vec![];
                let s = match start {
                    Some(e) => self.atomize(e, diags, &mut prefix)?,
                    None => Atom::Lit(Literal::Int(0)),
                };
                let en = match end {
                    Some(e) => self.atomize(e, diags, &mut prefix)?,
                    None => Atom::Lit(Literal::Int(0)),
                };
                let st = match step {
                    Some(e) => self.atomize(e, diags, &mut prefix)?,
                    None => Atom::Lit(Literal::Int(1)),
                };
                Ok((prefix, KExpr { kind: KExprKind::MkTuple(vec![s, en, st]), typ, span }))
            }

            ExprKind::While(c, body) => {
                let c_block = self.lower_expr_to_block(c, diags)?;
                let body_block = self.lower_expr_to_block(body, diags)?;
                Ok((vec![], KExpr { kind: KExprKind::While(Box::new(c_block), Box::new(body_block)), typ: KTyp::Void, span }))
            }
            ExprKind::DoWhile(body, c) => {
                let body_block = self.lower_expr_to_block(body, diags)?;
                let c_block = self.lower_expr_to_block(c, diags)?;
                Ok((vec![], KExpr { kind: KExprKind::DoWhile(Box::new(body_block), Box::new(c_block)), typ: KTyp::Void, span }))
            }

            ExprKind::For(clauses, body) => {
                let stages = clauses.iter().map(|c| self.lower_for_clause(c, diags)).collect::<Result<Vec<_>, _>>()?;
                let body_block = self.lower_expr_to_block(body, diags)?;
                Ok((vec![], KExpr { kind: KExprKind::For(stages, Box::new(body_block)), typ: KTyp::Void, span }))
            }
            ExprKind::Map(clauses, body) => {
                let stages = clauses.iter().map(|c| self.lower_for_clause(c, diags)).collect::<Result<Vec<_>, _>>()?;
                let body_block = self.lower_expr_to_block(body, diags)?;
                Ok((vec![], KExpr { kind: KExprKind::Map(stages, Box::new(body_block)), typ, span }))
            }

            ExprKind::Match(scrutinee, cases) => {
                let mut prefix = vec![];
                // §4.C "match on a mutable source": the scrutinee is always
                // bound to a fresh immutable temp first, so it can't change
                // between the checks the pattern compiler emits.
                let scrut_atom = self.atomize(scrutinee, diags, &mut prefix)?;
                let kcases = self.lower_match_cases(cases, diags)?;
                let mut next_id = self.next_id;
                let variants = self.variants.clone();
                let mut fresh = move |p: &str| {
                    next_id += 1;
                    Ident::temp(p, SymId::from_raw(next_id))
                };
                let result =
                    pattern::compile_match(scrut_atom, scrutinee.typ.clone(), kcases, MatchMode::Normal, typ.clone(), &variants, diags, &mut fresh);
                self.next_id = next_id;
                Ok((prefix, result))
            }

            ExprKind::Try(body, cases) => {
                let body_block = self.lower_expr_to_block(body, diags)?;
                let exn_id = self.fresh("exn");
                let kcases = self.lower_match_cases(cases, diags)?;
                let mut next_id = self.next_id;
                let variants = self.variants.clone();
                let mut fresh = move |p: &str| {
                    next_id += 1;
                    Ident::temp(p, SymId::from_raw(next_id))
                };
                let handler = pattern::compile_match(
                    Atom::Id(exn_id.clone()),
                    KTyp::Exn,
                    kcases,
                    MatchMode::Catch,
                    typ.clone(),
                    &variants,
                    diags,
                    &mut fresh,
                );
                self.next_id = next_id;
                Ok((vec![], KExpr { kind: KExprKind::Try { body: Box::new(body_block), exn_id, handler: Box::new(handler) }, typ, span }))
            }

            ExprKind::Throw(x) => {
                let mut prefix = vec![];
                let a = self.atomize(x, diags, &mut prefix)?;
                Ok((prefix, KExpr { kind: KExprKind::Throw(a), typ: KTyp::Void, span }))
            }

            ExprKind::Field(base, name) => {
                let mut prefix = vec![];
                let base_atom = self.atomize(base, diags, &mut prefix)?;
                let idx = if let KTyp::Record(fs) = &base.typ { fs.iter().position(|f| &f.name == name).unwrap_or(0) as u32 } else { 0 };
                Ok((prefix, KExpr { kind: KExprKind::Mem(base_atom, idx), typ, span }))
            }

            ExprKind::Index(base, idxs) => {
                let mut prefix = vec![];
                let base_atom = self.atomize(base, diags, &mut prefix)?;
                let mut idx_atoms = Vec::with_capacity(idxs.len());
                for (axis, idx) in idxs.iter().enumerate() {
                    if matches!(idx.kind, ExprKind::Unop(UnOp::RevIndex, _)) {
                        if let ExprKind::Unop(UnOp::RevIndex, inner) = &idx.kind {
                            let offset = self.atomize(inner, diags, &mut prefix)?;
                            let size = self.bind_intrinsic(
                                kc_core::kform::Intrinsic::GetSize,
                                vec![base_atom.clone(), Atom::Lit(Literal::Int(axis as i64))],
                                KTyp::Int,
                                span,
                                &mut prefix,
                            );
                            let sub = KExpr { kind: KExprKind::Binop(BinOp::Sub, size, offset), typ: KTyp::Int, span };
                            idx_atoms.push(self.atomize_kexpr(sub, &mut prefix));
                            continue;
                        }
                    }
                    idx_atoms.push(self.atomize(idx, diags, &mut prefix)?);
                }
                Ok((prefix, KExpr { kind: KExprKind::At(base_atom, idx_atoms), typ, span }))
            }

            ExprKind::Assign(lhs, rhs) => {
                let mut prefix = vec![];
                let rhs_atom = self.atomize(rhs, diags, &mut prefix)?;
                match &lhs.kind {
                    ExprKind::Ident(id) => {
                        self.mutable_targets.insert(id.clone());
                        Ok((prefix, KExpr { kind: KExprKind::Assign(id.clone(), rhs_atom), typ: KTyp::Void, span }))
                    }
                    ExprKind::Index(base, idxs) => {
                        let base_atom = self.atomize(base, diags, &mut prefix)?;
                        // The indices are still evaluated for their side
                        // effects, but the write itself is expressed purely
                        // by marking the base identifier's binding (§4.C);
                        // there is no separate subarray-set node.
                        for idx in idxs {
                            self.atomize(idx, diags, &mut prefix)?;
                        }
                        match base_atom {
                            Atom::Id(base_id) => {
                                self.mutable_targets.insert(base_id.clone());
                                self.subarray_targets.insert(base_id.clone());
                                Ok((prefix, KExpr { kind: KExprKind::Assign(base_id, rhs_atom), typ: KTyp::Void, span }))
                            }
                            Atom::Lit(_) => {
                                diags.error(span, "array-element assignment target must be a mutable array variable");
                                Ok((prefix, KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Unit)), typ: KTyp::Void, span }))
                            }
                        }
                    }
                    _ => {
                        diags.error(span, "assignment target must be an identifier or array element");
                        Ok((prefix, KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Unit)), typ: KTyp::Void, span }))
                    }
                }
            }

            ExprKind::Cast(x, to_typ) => {
                let mut prefix = vec![];
                let a = self.atomize(x, diags, &mut prefix)?;
                Ok((prefix, KExpr { kind: KExprKind::Cast(a, to_typ.clone()), typ: to_typ.clone(), span }))
            }
            ExprKind::Typed(x, _) => self.lower_expr(x, diags),
            ExprKind::CCode(src) => Ok((vec![], KExpr { kind: KExprKind::CCode(src.clone()), typ, span })),
        }
    }

    fn bind_intrinsic(&mut self, intr: kc_core::kform::Intrinsic, args: Vec<Atom>, typ: KTyp, span: Span, prefix: &mut Vec<KStmt>) -> Atom {
        let id = self.fresh("sz");
        prefix.push(KStmt::Val(KDefVal {
            id: id.clone(),
            typ: typ.clone(),
            value: KExpr { kind: KExprKind::Intrinsic(intr, args), typ, span },
            mutable: false,
            tempref: true,
            subarray: false,
            span,
        }));
        Atom::Id(id)
    }

    /// Builds the trailing record literal a `has_keywords` call packs its
    /// keyword arguments into, filling any field missing from `keywords`
    /// from the field's declared default (§4.C, same rule as plain record
    /// construction).
    fn pack_keyword_record(
        &mut self,
        rfields: &[RecordField],
        keywords: &[(&str, &Expr)],
        diags: &mut Diagnostics,
        span: Span,
        prefix: &mut Vec<KStmt>,
    ) -> Result<Atom, CompileError> {
        let mut vals = Vec::with_capacity(rfields.len());
        for rf in rfields {
            if let Some((_, ex)) = keywords.iter().find(|(name, _)| *name == rf.name) {
                vals.push(self.atomize(ex, diags, prefix)?);
            } else if let Some(default_src) = &rf.default {
                let tmp = self.fresh(&rf.name);
                prefix.push(KStmt::Val(KDefVal {
                    id: tmp.clone(),
                    typ: rf.typ.clone(),
                    value: KExpr { kind: KExprKind::CCode(default_src.clone()), typ: rf.typ.clone(), span },
                    mutable: false,
                    tempref: true,
                    subarray: false,
                    span,
                }));
                vals.push(Atom::Id(tmp));
            } else {
                diags.error(span, format!("missing keyword argument `{}` with no declared default", rf.name));
                vals.push(Atom::Lit(Literal::Unit));
            }
        }
        let record_typ = KTyp::Record(rfields.to_vec());
        let rec_expr = KExpr { kind: KExprKind::MkRecord { ctor: None, fields: vals }, typ: record_typ, span };
        Ok(self.atomize_kexpr(rec_expr, prefix))
    }

    fn lower_match_cases(&mut self, cases: &[ast::MatchCase], diags: &mut Diagnostics) -> Result<Vec<Case>, CompileError> {
        cases
            .iter()
            .map(|c| {
                let body = self.lower_expr_to_block(&c.body, diags)?;
                Ok(Case { pattern: c.pattern.clone(), body, span: c.span })
            })
            .collect()
    }

    fn lower_for_clause(&mut self, clause: &ast::ForClause, diags: &mut Diagnostics) -> Result<KClauseStage, CompileError> {
        let mut pre_code = vec![];
        let domain = match &clause.iter.kind {
            ExprKind::Range { start, end, step } => {
                let s = match start {
                    Some(e) => self.atomize(e, diags, &mut pre_code)?,
                    None => Atom::Lit(Literal::Int(0)),
                };
                let en = match end {
                    Some(e) => self.atomize(e, diags, &mut pre_code)?,
                    None => Atom::Lit(Literal::Int(0)),
                };
                let st = match step {
                    Some(e) => self.atomize(e, diags, &mut pre_code)?,
                    None => Atom::Lit(Literal::Int(1)),
                };
                KIterDomain::Range { start: s, end: en, step: st }
            }
            _ => {
                let a = self.atomize(&clause.iter, diags, &mut pre_code)?;
                match &clause.iter.typ {
                    KTyp::List(_) => KIterDomain::List(a),
                    KTyp::String => KIterDomain::String(a),
                    _ => KIterDomain::Array(a),
                }
            }
        };
        let proxy = self.fresh("i");
        // `val pat = i` — the clause's pattern is unpacked inside the loop
        // body, prepended as part of this stage's pre-code so the body sees
        // the bound names (§4.C).
        unpack::pat_simple_unpack(&clause.pattern, &clause.iter.typ, Atom::Id(proxy.clone()), clause.span, &mut pre_code, diags, &mut |p| {
            self.next_id += 1;
            Ident::temp(p, SymId::from_raw(self.next_id))
        })?;
        let at_index = clause.at_index.as_ref().map(|ai| match ai {
            ast::AtIndex::Single(id) => KAtIndex::Single(id.clone()),
            ast::AtIndex::Multi(ids) => KAtIndex::Multi(ids.clone()),
        });
        let when = match &clause.when {
            Some(w) => Some(Box::new(self.lower_expr_to_block(w, diags)?)),
            None => None,
        };
        Ok(KClauseStage { pre_code, domain, proxy, at_index, when, span: clause.span })
    }
}
