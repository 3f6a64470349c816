//! Generic K-form traversal (§4.A, §9 "Dynamic dispatch for IR traversal").
//!
//! The source models this as a callback record with optional hooks per node
//! kind; here that's a trait with default methods instead — each `visit_*`
//! method defaults to calling the matching `walk_*`, which performs
//! structural recursion and calls back into `visit_*` on children.
//! Overriding a `visit_*` method without calling its `walk_*` counterpart
//! prunes default recursion for that node, same as a hook that "returns
//! without recursing" in the source's callback-record model.

use std::collections::HashSet;

use crate::kform::{Atom, KClauseStage, KExpr, KExprKind, KStmt};
use crate::symbol::Ident;

/// Read-only traversal over K-form. See the module doc for the
/// override/default-recursion contract.
pub trait KVisitor {
    fn visit_expr(&mut self, e: &KExpr) {
        self.walk_expr(e);
    }

    fn visit_stmt(&mut self, s: &KStmt) {
        self.walk_stmt(s);
    }

    fn visit_atom(&mut self, a: &Atom) {
        self.walk_atom(a);
    }

    fn visit_ident(&mut self, _id: &Ident) {}

    fn walk_atom(&mut self, a: &Atom) {
        if let Atom::Id(id) = a {
            self.visit_ident(id);
        }
    }

    fn walk_stmt(&mut self, s: &KStmt) {
        match s {
            KStmt::Val(def) => self.visit_expr(&def.value),
            KStmt::Expr(e) => self.visit_expr(e),
        }
    }

    fn walk_clause_stage(&mut self, stage: &KClauseStage) {
        for s in &stage.pre_code {
            self.visit_stmt(s);
        }
        match &stage.domain {
            crate::kform::KIterDomain::Range { start, end, step } => {
                self.visit_atom(start);
                self.visit_atom(end);
                self.visit_atom(step);
            }
            crate::kform::KIterDomain::Array(a) | crate::kform::KIterDomain::List(a) | crate::kform::KIterDomain::String(a) => {
                self.visit_atom(a);
            }
        }
        if let Some(guard) = &stage.when {
            self.visit_expr(guard);
        }
    }

    fn walk_expr(&mut self, e: &KExpr) {
        match &e.kind {
            KExprKind::Atom(a) => self.visit_atom(a),
            KExprKind::Binop(_, a, b) => {
                self.visit_atom(a);
                self.visit_atom(b);
            }
            KExprKind::Unop(_, a) => self.visit_atom(a),
            KExprKind::Call(f, args) => {
                self.visit_atom(f);
                for a in args {
                    self.visit_atom(a);
                }
            }
            KExprKind::MkTuple(elts) | KExprKind::MkArray(elts) => {
                for a in elts {
                    self.visit_atom(a);
                }
            }
            KExprKind::MkRecord { fields, .. } => {
                for a in fields {
                    self.visit_atom(a);
                }
            }
            KExprKind::Mem(a, _) => self.visit_atom(a),
            KExprKind::At(a, idxs) => {
                self.visit_atom(a);
                for i in idxs {
                    self.visit_atom(i);
                }
            }
            KExprKind::Assign(id, a) => {
                self.visit_ident(id);
                self.visit_atom(a);
            }
            KExprKind::Cast(a, _) => self.visit_atom(a),
            KExprKind::CCode(_) => {}
            KExprKind::Intrinsic(_, args) => {
                for a in args {
                    self.visit_atom(a);
                }
            }
            KExprKind::If(c, t, f) => {
                self.visit_atom(c);
                self.visit_expr(t);
                self.visit_expr(f);
            }
            KExprKind::Block(stmts, tail) => {
                for s in stmts {
                    self.visit_stmt(s);
                }
                self.visit_expr(tail);
            }
            KExprKind::While(cond, body) | KExprKind::DoWhile(body, cond) => {
                self.visit_expr(cond);
                self.visit_expr(body);
            }
            KExprKind::For(stages, body) | KExprKind::Map(stages, body) => {
                for stage in stages {
                    self.walk_clause_stage(stage);
                }
                self.visit_expr(body);
            }
            KExprKind::Throw(a) => self.visit_atom(a),
            KExprKind::Try { body, handler, .. } => {
                self.visit_expr(body);
                self.visit_expr(handler);
            }
        }
    }
}

/// Collects every identifier `visit_ident` sees as "used" and every binder
/// introduced along the way as "declared"; `free_vars` below is the
/// difference. Binders: `KDefVal`, comprehension clause proxies/@-indices,
/// and the exception temporary a `try` handler binds (§4.A).
struct FreeVarsCollector {
    declared: HashSet<Ident>,
    used: HashSet<Ident>,
}

impl KVisitor for FreeVarsCollector {
    fn visit_ident(&mut self, id: &Ident) {
        self.used.insert(id.clone());
    }

    fn walk_stmt(&mut self, s: &KStmt) {
        if let KStmt::Val(def) = s {
            self.declared.insert(def.id.clone());
        }
        match s {
            KStmt::Val(def) => self.visit_expr(&def.value),
            KStmt::Expr(e) => self.visit_expr(e),
        }
    }

    fn walk_clause_stage(&mut self, stage: &KClauseStage) {
        for s in &stage.pre_code {
            self.visit_stmt(s);
        }
        match &stage.domain {
            crate::kform::KIterDomain::Range { start, end, step } => {
                self.visit_atom(start);
                self.visit_atom(end);
                self.visit_atom(step);
            }
            crate::kform::KIterDomain::Array(a) | crate::kform::KIterDomain::List(a) | crate::kform::KIterDomain::String(a) => {
                self.visit_atom(a);
            }
        }
        self.declared.insert(stage.proxy.clone());
        match &stage.at_index {
            Some(crate::kform::KAtIndex::Single(id)) => {
                self.declared.insert(id.clone());
            }
            Some(crate::kform::KAtIndex::Multi(ids)) => {
                self.declared.extend(ids.iter().cloned());
            }
            None => {}
        }
        if let Some(guard) = &stage.when {
            self.visit_expr(guard);
        }
    }

    fn visit_expr(&mut self, e: &KExpr) {
        // Only `Try` needs special handling (its handler's `exn_id` is a
        // binder); everything else goes through the trait's default
        // `walk_expr`, which still dispatches back through our overridden
        // `visit_ident`/`walk_stmt`/`walk_clause_stage`.
        if let KExprKind::Try { body, exn_id, handler } = &e.kind {
            self.visit_expr(body);
            self.declared.insert(exn_id.clone());
            self.visit_expr(handler);
        } else {
            self.walk_expr(e);
        }
    }
}

/// `free_vars(e) = used(e) \ declared(e)` (§4.A), seeded with identifiers
/// the caller already considers bound (typically a function's parameters,
/// for lambda-lifting's hoistability check, §4.D).
pub fn free_vars(expr: &KExpr, seed_declared: &HashSet<Ident>) -> HashSet<Ident> {
    let mut collector = FreeVarsCollector { declared: seed_declared.clone(), used: HashSet::new() };
    collector.visit_expr(expr);
    collector.used.difference(&collector.declared).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kform::KDefVal;
    use crate::ktyp::KTyp;
    use crate::span::Span;
    use crate::symbol::SymId;

    fn atom_expr(a: Atom) -> KExpr {
        KExpr { kind: KExprKind::Atom(a), typ: KTyp::Int, span: Span::synthetic() }
    }

    #[test]
    fn free_vars_excludes_let_bound_name() {
        let x = Ident::val("x", SymId::from_raw(0));
        let y = Ident::val("y", SymId::from_raw(1));
        let block = KExpr {
            kind: KExprKind::Block(
                vec![KStmt::Val(KDefVal {
                    id: x.clone(),
                    typ: KTyp::Int,
                    value: atom_expr(Atom::Id(y.clone())),
                    mutable: false,
                    tempref: false,
                    subarray: false,
                    span: Span::synthetic(),
                })],
                Box::new(atom_expr(Atom::Id(x.clone()))),
            ),
            typ: KTyp::Int,
            span: Span::synthetic(),
        };
        let fv = free_vars(&block, &HashSet::new());
        assert!(fv.contains(&y));
        assert!(!fv.contains(&x));
    }

    #[test]
    fn free_vars_respects_seeded_declarations() {
        let x = Ident::val("x", SymId::from_raw(0));
        let mut seed = HashSet::new();
        seed.insert(x.clone());
        let fv = free_vars(&atom_expr(Atom::Id(x.clone())), &seed);
        assert!(fv.is_empty());
    }
}
