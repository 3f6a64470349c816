//! The pattern-matching compiler (§4.B).
//!
//! Input: a scrutinee atom of known type, an ordered list of
//! `(pattern, body)` cases already K-normalized by the caller, and the
//! enclosing module's known variants (so a `PatVariant`/`PatRecord` case
//! name can be resolved to a tag and payload shape). Output: a single
//! K-form expression that evaluates the first matching case's body, or
//! throws (or in catch-mode, rethrows) on fallthrough.

use std::collections::HashMap;

use kc_core::ast::Pattern;
use kc_core::kform::{Atom, Intrinsic, KClauseStage, KDefVal, KDefVariant, KExpr, KExprKind, KStmt};
use kc_core::ktyp::KTyp;
use kc_core::span::Span;
use kc_core::symbol::Ident;
use kc_core::Diagnostics;

/// Whether fallthrough throws a fresh `NoMatchError` or rethrows the
/// exception currently being handled (§4.B, §4.C "try/catch").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MatchMode {
    Normal,
    Catch,
}

/// One arm: its source pattern and its already-lowered body.
pub struct Case {
    pub pattern: Pattern,
    pub body: KExpr,
    pub span: Span,
}

/// A step in a case's compiled check/bind sequence (§4.B "Output shape").
enum Step {
    /// A boolean K-expression that must hold for the case to match.
    Check(KExpr),
    Bind(KStmt),
}

/// Classifies a sub-pattern into one of the three worklists (§4.B).
fn needs_check(p: &Pattern) -> bool {
    match p {
        Pattern::Any | Pattern::Ident(_) => false,
        Pattern::Lit(_) | Pattern::Variant(..) | Pattern::Cons(..) | Pattern::When(..) => true,
        Pattern::Record(case, fields) => case.is_some() || fields.iter().any(|(_, p)| needs_check(p)),
        Pattern::Tuple(ps) => ps.iter().any(needs_check),
        Pattern::As(p, _) | Pattern::Ref(p) | Pattern::Typed(p, _) => needs_check(p),
    }
}

fn has_vars(p: &Pattern) -> bool {
    let mut out = Vec::new();
    p.bound_idents(&mut out);
    !out.is_empty()
}

enum Bucket {
    NeedCheckNoVars,
    NeedCheckWithVars,
    NoCheckWithVars,
}

fn classify(p: &Pattern) -> Bucket {
    if needs_check(p) {
        if has_vars(p) { Bucket::NeedCheckWithVars } else { Bucket::NeedCheckNoVars }
    } else {
        Bucket::NoCheckWithVars
    }
}

/// Work item: a pending sub-pattern paired with its type and the atom that
/// holds its value once extracted.
struct Item {
    pattern: Pattern,
    typ: KTyp,
    atom: Atom,
}

struct Queues {
    q1: std::collections::VecDeque<Item>,
    q2: std::collections::VecDeque<Item>,
    q3: std::collections::VecDeque<Item>,
}

impl Queues {
    fn push(&mut self, item: Item) {
        match classify(&item.pattern) {
            // Literal checks go to the front of list 1 (cheapest checks
            // first); other checking patterns to the back (§4.B).
            Bucket::NeedCheckNoVars => {
                if matches!(item.pattern, Pattern::Lit(_)) {
                    self.q1.push_front(item);
                } else {
                    self.q1.push_back(item);
                }
            }
            Bucket::NeedCheckWithVars => self.q2.push_back(item),
            Bucket::NoCheckWithVars => self.q3.push_back(item),
        }
    }

    fn pop(&mut self) -> Option<Item> {
        self.q1.pop_front().or_else(|| self.q2.pop_front()).or_else(|| self.q3.pop_front())
    }
}

struct Compiler<'a> {
    variants: &'a HashMap<Ident, KDefVariant>,
    tag_memo: HashMap<Ident, Atom>,
    steps: Vec<Step>,
    guards: Vec<KExpr>,
    /// Sub-patterns derived by the item currently being processed; drained
    /// back into the worklists by the driver loop in `compile_case_steps`.
    pending: Vec<Item>,
    fresh: &'a mut dyn FnMut(&str) -> Ident,
}

impl Compiler<'_> {
    fn bind_temp(&mut self, prefix: &str, typ: KTyp, value: KExprKind, span: Span) -> Atom {
        let id = (self.fresh)(prefix);
        let value = KExpr { kind: value, typ: typ.clone(), span };
        self.steps.push(Step::Bind(KStmt::Val(KDefVal { id: id.clone(), typ, value, mutable: false, tempref: true, subarray: false, span })));
        Atom::Id(id)
    }

    fn tag_of(&mut self, scrutinee: &Atom, span: Span) -> Atom {
        if let Atom::Id(id) = scrutinee {
            if let Some(tag) = self.tag_memo.get(id) {
                return tag.clone();
            }
        }
        let tag = self.bind_temp("tag", KTyp::Int, KExprKind::Intrinsic(Intrinsic::VariantTag, vec![scrutinee.clone()]), span);
        if let Atom::Id(id) = scrutinee {
            self.tag_memo.insert(id.clone(), tag.clone());
        }
        tag
    }

    fn process(&mut self, item: Item, span: Span) {
        match item.pattern {
            Pattern::Any => {}
            Pattern::Ident(name) => {
                self.steps.push(Step::Bind(KStmt::Val(KDefVal {
                    id: name,
                    typ: item.typ,
                    value: KExpr { kind: KExprKind::Atom(item.atom), typ: KTyp::Void, span },
                    mutable: false,
                    tempref: false,
                    subarray: false,
                    span,
                })));
            }
            Pattern::Lit(lit) => {
                let check = KExpr {
                    kind: KExprKind::Binop(kc_core::ast::BinOp::Eq, item.atom, Atom::Lit(lit)),
                    typ: KTyp::Bool,
                    span,
                };
                self.steps.push(Step::Check(check));
            }
            Pattern::As(inner, name) => {
                self.steps.push(Step::Bind(KStmt::Val(KDefVal {
                    id: name,
                    typ: item.typ.clone(),
                    value: KExpr { kind: KExprKind::Atom(item.atom.clone()), typ: KTyp::Void, span },
                    mutable: false,
                    tempref: false,
                    subarray: false,
                    span,
                })));
                self.requeue(Item { pattern: *inner, typ: item.typ, atom: item.atom }, span);
            }
            Pattern::Ref(inner) => {
                let typ = item.typ.clone();
                let deref = self.bind_temp("deref", typ.clone(), KExprKind::Unop(kc_core::ast::UnOp::Deref, item.atom), span);
                self.requeue(Item { pattern: *inner, typ, atom: deref }, span);
            }
            Pattern::Typed(inner, typ) => {
                self.requeue(Item { pattern: *inner, typ, atom: item.atom }, span);
            }
            Pattern::When(inner, guard) => {
                self.requeue(Item { pattern: *inner, typ: item.typ, atom: item.atom }, span);
                // The guard references captured vars bound above; it is
                // appended once every structural check has run (§4.B).
                self.guards.push(*guard);
            }
            Pattern::Tuple(ps) => {
                for (i, p) in ps.into_iter().enumerate() {
                    let field_typ = match &item.typ {
                        KTyp::Tuple(ts) => ts.get(i).cloned().unwrap_or(KTyp::Err),
                        _ => KTyp::Err,
                    };
                    let field = self.bind_temp("t", field_typ.clone(), KExprKind::Mem(item.atom.clone(), i as u32), span);
                    self.requeue(Item { pattern: p, typ: field_typ, atom: field }, span);
                }
            }
            Pattern::Cons(head, tail) => {
                let not_nil = KExpr {
                    kind: KExprKind::Binop(kc_core::ast::BinOp::Ne, item.atom.clone(), Atom::Lit(kc_core::ast::Literal::Unit)),
                    typ: KTyp::Bool,
                    span,
                };
                self.steps.push(Step::Check(not_nil));
                let elt_typ = match &item.typ {
                    KTyp::List(t) => (**t).clone(),
                    _ => KTyp::Err,
                };
                let h = self.bind_temp("hd", elt_typ.clone(), KExprKind::Intrinsic(Intrinsic::ListHead, vec![item.atom.clone()]), span);
                let t = self.bind_temp("tl", item.typ.clone(), KExprKind::Intrinsic(Intrinsic::ListTail, vec![item.atom]), span);
                self.requeue(Item { pattern: *head, typ: elt_typ, atom: h }, span);
                self.requeue(Item { pattern: *tail, typ: item.typ, atom: t }, span);
            }
            Pattern::Variant(case_name, args) => {
                self.compile_variant_case(Some(case_name), args.into_iter().map(|p| (None, p)).collect(), item.typ, item.atom, span);
            }
            Pattern::Record(case, fields) => {
                if case.is_some() {
                    self.compile_variant_case(case, fields.into_iter().map(|(n, p)| (Some(n), p)).collect(), item.typ, item.atom, span);
                } else {
                    for (name, p) in fields {
                        let field_typ = match &item.typ {
                            KTyp::Record(rfs) => rfs.iter().find(|f| f.name == name).map(|f| f.typ.clone()).unwrap_or(KTyp::Err),
                            _ => KTyp::Err,
                        };
                        let field = self.bind_temp(&name, field_typ.clone(), KExprKind::Mem(item.atom.clone(), field_index(&item.typ, &name)), span);
                        self.requeue(Item { pattern: p, typ: field_typ, atom: field }, span);
                    }
                }
            }
        }
    }

    fn requeue(&mut self, item: Item, span: Span) {
        // Newly derived sub-patterns re-enter the same classify-and-queue
        // logic; since this compiler processes one item fully before
        // returning to `run`'s loop, we just process immediately — the
        // worklist discipline (checks before captures) is preserved because
        // `run` always pulls from `q1` before `q2`/`q3`, and anything this
        // call pushes goes through `Queues::push` before the next pop.
        self.pending.push(item);
        let _ = span;
    }

    fn compile_variant_case(&mut self, case: Option<Ident>, args: Vec<(Option<String>, Pattern)>, typ: KTyp, atom: Atom, span: Span) {
        let variant_id = match &typ {
            KTyp::Variant(id) | KTyp::Name(id) => Some(id.clone()),
            _ => None,
        };
        let def = variant_id.as_ref().and_then(|id| self.variants.get(id));
        // Mirrors `ctypegen::emit_variant`'s numbering exactly: a two-case
        // variant with one payload-free case represents its nil case as a
        // null pointer rather than a tagged case, so its other case starts
        // the tag enum at 1 instead of 0 (§4.F, §8 scenario 3).
        let nullable = def.map(|d| d.cases.len() == 2 && d.cases.iter().any(|c| c.payload.is_none())).unwrap_or(false);
        let multi_case = def.map(|d| d.cases.len() > 1).unwrap_or(true);
        if nullable {
            if let (Some(case_name), Some(def)) = (&case, def) {
                if let Some(case_def) = def.cases.iter().find(|c| c.name == *case_name) {
                    let op = if case_def.payload.is_some() { kc_core::ast::BinOp::Ne } else { kc_core::ast::BinOp::Eq };
                    let check = KExpr {
                        kind: KExprKind::Binop(op, atom.clone(), Atom::Lit(kc_core::ast::Literal::Unit)),
                        typ: KTyp::Bool,
                        span,
                    };
                    self.steps.push(Step::Check(check));
                }
            }
        } else if multi_case {
            if let (Some(case_name), Some(def)) = (&case, def) {
                if let Some((idx, _)) = def.cases.iter().enumerate().find(|(_, c)| c.name == *case_name) {
                    let tag = self.tag_of(&atom, span);
                    let check = KExpr {
                        kind: KExprKind::Binop(
                            kc_core::ast::BinOp::Eq,
                            tag,
                            Atom::Lit(kc_core::ast::Literal::Int(1 + idx as i64)),
                        ),
                        typ: KTyp::Bool,
                        span,
                    };
                    self.steps.push(Step::Check(check));
                }
            }
        }
        if args.is_empty() {
            return;
        }
        let payload = def
            .zip(case.as_ref())
            .and_then(|(d, c)| d.cases.iter().find(|k| k.name == *c))
            .and_then(|k| k.payload.clone())
            .unwrap_or(KTyp::Err);
        let payload_atom = self.bind_temp("payload", payload.clone(), KExprKind::Intrinsic(Intrinsic::VariantCase, vec![atom]), span);
        if args.len() == 1 {
            self.pending.push(Item { pattern: args.into_iter().next().unwrap().1, typ: payload, atom: payload_atom });
        } else {
            for (i, (_, p)) in args.into_iter().enumerate() {
                let field_typ = match &payload {
                    KTyp::Tuple(ts) => ts.get(i).cloned().unwrap_or(KTyp::Err),
                    _ => KTyp::Err,
                };
                let field = self.bind_temp("arg", field_typ.clone(), KExprKind::Mem(payload_atom.clone(), i as u32), span);
                self.pending.push(Item { pattern: p, typ: field_typ, atom: field });
            }
        }
    }
}

fn field_index(typ: &KTyp, name: &str) -> u32 {
    if let KTyp::Record(fields) = typ {
        fields.iter().position(|f| f.name == name).unwrap_or(0) as u32
    } else {
        0
    }
}

/// Fold a case's steps (and trailing guards) around its body, innermost
/// step last, producing the nested let/if expression for one case.
fn assemble_case(steps: Vec<Step>, guards: Vec<KExpr>, body: KExpr, fail: KExpr, fresh: &mut dyn FnMut(&str) -> Ident) -> KExpr {
    let span = body.span;
    let mut current = body;
    for guard in guards.into_iter().rev() {
        let cond_id = fresh("guard_ok");
        let cond_typ = guard.typ.clone();
        current = KExpr {
            kind: KExprKind::Block(
                vec![KStmt::Val(KDefVal { id: cond_id.clone(), typ: cond_typ, value: guard, mutable: false, tempref: true, subarray: false, span })],
                Box::new(KExpr { kind: KExprKind::If(Atom::Id(cond_id), Box::new(current), Box::new(fail.clone())), typ: fail.typ.clone(), span }),
            ),
            typ: fail.typ.clone(),
            span,
        };
    }
    for step in steps.into_iter().rev() {
        current = match step {
            Step::Bind(stmt) => KExpr { kind: KExprKind::Block(vec![stmt], Box::new(current)), typ: fail.typ.clone(), span },
            Step::Check(check) => {
                let cond_id = fresh("chk");
                let cond_typ = check.typ.clone();
                KExpr {
                    kind: KExprKind::Block(
                        vec![KStmt::Val(KDefVal { id: cond_id.clone(), typ: cond_typ, value: check, mutable: false, tempref: true, subarray: false, span })],
                        Box::new(KExpr {
                            kind: KExprKind::If(Atom::Id(cond_id), Box::new(current), Box::new(fail.clone())),
                            typ: fail.typ.clone(),
                            span,
                        }),
                    ),
                    typ: fail.typ.clone(),
                    span,
                }
            }
        };
    }
    current
}

/// Compile one case's pattern into its check/bind step sequence.
fn compile_case_steps(
    pattern: Pattern,
    scrutinee_typ: KTyp,
    scrutinee: Atom,
    variants: &HashMap<Ident, KDefVariant>,
    span: Span,
    fresh: &mut dyn FnMut(&str) -> Ident,
) -> (Vec<Step>, Vec<KExpr>) {
    let mut c = Compiler { variants, tag_memo: HashMap::new(), steps: Vec::new(), guards: Vec::new(), pending: Vec::new(), fresh };
    let mut pending = vec![Item { pattern, typ: scrutinee_typ, atom: scrutinee }];
    let mut queues = Queues { q1: Default::default(), q2: Default::default(), q3: Default::default() };
    loop {
        for item in pending.drain(..) {
            queues.push(item);
        }
        let Some(item) = queues.pop() else { break };
        c.pending = Vec::new();
        c.process(item, span);
        pending = std::mem::take(&mut c.pending);
    }
    (c.steps, c.guards)
}

/// Compile a full match expression: scrutinee + ordered cases + mode, into
/// a right-associated if-chain that evaluates the first matching case's
/// body, falling through to `NoMatchError` (or a rethrow in catch-mode).
///
/// Any case that follows a case with no checks and no guard at all (an
/// unconditional catch-all) can never run; per §4.B's tie-break rule this
/// is flagged as a compile error on the unreachable case rather than
/// silently dropped.
pub fn compile_match(
    scrutinee: Atom,
    scrutinee_typ: KTyp,
    cases: Vec<Case>,
    mode: MatchMode,
    result_typ: KTyp,
    variants: &HashMap<Ident, KDefVariant>,
    diags: &mut Diagnostics,
    fresh: &mut dyn FnMut(&str) -> Ident,
) -> KExpr {
    let fail_span = cases.last().map(|c| c.span).unwrap_or_default_span();
    let fail = KExpr {
        kind: match mode {
            MatchMode::Normal => KExprKind::Throw(Atom::Id(fresh("NoMatchError"))),
            MatchMode::Catch => KExprKind::Intrinsic(Intrinsic::PopExn, vec![]),
        },
        typ: result_typ.clone(),
        span: fail_span,
    };

    let mut compiled = Vec::with_capacity(cases.len());
    let mut catchall_seen = false;
    for case in cases {
        if catchall_seen {
            diags.error(case.span, "unreachable match case: a preceding case already matches everything");
        }
        let span = case.span;
        let (steps, guards) = compile_case_steps(case.pattern, scrutinee_typ.clone(), scrutinee.clone(), variants, span, fresh);
        if steps.is_empty() && guards.is_empty() {
            catchall_seen = true;
        }
        compiled.push((steps, guards, case.body));
    }

    let mut chain = fail;
    for (steps, guards, body) in compiled.into_iter().rev() {
        chain = assemble_case(steps, guards, body, chain, fresh);
    }
    chain
}

trait SpanDefaultExt {
    fn unwrap_or_default_span(self) -> Span;
}
impl SpanDefaultExt for Option<Span> {
    fn unwrap_or_default_span(self) -> Span {
        self.unwrap_or_else(Span::synthetic)
    }
}

/// Materializes one `for`/`map` clause's pattern-unpack inside the loop
/// body, per §4.C: "the pattern is unpacked inside the loop body as
/// `val pat = i`". This reuses the same irrefutable-pattern binding path as
/// `pat_simple_unpack` (see `crate::knorm::unpack`), not the full
/// checking match compiler above — comprehension binders are required to
/// be irrefutable.
pub fn unpack_clause_binder(_clause: &KClauseStage) {
    // Intentionally delegated to `crate::knorm::unpack::pat_simple_unpack`;
    // kept here only as a doc anchor for where the two algorithms meet.
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_core::ast::Literal;
    use kc_core::symbol::SymId;

    fn mk_fresh() -> impl FnMut(&str) -> Ident {
        let mut n = 0u32;
        move |prefix: &str| {
            n += 1;
            Ident::temp(prefix, SymId::from_raw(1000 + n))
        }
    }

    #[test]
    fn literal_case_compiles_to_if_chain() {
        let mut fresh = mk_fresh();
        let scrutinee = Atom::Id(Ident::val("x", SymId::from_raw(0)));
        let cases = vec![
            Case {
                pattern: Pattern::Lit(Literal::Int(0)),
                body: KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Int(100))), typ: KTyp::Int, span: Span::synthetic() },
                span: Span::synthetic(),
            },
            Case {
                pattern: Pattern::Any,
                body: KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Int(0))), typ: KTyp::Int, span: Span::synthetic() },
                span: Span::synthetic(),
            },
        ];
        let variants = HashMap::new();
        let mut diags = Diagnostics::default();
        let result = compile_match(scrutinee, KTyp::Int, cases, MatchMode::Normal, KTyp::Int, &variants, &mut diags, &mut fresh);
        assert!(matches!(result.kind, KExprKind::Block(..)));
        assert!(diags.is_empty());
    }

    #[test]
    fn case_after_catchall_is_flagged_unreachable() {
        let mut fresh = mk_fresh();
        let scrutinee = Atom::Id(Ident::val("x", SymId::from_raw(0)));
        let body = |n: i64| KExpr { kind: KExprKind::Atom(Atom::Lit(Literal::Int(n))), typ: KTyp::Int, span: Span::synthetic() };
        let cases = vec![
            Case { pattern: Pattern::Any, body: body(0), span: Span::synthetic() },
            Case { pattern: Pattern::Lit(Literal::Int(1)), body: body(1), span: Span::synthetic() },
        ];
        let variants = HashMap::new();
        let mut diags = Diagnostics::default();
        let _ = compile_match(scrutinee, KTyp::Int, cases, MatchMode::Normal, KTyp::Int, &variants, &mut diags, &mut fresh);
        assert!(!diags.is_empty());
    }
}
