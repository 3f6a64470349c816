//! Name mangler & type signature encoder (§4.E).
//!
//! Two things happen together in one module pass:
//!
//! 1. Every anonymous structural type (`Tuple`/`List`/`Ref`/`Fun`, not
//!    `Record` — see `KTyp::is_structural_anonymous`) reachable from a def's
//!    declared type gets materialized into a fresh `KDefTyp`, memoized by
//!    its structural signature so two occurrences of the same shape share
//!    one materialized type.
//! 2. Every global (`KDefVal`/`KDefFun`/`KDefTyp`/`KDefVariant`/`KDefExn`,
//!    including the ones just materialized) gets a unique, C-compatible
//!    name recorded in the returned mangle map — this crate never mutates
//!    an `Ident`'s descriptive prefix in place, since two `Ident`s are
//!    already equal/hashable purely by their integer id (`kc_core::symbol`).

use std::collections::HashMap;

use indexmap::IndexSet;
use kc_core::kform::{KDef, KDefTyp, KModule};
use kc_core::ktyp::{KTyp, RecordField};
use kc_core::span::Span;
use kc_core::symbol::{Ident, SymId};
use kc_core::utils::to_pascal_case;
use kc_core::CompileError;

/// Names known to the runtime ABI rather than assigned by this pass (§4.E
/// point 5: "Standard exceptions get `FX_EXN_<name>`").
const STANDARD_EXCEPTIONS: &[&str] = &["NoMatchError", "RangeError", "DivByZeroError", "NullPtrError", "OutOfMemError"];

/// Maps every mangled `Ident` to its final C name, in assignment order —
/// an `IndexMap` rather than a `HashMap` so a caller iterating the whole
/// map (a diagnostics dump, a future linker-symbol listing) sees a
/// deterministic order, matching §5's "every mangled name ... is a pure
/// function of the input AST" — every id-keyed map in this codebase that
/// a caller might iterate wholesale (rule tables, def-id tables) uses
/// `IndexMap` for the same reason: insertion order doubles as definition
/// order.
pub type MangleMap = indexmap::IndexMap<Ident, String>;

pub struct Mangler {
    used_names: IndexSet<String>,
    sig_memo: HashMap<String, Ident>,
    map: MangleMap,
    next_id: u32,
}

impl Mangler {
    pub fn new(next_id_start: u32) -> Self {
        Self { used_names: IndexSet::new(), sig_memo: HashMap::new(), map: MangleMap::new(), next_id: next_id_start }
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn into_map(self) -> MangleMap {
        self.map
    }

    pub fn map(&self) -> &MangleMap {
        &self.map
    }

    /// Mangles every global in `module`, appending any freshly materialized
    /// structural types to `module.defs`.
    ///
    /// Returns `Err` if a zero-element tuple type reaches mangling — an
    /// empty tuple carries no runtime representation distinct from `void`
    /// and a type-checked AST should never produce one, so seeing one here
    /// is an internal-invariant violation rather than a user-facing error
    /// (§8 boundary behaviors).
    pub fn mangle_module(&mut self, module: &mut KModule) -> Result<(), CompileError> {
        // The module namespace segment is normalized to PascalCase
        // regardless of how it was declared, so two modules differing
        // only in casing can't collide after mangling.
        let prefix = if module.name.prefix() == "Builtins" { String::new() } else { to_pascal_case(module.name.prefix()) };

        let mut new_defs = Vec::new();
        for def in module.defs.iter_mut() {
            match def {
                KDef::Val(v) => v.typ = self.materialize_typ(&v.typ, &mut new_defs)?,
                KDef::Fun(f) => {
                    for (_, t) in f.args.iter_mut() {
                        *t = self.materialize_typ(t, &mut new_defs)?;
                    }
                    f.ret_typ = self.materialize_typ(&f.ret_typ, &mut new_defs)?;
                }
                KDef::Typ(t) => t.typ = self.materialize_typ(&t.typ, &mut new_defs)?,
                KDef::Variant(v) => {
                    for case in v.cases.iter_mut() {
                        if let Some(p) = case.payload.take() {
                            case.payload = Some(self.materialize_typ(&p, &mut new_defs)?);
                        }
                    }
                }
                KDef::Exn(e) => {
                    if let Some(p) = e.payload.take() {
                        e.payload = Some(self.materialize_typ(&p, &mut new_defs)?);
                    }
                }
            }
        }
        module.defs.extend(new_defs);

        for def in &module.defs {
            let id = def.id();
            if self.map.contains_key(id) {
                continue;
            }
            let name = self.mangle_one(&prefix, id);
            self.map.insert(id.clone(), name);
        }
        Ok(())
    }

    fn mangle_one(&mut self, prefix: &str, id: &Ident) -> String {
        if STANDARD_EXCEPTIONS.contains(&id.prefix()) {
            return format!("FX_EXN_{}", id.prefix());
        }
        let raw = self.unique_mangled(prefix, id.prefix());
        let compressed = compress_prefix(&raw, prefix);
        format!("_fx_{compressed}")
    }

    fn unique_mangled(&mut self, prefix: &str, name: &str) -> String {
        let mut counter = 0u32;
        loop {
            let candidate = build_candidate(prefix, name, counter);
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Recursively replaces anonymous `Tuple`/`List`/`Ref`/`Fun` shapes with
    /// `Name` references to a materialized `KDefTyp`, memoized by
    /// structural signature. `Record`/`Array`/`Variant`/`Name`/primitives
    /// pass through unchanged at the top level (though `Record`'s own field
    /// types, and `Array`'s element type, still get recursively processed).
    fn materialize_typ(&mut self, t: &KTyp, new_defs: &mut Vec<KDef>) -> Result<KTyp, CompileError> {
        match t {
            KTyp::Tuple(ts) => {
                if ts.is_empty() {
                    return Err(CompileError::Internal { span: None, invariant: "zero-element tuple reached mangling".to_string() });
                }
                let ts2: Vec<KTyp> = ts.iter().map(|x| self.materialize_typ(x, new_defs)).collect::<Result<_, _>>()?;
                self.materialize_shape(KTyp::Tuple(ts2), new_defs)
            }
            KTyp::List(inner) => {
                let inner2 = self.materialize_typ(inner, new_defs)?;
                self.materialize_shape(KTyp::List(Box::new(inner2)), new_defs)
            }
            KTyp::Ref(inner) => {
                let inner2 = self.materialize_typ(inner, new_defs)?;
                self.materialize_shape(KTyp::Ref(Box::new(inner2)), new_defs)
            }
            KTyp::Fun(ret, args) => {
                let ret2 = self.materialize_typ(ret, new_defs)?;
                let args2: Vec<KTyp> = args.iter().map(|a| self.materialize_typ(a, new_defs)).collect::<Result<_, _>>()?;
                self.materialize_shape(KTyp::Fun(Box::new(ret2), args2), new_defs)
            }
            KTyp::Array(inner, n) => Ok(KTyp::Array(Box::new(self.materialize_typ(inner, new_defs)?), *n)),
            KTyp::Record(fields) => {
                let fields2 = fields
                    .iter()
                    .map(|f| Ok(RecordField { name: f.name.clone(), typ: self.materialize_typ(&f.typ, new_defs)?, default: f.default.clone() }))
                    .collect::<Result<_, CompileError>>()?;
                Ok(KTyp::Record(fields2))
            }
            _ => Ok(t.clone()),
        }
    }

    fn materialize_shape(&mut self, shape: KTyp, new_defs: &mut Vec<KDef>) -> Result<KTyp, CompileError> {
        let sig = encode_type(&shape);
        if let Some(id) = self.sig_memo.get(&sig) {
            return Ok(KTyp::Name(id.id()));
        }
        self.next_id += 1;
        // The materialized type's own name *is* its structural signature
        // (§4.E point 6: "kt_name is generated once per distinct
        // signature"), so `mangle_one` folds the signature into the final
        // `_fx_`-prefixed name instead of every anonymous type colliding on
        // a literal placeholder.
        let fresh = Ident::val(sig.as_str(), SymId::from_raw(self.next_id));
        new_defs.push(KDef::Typ(KDefTyp { id: fresh.clone(), typ: shape, span: Span::synthetic() }));
        self.sig_memo.insert(sig, fresh.clone());
        Ok(KTyp::Name(fresh.id()))
    }
}

/// `<prefix><nameLen><name>` on the first try; each retry wraps `name` with
/// an incrementing `<n>_` decoration and recomputes the length, since the
/// length prefix must match the actual encoded byte count (§4.E point 3).
fn build_candidate(prefix: &str, name: &str, counter: u32) -> String {
    if counter == 0 {
        format!("{prefix}{}{name}", name.len())
    } else {
        let decorated = format!("{counter}_{name}");
        format!("{prefix}{}{decorated}", decorated.len())
    }
}

/// Collapses the second and later occurrences of the module prefix inside a
/// mangled name into a length marker (§4.E point 4).
fn compress_prefix(name: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return name.to_string();
    }
    let Some(first) = name.find(prefix) else { return name.to_string() };
    let rest_start = first + prefix.len();
    let Some(second_rel) = name[rest_start..].find(prefix) else { return name.to_string() };
    let second = rest_start + second_rel;
    let marker = format!("N{}", prefix.len());
    format!("{}{}{}", &name[..second], marker, &name[second + prefix.len()..])
}

/// Structural-to-string signature encoding (§4.E point 2). `Name`/`Variant`
/// references encode by their stable integer id rather than a resolved
/// name string — generics are already instantiated by the time K-form
/// exists (§6), so no live type parameter ever needs re-encoding here.
fn encode_type(t: &KTyp) -> String {
    match t {
        KTyp::Void => "v".to_string(),
        KTyp::Bool => "B".to_string(),
        KTyp::Int => "i".to_string(),
        KTyp::Int8 => "c".to_string(),
        KTyp::Int16 => "s".to_string(),
        KTyp::Int32 => "n".to_string(),
        KTyp::Int64 => "l".to_string(),
        KTyp::UInt8 => "b".to_string(),
        KTyp::UInt16 => "w".to_string(),
        KTyp::UInt32 => "u".to_string(),
        KTyp::UInt64 => "q".to_string(),
        KTyp::Float16 => "h".to_string(),
        KTyp::Float32 => "f".to_string(),
        KTyp::Float64 => "d".to_string(),
        KTyp::Char => "C".to_string(),
        KTyp::String => "S".to_string(),
        KTyp::CPtr => "p".to_string(),
        KTyp::Exn => "E".to_string(),
        KTyp::Tuple(ts) => {
            if ts.len() > 1 && ts.iter().all(|x| x == &ts[0]) {
                format!("Ta{}{}", ts.len(), encode_type(&ts[0]))
            } else {
                format!("T{}{}", ts.len(), ts.iter().map(encode_type).collect::<String>())
            }
        }
        KTyp::Record(fs) => format!("R{}{}", fs.len(), fs.iter().map(|f| encode_type(&f.typ)).collect::<String>()),
        KTyp::Variant(id) => format!("V{}", id.as_u32()),
        KTyp::List(inner) => format!("L{}", encode_type(inner)),
        KTyp::Ref(inner) => format!("r{}", encode_type(inner)),
        KTyp::Array(inner, n) => format!("A{n}{}", encode_type(inner)),
        KTyp::Fun(ret, args) => format!("FP{}{}{}", encode_type(ret), args.len(), args.iter().map(encode_type).collect::<String>()),
        KTyp::Name(id) => format!("N{}", id.as_u32()),
        KTyp::Err => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_core::kform::{ClosureInfo, KDefFun};
    use kc_core::span::Span;

    #[test]
    fn repeated_tuple_shape_materializes_once() {
        let mut m = Mangler::new(100);
        let mut defs = Vec::new();
        let a = m.materialize_typ(&KTyp::Tuple(vec![KTyp::Int, KTyp::Bool]), &mut defs).unwrap();
        let b = m.materialize_typ(&KTyp::Tuple(vec![KTyp::Int, KTyp::Bool]), &mut defs).unwrap();
        assert_eq!(a, b);
        assert_eq!(defs.len(), 1);
    }

    #[test]
    fn distinct_shapes_get_distinct_names() {
        let mut m = Mangler::new(100);
        let mut defs = Vec::new();
        let a = m.materialize_typ(&KTyp::Tuple(vec![KTyp::Int, KTyp::Bool]), &mut defs).unwrap();
        let b = m.materialize_typ(&KTyp::Tuple(vec![KTyp::Bool, KTyp::Int]), &mut defs).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn zero_element_tuple_is_rejected() {
        let mut m = Mangler::new(100);
        let mut defs = Vec::new();
        let err = m.materialize_typ(&KTyp::Tuple(vec![]), &mut defs).unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }

    #[test]
    fn colliding_names_get_suffixed() {
        let mut m = Mangler::new(0);
        let first = m.unique_mangled("Mod__", "foo");
        let second = m.unique_mangled("Mod__", "foo");
        assert_ne!(first, second);
    }

    #[test]
    fn materialized_type_name_reflects_its_signature() {
        let mut m = Mangler::new(0);
        let mut defs = Vec::new();
        let materialized = m.materialize_typ(&KTyp::Tuple(vec![KTyp::Int, KTyp::Float64, KTyp::String]), &mut defs).unwrap();
        let KTyp::Name(id) = materialized else { panic!("expected a materialized Name reference") };
        let KDef::Typ(def) = &defs[0] else { panic!("expected a KDefTyp") };
        assert_eq!(def.id.id(), Some(id));
        let mangled = m.mangle_one("", &def.id);
        assert!(mangled.starts_with("_fx_"));
        assert!(mangled.contains(&encode_type(&KTyp::Tuple(vec![KTyp::Int, KTyp::Float64, KTyp::String]))));
    }

    #[test]
    fn standard_exception_bypasses_prefix() {
        let mut m = Mangler::new(0);
        let id = Ident::val("NoMatchError", SymId::from_raw(1));
        assert_eq!(m.mangle_one("Mod__", &id), "FX_EXN_NoMatchError");
    }

    #[test]
    fn every_global_gets_a_name() {
        let mut m = Mangler::new(0);
        let span = Span::synthetic();
        let f = KDefFun {
            id: Ident::val("foo", SymId::from_raw(1)),
            args: vec![],
            ret_typ: KTyp::Int,
            body: kc_core::kform::KExpr { kind: kc_core::kform::KExprKind::Atom(kc_core::kform::Atom::Lit(kc_core::ast::Literal::Int(0))), typ: KTyp::Int, span },
            flags: kc_core::ast::FunFlags::empty(),
            closure: ClosureInfo::default(),
            span,
        };
        let mut module = KModule { name: Ident::val("Mod", SymId::from_raw(0)), defs: vec![KDef::Fun(f)], span };
        m.mangle_module(&mut module).unwrap();
        assert_eq!(m.map().len(), 1);
    }
}
