//! Shared data model for the kc middle-end: symbol tables, the AST the type
//! checker hands us, K-form, C-form, and the diagnostics types every pass
//! reports through.
//!
//! - `symbol` — the three append-only, id-indexed symbol tables (§4.A)
//! - `ast` — the type-checked input AST (§3 "AST (input)")
//! - `ktyp` / `kform` — the let-normalized intermediate representation (§3 "K-form")
//! - `cform` — the statement-oriented output representation (§3 "C-form")
//! - `span` — source locations and the diagnostics accumulator (§6, §7)
//! - `error` — the fatal `CompileError` taxonomy (§7)
//! - `visit` — generic traversal/fold scaffolding shared by every pass (§4.A, §9)

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod cform;
pub mod error;
pub mod kform;
pub mod ktyp;
pub mod span;
pub mod symbol;
pub mod utils;
pub mod visit;

pub use error::CompileError;
pub use span::{Diagnostic, Diagnostics, Severity, Span};
pub use symbol::{AstId, CId, Ident, IdTable, KId};
