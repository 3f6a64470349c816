//! The C-form consumer (§4.H).
//!
//! Emitting real C source is out of scope (§9 Non-goals); [`stub`] stands in
//! for that backend so a `CModule` still has somewhere to go, the way a
//! frontend's driver would hand it to a real code generator next.

pub mod stub;
