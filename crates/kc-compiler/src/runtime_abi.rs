//! The runtime ABI surface (§6), expressed as a fixed set of name constants
//! and name builders rather than a code generator.
//!
//! A full backend would emit calls against these macros and runtime
//! functions directly; here they exist so [`crate::ctypegen`] and
//! [`crate::codegen::stub`] reference the exact same strings a real backend
//! would, without this crate owning (or inventing) the C runtime itself.

/// Boxed string representation.
pub const FX_STR_T: &str = "fx_str_t";
/// Dynamic array representation.
pub const FX_ARR_T: &str = "fx_arr_t";
/// Boxed exception value representation.
pub const FX_EXN_T: &str = "fx_exn_t";
/// Opaque closure-capture / foreign pointer representation.
pub const FX_CPTR_T: &str = "fx_cptr_t";
/// The refcount field type every heap-allocated shape's header starts with.
pub const FX_RC_T: &str = "fx_rc_t";

/// No-op destructor/copy macro for scalar and pointer-shaped fields.
pub const FX_NOP: &str = "FX_NOP";
/// `memcpy`-equivalent copy macro for scalar fields.
pub const FX_COPY_SIMPLE: &str = "FX_COPY_SIMPLE";
/// Frees one struct/union field by its own type's destructor or macro.
pub const FX_FREE_FIELD: &str = "FX_FREE_FIELD";
/// Increments a heap block's refcount.
pub const FX_INCREF: &str = "FX_INCREF";
/// Decrements a heap block's refcount, freeing it at zero.
pub const FX_DECREF: &str = "FX_DECREF";
/// Frees whichever union arm a recursive variant's tag selects.
pub const FX_FREE_VARIANT_PAYLOAD: &str = "FX_FREE_VARIANT_PAYLOAD";
/// Copies every field of a struct/union shape via each field's own copy path.
pub const FX_COPY_FIELDS: &str = "FX_COPY_FIELDS";
/// Fills a freshly allocated struct's fields from a constructor's arguments.
pub const FX_FILL_FIELDS: &str = "FX_FILL_FIELDS";

/// The runtime allocator.
pub const FX_MALLOC: &str = "fx_malloc";
/// The runtime deallocator (paired with `fx_malloc`, not `FX_DECREF`, for
/// blocks with no refcount header — e.g. a recursive variant's own destructor
/// calls this once its refcount reaches zero).
pub const FX_FREE: &str = "fx_free";

/// Wraps a call so a thrown exception is recorded on the ambient exception
/// slot instead of propagating through the C call stack (§4.C "Exceptions").
pub const FX_CALL: &str = "FX_CALL";
/// Checks the ambient exception slot after a `FX_CALL` and returns early if
/// it is set, continuing the rethrow up the native call stack.
pub const FX_CHECK_EXN: &str = "FX_CHECK_EXN";
/// Bounds-checks an index before it is used (§4.C "Index").
pub const FX_CHKIDX: &str = "FX_CHKIDX";
/// Reads one axis's extent out of an `fx_arr_t` header.
pub const FX_ARR_SIZE: &str = "FX_ARR_SIZE";

/// The `N`-dimensional raw-pointer-indexing macro name for a given rank.
pub fn fx_ptr_nd(rank: u32) -> String {
    format!("FX_PTR_{rank}D")
}

/// The destructor function name the mangler/ctypegen synthesize for a type
/// or variant id's mangled name.
pub fn free_fn_name(mangled: &str) -> String {
    format!("_fx_free_{mangled}")
}

/// The copy-function name for a tuple/record/list/ref shape's mangled name.
pub fn copy_fn_name(mangled: &str) -> String {
    format!("_fx_copy_{mangled}")
}

/// The constructor function name for a complex type's mangled name.
pub fn make_fn_name(mangled: &str) -> String {
    format!("_fx_make_{mangled}")
}

/// Throws a fresh exception value, used for the `NoMatchError` fallthrough
/// a non-exhaustive `match` compiles to (§4.B).
pub const FX_THROW: &str = "FX_THROW";
/// Re-raises the exception currently being unwound, used for `try`'s
/// fallthrough when no `catch` case matches (§4.B, §4.C).
pub const FX_RETHROW: &str = "FX_RETHROW";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptr_nd_macro_name_includes_rank() {
        assert_eq!(fx_ptr_nd(2), "FX_PTR_2D");
    }

    #[test]
    fn satellite_names_are_prefixed_consistently() {
        assert_eq!(free_fn_name("Ti2fS"), "_fx_free_Ti2fS");
        assert_eq!(copy_fn_name("Ti2fS"), "_fx_copy_Ti2fS");
        assert_eq!(make_fn_name("Ti2fS"), "_fx_make_Ti2fS");
    }
}
