//! Stack growth guard for recursive lowering.
//!
//! Constant expressions and constant aggregates in the source IR nest
//! arbitrarily: a `getelementptr` over a `bitcast` over another constant
//! expression is lowered by recursing into each operand. Wrapping each level
//! in [`ensure_sufficient_stack`] keeps pathological nesting from overflowing
//! the native stack.
//!
//! On native targets the guard is `stacker::maybe_grow`; on `wasm32` it is a
//! plain call.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone remains.
///
/// Used around every recursive step of constant lowering, so depth is
/// bounded by heap memory rather than the thread's initial stack.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Passthrough on `wasm32`, where the host manages the stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
