//! Error capture: copying librrd's thread-local error into a caller-owned buffer.
//!
//! librrd keeps one error slot per thread. Another call on the same thread
//! can overwrite it before a foreign caller gets around to reading it, so the
//! message is duplicated immediately after each forwarded call. The copy is a
//! C-allocator buffer owned by [`ErrorMessage`]: Rust callers drop it, foreign
//! callers receive it through [`ErrorMessage::into_raw`] and release it with
//! [`rrdshim_error_free`](crate::ffi::rrdshim_error_free).

use std::borrow::Cow;
use std::ffi::{CStr, c_char};
use std::fmt;
use std::ptr::NonNull;

use crate::library::RrdLibrary;

/// A caller-owned copy of a librrd error message.
///
/// Released exactly once: on drop, or by whoever receives the pointer from
/// [`into_raw`](Self::into_raw).
pub struct ErrorMessage {
    ptr: NonNull<c_char>,
}

// SAFETY: the buffer is uniquely owned and never aliased; moving ownership
// to another thread and freeing it there is fine for the C allocator.
unsafe impl Send for ErrorMessage {}

impl ErrorMessage {
    /// Takes ownership of a buffer produced by [`into_raw`](Self::into_raw)
    /// or by [`RrdLibrary::duplicate_error`]. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a NUL-terminated buffer allocated with the C
    /// allocator that nothing else will free.
    pub unsafe fn from_raw(ptr: *mut c_char) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Hands the buffer to the caller, who becomes responsible for freeing
    /// it with `free` (or `rrdshim_error_free`).
    pub fn into_raw(self) -> *mut c_char {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// The message as a C string.
    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the buffer is a NUL-terminated copy owned by self.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    /// The message decoded as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.as_c_str().to_string_lossy()
    }
}

impl Drop for ErrorMessage {
    fn drop(&mut self) {
        // SAFETY: the buffer came from the C allocator and is owned by self.
        unsafe { libc::free(self.ptr.as_ptr().cast()) }
    }
}

impl fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorMessage").field(&self.as_c_str()).finish()
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Captures this thread's librrd error, if any.
///
/// Returns `None` when the error flag is clear. Aborts the process if the
/// message cannot be duplicated: there is no way to report running out of
/// memory while already reporting an error.
pub fn capture_error<L: RrdLibrary + ?Sized>(lib: &L) -> Option<ErrorMessage> {
    if !lib.test_error() {
        return None;
    }

    let raw = lib.get_error();
    let message = if raw.is_null() {
        c""
    } else {
        // SAFETY: librrd returns a NUL-terminated thread-local buffer that
        // stays valid until the next library call on this thread; it is
        // copied below before any such call.
        unsafe { CStr::from_ptr(raw) }
    };

    match NonNull::new(lib.duplicate_error(message)) {
        Some(ptr) => Some(ErrorMessage { ptr }),
        None => std::process::abort(),
    }
}
