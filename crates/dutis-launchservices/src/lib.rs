//! The system [`Registry`](dutis_core::Registry) backed by Launch Services.
//!
//! On macOS every call goes straight to the CoreServices framework. On
//! other platforms the same type exists but every call is rejected with
//! `unimpErr`, so the rest of the tool still builds and reports a clean
//! error.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::LaunchServices;

#[cfg(not(target_os = "macos"))]
mod unsupported;
#[cfg(not(target_os = "macos"))]
pub use unsupported::LaunchServices;

/// Whether this build can talk to a real registry.
pub const fn is_supported() -> bool {
    cfg!(target_os = "macos")
}
