//! Crash point injection for testing durability
//!
//! When `PBCONTAINER_CRASH_POINT` names one of the points below, the process
//! terminates via `std::process::abort()` the moment execution reaches it:
//! no cleanup, no unwinding, no scoped deleters running.
//!
//! # Usage
//!
//! ```bash
//! PBCONTAINER_CRASH_POINT=atomic_before_rename ./your-service
//! ```

use std::sync::OnceLock;

/// Environment variable holding the crash point name
pub const CRASH_POINT_ENV: &str = "PBCONTAINER_CRASH_POINT";

/// Cache the crash point name to avoid repeated env var lookups
static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if `PBCONTAINER_CRASH_POINT` equals `name`.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        tracing::error!(target: "pbcontainer", point = name, "triggering crash point");
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    /// Temp file exists, nothing written yet
    pub const ATOMIC_AFTER_TEMP_CREATE: &str = "atomic_after_temp_create";
    /// Temp file written, not yet synced or closed
    pub const ATOMIC_AFTER_WRITE: &str = "atomic_after_write";
    /// Temp file complete and closed, target not yet replaced
    pub const ATOMIC_BEFORE_RENAME: &str = "atomic_before_rename";
    /// Target replaced, directory not yet synced
    pub const ATOMIC_AFTER_RENAME: &str = "atomic_after_rename";

    /// Get all crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            ATOMIC_AFTER_TEMP_CREATE,
            ATOMIC_AFTER_WRITE,
            ATOMIC_BEFORE_RENAME,
            ATOMIC_AFTER_RENAME,
        ]
    }
}
