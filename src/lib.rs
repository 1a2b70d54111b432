pub mod nav;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message every 100 navigation ticks when the perf_stats feature is enabled.
///
/// `$clock` is anything with a `ticks()` method, normally the [`nav::NavClock`]
/// resource. Without perf_stats this expands to an empty block and the
/// arguments are never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(clock, "Active path has {} nodes", path.len());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($clock:expr, $($arg:tt)*) => {
        if $clock.ticks() % 100 == 0 {
            bevy::prelude::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($clock:expr, $($arg:tt)*) => {};
}
