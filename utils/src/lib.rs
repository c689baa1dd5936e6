// Shared plumbing for the selection-monitor binaries.
//
// Keeping this in its own crate lets the cache rendezvous and the fd/pipe
// helpers be unit-tested without a display server.

pub mod cache;
pub mod io;
pub mod paths;
pub mod term;

/// Wall-clock seconds since the epoch. Seeds the sequence counter so that
/// successive monitor runs keep publishing increasing values.
pub fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
