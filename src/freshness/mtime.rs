//! Mtime helpers.
//!
//! Plain `depend_on` dependencies are checked by mtime only; everything else
//! goes through a content digest.

use std::time::SystemTime;

/// Check if `live` is newer than the `recorded` mtime
///
/// Comparison is done at whole-second granularity so that a round trip
/// through a serializer or a coarse file system never reads as a change.
pub fn is_newer(live: SystemTime, recorded: SystemTime) -> bool {
    secs(live) > secs(recorded)
}

/// Seconds since the unix epoch (0 for pre-epoch times).
pub fn secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
