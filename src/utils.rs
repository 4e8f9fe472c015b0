//! Utility functions

use std::path::PathBuf;

use crate::model::parse_iso_duration;

/// File name of the local liked songs snapshot
pub const LIKED_SONGS_FILE: &str = "liked_songs.json";

// ============================================================================
// Paths
// ============================================================================

/// Get the base data directory for melody-stream
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("melody-stream")
}

// ============================================================================
// Time Formatting
// ============================================================================

/// Format an encoded `PT#H#M#S` duration as `M:SS`
///
/// Hours are folded into minutes (`PT1H2M3S` is `62:03`); anything that
/// doesn't parse shows as `0:00`.
pub fn format_duration(encoded: &str) -> String {
    match parse_iso_duration(encoded) {
        Some(duration) => format_time(duration.as_secs_f64()),
        None => "0:00".to_string(),
    }
}

/// Format a playback position in seconds as `M:SS`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
