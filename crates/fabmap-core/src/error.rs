// ── Core error types ──
//
// Run-level errors only. Anything that goes wrong with a single device
// is a `DeviceFailure` in the result, not an error here.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Run control ──────────────────────────────────────────────────
    #[error("Discovery cancelled; partial results discarded")]
    Cancelled,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    /// A graph referenced a device that is absent or has the wrong role.
    #[error("Invalid topology graph: {reason}")]
    InvalidGraph { reason: String },
}
