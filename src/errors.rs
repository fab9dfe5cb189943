//! Error types.

/// The computation was canceled through its `ProgressMonitor`.
///
/// Returned from every loop boundary that checks the monitor. Any
/// partial result is dropped by the caller; no interface is
/// registered after a cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canceled;

impl std::fmt::Display for Canceled {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "object-graph computation canceled")
    }
}

impl std::error::Error for Canceled {}
