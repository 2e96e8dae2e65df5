//! Capability traits required from collaborators
//!
//! These are pure interfaces with no implementations; concrete monitors
//! and loaders live with the I/O layer.

/// Cooperative progress and cancellation contract.
///
/// Long-running loads call `work` as units complete and consult
/// `is_cancelled` between logical work units (per outer-dimension
/// iteration of a physical read). A cancelled monitor makes the
/// operation abort with a distinct cancellation error.
pub trait ProgressMonitor {
    /// Record completed work units
    fn work(&self, units: usize);

    /// Whether the caller has requested cancellation
    fn is_cancelled(&self) -> bool;
}
