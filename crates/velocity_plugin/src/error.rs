//! Recoverable errors for block-creating operations.
//!
//! Programmer errors (species or local index out of range, mesh/container
//! size mismatch) panic instead; capacity-limited insertion is reported as a
//! plain `bool` on the low-level mesh API and as [`CellError`] where a value
//! setter creates blocks on demand.

use thiserror::Error;

use crate::types::GlobalID;

/// Failure of an operation that creates velocity blocks on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CellError {
  /// The requested coordinates fall outside the velocity grid.
  #[error("coordinates outside the velocity grid")]
  OutsideGrid,
  /// Block insertion failed (invalid id or the configured block limit was
  /// reached).
  #[error("velocity block {0} could not be created")]
  BlockCreation(GlobalID),
}
