//! VelocityBlockContainer - dense payload storage for resident blocks.
//!
//! One slot per resident block: a WID³ sample cube (`Realf`) plus a
//! [`block_params`]-layout parameter record (`Real`). Slots are addressed by
//! `LocalID`; removal is swap-with-last, performed by the owner
//! ([`VelocityMesh::erase`](super::VelocityMesh::erase)) which also re-points
//! the addressing table of the moved block.
//!
//! The container knows nothing about GlobalIDs; index `size - 1` is always a
//! resident block (or the container is empty). Capacity is never shrunk
//! implicitly; call [`shrink_to_fit`](VelocityBlockContainer::shrink_to_fit)
//! to reclaim memory.

use crate::constants::block_params::N_VELOCITY_BLOCK_PARAMS;
use crate::constants::WID3;
use crate::types::{LocalID, Real, Realf};

/// Dense, swap-compacting store of block payloads.
#[derive(Clone, Debug, Default)]
pub struct VelocityBlockContainer {
  /// Sample cubes, `size * WID3` values.
  data: Vec<Realf>,
  /// Parameter records, `size * N_VELOCITY_BLOCK_PARAMS` values.
  parameters: Vec<Real>,
}

impl VelocityBlockContainer {
  /// Create an empty container.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of resident slots.
  #[inline]
  pub fn size(&self) -> usize {
    self.data.len() / WID3
  }

  /// True if no slots are resident.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Append one zero-initialized slot and return its index.
  /// Amortized O(1) (geometric capacity growth).
  pub fn push(&mut self) -> LocalID {
    let new = self.size() as LocalID;
    self.data.resize(self.data.len() + WID3, 0.0);
    self
      .parameters
      .resize(self.parameters.len() + N_VELOCITY_BLOCK_PARAMS, 0.0);
    new
  }

  /// Append `count` zero-initialized slots; returns the first new index.
  pub fn push_n(&mut self, count: usize) -> LocalID {
    let first = self.size() as LocalID;
    self.data.resize(self.data.len() + count * WID3, 0.0);
    self
      .parameters
      .resize(self.parameters.len() + count * N_VELOCITY_BLOCK_PARAMS, 0.0);
    first
  }

  /// Copy the payload and parameters of slot `src` into slot `dst`.
  ///
  /// # Panics
  ///
  /// Panics if either index is out of range.
  pub fn copy(&mut self, src: LocalID, dst: LocalID) {
    let size = self.size();
    let (src, dst) = (src as usize, dst as usize);
    assert!(src < size && dst < size, "block copy out of range");
    if src == dst {
      return;
    }
    self.data.copy_within(src * WID3..(src + 1) * WID3, dst * WID3);
    self.parameters.copy_within(
      src * N_VELOCITY_BLOCK_PARAMS..(src + 1) * N_VELOCITY_BLOCK_PARAMS,
      dst * N_VELOCITY_BLOCK_PARAMS,
    );
  }

  /// Drop the last slot.
  ///
  /// # Panics
  ///
  /// Panics if the container is empty.
  pub fn pop(&mut self) {
    assert!(!self.is_empty(), "pop on empty block container");
    self.data.truncate(self.data.len() - WID3);
    self
      .parameters
      .truncate(self.parameters.len() - N_VELOCITY_BLOCK_PARAMS);
  }

  /// Resize to exactly `count` slots; new slots are zero-initialized.
  /// Used by the two-phase receive path to pre-size storage.
  pub fn resize(&mut self, count: usize) {
    self.data.resize(count * WID3, 0.0);
    self.parameters.resize(count * N_VELOCITY_BLOCK_PARAMS, 0.0);
  }

  /// Release all slots. Capacity is kept.
  pub fn clear(&mut self) {
    self.data.clear();
    self.parameters.clear();
  }

  /// Release over-capacity without changing logical contents.
  pub fn shrink_to_fit(&mut self) {
    self.data.shrink_to_fit();
    self.parameters.shrink_to_fit();
  }

  /// Sample cube of one slot.
  ///
  /// # Panics
  ///
  /// Panics if `local` is out of range.
  #[inline]
  pub fn data(&self, local: LocalID) -> &[Realf] {
    let start = local as usize * WID3;
    &self.data[start..start + WID3]
  }

  /// Mutable sample cube of one slot.
  #[inline]
  pub fn data_mut(&mut self, local: LocalID) -> &mut [Realf] {
    let start = local as usize * WID3;
    &mut self.data[start..start + WID3]
  }

  /// All sample cubes as one flat slice (slot-major).
  #[inline]
  pub fn data_flat(&self) -> &[Realf] {
    &self.data
  }

  /// All sample cubes, mutable.
  #[inline]
  pub fn data_flat_mut(&mut self) -> &mut [Realf] {
    &mut self.data
  }

  /// Parameter record of one slot.
  ///
  /// # Panics
  ///
  /// Panics if `local` is out of range.
  #[inline]
  pub fn parameters(&self, local: LocalID) -> &[Real] {
    let start = local as usize * N_VELOCITY_BLOCK_PARAMS;
    &self.parameters[start..start + N_VELOCITY_BLOCK_PARAMS]
  }

  /// Mutable parameter record of one slot.
  #[inline]
  pub fn parameters_mut(&mut self, local: LocalID) -> &mut [Real] {
    let start = local as usize * N_VELOCITY_BLOCK_PARAMS;
    &mut self.parameters[start..start + N_VELOCITY_BLOCK_PARAMS]
  }

  /// All parameter records as one flat slice (slot-major).
  #[inline]
  pub fn parameters_flat(&self) -> &[Real] {
    &self.parameters
  }

  /// All parameter records, mutable.
  #[inline]
  pub fn parameters_flat_mut(&mut self) -> &mut [Real] {
    &mut self.parameters
  }

  /// Exchange contents with another container in O(1).
  pub fn swap(&mut self, other: &mut Self) {
    std::mem::swap(&mut self.data, &mut other.data);
    std::mem::swap(&mut self.parameters, &mut other.parameters);
  }

  /// Exact memory held by resident slots, for diagnostics.
  pub fn size_in_bytes(&self) -> usize {
    self.data.len() * std::mem::size_of::<Realf>()
      + self.parameters.len() * std::mem::size_of::<Real>()
  }

  /// Reserved memory, for diagnostics.
  pub fn capacity_in_bytes(&self) -> usize {
    self.data.capacity() * std::mem::size_of::<Realf>()
      + self.parameters.capacity() * std::mem::size_of::<Real>()
  }
}

#[cfg(test)]
#[path = "container_test.rs"]
mod container_test;
