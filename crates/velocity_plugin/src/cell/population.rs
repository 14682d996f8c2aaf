//! Per-species block population of a spatial cell.

use std::sync::Arc;

use crate::mesh::{MeshLayout, VelocityBlockContainer, VelocityMesh};
use crate::types::{GlobalID, LocalID, Real, SpeciesParams};

/// One species' velocity-space state inside a [`SpatialCell`](super::SpatialCell):
/// the addressing mesh, the payload container and the bookkeeping lists that
/// drive sparsification and the two-phase block exchange.
#[derive(Clone, Debug)]
pub struct Population {
  pub(crate) vmesh: VelocityMesh,
  pub(crate) blocks: VelocityBlockContainer,
  pub(crate) params: SpeciesParams,
  /// Maximum timestep allowed by the velocity-space CFL condition.
  pub(crate) max_v_dt: Real,
  /// Block count communicated in exchange stage 1. On the send side this is
  /// a snapshot of `vmesh.size()`; on the receive side it sizes stage 2.
  pub(crate) n_blocks: LocalID,
  /// Incoming GlobalID list staged by exchange stage 2.
  pub(crate) receive_list: Vec<GlobalID>,
  /// Blocks whose payload is above the sparsity threshold.
  pub(crate) content_list: Vec<GlobalID>,
  /// Resident blocks below the threshold, removal candidates.
  pub(crate) no_content_list: Vec<GlobalID>,
  /// Content-list length communicated in content exchange stage 1.
  pub(crate) content_list_size: LocalID,
}

impl Population {
  pub fn new(layout: Arc<MeshLayout>, params: SpeciesParams) -> Self {
    Self {
      vmesh: VelocityMesh::new(layout),
      blocks: VelocityBlockContainer::new(),
      max_v_dt: params.max_velocity_dt,
      params,
      n_blocks: 0,
      receive_list: Vec::new(),
      content_list: Vec::new(),
      no_content_list: Vec::new(),
      content_list_size: 0,
    }
  }

  /// The addressing mesh.
  #[inline]
  pub fn vmesh(&self) -> &VelocityMesh {
    &self.vmesh
  }

  /// The payload container.
  #[inline]
  pub fn blocks(&self) -> &VelocityBlockContainer {
    &self.blocks
  }

  /// Mutable payload container. The block set itself is managed through
  /// [`SpatialCell`](super::SpatialCell).
  #[inline]
  pub fn blocks_mut(&mut self) -> &mut VelocityBlockContainer {
    &mut self.blocks
  }

  /// Species parameters.
  #[inline]
  pub fn params(&self) -> &SpeciesParams {
    &self.params
  }

  /// Number of resident blocks.
  #[inline]
  pub fn size(&self) -> usize {
    self.vmesh.size()
  }

  /// Maximum timestep allowed by the velocity-space CFL condition.
  #[inline]
  pub fn max_v_dt(&self) -> Real {
    self.max_v_dt
  }

  #[inline]
  pub fn set_max_v_dt(&mut self, dt: Real) {
    self.max_v_dt = dt;
  }

  /// Blocks flagged as having content by the latest
  /// [`update_content_lists`](super::SpatialCell::update_content_lists).
  #[inline]
  pub fn content_list(&self) -> &[GlobalID] {
    &self.content_list
  }

  /// Resident blocks flagged as empty by the latest content-list update.
  #[inline]
  pub fn no_content_list(&self) -> &[GlobalID] {
    &self.no_content_list
  }

  /// Exact memory held by this population's structures.
  pub fn size_in_bytes(&self) -> usize {
    self.vmesh.size_in_bytes()
      + self.blocks.size_in_bytes()
      + (self.receive_list.len() + self.content_list.len() + self.no_content_list.len())
        * std::mem::size_of::<GlobalID>()
  }

  /// Reserved memory held by this population's structures.
  pub fn capacity_in_bytes(&self) -> usize {
    self.vmesh.capacity_in_bytes()
      + self.blocks.capacity_in_bytes()
      + (self.receive_list.capacity() + self.content_list.capacity() + self.no_content_list.capacity())
        * std::mem::size_of::<GlobalID>()
  }
}
