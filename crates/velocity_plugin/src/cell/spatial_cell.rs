//! SpatialCell - block lifecycle, distribution values and cell metadata.
//!
//! # Block Lifecycle
//!
//! Blocks enter through [`add_block`](SpatialCell::add_block) (and its octant
//! and batch variants) and leave through
//! [`remove_block`](SpatialCell::remove_block); both keep the addressing mesh
//! and the payload container in lockstep. A newly created block has its
//! parameter record filled from the grid geometry and an all-zero sample
//! cube.

use std::sync::Arc;

use glam::DVec3;

use crate::constants::cell_params::N_SPATIAL_CELL_PARAMS;
use crate::constants::{
  block_params, cell_index, N_BVOL_DERIVATIVES, N_SPATIAL_CELL_DERIVATIVES, WID, WID3,
};
use crate::error::CellError;
use crate::mesh::{MeshLayout, VelocityBlockContainer, VelocityMesh};
use crate::types::{GlobalID, LocalID, Real, Realf, SpeciesParams, INVALID_LOCALID};

use super::Population;

/// One spatial-grid cell: per-species velocity-space populations plus the
/// field, moment and boundary metadata carried alongside them.
#[derive(Debug)]
pub struct SpatialCell {
  /// Bulk parameters ([`cell_params`](crate::constants::cell_params) layout).
  pub(crate) parameters: [Real; N_SPATIAL_CELL_PARAMS],
  /// Spatial derivatives of the bulk parameters.
  pub(crate) derivatives: [Real; N_SPATIAL_CELL_DERIVATIVES],
  /// Volume-averaged magnetic-field derivatives.
  pub(crate) derivatives_bvol: [Real; N_BVOL_DERIVATIVES],
  pub(crate) sys_boundary_flag: u32,
  pub(crate) sys_boundary_layer: u32,
  pub(crate) io_local_cell_id: u64,
  /// Staging pointer for the neighbor-payload exchange; points into a buffer
  /// owned by the exchange driver while a transfer is in flight.
  pub(crate) neighbor_block_data: *mut Realf,
  pub(crate) neighbor_number_of_blocks: LocalID,
  pub(crate) populations: Vec<Population>,
  /// Scratch mesh/container pair, exchanged wholesale with a population by
  /// [`swap_temporary`](SpatialCell::swap_temporary).
  vmesh_temp: VelocityMesh,
  blocks_temp: VelocityBlockContainer,
  /// Zero cube handed out for absent stencil neighbors.
  null_block_data: [Realf; WID3],
  layout: Arc<MeshLayout>,
}

// The staging pointer is only dereferenced by the exchange driver, which owns
// the cell exclusively for the duration of a transfer.
unsafe impl Send for SpatialCell {}
unsafe impl Sync for SpatialCell {}

impl SpatialCell {
  /// Create a cell with one empty population per species.
  pub fn new(layout: Arc<MeshLayout>, species: &[SpeciesParams]) -> Self {
    let populations = species
      .iter()
      .map(|&params| Population::new(Arc::clone(&layout), params))
      .collect();
    Self {
      parameters: [0.0; N_SPATIAL_CELL_PARAMS],
      derivatives: [0.0; N_SPATIAL_CELL_DERIVATIVES],
      derivatives_bvol: [0.0; N_BVOL_DERIVATIVES],
      sys_boundary_flag: 0,
      sys_boundary_layer: 0,
      io_local_cell_id: 0,
      neighbor_block_data: std::ptr::null_mut(),
      neighbor_number_of_blocks: 0,
      vmesh_temp: VelocityMesh::new(Arc::clone(&layout)),
      blocks_temp: VelocityBlockContainer::new(),
      null_block_data: [0.0; WID3],
      populations,
      layout,
    }
  }

  /// The shared grid geometry.
  #[inline]
  pub fn layout(&self) -> &MeshLayout {
    &self.layout
  }

  /// Shared handle to the grid geometry.
  #[inline]
  pub fn layout_arc(&self) -> &Arc<MeshLayout> {
    &self.layout
  }

  /// Number of species populations.
  #[inline]
  pub fn population_count(&self) -> usize {
    self.populations.len()
  }

  /// One species population.
  ///
  /// # Panics
  ///
  /// Panics if the population index is out of range.
  #[inline]
  pub fn population(&self, pop: usize) -> &Population {
    &self.populations[pop]
  }

  /// Mutable species population.
  #[inline]
  pub fn population_mut(&mut self, pop: usize) -> &mut Population {
    &mut self.populations[pop]
  }

  // ---------------------------------------------------------------------
  // Block lifecycle
  // ---------------------------------------------------------------------

  /// Ensure a block is resident. Returns `true` if the block is resident
  /// after the call, whether it already existed or was just created;
  /// `false` only when creation is impossible (undecodable id or the
  /// per-mesh block limit).
  ///
  /// A created block gets a zeroed sample cube and a parameter record
  /// filled from the grid geometry.
  pub fn add_block(&mut self, pop: usize, id: GlobalID) -> bool {
    let p = &mut self.populations[pop];
    if p.vmesh.contains(id) {
      return true;
    }
    if !p.vmesh.insert(id) {
      return false;
    }
    let local = p.blocks.push();
    write_block_parameters(&self.layout, id, p.blocks.parameters_mut(local));
    true
  }

  /// Ensure several blocks are resident; returns how many calls succeeded.
  /// Blocks that cannot be created are skipped without rolling back the
  /// rest.
  pub fn add_blocks(&mut self, pop: usize, ids: &[GlobalID]) -> usize {
    ids.iter().filter(|&&id| self.add_block(pop, id)).count()
  }

  /// Ensure a block and its full sibling octant are resident, then repeat
  /// for every ancestor octant up to the root level. Keeps refinement
  /// transitions gradual by never leaving a lone block of an octant.
  ///
  /// Returns `false` if any creation failed (the blocks created so far are
  /// kept).
  pub fn add_block_octant(&mut self, pop: usize, id: GlobalID) -> bool {
    self.add_block_octant_tracked(pop, id, &mut Vec::new())
  }

  /// Octant fill that records every block it actually creates, so a caller
  /// needing all-or-nothing semantics can undo a partial fill.
  pub(crate) fn add_block_octant_tracked(
    &mut self,
    pop: usize,
    id: GlobalID,
    created: &mut Vec<GlobalID>,
  ) -> bool {
    let mut current = id;
    loop {
      for sibling in self.layout.siblings(current) {
        let was_resident = self.populations[pop].vmesh.contains(sibling);
        if !self.add_block(pop, sibling) {
          #[cfg(feature = "tracing")]
          tracing::warn!(block = sibling, "octant fill stopped: block creation failed");
          return false;
        }
        if !was_resident {
          created.push(sibling);
        }
      }
      let Some(level) = self.layout.refinement_level(current) else {
        return false;
      };
      if level == 0 {
        return true;
      }
      current = self.layout.parent(current);
    }
  }

  /// Remove a block if resident; the last block is swap-compacted into its
  /// slot. Absent blocks are a no-op.
  pub fn remove_block(&mut self, pop: usize, id: GlobalID) {
    let p = &mut self.populations[pop];
    p.vmesh.erase(id, &mut p.blocks);
  }

  /// Drop all blocks of a population and release their memory.
  pub fn clear(&mut self, pop: usize) {
    let p = &mut self.populations[pop];
    p.vmesh.clear();
    p.blocks.clear();
    p.blocks.shrink_to_fit();
    p.content_list.clear();
    p.no_content_list.clear();
  }

  /// Release over-capacity across all populations and the scratch pair.
  pub fn shrink_to_fit(&mut self) {
    for p in &mut self.populations {
      p.blocks.shrink_to_fit();
      p.receive_list.shrink_to_fit();
      p.content_list.shrink_to_fit();
      p.no_content_list.shrink_to_fit();
    }
    self.blocks_temp.shrink_to_fit();
  }

  /// Exchange a population's mesh/container pair with the cell's scratch
  /// pair in O(1). Used by solvers that build a new block set and then
  /// promote it wholesale.
  pub fn swap_temporary(&mut self, pop: usize) {
    let p = &mut self.populations[pop];
    p.vmesh.swap(&mut self.vmesh_temp);
    p.blocks.swap(&mut self.blocks_temp);
  }

  /// Validate mesh/container lockstep for one population.
  pub fn check_mesh(&self, pop: usize) -> bool {
    let p = &self.populations[pop];
    p.vmesh.check(&p.blocks)
  }

  // ---------------------------------------------------------------------
  // Distribution values
  // ---------------------------------------------------------------------

  /// Sample the distribution at a velocity coordinate. Probes resident
  /// blocks finest level first; absent coordinates sample as `0.0`.
  pub fn get_value(&self, pop: usize, v: DVec3) -> Realf {
    let p = &self.populations[pop];
    for level in (0..=self.layout.max_refinement_level()).rev() {
      let id = self.layout.global_id_from_coordinates(v, level);
      let local = p.vmesh.local_id(id);
      if local != INVALID_LOCALID {
        return p.blocks.data(local)[cell_of(&self.layout, id, v)];
      }
    }
    0.0
  }

  /// Write the distribution value at a velocity coordinate, creating the
  /// containing block at the root level if no resident block covers the
  /// coordinate.
  pub fn set_value(&mut self, pop: usize, v: DVec3, value: Realf) -> Result<(), CellError> {
    let (id, cell) = self.require_block(pop, v)?;
    let p = &mut self.populations[pop];
    let local = p.vmesh.local_id(id);
    p.blocks.data_mut(local)[cell] = value;
    Ok(())
  }

  /// Add to the distribution value at a velocity coordinate, creating the
  /// containing block at the root level if needed.
  pub fn increment_value(&mut self, pop: usize, v: DVec3, inc: Realf) -> Result<(), CellError> {
    let (id, cell) = self.require_block(pop, v)?;
    let p = &mut self.populations[pop];
    let local = p.vmesh.local_id(id);
    p.blocks.data_mut(local)[cell] += inc;
    Ok(())
  }

  /// Sample one cell of a block directly. Absent blocks sample as `0.0`.
  ///
  /// # Panics
  ///
  /// Panics if `cell >= WID3`.
  pub fn get_value_at(&self, pop: usize, id: GlobalID, cell: usize) -> Realf {
    assert!(cell < WID3, "velocity cell out of range");
    let p = &self.populations[pop];
    let local = p.vmesh.local_id(id);
    if local == INVALID_LOCALID {
      return 0.0;
    }
    p.blocks.data(local)[cell]
  }

  /// Write one cell of a block, creating the block if needed.
  ///
  /// # Panics
  ///
  /// Panics if `cell >= WID3`.
  pub fn set_value_at(
    &mut self,
    pop: usize,
    id: GlobalID,
    cell: usize,
    value: Realf,
  ) -> Result<(), CellError> {
    assert!(cell < WID3, "velocity cell out of range");
    let local = self.require_block_at(pop, id)?;
    self.populations[pop].blocks.data_mut(local)[cell] = value;
    Ok(())
  }

  /// Add to one cell of a block, creating the block if needed.
  ///
  /// # Panics
  ///
  /// Panics if `cell >= WID3`.
  pub fn increment_value_at(
    &mut self,
    pop: usize,
    id: GlobalID,
    cell: usize,
    inc: Realf,
  ) -> Result<(), CellError> {
    assert!(cell < WID3, "velocity cell out of range");
    let local = self.require_block_at(pop, id)?;
    self.populations[pop].blocks.data_mut(local)[cell] += inc;
    Ok(())
  }

  fn require_block_at(&mut self, pop: usize, id: GlobalID) -> Result<LocalID, CellError> {
    if self.layout.indices(id).is_none() {
      return Err(CellError::OutsideGrid);
    }
    if !self.add_block(pop, id) {
      return Err(CellError::BlockCreation(id));
    }
    Ok(self.populations[pop].vmesh.local_id(id))
  }

  /// Resolve a coordinate to a resident (block, cell) pair, creating the
  /// root-level block when no resident block covers the coordinate.
  fn require_block(&mut self, pop: usize, v: DVec3) -> Result<(GlobalID, usize), CellError> {
    let p = &self.populations[pop];
    for level in (0..=self.layout.max_refinement_level()).rev() {
      let id = self.layout.global_id_from_coordinates(v, level);
      if p.vmesh.contains(id) {
        return Ok((id, cell_of(&self.layout, id, v)));
      }
    }
    let id = self.layout.global_id_from_coordinates(v, 0);
    if self.layout.indices(id).is_none() {
      return Err(CellError::OutsideGrid);
    }
    if !self.add_block(pop, id) {
      return Err(CellError::BlockCreation(id));
    }
    Ok((id, cell_of(&self.layout, id, v)))
  }

  // ---------------------------------------------------------------------
  // Cell metadata
  // ---------------------------------------------------------------------

  /// Bulk parameters ([`cell_params`](crate::constants::cell_params) layout).
  #[inline]
  pub fn parameters(&self) -> &[Real; N_SPATIAL_CELL_PARAMS] {
    &self.parameters
  }

  /// Mutable bulk parameters.
  #[inline]
  pub fn parameters_mut(&mut self) -> &mut [Real; N_SPATIAL_CELL_PARAMS] {
    &mut self.parameters
  }

  /// Spatial derivatives of the bulk parameters.
  #[inline]
  pub fn derivatives(&self) -> &[Real; N_SPATIAL_CELL_DERIVATIVES] {
    &self.derivatives
  }

  #[inline]
  pub fn derivatives_mut(&mut self) -> &mut [Real; N_SPATIAL_CELL_DERIVATIVES] {
    &mut self.derivatives
  }

  /// Volume-averaged magnetic-field derivatives.
  #[inline]
  pub fn derivatives_bvol(&self) -> &[Real; N_BVOL_DERIVATIVES] {
    &self.derivatives_bvol
  }

  #[inline]
  pub fn derivatives_bvol_mut(&mut self) -> &mut [Real; N_BVOL_DERIVATIVES] {
    &mut self.derivatives_bvol
  }

  #[inline]
  pub fn sys_boundary_flag(&self) -> u32 {
    self.sys_boundary_flag
  }

  #[inline]
  pub fn set_sys_boundary_flag(&mut self, flag: u32) {
    self.sys_boundary_flag = flag;
  }

  #[inline]
  pub fn sys_boundary_layer(&self) -> u32 {
    self.sys_boundary_layer
  }

  #[inline]
  pub fn set_sys_boundary_layer(&mut self, layer: u32) {
    self.sys_boundary_layer = layer;
  }

  #[inline]
  pub fn io_local_cell_id(&self) -> u64 {
    self.io_local_cell_id
  }

  #[inline]
  pub fn set_io_local_cell_id(&mut self, id: u64) {
    self.io_local_cell_id = id;
  }

  /// Point the neighbor-payload staging slot at an externally owned buffer
  /// for the duration of a transfer.
  pub fn set_neighbor_block_data(&mut self, data: *mut Realf, blocks: LocalID) {
    self.neighbor_block_data = data;
    self.neighbor_number_of_blocks = blocks;
  }

  /// Zero cube handed out for absent stencil neighbors.
  #[inline]
  pub fn null_block_data(&self) -> &[Realf; WID3] {
    &self.null_block_data
  }

  // ---------------------------------------------------------------------
  // Memory accounting
  // ---------------------------------------------------------------------

  /// Exact memory held by all populations and the scratch pair.
  pub fn size_in_bytes(&self) -> usize {
    self.populations.iter().map(Population::size_in_bytes).sum::<usize>()
      + self.vmesh_temp.size_in_bytes()
      + self.blocks_temp.size_in_bytes()
  }

  /// Reserved memory held by all populations and the scratch pair.
  pub fn capacity_in_bytes(&self) -> usize {
    self.populations.iter().map(Population::capacity_in_bytes).sum::<usize>()
      + self.vmesh_temp.capacity_in_bytes()
      + self.blocks_temp.capacity_in_bytes()
  }
}

/// Fill a new block's parameter record from the grid geometry.
pub(crate) fn write_block_parameters(layout: &MeshLayout, id: GlobalID, params: &mut [Real]) {
  let Some(coords) = layout.block_coordinates(id) else {
    return;
  };
  let Some(dv) = layout.cell_size(id) else {
    return;
  };
  params[block_params::VXCRD] = coords.x;
  params[block_params::VYCRD] = coords.y;
  params[block_params::VZCRD] = coords.z;
  params[block_params::DVX] = dv.x;
  params[block_params::DVY] = dv.y;
  params[block_params::DVZ] = dv.z;
}

/// Index of the velocity cell containing `v` inside block `id`.
fn cell_of(layout: &MeshLayout, id: GlobalID, v: DVec3) -> usize {
  let coords = layout.block_coordinates(id).unwrap_or_default();
  let dv = layout.cell_size(id).unwrap_or(DVec3::ONE);
  let rel = (v - coords) / dv;
  let clamp = |x: Real| (x as usize).min(WID - 1);
  cell_index(clamp(rel.x), clamp(rel.y), clamp(rel.z))
}

#[cfg(test)]
#[path = "spatial_cell_test.rs"]
mod spatial_cell_test;
