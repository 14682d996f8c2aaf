//! MeshLayout - velocity-grid geometry and the GlobalID codec.
//!
//! Identifiers are segmented by refinement level: level L occupies the
//! half-open range `[offset(L), offset(L+1))` with `offset(0) = 1`, so
//! identifiers of different levels never collide numerically and `0` is
//! never produced. Within a level, blocks are numbered row-major with the
//! i-index innermost.
//!
//! # Level Convention
//!
//! Level 0 = coarsest (root grid), higher level = finer. The grid length
//! doubles per axis at each level.

use glam::DVec3;
use smallvec::SmallVec;

use crate::types::{GlobalID, Real, INVALID_GLOBALID};

/// Velocity-grid geometry, fixed for one run and shared by every
/// [`VelocityMesh`](super::VelocityMesh) via `Arc`.
#[derive(Clone, Debug)]
pub struct MeshLayout {
  /// Root-grid length in blocks per axis.
  grid_length: [u32; 3],
  /// Minimum corner of the velocity grid.
  mesh_min: DVec3,
  /// Maximum corner of the velocity grid.
  mesh_max: DVec3,
  /// Block edge lengths at level 0.
  block_size: DVec3,
  /// Maximum allowed refinement level.
  max_refinement_level: u8,
  /// Maximum number of resident blocks per (cell, species) pair.
  max_blocks: u32,
  /// Starting GlobalID per level; one extra entry marks the end of the last
  /// level's range.
  level_offsets: Vec<GlobalID>,
}

impl MeshLayout {
  /// Create a layout from grid extents, root length, maximum refinement
  /// level and the per-mesh block limit.
  ///
  /// # Panics
  ///
  /// Panics if the identifier space of all levels does not fit `GlobalID`
  /// or if any extent is degenerate.
  pub fn new(
    mesh_min: [Real; 3],
    mesh_max: [Real; 3],
    grid_length: [u32; 3],
    max_refinement_level: u8,
    max_blocks: u32,
  ) -> Self {
    let mesh_min = DVec3::from_array(mesh_min);
    let mesh_max = DVec3::from_array(mesh_max);
    assert!(
      mesh_min.x < mesh_max.x && mesh_min.y < mesh_max.y && mesh_min.z < mesh_max.z,
      "degenerate velocity-grid extents"
    );
    assert!(grid_length.iter().all(|&n| n > 0), "empty velocity grid");

    // offset(0) = 1: GlobalID 0 is reserved.
    let mut level_offsets = Vec::with_capacity(max_refinement_level as usize + 2);
    let mut offset: u64 = 1;
    for level in 0..=max_refinement_level {
      level_offsets.push(offset as GlobalID);
      let blocks: u64 = (0..3)
        .map(|a| (grid_length[a] as u64) << level)
        .product();
      offset += blocks;
      assert!(
        offset < INVALID_GLOBALID as u64,
        "velocity grid too large for the GlobalID space"
      );
    }
    level_offsets.push(offset as GlobalID);

    let extent = mesh_max - mesh_min;
    let block_size = DVec3::new(
      extent.x / grid_length[0] as Real,
      extent.y / grid_length[1] as Real,
      extent.z / grid_length[2] as Real,
    );

    Self {
      grid_length,
      mesh_min,
      mesh_max,
      block_size,
      max_refinement_level,
      max_blocks,
      level_offsets,
    }
  }

  /// Maximum allowed refinement level (process-wide constant).
  #[inline]
  pub fn max_refinement_level(&self) -> u8 {
    self.max_refinement_level
  }

  /// Maximum number of resident blocks per (cell, species) pair.
  #[inline]
  pub fn max_blocks(&self) -> u32 {
    self.max_blocks
  }

  /// Minimum corner of the velocity grid.
  #[inline]
  pub fn mesh_min(&self) -> DVec3 {
    self.mesh_min
  }

  /// Maximum corner of the velocity grid.
  #[inline]
  pub fn mesh_max(&self) -> DVec3 {
    self.mesh_max
  }

  /// Grid length in blocks per axis at the given level.
  #[inline]
  pub fn grid_length(&self, level: u8) -> [u32; 3] {
    [
      self.grid_length[0] << level,
      self.grid_length[1] << level,
      self.grid_length[2] << level,
    ]
  }

  /// Block edge lengths at the given level.
  #[inline]
  pub fn block_size_at(&self, level: u8) -> DVec3 {
    self.block_size / (1u64 << level) as Real
  }

  /// Velocity-cell edge lengths at the given level.
  #[inline]
  pub fn cell_size_at(&self, level: u8) -> DVec3 {
    self.block_size_at(level) / crate::constants::WID as Real
  }

  /// Encode (level, i, j, k) into a GlobalID.
  ///
  /// Returns [`INVALID_GLOBALID`] if the level exceeds the maximum or the
  /// indices exceed the grid extent at that level.
  pub fn global_id(&self, level: u8, i: u32, j: u32, k: u32) -> GlobalID {
    if level > self.max_refinement_level {
      return INVALID_GLOBALID;
    }
    let [nx, ny, nz] = self.grid_length(level);
    if i >= nx || j >= ny || k >= nz {
      return INVALID_GLOBALID;
    }
    self.level_offsets[level as usize] + i + j * nx + k * nx * ny
  }

  /// Decode a GlobalID into (level, i, j, k). Exact inverse of
  /// [`global_id`](Self::global_id); `None` for ids outside every level's
  /// range (including `0` and [`INVALID_GLOBALID`]).
  pub fn indices(&self, id: GlobalID) -> Option<(u8, u32, u32, u32)> {
    if id < self.level_offsets[0] || id >= *self.level_offsets.last().unwrap() {
      return None;
    }
    // Levels are few (max_refinement_level + 1 entries); linear scan.
    let level = (0..=self.max_refinement_level)
      .find(|&l| id < self.level_offsets[l as usize + 1])
      .unwrap();
    let [nx, ny, _] = self.grid_length(level);
    let local = id - self.level_offsets[level as usize];
    Some((level, local % nx, (local / nx) % ny, local / (nx * ny)))
  }

  /// Refinement level of a block, or `None` for an undecodable id.
  #[inline]
  pub fn refinement_level(&self, id: GlobalID) -> Option<u8> {
    self.indices(id).map(|(level, ..)| level)
  }

  /// Parent of a block: indices halved at level-1. A level-0 block is its
  /// own parent. Undecodable ids map to [`INVALID_GLOBALID`].
  pub fn parent(&self, id: GlobalID) -> GlobalID {
    match self.indices(id) {
      Some((0, ..)) => id,
      Some((level, i, j, k)) => self.global_id(level - 1, i / 2, j / 2, k / 2),
      None => INVALID_GLOBALID,
    }
  }

  /// The 8 children of a block in fixed (i,j,k)-bit octant order: bit 0 of
  /// the octant is the i offset, bit 1 the j offset, bit 2 the k offset.
  ///
  /// Empty if the block is already at the maximum refinement level or the
  /// id is undecodable.
  pub fn children(&self, id: GlobalID) -> SmallVec<[GlobalID; 8]> {
    let Some((level, i, j, k)) = self.indices(id) else {
      return SmallVec::new();
    };
    if level >= self.max_refinement_level {
      return SmallVec::new();
    }
    (0..8u8)
      .map(|octant| {
        self.global_id(
          level + 1,
          2 * i + (octant & 1) as u32,
          2 * j + ((octant >> 1) & 1) as u32,
          2 * k + ((octant >> 2) & 1) as u32,
        )
      })
      .collect()
  }

  /// The full sibling octant of a block (the 8 blocks sharing its parent,
  /// including the block itself), in the same octant order as
  /// [`children`](Self::children).
  ///
  /// A level-0 block has no siblings; the result is just the block itself.
  pub fn siblings(&self, id: GlobalID) -> SmallVec<[GlobalID; 8]> {
    let Some((level, i, j, k)) = self.indices(id) else {
      return SmallVec::new();
    };
    if level == 0 {
      let mut out = SmallVec::new();
      out.push(id);
      return out;
    }
    let (bi, bj, bk) = (i & !1, j & !1, k & !1);
    (0..8u8)
      .map(|octant| {
        self.global_id(
          level,
          bi + (octant & 1) as u32,
          bj + ((octant >> 1) & 1) as u32,
          bk + ((octant >> 2) & 1) as u32,
        )
      })
      .collect()
  }

  /// Minimum-corner coordinates of a block.
  pub fn block_coordinates(&self, id: GlobalID) -> Option<DVec3> {
    let (level, i, j, k) = self.indices(id)?;
    let size = self.block_size_at(level);
    Some(self.mesh_min + DVec3::new(i as Real, j as Real, k as Real) * size)
  }

  /// Block edge lengths of a block.
  #[inline]
  pub fn block_size(&self, id: GlobalID) -> Option<DVec3> {
    Some(self.block_size_at(self.refinement_level(id)?))
  }

  /// Velocity-cell edge lengths of a block.
  #[inline]
  pub fn cell_size(&self, id: GlobalID) -> Option<DVec3> {
    Some(self.cell_size_at(self.refinement_level(id)?))
  }

  /// Minimum and maximum corners of one velocity cell of a block. `None`
  /// for an undecodable id or an out-of-range cell.
  pub fn velocity_cell_bounds(&self, id: GlobalID, cell: usize) -> Option<(DVec3, DVec3)> {
    if cell >= crate::constants::WID3 {
      return None;
    }
    let coords = self.block_coordinates(id)?;
    let dv = self.cell_size(id)?;
    let [ci, cj, ck] = crate::constants::velocity_cell_indices(cell as u32);
    let min = coords + DVec3::new(ci as Real, cj as Real, ck as Real) * dv;
    Some((min, min + dv))
  }

  /// GlobalID of the block containing the given velocity coordinates at the
  /// given level. Out-of-bounds coordinates yield [`INVALID_GLOBALID`].
  pub fn global_id_from_coordinates(&self, v: DVec3, level: u8) -> GlobalID {
    if level > self.max_refinement_level {
      return INVALID_GLOBALID;
    }
    if v.cmplt(self.mesh_min).any() || v.cmpge(self.mesh_max).any() {
      return INVALID_GLOBALID;
    }
    let size = self.block_size_at(level);
    let rel = (v - self.mesh_min) / size;
    self.global_id(level, rel.x as u32, rel.y as u32, rel.z as u32)
  }
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;
