//! VelocityMesh - GlobalID ↔ LocalID addressing for one (cell, species) pair.
//!
//! Mapping invariant: `global_to_local.len() == local_to_global.len() ==`
//! companion container size, and `local_id(global_id(l)) == l` for every
//! resident `l`. Removal swap-compacts both the addressing table and the
//! companion [`VelocityBlockContainer`] in one call so readers never observe
//! the structures out of step.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{MeshLayout, VelocityBlockContainer};
use crate::types::{GlobalID, LocalID, INVALID_GLOBALID, INVALID_LOCALID};

/// Addressing table of resident velocity blocks for one species in one
/// spatial cell.
#[derive(Clone, Debug)]
pub struct VelocityMesh {
  layout: Arc<MeshLayout>,
  global_to_local: HashMap<GlobalID, LocalID>,
  local_to_global: Vec<GlobalID>,
}

impl VelocityMesh {
  /// Create an empty mesh bound to a layout.
  pub fn new(layout: Arc<MeshLayout>) -> Self {
    Self {
      layout,
      global_to_local: HashMap::new(),
      local_to_global: Vec::new(),
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

  /// Number of resident blocks.
  #[inline]
  pub fn size(&self) -> usize {
    self.local_to_global.len()
  }

  /// True if no blocks are resident.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.local_to_global.is_empty()
  }

  /// True if the block is resident.
  #[inline]
  pub fn contains(&self, id: GlobalID) -> bool {
    self.global_to_local.contains_key(&id)
  }

  /// LocalID of a resident block, [`INVALID_LOCALID`] otherwise. O(1).
  #[inline]
  pub fn local_id(&self, id: GlobalID) -> LocalID {
    self
      .global_to_local
      .get(&id)
      .copied()
      .unwrap_or(INVALID_LOCALID)
  }

  /// GlobalID at a dense index, [`INVALID_GLOBALID`] if out of range. O(1).
  #[inline]
  pub fn global_id(&self, local: LocalID) -> GlobalID {
    self
      .local_to_global
      .get(local as usize)
      .copied()
      .unwrap_or(INVALID_GLOBALID)
  }

  /// Ordered list of resident GlobalIDs (index = LocalID).
  #[inline]
  pub fn global_list(&self) -> &[GlobalID] {
    &self.local_to_global
  }

  /// Raw pointer to the ordered GlobalID list, for transfer staging.
  #[inline]
  pub(crate) fn global_list_mut_ptr(&mut self) -> *mut GlobalID {
    self.local_to_global.as_mut_ptr()
  }

  /// Insert a block, assigning the next dense LocalID.
  ///
  /// Returns `false` without mutating if the id is undecodable, already
  /// present, or the configured block limit would be exceeded.
  pub fn insert(&mut self, id: GlobalID) -> bool {
    if self.layout.indices(id).is_none() {
      return false;
    }
    if self.global_to_local.contains_key(&id) {
      return false;
    }
    if self.local_to_global.len() >= self.layout.max_blocks() as usize {
      return false;
    }
    let local = self.local_to_global.len() as LocalID;
    self.global_to_local.insert(id, local);
    self.local_to_global.push(id);
    true
  }

  /// Insert several blocks, returning how many were actually added.
  ///
  /// Blocks that are invalid, already present, or over the limit are
  /// skipped; successful inserts are NOT rolled back when others fail.
  pub fn insert_batch(&mut self, ids: &[GlobalID]) -> usize {
    ids.iter().filter(|&&id| self.insert(id)).count()
  }

  /// Remove a block together with its companion container slot.
  ///
  /// No-op if the block is absent. Otherwise the last block of both
  /// structures is swapped into the freed slot and the addressing entry of
  /// the moved block is re-pointed, all within this call.
  pub fn erase(&mut self, id: GlobalID, container: &mut VelocityBlockContainer) {
    let Some(removed) = self.global_to_local.remove(&id) else {
      return;
    };
    debug_assert_eq!(self.local_to_global.len(), container.size());

    let last = (self.local_to_global.len() - 1) as LocalID;
    container.copy(last, removed);
    container.pop();

    let moved = self.local_to_global[last as usize];
    self.local_to_global.swap_remove(removed as usize);
    if removed != last {
      self.global_to_local.insert(moved, removed);
    }
  }

  /// Rebuild the mesh from an ordered block list (two-phase receive path).
  ///
  /// The list order defines the LocalIDs; duplicate or undecodable ids make
  /// the call fail and leave the mesh cleared.
  pub fn set_grid(&mut self, ids: &[GlobalID]) -> bool {
    self.clear();
    self.local_to_global.reserve(ids.len());
    for (local, &id) in ids.iter().enumerate() {
      if self.layout.indices(id).is_none() {
        self.clear();
        return false;
      }
      if self.global_to_local.insert(id, local as LocalID).is_some() {
        self.clear();
        return false;
      }
      self.local_to_global.push(id);
    }
    true
  }

  /// Drop all mappings. Capacity is kept.
  pub fn clear(&mut self) {
    self.global_to_local.clear();
    self.local_to_global.clear();
  }

  /// Exchange contents with another mesh in O(1). Both meshes must share
  /// the same layout.
  pub fn swap(&mut self, other: &mut Self) {
    debug_assert!(Arc::ptr_eq(&self.layout, &other.layout));
    std::mem::swap(&mut self.global_to_local, &mut other.global_to_local);
    std::mem::swap(&mut self.local_to_global, &mut other.local_to_global);
  }

  /// Resident blocks at the face-neighbor position offset by one block
  /// width in direction (di, dj, dk), each component in {-1, 0, 1}.
  ///
  /// Returns `(locals, refinement_level_difference)`:
  /// - same-level neighbor resident: 1 entry, diff 0
  /// - position covered by a one-level-coarser block: 1 entry, diff -1
  /// - position covered by one-level-finer blocks: the 4 face children in
  ///   transverse order (lower axis fastest), absent children as
  ///   [`INVALID_LOCALID`], diff +1 (single-axis offsets only)
  /// - nothing resident at any level: empty list, diff 0
  pub fn neighbors_at_offset(
    &self,
    id: GlobalID,
    di: i32,
    dj: i32,
    dk: i32,
  ) -> (SmallVec<[LocalID; 4]>, i32) {
    let mut out: SmallVec<[LocalID; 4]> = SmallVec::new();
    let Some((level, i, j, k)) = self.layout.indices(id) else {
      return (out, 0);
    };

    let [nx, ny, nz] = self.layout.grid_length(level);
    let (ni, nj, nk) = (i as i64 + di as i64, j as i64 + dj as i64, k as i64 + dk as i64);
    if ni < 0 || nj < 0 || nk < 0 || ni >= nx as i64 || nj >= ny as i64 || nk >= nz as i64 {
      return (out, 0);
    }
    let (ni, nj, nk) = (ni as u32, nj as u32, nk as u32);

    // Same level first.
    let same = self.layout.global_id(level, ni, nj, nk);
    let lid = self.local_id(same);
    if lid != INVALID_LOCALID {
      out.push(lid);
      return (out, 0);
    }

    // One level finer: the 4 children on the shared face. Only meaningful
    // for face offsets (exactly one non-zero component).
    let offset_axis = match (di != 0, dj != 0, dk != 0) {
      (true, false, false) => Some(0),
      (false, true, false) => Some(1),
      (false, false, true) => Some(2),
      _ => None,
    };
    if level < self.layout.max_refinement_level() {
      if let Some(axis) = offset_axis {
        let base = [2 * ni, 2 * nj, 2 * nk];
        let toward = [di, dj, dk][axis];
        // The face adjacent to this block: low child plane when stepping in
        // +direction, high child plane when stepping in -direction.
        let face = if toward > 0 { 0 } else { 1 };
        let (t1, t2) = match axis {
          0 => (1, 2),
          1 => (0, 2),
          _ => (0, 1),
        };
        let mut any = false;
        let mut fine: SmallVec<[LocalID; 4]> = SmallVec::new();
        for h2 in 0..2u32 {
          for h1 in 0..2u32 {
            let mut idx = base;
            idx[axis] += face;
            idx[t1] += h1;
            idx[t2] += h2;
            let child = self.layout.global_id(level + 1, idx[0], idx[1], idx[2]);
            let clid = self.local_id(child);
            if clid != INVALID_LOCALID {
              any = true;
            }
            fine.push(clid);
          }
        }
        if any {
          return (fine, 1);
        }
      }
    }

    // One level coarser.
    if level > 0 {
      let coarse = self.layout.global_id(level - 1, ni / 2, nj / 2, nk / 2);
      let clid = self.local_id(coarse);
      if clid != INVALID_LOCALID {
        out.push(clid);
        return (out, -1);
      }
    }

    (out, 0)
  }

  /// True if any child of the block is resident.
  pub fn has_children(&self, id: GlobalID) -> bool {
    self
      .layout
      .children(id)
      .iter()
      .any(|&child| self.contains(child))
  }

  /// First resident strict ancestor above the parent (grandparent or
  /// coarser), or [`INVALID_GLOBALID`]. Probed before coarsening.
  pub fn first_existing_grandparent(&self, id: GlobalID) -> GlobalID {
    let Some((level, i, j, k)) = self.layout.indices(id) else {
      return INVALID_GLOBALID;
    };
    if level < 2 {
      return INVALID_GLOBALID;
    }
    for ancestor_level in (0..=level - 2).rev() {
      let shift = level - ancestor_level;
      let ancestor = self
        .layout
        .global_id(ancestor_level, i >> shift, j >> shift, k >> shift);
      if self.contains(ancestor) {
        return ancestor;
      }
    }
    INVALID_GLOBALID
  }

  /// Validate the addressing invariants against the companion container.
  /// Not for hot paths; used by tests and consistency sweeps.
  pub fn check(&self, container: &VelocityBlockContainer) -> bool {
    if self.global_to_local.len() != self.local_to_global.len() {
      return false;
    }
    if self.local_to_global.len() != container.size() {
      return false;
    }
    self
      .local_to_global
      .iter()
      .enumerate()
      .all(|(local, &id)| self.global_to_local.get(&id) == Some(&(local as LocalID)))
  }

  /// Exact memory held by the addressing tables, for diagnostics.
  pub fn size_in_bytes(&self) -> usize {
    self.local_to_global.len()
      * (std::mem::size_of::<GlobalID>() + std::mem::size_of::<(GlobalID, LocalID)>())
  }

  /// Reserved memory, for diagnostics.
  pub fn capacity_in_bytes(&self) -> usize {
    self.local_to_global.capacity() * std::mem::size_of::<GlobalID>()
      + self.global_to_local.capacity() * std::mem::size_of::<(GlobalID, LocalID)>()
  }
}

#[cfg(test)]
#[path = "velocity_mesh_test.rs"]
mod velocity_mesh_test;
