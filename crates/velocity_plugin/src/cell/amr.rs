//! Velocity-space refinement and coarsening.
//!
//! Refinement splits one block into its 8 children, each child inheriting
//! the sample of the parent cell it overlaps. Coarsening is the inverse:
//! the parent cell takes the average of the 8 child samples it covers, so
//! the two operations agree on what a sample means (a cell-averaged
//! phase-space density, not a total).

use std::collections::HashMap;

use crate::constants::{cell_index, WID, WID3};
use crate::types::{GlobalID, LocalID, Real, Realf, INVALID_GLOBALID, INVALID_LOCALID};

use super::SpatialCell;

impl SpatialCell {
  /// Split a resident block into its 8 children.
  ///
  /// The children (with their surrounding octants, keeping refinement
  /// transitions gradual) are created first and each newly created child
  /// cell takes the sample of the parent cell covering it; the parent is
  /// removed last. Children that were already resident keep their data.
  /// Returns the newly created children as a GlobalID → LocalID map, valid
  /// until the next block-set mutation; empty if the block is absent or
  /// already at the maximum refinement level.
  ///
  /// If child creation is interrupted by the block limit, every block this
  /// call created is removed again and the parent keeps its data.
  #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
  pub fn refine_block(&mut self, pop: usize, id: GlobalID) -> HashMap<GlobalID, LocalID> {
    let mut inserted = HashMap::new();
    let children = self.layout().children(id);
    if children.is_empty() {
      return inserted;
    }
    let p = &self.populations[pop];
    let parent_local = p.vmesh.local_id(id);
    if parent_local == INVALID_LOCALID {
      return inserted;
    }

    let mut parent_data = [0.0 as Realf; WID3];
    parent_data.copy_from_slice(p.blocks.data(parent_local));
    let absent: Vec<GlobalID> = children
      .iter()
      .copied()
      .filter(|&child| !p.vmesh.contains(child))
      .collect();

    let mut created: Vec<GlobalID> = Vec::new();
    for &child in &children {
      if !self.add_block_octant_tracked(pop, child, &mut created) {
        for block in created {
          self.remove_block(pop, block);
        }
        #[cfg(feature = "tracing")]
        tracing::warn!(block = id, "refinement abandoned: child creation failed");
        return inserted;
      }
    }

    for (octant, &child) in children.iter().enumerate() {
      if !absent.contains(&child) {
        continue;
      }
      let (oi, oj, ok) = (octant & 1, (octant >> 1) & 1, (octant >> 2) & 1);
      let p = &mut self.populations[pop];
      let local = p.vmesh.local_id(child);
      let data = p.blocks.data_mut(local);
      for ck in 0..WID {
        for cj in 0..WID {
          for ci in 0..WID {
            data[cell_index(ci, cj, ck)] = parent_data[cell_index(
              (oi * WID + ci) / 2,
              (oj * WID + cj) / 2,
              (ok * WID + ck) / 2,
            )];
          }
        }
      }
      inserted.insert(child, local);
    }

    self.remove_block(pop, id);
    // LocalIDs shift when the parent's slot is compacted; re-read at the end.
    let p = &self.populations[pop];
    for (child, local) in inserted.iter_mut() {
      *local = p.vmesh.local_id(*child);
    }
    inserted
  }

  /// Replace a full octant of children with their parent block.
  ///
  /// Each parent cell takes the average of the 8 child cells it covers.
  /// Fails without mutating when the parent is already resident, the
  /// parent has no children (root-id or undecodable), or any child is
  /// absent.
  #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
  pub fn coarsen_block(&mut self, pop: usize, parent: GlobalID) -> bool {
    let children = self.layout().children(parent);
    if children.is_empty() {
      return false;
    }
    let p = &self.populations[pop];
    if p.vmesh.contains(parent) {
      return false;
    }
    if children.iter().any(|&child| !p.vmesh.contains(child)) {
      return false;
    }

    let mut child_data = [[0.0 as Realf; WID3]; 8];
    for (octant, &child) in children.iter().enumerate() {
      child_data[octant].copy_from_slice(p.blocks.data(p.vmesh.local_id(child)));
    }

    for &child in &children {
      self.remove_block(pop, child);
    }
    if !self.add_block(pop, parent) {
      // 8 slots were just freed, so the limit cannot be the cause.
      return false;
    }

    let p = &mut self.populations[pop];
    let local = p.vmesh.local_id(parent);
    let data = p.blocks.data_mut(local);
    for k in 0..WID {
      for j in 0..WID {
        for i in 0..WID {
          let octant = (i / 2) + 2 * (j / 2) + 4 * (k / 2);
          // Accumulate in f64 so 8 equal samples average back exactly.
          let mut sum = 0.0 as Real;
          for dk in 0..2 {
            for dj in 0..2 {
              for di in 0..2 {
                sum += child_data[octant][cell_index(
                  2 * (i % 2) + di,
                  2 * (j % 2) + dj,
                  2 * (k % 2) + dk,
                )] as Real;
              }
            }
          }
          data[cell_index(i, j, k)] = (sum / 8.0) as Realf;
        }
      }
    }
    true
  }

  /// Fold every block that is shadowed by a resident ancestor into its
  /// nearest resident ancestor, then remove it.
  ///
  /// A block `d` levels below the ancestor contributes each sample with
  /// weight `1/8^d` to the ancestor cell covering it, matching the
  /// averaging of [`coarsen_block`](Self::coarsen_block) with absent
  /// siblings counted as zero. Afterwards no resident block overlaps
  /// another.
  #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
  pub fn merge_values(&mut self, pop: usize) {
    let mut ids: Vec<GlobalID> = self.populations[pop].vmesh.global_list().to_vec();
    // Finest first, so a block folds into its parent before the parent in
    // turn folds upward in the same pass.
    ids.sort_unstable_by_key(|&id| std::cmp::Reverse(self.layout().refinement_level(id)));
    let mut doomed: Vec<GlobalID> = Vec::new();

    for id in ids {
      let Some((level, bi, bj, bk)) = self.layout().indices(id) else {
        continue;
      };
      let mut ancestor = INVALID_GLOBALID;
      let mut depth = 0u8;
      for anc_level in (0..level).rev() {
        let shift = level - anc_level;
        let candidate =
          self
            .layout()
            .global_id(anc_level, bi >> shift, bj >> shift, bk >> shift);
        if self.populations[pop].vmesh.contains(candidate) {
          ancestor = candidate;
          depth = shift;
          break;
        }
      }
      if ancestor == INVALID_GLOBALID {
        continue;
      }

      let p = &mut self.populations[pop];
      let mut source = [0.0 as Realf; WID3];
      source.copy_from_slice(p.blocks.data(p.vmesh.local_id(id)));
      let weight = (0.125 as Realf).powi(depth as i32);

      let d = depth as usize;
      let target_local = p.vmesh.local_id(ancestor);
      let target = p.blocks.data_mut(target_local);
      for ck in 0..WID {
        for cj in 0..WID {
          for ci in 0..WID {
            // Global fine-cell coordinate shifted down d levels, relative to
            // the ancestor block.
            let xi = ((bi as usize * WID + ci) >> d) - (bi as usize >> d) * WID;
            let xj = ((bj as usize * WID + cj) >> d) - (bj as usize >> d) * WID;
            let xk = ((bk as usize * WID + ck) >> d) - (bk as usize >> d) * WID;
            target[cell_index(xi, xj, xk)] += weight * source[cell_index(ci, cj, ck)];
          }
        }
      }
      doomed.push(id);
    }

    for id in doomed {
      self.remove_block(pop, id);
    }
  }
}

#[cfg(test)]
#[path = "amr_test.rs"]
mod amr_test;
