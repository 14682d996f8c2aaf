//! Content classification and block-set adjustment (sparsification).
//!
//! [`update_content_lists`](SpatialCell::update_content_lists) classifies
//! every resident block by comparing its samples against the species'
//! sparsity threshold. [`adjust_blocks`](SpatialCell::adjust_blocks) then
//! reshapes the block set: blocks needed by the content halo or by spatial
//! neighbors are created, empty blocks nobody needs are removed.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::constants::WID3;
use crate::types::{GlobalID, LocalID};

use super::SpatialCell;

impl SpatialCell {
  /// Reclassify every resident block of a population as content or
  /// no-content. A block has content when any of its samples reaches the
  /// species' sparsity threshold.
  ///
  /// Classification is data-parallel over the block payloads; the list
  /// rebuild is serial and preserves LocalID order.
  #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
  pub fn update_content_lists(&mut self, pop: usize) {
    let p = &mut self.populations[pop];
    let threshold = p.params.sparse_min_value;

    let flags: Vec<bool> = p
      .blocks
      .data_flat()
      .par_chunks_exact(WID3)
      .map(|cube| cube.iter().any(|&v| v >= threshold))
      .collect();

    p.content_list.clear();
    p.no_content_list.clear();
    for (local, &has_content) in flags.iter().enumerate() {
      let id = p.vmesh.global_id(local as LocalID);
      if has_content {
        p.content_list.push(id);
      } else {
        p.no_content_list.push(id);
      }
    }
    p.content_list_size = p.content_list.len() as LocalID;
  }

  /// Adjust the block set of a population against its content lists and the
  /// content lists of the given spatial neighbors (same population index).
  ///
  /// The required set is the cell's own content blocks, their velocity-space
  /// halo (the 26 same-level neighbors of each content block plus the
  /// parents of those neighbors) and every content block of the spatial
  /// neighbors. Required blocks are created; resident no-content blocks
  /// outside the required set are removed when `delete_empty` is set.
  ///
  /// Content lists are not refreshed here; call
  /// [`update_content_lists`](Self::update_content_lists) first.
  ///
  /// Returns `(created, removed)` block counts.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip(self, spatial_neighbors))
  )]
  pub fn adjust_blocks(
    &mut self,
    pop: usize,
    spatial_neighbors: &[&SpatialCell],
    delete_empty: bool,
  ) -> (usize, usize) {
    let p = &self.populations[pop];
    let mut required: HashSet<GlobalID> = HashSet::with_capacity(p.content_list.len() * 27);
    for &id in &p.content_list {
      required.insert(id);
      self.velocity_block_halo(id, &mut required);
    }
    for neighbor in spatial_neighbors {
      required.extend(neighbor.populations[pop].content_list.iter().copied());
    }

    let mut removed = 0;
    if delete_empty {
      let removable: Vec<GlobalID> = self.populations[pop]
        .no_content_list
        .iter()
        .copied()
        .filter(|id| !required.contains(id))
        .collect();
      for id in removable {
        self.remove_block(pop, id);
        removed += 1;
      }
    }

    let missing: Vec<GlobalID> = required
      .iter()
      .copied()
      .filter(|&id| !self.populations[pop].vmesh.contains(id))
      .collect();
    let mut created = 0;
    for id in missing {
      if self.add_block(pop, id) {
        created += 1;
      }
    }

    (created, removed)
  }

  /// Collect the velocity-space halo of one block into `required`: the 26
  /// same-level neighbors and, below the root level, their parents.
  fn velocity_block_halo(&self, id: GlobalID, required: &mut HashSet<GlobalID>) {
    let layout = self.layout();
    let Some((level, i, j, k)) = layout.indices(id) else {
      return;
    };
    for dk in -1i64..=1 {
      for dj in -1i64..=1 {
        for di in -1i64..=1 {
          if di == 0 && dj == 0 && dk == 0 {
            continue;
          }
          let (ni, nj, nk) = (i as i64 + di, j as i64 + dj, k as i64 + dk);
          if ni < 0 || nj < 0 || nk < 0 {
            continue;
          }
          let neighbor = layout.global_id(level, ni as u32, nj as u32, nk as u32);
          if layout.indices(neighbor).is_none() {
            continue;
          }
          required.insert(neighbor);
          if level > 0 {
            required.insert(layout.parent(neighbor));
          }
        }
      }
    }
  }
}

#[cfg(test)]
#[path = "adjust_test.rs"]
mod adjust_test;
