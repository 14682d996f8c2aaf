use std::sync::Arc;

use crate::constants::{cell_index, WID};
use crate::mesh::MeshLayout;
use crate::types::SpeciesParams;

use super::*;

fn test_layout() -> Arc<MeshLayout> {
  Arc::new(MeshLayout::new(
    [-4.0, -4.0, -4.0],
    [4.0, 4.0, 4.0],
    [4, 4, 4],
    2,
    100_000,
  ))
}

fn cell() -> SpatialCell {
  SpatialCell::new(test_layout(), &[SpeciesParams::default()])
}

/// Each new child cell takes the sample of the parent cell covering it.
#[test]
fn test_refine_copies_parent_samples() {
  let mut c = cell();
  let layout = test_layout();
  let parent = layout.global_id(0, 1, 1, 1);
  c.add_block(0, parent);
  let local = c.population(0).vmesh().local_id(parent);
  for s in 0..crate::constants::WID3 {
    c.population_mut(0).blocks_mut().data_mut(local)[s] = s as f32;
  }

  let new_children = c.refine_block(0, parent);
  assert_eq!(new_children.len(), 8);
  assert!(!c.population(0).vmesh().contains(parent));
  assert_eq!(c.population(0).size(), 8);
  assert!(c.check_mesh(0));

  for (octant, &child) in layout.children(parent).iter().enumerate() {
    let local = c.population(0).vmesh().local_id(child);
    assert_eq!(new_children[&child], local);
    let data = c.population(0).blocks().data(local);
    let (oi, oj, ok) = (octant & 1, (octant >> 1) & 1, (octant >> 2) & 1);
    for ck in 0..WID {
      for cj in 0..WID {
        for ci in 0..WID {
          let expected = cell_index(
            (oi * WID + ci) / 2,
            (oj * WID + cj) / 2,
            (ok * WID + ck) / 2,
          ) as f32;
          assert_eq!(data[cell_index(ci, cj, ck)], expected);
        }
      }
    }
  }
}

/// An interrupted refinement undoes its partial creation and leaves the
/// parent's distribution untouched.
#[test]
fn test_refine_keeps_parent_when_creation_fails() {
  let layout = Arc::new(MeshLayout::new(
    [-4.0, -4.0, -4.0],
    [4.0, 4.0, 4.0],
    [4, 4, 4],
    2,
    5,
  ));
  let mut c = SpatialCell::new(Arc::clone(&layout), &[SpeciesParams::default()]);
  let parent = layout.global_id(0, 1, 1, 1);
  c.add_block(0, parent);
  c.add_block(0, layout.global_id(0, 0, 0, 0));
  c.add_block(0, layout.global_id(0, 3, 3, 3));
  let local = c.population(0).vmesh().local_id(parent);
  c.population_mut(0).blocks_mut().data_mut(local).fill(1.0);

  assert!(c.refine_block(0, parent).is_empty());
  assert_eq!(c.population(0).size(), 3, "partial children rolled back");
  assert!(c.check_mesh(0));
  let local = c.population(0).vmesh().local_id(parent);
  assert!(c.population(0).blocks().data(local).iter().all(|&v| v == 1.0));
}

#[test]
fn test_refine_rejects_absent_and_max_level() {
  let mut c = cell();
  let layout = test_layout();
  assert!(c.refine_block(0, layout.global_id(0, 0, 0, 0)).is_empty());

  let leaf = layout.global_id(2, 0, 0, 0);
  c.add_block(0, leaf);
  assert!(c.refine_block(0, leaf).is_empty());
  assert!(c.population(0).vmesh().contains(leaf));
}

/// An already-resident child keeps its data across the parent's refinement.
#[test]
fn test_refine_preserves_existing_children() {
  let mut c = cell();
  let layout = test_layout();
  let parent = layout.global_id(0, 1, 1, 1);
  let existing = layout.children(parent)[2];
  c.add_block(0, parent);
  c.add_block(0, existing);
  let local = c.population(0).vmesh().local_id(existing);
  c.population_mut(0).blocks_mut().data_mut(local).fill(9.0);
  let parent_local = c.population(0).vmesh().local_id(parent);
  c.population_mut(0).blocks_mut().data_mut(parent_local).fill(1.0);

  let new_children = c.refine_block(0, parent);
  assert_eq!(new_children.len(), 7);
  assert!(!new_children.contains_key(&existing));
  let local = c.population(0).vmesh().local_id(existing);
  assert!(c.population(0).blocks().data(local).iter().all(|&v| v == 9.0));
}

/// Coarsening averages the 8 child cells covering each parent cell.
#[test]
fn test_coarsen_averages_children() {
  let mut c = cell();
  let layout = test_layout();
  let parent = layout.global_id(0, 2, 1, 0);
  for (octant, &child) in layout.children(parent).iter().enumerate() {
    c.add_block(0, child);
    let local = c.population(0).vmesh().local_id(child);
    c.population_mut(0).blocks_mut().data_mut(local).fill(octant as f32);
  }

  assert!(c.coarsen_block(0, parent));
  assert_eq!(c.population(0).size(), 1);
  assert!(c.check_mesh(0));

  let local = c.population(0).vmesh().local_id(parent);
  let data = c.population(0).blocks().data(local);
  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        let octant = (i / 2) + 2 * (j / 2) + 4 * (k / 2);
        assert_eq!(data[cell_index(i, j, k)], octant as f32);
      }
    }
  }
}

#[test]
fn test_coarsen_requires_full_octant() {
  let mut c = cell();
  let layout = test_layout();
  let parent = layout.global_id(0, 0, 0, 0);
  let children = layout.children(parent);
  for &child in &children[..7] {
    c.add_block(0, child);
  }
  assert!(!c.coarsen_block(0, parent), "missing child");
  assert_eq!(c.population(0).size(), 7, "failed coarsen leaves blocks intact");

  c.add_block(0, children[7]);
  c.add_block(0, parent);
  assert!(!c.coarsen_block(0, parent), "parent already resident");

  assert!(!c.coarsen_block(0, layout.global_id(2, 0, 0, 0)), "leaf has no children");
}

/// Refining and coarsening back restores the original samples exactly.
#[test]
fn test_refine_coarsen_round_trip() {
  let mut c = cell();
  let layout = test_layout();
  let parent = layout.global_id(1, 3, 2, 5);
  c.add_block(0, parent);
  let local = c.population(0).vmesh().local_id(parent);
  for s in 0..crate::constants::WID3 {
    c.population_mut(0).blocks_mut().data_mut(local)[s] = (s as f32).sin();
  }
  let original: Vec<f32> = c.population(0).blocks().data(local).to_vec();

  c.refine_block(0, parent);
  assert!(c.coarsen_block(0, parent));
  let local = c.population(0).vmesh().local_id(parent);
  assert_eq!(c.population(0).blocks().data(local), original.as_slice());
}

/// A block shadowed by a resident ancestor folds into it and disappears.
#[test]
fn test_merge_values_folds_into_nearest_ancestor() {
  let mut c = cell();
  let layout = test_layout();
  let root = layout.global_id(0, 0, 0, 0);
  let fine = layout.global_id(2, 2, 1, 3);
  c.add_block(0, root);
  c.add_block(0, fine);
  let local = c.population(0).vmesh().local_id(fine);
  c.population_mut(0).blocks_mut().data_mut(local).fill(64.0);

  c.merge_values(0);

  assert_eq!(c.population(0).size(), 1);
  assert!(!c.population(0).vmesh().contains(fine));
  let local = c.population(0).vmesh().local_id(root);
  let data = c.population(0).blocks().data(local);
  // All 64 fine samples land in one root cell with weight 1/64.
  for cell in 0..crate::constants::WID3 {
    let expected = if cell == cell_index(2, 1, 3) { 64.0 } else { 0.0 };
    assert_eq!(data[cell], expected);
  }
}

/// With parent and grandparent both resident, the contribution cascades
/// through the parent instead of skipping levels.
#[test]
fn test_merge_values_cascades_through_levels() {
  let mut c = cell();
  let layout = test_layout();
  let root = layout.global_id(0, 0, 0, 0);
  let mid = layout.global_id(1, 0, 0, 0);
  let fine = layout.global_id(2, 1, 1, 0);
  c.add_block(0, root);
  c.add_block(0, mid);
  c.add_block(0, fine);
  let local = c.population(0).vmesh().local_id(fine);
  c.population_mut(0).blocks_mut().data_mut(local).fill(64.0);

  c.merge_values(0);

  assert_eq!(c.population(0).size(), 1);
  let local = c.population(0).vmesh().local_id(root);
  let data = c.population(0).blocks().data(local);
  let total: f32 = data.iter().sum();
  assert_eq!(total, 64.0, "mass-per-volume contribution is preserved");
  assert_eq!(data[cell_index(1, 1, 0)], 64.0);
}

#[test]
fn test_merge_values_without_overlap_is_noop() {
  let mut c = cell();
  let layout = test_layout();
  c.add_block(0, layout.global_id(0, 1, 1, 1));
  c.add_block(0, layout.global_id(2, 0, 0, 0));
  c.merge_values(0);
  assert_eq!(c.population(0).size(), 2);
}
