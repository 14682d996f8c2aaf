use std::sync::Arc;

use crate::cell::SpatialCell;
use crate::constants::{cell_index, WID, WID2, WID3};
use crate::mesh::MeshLayout;
use crate::types::{Real, SpeciesParams};

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

fn fill_ramp(c: &mut SpatialCell, id: crate::types::GlobalID, base: f32) {
  let local = c.population(0).vmesh().local_id(id);
  for s in 0..WID3 {
    c.population_mut(0).blocks_mut().data_mut(local)[s] = base + s as f32;
  }
}

#[test]
fn test_stencil_center_and_same_level_copy() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  let b = c.layout().global_id(0, 2, 1, 1);
  c.add_block(0, a);
  c.add_block(0, b);
  fill_ramp(&mut c, a, 0.0);
  fill_ramp(&mut c, b, 100.0);

  let p = c.population(0);
  let mut out = vec![0.0f32; 6 * 6 * 6];
  fetch_stencil(a, p.vmesh(), p.blocks(), &mut out, 1);

  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        assert_eq!(
          out[pad_index(i + 1, j + 1, k + 1, 1)],
          cell_index(i, j, k) as f32
        );
      }
    }
  }
  // +x pad layer holds the neighbor's first i-layer.
  for k in 0..WID {
    for j in 0..WID {
      assert_eq!(
        out[pad_index(WID + 1, j + 1, k + 1, 1)],
        100.0 + cell_index(0, j, k) as f32
      );
    }
  }
  // All other neighbor slots are empty.
  for k in 0..WID {
    for j in 0..WID {
      assert_eq!(out[pad_index(0, j + 1, k + 1, 1)], 0.0);
      assert_eq!(out[pad_index(j + 1, 0, k + 1, 1)], 0.0);
      assert_eq!(out[pad_index(j + 1, WID + 1, k + 1, 1)], 0.0);
      assert_eq!(out[pad_index(j + 1, k + 1, 0, 1)], 0.0);
      assert_eq!(out[pad_index(j + 1, k + 1, WID + 1, 1)], 0.0);
    }
  }
}

/// With pad 2 the same-level copy takes the two facing layers, and the low
/// side reads the neighbor's trailing layers.
#[test]
fn test_stencil_pad2_same_level() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  let low = c.layout().global_id(0, 0, 1, 1);
  c.add_block(0, a);
  c.add_block(0, low);
  fill_ramp(&mut c, low, 100.0);

  let p = c.population(0);
  let span = WID + 4;
  let mut out = vec![0.0f32; span * span * span];
  fetch_stencil(a, p.vmesh(), p.blocks(), &mut out, 2);

  for k in 0..WID {
    for j in 0..WID {
      for a_layer in 0..2 {
        assert_eq!(
          out[pad_index(a_layer, j + 2, k + 2, 2)],
          100.0 + cell_index(WID - 2 + a_layer, j, k) as f32
        );
      }
    }
  }
}

/// A coarser neighbor is sampled nearest-grid-point from the quarter this
/// block overlaps.
#[test]
fn test_stencil_coarser_neighbor() {
  let mut c = cell();
  let fine = c.layout().global_id(1, 3, 2, 2);
  let coarse = c.layout().global_id(0, 2, 1, 1);
  c.add_block(0, fine);
  c.add_block(0, coarse);
  fill_ramp(&mut c, coarse, 0.0);

  let p = c.population(0);
  let mut out = vec![0.0f32; 6 * 6 * 6];
  fetch_stencil(fine, p.vmesh(), p.blocks(), &mut out, 1);

  // Block indices (3,2,2): even j and k, so the low quarter of the coarse
  // neighbor faces this block.
  for c2 in 0..WID {
    for c1 in 0..WID {
      assert_eq!(
        out[pad_index(WID + 1, c1 + 1, c2 + 1, 1)],
        cell_index(0, c1 / 2, c2 / 2) as f32
      );
    }
  }
}

/// Finer neighbors contribute through the four face children; constant
/// child data passes through the blend unchanged.
#[test]
fn test_stencil_finer_neighbors() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  c.add_block(0, a);
  // Low-i face children of the +x neighbor slot.
  for (n, (j, k)) in [(2u32, 2u32), (3, 2), (2, 3), (3, 3)].iter().enumerate() {
    let child = c.layout().global_id(1, 4, *j, *k);
    c.add_block(0, child);
    let local = c.population(0).vmesh().local_id(child);
    c.population_mut(0).blocks_mut().data_mut(local).fill(10.0 * (n as f32 + 1.0));
  }

  let p = c.population(0);
  let mut out = vec![0.0f32; 6 * 6 * 6];
  fetch_stencil(a, p.vmesh(), p.blocks(), &mut out, 1);

  for c2 in 0..WID {
    for c1 in 0..WID {
      let child = (c2 / 2) * 2 + c1 / 2;
      assert_eq!(
        out[pad_index(WID + 1, c1 + 1, c2 + 1, 1)],
        10.0 * (child as f32 + 1.0)
      );
    }
  }
}

/// The acceleration layout transposes the padded axis outermost and reports
/// relative neighbor cell sizes.
#[test]
fn test_acc_stencil_layout_and_fractions() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  let top = c.layout().global_id(0, 1, 1, 2);
  c.add_block(0, a);
  c.add_block(0, top);
  fill_ramp(&mut c, a, 0.0);
  fill_ramp(&mut c, top, 100.0);

  let p = c.population(0);
  let mut out = vec![0.0f32; WID2 * (WID + 2)];
  let mut fractions = [0.0 as Real; 2];
  fetch_acc_stencil(a, 2, p.vmesh(), p.blocks(), &mut out, 1, &mut fractions);

  assert_eq!(fractions, [1.0, 1.0], "absent low side and same-level high side");
  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        assert_eq!(
          out[i + j * WID + (k + 1) * WID2],
          cell_index(i, j, k) as f32
        );
      }
    }
  }
  for j in 0..WID {
    for i in 0..WID {
      assert_eq!(out[i + j * WID + 0 * WID2], 0.0);
      assert_eq!(
        out[i + j * WID + (WID + 1) * WID2],
        100.0 + cell_index(i, j, 0) as f32
      );
    }
  }
}

/// For the x sweep the transverse plane is transposed as well.
#[test]
fn test_acc_stencil_dim0_transpose() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  c.add_block(0, a);
  fill_ramp(&mut c, a, 0.0);

  let p = c.population(0);
  let mut out = vec![0.0f32; WID2 * (WID + 2)];
  let mut fractions = [0.0 as Real; 2];
  fetch_acc_stencil(a, 0, p.vmesh(), p.blocks(), &mut out, 1, &mut fractions);

  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        assert_eq!(
          out[k + j * WID + (i + 1) * WID2],
          cell_index(i, j, k) as f32
        );
      }
    }
  }
}

/// A finer face neighbor halves the reported cell size.
#[test]
fn test_acc_stencil_finer_fraction() {
  let mut c = cell();
  let a = c.layout().global_id(0, 1, 1, 1);
  c.add_block(0, a);
  c.add_block(0, c.layout().global_id(1, 4, 2, 2));

  let p = c.population(0);
  let mut out = vec![0.0f32; WID2 * (WID + 2)];
  let mut fractions = [0.0 as Real; 2];
  fetch_acc_stencil(a, 0, p.vmesh(), p.blocks(), &mut out, 1, &mut fractions);
  assert_eq!(fractions[1], 0.5);
  assert_eq!(fractions[0], 1.0);
}

#[test]
#[should_panic]
fn test_stencil_on_absent_block_panics() {
  let c = cell();
  let p = c.population(0);
  let mut out = vec![0.0f32; 6 * 6 * 6];
  fetch_stencil(c.layout().global_id(0, 0, 0, 0), p.vmesh(), p.blocks(), &mut out, 1);
}
