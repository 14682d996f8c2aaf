//! Stencil assembly for solvers: one block plus `pad` layers of neighbor
//! samples along each axis, interpolated across refinement boundaries.
//!
//! [`fetch_stencil`] fills a fully padded `(WID + 2*pad)³` cube in the
//! block's own orientation. [`fetch_acc_stencil`] fills a `WID² × (WID +
//! 2*pad)` column for one axis in a transposed layout that puts the padded
//! axis outermost, the shape the acceleration sweep consumes.
//!
//! # Refinement Boundaries
//!
//! Neighbor layers come from whatever the mesh holds at the neighbor slot:
//!
//! - same level: direct copy of the facing layers
//! - one level coarser: nearest-grid-point samples from the quarter of the
//!   coarse block facing this block
//! - one level finer: cloud-in-cell blends of the four face children, each
//!   fine cell pair averaged onto one target cell
//! - absent: zeros
//!
//! The acceleration variant also reports the neighbor cell size along the
//! padded axis relative to this block (2.0 coarser, 1.0 same or absent,
//! 0.5 finer), which the solver folds into its flux limiter.

pub mod interp;

use glam::DVec3;

use crate::constants::{cell_index, WID, WID2, WID3};
use crate::mesh::{VelocityBlockContainer, VelocityMesh};
use crate::types::{GlobalID, LocalID, Real, Realf, INVALID_LOCALID};

use interp::{interp_cic, interp_ngp};

/// Zero cube substituted for absent neighbors.
const NULL_BLOCK: [Realf; WID3] = [0.0; WID3];

/// Linear index into a padded `(WID + 2*pad)³` cube, i-index innermost.
#[inline]
pub fn pad_index(i: usize, j: usize, k: usize, pad: usize) -> usize {
  let span = WID + 2 * pad;
  i + j * span + k * span * span
}

#[inline]
fn block_data<'a>(src: &'a VelocityBlockContainer, local: LocalID) -> &'a [Realf] {
  if local == INVALID_LOCALID {
    &NULL_BLOCK
  } else {
    src.data(local)
  }
}

/// Assemble the padded sample cube of one block.
///
/// `out` must hold `(WID + 2*pad)³` values and is fully overwritten;
/// `1 <= pad <= WID`.
///
/// # Panics
///
/// Panics if the block is not resident or `out` has the wrong length.
pub fn fetch_stencil(
  id: GlobalID,
  vmesh: &VelocityMesh,
  src: &VelocityBlockContainer,
  out: &mut [Realf],
  pad: usize,
) {
  assert!(pad >= 1 && pad <= WID, "stencil pad out of range");
  let span = WID + 2 * pad;
  assert_eq!(out.len(), span * span * span, "stencil buffer size mismatch");
  let local = vmesh.local_id(id);
  assert_ne!(local, INVALID_LOCALID, "stencil fetch on absent block");

  let data = src.data(local);
  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        out[pad_index(i + pad, j + pad, k + pad, pad)] = data[cell_index(i, j, k)];
      }
    }
  }

  let Some((_, bi, bj, bk)) = vmesh.layout().indices(id) else {
    return;
  };
  let block_indices = [bi, bj, bk];

  for axis in 0..3 {
    for off in [-1i32, 1] {
      let mut offset = [0i32; 3];
      offset[axis] = off;
      let (nbrs, diff) = vmesh.neighbors_at_offset(id, offset[0], offset[1], offset[2]);

      let crd = if off < 0 {
        WID as Real - 0.5 - (pad - 1) as Real
      } else {
        0.5
      };
      let trgt = if off > 0 { WID + pad } else { 0 };
      let (t1, t2) = transverse(axis);

      // Target cell (layer a along the padded axis, (c1, c2) transverse).
      let target = |a: usize, c1: usize, c2: usize| -> usize {
        let mut idx = [0usize; 3];
        idx[axis] = trgt + a;
        idx[t1] = c1 + pad;
        idx[t2] = c2 + pad;
        pad_index(idx[0], idx[1], idx[2], pad)
      };

      if nbrs.is_empty() {
        for a in 0..pad {
          for c2 in 0..WID {
            for c1 in 0..WID {
              out[target(a, c1, c2)] = 0.0;
            }
          }
        }
      } else if diff == -1 {
        // Sample the quarter of the coarse block this block overlaps.
        let ptr = block_data(src, nbrs[0]);
        for a in 0..pad {
          for c2 in 0..WID {
            for c1 in 0..WID {
              let mut pos = DVec3::ZERO;
              pos[axis] = crd + a as Real;
              pos[t1] = (2 * (block_indices[t1] % 2)) as Real + (c1 / 2) as Real + 0.5;
              pos[t2] = (2 * (block_indices[t2] % 2)) as Real + (c2 / 2) as Real + 0.5;
              out[target(a, c1, c2)] = interp_ngp(ptr, pos);
            }
          }
        }
      } else if diff == 0 {
        let ptr = block_data(src, nbrs[0]);
        let src_base = if off < 0 { WID - pad } else { 0 };
        for a in 0..pad {
          for c2 in 0..WID {
            for c1 in 0..WID {
              let mut idx = [0usize; 3];
              idx[axis] = src_base + a;
              idx[t1] = c1;
              idx[t2] = c2;
              out[target(a, c1, c2)] = ptr[cell_index(idx[0], idx[1], idx[2])];
            }
          }
        }
      } else {
        // Four face children; each target cell blends a fine cell pair.
        for a in 0..pad {
          for c2 in 0..WID {
            for c1 in 0..WID {
              let ptr = block_data(src, nbrs[(c2 / 2) * 2 + c1 / 2]);
              let mut pos = DVec3::ZERO;
              pos[axis] = crd + a as Real;
              pos[t1] = (2 * (c1 % 2) + 1) as Real;
              pos[t2] = (2 * (c2 % 2) + 1) as Real;
              out[target(a, c1, c2)] = interp_cic(ptr, pos, axis);
            }
          }
        }
      }
    }
  }
}

/// Assemble the one-axis padded column of one block in the transposed
/// acceleration layout: the `dim` axis runs outermost with `pad` extra
/// layers on each side, the transverse plane keeps its stride-1/WID order.
///
/// `out` must hold `WID² * (WID + 2*pad)` values and is fully overwritten.
/// `cell_size_fractions[0]`/`[1]` receive the relative neighbor cell size
/// along `dim` on the low/high side.
///
/// # Panics
///
/// Panics if the block is not resident, `dim > 2` or `out` has the wrong
/// length.
pub fn fetch_acc_stencil(
  id: GlobalID,
  dim: usize,
  vmesh: &VelocityMesh,
  src: &VelocityBlockContainer,
  out: &mut [Realf],
  pad: usize,
  cell_size_fractions: &mut [Real; 2],
) {
  assert!(dim < 3, "acceleration dimension out of range");
  assert!(pad >= 1 && pad <= WID, "stencil pad out of range");
  assert_eq!(out.len(), WID2 * (WID + 2 * pad), "stencil buffer size mismatch");
  let local = vmesh.local_id(id);
  assert_ne!(local, INVALID_LOCALID, "stencil fetch on absent block");

  let (t1, t2) = transverse(dim);
  // Transposed layout: for dim 0 the plane order swaps so that the old
  // k-index becomes the innermost, keeping the sweep loops identical for
  // all three dimensions.
  let acc = |c1: usize, c2: usize, along: usize| -> usize {
    if dim == 0 {
      c2 + c1 * WID + along * WID2
    } else {
      c1 + c2 * WID + along * WID2
    }
  };

  let data = src.data(local);
  for k in 0..WID {
    for j in 0..WID {
      for i in 0..WID {
        let idx = [i, j, k];
        out[acc(idx[t1], idx[t2], idx[dim] + pad)] = data[cell_index(i, j, k)];
      }
    }
  }

  let Some((_, bi, bj, bk)) = vmesh.layout().indices(id) else {
    return;
  };
  let block_indices = [bi, bj, bk];

  for off in [-1i32, 1] {
    let mut offset = [0i32; 3];
    offset[dim] = off;
    let (nbrs, diff) = vmesh.neighbors_at_offset(id, offset[0], offset[1], offset[2]);

    let crd = if off < 0 {
      WID as Real - 0.5 - (pad - 1) as Real
    } else {
      0.5
    };
    let trgt = if off > 0 { WID + pad } else { 0 };
    let side = ((off + 1) / 2) as usize;

    if nbrs.is_empty() {
      for a in 0..pad {
        for c2 in 0..WID {
          for c1 in 0..WID {
            out[acc(c1, c2, trgt + a)] = 0.0;
          }
        }
      }
      cell_size_fractions[side] = 1.0;
    } else if diff == -1 {
      let ptr = block_data(src, nbrs[0]);
      for a in 0..pad {
        for c2 in 0..WID {
          for c1 in 0..WID {
            let mut pos = DVec3::ZERO;
            pos[dim] = crd + a as Real;
            pos[t1] = (2 * (block_indices[t1] % 2)) as Real + (c1 / 2) as Real + 0.5;
            pos[t2] = (2 * (block_indices[t2] % 2)) as Real + (c2 / 2) as Real + 0.5;
            out[acc(c1, c2, trgt + a)] = interp_ngp(ptr, pos);
          }
        }
      }
      cell_size_fractions[side] = 2.0;
    } else if diff == 0 {
      let ptr = block_data(src, nbrs[0]);
      let src_base = if off < 0 { WID - pad } else { 0 };
      for a in 0..pad {
        for c2 in 0..WID {
          for c1 in 0..WID {
            let mut idx = [0usize; 3];
            idx[dim] = src_base + a;
            idx[t1] = c1;
            idx[t2] = c2;
            out[acc(c1, c2, trgt + a)] = ptr[cell_index(idx[0], idx[1], idx[2])];
          }
        }
      }
      cell_size_fractions[side] = 1.0;
    } else {
      for a in 0..pad {
        for c2 in 0..WID {
          for c1 in 0..WID {
            let ptr = block_data(src, nbrs[(c2 / 2) * 2 + c1 / 2]);
            let mut pos = DVec3::ZERO;
            pos[dim] = crd + a as Real;
            pos[t1] = (2 * (c1 % 2) + 1) as Real;
            pos[t2] = (2 * (c2 % 2) + 1) as Real;
            out[acc(c1, c2, trgt + a)] = interp_cic(ptr, pos, dim);
          }
        }
      }
      cell_size_fractions[side] = 0.5;
    }
  }
}

#[inline]
fn transverse(axis: usize) -> (usize, usize) {
  match axis {
    0 => (1, 2),
    1 => (0, 2),
    _ => (0, 1),
  }
}

#[cfg(test)]
#[path = "halo_test.rs"]
mod halo_test;
