//! Sample interpolation inside one velocity block.
//!
//! Positions are in cell units of the sampled block, with sample points at
//! cell centers `n + 0.5`. Callers keep positions inside the block; these
//! helpers do not clamp.

use glam::DVec3;

use crate::constants::cell_index;
use crate::types::Realf;

/// Nearest-grid-point sample: every coordinate floors to a cell index.
#[inline]
pub fn interp_ngp(data: &[Realf], pos: DVec3) -> Realf {
  data[cell_index(pos.x as usize, pos.y as usize, pos.z as usize)]
}

/// Cloud-in-cell sample: nearest-grid-point along the `normal` axis,
/// bilinear over the two transverse axes.
pub fn interp_cic(data: &[Realf], pos: DVec3, normal: usize) -> Realf {
  let (t1, t2) = match normal {
    0 => (1, 2),
    1 => (0, 2),
    _ => (0, 1),
  };
  let n = pos[normal] as usize;

  let p1 = pos[t1] - 0.5;
  let p2 = pos[t2] - 0.5;
  let (b1, b2) = (p1.floor(), p2.floor());
  let (w1, w2) = ((p1 - b1) as Realf, (p2 - b2) as Realf);
  let (b1, b2) = (b1 as usize, b2 as usize);

  let sample = |a1: usize, a2: usize| -> Realf {
    let mut idx = [0usize; 3];
    idx[normal] = n;
    idx[t1] = a1;
    idx[t2] = a2;
    data[cell_index(idx[0], idx[1], idx[2])]
  };

  // Zero-weight samples are skipped, not read: at a cell center the upper
  // neighbor would index past the cube.
  let mut v = (1.0 - w1) * (1.0 - w2) * sample(b1, b2);
  if w1 > 0.0 {
    v += w1 * (1.0 - w2) * sample(b1 + 1, b2);
  }
  if w2 > 0.0 {
    v += (1.0 - w1) * w2 * sample(b1, b2 + 1);
  }
  if w1 > 0.0 && w2 > 0.0 {
    v += w1 * w2 * sample(b1 + 1, b2 + 1);
  }
  v
}

#[cfg(test)]
#[path = "interp_test.rs"]
mod interp_test;
