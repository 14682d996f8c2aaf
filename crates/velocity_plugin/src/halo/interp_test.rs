use glam::DVec3;

use crate::constants::{cell_index, WID3};

use super::*;

fn ramp() -> Vec<f32> {
  (0..WID3 as u32).map(|s| s as f32).collect()
}

#[test]
fn test_ngp_floors_to_cell() {
  let data = ramp();
  assert_eq!(
    interp_ngp(&data, DVec3::new(0.5, 0.5, 0.5)),
    data[cell_index(0, 0, 0)]
  );
  assert_eq!(
    interp_ngp(&data, DVec3::new(3.9, 2.1, 1.0)),
    data[cell_index(3, 2, 1)]
  );
}

/// At a cell center the bilinear weights collapse onto one sample.
#[test]
fn test_cic_at_cell_center_matches_ngp() {
  let data = ramp();
  let pos = DVec3::new(1.5, 2.5, 3.5);
  for normal in 0..3 {
    assert_eq!(interp_cic(&data, pos, normal), interp_ngp(&data, pos));
  }
}

/// Centers in the last transverse cells collapse onto one sample instead of
/// reading past the cube.
#[test]
fn test_cic_last_cell_center() {
  let data = ramp();
  for normal in 0..3 {
    let mut pos = DVec3::splat(3.5);
    pos[normal] = 0.5;
    let mut idx = [3usize; 3];
    idx[normal] = 0;
    assert_eq!(interp_cic(&data, pos, normal), data[cell_index(idx[0], idx[1], idx[2])]);
  }
}

/// Halfway between two cell centers the result is their average.
#[test]
fn test_cic_midpoint_averages() {
  let data = ramp();
  // x normal: transverse y between centers 1.5 and 2.5, z on a center.
  let v = interp_cic(&data, DVec3::new(0.5, 2.0, 1.5), 0);
  let expected = 0.5 * (data[cell_index(0, 1, 1)] + data[cell_index(0, 2, 1)]);
  assert_eq!(v, expected);
}

/// The quarter-point blend used at refinement boundaries: transverse
/// positions 2*(t%2)+1 always average a fixed cell pair with weight 1/2.
#[test]
fn test_cic_refinement_positions() {
  let data = ramp();
  let v = interp_cic(&data, DVec3::new(0.5, 1.0, 3.0), 0);
  let expected = 0.25
    * (data[cell_index(0, 0, 2)]
      + data[cell_index(0, 1, 2)]
      + data[cell_index(0, 0, 3)]
      + data[cell_index(0, 1, 3)]);
  assert_eq!(v, expected);
}
