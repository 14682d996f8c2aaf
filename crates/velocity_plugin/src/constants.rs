//! Block layout constants and velocity-cell index math.
//!
//! A velocity block is a WID³ cube of phase-space samples stored row-major
//! with the i-index innermost:
//!
//! ```text
//! index = i + j * WID + k * WID²
//! ```
//!
//! Velocity-cell index helpers return [`ERROR_VELOCITY_CELL`] /
//! [`ERROR_VELOCITY_CELL_INDEX`] on out-of-range input instead of panicking;
//! the sentinels double as "outside the block" markers in solver code.

/// Velocity block width in velocity cells per axis.
pub const WID: usize = 4;
/// WID squared.
pub const WID2: usize = WID * WID;
/// Samples per velocity block.
pub const WID3: usize = WID * WID * WID;

/// Error value for functions returning a velocity cell.
pub const ERROR_VELOCITY_CELL: u32 = u32::MAX;
/// Error value for functions returning velocity cell indices.
pub const ERROR_VELOCITY_CELL_INDEX: u32 = u32::MAX;

/// Linear sample index inside a block. Callers guarantee bounds.
#[inline(always)]
pub const fn cell_index(i: usize, j: usize, k: usize) -> usize {
  i + j * WID + k * WID2
}

/// Velocity cell at given (i,j,k), or [`ERROR_VELOCITY_CELL`] if any index
/// is outside the block.
#[inline]
pub fn velocity_cell_index(i: u32, j: u32, k: u32) -> u32 {
  if i >= WID as u32 || j >= WID as u32 || k >= WID as u32 {
    return ERROR_VELOCITY_CELL;
  }
  i + j * WID as u32 + k * WID2 as u32
}

/// Inverse of [`velocity_cell_index`]. Out-of-range cells yield all
/// [`ERROR_VELOCITY_CELL_INDEX`] components.
#[inline]
pub fn velocity_cell_indices(cell: u32) -> [u32; 3] {
  if cell >= WID3 as u32 {
    return [ERROR_VELOCITY_CELL_INDEX; 3];
  }
  [
    cell % WID as u32,
    (cell / WID as u32) % WID as u32,
    cell / WID2 as u32,
  ]
}

/// Per-block parameter record layout (all `Real`).
///
/// The record is derived from the block's `GlobalID` and never stored with
/// values conflicting with the addressing structure.
pub mod block_params {
  /// Block minimum corner, x.
  pub const VXCRD: usize = 0;
  /// Block minimum corner, y.
  pub const VYCRD: usize = 1;
  /// Block minimum corner, z.
  pub const VZCRD: usize = 2;
  /// Velocity-cell size at the block's refinement level, x.
  pub const DVX: usize = 3;
  /// Velocity-cell size at the block's refinement level, y.
  pub const DVY: usize = 4;
  /// Velocity-cell size at the block's refinement level, z.
  pub const DVZ: usize = 5;
  /// Parameters per block.
  pub const N_VELOCITY_BLOCK_PARAMS: usize = 6;
}

/// Cell-level bulk parameter layout (all `Real`).
pub mod cell_params {
  pub const XCRD: usize = 0;
  pub const YCRD: usize = 1;
  pub const ZCRD: usize = 2;
  pub const DX: usize = 3;
  pub const DY: usize = 4;
  pub const DZ: usize = 5;
  pub const EX: usize = 6;
  pub const EY: usize = 7;
  pub const EZ: usize = 8;
  pub const EX_DT2: usize = 9;
  pub const EY_DT2: usize = 10;
  pub const EZ_DT2: usize = 11;
  pub const PERBX: usize = 12;
  pub const PERBY: usize = 13;
  pub const PERBZ: usize = 14;
  pub const PERBX_DT2: usize = 15;
  pub const PERBY_DT2: usize = 16;
  pub const PERBZ_DT2: usize = 17;
  pub const BGBX: usize = 18;
  pub const BGBY: usize = 19;
  pub const BGBZ: usize = 20;
  pub const RHO: usize = 21;
  pub const RHOVX: usize = 22;
  pub const RHOVY: usize = 23;
  pub const RHOVZ: usize = 24;
  pub const RHO_DT2: usize = 25;
  pub const RHOVX_DT2: usize = 26;
  pub const RHOVY_DT2: usize = 27;
  pub const RHOVZ_DT2: usize = 28;
  pub const PERBXVOL: usize = 29;
  pub const PERBYVOL: usize = 30;
  pub const PERBZVOL: usize = 31;
  pub const P_11: usize = 32;
  pub const P_22: usize = 33;
  pub const P_33: usize = 34;
  pub const P_11_DT2: usize = 35;
  pub const P_22_DT2: usize = 36;
  pub const P_33_DT2: usize = 37;
  pub const RHOQ_TOT: usize = 38;
  pub const PHI: usize = 39;
  /// Bulk parameters per spatial cell.
  pub const N_SPATIAL_CELL_PARAMS: usize = 40;
}

/// Number of field-solver derivative slots per spatial cell.
pub const N_SPATIAL_CELL_DERIVATIVES: usize = 27;
/// Number of volume-averaged-B derivative slots per spatial cell.
pub const N_BVOL_DERIVATIVES: usize = 6;
