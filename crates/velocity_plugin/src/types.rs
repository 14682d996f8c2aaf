//! Core scalar and identifier types.

/// Bulk / geometric scalar (cell parameters, block parameters, coordinates).
pub type Real = f64;

/// Distribution-function sample scalar.
pub type Realf = f32;

/// Level-aware octree identifier of a velocity block.
///
/// `0` is reserved and never produced by the codec; valid identifiers live in
/// `[1, INVALID_GLOBALID)`. Identifiers of different refinement levels never
/// collide (level-segmented offsets, see [`crate::mesh::MeshLayout`]).
pub type GlobalID = u32;

/// Dense storage index of a resident block.
///
/// Unstable across removals: removal swaps the last block into the freed
/// slot. Valid only within the scope of one operation; external references
/// must be keyed by [`GlobalID`].
pub type LocalID = u32;

/// "Does not exist / not found" for [`GlobalID`] queries.
pub const INVALID_GLOBALID: GlobalID = GlobalID::MAX;

/// "Not currently resident" for [`LocalID`] queries.
pub const INVALID_LOCALID: LocalID = LocalID::MAX;

/// Per-species configuration, supplied once at setup and read-only after.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeciesParams {
  /// Content threshold: a block "has content" if any of its samples reaches
  /// this value. Drives sparsification.
  pub sparse_min_value: Realf,
  /// Upper bound for the velocity-space timestep of this species.
  pub max_velocity_dt: Real,
}

impl Default for SpeciesParams {
  fn default() -> Self {
    Self {
      sparse_min_value: 1.0e-15,
      max_velocity_dt: Real::MAX,
    }
  }
}
