//! velocity_plugin - sparse, adaptively-refined velocity-space storage
//!
//! This crate is the velocity-space data store of a hybrid-Vlasov plasma
//! solver. Each spatial cell holds, per particle species, a set of velocity
//! blocks (WID³ cubes of phase-space samples) that exist only where the
//! distribution function has non-negligible content. Blocks live on an
//! implicit octree so regions of velocity space can be refined locally.
//!
//! # Features
//!
//! - **Implicit octree addressing**: level-segmented `GlobalID` codec with
//!   parent/child/sibling math, no explicit tree nodes
//! - **Dense block container**: swap-compacting payload storage addressed by
//!   unstable `LocalID`s
//! - **Content-driven sparsification**: blocks are created and destroyed per
//!   timestep against a per-species threshold
//! - **Data-conserving refinement**: 1 → 8 split and volume-weighted 8 → 1
//!   merge across octree levels
//! - **Halo assembly**: padded stencils with NGP/CIC interpolation across
//!   refinement-level boundaries
//! - **Transfer descriptors**: flag-driven packing for two-phase inter-process
//!   block exchange
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use glam::DVec3;
//! use velocity_plugin::{MeshLayout, SpatialCell, SpeciesParams};
//!
//! let layout = Arc::new(MeshLayout::new(
//!     [-1.0e6; 3], [1.0e6; 3], [10, 10, 10], 2, 500_000,
//! ));
//! let species = [SpeciesParams { sparse_min_value: 1.0e-15, ..Default::default() }];
//! let mut cell = SpatialCell::new(layout, &species);
//!
//! cell.set_value(0, DVec3::new(0.0, 0.0, 0.0), 1.0e-12)?;
//! cell.update_content_lists(0);
//! cell.adjust_blocks(0, &[], true);
//! # Ok::<(), velocity_plugin::CellError>(())
//! ```

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::{
  block_params, cell_params, velocity_cell_index, velocity_cell_indices, ERROR_VELOCITY_CELL,
  ERROR_VELOCITY_CELL_INDEX, WID, WID2, WID3,
};
pub use error::CellError;
pub use types::{GlobalID, LocalID, Real, Realf, SpeciesParams, INVALID_GLOBALID, INVALID_LOCALID};

// Velocity mesh: addressing, payload container, per-population topology
pub mod mesh;
pub use mesh::{MeshLayout, VelocityBlockContainer, VelocityMesh};

// Spatial cell: per-species populations and the block lifecycle
pub mod cell;
pub use cell::{Population, SpatialCell};

// Padded stencil assembly across refinement boundaries
pub mod halo;
pub use halo::{fetch_acc_stencil, fetch_stencil};

// Flag-driven transfer buffer descriptors
pub mod transfer;
pub use transfer::{Direction, ElementLayout, TransferDescriptor, TransferSegment};
