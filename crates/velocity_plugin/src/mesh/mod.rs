//! Velocity mesh: implicit octree addressing plus dense block storage.
//!
//! The tree structure is implicit: parent/child/sibling relationships are
//! computed on demand from [`GlobalID`](crate::types::GlobalID) arithmetic.
//! Only resident blocks are stored.
//!
//! # Module Structure
//!
//! - [`layout`]: `MeshLayout` - the GlobalID codec and velocity-space
//!   geometry, fixed per run
//! - [`container`]: `VelocityBlockContainer` - dense, swap-compacting payload
//!   store addressed by `LocalID`
//! - [`velocity_mesh`]: `VelocityMesh` - GlobalID ↔ LocalID mapping and
//!   octree topology queries for one (cell, species) pair

pub mod container;
pub mod layout;
pub mod velocity_mesh;

// Re-exports
pub use container::VelocityBlockContainer;
pub use layout::MeshLayout;
pub use velocity_mesh::VelocityMesh;
