//! Spatial cells and their per-species block populations.
//!
//! A [`SpatialCell`] owns one [`Population`] per particle species. Each
//! population couples a [`VelocityMesh`](crate::mesh::VelocityMesh)
//! addressing table with a [`VelocityBlockContainer`](crate::mesh::VelocityBlockContainer)
//! payload store and the bookkeeping lists used by sparsification and the
//! two-phase block exchange.

mod adjust;
mod amr;
mod population;
mod spatial_cell;

pub use population::Population;
pub use spatial_cell::SpatialCell;

pub(crate) use spatial_cell::write_block_parameters;
