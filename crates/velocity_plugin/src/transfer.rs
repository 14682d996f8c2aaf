//! Flag-driven transfer descriptors for inter-process cell exchange.
//!
//! A transfer is described by a bitmask of [`flags`] values. For a given
//! mask and [`Direction`], [`SpatialCell::transfer_descriptor`] returns the
//! list of memory segments the exchange layer should ship, in a fixed
//! flag-bit order so sender and receiver enumerate identical layouts.
//!
//! # Two-Phase Block Exchange
//!
//! The resident block set is exchanged in two rounds, because the receiver
//! cannot size its buffers before it knows the block count:
//!
//! 1. `VEL_BLOCK_LIST_STAGE1` ships the block count. 2.
//!    `VEL_BLOCK_LIST_STAGE2` ships the GlobalID list; building the receive
//!    descriptor resizes the staging list to the count from stage 1.
//!
//! After stage 2 the receiver calls
//! [`prepare_to_receive_blocks`](SpatialCell::prepare_to_receive_blocks) to
//! rebuild its mesh and size the payload container, then ships
//! `VEL_BLOCK_DATA`. The content-list exchange (`VEL_BLOCK_WITH_CONTENT_*`)
//! follows the same two-round pattern.
//!
//! Descriptors hold raw pointers into the cell; the caller must not mutate
//! the cell between building a descriptor and completing the transfer.

use std::sync::Arc;

use crate::cell::SpatialCell;
use crate::constants::block_params::N_VELOCITY_BLOCK_PARAMS;
use crate::constants::{cell_params, WID3};
use crate::types::{GlobalID, LocalID};

/// Transfer bitmask values. Bit positions are part of the wire contract and
/// never reused; bits 5 and 22 are reserved.
pub mod flags {
  pub const CELL_PARAMETERS: u64 = 1 << 0;
  pub const CELL_DERIVATIVES: u64 = 1 << 1;
  pub const VEL_BLOCK_LIST_STAGE1: u64 = 1 << 2;
  pub const VEL_BLOCK_LIST_STAGE2: u64 = 1 << 3;
  pub const VEL_BLOCK_DATA: u64 = 1 << 4;
  pub const VEL_BLOCK_PARAMETERS: u64 = 1 << 6;
  pub const VEL_BLOCK_WITH_CONTENT_STAGE1: u64 = 1 << 7;
  pub const VEL_BLOCK_WITH_CONTENT_STAGE2: u64 = 1 << 8;
  pub const CELL_SYSBOUNDARYFLAG: u64 = 1 << 9;
  pub const CELL_E: u64 = 1 << 10;
  pub const CELL_EDT2: u64 = 1 << 11;
  pub const CELL_PERB: u64 = 1 << 12;
  pub const CELL_PERBDT2: u64 = 1 << 13;
  pub const CELL_BGB: u64 = 1 << 14;
  pub const CELL_RHO_RHOV: u64 = 1 << 15;
  pub const CELL_RHODT2_RHOVDT2: u64 = 1 << 16;
  pub const CELL_BVOL: u64 = 1 << 17;
  pub const CELL_BVOL_DERIVATIVES: u64 = 1 << 18;
  pub const CELL_DIMENSIONS: u64 = 1 << 19;
  pub const CELL_IOLOCALCELLID: u64 = 1 << 20;
  pub const NEIGHBOR_VEL_BLOCK_DATA: u64 = 1 << 21;
  pub const CELL_P: u64 = 1 << 23;
  pub const CELL_PDT2: u64 = 1 << 24;
  pub const CELL_RHOQ_TOT: u64 = 1 << 25;
  pub const CELL_PHI: u64 = 1 << 26;

  /// Everything a cell owns, including block payloads.
  pub const ALL_DATA: u64 = CELL_PARAMETERS
    | CELL_DERIVATIVES
    | CELL_BVOL_DERIVATIVES
    | VEL_BLOCK_DATA
    | CELL_SYSBOUNDARYFLAG;

  /// Everything except block payloads.
  pub const ALL_SPATIAL_DATA: u64 =
    CELL_PARAMETERS | CELL_DERIVATIVES | CELL_BVOL_DERIVATIVES | CELL_SYSBOUNDARYFLAG;
}

/// Which end of a transfer the descriptor is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
  Send,
  Receive,
}

/// Element type of one transfer segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementLayout {
  Real32,
  Real64,
  UInt32,
  UInt64,
}

impl ElementLayout {
  #[inline]
  pub fn size_in_bytes(self) -> usize {
    match self {
      ElementLayout::Real32 | ElementLayout::UInt32 => 4,
      ElementLayout::Real64 | ElementLayout::UInt64 => 8,
    }
  }
}

/// One contiguous memory region of a transfer.
#[derive(Clone, Copy, Debug)]
pub struct TransferSegment {
  pub ptr: *mut u8,
  pub count: usize,
  pub layout: ElementLayout,
}

unsafe impl Send for TransferSegment {}

impl TransferSegment {
  #[inline]
  pub fn len_in_bytes(&self) -> usize {
    self.count * self.layout.size_in_bytes()
  }
}

/// Ordered list of memory segments for one transfer.
#[derive(Debug, Default)]
pub struct TransferDescriptor {
  segments: Vec<TransferSegment>,
}

impl TransferDescriptor {
  #[inline]
  pub fn segments(&self) -> &[TransferSegment] {
    &self.segments
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// Total payload size of the transfer.
  pub fn len_in_bytes(&self) -> usize {
    self.segments.iter().map(TransferSegment::len_in_bytes).sum()
  }

  fn push<T>(&mut self, ptr: *mut T, count: usize, layout: ElementLayout) {
    debug_assert_eq!(std::mem::size_of::<T>(), layout.size_in_bytes());
    self.segments.push(TransferSegment {
      ptr: ptr.cast(),
      count,
      layout,
    });
  }

  /// Serialize all segments into `buf` in descriptor order.
  ///
  /// # Safety
  ///
  /// Every segment pointer must still reference live memory of its recorded
  /// length; the cell the descriptor was built from must be unchanged.
  pub unsafe fn pack(&self, buf: &mut [u8]) {
    assert!(buf.len() >= self.len_in_bytes(), "pack buffer too small");
    let mut offset = 0;
    for seg in &self.segments {
      std::ptr::copy_nonoverlapping(seg.ptr, buf.as_mut_ptr().add(offset), seg.len_in_bytes());
      offset += seg.len_in_bytes();
    }
  }

  /// Deserialize `buf` into the segments in descriptor order.
  ///
  /// # Safety
  ///
  /// Same requirements as [`pack`](Self::pack).
  pub unsafe fn unpack(&self, buf: &[u8]) {
    assert!(buf.len() >= self.len_in_bytes(), "unpack buffer too small");
    let mut offset = 0;
    for seg in &self.segments {
      std::ptr::copy_nonoverlapping(buf.as_ptr().add(offset), seg.ptr, seg.len_in_bytes());
      offset += seg.len_in_bytes();
    }
  }
}

impl SpatialCell {
  /// Build the segment list for one transfer over one population.
  ///
  /// Flags are evaluated in ascending bit order on both ends. Side effects
  /// by flag:
  ///
  /// - `VEL_BLOCK_LIST_STAGE1`, send: snapshots the resident block count.
  /// - `VEL_BLOCK_LIST_STAGE2`, receive: resizes the staging list to the
  ///   stage-1 count.
  /// - `VEL_BLOCK_WITH_CONTENT_STAGE1`, send: snapshots the content-list
  ///   length. Stage 2 receive resizes the content list accordingly.
  /// - `NEIGHBOR_VEL_BLOCK_DATA`, receive: targets the staging buffer set by
  ///   [`set_neighbor_block_data`](Self::set_neighbor_block_data).
  pub fn transfer_descriptor(
    &mut self,
    transfer_type: u64,
    direction: Direction,
    pop: usize,
  ) -> TransferDescriptor {
    let mut d = TransferDescriptor::default();
    let set = |flag: u64| transfer_type & flag != 0;
    let receiving = direction == Direction::Receive;

    if set(flags::CELL_PARAMETERS) {
      d.push(self.parameters.as_mut_ptr(), self.parameters.len(), ElementLayout::Real64);
    }
    if set(flags::CELL_DERIVATIVES) {
      d.push(
        self.derivatives.as_mut_ptr(),
        self.derivatives.len(),
        ElementLayout::Real64,
      );
    }
    if set(flags::VEL_BLOCK_LIST_STAGE1) {
      let p = &mut self.populations[pop];
      if !receiving {
        p.n_blocks = p.vmesh.size() as LocalID;
      }
      d.push(&mut p.n_blocks as *mut LocalID, 1, ElementLayout::UInt32);
    }
    if set(flags::VEL_BLOCK_LIST_STAGE2) {
      if receiving {
        self.prepare_block_list_receive(pop);
      }
      let p = &mut self.populations[pop];
      if receiving {
        d.push(
          p.receive_list.as_mut_ptr(),
          p.receive_list.len(),
          ElementLayout::UInt32,
        );
      } else {
        let count = p.vmesh.size();
        d.push(p.vmesh.global_list_mut_ptr(), count, ElementLayout::UInt32);
      }
    }
    if set(flags::VEL_BLOCK_DATA) {
      let p = &mut self.populations[pop];
      let count = p.blocks.size() * WID3;
      d.push(p.blocks.data_flat_mut().as_mut_ptr(), count, ElementLayout::Real32);
    }
    if set(flags::VEL_BLOCK_PARAMETERS) {
      let p = &mut self.populations[pop];
      let count = p.blocks.size() * N_VELOCITY_BLOCK_PARAMS;
      d.push(
        p.blocks.parameters_flat_mut().as_mut_ptr(),
        count,
        ElementLayout::Real64,
      );
    }
    if set(flags::VEL_BLOCK_WITH_CONTENT_STAGE1) {
      let p = &mut self.populations[pop];
      if !receiving {
        p.content_list_size = p.content_list.len() as LocalID;
      }
      d.push(&mut p.content_list_size as *mut LocalID, 1, ElementLayout::UInt32);
    }
    if set(flags::VEL_BLOCK_WITH_CONTENT_STAGE2) {
      let p = &mut self.populations[pop];
      if receiving {
        p.content_list.resize(p.content_list_size as usize, 0);
      }
      let count = p.content_list_size as usize;
      d.push(p.content_list.as_mut_ptr(), count, ElementLayout::UInt32);
    }
    if set(flags::CELL_SYSBOUNDARYFLAG) {
      d.push(&mut self.sys_boundary_flag as *mut u32, 1, ElementLayout::UInt32);
      d.push(&mut self.sys_boundary_layer as *mut u32, 1, ElementLayout::UInt32);
    }
    if set(flags::CELL_E) {
      d.push(
        self.parameters[cell_params::EX..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_EDT2) {
      d.push(
        self.parameters[cell_params::EX_DT2..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_PERB) {
      d.push(
        self.parameters[cell_params::PERBX..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_PERBDT2) {
      d.push(
        self.parameters[cell_params::PERBX_DT2..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_BGB) {
      d.push(
        self.parameters[cell_params::BGBX..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_RHO_RHOV) {
      d.push(
        self.parameters[cell_params::RHO..].as_mut_ptr(),
        4,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_RHODT2_RHOVDT2) {
      d.push(
        self.parameters[cell_params::RHO_DT2..].as_mut_ptr(),
        4,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_BVOL) {
      d.push(
        self.parameters[cell_params::PERBXVOL..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_BVOL_DERIVATIVES) {
      d.push(
        self.derivatives_bvol.as_mut_ptr(),
        self.derivatives_bvol.len(),
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_DIMENSIONS) {
      d.push(
        self.parameters[cell_params::DX..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_IOLOCALCELLID) {
      d.push(&mut self.io_local_cell_id as *mut u64, 1, ElementLayout::UInt64);
    }
    if set(flags::NEIGHBOR_VEL_BLOCK_DATA) {
      if receiving {
        let count = self.neighbor_number_of_blocks as usize * WID3;
        d.push(self.neighbor_block_data, count, ElementLayout::Real32);
      } else {
        let p = &mut self.populations[pop];
        let count = p.blocks.size() * WID3;
        d.push(p.blocks.data_flat_mut().as_mut_ptr(), count, ElementLayout::Real32);
      }
    }
    if set(flags::CELL_P) {
      d.push(
        self.parameters[cell_params::P_11..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_PDT2) {
      d.push(
        self.parameters[cell_params::P_11_DT2..].as_mut_ptr(),
        3,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_RHOQ_TOT) {
      d.push(
        self.parameters[cell_params::RHOQ_TOT..].as_mut_ptr(),
        1,
        ElementLayout::Real64,
      );
    }
    if set(flags::CELL_PHI) {
      d.push(
        self.parameters[cell_params::PHI..].as_mut_ptr(),
        1,
        ElementLayout::Real64,
      );
    }

    d
  }

  /// Size the staging list to the stage-1 block count, ahead of the stage-2
  /// list transfer. Called automatically when building the stage-2 receive
  /// descriptor.
  pub fn prepare_block_list_receive(&mut self, pop: usize) {
    let p = &mut self.populations[pop];
    p.receive_list.resize(p.n_blocks as usize, 0);
  }

  /// Rebuild a population's mesh and payload storage from the staged block
  /// list, between stage 2 of the block-list exchange and the payload
  /// transfer. Block parameter records are recomputed locally from the grid
  /// geometry rather than shipped.
  ///
  /// Returns `false` (with the population cleared) if the staged list is
  /// invalid.
  pub fn prepare_to_receive_blocks(&mut self, pop: usize) -> bool {
    let layout = Arc::clone(self.layout_arc());
    let p = &mut self.populations[pop];
    let staged = std::mem::take(&mut p.receive_list);
    let ok = p.vmesh.set_grid(&staged);
    p.receive_list = staged;
    if !ok {
      p.blocks.clear();
      return false;
    }
    p.blocks.resize(p.vmesh.size());
    for local in 0..p.vmesh.size() as LocalID {
      let id: GlobalID = p.vmesh.global_id(local);
      crate::cell::write_block_parameters(&layout, id, p.blocks.parameters_mut(local));
    }
    true
  }
}

#[cfg(test)]
#[path = "transfer_test.rs"]
mod transfer_test;
