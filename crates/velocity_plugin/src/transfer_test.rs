use std::sync::Arc;

use glam::DVec3;

use crate::cell::SpatialCell;
use crate::constants::{block_params, cell_params};
use crate::mesh::MeshLayout;
use crate::types::SpeciesParams;

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

/// Pack on the sender, unpack on the receiver, as the exchange layer would.
fn exchange(sender: &mut SpatialCell, receiver: &mut SpatialCell, transfer_type: u64) {
  let sd = sender.transfer_descriptor(transfer_type, Direction::Send, 0);
  let mut buf = vec![0u8; sd.len_in_bytes()];
  unsafe { sd.pack(&mut buf) };

  let rd = receiver.transfer_descriptor(transfer_type, Direction::Receive, 0);
  assert_eq!(rd.len_in_bytes(), buf.len(), "send/receive layouts disagree");
  unsafe { rd.unpack(&buf) };
}

#[test]
fn test_spatial_data_segment_layout() {
  let mut c = cell();
  let d = c.transfer_descriptor(flags::ALL_SPATIAL_DATA, Direction::Send, 0);
  let sizes: Vec<(usize, ElementLayout)> =
    d.segments().iter().map(|s| (s.count, s.layout)).collect();
  assert_eq!(
    sizes,
    vec![
      (cell_params::N_SPATIAL_CELL_PARAMS, ElementLayout::Real64),
      (crate::constants::N_SPATIAL_CELL_DERIVATIVES, ElementLayout::Real64),
      (1, ElementLayout::UInt32),
      (1, ElementLayout::UInt32),
      (crate::constants::N_BVOL_DERIVATIVES, ElementLayout::Real64),
    ]
  );
  assert_eq!(d.len_in_bytes(), 40 * 8 + 27 * 8 + 8 + 6 * 8);
}

/// ALL_DATA adds the block payload but still excludes the block lists,
/// which travel through the staged two-phase exchange instead.
#[test]
fn test_all_data_segment_layout() {
  let mut c = cell();
  c.set_value(0, DVec3::new(0.5, 0.5, 0.5), 1.0).unwrap();
  let n_blocks = c.population(0).size();

  let d = c.transfer_descriptor(flags::ALL_DATA, Direction::Send, 0);
  let sizes: Vec<(usize, ElementLayout)> =
    d.segments().iter().map(|s| (s.count, s.layout)).collect();
  assert_eq!(
    sizes,
    vec![
      (cell_params::N_SPATIAL_CELL_PARAMS, ElementLayout::Real64),
      (crate::constants::N_SPATIAL_CELL_DERIVATIVES, ElementLayout::Real64),
      (n_blocks * crate::constants::WID3, ElementLayout::Real32),
      (1, ElementLayout::UInt32),
      (1, ElementLayout::UInt32),
      (crate::constants::N_BVOL_DERIVATIVES, ElementLayout::Real64),
    ]
  );
}

#[test]
fn test_spatial_data_round_trip() {
  let mut sender = cell();
  sender.parameters_mut()[cell_params::RHO] = 3.5;
  sender.derivatives_mut()[4] = -1.25;
  sender.derivatives_bvol_mut()[2] = 0.5;
  sender.set_sys_boundary_flag(7);
  sender.set_sys_boundary_layer(2);

  let mut receiver = cell();
  exchange(&mut sender, &mut receiver, flags::ALL_SPATIAL_DATA);

  assert_eq!(receiver.parameters()[cell_params::RHO], 3.5);
  assert_eq!(receiver.derivatives()[4], -1.25);
  assert_eq!(receiver.derivatives_bvol()[2], 0.5);
  assert_eq!(receiver.sys_boundary_flag(), 7);
  assert_eq!(receiver.sys_boundary_layer(), 2);
}

/// The full two-phase block exchange: count, list, prepare, payload.
#[test]
fn test_two_phase_block_exchange() {
  let mut sender = cell();
  sender.set_value(0, DVec3::new(0.3, -1.7, 2.1), 2.5).unwrap();
  sender.set_value(0, DVec3::new(-3.0, 3.0, 0.5), 1.5).unwrap();
  let sent_list: Vec<_> = sender.population(0).vmesh().global_list().to_vec();

  let mut receiver = cell();
  exchange(&mut sender, &mut receiver, flags::VEL_BLOCK_LIST_STAGE1);
  exchange(&mut sender, &mut receiver, flags::VEL_BLOCK_LIST_STAGE2);
  assert!(receiver.prepare_to_receive_blocks(0));
  exchange(&mut sender, &mut receiver, flags::VEL_BLOCK_DATA);

  let rp = receiver.population(0);
  assert_eq!(rp.vmesh().global_list(), sent_list.as_slice());
  assert!(receiver.check_mesh(0));
  assert_eq!(receiver.get_value(0, DVec3::new(0.3, -1.7, 2.1)), 2.5);
  assert_eq!(receiver.get_value(0, DVec3::new(-3.0, 3.0, 0.5)), 1.5);

  // Parameter records are rebuilt locally, not shipped.
  let local = rp.vmesh().local_id(sent_list[0]);
  let expected = sender.population(0).blocks().parameters(local);
  assert_eq!(rp.blocks().parameters(local), expected);
  assert_ne!(rp.blocks().parameters(local)[block_params::DVX], 0.0);
}

#[test]
fn test_content_list_exchange() {
  let mut sender = cell();
  sender.set_value(0, DVec3::new(0.3, -1.7, 2.1), 2.5).unwrap();
  sender.add_block(0, sender.layout().global_id(0, 3, 3, 3));
  sender.update_content_lists(0);
  let sent: Vec<_> = sender.population(0).content_list().to_vec();
  assert_eq!(sent.len(), 1);

  let mut receiver = cell();
  exchange(&mut sender, &mut receiver, flags::VEL_BLOCK_WITH_CONTENT_STAGE1);
  exchange(&mut sender, &mut receiver, flags::VEL_BLOCK_WITH_CONTENT_STAGE2);

  assert_eq!(receiver.population(0).content_list(), sent.as_slice());
}

/// Neighbor payloads land in the externally owned staging buffer, not in
/// the receiving cell's own container.
#[test]
fn test_neighbor_block_data_targets_staging_buffer() {
  let mut sender = cell();
  sender.set_value(0, DVec3::new(0.5, 0.5, 0.5), 4.0).unwrap();
  let n_blocks = sender.population(0).size();

  let mut receiver = cell();
  let mut staging = vec![0.0f32; n_blocks * crate::constants::WID3];
  receiver.set_neighbor_block_data(staging.as_mut_ptr(), n_blocks as u32);

  exchange(&mut sender, &mut receiver, flags::NEIGHBOR_VEL_BLOCK_DATA);

  assert_eq!(receiver.population(0).size(), 0);
  assert_eq!(staging, sender.population(0).blocks().data_flat());
}

#[test]
fn test_field_segment_round_trip() {
  let mut sender = cell();
  sender.parameters_mut()[cell_params::EX] = 1.0;
  sender.parameters_mut()[cell_params::EY] = 2.0;
  sender.parameters_mut()[cell_params::EZ] = 3.0;
  sender.parameters_mut()[cell_params::PHI] = -9.0;

  let mut receiver = cell();
  exchange(&mut sender, &mut receiver, flags::CELL_E | flags::CELL_PHI);

  assert_eq!(receiver.parameters()[cell_params::EX], 1.0);
  assert_eq!(receiver.parameters()[cell_params::EY], 2.0);
  assert_eq!(receiver.parameters()[cell_params::EZ], 3.0);
  assert_eq!(receiver.parameters()[cell_params::PHI], -9.0);
  assert_eq!(receiver.parameters()[cell_params::RHO], 0.0, "unflagged fields untouched");
}

/// A corrupted stage-2 list (here: a duplicate id) fails preparation and
/// leaves the population empty.
#[test]
fn test_prepare_rejects_invalid_staged_list() {
  let mut receiver = cell();
  let valid = receiver.layout().global_id(0, 0, 0, 0);
  receiver.population_mut(0).blocks_mut().resize(1);
  {
    let p = receiver.population_mut(0);
    p.receive_list = vec![valid, valid];
  }
  assert!(!receiver.prepare_to_receive_blocks(0));
  assert_eq!(receiver.population(0).size(), 0);
  assert_eq!(receiver.population(0).blocks().size(), 0);
}
