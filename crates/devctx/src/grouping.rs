//! Descriptor grouping and filtering
//!
//! Pure functions partitioning and filtering descriptor collections. Nothing
//! here holds state, so every function can be tested in isolation. Output
//! order is deterministic: groups come out in ascending `unique_id` order and
//! filters preserve the relative order of their input.

use crate::error::{Error, Result};
use descriptors::EndpointDescriptor;
use std::collections::BTreeMap;

/// A group of primary descriptors paired with the auxiliary descriptors
/// associated with it
pub type GroupWithAuxiliary = (Vec<EndpointDescriptor>, Vec<EndpointDescriptor>);

/// Partition primary descriptors into groups sharing one `unique_id`
///
/// Every input descriptor lands in exactly one group and no group is empty.
/// Groups are ordered by ascending `unique_id`; inside a group the input order
/// is kept.
pub fn group_by_unique_id(descriptors: &[EndpointDescriptor]) -> Vec<Vec<EndpointDescriptor>> {
    let mut groups: BTreeMap<&str, Vec<EndpointDescriptor>> = BTreeMap::new();
    for descriptor in descriptors {
        groups
            .entry(descriptor.unique_id.as_str())
            .or_default()
            .push(descriptor.clone());
    }
    groups.into_values().collect()
}

/// Pair each group with the auxiliary descriptors that belong to it
///
/// An auxiliary descriptor belongs to a group when its `unique_id` matches the
/// group's, or when it is a wildcard. Wildcard descriptors are attached to
/// every group; when a snapshot holds several, all of them are attached.
pub fn pair_groups_with_auxiliary(
    groups: Vec<Vec<EndpointDescriptor>>,
    aux_descriptors: &[EndpointDescriptor],
) -> Vec<GroupWithAuxiliary> {
    groups
        .into_iter()
        .filter_map(|group| {
            let unique_id = group.first()?.unique_id.clone();
            let aux = aux_descriptors
                .iter()
                .filter(|aux| aux.unique_id == unique_id || aux.is_wildcard())
                .cloned()
                .collect();
            Some((group, aux))
        })
        .collect()
}

/// Keep descriptors whose product id is in `allowed_ids`
pub fn filter_by_product(
    descriptors: &[EndpointDescriptor],
    allowed_ids: &[u16],
) -> Vec<EndpointDescriptor> {
    descriptors
        .iter()
        .filter(|d| allowed_ids.contains(&d.product_id))
        .cloned()
        .collect()
}

/// Keep descriptors exposing the given interface index
pub fn filter_by_interface(
    descriptors: &[EndpointDescriptor],
    interface_index: u8,
) -> Vec<EndpointDescriptor> {
    descriptors
        .iter()
        .filter(|d| d.interface_index == interface_index)
        .cloned()
        .collect()
}

/// Whether any descriptor exposes the given interface index
pub fn interface_present(descriptors: &[EndpointDescriptor], interface_index: u8) -> bool {
    descriptors
        .iter()
        .any(|d| d.interface_index == interface_index)
}

/// Find the descriptor exposing the given interface index
///
/// Callers use this when exactly one match is expected. With several matches
/// the first one in input order is returned.
pub fn find_by_interface(
    descriptors: &[EndpointDescriptor],
    interface_index: u8,
) -> Result<&EndpointDescriptor> {
    descriptors
        .iter()
        .find(|d| d.interface_index == interface_index)
        .ok_or(Error::NotFound {
            interface: interface_index,
        })
}

/// Remove every descriptor present in `chosen` from `remaining`
///
/// Matching is by structural equality. Used once a descriptor has been claimed
/// for a logical device so later grouping passes skip it.
pub fn remove_claimed(remaining: &mut Vec<EndpointDescriptor>, chosen: &[EndpointDescriptor]) {
    if chosen.is_empty() {
        return;
    }
    remaining.retain(|d| !chosen.contains(d));
}
