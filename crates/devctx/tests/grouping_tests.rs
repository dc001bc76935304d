//! Property tests for descriptor grouping and filtering

use descriptors::{EndpointDescriptor, WILDCARD_UNIQUE_ID};
use devctx::grouping::{
    filter_by_interface, filter_by_product, find_by_interface, group_by_unique_id,
    pair_groups_with_auxiliary, remove_claimed,
};
use devctx::Error;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for video descriptors spread over a few physical paths
fn video_strategy() -> impl Strategy<Value = EndpointDescriptor> {
    (0u8..4, 0x0ad1u16..0x0ad6, 0u8..6).prop_map(|(port, pid, mi)| {
        EndpointDescriptor::video(0x8086, pid, format!("1-{}", port), mi)
    })
}

/// Strategy for auxiliary descriptors, some of them wildcards
fn hid_strategy() -> impl Strategy<Value = EndpointDescriptor> {
    (prop_oneof![(0u8..4).prop_map(|p| format!("1-{}", p)), Just(WILDCARD_UNIQUE_ID.to_string())])
        .prop_map(|uid| EndpointDescriptor::hid(0x8086, 0x0ad3, uid, 5))
}

fn sorted(mut descriptors: Vec<EndpointDescriptor>) -> Vec<EndpointDescriptor> {
    descriptors.sort();
    descriptors
}

proptest! {
    /// Property: groups partition the input exactly, one unique_id per group
    #[test]
    fn prop_grouping_is_partition(descriptors in proptest::collection::vec(video_strategy(), 0..24)) {
        let groups = group_by_unique_id(&descriptors);

        let mut seen_ids = BTreeSet::new();
        for group in &groups {
            prop_assert!(!group.is_empty());
            let uid = &group[0].unique_id;
            prop_assert!(group.iter().all(|d| &d.unique_id == uid));
            prop_assert!(seen_ids.insert(uid.clone()), "unique_id {} in two groups", uid);
        }

        let flattened: Vec<_> = groups.into_iter().flatten().collect();
        prop_assert_eq!(sorted(flattened), sorted(descriptors));
    }

    /// Property: groups come out in ascending unique_id order
    #[test]
    fn prop_groups_sorted(descriptors in proptest::collection::vec(video_strategy(), 0..24)) {
        let ids: Vec<_> = group_by_unique_id(&descriptors)
            .iter()
            .map(|g| g[0].unique_id.clone())
            .collect();
        let mut expected = ids.clone();
        expected.sort();
        prop_assert_eq!(ids, expected);
    }

    /// Property: a wildcard auxiliary descriptor is paired with every group
    #[test]
    fn prop_wildcard_broadcast(
        video in proptest::collection::vec(video_strategy(), 1..16),
        hid in proptest::collection::vec(hid_strategy(), 0..8),
    ) {
        let groups = group_by_unique_id(&video);
        let group_count = groups.len();
        let paired = pair_groups_with_auxiliary(groups, &hid);
        prop_assert_eq!(paired.len(), group_count);

        for (group, aux) in &paired {
            for wildcard in hid.iter().filter(|d| d.is_wildcard()) {
                prop_assert!(aux.contains(wildcard));
            }
            prop_assert!(aux
                .iter()
                .all(|d| d.is_wildcard() || d.unique_id == group[0].unique_id));
        }
    }

    /// Property: filtering by a set of ids and by its complement covers the input
    #[test]
    fn prop_filter_union(
        descriptors in proptest::collection::vec(video_strategy(), 0..24),
        split in 0x0ad1u16..0x0ad6,
    ) {
        let allowed: Vec<u16> = (0x0ad1..split).collect();
        let complement: Vec<u16> = (split..0x0ad6).collect();

        let mut union = filter_by_product(&descriptors, &allowed);
        union.extend(filter_by_product(&descriptors, &complement));
        prop_assert_eq!(sorted(union), sorted(descriptors));
    }

    /// Property: removing a claimed subset leaves nothing of it behind
    #[test]
    fn prop_remove_claimed(
        descriptors in proptest::collection::vec(video_strategy(), 0..24),
        mask in proptest::collection::vec(any::<bool>(), 24),
    ) {
        let chosen: Vec<_> = descriptors
            .iter()
            .zip(&mask)
            .filter(|(_, take)| **take)
            .map(|(d, _)| d.clone())
            .collect();

        let mut remaining = descriptors.clone();
        remove_claimed(&mut remaining, &chosen);
        prop_assert!(remaining.iter().all(|d| !chosen.contains(d)));
        prop_assert!(remaining.iter().all(|d| descriptors.contains(d)));

        let mut untouched = descriptors.clone();
        remove_claimed(&mut untouched, &[]);
        prop_assert_eq!(untouched, descriptors);
    }

    /// Property: interface filters only return matching descriptors
    #[test]
    fn prop_filter_by_interface(
        descriptors in proptest::collection::vec(video_strategy(), 0..24),
        mi in 0u8..6,
    ) {
        let matching = filter_by_interface(&descriptors, mi);
        prop_assert!(matching.iter().all(|d| d.interface_index == mi));
        prop_assert_eq!(
            matching.len(),
            descriptors.iter().filter(|d| d.interface_index == mi).count()
        );
        prop_assert_eq!(find_by_interface(&descriptors, mi).is_ok(), !matching.is_empty());
    }
}

#[test]
fn test_find_by_interface_not_found() {
    let descriptors = vec![EndpointDescriptor::video(0x8086, 0x0ad3, "1-1", 0)];
    assert!(matches!(
        find_by_interface(&descriptors, 3),
        Err(Error::NotFound { interface: 3 })
    ));
}

#[test]
fn test_find_by_interface_first_match() {
    let descriptors = vec![
        EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 0),
        EndpointDescriptor::video(0x8086, 0x0ad3, "1-1", 0),
    ];
    assert_eq!(find_by_interface(&descriptors, 0).unwrap().unique_id, "1-2");
}

#[test]
fn test_multiple_wildcards_all_attached() {
    let video = vec![
        EndpointDescriptor::video(0x8086, 0x0ad3, "1-1", 0),
        EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 0),
    ];
    let hid = vec![
        EndpointDescriptor::hid(0x8086, 0x0ad3, WILDCARD_UNIQUE_ID, 4),
        EndpointDescriptor::hid(0x8086, 0x0ad3, WILDCARD_UNIQUE_ID, 5),
        EndpointDescriptor::hid(0x8086, 0x0ad3, "1-2", 6),
    ];

    let paired = pair_groups_with_auxiliary(group_by_unique_id(&video), &hid);
    assert_eq!(paired[0].1.len(), 2);
    assert_eq!(paired[1].1.len(), 3);
}
