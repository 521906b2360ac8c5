//! Proptest generators for property-based testing.

use proptest::prelude::*;

use charon_core::{catalogue, Permission, Permissions};

/// Generate a permission segment: no colons, never empty.
pub fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z_ ]{0,11}".prop_map(String::from)
}

/// Generate a subsystem name.
pub fn subsystem() -> impl Strategy<Value = String> {
    "[a-z]{1,6}".prop_map(String::from)
}

/// Generate a valid permission in any subsystem.
pub fn permission() -> impl Strategy<Value = Permission> {
    (subsystem(), segment(), segment()).prop_map(|(s, m, a)| {
        Permission::new(s, m, a).expect("generated segments are valid")
    })
}

/// Generate a valid permission in `subsystem`.
pub fn permission_in(subsystem: String) -> impl Strategy<Value = Permission> {
    (segment(), segment()).prop_map(move |(m, a)| {
        Permission::new(subsystem.clone(), m, a).expect("generated segments are valid")
    })
}

/// Generate a non-empty catalogue of distinct permissions in `subsystem`.
pub fn catalogue_in(subsystem: String, max: usize) -> impl Strategy<Value = Permissions> {
    prop::collection::btree_set(permission_in(subsystem), 1..=max.max(1))
        .prop_map(|set| set.into_iter().collect())
}

/// Generate an arbitrary set of permissions, possibly empty.
pub fn permissions(max: usize) -> impl Strategy<Value = Permissions> {
    prop::collection::vec(permission(), 0..=max).prop_map(Permissions::from)
}

/// Generate a subset of the compiled-in catalogue.
pub fn catalogue_subset() -> impl Strategy<Value = Vec<Permission>> {
    let all = catalogue::ALL_PERMISSIONS.to_vec();
    let len = all.len();
    prop::sample::subsequence(all, 0..=len)
}

/// Generate a username that passes default validation.
pub fn username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{2,15}".prop_map(String::from)
}
