//! Assertions over field masks.

use stasis_core::{FieldCatalog, FieldMask};

/// Assert that `mask` holds exactly the members whose keys are listed.
///
/// # Panics
///
/// Panics when the key sets differ.
#[track_caller]
pub fn assert_mask_keys<C: FieldCatalog>(mask: FieldMask<C>, expected: &[&str]) {
    let mut actual = mask.keys();
    let mut expected = expected.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected, "{} mask keys differ", C::NAME);
}

/// Assert `inner ⊆ outer`.
///
/// # Panics
///
/// Panics when `inner` has a member missing from `outer`.
#[track_caller]
pub fn assert_subset<C: FieldCatalog>(inner: FieldMask<C>, outer: FieldMask<C>) {
    assert!(
        inner.is_subset_of(outer),
        "{:?} is not a subset of {:?}; extra members {:?}",
        inner,
        outer,
        inner - outer
    );
}
