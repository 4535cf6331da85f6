//! Typed bit-sets over a field catalog.

use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub};

use super::catalog::FieldCatalog;

/// A set of fields from catalog `C`.
///
/// Masks can only be built from catalog members, so every mask is a subset of
/// [`FieldMask::all`].
pub struct FieldMask<C> {
    bits: u64,
    catalog: PhantomData<fn() -> C>,
}

impl<C: FieldCatalog> FieldMask<C> {
    /// The empty set.
    pub const EMPTY: Self = Self::from_raw(0);

    const fn from_raw(bits: u64) -> Self {
        Self {
            bits,
            catalog: PhantomData,
        }
    }

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Every field in the catalog.
    #[must_use]
    pub const fn all() -> Self {
        Self::from_raw(C::ALL_BITS)
    }

    /// A mask holding exactly `field`.
    #[must_use]
    pub fn only(field: C) -> Self {
        Self::from_raw(1_u64 << field.bit())
    }

    /// Rebuild a mask from raw bits, rejecting bits outside the catalog.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        if bits & !C::ALL_BITS == 0 {
            Some(Self::from_raw(bits))
        } else {
            None
        }
    }

    /// Rebuild a mask from raw bits, dropping anything outside the catalog.
    #[must_use]
    pub const fn from_bits_truncate(bits: u64) -> Self {
        Self::from_raw(bits & C::ALL_BITS)
    }

    /// Raw representation, for diagnostics.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Whether every catalog field is set.
    #[must_use]
    pub const fn is_all(self) -> bool {
        self.bits == C::ALL_BITS
    }

    /// Number of fields set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether `field` is set.
    #[must_use]
    pub fn contains(self, field: C) -> bool {
        self.bits & (1_u64 << field.bit()) != 0
    }

    /// Add `field`.
    pub fn insert(&mut self, field: C) {
        self.bits |= 1_u64 << field.bit();
    }

    /// Remove `field`.
    pub fn remove(&mut self, field: C) {
        self.bits &= !(1_u64 << field.bit());
    }

    /// Copy of `self` with `field` added.
    #[must_use]
    pub fn with(mut self, field: C) -> Self {
        self.insert(field);
        self
    }

    /// Fields in either mask.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self::from_raw(self.bits | other.bits)
    }

    /// Fields in both masks.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self::from_raw(self.bits & other.bits)
    }

    /// Fields in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self::from_raw(self.bits & !other.bits)
    }

    /// Whether the masks share at least one field.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.bits & other.bits != 0
    }

    /// Whether every field in `self` is also in `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.bits & !other.bits == 0
    }

    /// Iterate the set fields in catalog order.
    pub fn iter(self) -> impl Iterator<Item = C> {
        C::ALL
            .iter()
            .copied()
            .filter(move |field| self.contains(*field))
    }

    /// Stable keys of the set fields, for logs and events.
    #[must_use]
    pub fn keys(self) -> Vec<&'static str> {
        self.iter().map(FieldCatalog::key).collect()
    }
}

impl<C> Clone for FieldMask<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for FieldMask<C> {}

impl<C> PartialEq for FieldMask<C> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<C> Eq for FieldMask<C> {}

impl<C> Hash for FieldMask<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<C: FieldCatalog> Default for FieldMask<C> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<C: FieldCatalog> Debug for FieldMask<C> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<C: FieldCatalog> From<C> for FieldMask<C> {
    fn from(field: C) -> Self {
        Self::only(field)
    }
}

impl<C: FieldCatalog> FromIterator<C> for FieldMask<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        mask.extend(iter);
        mask
    }
}

impl<C: FieldCatalog> Extend<C> for FieldMask<C> {
    fn extend<I: IntoIterator<Item = C>>(&mut self, iter: I) {
        for field in iter {
            self.insert(field);
        }
    }
}

impl<C: FieldCatalog> BitOr for FieldMask<C> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl<C: FieldCatalog> BitOrAssign for FieldMask<C> {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl<C: FieldCatalog> BitAnd for FieldMask<C> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl<C: FieldCatalog> BitAndAssign for FieldMask<C> {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersection(rhs);
    }
}

impl<C: FieldCatalog> Sub for FieldMask<C> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}
