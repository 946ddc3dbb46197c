//! Member access permissions.
//!
//! Every storage slot carries a `Permission`. The access tier (`PUBLIC`,
//! `PROTECTED`, `PRIVATE`) is fixed when the binding is declared; of the
//! remaining bits only the runtime's `INVALID` tombstone changes afterwards.

use bitflags::bitflags;

bitflags! {
    /// Access-permission tag of a member slot.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Permission: u16 {
        // === Access tier (mutually exclusive) ===

        /// Visible to external member access.
        const PUBLIC = 1 << 0;
        /// Visible to the object and its subtypes.
        const PROTECTED = 1 << 1;
        /// Visible only inside the declaring body.
        const PRIVATE = 1 << 2;

        // === Modifiers ===

        /// Write-once after the first assignment.
        const CONST = 1 << 4;
        /// Shared across instances (lives in the function's static scope).
        const STATIC = 1 << 5;

        // === Runtime state ===

        /// Tombstoned slot; reads treat it as absent.
        const INVALID = 1 << 8;
    }
}

impl Permission {
    /// Mask of the access-tier bits.
    pub const TIER_MASK: Self = Self::PUBLIC.union(Self::PROTECTED).union(Self::PRIVATE);

    /// The access tier bits alone.
    #[inline]
    pub const fn tier(self) -> Self {
        self.intersection(Self::TIER_MASK)
    }

    /// Whether the slot is private to its declaring body.
    #[inline]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Whether the slot is write-once.
    #[inline]
    pub const fn is_const(self) -> bool {
        self.contains(Self::CONST)
    }

    /// Whether the slot has been tombstoned.
    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.contains(Self::INVALID)
    }

    /// Normalise a declared permission: at most one tier, `PUBLIC` if none.
    ///
    /// The strictest tier present wins, so `PUBLIC | PRIVATE` becomes
    /// `PRIVATE`.
    #[must_use]
    pub fn declared(self) -> Self {
        let modifiers = self.difference(Self::TIER_MASK);
        let tier = if self.contains(Self::PRIVATE) {
            Self::PRIVATE
        } else if self.contains(Self::PROTECTED) {
            Self::PROTECTED
        } else {
            Self::PUBLIC
        };
        modifiers | tier
    }
}

/// Permission-filtered view of a scope shape.
///
/// Each scope shape exists in three variants; which one a scope uses
/// depends on who is accessing it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PermissionTier {
    /// Every member, for unrestricted introspection and plain call scopes.
    All,
    /// Public and protected members: the constructed object's own table.
    PublicProtected,
    /// Private members: the constructor body's own table.
    Private,
}

impl PermissionTier {
    /// Whether a member with `perm` belongs to this view.
    #[inline]
    pub fn admits(self, perm: Permission) -> bool {
        match self {
            PermissionTier::All => true,
            PermissionTier::PublicProtected => !perm.is_private(),
            PermissionTier::Private => perm.is_private(),
        }
    }
}
