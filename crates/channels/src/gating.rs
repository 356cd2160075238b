use serde::{Deserialize, Serialize};

/// Guild-level permission bits of the member invoking a command.
///
/// Bit positions follow Discord's permission integer so adapters can pass
/// the raw value through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Decide whether an actor may run a command that needs `required`.
///
/// Administrators pass every check; everyone else needs all required bits.
pub fn is_permitted(actor: Permissions, required: Permissions) -> bool {
    actor.contains(Permissions::ADMINISTRATOR) || actor.contains(required)
}
