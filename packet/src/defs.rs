// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::ops::{BitOr, BitOrAssign};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// What the client is currently doing, as shown in its status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Action {
    #[default]
    Idle = 0,
    Afk = 1,
    Playing = 2,
    Editing = 3,
    Modding = 4,
    Multiplayer = 5,
    Watching = 6,
    Unknown = 7,
    Testing = 8,
    Submitting = 9,
    Paused = 10,
    Lobby = 11,
    Multiplaying = 12,
    OsuDirect = 13,
}

/// Game mode. Stats and leaderboards are kept per mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Mode {
    #[default]
    Osu = 0,
    Taiko = 1,
    Ctb = 2,
    Mania = 3,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Osu, Mode::Taiko, Mode::Ctb, Mode::Mania];
}

/// Account privilege bits. A user without the PLAYER bit is
/// "restricted": they receive their own events but are invisible to
/// everyone else and may only use a whitelisted packet subset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Privileges(pub u32);

impl Privileges {
    pub const PLAYER: Privileges = Privileges(1 << 0);
    pub const MODERATOR: Privileges = Privileges(1 << 1);
    pub const SUPPORTER: Privileges = Privileges(1 << 2);
    pub const OWNER: Privileges = Privileges(1 << 3);
    pub const DEVELOPER: Privileges = Privileges(1 << 4);
    pub const TOURNAMENT: Privileges = Privileges(1 << 5);

    pub const STAFF: Privileges =
        Privileges(Self::MODERATOR.0 | Self::OWNER.0 | Self::DEVELOPER.0);

    pub fn intersects(self, other: Privileges) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_restricted(self) -> bool {
        self.0 & Self::PLAYER.0 == 0
    }
}

impl BitOr for Privileges {
    type Output = Privileges;

    fn bitor(self, rhs: Privileges) -> Privileges {
        Privileges(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Privileges) {
        self.0 |= rhs.0;
    }
}

impl From<u32> for Privileges {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
