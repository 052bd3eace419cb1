use std::fmt;

use serde::Serialize;

/// Game version stamped at the start of the stream.
///
/// Ordering is lexicographic over `major`, `minor`, `patch`, `developer`. `branch` is
/// compared last and is always 0 in an accepted stream.
/// See <https://wiki.factorio.com/Version_string_format>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub developer: u16,
    pub branch: u8,
}

impl Version {
    /// Streams at or below this version are rejected.
    pub const MINIMUM_EXCLUSIVE: Version = Version::new(1, 0, 0, 0);

    /// Last version that stored the save time as 4-byte seconds. 1.2.0 was never public,
    /// so in practice this means "everything before 2.0".
    pub const LAST_FOUR_BYTE_DATE: Version = Version::new(1, 2, 0, 0x175);

    /// First version with the targeter mapping trailer after the library.
    pub const TARGETER_SPLIT: Version = Version::new(1, 2, 0, 0xa7);

    pub const fn new(major: u16, minor: u16, patch: u16, developer: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            developer,
            branch: 0,
        }
    }

    /// Quality filter lists and 2-byte book indices exist from 2.0 on.
    pub fn has_quality(&self) -> bool {
        self.major >= 2
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.developer
        )
    }
}

/// Signal kind selector, 1 byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SignalType {
    Item = 0,
    Fluid = 1,
    VirtualSignal = 2,
}

impl SignalType {
    pub const ALL: [SignalType; 3] = [Self::Item, Self::Fluid, Self::VirtualSignal];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "ITEM",
            Self::Fluid => "FLUID",
            Self::VirtualSignal => "VIRTUAL_SIGNAL",
        })
    }
}

/// How an array length is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    /// Flexible count: one byte, or 0xFF followed by a `u32`.
    Flexible,
    /// One byte. 0xFF is reserved and rejected.
    U8,
    U16,
    U32,
}
