//! IRQ flags and operating modes.
//!
//! Flag values follow the SX126x `IrqStatus` register so traces read the
//! same as on hardware. The simulator raises them itself from the outcome
//! of each operation.
//!
//! The flag set and [`OperatingMode`] mirror the chip registers in full.
//! The simulator never raises `PREAMBLE_DETECTED`, `SYNCWORD_VALID` or
//! `CAD_ACTIVITY_DETECTED`, and never enters `StandbyXosc`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of pending interrupt conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IrqFlags(u16);

impl IrqFlags {
    pub const NONE: Self = Self(0x0000);
    pub const TX_DONE: Self = Self(0x0001);
    pub const RX_DONE: Self = Self(0x0002);
    pub const PREAMBLE_DETECTED: Self = Self(0x0004);
    pub const SYNCWORD_VALID: Self = Self(0x0008);
    pub const HEADER_VALID: Self = Self(0x0010);
    pub const HEADER_ERROR: Self = Self(0x0020);
    pub const CRC_ERROR: Self = Self(0x0040);
    pub const CAD_DONE: Self = Self(0x0080);
    pub const CAD_ACTIVITY_DETECTED: Self = Self(0x0100);
    pub const RX_TX_TIMEOUT: Self = Self(0x0200);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Return the current set and clear it.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl BitOr for IrqFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for IrqFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for IrqFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Chip operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperatingMode {
    #[default]
    Idle,
    StandbyRc,
    StandbyXosc,
    Tx,
    Rx,
    RxDutyCycle,
    Cad,
}

/// Coarse radio state reported to the upper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Idle,
    RxRunning,
    TxRunning,
    Cad,
}

impl From<OperatingMode> for RadioState {
    fn from(mode: OperatingMode) -> Self {
        match mode {
            OperatingMode::Tx => Self::TxRunning,
            OperatingMode::Rx | OperatingMode::RxDutyCycle => Self::RxRunning,
            OperatingMode::Cad => Self::Cad,
            OperatingMode::Idle | OperatingMode::StandbyRc | OperatingMode::StandbyXosc => Self::Idle,
        }
    }
}
