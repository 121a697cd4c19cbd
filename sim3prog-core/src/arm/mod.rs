// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Contains ARM specific objects and routines

pub mod dp;
pub mod map;
pub mod register;
pub mod scs;

use core::fmt;

use dp::IdCode;

/// ARM Cortex core type, as identified by the SW-DP IDCODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cortex {
    /// Cortex-M0 (and M0+ with a DPv1 SW-DP)
    M0,
    /// Cortex-M3
    M3,
}

impl Cortex {
    /// SW-DP found on Cortex-M0 parts
    pub const IDCODE_M0: IdCode = IdCode::new(0x0BB11477);

    /// SW-DP found on older Cortex-M3 parts
    pub const IDCODE_M3_R1: IdCode = IdCode::new(0x1BA01477);

    /// SWJ-DP found on SiM3U/C/L Cortex-M3 parts
    pub const IDCODE_M3: IdCode = IdCode::new(0x2BA01477);

    /// Returns the DPIDR IDCODE normally reported for this core type
    pub fn idcode(&self) -> IdCode {
        match self {
            Cortex::M0 => Self::IDCODE_M0,
            Cortex::M3 => Self::IDCODE_M3,
        }
    }

    /// Returns the core type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Cortex::M0 => "Cortex-M0",
            Cortex::M3 => "Cortex-M3",
        }
    }

    pub fn from_idcode(idcode: IdCode) -> Option<Cortex> {
        match idcode {
            Self::IDCODE_M0 => Some(Cortex::M0),
            Self::IDCODE_M3 | Self::IDCODE_M3_R1 => Some(Cortex::M3),
            _ => None,
        }
    }
}

impl fmt::Display for Cortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARM {}", self.as_str())
    }
}
