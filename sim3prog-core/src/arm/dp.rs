// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Port Registers

use crate::arm::register::{DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::{register_bit, register_data};
use alloc::{format, string::String};
use core::fmt;
use static_assertions::const_assert_eq;

/// IDCODE Register descriptor (read-only)
pub struct IdCodeRegister;

impl RegisterDescriptor for IdCodeRegister {
    const ADDRESS: u8 = 0x00;
    type Value = IdCode;
}

impl ReadableRegister for IdCodeRegister {}
impl DpRegister for IdCodeRegister {}

/// ARM Debug Port IDCODE register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdCode(u32);

impl IdCode {
    pub const fn new(value: u32) -> Self {
        IdCode(value)
    }

    pub fn data(&self) -> u32 {
        self.0
    }

    /// Get revision field (bits 31:28)
    pub fn revision(&self) -> u8 {
        ((self.0 >> 28) & 0xF) as u8
    }

    /// Get part number (bits 27:12)
    pub fn part_number(&self) -> u16 {
        ((self.0 >> 12) & 0xFFFF) as u16
    }

    /// Get JEDEC designer ID (bits 11:1)
    pub fn designer_id(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// Check if LSB is set (should always be 1 for valid IDCODE)
    pub fn is_valid(&self) -> bool {
        (self.0 & 1) == 1
    }

    /// Check if this IDCODE was designed by ARM
    pub fn is_arm(&self) -> bool {
        self.designer_id() == 0x23B
    }
}

impl From<u32> for IdCode {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<IdCode> for u32 {
    fn from(value: IdCode) -> u32 {
        value.0
    }
}

impl fmt::Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            if !self.is_valid() {
                return write!(f, "Invalid IDCODE: 0x{:08X} (LSB not set)", self.0);
            }
            let designer = if self.is_arm() { "ARM Ltd" } else { "Unknown" };
            write!(
                f,
                "0x{:08X} ({designer}, part 0x{:04X}, rev {})",
                self.0,
                self.part_number(),
                self.revision()
            )
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

/// ABORT Register descriptor (write-only)
pub struct AbortRegister;

impl RegisterDescriptor for AbortRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Abort;
}

impl WritableRegister for AbortRegister {}
impl DpRegister for AbortRegister {}

/// ARM Debug Port ABORT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Abort(u32);

register_data!(w Abort);

impl Abort {
    const DAPABORT: u32 = 1 << 0;
    const STKCMPCLR: u32 = 1 << 1;
    const STKERRCLR: u32 = 1 << 2;
    const WDERRCLR: u32 = 1 << 3;
    const ORUNERRCLR: u32 = 1 << 4;

    /// Clears every sticky error flag, without aborting the current AP
    /// transaction.
    pub const CLEAR_ALL: Abort =
        Abort(Self::STKCMPCLR | Self::STKERRCLR | Self::WDERRCLR | Self::ORUNERRCLR);

    pub const fn new(value: u32) -> Self {
        Abort(value)
    }

    register_bit!(dapabort, set_dapabort, Self::DAPABORT, "DAP abort flag");
    register_bit!(stkcmpclr, set_stkcmpclr, Self::STKCMPCLR, "sticky compare clear flag");
    register_bit!(stkerrclr, set_stkerrclr, Self::STKERRCLR, "sticky error clear flag");
    register_bit!(wderrclr, set_wderrclr, Self::WDERRCLR, "write data error clear flag");
    register_bit!(orunerrclr, set_orunerrclr, Self::ORUNERRCLR, "overrun error clear flag");
}

const_assert_eq!(Abort::CLEAR_ALL.0, 0x1E);

/// CTRL/STAT Register descriptor (read-write)
pub struct CtrlStatRegister;

impl RegisterDescriptor for CtrlStatRegister {
    const ADDRESS: u8 = 0x04;
    type Value = CtrlStat;
}

impl ReadableRegister for CtrlStatRegister {}
impl WritableRegister for CtrlStatRegister {}
impl DpRegister for CtrlStatRegister {}

/// ARM Debug Port CTRL/STAT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlStat(u32);

register_data!(rw CtrlStat);

impl CtrlStat {
    const ORUNDETECT: u32 = 1 << 0;
    const STICKYORUN: u32 = 1 << 1;
    const STICKYCMP: u32 = 1 << 4;
    const STICKYERR: u32 = 1 << 5;
    const READOK: u32 = 1 << 6;
    const WDATAERR: u32 = 1 << 7;
    const CDBGRSTREQ: u32 = 1 << 26;
    const CDBGRSTACK: u32 = 1 << 27;
    const CDBGPWRUPREQ: u32 = 1 << 28;
    const CDBGPWRUPACK: u32 = 1 << 29;
    const CSYSPWRUPREQ: u32 = 1 << 30;
    const CSYSPWRUPACK: u32 = 1 << 31;

    /// Requests both debug and system power domains
    pub const POWER_UP: CtrlStat = CtrlStat(Self::CDBGPWRUPREQ | Self::CSYSPWRUPREQ);

    /// Drops all power-up requests
    pub const POWER_DOWN: CtrlStat = CtrlStat(0);

    pub const fn new(value: u32) -> Self {
        CtrlStat(value)
    }

    /// Get raw register value
    pub fn value(&self) -> u32 {
        self.0
    }

    register_bit!(orundetect, set_orundetect, Self::ORUNDETECT, "overrun detection enable");
    register_bit!(stickyorun, set_stickyorun, Self::STICKYORUN, "sticky overrun flag");
    register_bit!(stickycmp, set_stickycmp, Self::STICKYCMP, "sticky compare flag");
    register_bit!(stickyerr, set_stickyerr, Self::STICKYERR, "sticky error flag");
    register_bit!(readok, set_readok, Self::READOK, "read OK flag");
    register_bit!(wdataerr, set_wdataerr, Self::WDATAERR, "write data error flag");
    register_bit!(cdbgrstreq, set_cdbgrstreq, Self::CDBGRSTREQ, "debug reset request");
    register_bit!(cdbgrstack, set_cdbgrstack, Self::CDBGRSTACK, "debug reset acknowledge");
    register_bit!(cdbgpwrupreq, set_cdbgpwrupreq, Self::CDBGPWRUPREQ, "debug power-up request");
    register_bit!(cdbgpwrupack, set_cdbgpwrupack, Self::CDBGPWRUPACK, "debug power-up acknowledge");
    register_bit!(csyspwrupreq, set_csyspwrupreq, Self::CSYSPWRUPREQ, "system power-up request");
    register_bit!(csyspwrupack, set_csyspwrupack, Self::CSYSPWRUPACK, "system power-up acknowledge");

    /// Whether any of the sticky error flags are set
    pub fn has_errors(&self) -> bool {
        self.stickyorun() || self.stickycmp() || self.stickyerr() || self.wdataerr()
    }

    /// Get error state description
    pub fn error_states(&self) -> String {
        let mut errors = [""; 4];
        let mut count = 0;

        for (set, name) in [
            (self.stickyorun(), "STICKYORUN"),
            (self.stickycmp(), "STICKYCMP"),
            (self.stickyerr(), "STICKYERR"),
            (self.wdataerr(), "WDATAERR"),
        ] {
            if set {
                errors[count] = name;
                count += 1;
            }
        }

        if count == 0 {
            format!("No errors{}", if self.readok() { " (READOK)" } else { "" })
        } else {
            format!("Errors: {}", errors[..count].join(", "))
        }
    }

    /// Get power state description
    pub fn power_states(&self) -> String {
        format!(
            "Debug: {}/{}, System: {}/{}",
            if self.cdbgpwrupreq() { "REQ" } else { "off" },
            if self.cdbgpwrupack() { "ACK" } else { "nak" },
            if self.csyspwrupreq() { "REQ" } else { "off" },
            if self.csyspwrupack() { "ACK" } else { "nak" }
        )
    }
}

const_assert_eq!(CtrlStat::POWER_UP.0, 0x5000_0000);

/// SELECT Register descriptor (write-only on DPv1)
pub struct SelectRegister;

impl RegisterDescriptor for SelectRegister {
    const ADDRESS: u8 = 0x08;
    type Value = Select;
}

impl WritableRegister for SelectRegister {}
impl DpRegister for SelectRegister {}

/// ARM Debug Port SELECT register data
///
/// Chooses the Access Port (APSEL) and the 16-byte register bank within it
/// (APBANKSEL) that subsequent AP operations address.  Nothing checks that
/// the right bank is selected before an AP operation - selecting the wrong
/// one silently redirects the access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select(u32);

register_data!(rw Select);

impl Select {
    const APSEL_MASK: u32 = 0xFF;
    const APSEL_SHIFT: u32 = 24;

    const APBANKSEL_MASK: u32 = 0xF;
    const APBANKSEL_SHIFT: u32 = 4;

    const DPBANKSEL_MASK: u32 = 0xF;

    /// Builds a SELECT value for the given AP and AP register bank
    pub const fn new(apsel: u8, apbanksel: u8) -> Self {
        Select(
            ((apsel as u32) << Self::APSEL_SHIFT)
                | (((apbanksel as u32) & Self::APBANKSEL_MASK) << Self::APBANKSEL_SHIFT),
        )
    }

    /// Get raw register value
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Get access port select
    pub fn apsel(&self) -> u8 {
        ((self.0 >> Self::APSEL_SHIFT) & Self::APSEL_MASK) as u8
    }

    /// Get AP bank select
    pub fn apbanksel(&self) -> u8 {
        ((self.0 >> Self::APBANKSEL_SHIFT) & Self::APBANKSEL_MASK) as u8
    }

    /// Get DP bank select
    pub fn dpbanksel(&self) -> u8 {
        (self.0 & Self::DPBANKSEL_MASK) as u8
    }

    /// Get selection information string
    pub fn selection_info(&self) -> String {
        format!(
            "AP: 0x{:02X}, AP Bank: 0x{:X}, DP Bank: 0x{:X}",
            self.apsel(),
            self.apbanksel(),
            self.dpbanksel()
        )
    }
}

/// RDBUFF Register descriptor (read-only)
///
/// Holds the result of the last AP read, and can be read without starting a
/// new AP transaction.
pub struct RdBuffRegister;

impl RegisterDescriptor for RdBuffRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = RdBuff;
}

impl ReadableRegister for RdBuffRegister {}
impl DpRegister for RdBuffRegister {}

/// ARM Debug Port RDBUFF register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RdBuff(u32);

register_data!(r RdBuff);

impl RdBuff {
    /// Get the buffered data
    pub fn data(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn abort_clear_all_is_0x1e() {
        assert_eq!(u32::from(Abort::CLEAR_ALL), 0x1E);
        assert!(!Abort::CLEAR_ALL.dapabort());
        assert!(Abort::CLEAR_ALL.stkerrclr());
    }

    #[test]
    fn ctrl_stat_reports_sticky_errors() {
        let status = CtrlStat::new(0x0000_0020);
        assert!(status.stickyerr());
        assert!(status.has_errors());
        assert_eq!(status.error_states(), "Errors: STICKYERR");

        let clean = CtrlStat::new(0xF000_0040);
        assert!(!clean.has_errors());
        assert_eq!(clean.error_states(), "No errors (READOK)");
        assert_eq!(clean.power_states(), "Debug: REQ/ACK, System: REQ/ACK");
    }

    #[test]
    fn power_up_request_value() {
        assert_eq!(CtrlStat::POWER_UP.value(), 0x5000_0000);
    }

    #[test]
    fn select_fields() {
        let select = Select::new(0x0A, 0xF);
        assert_eq!(select.value(), 0x0A00_00F0);
        assert_eq!(select.apsel(), 0x0A);
        assert_eq!(select.apbanksel(), 0xF);
        assert_eq!(select.to_string(), "0x0A0000F0");
    }

    #[test]
    fn idcode_display() {
        let idcode = IdCode::new(0x2BA01477);
        assert!(idcode.is_valid());
        assert!(idcode.is_arm());
        assert_eq!(format!("{idcode}"), "0x2BA01477");
        assert_eq!(format!("{idcode:#}"), "0x2BA01477 (ARM Ltd, part 0xBA01, rev 2)");
    }
}
