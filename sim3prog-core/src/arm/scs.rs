// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARMv7-M System Control Space debug registers
//!
//! These are memory mapped, and are reached through the MEM-AP TAR/DRW
//! registers rather than directly over SWD.

use crate::arm::register::MemoryMappedRegister;
use crate::{register_bit, register_data};
use static_assertions::const_assert_eq;

macro_rules! memory_mapped {
    ($name:ident, $address:expr, $label:literal) => {
        impl MemoryMappedRegister for $name {
            const ADDRESS: u32 = $address;
            const NAME: &'static str = $label;
        }
    };
}

/// Core register numbers, as used in DCRSR.REGSEL
pub mod core_reg {
    pub const R0: u8 = 0;
    pub const SP: u8 = 13;
    pub const LR: u8 = 14;
    pub const PC: u8 = 15;
    pub const XPSR: u8 = 16;
    pub const MSP: u8 = 17;
    pub const PSP: u8 = 18;
}

/// Debug Halting Control and Status Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dhcsr(u32);

register_data!(rw Dhcsr);
memory_mapped!(Dhcsr, 0xE000_EDF0, "DHCSR");

impl Dhcsr {
    // Must be written to bits 31:16 for any write to take effect
    const DBGKEY: u32 = 0xA05F << 16;

    const C_DEBUGEN: u32 = 1 << 0;
    const C_HALT: u32 = 1 << 1;
    const C_STEP: u32 = 1 << 2;
    const C_MASKINTS: u32 = 1 << 3;
    const S_REGRDY: u32 = 1 << 16;
    const S_HALT: u32 = 1 << 17;
    const S_SLEEP: u32 = 1 << 18;
    const S_LOCKUP: u32 = 1 << 19;
    const S_RESET_ST: u32 = 1 << 25;

    /// Enables halting debug without requesting a halt
    pub const DEBUG_ENABLE: Dhcsr = Dhcsr(Self::DBGKEY | Self::C_DEBUGEN);

    /// Enables halting debug and halts the core
    pub const HALT: Dhcsr = Dhcsr(Self::DBGKEY | Self::C_DEBUGEN | Self::C_HALT);

    /// Value written once the image has been loaded.  C_DEBUGEN is cleared,
    /// which releases the core.
    pub const RUN: Dhcsr = Dhcsr(Self::DBGKEY);

    /// Returns a write value carrying the debug key and the given control
    /// bits
    pub const fn with_key(control: u32) -> Self {
        Dhcsr(Self::DBGKEY | (control & 0xFFFF))
    }

    register_bit!(c_debugen, set_c_debugen, Self::C_DEBUGEN, "debug enable");
    register_bit!(c_halt, set_c_halt, Self::C_HALT, "halt request");
    register_bit!(c_step, set_c_step, Self::C_STEP, "single step request");
    register_bit!(c_maskints, set_c_maskints, Self::C_MASKINTS, "interrupt mask");
    register_bit!(s_regrdy, set_s_regrdy, Self::S_REGRDY, "register transfer complete flag");
    register_bit!(s_halt, set_s_halt, Self::S_HALT, "core halted flag");
    register_bit!(s_sleep, set_s_sleep, Self::S_SLEEP, "core sleeping flag");
    register_bit!(s_lockup, set_s_lockup, Self::S_LOCKUP, "core locked up flag");
    register_bit!(s_reset_st, set_s_reset_st, Self::S_RESET_ST, "core reset since last read flag");
}

const_assert_eq!(Dhcsr::DEBUG_ENABLE.0, 0xA05F_0001);
const_assert_eq!(Dhcsr::RUN.0, 0xA05F_0000);

/// Debug Core Register Selector Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcrsr(u32);

register_data!(rw Dcrsr);
memory_mapped!(Dcrsr, 0xE000_EDF4, "DCRSR");

impl Dcrsr {
    const REGSEL_MASK: u32 = 0x7F;
    const REGWNR: u32 = 1 << 16;

    /// Requests a transfer of DCRDR into core register `reg`
    pub const fn write(reg: u8) -> Self {
        Dcrsr((reg as u32 & Self::REGSEL_MASK) | Self::REGWNR)
    }

    /// Requests a transfer of core register `reg` into DCRDR
    pub const fn read(reg: u8) -> Self {
        Dcrsr(reg as u32 & Self::REGSEL_MASK)
    }

    /// Get selected core register
    pub fn regsel(&self) -> u8 {
        (self.0 & Self::REGSEL_MASK) as u8
    }

    /// Whether this is a write to the core register
    pub fn is_write(&self) -> bool {
        self.0 & Self::REGWNR != 0
    }
}

/// Debug Core Register Data Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcrdr(u32);

register_data!(rw Dcrdr);
memory_mapped!(Dcrdr, 0xE000_EDF8, "DCRDR");

impl Dcrdr {
    pub fn data(&self) -> u32 {
        self.0
    }
}

/// Debug Exception and Monitor Control Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demcr(u32);

register_data!(rw Demcr);
memory_mapped!(Demcr, 0xE000_EDFC, "DEMCR");

impl Demcr {
    const VC_CORERESET: u32 = 1 << 0;
    const TRCENA: u32 = 1 << 24;

    /// Halt the core on the next reset
    pub const CATCH_RESET: Demcr = Demcr(Self::VC_CORERESET);

    register_bit!(vc_corereset, set_vc_corereset, Self::VC_CORERESET, "reset vector catch");
    register_bit!(trcena, set_trcena, Self::TRCENA, "trace enable");
}

/// Application Interrupt and Reset Control Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aircr(u32);

register_data!(rw Aircr);
memory_mapped!(Aircr, 0xE000_ED0C, "AIRCR");

impl Aircr {
    const SYSRESETREQ: u32 = 1 << 2;

    /// System reset request, as sent by the SiM3 programming firmware.
    ///
    /// The architectural write key is `0x05FA` in bits 31:16.  This value
    /// carries the key in the half-word swapped position, matching what the
    /// SiM3 loader has always sent, so the request is not guaranteed to be
    /// honoured by every core.
    pub const SYSTEM_RESET: Aircr = Aircr(0xFA05_0000 | Self::SYSRESETREQ);

    /// System reset request with the architectural key
    pub const SYSTEM_RESET_KEYED: Aircr = Aircr(0x05FA_0000 | Self::SYSRESETREQ);

    register_bit!(sysresetreq, set_sysresetreq, Self::SYSRESETREQ, "system reset request");

    /// Whether the architectural write key is present
    pub fn has_key(&self) -> bool {
        self.0 >> 16 == 0x05FA
    }
}

const_assert_eq!(Aircr::SYSTEM_RESET.0, 0xFA05_0004);

/// Vector Table Offset Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vtor(u32);

register_data!(rw Vtor);
memory_mapped!(Vtor, 0xE000_ED08, "VTOR");

impl Vtor {
    pub const fn new(table: u32) -> Self {
        Vtor(table)
    }

    /// Get vector table base address
    pub fn table(&self) -> u32 {
        self.0
    }
}

/// Debug Fault Status Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dfsr(u32);

register_data!(rw Dfsr);
memory_mapped!(Dfsr, 0xE000_ED30, "DFSR");

impl Dfsr {
    const HALTED: u32 = 1 << 0;
    const BKPT: u32 = 1 << 1;
    const DWTTRAP: u32 = 1 << 2;
    const VCATCH: u32 = 1 << 3;
    const EXTERNAL: u32 = 1 << 4;

    register_bit!(halted, set_halted, Self::HALTED, "halt request debug event");
    register_bit!(bkpt, set_bkpt, Self::BKPT, "breakpoint debug event");
    register_bit!(dwttrap, set_dwttrap, Self::DWTTRAP, "watchpoint debug event");
    register_bit!(vcatch, set_vcatch, Self::VCATCH, "vector catch debug event");
    register_bit!(external, set_external, Self::EXTERNAL, "external debug request event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addresses() {
        assert_eq!(Dhcsr::ADDRESS, 0xE000_EDF0);
        assert_eq!(Dcrsr::ADDRESS, 0xE000_EDF4);
        assert_eq!(Dcrdr::ADDRESS, 0xE000_EDF8);
        assert_eq!(Demcr::ADDRESS, 0xE000_EDFC);
        assert_eq!(Aircr::ADDRESS, 0xE000_ED0C);
        assert_eq!(Vtor::ADDRESS, 0xE000_ED08);
        assert_eq!(Dfsr::ADDRESS, 0xE000_ED30);
    }

    #[test]
    fn dcrsr_selects_direction() {
        assert_eq!(u32::from(Dcrsr::write(core_reg::PC)), 0x0001_000F);
        assert_eq!(u32::from(Dcrsr::read(core_reg::SP)), 0x0000_000D);
        assert!(Dcrsr::write(core_reg::XPSR).is_write());
        assert_eq!(Dcrsr::from(0x0001_0012).regsel(), core_reg::PSP);
    }

    #[test]
    fn dhcsr_status_bits() {
        let status = Dhcsr::from(0x0003_0003);
        assert!(status.s_halt());
        assert!(status.s_regrdy());
        assert!(status.c_halt());
        assert_eq!(u32::from(Dhcsr::with_key(0x3)), 0xA05F_0003);
    }

    #[test]
    fn aircr_keys() {
        assert!(!Aircr::SYSTEM_RESET.has_key());
        assert!(Aircr::SYSTEM_RESET_KEYED.has_key());
        assert!(Aircr::SYSTEM_RESET.sysresetreq());
    }
}
