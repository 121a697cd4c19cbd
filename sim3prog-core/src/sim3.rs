// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Silicon Labs SiM3 specific objects
//!
//! SiM3 parts expose a vendor Chip Access Port at APSEL `0x0A`, alongside
//! the standard MEM-AP at APSEL `0x00`.  The Chip-AP is used to hold the
//! core in reset while debug is enabled, and identifies the part.

use crate::arm::dp::Select;
use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::{register_bit, register_data};
use static_assertions::const_assert_eq;

/// APSEL of the SiM3 Chip Access Port
pub const CHIP_AP_SEL: u8 = 0x0A;

/// APSEL of the AHB MEM-AP
pub const MEM_AP_SEL: u8 = 0x00;

/// Chip-AP bank 0: CTRL1, CTRL2, LOCK, CRC
pub const CHIP_AP_BANK_0: Select = Select::new(CHIP_AP_SEL, 0x0);

/// Chip-AP bank F: ID
pub const CHIP_AP_BANK_F: Select = Select::new(CHIP_AP_SEL, 0xF);

/// MEM-AP bank 0: CSW, TAR, DRW
pub const MEM_AP_BANK_0: Select = Select::new(MEM_AP_SEL, 0x0);

/// Base address of on-chip SRAM
pub const SRAM_BASE: u32 = 0x2000_0000;

const_assert_eq!(CHIP_AP_BANK_0.value(), 0x0A00_0000);
const_assert_eq!(CHIP_AP_BANK_F.value(), 0x0A00_00F0);
const_assert_eq!(MEM_AP_BANK_0.value(), 0x0000_0000);

/// Chip-AP CTRL1 descriptor (read-write, bank 0)
pub struct Ctrl1Register;

impl RegisterDescriptor for Ctrl1Register {
    const ADDRESS: u8 = 0x00;
    type Value = Ctrl1;
}

impl ReadableRegister for Ctrl1Register {}
impl WritableRegister for Ctrl1Register {}
impl ApRegister for Ctrl1Register {}

/// Chip-AP CTRL1 register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ctrl1(u32);

register_data!(rw Ctrl1);

impl Ctrl1 {
    const USER_ERASE: u32 = 1 << 0;
    const SYSRESET_REQ_AP: u32 = 1 << 2;
    const CORE_RESET_AP: u32 = 1 << 3;

    /// Holds the core in reset
    pub const CORE_RESET: Ctrl1 = Ctrl1(Self::CORE_RESET_AP);

    /// Releases every Chip-AP request
    pub const RELEASE: Ctrl1 = Ctrl1(0);

    register_bit!(user_erase, set_user_erase, Self::USER_ERASE, "user erase request");
    register_bit!(sysreset_req_ap, set_sysreset_req_ap, Self::SYSRESET_REQ_AP, "system reset request");
    register_bit!(core_reset_ap, set_core_reset_ap, Self::CORE_RESET_AP, "core reset request");
}

const_assert_eq!(Ctrl1::CORE_RESET.0, 0x08);

/// Chip-AP ID descriptor (read-only, bank F)
pub struct IdRegister;

impl RegisterDescriptor for IdRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = ChipApId;
}

impl ReadableRegister for IdRegister {}
impl ApRegister for IdRegister {}

/// Chip-AP identification register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChipApId(u32);

register_data!(r ChipApId);

impl ChipApId {
    /// The ID every supported SiM3 Chip-AP reports
    pub const EXPECTED: ChipApId = ChipApId(0x0243_0002);

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whether this is the Chip-AP of a supported SiM3 device
    pub fn is_sim3(&self) -> bool {
        *self == Self::EXPECTED
    }
}
