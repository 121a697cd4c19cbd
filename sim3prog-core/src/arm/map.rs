// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Memory Access Port Registers
//!
//! All three registers live in MEM-AP bank 0 (DP SELECT `0x0000_0000`).

use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_data;
use alloc::{format, string::String};
use static_assertions::const_assert_eq;

/// Control/Status Word Register descriptor (read-write)
pub struct CswRegister;

impl RegisterDescriptor for CswRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Csw;
}

impl ReadableRegister for CswRegister {}
impl WritableRegister for CswRegister {}
impl ApRegister for CswRegister {}

/// Control/Status Word register data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csw(u32);

register_data!(rw Csw);

impl Csw {
    const SIZE_MASK: u32 = 0b111;
    const SIZE_SHIFT: u32 = 0;

    const ADDRINC_MASK: u32 = 0b11;
    const ADDRINC_SHIFT: u32 = 4;

    const DEVICE_EN: u32 = 1 << 6;
    const TR_IN_PROG: u32 = 1 << 7;

    const PROT_MASK: u32 = 0b111_1111;
    const PROT_SHIFT: u32 = 24;

    // Size values
    pub const SIZE_8BIT: u32 = 0b000;
    pub const SIZE_16BIT: u32 = 0b001;
    pub const SIZE_32BIT: u32 = 0b010;

    // Address increment values
    pub const ADDRINC_OFF: u32 = 0b00;
    pub const ADDRINC_SINGLE: u32 = 0b01;
    pub const ADDRINC_PACKED: u32 = 0b10;

    // Prot value used for all accesses: privileged, master type debug
    pub const PROT_DEBUG: u32 = 0x23;

    /// Single 32-bit accesses, no address increment
    pub const DEFAULT_32BIT: Csw = Csw::new(Self::SIZE_32BIT, Self::ADDRINC_OFF);

    /// 32-bit accesses with TAR auto-incrementing after each DRW transfer
    pub const AUTO_INC_32BIT: Csw = Csw::new(Self::SIZE_32BIT, Self::ADDRINC_SINGLE);

    /// Builds a CSW with debug protection and the given size and address
    /// increment mode
    pub const fn new(size: u32, addrinc: u32) -> Self {
        Csw(((Self::PROT_DEBUG & Self::PROT_MASK) << Self::PROT_SHIFT)
            | ((addrinc & Self::ADDRINC_MASK) << Self::ADDRINC_SHIFT)
            | ((size & Self::SIZE_MASK) << Self::SIZE_SHIFT))
    }

    /// Get raw register value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Get size field
    pub fn size(&self) -> u32 {
        (self.0 >> Self::SIZE_SHIFT) & Self::SIZE_MASK
    }

    /// Get address increment field
    pub fn addrinc(&self) -> u32 {
        (self.0 >> Self::ADDRINC_SHIFT) & Self::ADDRINC_MASK
    }

    /// Get device enable flag
    pub fn device_en(&self) -> bool {
        self.0 & Self::DEVICE_EN != 0
    }

    /// Get transfer in progress flag
    pub fn tr_in_prog(&self) -> bool {
        self.0 & Self::TR_IN_PROG != 0
    }

    /// Get protection field
    pub fn prot(&self) -> u32 {
        (self.0 >> Self::PROT_SHIFT) & Self::PROT_MASK
    }

    /// Set size field
    pub fn set_size(&mut self, size: u32) {
        self.0 = (self.0 & !(Self::SIZE_MASK << Self::SIZE_SHIFT))
            | ((size & Self::SIZE_MASK) << Self::SIZE_SHIFT);
    }

    /// Set address increment field
    pub fn set_addrinc(&mut self, addrinc: u32) {
        self.0 = (self.0 & !(Self::ADDRINC_MASK << Self::ADDRINC_SHIFT))
            | ((addrinc & Self::ADDRINC_MASK) << Self::ADDRINC_SHIFT);
    }

    /// Whether TAR advances after each DRW access
    pub fn is_auto_increment(&self) -> bool {
        self.addrinc() != Self::ADDRINC_OFF
    }

    /// Get transfer configuration description
    pub fn transfer_config(&self) -> String {
        let size = match self.size() {
            Self::SIZE_8BIT => "8-bit",
            Self::SIZE_16BIT => "16-bit",
            Self::SIZE_32BIT => "32-bit",
            _ => "Reserved",
        };

        let addrinc = match self.addrinc() {
            Self::ADDRINC_OFF => "Off",
            Self::ADDRINC_SINGLE => "Single",
            Self::ADDRINC_PACKED => "Packed",
            _ => "Reserved",
        };

        format!("Size: {size}, AddrInc: {addrinc}")
    }
}

impl Default for Csw {
    fn default() -> Self {
        Self::DEFAULT_32BIT
    }
}

const_assert_eq!(Csw::DEFAULT_32BIT.0, 0x2300_0002);
const_assert_eq!(Csw::AUTO_INC_32BIT.0, 0x2300_0012);

/// Transfer Address Register descriptor (read-write)
pub struct TarRegister;

impl RegisterDescriptor for TarRegister {
    const ADDRESS: u8 = 0x04;
    type Value = Tar;
}

impl ReadableRegister for TarRegister {}
impl WritableRegister for TarRegister {}
impl ApRegister for TarRegister {}

/// Transfer Address Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tar(u32);

register_data!(rw Tar);

impl Tar {
    pub const fn new(address: u32) -> Self {
        Tar(address)
    }

    /// Get target address
    pub fn target_address(&self) -> u32 {
        self.0
    }
}

/// Data Read/Write Register descriptor (read-write)
pub struct DrwRegister;

impl RegisterDescriptor for DrwRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = Drw;
}

impl ReadableRegister for DrwRegister {}
impl WritableRegister for DrwRegister {}
impl ApRegister for DrwRegister {}

/// Data Read/Write Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drw(u32);

register_data!(rw Drw);

impl Drw {
    pub const fn new(data: u32) -> Self {
        Drw(data)
    }

    /// Get data value
    pub fn data(&self) -> u32 {
        self.0
    }
}
