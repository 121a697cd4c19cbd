// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Register Access Traits
//!
//! Two families of registers are described here:
//!
//! * DAP registers, addressed over the wire by a Debug Port or Access Port
//!   operation and a byte offset (0x0, 0x4, 0x8 or 0xC) within the bank
//!   currently chosen by DP SELECT.  These are used by
//!   `sim3prog_swd::interface::SwdInterface::read_dp_register` and friends.
//! * Memory mapped registers, living in the target's address space and
//!   reached through the MEM-AP TAR/DRW pair.
//!
//! Unless you are extending the debug support, it is unlikely that you will
//! need to use these traits directly.

/// Base trait for all DAP register descriptors
pub trait RegisterDescriptor {
    /// Byte offset of the register within its DP/AP bank
    const ADDRESS: u8;
    type Value;
}

/// Registers that can be read
pub trait ReadableRegister: RegisterDescriptor {
    /// Convert raw 32-bit data to register value
    fn from_raw(data: u32) -> Self::Value
    where
        Self::Value: From<u32>,
    {
        Self::Value::from(data)
    }
}

/// Registers that can be written
pub trait WritableRegister: RegisterDescriptor {
    /// Convert register value to raw 32-bit data
    fn to_raw(value: Self::Value) -> u32
    where
        Self::Value: Into<u32>,
    {
        value.into()
    }
}

/// Debug Port registers (accessed via DP operations)
pub trait DpRegister: RegisterDescriptor {}

/// Access Port registers (accessed via AP operations)
pub trait ApRegister: RegisterDescriptor {}

/// Registers in the target's memory map, such as the System Control Space
/// debug registers.
pub trait MemoryMappedRegister: Copy + From<u32> + Into<u32> {
    /// Target address of the register
    const ADDRESS: u32;

    /// Short register name, used in log output
    const NAME: &'static str;
}

/// Generate the conversions and `Display` for a register data type.
///
/// `rw` and `r` data types can be built from raw data, `w` data types only
/// convert back to raw data.
#[macro_export]
macro_rules! register_data {
    (rw $name:ident) => {
        $crate::register_data!(r $name);
    };
    (r $name:ident) => {
        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        $crate::register_data!(w $name);
    };
    (w $name:ident) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}

/// Generate a boolean getter/setter pair for a single bit field.
#[macro_export]
macro_rules! register_bit {
    ($get:ident, $set:ident, $mask:expr, $doc:literal) => {
        #[doc = concat!("Get ", $doc)]
        pub fn $get(&self) -> bool {
            self.0 & $mask != 0
        }

        #[doc = concat!("Set ", $doc)]
        pub fn $set(&mut self, enable: bool) {
            if enable {
                self.0 |= $mask;
            } else {
                self.0 &= !$mask;
            }
        }
    };
}
