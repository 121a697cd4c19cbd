// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sim3prog-core - Core debug and target concepts used by sim3prog.
//!
//! Designed to be used in conjunction with the `sim3prog-swd` library, which
//! bit-bangs the ARM Serial Wire Debug (SWD) protocol.  This crate contains
//! nothing SWD specific:
//!
//! * [`arm`] - strongly typed Debug Port, Memory Access Port and System
//!   Control Space registers.
//! * [`sim3`] - the Silicon Labs SiM3 Chip Access Port and memory map.
//! * [`image`] - RAM images to be loaded into and started on a target.
//!
//! This library is `no_std` compatible, and requires an `alloc`
//! implementation.

#![cfg_attr(not(test), no_std)]

pub mod arm;
pub mod image;
pub mod sim3;

extern crate alloc;

#[doc(inline)]
pub use crate::image::SramImage;
