// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! sim3prog-swd library
//!
//! Bit-banged ARM Serial Wire Debug (SWD) host, and a sequencer that halts a
//! Silicon Labs SiM3 target, loads an image into its SRAM and starts it.
//!
//! The following diagram shows the key `sim3prog-swd` concepts.
//!
//! ```text
//! ----------------------
//!     DebugInterface      \
//! ----------------------   \
//!      SwdInterface         |--  SwdError / Status
//! ----------------------   /
//!      SwdProtocol        /
//! ----------------------                            -----------------
//!   SwdIo + Delay        >======================<    SiM3 Target
//!                          SWDIO/SWCLK/nSRST/GND
//! ```
//!
//! * [`DebugInterface`] runs complete target sequences: connect and halt,
//!   core register access, SRAM image load.
//! * [`SwdInterface`] runs DAP transactions (`dap_move`) and the link
//!   sequences: connect, line reset, disconnect, clear errors.
//! * [`SwdProtocol`] implements the SWD wire protocol, bit by bit, over any
//!   [`io::SwdIo`] pin implementation.
//!
//! `sim3prog-swd` is `no_std` and requires an `alloc` implementation.  It
//! can drive ESP32-C3 GPIOs directly when built with the `esp32c3` feature.
//!
//! It is designed to be used alongside the [`sim3prog_core`] library, which
//! provides the typed debug registers and the SiM3 memory map.

#![cfg_attr(not(test), no_std)]

pub mod debug;
pub mod interface;
pub mod io;
pub mod protocol;

#[cfg(test)]
pub(crate) mod sim;

#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::SwdInterface;
#[doc(inline)]
pub use crate::protocol::SwdProtocol;

extern crate alloc;
use alloc::format;
use alloc::string::String;
use core::fmt;
use serde::Serialize;

use crate::protocol::Ack;

/// Host status codes, as returned to a programming host for each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Status {
    Ok = 0x55,
    InvalidCommand = 0x80,
    CommandFailed = 0x81,
    ApTimeout = 0x82,
    WireError = 0x83,
    AckFault = 0x84,
    DpNotConnected = 0x85,
}

impl Status {
    /// Maps the result of an SWD packet to a host status
    pub fn from_ack(ack: Ack) -> Self {
        match ack {
            Ack::Ok => Status::Ok,
            Ack::Wait => Status::ApTimeout,
            Ack::Fault => Status::AckFault,
            Ack::ParityError | Ack::Invalid(_) => Status::WireError,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl<T> From<&Result<T, SwdError>> for Status {
    fn from(result: &Result<T, SwdError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.code())
    }
}

/// Core error type used by all sim3prog-swd objects
///
/// Methods are provided to make it easier to handle errors, by checking if
/// either a retry or reset is required:
///
/// - [`SwdError::requires_retry()`]
/// - [`SwdError::requires_reset()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwdError {
    /// The target answered WAIT for every attempt allowed by the retry
    /// count.  The AP is still busy; the operation can be repeated.
    ApTimeout,

    /// The target answered FAULT.  A sticky error flag is set in DP
    /// CTRL/STAT, and every AP access will FAULT until it is cleared with
    /// [`SwdInterface::clear_errors()`].
    AckFault,

    /// The target did not answer with a valid acknowledge, or the data
    /// parity did not match.  The raw acknowledge value is included.  7
    /// means SWDIO was high for the entire acknowledge phase, which usually
    /// means there is no target, or the link needs a line reset.
    WireError(u8),

    /// A sequence step succeeded at the SWD level but its result was not
    /// what the sequence needs, such as an unexpected Chip-AP ID.
    CommandFailed(String),

    /// The API was called with invalid arguments.
    InvalidCommand,

    /// The operation requires an established link.  Use
    /// [`SwdInterface::connect()`] first.
    NotConnected,
}

impl SwdError {
    /// Converts a packet acknowledge into a result
    pub fn from_ack(ack: Ack) -> Result<(), SwdError> {
        match ack {
            Ack::Ok => Ok(()),
            Ack::Wait => Err(SwdError::ApTimeout),
            Ack::Fault => Err(SwdError::AckFault),
            ack => Err(SwdError::WireError(ack.value())),
        }
    }

    /// Returns the host status code for this error
    pub fn status(&self) -> Status {
        match self {
            SwdError::ApTimeout => Status::ApTimeout,
            SwdError::AckFault => Status::AckFault,
            SwdError::WireError(_) => Status::WireError,
            SwdError::CommandFailed(_) => Status::CommandFailed,
            SwdError::InvalidCommand => Status::InvalidCommand,
            SwdError::NotConnected => Status::DpNotConnected,
        }
    }

    /// Returns true if the error requires a line reset, or a full
    /// reconnect, to recover.
    pub fn requires_reset(&self) -> bool {
        matches!(self, SwdError::WireError(_) | SwdError::NotConnected)
    }

    /// Returns true if the error is transient and the operation can be
    /// repeated as is.
    pub fn requires_retry(&self) -> bool {
        matches!(self, SwdError::ApTimeout)
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwdError::ApTimeout => "AP Timeout",
            SwdError::AckFault => "Fault ACK",
            SwdError::WireError(_) => "Wire Error",
            SwdError::CommandFailed(_) => "Command Failed",
            SwdError::InvalidCommand => "Invalid Command",
            SwdError::NotConnected => "DP Not Connected",
        }
    }
}

impl Serialize for SwdError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SwdError", 2)?;

        let kind = match self {
            SwdError::ApTimeout => "ap timeout",
            SwdError::AckFault => "ack fault",
            SwdError::WireError(_) => "wire error",
            SwdError::CommandFailed(_) => "command failed",
            SwdError::InvalidCommand => "invalid command",
            SwdError::NotConnected => "not connected",
        };

        state.serialize_field("kind", kind)?;

        let detail = match self {
            SwdError::CommandFailed(msg) => msg.clone(),
            SwdError::WireError(code) => format!("{code}"),
            _ => String::new(),
        };
        state.serialize_field("detail", &detail)?;
        state.end()
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdError::WireError(ack) => write!(f, "{}: {ack}", self.as_str()),
            SwdError::CommandFailed(str) => write!(f, "{}: {str}", self.as_str()),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}
