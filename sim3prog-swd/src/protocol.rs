// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Wire Protocol Implementation
//!
//! This module bit-bangs the SWD protocol over an [`SwdIo`] implementation.
//! It provides the `SwdProtocol` struct, which clocks bits, bytes and whole
//! SWD packets, and the wire level types [`Request`] and [`Ack`].

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::io::{Delay, Direction, SwdIo};

#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::SwdInterface;

/// Number of attempts made for a packet the target answers with WAIT, when
/// no retry count is given.
pub const DEFAULT_RETRY_COUNT: u8 = 255;

// SWD line reset requires 50+ cycles with SWDIO high
const SHIFT_RESET_CYCLES: u32 = 64;

/// SWD protocol speed setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    /// Aims to be roughly 500kHz clock
    Slow,

    /// Aims to be roughly 1MHz clock
    Medium,

    /// Aims to be roughly 2MHz clock
    Fast,

    /// No added delay, the clock runs as fast as the pins can be toggled
    #[default]
    Turbo,
}

impl Speed {
    /// Returns the **approximate** speed in kHz for this SWD speed setting.
    pub fn speed_khz(&self) -> u32 {
        match self {
            Speed::Slow => 500,
            Speed::Medium => 1000,
            Speed::Fast => 2000,
            Speed::Turbo => 4000,
        }
    }

    fn clock_high_cycles(&self) -> u32 {
        match self {
            Speed::Slow => 75,
            Speed::Medium => 33,
            Speed::Fast => 10,
            Speed::Turbo => 0,
        }
    }

    fn clock_low_cycles(&self) -> u32 {
        match self {
            Speed::Slow => 75,
            Speed::Medium => 33,
            Speed::Fast => 10,
            Speed::Turbo => 0,
        }
    }
}

/// Type of Debug Port on the target.
///
/// Affects the connect and disconnect sequences: a SWJ-DP starts in JTAG
/// mode and must be switched to SWD first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpType {
    /// Serial Wire only Debug Port
    Sw,

    /// Combined Serial Wire and JTAG Debug Port, as on SiM3 parts
    #[default]
    Swj,
}

/// SWD link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Attempts per packet while the target answers WAIT
    pub retries: u8,

    /// Debug Port type, selecting the connect sequence
    pub dp_type: DpType,

    /// SWCLK speed
    pub speed: Speed,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRY_COUNT,
            dp_type: DpType::default(),
            speed: Speed::default(),
        }
    }
}

/// SWD acknowledge, as received from the target after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The target accepted the request
    Ok,

    /// The target is busy, the request should be repeated
    Wait,

    /// A sticky error is set on the target
    Fault,

    /// The data phase parity did not match.  Never sent by a target, but
    /// generated by the host on a bad read.
    ParityError,

    /// Any other value, including `0b111` when nothing drives SWDIO
    Invalid(u8),
}

impl Ack {
    const OK: u8 = 0b001;
    const WAIT: u8 = 0b010;
    const FAULT: u8 = 0b100;
    const PARITY_ERROR: u8 = 0b1000;

    /// Decodes the 3 acknowledge bits, received LSB first
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            Self::OK => Ack::Ok,
            Self::WAIT => Ack::Wait,
            Self::FAULT => Ack::Fault,
            other => Ack::Invalid(other),
        }
    }

    /// Returns the raw acknowledge value
    pub fn value(&self) -> u8 {
        match self {
            Ack::Ok => Self::OK,
            Ack::Wait => Self::WAIT,
            Ack::Fault => Self::FAULT,
            Ack::ParityError => Self::PARITY_ERROR,
            Ack::Invalid(bits) => *bits,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Ack::Ok
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::Ok => write!(f, "OK"),
            Ack::Wait => write!(f, "WAIT"),
            Ack::Fault => write!(f, "FAULT"),
            Ack::ParityError => write!(f, "Parity Error"),
            Ack::Invalid(bits) => write!(f, "Invalid 0b{bits:03b}"),
        }
    }
}

/// SWD packet request header
///
/// Bit 0: Start (1)
/// Bit 1: APnDP (0=DP, 1=AP)
/// Bit 2: RnW (0=write, 1=read)
/// Bit 3: A2 (address bit 2)
/// Bit 4: A3 (address bit 3)
/// Bit 5: Parity (even, over bits 1-4)
/// Bit 6: Stop (0)
/// Bit 7: Park (1)
///
/// Built from a 4-bit DAP code `A3:A2:RnW:APnDP` using
/// [`Request::from_dap()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request(u8);

impl Request {
    const START: u8 = 1 << 0;
    const APNDP: u8 = 1 << 1;
    const RNW: u8 = 1 << 2;
    const A32_MASK: u8 = 0b11 << 3;
    const PARITY: u8 = 1 << 5;
    const STOP: u8 = 1 << 6;
    const PARK: u8 = 1 << 7;

    /// Read DP IDCODE
    pub const IDCODE_RD: Request = Request::from_dap(0x02);
    /// Write DP ABORT
    pub const ABORT_WR: Request = Request::from_dap(0x00);
    /// Read DP CTRL/STAT
    pub const CTRLSTAT_RD: Request = Request::from_dap(0x06);
    /// Write DP CTRL/STAT
    pub const CTRLSTAT_WR: Request = Request::from_dap(0x04);
    /// Read DP RESEND
    pub const RESEND_RD: Request = Request::from_dap(0x0A);
    /// Write DP SELECT
    pub const SELECT_WR: Request = Request::from_dap(0x08);
    /// Read DP RDBUFF
    pub const RDBUFF_RD: Request = Request::from_dap(0x0E);

    /// Builds the request header for a DAP code.  Only the low 4 bits of
    /// `dap` are used.
    pub const fn from_dap(dap: u8) -> Self {
        let dap = dap & 0x0F;
        let parity = (dap.count_ones() & 1) as u8;
        Request(((dap | (parity << 4)) << 1) | Self::START | Self::PARK)
    }

    /// Wraps a raw request byte, as seen on the wire
    pub const fn from_raw(raw: u8) -> Self {
        Request(raw)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns the 4-bit DAP code `A3:A2:RnW:APnDP`
    pub fn dap(&self) -> u8 {
        (self.0 >> 1) & 0x0F
    }

    pub fn is_read(&self) -> bool {
        self.0 & Self::RNW != 0
    }

    pub fn is_ap(&self) -> bool {
        self.0 & Self::APNDP != 0
    }

    /// Register byte offset within the selected bank: 0x0, 0x4, 0x8 or 0xC
    pub fn address(&self) -> u8 {
        (self.0 & Self::A32_MASK) >> 1
    }

    /// Whether the start, stop, park and parity bits are all correct
    pub fn is_well_formed(&self) -> bool {
        let parity = calculate_parity(self.0 & 0x1E);
        self.0 & Self::START != 0
            && self.0 & Self::STOP == 0
            && self.0 & Self::PARK != 0
            && (self.0 & Self::PARITY != 0) == parity
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} 0x{:02X} [0x{:02X}]",
            if self.is_ap() { "AP" } else { "DP" },
            if self.is_read() { "Read" } else { "Write" },
            self.address(),
            self.0
        )
    }
}

/// SWD Protocol object
///
/// This is used by [`SwdInterface`] to communicate with the target, one bit,
/// byte or packet at a time.  Most applications should use
/// [`DebugInterface`] (preferred) or [`SwdInterface`] instead.
///
/// Create using `SwdProtocol::new()` passing in the pins and a delay.
///
/// ```rust,ignore
/// use sim3prog_swd::SwdProtocol;
/// use sim3prog_swd::io::esp::{EspSwdIo, RiscvDelay};
///
/// let peripherals = esp_hal::init(config);
/// let io = EspSwdIo::new(peripherals.GPIO0, peripherals.GPIO1, peripherals.GPIO2);
/// let swd = SwdProtocol::new(io, RiscvDelay);
/// ```
///
/// The protocol also holds the transaction error accumulator: the last
/// non-OK acknowledge seen since [`SwdInterface::dap_move()`] last reset it.
#[derive(Debug)]
pub struct SwdProtocol<IO, D> {
    io: IO,
    delay: D,
    speed: Speed,
    clock_high_cycles: u32,
    clock_low_cycles: u32,
    retries: u8,
    ack_error: Ack,
}

impl<IO, D> SwdProtocol<IO, D>
where
    IO: SwdIo,
    D: Delay,
{
    /// Create a new SWD protocol instance.
    ///
    /// Arguments:
    /// - `io`: The debug connector lines.
    /// - `delay`: Used to time the clock and WAIT back-off.
    ///
    /// Returns:
    /// - A new `SwdProtocol` instance, at the default speed and retry count.
    pub fn new(io: IO, delay: D) -> Self {
        let speed = Speed::default();
        Self {
            io,
            delay,
            speed,
            clock_high_cycles: speed.clock_high_cycles(),
            clock_low_cycles: speed.clock_low_cycles(),
            retries: DEFAULT_RETRY_COUNT,
            ack_error: Ack::Ok,
        }
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
        self.clock_high_cycles = speed.clock_high_cycles();
        self.clock_low_cycles = speed.clock_low_cycles();
        debug!("SWD speed set to {speed:?}");
    }

    /// Default number of attempts per packet while the target answers WAIT
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Sets the default number of attempts.  0 restores
    /// [`DEFAULT_RETRY_COUNT`].
    pub fn set_retries(&mut self, retries: u8) {
        self.retries = if retries == 0 {
            DEFAULT_RETRY_COUNT
        } else {
            retries
        };
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Returns the pins and delay, consuming the protocol
    pub fn into_parts(self) -> (IO, D) {
        (self.io, self.delay)
    }

    #[inline]
    pub(crate) fn set_clock(&mut self, high: bool) {
        self.io.set_swclk(high);
    }

    #[inline]
    pub(crate) fn set_data(&mut self, high: bool) {
        self.io.set_swdio(high);
    }

    #[inline]
    pub(crate) fn read_data(&mut self) -> bool {
        self.io.swdio()
    }

    #[inline]
    pub(crate) fn set_data_direction(&mut self, direction: Direction) {
        self.io.set_swdio_direction(direction);
    }

    // One clock pulse: SWCLK high, then low.  Data must already be set up
    // when writing, and is sampled by the caller before the pulse when
    // reading.
    #[inline]
    fn strobe(&mut self) {
        self.set_clock(true);
        self.delay.delay_cycles(self.clock_high_cycles);
        self.set_clock(false);
        self.delay.delay_cycles(self.clock_low_cycles);
    }

    // Idle or turnaround cycle, leaving SWDIO a low output
    #[inline]
    fn idle_cycle(&mut self) {
        self.set_data(false);
        self.set_data_direction(Direction::Output);
        self.strobe();
    }

    /// Shifts a byte out on SWDIO, LSB first.  SWDIO is made an output.
    pub fn shift_out(&mut self, byte: u8) {
        self.set_data_direction(Direction::Output);
        for ii in 0..8 {
            self.set_data(byte & (1 << ii) != 0);
            self.strobe();
        }
    }

    /// Shifts a byte in from SWDIO, LSB first.  SWDIO is made an input.
    pub fn shift_in(&mut self) -> u8 {
        self.set_data_direction(Direction::Input);
        let mut byte = 0u8;
        for ii in 0..8 {
            if self.read_data() {
                byte |= 1 << ii;
            }
            self.strobe();
        }
        byte
    }

    /// Clocks 64 cycles with SWDIO a high output, putting the target's SWD
    /// interface into its reset state.
    pub fn shift_reset(&mut self) {
        self.set_data(true);
        self.set_data_direction(Direction::Output);
        for _ in 0..SHIFT_RESET_CYCLES {
            self.strobe();
        }
    }

    /// Runs one complete SWD packet.
    ///
    /// The request phase is repeated while the target answers WAIT, with a
    /// growing back-off, until `retry` attempts have been made.  On OK the
    /// data phase runs: `word` receives the data of a read, and supplies the
    /// data of a write (and is then left unchanged).  SWDIO is left a low
    /// output whatever the outcome.
    ///
    /// Arguments:
    /// - `request`: the request header
    /// - `word`: data in or out
    /// - `retry`: number of attempts, or 0 for the configured default
    ///
    /// Returns:
    /// - The final acknowledge.  Anything other than [`Ack::Ok`] is also
    ///   recorded in the error accumulator.
    pub fn shift_packet(&mut self, request: Request, word: &mut u32, retry: u8) -> Ack {
        let limit = if retry == 0 { self.retries } else { retry };
        let mut remaining = limit;

        let mut ack = loop {
            self.idle_cycle();
            self.shift_out(request.value());

            // Turnaround to the target
            self.set_data_direction(Direction::Input);
            self.strobe();

            let mut bits = 0u8;
            for ii in 0..3 {
                if self.read_data() {
                    bits |= 1 << ii;
                }
                self.strobe();
            }
            let ack = Ack::from_bits(bits);

            remaining = remaining.saturating_sub(1);
            if ack == Ack::Wait && remaining > 0 {
                let backoff = u32::from(limit - remaining);
                trace!("Retry: {request} WAIT, {remaining} attempts left");
                self.delay.delay_cycles(backoff);
            } else {
                break ack;
            }
        };

        if ack == Ack::Ok {
            if request.is_read() {
                let bytes = [
                    self.shift_in(),
                    self.shift_in(),
                    self.shift_in(),
                    self.shift_in(),
                ];
                let data = u32::from_le_bytes(bytes);
                let parity = self.read_data();
                self.strobe();

                *word = data;
                if calculate_parity(data) != parity {
                    debug!("Error: {request} parity error: data=0x{data:08X}, parity={parity}");
                    ack = Ack::ParityError;
                }
            } else {
                // Turnaround back to the host
                self.set_data_direction(Direction::Output);
                self.strobe();

                for byte in word.to_le_bytes() {
                    self.shift_out(byte);
                }
                self.set_data(calculate_parity(*word));
                self.strobe();
            }
        }

        self.idle_cycle();

        if ack.is_ok() {
            trace!("OK:    {request} 0x{word:08X}");
        } else {
            trace!("Error: {request} {ack}");
            self.ack_error = ack;
        }

        ack
    }

    pub(crate) fn reset_ack_error(&mut self) {
        self.ack_error = Ack::Ok;
    }

    pub(crate) fn ack_error(&self) -> Ack {
        self.ack_error
    }

    pub(crate) fn idle_pins(&mut self) {
        self.io.idle();
    }

    pub(crate) fn release_pins(&mut self) {
        self.io.release();
    }

    pub(crate) fn set_reset(&mut self, high: bool) {
        self.io.set_reset(high);
    }

    pub(crate) fn reset_level(&mut self) -> bool {
        self.io.reset_level()
    }
}

/// Calculate SWD parity - 1 for an odd number of bits set to 1, 0 otherwise.
pub(crate) fn calculate_parity<T>(value: T) -> bool
where
    T: Into<u64>,
{
    (value.into().count_ones() % 2) == 1
}
