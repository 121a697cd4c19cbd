// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Interface
//!
//! This module implements DAP transactions and the SWD link sequences on top
//! of [`SwdProtocol`].  It provides `SwdInterface` for performing SWD
//! operations, and `SwdOp` for addressing DP and AP registers.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sim3prog_core::arm::Cortex;
use sim3prog_core::arm::dp::{Abort, CtrlStat, IdCode, IdCodeRegister, Select, SelectRegister};
use sim3prog_core::arm::register::{ApRegister, DpRegister, ReadableRegister, WritableRegister};

use crate::SwdError;
use crate::io::{Delay, SwdIo};
use crate::protocol::{Config, DpType, Request, Speed, SwdProtocol};

#[doc(inline)]
pub use crate::debug::DebugInterface;

/// Most words a single [`SwdInterface::dap_move()`] transfers
pub const MAX_MOVE_WORDS: usize = 256;

// Switch sequences, sent LSB first after a line reset
const JTAG_TO_SWD: u16 = 0xE79E;
const SWD_TO_JTAG: u16 = 0xE73C;

/// State of the SWD link to the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    /// No SWD session.  The target may still be in JTAG mode.
    #[default]
    Disconnected,

    /// A line reset was sent, but the target has not yet answered the
    /// IDCODE read that ends it.
    LineResetPending,

    /// The target answered the IDCODE read after the last line reset
    Connected,
}

/// DP CTRL/STAT before and after [`SwdInterface::clear_errors()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearedErrors {
    pub before: CtrlStat,
    pub after: CtrlStat,
}

/// Used to run SWD transactions and link sequences.
///
/// Create using `SwdInterface::new` passing in an [`SwdProtocol`] instance,
/// or `SwdInterface::from_io` with the pins and delay:
///
/// ```rust,ignore
/// use sim3prog_swd::SwdInterface;
/// use sim3prog_swd::io::esp::{EspSwdIo, RiscvDelay};
///
/// let peripherals = esp_hal::init(config);
/// let io = EspSwdIo::new(peripherals.GPIO0, peripherals.GPIO1, peripherals.GPIO2);
/// let mut swd_if = SwdInterface::from_io(io, RiscvDelay);
///
/// let idcode = swd_if.connect().unwrap();
/// esp_println::println!("IDCODE: {idcode}");
/// ```
///
/// `SwdInterface` never writes DP SELECT on its own.  Callers select the AP
/// and bank with [`SwdInterface::select()`] before AP operations.
#[derive(Debug)]
pub struct SwdInterface<IO, D> {
    protocol: SwdProtocol<IO, D>,
    dp_type: DpType,
    state: LinkState,
    idcode: Option<IdCode>,

    // Last value written to DP SELECT, for diagnostics
    dp_select: Option<Select>,
}

impl<IO, D> SwdInterface<IO, D>
where
    IO: SwdIo,
    D: Delay,
{
    /// Creates a new SWD interface using the given [`SwdProtocol`] instance.
    ///
    /// Arguments:
    /// - `protocol`: The [`SwdProtocol`] instance to use for SWD communication.
    ///
    /// Returns:
    /// - A new [`SwdInterface`] instance, disconnected, for a SWJ-DP target.
    pub fn new(protocol: SwdProtocol<IO, D>) -> Self {
        Self {
            protocol,
            dp_type: DpType::default(),
            state: LinkState::Disconnected,
            idcode: None,
            dp_select: None,
        }
    }

    /// Creates a new SWD interface from the given pins and delay.
    pub fn from_io(io: IO, delay: D) -> Self {
        Self::new(SwdProtocol::new(io, delay))
    }

    /// Applies a complete link configuration.
    ///
    /// Arguments:
    /// - `config`: retry count (0 restores the default), DP type and speed.
    pub fn configure(&mut self, config: Config) {
        debug!("Exec:  Configure {config:?}");
        self.protocol.set_retries(config.retries);
        self.protocol.set_speed(config.speed);
        self.dp_type = config.dp_type;
    }

    /// Returns the current link configuration
    pub fn config(&self) -> Config {
        Config {
            retries: self.protocol.retries(),
            dp_type: self.dp_type,
            speed: self.protocol.speed(),
        }
    }

    pub fn dp_type(&self) -> DpType {
        self.dp_type
    }

    /// Sets the Debug Port type, which selects the connect and disconnect
    /// sequences.
    pub fn set_dp_type(&mut self, dp_type: DpType) {
        self.dp_type = dp_type;
    }

    /// Sets the SWD speed for this interface.
    ///
    /// Can be changed at any time.  For example, if [`Self::connect()`]
    /// fails, retry with a slow speed.
    pub fn set_swd_speed(&mut self, speed: Speed) {
        trace!("Exec:  Set {speed:?}");
        self.protocol.set_speed(speed);
    }

    pub fn swd_speed(&self) -> Speed {
        self.protocol.speed()
    }

    /// Sets the number of attempts per packet while the target answers
    /// WAIT.  0 restores the default.
    pub fn set_retries(&mut self, retries: u8) {
        self.protocol.set_retries(retries);
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Returns whether the target answered the IDCODE read after the last
    /// line reset.
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// IDCODE read by the last successful line reset
    pub fn idcode(&self) -> Option<IdCode> {
        self.idcode
    }

    /// Last value written to DP SELECT since the last line reset
    pub fn dp_select(&self) -> Option<Select> {
        self.dp_select
    }

    pub fn protocol(&self) -> &SwdProtocol<IO, D> {
        &self.protocol
    }

    pub fn protocol_mut(&mut self) -> &mut SwdProtocol<IO, D> {
        &mut self.protocol
    }

    /// Runs a DAP transaction: a sequence of packets to one DP or AP
    /// register.
    ///
    /// Reads fill `words`.  AP reads are posted, so the first packet's data
    /// is discarded and the final word is collected from DP RDBUFF.  Writes
    /// send one packet per word; AP writes finish with an RDBUFF read, so a
    /// fault on the last write is reported here.  All packets are sent even
    /// after a failure, and the last non-OK acknowledge is returned.
    ///
    /// Arguments:
    /// - `op`: the register to access
    /// - `words`: 1 to [`MAX_MOVE_WORDS`] words, read into or written from
    ///
    /// Returns:
    /// - `Ok(())` if every packet was acknowledged OK.
    /// - `Err(SwdError::InvalidCommand)` if `words` is empty or too long.
    ///   Nothing is sent.
    /// - `Err(SwdError)` mapped from the last failing acknowledge otherwise.
    pub fn dap_move(&mut self, op: SwdOp, words: &mut [u32]) -> Result<(), SwdError> {
        let count = words.len();
        if count == 0 || count > MAX_MOVE_WORDS {
            debug!("Error: {op} with {count} words");
            return Err(SwdError::InvalidCommand);
        }

        trace!("Exec:  {op} x{count}");
        self.protocol.reset_ack_error();
        let request = op.request();

        match op {
            SwdOp::DpRead(_) => {
                for word in words.iter_mut() {
                    self.protocol.shift_packet(request, word, 0);
                }
            }
            SwdOp::ApRead(_) => {
                let mut discard = 0;
                self.protocol.shift_packet(request, &mut discard, 0);
                for word in words.iter_mut().take(count - 1) {
                    self.protocol.shift_packet(request, word, 0);
                }
                self.protocol
                    .shift_packet(Request::RDBUFF_RD, &mut words[count - 1], 0);
            }
            SwdOp::DpWrite(_) | SwdOp::ApWrite(_) => {
                for word in words.iter_mut() {
                    self.protocol.shift_packet(request, word, 0);
                }
                if op.is_ap() {
                    let mut discard = 0;
                    self.protocol
                        .shift_packet(Request::RDBUFF_RD, &mut discard, 0);
                }
            }
        }

        self.protocol.shift_out(0);

        SwdError::from_ack(self.protocol.ack_error())
            .inspect_err(|e| debug!("Error: {op} x{count}: {e}"))
    }

    /// Reads a single word from a DP or AP register.
    pub fn dap_read(&mut self, op: SwdOp) -> Result<u32, SwdError> {
        if !op.is_read() {
            return Err(SwdError::InvalidCommand);
        }
        let mut word = [0];
        self.dap_move(op, &mut word)?;
        Ok(word[0])
    }

    /// Writes a single word to a DP or AP register.
    pub fn dap_write(&mut self, op: SwdOp, value: u32) -> Result<(), SwdError> {
        if op.is_read() {
            return Err(SwdError::InvalidCommand);
        }
        self.dap_move(op, &mut [value])
    }

    /// Read a Debug Port register
    ///
    /// Arguments:
    /// - `reg`: The register to read, which must implement the `DpRegister`
    ///   trait.
    ///
    /// Returns:
    /// - `Ok(value)` if the register was read successfully.
    /// - `Err(SwdError)` if there was an error reading the register.
    ///
    /// ```rust,ignore
    /// use sim3prog_core::arm::dp::CtrlStatRegister;
    /// let value = swd_if.read_dp_register(CtrlStatRegister)?;
    /// esp_println::println!("DP CTRL/STAT value: {value}");
    /// ```
    pub fn read_dp_register<R>(&mut self, _reg: R) -> Result<R::Value, SwdError>
    where
        R: ReadableRegister + DpRegister,
        R::Value: From<u32>,
    {
        let raw_data = self.dap_read(SwdOp::DpRead(R::ADDRESS))?;
        Ok(R::from_raw(raw_data))
    }

    /// Write a Debug Port register
    ///
    /// ```rust,ignore
    /// use sim3prog_core::arm::dp::{Abort, AbortRegister};
    /// swd_if.write_dp_register(AbortRegister, Abort::CLEAR_ALL)?;
    /// ```
    pub fn write_dp_register<R>(&mut self, _reg: R, value: R::Value) -> Result<(), SwdError>
    where
        R: WritableRegister + DpRegister,
        u32: From<R::Value>,
    {
        self.dap_write(SwdOp::DpWrite(R::ADDRESS), R::to_raw(value))
    }

    /// Read an Access Port register, in the AP and bank last selected with
    /// [`Self::select()`].  The posted read result is collected from RDBUFF
    /// automatically.
    ///
    /// ```rust,ignore
    /// use sim3prog_core::arm::map::DrwRegister;
    /// let value = swd_if.read_ap_register(DrwRegister)?;
    /// esp_println::println!("AP DRW value: {value}");
    /// ```
    pub fn read_ap_register<R>(&mut self, _reg: R) -> Result<R::Value, SwdError>
    where
        R: ReadableRegister + ApRegister,
        R::Value: From<u32>,
    {
        let raw_data = self.dap_read(SwdOp::ApRead(R::ADDRESS))?;
        Ok(R::from_raw(raw_data))
    }

    /// Write an Access Port register, in the AP and bank last selected with
    /// [`Self::select()`].
    pub fn write_ap_register<R>(&mut self, _reg: R, value: R::Value) -> Result<(), SwdError>
    where
        R: WritableRegister + ApRegister,
        u32: From<R::Value>,
    {
        self.dap_write(SwdOp::ApWrite(R::ADDRESS), R::to_raw(value))
    }

    /// Writes DP SELECT, choosing the AP and register bank used by
    /// following AP operations.
    pub fn select(&mut self, select: Select) -> Result<(), SwdError> {
        trace!("Exec:  Select {}", select.selection_info());
        self.write_dp_register(SelectRegister, select)?;
        self.dp_select = Some(select);
        Ok(())
    }

    /// Reads the DP IDCODE register
    pub fn read_idcode(&mut self) -> Result<IdCode, SwdError> {
        self.read_dp_register(IdCodeRegister)
    }

    /// Connects to the target's debug port.
    ///
    /// The SWD lines are idled and, for a SWJ-DP, the JTAG to SWD switch
    /// sequence is sent.  A line reset follows.
    ///
    /// Returns:
    /// - `Ok(IdCode)`: the target answered the IDCODE read.
    /// - `Err(SwdError)`: the IDCODE read failed.  The link is left
    ///   [`LinkState::LineResetPending`].
    pub fn connect(&mut self) -> Result<IdCode, SwdError> {
        debug!("Exec:  Connect {:?}", self.dp_type);
        self.protocol.idle_pins();

        if self.dp_type == DpType::Swj {
            self.protocol.shift_reset();
            for byte in JTAG_TO_SWD.to_le_bytes() {
                self.protocol.shift_out(byte);
            }
        }

        self.line_reset()
    }

    /// Performs an SWD line reset, followed by the IDCODE read that ends it.
    ///
    /// Until the IDCODE read succeeds the target answers nothing else, so
    /// this must also be called to recover from a
    /// [`SwdError::WireError`].
    ///
    /// Returns:
    /// - `Ok(IdCode)`: the link is [`LinkState::Connected`].
    /// - `Err(SwdError)`: the link stays [`LinkState::LineResetPending`].
    pub fn line_reset(&mut self) -> Result<IdCode, SwdError> {
        trace!("Exec:  Line reset");
        self.state = LinkState::LineResetPending;
        self.idcode = None;
        self.dp_select = None;

        self.protocol.shift_reset();
        self.protocol.shift_out(0);
        let mut data = 0;
        let ack = self.protocol.shift_packet(Request::IDCODE_RD, &mut data, 1);
        self.protocol.shift_out(0);

        SwdError::from_ack(ack).inspect_err(|e| debug!("Error: Line reset: {e}"))?;

        let idcode = IdCode::from(data);
        match Cortex::from_idcode(idcode) {
            Some(cortex) => debug!("Value: IDCODE {idcode} ({cortex})"),
            None => warn!("Unrecognised IDCODE {idcode:#}"),
        }

        self.state = LinkState::Connected;
        self.idcode = Some(idcode);
        Ok(idcode)
    }

    /// Ends the SWD session.
    ///
    /// For a SWJ-DP the target is switched back to JTAG.  SWDIO and SWCLK
    /// are then released.  The reset line is not touched.
    pub fn disconnect(&mut self) {
        debug!("Exec:  Disconnect");
        self.protocol.idle_pins();

        if self.dp_type == DpType::Swj {
            self.protocol.shift_reset();
            for byte in SWD_TO_JTAG.to_le_bytes() {
                self.protocol.shift_out(byte);
            }
        }

        self.protocol.release_pins();
        self.state = LinkState::Disconnected;
        self.idcode = None;
        self.dp_select = None;
    }

    /// Call to clear any sticky errors on the Debug Port.
    ///
    /// Reads CTRL/STAT, writes ABORT to clear every sticky flag, and reads
    /// CTRL/STAT again.  Each packet is tried once, without WAIT retries.
    /// Only the final read decides the result; the first
    /// two packets may fail while errors are set.
    ///
    /// Returns:
    /// - `Ok(ClearedErrors)` with both CTRL/STAT snapshots.  A failed first
    ///   read leaves `before` zero.
    /// - `Err(SwdError)` if the final CTRL/STAT read failed.
    pub fn clear_errors(&mut self) -> Result<ClearedErrors, SwdError> {
        trace!("Exec:  Clear errors");

        // One attempt per packet, as for the line reset
        let mut before = 0;
        self.protocol
            .shift_packet(Request::CTRLSTAT_RD, &mut before, 1);
        let mut abort = u32::from(Abort::CLEAR_ALL);
        self.protocol.shift_packet(Request::ABORT_WR, &mut abort, 1);
        let mut after = 0;
        let ack = self
            .protocol
            .shift_packet(Request::CTRLSTAT_RD, &mut after, 1);
        self.protocol.shift_out(0);

        SwdError::from_ack(ack).inspect_err(|e| debug!("Error: Clear errors: {e}"))?;

        let cleared = ClearedErrors {
            before: CtrlStat::from(before),
            after: CtrlStat::from(after),
        };
        if cleared.before.has_errors() {
            debug!("Value: Cleared {}", cleared.before.error_states());
        }
        trace!("OK:    Clear errors");
        Ok(cleared)
    }

    /// Drives the target reset line (nSRST) low
    pub fn assert_target_reset(&mut self) {
        debug!("Exec:  Assert target reset");
        self.protocol.set_reset(false);
    }

    /// Releases the target reset line (nSRST) high
    pub fn release_target_reset(&mut self) {
        debug!("Exec:  Release target reset");
        self.protocol.set_reset(true);
    }

    /// Whether the reset line is low.  Senses the line, so also reports a
    /// reset held by the target or a button.
    pub fn is_target_reset_asserted(&mut self) -> bool {
        !self.protocol.reset_level()
    }
}

/// Used to specify SWD operations, which are Debug Port (DP) or Access Port
/// (AP) reads or writes.  Each carries the register's byte offset (0x0,
/// 0x4, 0x8 or 0xC) within the selected bank.
///
/// ```rust,ignore
/// let _dp_read = SwdOp::DpRead(sim3prog_core::arm::dp::CtrlStatRegister::ADDRESS);
/// let _ap_read = SwdOp::ApRead(sim3prog_core::arm::map::DrwRegister::ADDRESS);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdOp {
    DpRead(u8),
    DpWrite(u8),
    ApRead(u8),
    ApWrite(u8),
}

impl SwdOp {
    const APNDP: u8 = 1 << 0;
    const RNW: u8 = 1 << 1;
    const A32_MASK: u8 = 0x0C;

    /// Returns the 4-bit DAP code `A3:A2:RnW:APnDP`
    pub const fn dap(&self) -> u8 {
        match *self {
            SwdOp::DpRead(a) => (a & Self::A32_MASK) | Self::RNW,
            SwdOp::DpWrite(a) => a & Self::A32_MASK,
            SwdOp::ApRead(a) => (a & Self::A32_MASK) | Self::RNW | Self::APNDP,
            SwdOp::ApWrite(a) => (a & Self::A32_MASK) | Self::APNDP,
        }
    }

    /// Parses a 4-bit DAP code.  Higher bits are ignored.
    pub fn from_dap(dap: u8) -> Self {
        let addr = dap & Self::A32_MASK;
        match (dap & Self::RNW != 0, dap & Self::APNDP != 0) {
            (true, true) => SwdOp::ApRead(addr),
            (true, false) => SwdOp::DpRead(addr),
            (false, true) => SwdOp::ApWrite(addr),
            (false, false) => SwdOp::DpWrite(addr),
        }
    }

    /// Returns the wire request header for this operation
    pub fn request(&self) -> Request {
        Request::from_dap(self.dap())
    }

    pub fn is_read(&self) -> bool {
        matches!(self, SwdOp::DpRead(_) | SwdOp::ApRead(_))
    }

    pub fn is_ap(&self) -> bool {
        matches!(self, SwdOp::ApRead(_) | SwdOp::ApWrite(_))
    }

    pub fn address(&self) -> u8 {
        match self {
            SwdOp::DpRead(a) | SwdOp::DpWrite(a) | SwdOp::ApRead(a) | SwdOp::ApWrite(a) => {
                *a & Self::A32_MASK
            }
        }
    }
}

impl fmt::Display for SwdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdOp::DpRead(a) => write!(f, "DP Read 0x{a:02X}"),
            SwdOp::DpWrite(a) => write!(f, "DP Write 0x{a:02X}"),
            SwdOp::ApRead(a) => write!(f, "AP Read 0x{a:02X}"),
            SwdOp::ApWrite(a) => write!(f, "AP Write 0x{a:02X}"),
        }
    }
}
