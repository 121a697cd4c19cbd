// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD (Wire) Debug Interface
//!
//! This module implements the high-level operations needed to program a
//! SiM3 target's SRAM: connecting, halting the core as it leaves reset,
//! memory and core register access, and loading and starting an image.
//!
//! If this module does not give you the control you need, you can use the
//! [`SwdInterface`] object directly for lower-level SWD access.
//!
//! To combine the use of this module with [`SwdInterface`], create the
//! [`DebugInterface`] object using the `new()` method, and then use
//! `swd_if()` to access the underlying [`SwdInterface`] object as required.

use alloc::format;
use core::result::Result;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use sim3prog_core::SramImage;
use sim3prog_core::arm::dp::{CtrlStat, CtrlStatRegister, IdCode};
use sim3prog_core::arm::map::{Csw, CswRegister, DrwRegister, Tar, TarRegister};
use sim3prog_core::arm::register::{MemoryMappedRegister, RegisterDescriptor};
use sim3prog_core::arm::scs::{Aircr, Dcrdr, Dcrsr, Demcr, Dfsr, Dhcsr, Vtor, core_reg};
use sim3prog_core::sim3::{
    CHIP_AP_BANK_0, CHIP_AP_BANK_F, ChipApId, Ctrl1, Ctrl1Register, IdRegister, MEM_AP_BANK_0,
};

use crate::SwdError;
use crate::interface::{MAX_MOVE_WORDS, SwdInterface, SwdOp};
use crate::io::{Delay, SwdIo};

#[doc(inline)]
pub use crate::protocol::SwdProtocol;

// SWD wraps read/writes using auto-incrementing at a 1K boundary, although
// this is implementation dependent.
const SWD_MEMORY_BOUNDARY: u32 = 0x400;

/// Words uploaded per batch by [`DebugInterface::load_sram_image()`]
pub const SRAM_BATCH_WORDS: usize = 1024;

/// ARM Debug Interface object
///
/// This is used by applications to run complete sequences against a SiM3
/// target over SWD.
///
/// The simplest way to create a `DebugInterface` is to use the
/// [`Self::from_io()`] method:
///
/// ```rust,ignore
/// use sim3prog_core::SramImage;
/// use sim3prog_swd::debug::DebugInterface;
/// use sim3prog_swd::io::esp::{EspSwdIo, RiscvDelay};
///
/// let peripherals = esp_hal::init(config);
/// let io = EspSwdIo::new(peripherals.GPIO0, peripherals.GPIO1, peripherals.GPIO2);
/// let mut debug = DebugInterface::from_io(io, RiscvDelay);
///
/// let image = SramImage::from_bytes(IMAGE)?;
/// debug.program_sram(&image)?;
/// ```
#[derive(Debug)]
pub struct DebugInterface<IO, D> {
    swd: SwdInterface<IO, D>,
}

impl<IO, D> DebugInterface<IO, D>
where
    IO: SwdIo,
    D: Delay,
{
    /// Creates a new `DebugInterface` with the given [`SwdInterface`].
    ///
    /// Returns:
    /// - `DebugInterface`: A new instance of the `DebugInterface` with the
    ///   given `SwdInterface`.
    pub fn new(swd: SwdInterface<IO, D>) -> Self {
        Self { swd }
    }

    /// Creates a new `DebugInterface` from the given pins and delay.
    ///
    /// When creating a `DebugInterface` using this method, you can access the
    /// underlying [`SwdInterface`] (which gives lower-level SWD control) using
    /// the [`Self::swd_if()`] method.
    pub fn from_io(io: IO, delay: D) -> Self {
        Self::new(SwdInterface::from_io(io, delay))
    }

    /// Returns a mutable reference to the underlying [`SwdInterface`].
    pub fn swd_if(&mut self) -> &mut SwdInterface<IO, D> {
        &mut self.swd
    }

    /// Returns the IDCODE read when the link was last connected
    pub fn idcode(&self) -> Option<IdCode> {
        self.swd.idcode()
    }

    fn check_connected(&self) -> Result<(), SwdError> {
        if self.swd.is_connected() {
            Ok(())
        } else {
            debug!("Attempt to access target before connecting");
            Err(SwdError::NotConnected)
        }
    }

    /// Connects to the target and powers up its debug and system domains.
    ///
    /// Connects, re-reads the IDCODE, requests power-up through CTRL/STAT
    /// and clears any sticky errors.
    ///
    /// Returns:
    /// - `Ok(IdCode)`: the IDCODE of the target's debug port.
    /// - `Err(SwdError)`: if any step failed.  Later steps are not run.
    pub fn initialize_target(&mut self) -> Result<IdCode, SwdError> {
        debug!("Exec:  Initialize target");
        self.swd.connect()?;

        let idcode = self.swd.read_idcode()?;
        debug!("Value: IDCODE {idcode}");

        self.swd
            .write_dp_register(CtrlStatRegister, CtrlStat::POWER_UP)?;
        self.swd.clear_errors()?;

        debug!("OK:    Target initialized");
        Ok(idcode)
    }

    /// Reads the SiM3 Chip-AP ID register.  Leaves Chip-AP bank F selected.
    pub fn read_chip_ap_id(&mut self) -> Result<ChipApId, SwdError> {
        self.check_connected()?;
        self.swd.select(CHIP_AP_BANK_F)?;
        let id = self.swd.read_ap_register(IdRegister)?;
        debug!("Value: Chip-AP ID {id}");
        Ok(id)
    }

    /// Halts the core as it comes out of reset.
    ///
    /// The Chip-AP holds the core in reset while halting debug and reset
    /// vector catch are enabled, then releases it.  The core stops on its
    /// first instruction.  Each step runs only if the previous one
    /// succeeded; nothing is undone on failure.
    ///
    /// Returns:
    /// - `Ok(())`: the core has been released into a halt, and MEM-AP bank
    ///   0 is selected.
    /// - `Err(SwdError::CommandFailed)`: the Chip-AP ID is not a SiM3 one.
    /// - `Err(SwdError)`: a transaction failed.
    pub fn connect_and_halt_core(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Connect and halt core");

        let id = self.read_chip_ap_id()?;
        if !id.is_sim3() {
            warn!("Unexpected Chip-AP ID {id}, expected {}", ChipApId::EXPECTED);
            return Err(SwdError::CommandFailed(format!(
                "unexpected Chip-AP ID {id}"
            )));
        }

        // Hold the core in reset
        self.swd.select(CHIP_AP_BANK_0)?;
        self.swd.write_ap_register(Ctrl1Register, Ctrl1::CORE_RESET)?;

        self.swd.select(MEM_AP_BANK_0)?;
        self.swd.write_ap_register(CswRegister, Csw::DEFAULT_32BIT)?;

        self.write_register(Dhcsr::DEBUG_ENABLE)?;
        self.write_register(Demcr::CATCH_RESET)?;
        self.write_register(Aircr::SYSTEM_RESET)?;

        // Release it, to be caught on the reset vector
        self.swd.select(CHIP_AP_BANK_0)?;
        self.swd.write_ap_register(Ctrl1Register, Ctrl1::RELEASE)?;

        self.swd.select(MEM_AP_BANK_0)?;

        debug!("OK:    Core halted");
        Ok(())
    }

    // Selects MEM-AP bank 0, sets CSW and TAR ready for DRW access
    fn setup_mem_ap(&mut self, csw: Csw, addr: u32) -> Result<(), SwdError> {
        self.swd.select(MEM_AP_BANK_0)?;
        self.swd.write_ap_register(CswRegister, csw)?;
        self.swd.write_ap_register(TarRegister, Tar::new(addr))
    }

    /// Reads a 32-bit value from the target's memory at the specified address.
    ///
    /// Arguments:
    /// - `addr`: The word aligned address to read from.
    ///
    /// Returns:
    /// - `Ok(u32)`: if the read was successful.
    /// - `Err(SwdError)`: if there was an error reading from the target's
    ///   memory.
    pub fn read_mem(&mut self, addr: u32) -> Result<u32, SwdError> {
        self.check_connected()?;
        self.setup_mem_ap(Csw::DEFAULT_32BIT, addr)?;
        let data = self.swd.dap_read(SwdOp::ApRead(DrwRegister::ADDRESS))?;
        trace!("Value: 0x{addr:08X} = 0x{data:08X}");
        Ok(data)
    }

    /// Writes a 32-bit value to the target's memory at the specified address.
    ///
    /// Arguments:
    /// - `addr`: The word aligned address to write to.
    /// - `data`: The value to write.
    pub fn write_mem(&mut self, addr: u32, data: u32) -> Result<(), SwdError> {
        self.check_connected()?;
        trace!("Exec:  Write 0x{addr:08X} = 0x{data:08X}");
        self.setup_mem_ap(Csw::DEFAULT_32BIT, addr)?;
        self.swd
            .dap_write(SwdOp::ApWrite(DrwRegister::ADDRESS), data)
    }

    /// Reads a memory mapped register, such as DHCSR
    pub fn read_register<R: MemoryMappedRegister>(&mut self) -> Result<R, SwdError> {
        let value = self.read_mem(R::ADDRESS)?;
        trace!("Value: {} = 0x{value:08X}", R::NAME);
        Ok(R::from(value))
    }

    /// Writes a memory mapped register, such as DHCSR
    pub fn write_register<R: MemoryMappedRegister>(&mut self, value: R) -> Result<(), SwdError> {
        let value: u32 = value.into();
        trace!("Exec:  Write {} = 0x{value:08X}", R::NAME);
        self.write_mem(R::ADDRESS, value)
    }

    // Splits a sequential transfer starting at `addr` so no chunk crosses an
    // auto-increment boundary or exceeds a single move.
    fn chunk_words(addr: u32, remaining: usize) -> usize {
        let to_boundary = ((SWD_MEMORY_BOUNDARY - (addr % SWD_MEMORY_BOUNDARY)) / 4) as usize;
        remaining.min(to_boundary).min(MAX_MOVE_WORDS)
    }

    /// Writes consecutive words to the target's memory.
    ///
    /// Uses address auto-increment.  TAR is re-written at every 1KB
    /// boundary, where the target's auto-increment wraps.
    ///
    /// Arguments:
    /// - `addr`: The word aligned start address.
    /// - `words`: The data to write.  May be empty.
    ///
    /// Returns:
    /// - `Ok(())`: if every word was written.
    /// - `Err(SwdError::InvalidCommand)`: if `addr` is not word aligned.
    /// - `Err(SwdError)`: on the first failing transaction.  Earlier words
    ///   have been written.
    pub fn write_sequential_words(&mut self, addr: u32, words: &[u32]) -> Result<(), SwdError> {
        self.check_connected()?;
        if addr % 4 != 0 {
            return Err(SwdError::InvalidCommand);
        }
        if words.is_empty() {
            return Ok(());
        }
        trace!("Exec:  Write {} words from 0x{addr:08X}", words.len());

        self.swd.select(MEM_AP_BANK_0)?;
        self.swd
            .write_ap_register(CswRegister, Csw::AUTO_INC_32BIT)?;

        let mut buf = [0u32; MAX_MOVE_WORDS];
        let mut addr = addr;
        let mut remaining = words;
        while !remaining.is_empty() {
            let count = Self::chunk_words(addr, remaining.len());
            let (chunk, rest) = remaining.split_at(count);

            self.swd.write_ap_register(TarRegister, Tar::new(addr))?;
            buf[..count].copy_from_slice(chunk);
            self.swd
                .dap_move(SwdOp::ApWrite(DrwRegister::ADDRESS), &mut buf[..count])?;

            addr = addr.wrapping_add((count * 4) as u32);
            remaining = rest;
        }

        Ok(())
    }

    /// Reads consecutive words from the target's memory.
    ///
    /// Arguments:
    /// - `addr`: The word aligned start address.
    /// - `buf`: Filled with the data read.  Its length is the number of
    ///   words to read.
    pub fn read_sequential_words(&mut self, addr: u32, buf: &mut [u32]) -> Result<(), SwdError> {
        self.check_connected()?;
        if addr % 4 != 0 {
            return Err(SwdError::InvalidCommand);
        }
        if buf.is_empty() {
            return Ok(());
        }
        trace!("Exec:  Read {} words from 0x{addr:08X}", buf.len());

        self.swd.select(MEM_AP_BANK_0)?;
        self.swd
            .write_ap_register(CswRegister, Csw::AUTO_INC_32BIT)?;

        let mut addr = addr;
        let mut remaining = buf;
        while !remaining.is_empty() {
            let count = Self::chunk_words(addr, remaining.len());
            let (chunk, rest) = core::mem::take(&mut remaining).split_at_mut(count);

            self.swd.write_ap_register(TarRegister, Tar::new(addr))?;
            self.swd
                .dap_move(SwdOp::ApRead(DrwRegister::ADDRESS), chunk)?;

            addr = addr.wrapping_add((count * 4) as u32);
            remaining = rest;
        }

        Ok(())
    }

    /// Writes a core register.  The core must be halted.
    ///
    /// Arguments:
    /// - `reg`: register number, see [`core_reg`]
    /// - `value`: the value to write
    pub fn write_core_register(&mut self, reg: u8, value: u32) -> Result<(), SwdError> {
        debug!("Exec:  Core register {reg} = 0x{value:08X}");
        self.write_register(Dcrdr::from(value))?;
        self.write_register(Dcrsr::write(reg))
    }

    /// Reads a core register.  The core must be halted.
    pub fn read_core_register(&mut self, reg: u8) -> Result<u32, SwdError> {
        self.write_register(Dcrsr::read(reg))?;
        let value = self.read_register::<Dcrdr>()?.data();
        debug!("Value: Core register {reg} = 0x{value:08X}");
        Ok(value)
    }

    /// Halts the core, enabling halting debug if it was not already
    pub fn halt_core(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Halt core");
        self.write_register(Dhcsr::HALT)
    }

    /// Lets a halted core run, leaving halting debug enabled
    pub fn resume_core(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Resume core");
        self.write_register(Dhcsr::DEBUG_ENABLE)
    }

    pub fn is_core_halted(&mut self) -> Result<bool, SwdError> {
        Ok(self.read_register::<Dhcsr>()?.s_halt())
    }

    /// Reads the debug events that have occurred since the last call, and
    /// clears them.
    ///
    /// Returns:
    /// - `Ok(Dfsr)`: the events, for example [`Dfsr::vcatch()`] after the
    ///   halt on the reset vector.
    /// - `Err(SwdError)`: the read or the clear failed.
    pub fn read_debug_events(&mut self) -> Result<Dfsr, SwdError> {
        self.check_connected()?;
        let events = self.read_register::<Dfsr>()?;
        debug!("Value: DFSR 0x{:08X}", u32::from(events));
        if u32::from(events) != 0 {
            self.write_register(events)?;
        }
        Ok(events)
    }

    /// Loads an image into SRAM and starts it.
    ///
    /// The core must already be halted, see
    /// [`Self::connect_and_halt_core()`].  The image is uploaded in batches
    /// of [`SRAM_BATCH_WORDS`] words.  VTOR is pointed at the image, PC and
    /// SP are taken from its vector table, and halting debug is then
    /// disabled so the core runs.
    ///
    /// Returns:
    /// - `Ok(())`: the image is running.
    /// - `Err(SwdError)`: on the first failing transaction.
    pub fn load_sram_image(&mut self, image: &SramImage) -> Result<(), SwdError> {
        self.check_connected()?;
        debug!(
            "Exec:  Load {} words to 0x{:08X}",
            image.len(),
            image.base()
        );

        let mut addr = image.base();
        for batch in image.words().chunks(SRAM_BATCH_WORDS) {
            trace!("Exec:  Batch of {} words to 0x{addr:08X}", batch.len());
            self.write_sequential_words(addr, batch)?;
            addr = addr.wrapping_add((batch.len() * 4) as u32);
        }

        self.write_register(Vtor::new(image.base()))?;
        self.write_core_register(core_reg::PC, image.reset_vector())?;
        self.write_core_register(core_reg::SP, image.initial_sp())?;
        self.write_register(Dhcsr::RUN)?;

        debug!("OK:    Image started at 0x{:08X}", image.reset_vector());
        Ok(())
    }

    /// Drops the power-up requests and disconnects.
    ///
    /// The link is disconnected even if the CTRL/STAT write fails, in which
    /// case that error is returned.
    pub fn shutdown(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Shutdown");
        let result = self
            .swd
            .write_dp_register(CtrlStatRegister, CtrlStat::POWER_DOWN);
        self.swd.disconnect();
        result
    }

    /// Programs an image into the target's SRAM and runs it.
    ///
    /// Initializes the target, clears errors, halts the core out of reset,
    /// loads and starts the image and shuts the link down.  On failure the
    /// link is disconnected and the first error returned.
    ///
    /// Returns:
    /// - `Ok(IdCode)`: the IDCODE of the programmed target.
    /// - `Err(SwdError)`: the first error.
    pub fn program_sram(&mut self, image: &SramImage) -> Result<IdCode, SwdError> {
        info!("Programming {image}");

        let result = self.program_sram_steps(image);
        match &result {
            Ok(idcode) => info!("Programmed target {idcode}"),
            Err(e) => {
                error!("Programming failed: {e}");
                self.swd.disconnect();
            }
        }
        result
    }

    fn program_sram_steps(&mut self, image: &SramImage) -> Result<IdCode, SwdError> {
        let idcode = self.initialize_target()?;

        let cleared = self.swd.clear_errors()?;
        if cleared.after.has_errors() {
            warn!("DP errors remain: {}", cleared.after.error_states());
        }

        self.connect_and_halt_core()?;
        self.load_sram_image(image)?;
        self.shutdown()?;

        Ok(idcode)
    }
}
