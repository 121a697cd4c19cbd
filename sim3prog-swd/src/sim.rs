// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated SWD targets, used by the unit tests.
//!
//! [`SimTarget`] decodes the host's SWDIO level on every rising SWCLK edge,
//! and drives its responses just after the edge, so the host samples them
//! before the next one.  It models a SWJ-DP with a pipelined AHB MEM-AP over
//! sparse memory, the Cortex-M debug registers in the System Control Space
//! and the SiM3 Chip-AP.
//!
//! [`TraceIo`] has no target behind it.  It records what the host drives,
//! and can loop written bits back.

use std::collections::{BTreeMap, VecDeque};

use crate::io::{Direction, SwdIo};
use crate::protocol::{Ack, Request};

// Host-driven high cycles that make a line reset
const LINE_RESET_HIGH_CYCLES: u32 = 50;

const JTAG_TO_SWD: u16 = 0xE79E;
const SWD_TO_JTAG: u16 = 0xE73C;

const STICKYORUN: u32 = 1 << 1;
const STICKYCMP: u32 = 1 << 4;
const STICKYERR: u32 = 1 << 5;
const WDATAERR: u32 = 1 << 7;
const STICKY_MASK: u32 = STICKYORUN | STICKYCMP | STICKYERR | WDATAERR;
const CTRL_REQ_MASK: u32 = (1 << 0) | (1 << 26) | (1 << 28) | (1 << 30);

const DHCSR: u32 = 0xE000_EDF0;
const DCRSR: u32 = 0xE000_EDF4;
const DCRDR: u32 = 0xE000_EDF8;
const DEMCR: u32 = 0xE000_EDFC;
const AIRCR: u32 = 0xE000_ED0C;
const DFSR: u32 = 0xE000_ED30;

const C_DEBUGEN: u32 = 1 << 0;
const C_HALT: u32 = 1 << 1;
const S_REGRDY: u32 = 1 << 16;
const S_HALT: u32 = 1 << 17;
const S_RESET_ST: u32 = 1 << 25;

const DFSR_HALTED: u32 = 1 << 0;
const DFSR_VCATCH: u32 = 1 << 3;

const CHIP_AP: u8 = 0x0A;
const MEM_AP: u8 = 0x00;
const CORE_RESET_AP: u32 = 1 << 3;

#[derive(Debug, Clone, Copy)]
enum Phase {
    // Not responding until the next line reset
    Lost,
    // Line reset seen, waiting for SWDIO to go low
    Reset,
    // Waiting for a start bit
    Idle,
    Request { bits: u8, count: u8 },
    Turnaround { response: Response },
    Ack { response: Response, index: u8 },
    ReadData { data: u32, parity: bool, index: u8 },
    ReadParity,
    WriteTurnaround { request: Request },
    WriteData { request: Request, data: u32, index: u8 },
    WriteParity { request: Request, data: u32 },
}

#[derive(Debug, Clone, Copy)]
struct Response {
    request: Request,
    ack: Ack,
    data: u32,
    parity: bool,
}

/// Pin-level model of a SiM3 target's debug port
#[derive(Debug)]
pub(crate) struct SimTarget {
    swclk: bool,
    host_level: bool,
    host_direction: Direction,
    target_drive: Option<bool>,
    reset_line: bool,

    present: bool,
    swd_selected: bool,
    phase: Phase,
    high_count: u32,
    since_reset: Option<u32>,
    sequence: u16,
    lockout: bool,

    host_bits: Vec<bool>,
    requests: Vec<u8>,
    mem_writes: Vec<(u32, u32)>,

    always_wait: bool,
    wait_remaining: u32,
    corrupt_parity: bool,
    scripted: VecDeque<u32>,

    idcode: u32,
    ctrl_stat: u32,
    select: u32,
    rdbuff: u32,
    last_read: u32,

    csw: u32,
    tar: u32,
    memory: BTreeMap<u32, u32>,

    dhcsr_control: u32,
    halted: bool,
    core_in_reset: bool,
    demcr: u32,
    dfsr: u32,
    dcrdr: u32,
    core_regs: [u32; 32],

    chip_ctrl1: u32,
    chip_ctrl2: u32,
    chip_id: u32,
}

impl SimTarget {
    /// A SiM3 target with a SWJ-DP, still in JTAG mode
    pub(crate) fn new() -> Self {
        Self {
            swclk: false,
            host_level: false,
            host_direction: Direction::Input,
            target_drive: None,
            reset_line: true,
            present: true,
            swd_selected: false,
            phase: Phase::Lost,
            high_count: 0,
            since_reset: None,
            sequence: 0,
            lockout: true,
            host_bits: Vec::new(),
            requests: Vec::new(),
            mem_writes: Vec::new(),
            always_wait: false,
            wait_remaining: 0,
            corrupt_parity: false,
            scripted: VecDeque::new(),
            idcode: 0x2BA0_1477,
            ctrl_stat: 0,
            select: 0,
            rdbuff: 0,
            last_read: 0,
            csw: 0,
            tar: 0,
            memory: BTreeMap::new(),
            dhcsr_control: 0,
            halted: false,
            core_in_reset: false,
            demcr: 0,
            dfsr: 0,
            dcrdr: 0,
            core_regs: [0; 32],
            chip_ctrl1: 0,
            chip_ctrl2: 0,
            chip_id: 0x0243_0002,
        }
    }

    /// A target whose SWD link is already up and past its line reset
    pub(crate) fn connected() -> Self {
        let mut target = Self::new();
        target.swd_selected = true;
        target.phase = Phase::Idle;
        target.lockout = false;
        target
    }

    /// A target with a SW-DP only, so no JTAG to SWD switch is needed
    pub(crate) fn sw_only() -> Self {
        let mut target = Self::new();
        target.swd_selected = true;
        target
    }

    /// Nothing connected: SWDIO floats high
    pub(crate) fn absent() -> Self {
        let mut target = Self::new();
        target.present = false;
        target
    }

    pub(crate) fn set_idcode(&mut self, idcode: u32) {
        self.idcode = idcode;
    }

    pub(crate) fn set_chip_id(&mut self, id: u32) {
        self.chip_id = id;
    }

    pub(crate) fn always_wait(&mut self, wait: bool) {
        self.always_wait = wait;
    }

    /// Answer WAIT to the next `count` requests
    pub(crate) fn wait_count(&mut self, count: u32) {
        self.wait_remaining = count;
    }

    pub(crate) fn corrupt_next_parity(&mut self) {
        self.corrupt_parity = true;
    }

    pub(crate) fn set_sticky_error(&mut self) {
        self.ctrl_stat |= STICKYERR;
    }

    /// Data phases of the following OK reads return these values, instead
    /// of register contents
    pub(crate) fn script_reads(&mut self, values: &[u32]) {
        self.scripted.extend(values.iter().copied());
    }

    pub(crate) fn write_memory(&mut self, addr: u32, value: u32) {
        self.memory.insert(addr, value);
    }

    pub(crate) fn memory(&self, addr: u32) -> u32 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }

    pub(crate) fn mem_writes(&self) -> &[(u32, u32)] {
        &self.mem_writes
    }

    pub(crate) fn requests(&self) -> &[u8] {
        &self.requests
    }

    pub(crate) fn host_bits(&self) -> &[bool] {
        &self.host_bits
    }

    pub(crate) fn clear_history(&mut self) {
        self.host_bits.clear();
        self.requests.clear();
        self.mem_writes.clear();
    }

    pub(crate) fn select(&self) -> u32 {
        self.select
    }

    pub(crate) fn ctrl_stat(&self) -> u32 {
        self.ctrl_stat
    }

    pub(crate) fn core_reg(&self, reg: usize) -> u32 {
        self.core_regs[reg]
    }

    pub(crate) fn set_core_reg(&mut self, reg: usize, value: u32) {
        self.core_regs[reg] = value;
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub(crate) fn is_core_in_reset(&self) -> bool {
        self.core_in_reset
    }

    pub(crate) fn chip_ctrl1(&self) -> u32 {
        self.chip_ctrl1
    }

    pub(crate) fn is_swd_selected(&self) -> bool {
        self.swd_selected
    }

    pub(crate) fn is_locked_out(&self) -> bool {
        self.lockout
    }

    pub(crate) fn host_direction(&self) -> Direction {
        self.host_direction
    }

    pub(crate) fn host_level(&self) -> bool {
        self.host_level
    }

    pub(crate) fn reset_line(&self) -> bool {
        self.reset_line
    }

    fn rising_edge(&mut self) {
        if self.host_direction == Direction::Output {
            let bit = self.host_level;
            self.host_bits.push(bit);
            self.sequence = (self.sequence >> 1) | (u16::from(bit) << 15);

            if bit {
                self.high_count += 1;
            } else {
                self.high_count = 0;
            }

            if self.high_count >= LINE_RESET_HIGH_CYCLES {
                self.since_reset = Some(0);
                if self.swd_selected {
                    self.line_reset();
                    return;
                }
            } else if let Some(count) = self.since_reset {
                // Switch sequences must directly follow the line reset
                let count = count + 1;
                self.since_reset = (count < 16).then_some(count);
                if count == 16 && self.check_switch_sequence() {
                    return;
                }
            }
        }

        if !self.present || !self.swd_selected {
            return;
        }

        self.advance();
    }

    fn line_reset(&mut self) {
        self.phase = Phase::Reset;
        self.target_drive = None;
    }

    fn check_switch_sequence(&mut self) -> bool {
        if !self.swd_selected && self.sequence == JTAG_TO_SWD {
            // SWD selected, but a line reset is needed before use
            self.swd_selected = true;
            self.phase = Phase::Lost;
            return true;
        }
        if self.swd_selected && self.sequence == SWD_TO_JTAG {
            self.swd_selected = false;
            self.phase = Phase::Lost;
            self.target_drive = None;
            return true;
        }
        false
    }

    fn host_bit(&self) -> bool {
        self.host_direction == Direction::Output && self.host_level
    }

    fn advance(&mut self) {
        let phase = self.phase;
        self.phase = match phase {
            Phase::Lost => Phase::Lost,
            Phase::Reset => {
                if self.host_direction == Direction::Output && !self.host_level {
                    self.lockout = true;
                    Phase::Idle
                } else {
                    Phase::Reset
                }
            }
            Phase::Idle => {
                if self.host_bit() {
                    Phase::Request { bits: 1, count: 1 }
                } else {
                    Phase::Idle
                }
            }
            Phase::Request { bits, count } => {
                let bits = bits | (u8::from(self.host_bit()) << count);
                if count == 7 {
                    self.decode_request(bits)
                } else {
                    Phase::Request {
                        bits,
                        count: count + 1,
                    }
                }
            }
            Phase::Turnaround { response } => {
                self.target_drive = Some(response.ack.value() & 1 != 0);
                Phase::Ack { response, index: 0 }
            }
            Phase::Ack { response, index } if index < 2 => {
                self.target_drive = Some(response.ack.value() & (1 << (index + 1)) != 0);
                Phase::Ack {
                    response,
                    index: index + 1,
                }
            }
            Phase::Ack { response, .. } => {
                if response.ack != Ack::Ok {
                    self.target_drive = None;
                    Phase::Idle
                } else if response.request.is_read() {
                    self.target_drive = Some(response.data & 1 != 0);
                    Phase::ReadData {
                        data: response.data,
                        parity: response.parity,
                        index: 0,
                    }
                } else {
                    self.target_drive = None;
                    Phase::WriteTurnaround {
                        request: response.request,
                    }
                }
            }
            Phase::ReadData {
                data,
                parity,
                index,
            } => {
                if index < 31 {
                    self.target_drive = Some(data & (1 << (index + 1)) != 0);
                    Phase::ReadData {
                        data,
                        parity,
                        index: index + 1,
                    }
                } else {
                    self.target_drive = Some(parity);
                    Phase::ReadParity
                }
            }
            Phase::ReadParity => {
                self.target_drive = None;
                Phase::Idle
            }
            Phase::WriteTurnaround { request } => Phase::WriteData {
                request,
                data: 0,
                index: 0,
            },
            Phase::WriteData {
                request,
                data,
                index,
            } => {
                let data = data | (u32::from(self.host_bit()) << index);
                if index < 31 {
                    Phase::WriteData {
                        request,
                        data,
                        index: index + 1,
                    }
                } else {
                    Phase::WriteParity { request, data }
                }
            }
            Phase::WriteParity { request, data } => {
                if self.host_bit() == (data.count_ones() % 2 == 1) {
                    self.write_register(request, data);
                } else {
                    self.ctrl_stat |= WDATAERR;
                }
                Phase::Idle
            }
        };
    }

    fn decode_request(&mut self, raw: u8) -> Phase {
        let request = Request::from_raw(raw);
        if !request.is_well_formed() {
            return Phase::Lost;
        }
        self.requests.push(raw);

        // After a line reset only an IDCODE read is answered
        if self.lockout && request != Request::IDCODE_RD {
            return Phase::Lost;
        }

        let ack = self.ack_for(request);
        let mut data = 0;
        if ack == Ack::Ok && request.is_read() {
            data = match self.scripted.pop_front() {
                Some(value) => value,
                None => self.read_register(request),
            };
            self.last_read = data;
        }

        let mut parity = data.count_ones() % 2 == 1;
        if ack == Ack::Ok && request.is_read() && self.corrupt_parity {
            self.corrupt_parity = false;
            parity = !parity;
        }

        Phase::Turnaround {
            response: Response {
                request,
                ack,
                data,
                parity,
            },
        }
    }

    fn ack_for(&mut self, request: Request) -> Ack {
        if self.always_wait {
            return Ack::Wait;
        }
        if self.wait_remaining > 0 {
            self.wait_remaining -= 1;
            return Ack::Wait;
        }

        let exempt = request == Request::IDCODE_RD
            || request == Request::CTRLSTAT_RD
            || request == Request::CTRLSTAT_WR
            || request == Request::ABORT_WR;
        if self.ctrl_stat & STICKY_MASK != 0 && !exempt {
            return Ack::Fault;
        }

        Ack::Ok
    }

    fn read_register(&mut self, request: Request) -> u32 {
        if request.is_ap() {
            let data = self.rdbuff;
            self.rdbuff = self.ap_read(request.address());
            return data;
        }

        match request.address() {
            0x0 => {
                self.lockout = false;
                self.idcode
            }
            0x4 => self.ctrl_stat,
            0x8 => self.last_read,
            _ => self.rdbuff,
        }
    }

    fn write_register(&mut self, request: Request, data: u32) {
        if request.is_ap() {
            self.ap_write(request.address(), data);
            return;
        }

        match request.address() {
            0x0 => self.abort(data),
            0x4 => {
                let mut value = (self.ctrl_stat & STICKY_MASK) | (data & CTRL_REQ_MASK);
                // Power and reset requests are acknowledged immediately
                value |= (value & ((1 << 26) | (1 << 28) | (1 << 30))) << 1;
                self.ctrl_stat = value;
            }
            0x8 => self.select = data,
            _ => {}
        }
    }

    fn abort(&mut self, data: u32) {
        if data & (1 << 1) != 0 {
            self.ctrl_stat &= !STICKYCMP;
        }
        if data & (1 << 2) != 0 {
            self.ctrl_stat &= !STICKYERR;
        }
        if data & (1 << 3) != 0 {
            self.ctrl_stat &= !WDATAERR;
        }
        if data & (1 << 4) != 0 {
            self.ctrl_stat &= !STICKYORUN;
        }
    }

    fn ap_register(&self, address: u8) -> (u8, u8) {
        let apsel = (self.select >> 24) as u8;
        let bank = ((self.select >> 4) & 0xF) as u8;
        (apsel, (bank << 4) | address)
    }

    fn ap_read(&mut self, address: u8) -> u32 {
        match self.ap_register(address) {
            (MEM_AP, 0x00) => self.csw,
            (MEM_AP, 0x04) => self.tar,
            (MEM_AP, 0x0C) => {
                let value = self.mem_read(self.tar);
                self.advance_tar();
                value
            }
            (MEM_AP, reg @ 0x10..=0x1C) => {
                self.mem_read((self.tar & !0xF) | u32::from(reg & 0xC))
            }
            (MEM_AP, 0xFC) => 0x2477_0011,
            (CHIP_AP, 0x00) => self.chip_ctrl1,
            (CHIP_AP, 0x04) => self.chip_ctrl2,
            (CHIP_AP, 0xFC) => self.chip_id,
            _ => 0,
        }
    }

    fn ap_write(&mut self, address: u8, data: u32) {
        match self.ap_register(address) {
            (MEM_AP, 0x00) => self.csw = data,
            (MEM_AP, 0x04) => self.tar = data,
            (MEM_AP, 0x0C) => {
                self.mem_write(self.tar, data);
                self.advance_tar();
            }
            (MEM_AP, reg @ 0x10..=0x1C) => {
                self.mem_write((self.tar & !0xF) | u32::from(reg & 0xC), data)
            }
            (CHIP_AP, 0x00) => self.chip_ctrl1_write(data),
            (CHIP_AP, 0x04) => self.chip_ctrl2 = data,
            _ => {}
        }
    }

    // Auto-increment wraps within a 1KB block
    fn advance_tar(&mut self) {
        if (self.csw >> 4) & 0b11 == 0b01 {
            self.tar = (self.tar & !0x3FF) | (self.tar.wrapping_add(4) & 0x3FF);
        }
    }

    fn chip_ctrl1_write(&mut self, data: u32) {
        let was_in_reset = self.core_in_reset;
        self.chip_ctrl1 = data;
        self.core_in_reset = data & CORE_RESET_AP != 0;

        if self.core_in_reset {
            self.halted = false;
        } else if was_in_reset {
            // Leaving reset, halting on the reset vector if caught
            self.halted = self.demcr & 1 != 0 && self.dhcsr_control & C_DEBUGEN != 0;
            if self.halted {
                self.dfsr |= DFSR_VCATCH;
            }
        }
    }

    fn mem_read(&mut self, addr: u32) -> u32 {
        match addr {
            DHCSR => {
                let mut value = self.dhcsr_control | S_REGRDY;
                if self.halted {
                    value |= S_HALT;
                }
                if self.core_in_reset {
                    value |= S_RESET_ST;
                }
                value
            }
            DCRDR => self.dcrdr,
            DEMCR => self.demcr,
            DFSR => self.dfsr,
            _ => self.memory(addr),
        }
    }

    fn mem_write(&mut self, addr: u32, data: u32) {
        self.mem_writes.push((addr, data));
        match addr {
            DHCSR => {
                if data >> 16 == 0xA05F {
                    self.dhcsr_control = data & 0xF;
                    self.halted = !self.core_in_reset
                        && self.dhcsr_control & (C_DEBUGEN | C_HALT) == (C_DEBUGEN | C_HALT);
                    if self.halted {
                        self.dfsr |= DFSR_HALTED;
                    }
                }
            }
            DCRSR => {
                let reg = (data & 0x1F) as usize;
                if data & (1 << 16) != 0 {
                    self.core_regs[reg] = self.dcrdr;
                } else {
                    self.dcrdr = self.core_regs[reg];
                }
            }
            DCRDR => self.dcrdr = data,
            DEMCR => self.demcr = data,
            // Write one to clear
            DFSR => self.dfsr &= !data,
            AIRCR => {
                // Only honoured with the architectural key
                if data >> 16 == 0x05FA && data & (1 << 2) != 0 {
                    self.halted = self.demcr & 1 != 0 && self.dhcsr_control & C_DEBUGEN != 0;
                    if self.halted {
                        self.dfsr |= DFSR_VCATCH;
                    }
                }
            }
            _ => {
                self.memory.insert(addr, data);
            }
        }
    }
}

impl SwdIo for SimTarget {
    fn set_swclk(&mut self, high: bool) {
        let rising = high && !self.swclk;
        self.swclk = high;
        if rising {
            self.rising_edge();
        }
    }

    fn set_swdio(&mut self, high: bool) {
        self.host_level = high;
    }

    fn swdio(&mut self) -> bool {
        match self.host_direction {
            Direction::Output => self.host_level,
            Direction::Input => self.target_drive.unwrap_or(true),
        }
    }

    fn set_swdio_direction(&mut self, direction: Direction) {
        self.host_direction = direction;
    }

    fn set_reset(&mut self, high: bool) {
        self.reset_line = high;
    }

    fn reset_level(&mut self) -> bool {
        self.reset_line
    }
}

/// Records the host's SWDIO level on each rising edge.  In loopback mode
/// those levels are read back, in order, while SWDIO is an input.
#[derive(Debug, Default)]
pub(crate) struct TraceIo {
    swclk: bool,
    level: bool,
    direction: Option<Direction>,
    loopback: bool,
    edges: Vec<bool>,
    pending: VecDeque<bool>,
}

impl TraceIo {
    pub(crate) fn loopback() -> Self {
        Self {
            loopback: true,
            ..Default::default()
        }
    }

    pub(crate) fn rising_edge_levels(&self) -> Vec<bool> {
        self.edges.clone()
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction.unwrap_or(Direction::Input)
    }
}

impl SwdIo for TraceIo {
    fn set_swclk(&mut self, high: bool) {
        if high && !self.swclk && self.direction() == Direction::Output {
            self.edges.push(self.level);
            if self.loopback {
                self.pending.push_back(self.level);
            }
        }
        self.swclk = high;
    }

    fn set_swdio(&mut self, high: bool) {
        self.level = high;
    }

    fn swdio(&mut self) -> bool {
        if self.direction() == Direction::Output {
            return self.level;
        }
        if self.loopback {
            self.pending.pop_front().unwrap_or(true)
        } else {
            true
        }
    }

    fn set_swdio_direction(&mut self, direction: Direction) {
        self.direction = Some(direction);
    }

    fn set_reset(&mut self, _high: bool) {}

    fn reset_level(&mut self) -> bool {
        true
    }
}
