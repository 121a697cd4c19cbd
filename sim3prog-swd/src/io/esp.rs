// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ESP32-C3 GPIO implementation of the SWD pin capabilities

use esp_hal::gpio::{
    DriveMode, DriveStrength, Flex, InputConfig, InputPin, Level, Output, OutputConfig, OutputPin,
    Pull,
};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::io::{Delay, Direction, SwdIo};

/// SWD lines on ESP32-C3 GPIOs
///
/// ```rust,ignore
/// use sim3prog_swd::io::esp::{EspSwdIo, RiscvDelay};
/// use sim3prog_swd::SwdProtocol;
///
/// let peripherals = esp_hal::init(config);
/// let io = EspSwdIo::new(peripherals.GPIO0, peripherals.GPIO1, peripherals.GPIO2);
/// let swd = SwdProtocol::new(io, RiscvDelay);
/// ```
#[derive(Debug)]
pub struct EspSwdIo<'a> {
    swclk: Output<'a>,
    swdio: Flex<'a>,
    nsrst: Flex<'a>,
}

impl<'a> EspSwdIo<'a> {
    /// Configures the pins for SWD.
    ///
    /// Arguments:
    /// - `swdio_pin`: The pin to use for SWDIO, which must implement both
    ///   `InputPin` and `OutputPin` traits.
    /// - `swclk_pin`: The pin to use for SWCLK, which must implement the
    ///   `OutputPin` trait.
    /// - `nsrst_pin`: The pin connected to the target's reset line.  It is
    ///   driven open drain, so the target or a reset button can still pull
    ///   it low.
    pub fn new(
        swdio_pin: impl InputPin + OutputPin + 'a,
        swclk_pin: impl OutputPin + 'a,
        nsrst_pin: impl InputPin + OutputPin + 'a,
    ) -> Self {
        // SWDIO starts as an input without a pull.  The target pulls it
        // high.
        let mut swdio = Flex::new(swdio_pin);
        let input_config = InputConfig::default().with_pull(Pull::None);
        swdio.apply_input_config(&input_config);
        swdio.set_input_enable(true);

        let output_config = OutputConfig::default()
            .with_drive_strength(DriveStrength::_20mA)
            .with_drive_mode(DriveMode::PushPull);
        let swclk = Output::new(swclk_pin, Level::High, output_config);

        let mut nsrst = Flex::new(nsrst_pin);
        let reset_config = OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up);
        nsrst.apply_output_config(&reset_config);
        nsrst.set_high();
        nsrst.set_input_enable(true);
        nsrst.set_output_enable(true);

        debug!("SWD pins created, SWDIO input without pull, SWCLK output high");

        Self {
            swclk,
            swdio,
            nsrst,
        }
    }
}

impl SwdIo for EspSwdIo<'_> {
    #[inline]
    fn set_swclk(&mut self, high: bool) {
        if high {
            self.swclk.set_high();
        } else {
            self.swclk.set_low();
        }
    }

    #[inline]
    fn set_swdio(&mut self, high: bool) {
        if high {
            self.swdio.set_high();
        } else {
            self.swdio.set_low();
        }
    }

    #[inline]
    fn swdio(&mut self) -> bool {
        self.swdio.is_high()
    }

    #[inline]
    fn set_swdio_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Output => {
                self.swdio.set_input_enable(false);
                self.swdio.set_output_enable(true);
            }
            Direction::Input => {
                self.swdio.set_output_enable(false);
                self.swdio.set_input_enable(true);
            }
        }
    }

    fn set_reset(&mut self, high: bool) {
        if high {
            self.nsrst.set_high();
        } else {
            self.nsrst.set_low();
        }
    }

    fn reset_level(&mut self) -> bool {
        self.nsrst.is_high()
    }
}

/// Cycle-counting delay using the RISC-V core
#[derive(Debug, Clone, Copy, Default)]
pub struct RiscvDelay;

impl Delay for RiscvDelay {
    #[inline]
    fn delay_cycles(&mut self, cycles: u32) {
        riscv::asm::delay(cycles);
    }
}
