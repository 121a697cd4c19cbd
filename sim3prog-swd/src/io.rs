// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Pin and delay capabilities used by [`crate::SwdProtocol`].
//!
//! Implement [`SwdIo`] and [`Delay`] for your hardware to bit-bang SWD from
//! it.  Implementations for ESP32-C3 GPIOs are available in `io::esp` with
//! the `esp32c3` feature.

#[cfg(feature = "esp32c3")]
pub mod esp;

/// SWDIO direction, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host drives SWDIO
    Output,
    /// Target drives SWDIO (or nobody does, and the pull-up wins)
    Input,
}

/// Access to the debug connector lines.
///
/// Level arguments and return values are `true` for high.  Implementations
/// should not add delays; [`crate::SwdProtocol`] times the clock using a
/// [`Delay`].
pub trait SwdIo {
    /// Drive SWCLK
    fn set_swclk(&mut self, high: bool);

    /// Set the level driven on SWDIO when it is an output.  May be called
    /// while SWDIO is an input, in which case the level takes effect when
    /// the direction is next changed to output.
    fn set_swdio(&mut self, high: bool);

    /// Sample SWDIO
    fn swdio(&mut self) -> bool;

    /// Change the SWDIO direction
    fn set_swdio_direction(&mut self, direction: Direction);

    /// Drive the target reset line (nSRST, active low)
    fn set_reset(&mut self, high: bool);

    /// Sense the target reset line
    fn reset_level(&mut self) -> bool;

    /// Puts the SWD lines into their idle state before a connect: SWCLK
    /// driven high, SWDIO released high.
    fn idle(&mut self) {
        self.set_swclk(true);
        self.set_swdio(true);
        self.set_swdio_direction(Direction::Input);
    }

    /// Releases SWDIO and parks SWCLK high on disconnect.  nSRST is left
    /// as it is, so a target held in reset stays there.
    fn release(&mut self) {
        self.set_swdio(true);
        self.set_swdio_direction(Direction::Input);
        self.set_swclk(true);
    }
}

/// Busy-wait capability, used for clock half periods and WAIT back-off.
pub trait Delay {
    fn delay_cycles(&mut self, cycles: u32);
}

/// A [`Delay`] that returns immediately.  The SWD clock then runs as fast as
/// the pin implementation allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    #[inline]
    fn delay_cycles(&mut self, _cycles: u32) {}
}
