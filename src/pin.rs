//! The pin-driver contract: the only boundary between this crate and
//! physical (or simulated) wires.
//!
//! A driver only has to implement [`PinDriver`]. The engines additionally
//! look for the optional capabilities below (buffered TDO sampling, an
//! activity LED, a sleep primitive, an explicit flush) through the
//! `Option`-returning accessor methods on [`PinDriver`] itself, rather
//! than through separate trait objects, so a minimal driver's vtable
//! stays empty of anything it doesn't support.

/// Low level JTAG/SWD pin access. Implemented once per physical (or
/// mock) interface; engines are generic over it so the per-bit loops in
/// [`crate::jtag`] and [`crate::swd`] monomorphize and inline.
pub trait PinDriver {
    type Error: std::fmt::Debug + std::fmt::Display;

    /// Emit one TCK half-edge while driving TMS and TDI.
    fn write(&mut self, tck: bool, tms: bool, tdi: bool) -> Result<(), Self::Error>;

    /// Sample TDO synchronously.
    fn read(&mut self) -> Result<bool, Self::Error>;

    /// Emit one SWCLK half-edge while driving SWDIO (only meaningful
    /// while [`Self::swdio_drive`] has most recently been set to output).
    fn swd_write(&mut self, swclk: bool, swdio: bool) -> Result<(), Self::Error>;

    /// Sample SWDIO.
    fn swdio_read(&mut self) -> Result<bool, Self::Error>;

    /// Set SWDIO direction: `true` drives the line, `false` releases it
    /// to high-impedance so the target can drive it.
    fn swdio_drive(&mut self, output: bool);

    /// Depth of the buffered-sample queue, if this driver supports
    /// deferred TDO capture. `0` means unsupported.
    fn buf_size(&self) -> usize {
        0
    }

    /// Enqueue a deferred TDO sample. Only called when `buf_size() > 0`.
    fn sample(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Dequeue the oldest deferred sample. Only called when `buf_size() > 0`.
    fn read_sample(&mut self) -> Result<bool, Self::Error> {
        self.read()
    }

    /// Activity indicator. No-op if the driver has none.
    fn blink(&mut self, _on: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Push out any buffered writes before a timed delay. No-op if the
    /// driver has nothing to flush.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Suspend for approximately `us` microseconds.
    fn sleep(&mut self, us: u32);
}
