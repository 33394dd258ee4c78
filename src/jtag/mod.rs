//! The JTAG TAP driver: state moves, path moves, runtest, stable clocks
//! and IR/DR scans, all expressed against a [`crate::pin::PinDriver`].

mod command;

pub use command::{BufferBuilder, BufferReader, Dispatcher, JtagCommand, ScanCommand};

use crate::error::{Error, Result};
use crate::pin::PinDriver;
use crate::tap::{tms_path, TapState};
use log::{debug, trace};

/// Which direction a scan moves data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanType {
    /// Only write `buffer` onto TDI; TDO is discarded.
    Out,
    /// Only capture TDO into `buffer`; TDI is driven with zeros.
    In,
    /// Write `buffer` onto TDI and overwrite it with the captured TDO.
    InOut,
}

/// Owns one physical (or mock) JTAG interface and the TAP's current and
/// desired-end state. Replaces the process-wide globals of the design
/// this crate is modeled on: callers construct one `JtagEngine` and
/// thread it through explicitly.
pub struct JtagEngine<P: PinDriver> {
    pin: P,
    state: TapState,
    end_state: TapState,
}

impl<P: PinDriver> JtagEngine<P> {
    pub fn new(pin: P) -> Self {
        JtagEngine {
            pin,
            state: TapState::Reset,
            end_state: TapState::Reset,
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn end_state(&self) -> TapState {
        self.end_state
    }

    /// Panics (an engine bug) if `end_state` is not one of the six
    /// stable states, mirroring the upstream driver's assertion.
    pub fn set_end_state(&mut self, end_state: TapState) {
        if !end_state.is_stable() {
            crate::error::bug(format!("{:?} is not a stable end state", end_state));
        }
        self.end_state = end_state;
    }

    fn pin_err(e: P::Error) -> Error<P::Error> {
        Error::Driver(e)
    }

    /// Walk from the current state to `end_state` along the precomputed
    /// TMS path, skipping the first `skip` bits (used by `scan`, which
    /// has already clocked the path's first transition via the shift's
    /// exit bit).
    pub fn state_move(&mut self, skip: u8) -> Result<(), P::Error> {
        let (len, bits) = tms_path(self.state, self.end_state);
        let mut tms = false;
        for i in skip..len {
            tms = (bits >> i) & 1 == 1;
            self.pin.write(false, tms, false).map_err(Self::pin_err)?;
            self.pin.write(true, tms, false).map_err(Self::pin_err)?;
        }
        self.pin.write(false, tms, false).map_err(Self::pin_err)?;
        self.state = self.end_state;
        trace!("state_move: now at {:?}", self.state);
        Ok(())
    }

    /// Walk an explicit sequence of states, one legal transition at a
    /// time. `path` must consist entirely of legal single-TMS successors
    /// of the preceding state; an illegal step is an engine bug, not a
    /// recoverable error.
    pub fn path_move(&mut self, path: &[TapState]) -> Result<(), P::Error> {
        let mut tms = false;
        for &next in path {
            tms = match self.state.tms_towards(next) {
                Some(tms) => tms,
                None => crate::error::bug(format!(
                    "{:?} -> {:?} isn't a valid TAP transition",
                    self.state, next
                )),
            };
            self.pin.write(false, tms, false).map_err(Self::pin_err)?;
            self.pin.write(true, tms, false).map_err(Self::pin_err)?;
            self.state = next;
        }
        self.pin.write(false, tms, false).map_err(Self::pin_err)?;
        self.end_state = self.state;
        debug!("path_move: now at {:?}", self.state);
        Ok(())
    }

    /// Clock `cycles` full TCK periods in IDLE, then move to `end_state`.
    pub fn runtest(&mut self, cycles: u32, end_state: TapState) -> Result<(), P::Error> {
        if self.state != TapState::Idle {
            self.set_end_state(TapState::Idle);
            self.state_move(0)?;
        }

        for _ in 0..cycles {
            self.pin.write(false, false, false).map_err(Self::pin_err)?;
            self.pin.write(true, false, false).map_err(Self::pin_err)?;
        }
        self.pin.write(false, false, false).map_err(Self::pin_err)?;

        self.set_end_state(end_state);
        if self.state != self.end_state {
            self.state_move(0)?;
        }
        Ok(())
    }

    /// Clock `cycles` periods while holding TMS at the current stable
    /// state's hold value. Requires the current state be stable.
    pub fn stableclocks(&mut self, cycles: u32) -> Result<(), P::Error> {
        if !self.state.is_stable() {
            crate::error::bug(format!("stableclocks requires a stable state, at {:?}", self.state));
        }
        let tms = self.state.hold_tms();
        for _ in 0..cycles {
            self.pin.write(true, tms, false).map_err(Self::pin_err)?;
            self.pin.write(false, tms, false).map_err(Self::pin_err)?;
        }
        Ok(())
    }

    /// Shift `bits` bits of `buffer` through the currently selected
    /// shift register (IR if `ir_scan`, else DR), then move to
    /// `end_state`. Captured bits are written back into `buffer`
    /// LSB-first, overwriting the corresponding input bits.
    pub fn scan(
        &mut self,
        ir_scan: bool,
        ty: ScanType,
        buffer: &mut [u8],
        bits: u32,
        end_state: TapState,
    ) -> Result<(), P::Error> {
        let shift_state = if ir_scan {
            TapState::IrShift
        } else {
            TapState::DrShift
        };

        if self.state != shift_state {
            self.set_end_state(shift_state);
            self.state_move(0)?;
        }
        self.set_end_state(end_state);

        let buffered = self.pin.buf_size();
        let mut pending: u32 = 0;

        for i in 0..bits {
            let tms = i == bits - 1;
            let tdi = if ty != ScanType::In {
                (buffer[(i / 8) as usize] >> (i % 8)) & 1 == 1
            } else {
                false
            };

            self.pin.write(false, tms, tdi).map_err(Self::pin_err)?;

            if ty != ScanType::Out {
                if buffered > 0 {
                    self.pin.sample().map_err(Self::pin_err)?;
                    pending += 1;
                } else {
                    let bit = self.pin.read().map_err(Self::pin_err)?;
                    crate::bits::set_bit(buffer, i, bit);
                }
            }

            self.pin.write(true, tms, tdi).map_err(Self::pin_err)?;

            if buffered > 0 && ty != ScanType::Out && (pending as usize == buffered || i == bits - 1) {
                let first = i + 1 - pending;
                for j in first..=i {
                    let bit = self.pin.read_sample().map_err(Self::pin_err)?;
                    crate::bits::set_bit(buffer, j, bit);
                }
                pending = 0;
            }
        }

        // The final scan bit already clocked TMS=1, exiting the shift
        // state. That is the first bit of the shift_state->end_state
        // path, so recompute the path as if still at shift_state and
        // skip that already-clocked bit.
        self.state = shift_state;
        self.state_move(1)?;
        debug!("scan: {} bits, ir={}, now at {:?}", bits, ir_scan, self.state);
        Ok(())
    }

    pub fn into_inner(self) -> P {
        self.pin
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}
