//! The SWD transaction engine: register reads/writes with WAIT retry,
//! special-sequence switching, and queue flushing.

mod sequences;

pub use sequences::SpecialSequence;

use crate::bits::{get_bit, get_u32, set_bit, set_u32};
use crate::error::Error;
use crate::pin::PinDriver;
use log::{debug, error, trace, warn};
use std::time::{Duration, Instant};

pub const ACK_OK: u8 = 0b001;
pub const ACK_WAIT: u8 = 0b010;
pub const ACK_FAULT: u8 = 0b100;

const WAIT_TIMEOUT: Duration = Duration::from_millis(500);
const WAIT_BACKOFF_RETRY_THRESHOLD: u32 = 20;
const WAIT_BACKOFF_SLEEP_US: u32 = 1000;

/// DP ABORT register address and the bits that clear every sticky
/// target-side error flag in one write.
const DP_ABORT_ADDR: u8 = 0x0;
const ABORT_CLEAR_STICKY: u32 = 0b1_1110;

/// A sticky, copyable summary of what went wrong on the wire, kept
/// separate from [`Error`] (which additionally carries a generic
/// driver-error variant) so it can be latched into `SwdEngine` without
/// needing `P::Error: Clone`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StickyError {
    Wait,
    Fault,
    Protocol,
    Unknown(u8),
    BadParity,
    Timeout,
}

impl<D: std::fmt::Debug + std::fmt::Display> From<StickyError> for Error<D> {
    fn from(e: StickyError) -> Self {
        match e {
            StickyError::Wait => Error::AckWait,
            StickyError::Fault => Error::AckFault,
            StickyError::Protocol => Error::AckProtocol,
            StickyError::Unknown(ack) => Error::AckUnknown(ack),
            StickyError::BadParity => Error::BadParity,
            StickyError::Timeout => Error::WaitTimeout(WAIT_TIMEOUT.as_millis() as u64),
        }
    }
}

fn ack_to_sticky(ack: u8) -> Option<StickyError> {
    match ack {
        ACK_OK => None,
        ACK_WAIT => Some(StickyError::Wait),
        ACK_FAULT => Some(StickyError::Fault),
        0b111 => Some(StickyError::Protocol),
        other => Some(StickyError::Unknown(other)),
    }
}

/// Clocks `bits` bits of SWD traffic starting at bit `offset` of `buf`,
/// LSB-first. `rnw` selects direction: `false` drives `buf` onto SWDIO,
/// `true` samples SWDIO back into `buf`. `buf` may be omitted entirely
/// for idle-clock runs that neither drive nor capture anything useful.
pub fn exchange<P: PinDriver>(
    pin: &mut P,
    rnw: bool,
    mut buf: Option<&mut [u8]>,
    offset: u32,
    bits: u32,
) -> Result<(), Error<P::Error>> {
    pin.blink(true).map_err(Error::Driver)?;
    for i in offset..offset + bits {
        let out_bit = if !rnw {
            buf.as_deref().map(|b| get_bit(b, i)).unwrap_or(false)
        } else {
            false
        };
        pin.swd_write(false, out_bit).map_err(Error::Driver)?;
        if rnw {
            let sampled = pin.swdio_read().map_err(Error::Driver)?;
            if let Some(b) = buf.as_deref_mut() {
                set_bit(b, i, sampled);
            }
        }
        pin.swd_write(true, out_bit).map_err(Error::Driver)?;
    }
    pin.blink(false).map_err(Error::Driver)?;
    Ok(())
}

fn make_request(apndp: bool, rnw: bool, a: u8) -> u8 {
    let apndp = apndp as u8;
    let rnw = rnw as u8;
    let a = a & 0b11;
    let parity = apndp ^ rnw ^ (a & 1) ^ ((a >> 1) & 1);
    let mut req = 1u8; // start
    req |= apndp << 1;
    req |= rnw << 2;
    req |= a << 3;
    req |= (parity & 1) << 5;
    req |= 1 << 7; // park
    req
}

/// A request's `returns_ack` flag is false only for a DP TARGETSEL
/// write, the sole SWD write the target never acknowledges.
fn returns_ack(apndp: bool, a: u8) -> bool {
    !(!apndp && a == 0b11)
}

/// Owns one physical (or mock) SWD interface plus the sticky queued
/// error. Replaces the single process-wide `queued_retval` of the
/// design this crate is modeled on.
pub struct SwdEngine<P: PinDriver> {
    pin: P,
    sticky_error: Option<StickyError>,
}

impl<P: PinDriver> SwdEngine<P> {
    pub fn new(pin: P) -> Self {
        SwdEngine {
            pin,
            sticky_error: None,
        }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    /// Transmit one of the canonical out-of-band bit patterns.
    pub fn switch_seq(&mut self, seq: SpecialSequence) -> Result<(), Error<P::Error>> {
        let (bytes, len) = seq.bits();
        let mut buf = bytes.to_vec();
        debug!("swd switch_seq {:?} ({} bits)", seq, len);
        exchange(&mut self.pin, false, Some(&mut buf), 0, len)
    }

    fn clear_sticky_target_errors(&mut self) -> Result<(), Error<P::Error>> {
        let cmd = make_request(false, false, DP_ABORT_ADDR);
        let mut frame = [0u8; 5];
        set_u32(&mut frame, 5, ABORT_CLEAR_STICKY);
        set_bit(&mut frame, 37, ABORT_CLEAR_STICKY.count_ones() % 2 == 1);

        exchange(&mut self.pin, false, Some(&mut [cmd]), 0, 8)?;
        self.pin.swdio_drive(false);
        let mut ack_buf = [0u8; 1];
        exchange(&mut self.pin, true, Some(&mut ack_buf), 0, 4)?;

        exchange(&mut self.pin, false, Some(&mut frame), 5, 1)?;
        self.pin.swdio_drive(true);
        exchange(&mut self.pin, false, Some(&mut frame), 5, 33)?;
        Ok(())
    }

    /// Read a DP or AP register, retrying on WAIT until `WAIT_TIMEOUT`
    /// elapses. `a` is the 2-bit word-aligned register address (A[2:3]).
    pub fn read_reg(&mut self, apndp: bool, a: u8, ap_delay: u32) -> Result<u32, Error<P::Error>> {
        if let Some(sticky) = self.sticky_error {
            return Err(sticky.into());
        }

        let cmd = make_request(apndp, true, a);
        let deadline = Instant::now() + WAIT_TIMEOUT;
        let mut retries: u32 = 0;

        loop {
            exchange(&mut self.pin, false, Some(&mut [cmd]), 0, 8)?;
            self.pin.swdio_drive(false);

            let mut scratch = [0u8; 5];
            exchange(&mut self.pin, true, Some(&mut scratch), 0, 1 + 3 + 32 + 1 + 1)?;
            self.pin.swdio_drive(true);

            let ack = (get_bit(&scratch, 1) as u8)
                | ((get_bit(&scratch, 2) as u8) << 1)
                | ((get_bit(&scratch, 3) as u8) << 2);
            let data = get_u32(&scratch, 4);
            let parity = get_bit(&scratch, 36);

            if ack == ACK_WAIT {
                if Instant::now() >= deadline {
                    warn!("swd read_reg: WAIT deadline exceeded after {} retries", retries);
                    self.sticky_error = Some(StickyError::Timeout);
                    return Err(StickyError::Timeout.into());
                }
                self.clear_sticky_target_errors()?;
                if retries > WAIT_BACKOFF_RETRY_THRESHOLD {
                    self.pin.sleep(WAIT_BACKOFF_SLEEP_US);
                }
                retries += 1;
                trace!("swd read_reg: WAIT, retry {}", retries);
                continue;
            }

            if ack != ACK_OK {
                error!("swd read_reg: ack {:#05b}", ack);
                let sticky = ack_to_sticky(ack).expect("non-OK ack maps to a sticky error");
                self.sticky_error = Some(sticky);
                return Err(sticky.into());
            }

            if data.count_ones() % 2 != parity as u32 {
                error!("swd read_reg: parity mismatch");
                self.sticky_error = Some(StickyError::BadParity);
                return Err(StickyError::BadParity.into());
            }

            if apndp {
                exchange(&mut self.pin, true, None, 0, ap_delay)?;
            }

            return Ok(data);
        }
    }

    /// Write a DP or AP register, retrying on WAIT as [`Self::read_reg`]
    /// does. Uses the glitch-avoidance sub-protocol described in the
    /// engine's design notes when flipping SWDIO back to output.
    pub fn write_reg(
        &mut self,
        apndp: bool,
        a: u8,
        value: u32,
        ap_delay: u32,
    ) -> Result<(), Error<P::Error>> {
        if let Some(sticky) = self.sticky_error {
            return Err(sticky.into());
        }

        let cmd = make_request(apndp, false, a);
        let check_ack = returns_ack(apndp, a);
        let deadline = Instant::now() + WAIT_TIMEOUT;
        let mut retries: u32 = 0;

        let mut frame = [0u8; 5];
        set_u32(&mut frame, 5, value);
        set_bit(&mut frame, 37, value.count_ones() % 2 == 1);

        loop {
            exchange(&mut self.pin, false, Some(&mut [cmd]), 0, 8)?;
            self.pin.swdio_drive(false);

            let mut ack_buf = [0u8; 1];
            exchange(&mut self.pin, true, Some(&mut ack_buf), 0, 1 + 3)?;
            let ack = (get_bit(&ack_buf, 1) as u8)
                | ((get_bit(&ack_buf, 2) as u8) << 1)
                | ((get_bit(&ack_buf, 3) as u8) << 2);

            // Avoid a glitch on SWDIO when flipping direction: clock the
            // first data bit once while still driven as an input (so it
            // only pre-loads the GPIO output register, with no effect on
            // the wire), then flip, then clock the full data+parity
            // field starting at that same bit again.
            exchange(&mut self.pin, false, Some(&mut frame), 5, 1)?;
            self.pin.swdio_drive(true);
            exchange(&mut self.pin, false, Some(&mut frame), 5, 33)?;

            if !check_ack {
                return Ok(());
            }

            if ack == ACK_WAIT {
                if Instant::now() >= deadline {
                    warn!("swd write_reg: WAIT deadline exceeded after {} retries", retries);
                    self.sticky_error = Some(StickyError::Timeout);
                    return Err(StickyError::Timeout.into());
                }
                self.clear_sticky_target_errors()?;
                if retries > WAIT_BACKOFF_RETRY_THRESHOLD {
                    self.pin.sleep(WAIT_BACKOFF_SLEEP_US);
                }
                retries += 1;
                trace!("swd write_reg: WAIT, retry {}", retries);
                continue;
            }

            if ack != ACK_OK {
                error!("swd write_reg: ack {:#05b}", ack);
                let sticky = ack_to_sticky(ack).expect("non-OK ack maps to a sticky error");
                self.sticky_error = Some(sticky);
                return Err(sticky.into());
            }

            if apndp {
                exchange(&mut self.pin, true, None, 0, ap_delay)?;
            }

            return Ok(());
        }
    }

    /// Flush the final AP transaction through the DAP and clear the
    /// sticky queued error, returning whatever it was.
    pub fn run_queue(&mut self) -> Result<(), Error<P::Error>> {
        exchange(&mut self.pin, true, None, 0, 8)?;
        let sticky = self.sticky_error.take();
        match sticky {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPin;

    /// Queue one read-transaction response: 1 turnaround + 3 ACK bits +
    /// 32 data bits + 1 parity bit + 1 trailing turnaround.
    fn push_response(pin: &mut MockPin, ack: u8, data: u32) {
        pin.queue_swdio([false]);
        for i in 0..3 {
            pin.queue_swdio([(ack >> i) & 1 == 1]);
        }
        for i in 0..32 {
            pin.queue_swdio([(data >> i) & 1 == 1]);
        }
        let parity = data.count_ones() % 2 == 1;
        pin.queue_swdio([parity]);
        pin.queue_swdio([false]);
    }

    /// Queue a WAIT response followed by the turnaround+ACK bits the
    /// engine's internal ABORT-register clear consumes before retrying.
    fn push_wait(pin: &mut MockPin) {
        push_response(pin, ACK_WAIT, 0);
        pin.queue_swdio([false, false, false, false]);
    }

    #[test]
    fn read_reg_ack_ok_s2() {
        let mut pin = MockPin::new();
        push_response(&mut pin, ACK_OK, 0xDEADBEEF);
        let mut swd = SwdEngine::new(pin);

        let data = swd.read_reg(false, 0b01, 0).unwrap();
        assert_eq!(data, 0xDEADBEEF);
    }

    #[test]
    fn read_reg_wait_then_ok_s3() {
        let mut pin = MockPin::new();
        push_wait(&mut pin);
        push_wait(&mut pin);
        push_response(&mut pin, ACK_OK, 0x1234);
        let mut swd = SwdEngine::new(pin);

        let data = swd.read_reg(false, 0b01, 0).unwrap();
        assert_eq!(data, 0x1234);
    }

    /// Queue just the turnaround+ACK bits a write transaction reads back.
    fn push_write_ack(pin: &mut MockPin, ack: u8) {
        pin.queue_swdio([false]);
        for i in 0..3 {
            pin.queue_swdio([(ack >> i) & 1 == 1]);
        }
    }

    #[test]
    fn write_reg_ap_ack_ok_s5() {
        let mut pin = MockPin::new();
        push_write_ack(&mut pin, ACK_OK);
        let mut swd = SwdEngine::new(pin);

        swd.write_reg(true, 0b00, 0x1234_5678, 8).unwrap();

        // 8 cmd bits + 4 turnaround/ack bits + 1 glitch-avoidance
        // pre-clock bit + 33 data/parity bits + 8 AP-delay idle bits,
        // each bit clocking two edges: (8+4+1+33+8)*2 = 108.
        assert_eq!(swd.pin_mut().swd_writes().len(), 108);
    }

    #[test]
    fn switch_seq_jtag_to_swd_emits_136_bits() {
        let mut swd = SwdEngine::new(MockPin::new());
        swd.switch_seq(SpecialSequence::JtagToSwd).unwrap();
        // Each bit clocks two edges (low then high).
        assert_eq!(swd.pin_mut().swd_writes().len(), 136 * 2);
    }

    #[test]
    fn sticky_error_suppresses_further_transactions() {
        let mut pin = MockPin::new();
        push_response(&mut pin, ACK_FAULT, 0);
        let mut swd = SwdEngine::new(pin);

        assert!(swd.read_reg(false, 0b01, 0).is_err());
        let before = swd.pin_mut().swd_writes().len();
        let result = swd.read_reg(false, 0b01, 0);
        assert!(result.is_err());
        assert_eq!(
            swd.pin_mut().swd_writes().len(),
            before,
            "no SWD bits should be emitted while a sticky error is latched"
        );
    }

    #[test]
    fn run_queue_clears_sticky_error() {
        let mut pin = MockPin::new();
        push_response(&mut pin, ACK_FAULT, 0);
        let mut swd = SwdEngine::new(pin);

        assert!(swd.read_reg(false, 0b01, 0).is_err());
        assert!(swd.run_queue().is_err());
        push_response(swd.pin_mut(), ACK_OK, 0x42);
        assert!(swd.read_reg(false, 0b01, 0).is_ok());
    }
}
