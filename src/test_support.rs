//! In-memory pin driver doubles used by the engine's own test suite.
//!
//! `MockPin` records every edge it is asked to emit (so tests can assert
//! on exact TMS/TCK/SWCLK sequences) and can be scripted with queued
//! SWDIO reads the way a target would respond to a transaction.

use crate::pin::PinDriver;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl std::fmt::Display for MockPinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mock pin driver error")
    }
}

#[derive(Default)]
pub struct MockPin {
    echo: bool,
    last_level: bool,
    tms_trace: Vec<bool>,
    writes: Vec<(bool, bool, bool)>,
    swd_writes: Vec<(bool, bool)>,
    queued_swdio: VecDeque<bool>,
    fail_after: Option<usize>,
    blink_trace: Vec<bool>,
    sleeps: Vec<u32>,
    swdio_direction: bool,
}

impl MockPin {
    pub fn new() -> Self {
        MockPin {
            swdio_direction: true,
            ..Default::default()
        }
    }

    /// A driver whose `read()` returns whatever TDI was most recently
    /// driven, useful for round-trip style scan tests.
    pub fn echo() -> Self {
        MockPin {
            echo: true,
            ..Self::new()
        }
    }

    pub fn tms_trace(&self) -> Vec<bool> {
        self.tms_trace.clone()
    }

    pub fn clear_trace(&mut self) {
        self.tms_trace.clear();
        self.writes.clear();
        self.swd_writes.clear();
    }

    pub fn last_write(&self) -> Option<(bool, bool, bool)> {
        self.writes.last().copied()
    }

    pub fn swd_writes(&self) -> &[(bool, bool)] {
        &self.swd_writes
    }

    /// Queue a sequence of bits `swdio_read` will return, oldest first.
    pub fn queue_swdio(&mut self, bits: impl IntoIterator<Item = bool>) {
        self.queued_swdio.extend(bits);
    }

    /// Make the `n`th call to `write` fail.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    pub fn blink_trace(&self) -> &[bool] {
        &self.blink_trace
    }

    pub fn sleeps(&self) -> &[u32] {
        &self.sleeps
    }
}

impl PinDriver for MockPin {
    type Error = MockPinError;

    fn write(&mut self, tck: bool, tms: bool, tdi: bool) -> Result<(), Self::Error> {
        if let Some(n) = self.fail_after {
            if self.writes.len() + self.swd_writes.len() == n {
                return Err(MockPinError);
            }
        }
        if !tck {
            self.tms_trace.push(tms);
        }
        self.writes.push((tck, tms, tdi));
        if self.echo {
            self.last_level = tdi;
        }
        Ok(())
    }

    fn read(&mut self) -> Result<bool, Self::Error> {
        if self.echo {
            return Ok(self.last_level);
        }
        Ok(self.queued_swdio.pop_front().unwrap_or(false))
    }

    fn swd_write(&mut self, swclk: bool, swdio: bool) -> Result<(), Self::Error> {
        if let Some(n) = self.fail_after {
            if self.writes.len() + self.swd_writes.len() == n {
                return Err(MockPinError);
            }
        }
        self.swd_writes.push((swclk, swdio));
        Ok(())
    }

    fn swdio_read(&mut self) -> Result<bool, Self::Error> {
        Ok(self.queued_swdio.pop_front().unwrap_or(false))
    }

    fn swdio_drive(&mut self, output: bool) {
        self.swdio_direction = output;
    }

    fn blink(&mut self, on: bool) -> Result<(), Self::Error> {
        self.blink_trace.push(on);
        Ok(())
    }

    fn sleep(&mut self, us: u32) {
        self.sleeps.push(us);
    }
}
