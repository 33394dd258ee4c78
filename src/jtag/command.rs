//! The command dispatcher: drains an ordered sequence of JTAG commands
//! against a [`super::JtagEngine`].

use super::{JtagEngine, ScanType};
use crate::error::Result;
use crate::pin::PinDriver;
use crate::tap::TapState;
use log::trace;

/// A single queued scan operation. The dispatcher does not build or
/// interpret the scan buffer itself; a `BufferBuilder`/`BufferReader`
/// pair supplied by the caller does that, keeping this crate ignorant
/// of the upper layer's own command representation.
pub struct ScanCommand {
    pub ir_scan: bool,
    pub ty: ScanType,
    pub bits: u32,
    pub end_state: TapState,
}

pub trait BufferBuilder {
    fn build(&mut self, cmd: &ScanCommand) -> Vec<u8>;
}

pub trait BufferReader {
    fn check(&mut self, buffer: &[u8], cmd: &ScanCommand) -> bool;
}

impl<F: FnMut(&ScanCommand) -> Vec<u8>> BufferBuilder for F {
    fn build(&mut self, cmd: &ScanCommand) -> Vec<u8> {
        self(cmd)
    }
}

impl<F: FnMut(&[u8], &ScanCommand) -> bool> BufferReader for F {
    fn check(&mut self, buffer: &[u8], cmd: &ScanCommand) -> bool {
        self(buffer, cmd)
    }
}

pub enum JtagCommand {
    Runtest { cycles: u32, end_state: TapState },
    StableClocks { cycles: u32 },
    TlrReset { end_state: TapState },
    PathMove { path: Vec<TapState> },
    Scan(ScanCommand),
    Sleep { microseconds: u32 },
    Tms { bits: Vec<u8>, count: u32 },
}

/// Drains a sequence of [`JtagCommand`]s, wrapping the whole run in a
/// `blink(true)`/`blink(false)` envelope the way the upstream driver
/// lights an activity LED for the duration of a queue flush.
pub struct Dispatcher<'a, B: BufferBuilder, R: BufferReader> {
    builder: &'a mut B,
    reader: &'a mut R,
    queue_check_failed: bool,
}

impl<'a, B: BufferBuilder, R: BufferReader> Dispatcher<'a, B, R> {
    pub fn new(builder: &'a mut B, reader: &'a mut R) -> Self {
        Dispatcher {
            builder,
            reader,
            queue_check_failed: false,
        }
    }

    /// Returns `Ok(true)` if every scan's buffer check passed, `Ok(false)`
    /// if at least one failed (a `QueueCheckFailed`-kind outcome that
    /// does not stop execution of later commands).
    pub fn dispatch<P: PinDriver>(
        &mut self,
        engine: &mut JtagEngine<P>,
        commands: &[JtagCommand],
    ) -> Result<bool, P::Error> {
        engine.pin_mut().blink(true).map_err(crate::error::Error::Driver)?;
        let result = self.drain(engine, commands);
        engine.pin_mut().blink(false).map_err(crate::error::Error::Driver)?;
        result?;
        Ok(!self.queue_check_failed)
    }

    fn drain<P: PinDriver>(
        &mut self,
        engine: &mut JtagEngine<P>,
        commands: &[JtagCommand],
    ) -> Result<(), P::Error> {
        for command in commands {
            match command {
                JtagCommand::Runtest { cycles, end_state } => {
                    engine.runtest(*cycles, *end_state)?;
                }
                JtagCommand::StableClocks { cycles } => {
                    engine.stableclocks(*cycles)?;
                }
                JtagCommand::TlrReset { end_state } => {
                    engine.set_end_state(*end_state);
                    engine.state_move(0)?;
                }
                JtagCommand::PathMove { path } => {
                    engine.path_move(path)?;
                }
                JtagCommand::Scan(scan) => {
                    let mut buffer = self.builder.build(scan);
                    engine.scan(scan.ir_scan, scan.ty, &mut buffer, scan.bits, scan.end_state)?;
                    if !self.reader.check(&buffer, scan) {
                        self.queue_check_failed = true;
                    }
                }
                JtagCommand::Sleep { microseconds } => {
                    engine.pin_mut().flush().map_err(crate::error::Error::Driver)?;
                    engine.pin_mut().sleep(*microseconds);
                }
                JtagCommand::Tms { bits, count } => {
                    trace!("tms burst: {} bits", count);
                    let mut tms = false;
                    for i in 0..*count {
                        tms = crate::bits::get_bit(bits, i);
                        engine
                            .pin_mut()
                            .write(false, tms, false)
                            .map_err(crate::error::Error::Driver)?;
                        engine
                            .pin_mut()
                            .write(true, tms, false)
                            .map_err(crate::error::Error::Driver)?;
                    }
                    engine
                        .pin_mut()
                        .write(false, tms, false)
                        .map_err(crate::error::Error::Driver)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPin;

    #[test]
    fn envelope_blinks_even_when_a_command_fails() {
        let mut engine = JtagEngine::new(MockPin::new());
        engine.pin_mut().fail_after(2);

        let mut builder = |_: &ScanCommand| vec![0u8];
        let mut reader = |_: &[u8], _: &ScanCommand| true;
        let mut dispatcher = Dispatcher::new(&mut builder, &mut reader);

        let commands = vec![JtagCommand::Runtest {
            cycles: 10,
            end_state: TapState::Idle,
        }];
        let _ = dispatcher.dispatch(&mut engine, &commands);

        assert_eq!(engine.pin_mut().blink_trace(), &[true, false]);
    }

    #[test]
    fn scan_command_latches_queue_check_failure_without_aborting() {
        let mut engine = JtagEngine::new(MockPin::new());
        let mut builder = |cmd: &ScanCommand| vec![0u8; ((cmd.bits + 7) / 8) as usize];
        let mut reader = |_: &[u8], _: &ScanCommand| false;
        let mut dispatcher = Dispatcher::new(&mut builder, &mut reader);

        let commands = vec![
            JtagCommand::Scan(ScanCommand {
                ir_scan: true,
                ty: ScanType::InOut,
                bits: 4,
                end_state: TapState::Idle,
            }),
            JtagCommand::Runtest {
                cycles: 1,
                end_state: TapState::Idle,
            },
        ];

        let ok = dispatcher.dispatch(&mut engine, &commands).unwrap();
        assert!(!ok);
        assert_eq!(engine.state(), TapState::Idle);
    }
}
