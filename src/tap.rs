//! The 16-state JTAG TAP finite state machine.
//!
//! This module is a pure table: given a state and a TMS level it knows
//! the next state, and given two *stable* states it knows the shortest
//! TMS bit sequence that walks between them. No I/O happens here.

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TapState {
    Reset = 0,
    Idle,
    DrSelect,
    DrCapture,
    DrShift,
    DrExit1,
    DrPause,
    DrExit2,
    DrUpdate,
    IrSelect,
    IrCapture,
    IrShift,
    IrExit1,
    IrPause,
    IrExit2,
    IrUpdate,
}

impl TapState {
    /// Whether a clock held at the TMS level returned by [`Self::hold_tms`]
    /// leaves this state unchanged.
    pub fn is_stable(self) -> bool {
        matches!(
            self,
            TapState::Reset
                | TapState::Idle
                | TapState::DrShift
                | TapState::DrPause
                | TapState::IrShift
                | TapState::IrPause
        )
    }

    /// TMS value that holds a stable state in place across a clock.
    pub fn hold_tms(self) -> bool {
        matches!(self, TapState::Reset)
    }

    /// Next state after clocking with the given TMS level.
    pub fn next(self, tms: bool) -> TapState {
        use TapState::*;
        match (self, tms) {
            (Reset, false) => Idle,
            (Reset, true) => Reset,
            (Idle, false) => Idle,
            (Idle, true) => DrSelect,
            (DrSelect, false) => DrCapture,
            (DrSelect, true) => IrSelect,
            (DrCapture, false) => DrShift,
            (DrCapture, true) => DrExit1,
            (DrShift, false) => DrShift,
            (DrShift, true) => DrExit1,
            (DrExit1, false) => DrPause,
            (DrExit1, true) => DrUpdate,
            (DrPause, false) => DrPause,
            (DrPause, true) => DrExit2,
            (DrExit2, false) => DrShift,
            (DrExit2, true) => DrUpdate,
            (DrUpdate, false) => Idle,
            (DrUpdate, true) => DrSelect,
            (IrSelect, false) => IrCapture,
            (IrSelect, true) => Reset,
            (IrCapture, false) => IrShift,
            (IrCapture, true) => IrExit1,
            (IrShift, false) => IrShift,
            (IrShift, true) => IrExit1,
            (IrExit1, false) => IrPause,
            (IrExit1, true) => IrUpdate,
            (IrPause, false) => IrPause,
            (IrPause, true) => IrExit2,
            (IrExit2, false) => IrShift,
            (IrExit2, true) => IrUpdate,
            (IrUpdate, false) => Idle,
            (IrUpdate, true) => DrSelect,
        }
    }

    /// If `next` is a legal single-TMS successor of `self`, the TMS value
    /// that reaches it.
    pub fn tms_towards(self, next: TapState) -> Option<bool> {
        if self.next(false) == next {
            Some(false)
        } else if self.next(true) == next {
            Some(true)
        } else {
            None
        }
    }
}

/// Shortest TMS path between two *stable* states, as a bit count and the
/// bits themselves packed LSB-first into a `u8` (length never exceeds 7,
/// so a single byte always suffices).
pub fn tms_path(from: TapState, to: TapState) -> (u8, u8) {
    use TapState::*;
    if from == to {
        return (0, 0);
    }
    match (from, to) {
        (Reset, Idle) => (1, 0b0),
        (Reset, DrShift) => (4, 0b0010),
        (Reset, DrPause) => (5, 0b01010),
        (Reset, IrShift) => (5, 0b00110),
        (Reset, IrPause) => (6, 0b010110),

        (Idle, Reset) => (3, 0b111),
        (Idle, DrShift) => (3, 0b001),
        (Idle, DrPause) => (4, 0b0101),
        (Idle, IrShift) => (4, 0b0011),
        (Idle, IrPause) => (5, 0b01011),

        (DrShift, Reset) => (5, 0b11111),
        (DrShift, Idle) => (3, 0b011),
        (DrShift, DrPause) => (2, 0b01),
        (DrShift, IrShift) => (6, 0b001111),
        (DrShift, IrPause) => (7, 0b0101111),

        (DrPause, Reset) => (5, 0b11111),
        (DrPause, Idle) => (3, 0b011),
        (DrPause, DrShift) => (2, 0b01),
        (DrPause, IrShift) => (6, 0b001111),
        (DrPause, IrPause) => (7, 0b0101111),

        (IrShift, Reset) => (5, 0b11111),
        (IrShift, Idle) => (3, 0b011),
        (IrShift, DrShift) => (5, 0b00111),
        (IrShift, DrPause) => (6, 0b010111),
        (IrShift, IrPause) => (2, 0b01),

        (IrPause, Reset) => (5, 0b11111),
        (IrPause, Idle) => (3, 0b011),
        (IrPause, DrShift) => (5, 0b00111),
        (IrPause, DrPause) => (6, 0b010111),
        (IrPause, IrShift) => (2, 0b01),

        _ => crate::error::bug(format!(
            "tms_path requested between non-stable states {:?} -> {:?}",
            from, to
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_holds_at_tms_high() {
        assert_eq!(TapState::Reset.next(true), TapState::Reset);
    }

    #[test]
    fn idle_holds_at_tms_low() {
        assert_eq!(TapState::Idle.next(false), TapState::Idle);
    }

    #[test]
    fn all_stable_states_have_a_reset_path_under_eight_bits() {
        for state in [
            TapState::Reset,
            TapState::Idle,
            TapState::DrShift,
            TapState::DrPause,
            TapState::IrShift,
            TapState::IrPause,
        ] {
            let (len, _) = tms_path(state, TapState::Reset);
            assert!(len <= 7);
        }
    }

    #[test]
    fn tms_path_walks_to_the_claimed_destination() {
        for from in [TapState::Reset, TapState::Idle, TapState::DrShift] {
            for to in [TapState::DrPause, TapState::IrShift, TapState::IrPause] {
                let (len, bits) = tms_path(from, to);
                let mut state = from;
                for i in 0..len {
                    let tms = (bits >> i) & 1 == 1;
                    state = state.next(tms);
                }
                assert_eq!(state, to, "{:?} -> {:?}", from, to);
            }
        }
    }
}
